//! Data models for Mailwatch

mod alert;
mod outbox;
mod trends;

pub use alert::*;
pub use outbox::*;
pub use trends::*;
