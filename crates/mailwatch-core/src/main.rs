//! Mailwatch CLI
//!
//! Command-line interface for outbox trend reports and alerting.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;

use mailwatch::alerting::{AlertEvaluator, OutboxMonitor};
use mailwatch::config::LoggingConfig;
use mailwatch::db::{PostgresOutboxStore, PostgresPool};
use mailwatch::models::Alert;
use mailwatch::trends::TrendsAggregator;
use mailwatch::Config;

/// Mailwatch - outbox monitoring and alerting
#[derive(Parser)]
#[command(name = "mailwatch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "MAILWATCH_CONFIG")]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (for commands that support it)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate outbox alerts periodically until interrupted
    Watch {
        /// Seconds between checks (overrides configuration)
        #[arg(long, env = "MAILWATCH_CHECK_INTERVAL")]
        interval: Option<u64>,
    },

    /// Print the 24-hour trend report
    Trends,

    /// Evaluate alerts once; exits with status 2 on a critical verdict
    Check,

    /// Show the resolved alert thresholds
    Config,

    /// Database management
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },

    /// Check database connectivity
    Health,
}

#[derive(Subcommand)]
enum DbCommands {
    /// Run database migrations
    Migrate,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_logging(&config.logging, cli.verbose);

    let result = match cli.command {
        Commands::Watch { interval } => run_watch(config, interval).await,
        Commands::Trends => run_trends(config, cli.format).await,
        Commands::Check => run_check(config, cli.format).await,
        Commands::Config => run_config(&config, cli.format),
        Commands::Db { command } => run_db(config, command).await,
        Commands::Health => run_health(config).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(config: &LoggingConfig, verbose: bool) {
    let level = if verbose { "debug" } else { config.level.as_str() };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    if config.format == "json" {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn aggregator(config: &Config) -> anyhow::Result<TrendsAggregator> {
    let pool = PostgresPool::new(&config.database).await?;
    Ok(TrendsAggregator::new(Arc::new(PostgresOutboxStore::new(&pool))))
}

fn evaluator(config: &Config) -> AlertEvaluator {
    AlertEvaluator::new(config.alerting.overrides())
}

async fn run_watch(config: Config, interval: Option<u64>) -> anyhow::Result<ExitCode> {
    let secs = interval.unwrap_or(config.alerting.check_interval_seconds).max(1);
    let monitor = OutboxMonitor::new(
        aggregator(&config).await?,
        evaluator(&config),
        Duration::from_secs(secs),
    );

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl+C received, shutting down...");
        }
        signal.cancel();
    });

    monitor.run(shutdown).await;
    Ok(ExitCode::SUCCESS)
}

async fn run_trends(config: Config, format: OutputFormat) -> anyhow::Result<ExitCode> {
    let trends = aggregator(&config).await?.execute().await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&trends)?),
        OutputFormat::Text => {
            let s = &trends.summary;
            println!("Outbox trends (last 24h)");
            println!("  queued:       {}", s.total_queued);
            println!("  sent:         {}", s.total_sent);
            println!("  failed:       {}", s.total_failed);
            println!("  pending now:  {}", s.current_pending);
            match s.oldest_pending {
                Some(oldest) => println!("  oldest:       {}", oldest.to_rfc3339()),
                None => println!("  oldest:       -"),
            }
            println!("  success rate: {:.1}%", s.success_rate_24h * 100.0);
            println!();
            for bucket in &trends.buckets {
                println!(
                    "  {}  queued {:>5}  sent {:>5}  failed {:>5}",
                    bucket.bucket_start.format("%Y-%m-%d %H:%M"),
                    bucket.queued,
                    bucket.sent,
                    bucket.failed
                );
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

async fn run_check(config: Config, format: OutputFormat) -> anyhow::Result<ExitCode> {
    let trends = aggregator(&config).await?.execute().await?;
    let alert = evaluator(&config).evaluate(&trends);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&alert)?),
        OutputFormat::Text => print_alert(&alert),
    }

    Ok(if alert.is_critical() {
        ExitCode::from(2)
    } else {
        ExitCode::SUCCESS
    })
}

fn print_alert(alert: &Alert) {
    if alert.ok {
        println!("OK: outbox healthy");
        return;
    }

    let reasons: Vec<&str> = alert.reasons.iter().map(|r| r.as_str()).collect();
    println!(
        "{}: {}",
        format!("{:?}", alert.severity).to_uppercase(),
        reasons.join(", ")
    );
    for (key, value) in &alert.details {
        println!("  {key}: {value}");
    }
}

fn run_config(config: &Config, format: OutputFormat) -> anyhow::Result<ExitCode> {
    let resolved = evaluator(config).config();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&resolved)?),
        OutputFormat::Text => {
            println!("pending_threshold:              {}", resolved.pending_threshold);
            println!(
                "oldest_pending_max_age_minutes: {}",
                resolved.oldest_pending_max_age_minutes
            );
            println!(
                "failure_spike_threshold:        {}",
                resolved.failure_spike_threshold
            );
        }
    }

    Ok(ExitCode::SUCCESS)
}

async fn run_db(config: Config, command: DbCommands) -> anyhow::Result<ExitCode> {
    match command {
        DbCommands::Migrate => {
            let pool = PostgresPool::new(&config.database).await?;
            pool.migrate().await?;
            println!("Migrations applied");
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn run_health(config: Config) -> anyhow::Result<ExitCode> {
    let pool = PostgresPool::new(&config.database).await?;
    pool.health_check().await?;
    println!("Database: connected");
    Ok(ExitCode::SUCCESS)
}
