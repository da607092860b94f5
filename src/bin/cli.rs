//! Notice notifier CLI
//!
//! Local execution entry point; schedule `poll` with cron or a systemd timer.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use notifier::{
    error::{AppError, Result},
    models::{Config, Topic},
    pipeline::{self, Notifier},
    services::SiteAdapter,
    storage::{JsonFileStore, WatermarkStore},
};

/// Notifier - University Notice Board Watcher
#[derive(Parser, Debug)]
#[command(
    name = "notifier",
    version,
    about = "Forwards newly published university notices to a webhook"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "data/config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one polling cycle for every topic (or a single one)
    Poll {
        /// Only poll the topic with this key
        #[arg(long)]
        topic: Option<String>,
    },

    /// Show what the next cycle would emit, without writing or sending
    Inspect {
        /// Topic key
        topic: String,
    },

    /// Show stored watermarks
    Status,

    /// Validate the configuration file
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = Config::load_or_default(&cli.config);
    config.apply_env_overrides();
    log::debug!("Loaded configuration from {}", cli.config.display());

    match cli.command {
        Command::Poll { topic } => {
            config.validate()?;
            let topics = match topic {
                Some(key) => vec![find_topic(&config, &key)?.clone()],
                None => config.topics.clone(),
            };

            log::info!("Polling {} topic(s)...", topics.len());
            let notifier = Arc::new(Notifier::from_config(&config)?);
            let summary = pipeline::run_poll(notifier, &topics).await;

            log::info!(
                "Poll complete: {} emitted, {} baseline(s), {} aborted, {} failed",
                summary.emitted(),
                summary.baselines(),
                summary.aborted(),
                summary.failures.len()
            );

            if summary.has_persistence_failure() {
                let topics: Vec<&str> = summary
                    .failures
                    .iter()
                    .filter(|f| f.persistence)
                    .map(|f| f.topic.as_str())
                    .collect();
                return Err(AppError::store(format!(
                    "watermarks not persisted for {}; notices may be sent again",
                    topics.join(", ")
                )));
            }
        }

        Command::Inspect { topic } => {
            config.validate()?;
            let topic = find_topic(&config, &topic)?;
            let notifier = Notifier::from_config(&config)?;
            let report = notifier.inspect(topic).await?;

            log::info!("Topic: {} ({})", topic.display_name, report.topic);
            match report.stored {
                Some(stored) => log::info!(
                    "Stored: pinned={} sequential={}",
                    stored.pinned_count,
                    stored.sequential_max
                ),
                None => log::info!("Stored: none (next poll records a baseline)"),
            }
            log::info!(
                "Live:   pinned={} sequential={}",
                report.live.pinned_count,
                report.live.sequential_max
            );

            if report.pending.is_empty() {
                log::info!("No new notices.");
            }
            for notice in &report.pending {
                log::info!("{}", notice.format("  {id} {date} {title} <{url}>"));
            }
        }

        Command::Status => {
            let store = JsonFileStore::new(&config.storage.watermark_file);
            let marks = store.list().await?;
            log::info!("Watermark file: {}", store.path().display());

            for topic in &config.topics {
                match marks.iter().find(|m| m.topic_key == topic.key) {
                    Some(mark) => log::info!(
                        "  {} ({}): pinned={} sequential={}",
                        topic.key,
                        topic.display_name,
                        mark.watermark.pinned_count,
                        mark.watermark.sequential_max
                    ),
                    None => log::info!("  {} ({}): not observed yet", topic.key, topic.display_name),
                }
            }
            for mark in marks.iter().filter(|m| config.topic(&m.topic_key).is_none()) {
                log::warn!("  {}: stored but not configured", mark.topic_key);
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            for topic in &config.topics {
                SiteAdapter::for_topic(topic)?;
                log::info!("✓ {} ({}) uses layout {}", topic.key, topic.display_name, topic.layout);
            }
            match &config.sink.webhook_url {
                Some(_) => log::info!("✓ Webhook configured ({:?} format)", config.sink.format),
                None => log::warn!("No webhook configured; notices will only be logged"),
            }

            log::info!("All validations passed!");
        }
    }

    Ok(())
}

fn find_topic<'a>(config: &'a Config, key: &str) -> Result<&'a Topic> {
    config
        .topic(key)
        .ok_or_else(|| AppError::config(format!("Unknown topic '{key}'")))
}
