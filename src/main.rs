use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use telegram_warehouse::config::AppConfig;
use telegram_warehouse::logging::{init_logging, OperationTimer};
use telegram_warehouse::validation::InputValidator;
use telegram_warehouse::{LoadMode, Pipeline};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape channels into the data lake
    Scrape {
        /// Maximum number of messages considered per channel
        #[arg(short, long)]
        limit: Option<usize>,

        /// Keep messages at or after this time (ISO format)
        #[arg(short, long)]
        since: Option<String>,

        /// Keep messages at or before this time (ISO format)
        #[arg(short, long)]
        until: Option<String>,

        /// Channel to scrape; repeat for several. Defaults to the configured list
        #[arg(short, long = "channel")]
        channels: Vec<String>,
    },
    /// Load data-lake partitions into raw.telegram_messages
    LoadRaw {
        /// Skip files whose checksum was already loaded
        #[arg(long)]
        skip_loaded: bool,
    },
    /// Run object detection over downloaded images
    Detect,
    /// Load the detection table into raw.image_detections
    LoadDetections {
        /// Skip the file if its checksum was already loaded
        #[arg(long)]
        skip_loaded: bool,
    },
    /// Run the dbt models and tests
    Transform,
    /// Run every stage in order
    Run {
        /// Maximum number of messages considered per channel
        #[arg(short, long)]
        limit: Option<usize>,

        /// Keep messages at or after this time (ISO format)
        #[arg(short, long)]
        since: Option<String>,

        /// Keep messages at or before this time (ISO format)
        #[arg(short, long)]
        until: Option<String>,

        /// Skip files whose checksum was already loaded
        #[arg(long)]
        skip_loaded: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            return Err(e).context("Failed to read .env");
        }
    }

    // Load configuration
    let config = AppConfig::load().context("Failed to load configuration")?;

    // Initialize logging
    let _log_guard = init_logging(
        &config.logging.level,
        config.logging.format == "json",
        config.logging.file_path.as_ref().map(PathBuf::from).as_deref(),
    )?;

    info!("Starting telegram-warehouse");

    let cancel = Arc::new(AtomicBool::new(false));
    spawn_interrupt_handler(Arc::clone(&cancel));

    let default_mode = config.database.load_mode;
    let load_mode = |skip_loaded: bool| if skip_loaded { LoadMode::SkipLoaded } else { default_mode };
    let pipeline = Pipeline::new(config).with_cancellation(cancel);

    // Process command
    match cli.command {
        Commands::Scrape {
            limit,
            since,
            until,
            channels,
        } => {
            let bounds = InputValidator::parse_bounds(limit, since.as_deref(), until.as_deref())?;
            let channels = if channels.is_empty() {
                pipeline.config().scraper.channels.clone()
            } else {
                for channel in &channels {
                    InputValidator::validate_channel_name(channel)?;
                }
                channels
            };

            let timer = OperationTimer::new("scrape");
            let reports = pipeline.scrape(&channels, bounds).await.context("Stage scrape failed")?;
            timer.finish();
            for report in &reports {
                info!(
                    channel = %report.channel,
                    kept = report.kept,
                    images = report.images,
                    partitions = report.partitions,
                    "Scraped"
                );
            }
        }
        Commands::LoadRaw { skip_loaded } => {
            let timer = OperationTimer::new("load_raw");
            let summary = pipeline
                .load_raw(load_mode(skip_loaded))
                .await
                .context("Stage load_raw failed")?;
            timer.finish();
            info!(
                files = summary.files_loaded,
                skipped = summary.files_skipped,
                rows = summary.rows_loaded,
                "Raw load finished"
            );
        }
        Commands::Detect => {
            let timer = OperationTimer::new("detect");
            let summary = pipeline.detect().await.context("Stage detect failed")?;
            timer.finish();
            info!(images = summary.images, by_category = ?summary.by_category, "Detection finished");
        }
        Commands::LoadDetections { skip_loaded } => {
            let timer = OperationTimer::new("load_detections");
            let summary = pipeline
                .load_detections(load_mode(skip_loaded))
                .await
                .context("Stage load_detections failed")?;
            timer.finish();
            info!(rows = summary.rows_loaded, skipped = summary.files_skipped, "Detection load finished");
        }
        Commands::Transform => {
            let timer = OperationTimer::new("transform");
            pipeline.transform().await.context("Stage transform failed")?;
            timer.finish();
        }
        Commands::Run {
            limit,
            since,
            until,
            skip_loaded,
        } => {
            let bounds = InputValidator::parse_bounds(limit, since.as_deref(), until.as_deref())?;
            pipeline.run(bounds, load_mode(skip_loaded)).await?;
        }
    }

    Ok(())
}

/// First Ctrl-C requests a clean stop after the current unit of work; a
/// second one exits immediately with the conventional status 130.
fn spawn_interrupt_handler(cancel: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("Interrupt received, stopping after the current item. Press Ctrl-C again to exit now");
        cancel.store(true, Ordering::Relaxed);

        if tokio::signal::ctrl_c().await.is_ok() {
            error!("Second interrupt, exiting");
            std::process::exit(130);
        }
    });
}
