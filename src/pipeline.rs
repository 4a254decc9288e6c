//! Stage driver: scrape, load raw, transform, enrich.

use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tokio::process::Command;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::db::Warehouse;
use crate::detector::{CommandDetector, ObjectDetector};
use crate::enrichment::{ImageScanner, ScanSummary};
use crate::error::{PipelineError, Result};
use crate::loader::{DetectionLoader, LoadMode, RawLoader};
use crate::logging::OperationTimer;
use crate::metrics;
use crate::models::{ChannelReport, LoadSummary, ScrapeBounds};
use crate::scraper::ChannelScraper;
use crate::source::ChannelSource;
use crate::telegram::TelegramPreviewClient;

/// Pipeline stages, in run order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Channels into the data lake
    Scrape,
    /// Data lake into `raw.telegram_messages`
    LoadRaw,
    /// dbt models and tests
    Transform,
    /// Object detection and `raw.image_detections`
    Enrich,
}

impl Stage {
    /// Every stage in the order a full run executes them
    pub const ALL: [Self; 4] = [Self::Scrape, Self::LoadRaw, Self::Transform, Self::Enrich];

    /// Stable name used in logs, metrics and errors
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scrape => "scrape",
            Self::LoadRaw => "load_raw",
            Self::Transform => "transform",
            Self::Enrich => "enrich",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a full run produced
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// One report per scraped channel
    pub channels: Vec<ChannelReport>,
    /// Raw message load
    pub raw: LoadSummary,
    /// Image scan
    pub scan: ScanSummary,
    /// Detection load
    pub detections: LoadSummary,
}

/// Runs stages against one configuration
pub struct Pipeline {
    config: AppConfig,
    cancel: Arc<AtomicBool>,
}

impl Pipeline {
    /// Create a pipeline for `config`
    #[must_use]
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share a cancellation flag with the scraper, scanner and raw loader
    #[must_use]
    pub fn with_cancellation(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Configuration in use
    #[must_use]
    pub const fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Run every stage in order; the first failure halts the run.
    pub async fn run(&self, bounds: ScrapeBounds, load_mode: LoadMode) -> Result<RunReport> {
        // Warehouse stages need it; fail before scraping anything
        self.config.database_url()?;

        let channels = self.config.scraper.channels.clone();
        let mut report = RunReport::default();
        for stage in Stage::ALL {
            let timer = OperationTimer::new(stage.as_str());
            let outcome = match stage {
                Stage::Scrape => self.scrape(&channels, bounds).await.map(|r| report.channels = r),
                Stage::LoadRaw => self.load_raw(load_mode).await.map(|s| report.raw = s),
                Stage::Transform => self.transform().await,
                Stage::Enrich => self.enrich(load_mode).await.map(|(scan, loaded)| {
                    report.scan = scan;
                    report.detections = loaded;
                }),
            };

            if let Err(e) = outcome {
                metrics::record_stage_failure(stage.as_str());
                error!(%stage, error = %e, "Stage failed, halting run");
                return Err(PipelineError::Stage {
                    stage: stage.as_str(),
                    source: Box::new(e),
                });
            }
            timer.finish();
        }

        info!(
            channels = report.channels.len(),
            rows = report.raw.rows_loaded,
            images = report.scan.images,
            "Pipeline run complete"
        );
        Ok(report)
    }

    /// Scrape `channels` from the public web preview
    pub async fn scrape(&self, channels: &[String], bounds: ScrapeBounds) -> Result<Vec<ChannelReport>> {
        let client = TelegramPreviewClient::new(&self.config.scraper.base_url, self.config.request_timeout())?;
        self.scrape_from(Arc::new(client), channels, bounds).await
    }

    /// Scrape `channels` from an arbitrary source
    pub async fn scrape_from(
        &self,
        source: Arc<dyn ChannelSource>,
        channels: &[String],
        bounds: ScrapeBounds,
    ) -> Result<Vec<ChannelReport>> {
        ChannelScraper::new(source, self.config.data_lake_path(), self.config.images_path())
            .with_cancellation(Arc::clone(&self.cancel))
            .scrape_channels(channels, bounds, self.config.scraper.max_concurrent_channels)
            .await
    }

    /// Load every data-lake partition into the raw layer
    pub async fn load_raw(&self, mode: LoadMode) -> Result<LoadSummary> {
        RawLoader::new(self.warehouse()?, mode)
            .with_cancellation(Arc::clone(&self.cancel))
            .load(&self.config.data_lake_path())
            .await
    }

    /// Run the configured detector over every downloaded image
    pub async fn detect(&self) -> Result<ScanSummary> {
        let detector = CommandDetector::from_template(&self.config.detection.command, &self.config.detection.model)?;
        self.detect_with(detector).await
    }

    /// Run `detector` over every downloaded image
    pub async fn detect_with<D: ObjectDetector>(&self, detector: D) -> Result<ScanSummary> {
        ImageScanner::new(detector)
            .with_cancellation(Arc::clone(&self.cancel))
            .scan(&self.config.images_path(), &self.config.detection_output())
            .await
    }

    /// Load the detection table into the raw layer
    pub async fn load_detections(&self, mode: LoadMode) -> Result<LoadSummary> {
        DetectionLoader::new(self.warehouse()?, mode)
            .load(&self.config.detection_output())
            .await
    }

    /// Scan images, then load the detections
    pub async fn enrich(&self, mode: LoadMode) -> Result<(ScanSummary, LoadSummary)> {
        let scan = self.detect().await?;
        let loaded = self.load_detections(mode).await?;
        Ok((scan, loaded))
    }

    /// `dbt run` followed by `dbt test`
    pub async fn transform(&self) -> Result<()> {
        let transform = &self.config.transform;
        for action in ["run", "test"] {
            let args = [
                action,
                "--project-dir",
                transform.project_dir.as_str(),
                "--profiles-dir",
                transform.profiles_dir.as_str(),
            ];
            run_command(Stage::Transform, &transform.dbt_binary, &args).await?;
        }
        Ok(())
    }

    fn warehouse(&self) -> Result<Warehouse> {
        Warehouse::connect_lazy(
            self.config.database_url()?,
            self.config.database.max_connections,
            self.config.connection_timeout(),
        )
    }
}

/// Run an external command, logging its output line by line.
async fn run_command(stage: Stage, program: &str, args: &[&str]) -> Result<()> {
    let command_line = std::iter::once(program).chain(args.iter().copied()).collect::<Vec<_>>().join(" ");
    info!(%stage, command = %command_line, "Running");

    let stage_failed = |message: String| PipelineError::StageFailed {
        stage: stage.to_string(),
        command: command_line.clone(),
        message,
    };

    let output = Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| stage_failed(format!("failed to start: {e}")))?;

    for line in String::from_utf8_lossy(&output.stdout).lines().filter(|l| !l.trim().is_empty()) {
        info!(%stage, "{line}");
    }
    for line in String::from_utf8_lossy(&output.stderr).lines().filter(|l| !l.trim().is_empty()) {
        warn!(%stage, "{line}");
    }

    if !output.status.success() {
        return Err(stage_failed(format!("exited with {}", output.status)));
    }
    Ok(())
}
