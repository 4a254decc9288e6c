//! Channel scraping into date/channel partitions.
//!
//! One channel is all-or-nothing: records are buffered per [`PartitionKey`]
//! while the history is iterated and only flushed once iteration finished.
//! Photos are downloaded into a per-channel staging directory and promoted
//! into `{images_root}/{slug}/{id}.jpg` once every partition has been written
//! under a temporary name; the partitions are renamed into place last. An
//! aborted channel leaves neither partitions nor images behind.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};
use crate::file_writer::stage_partition;
use crate::metrics;
use crate::models::{ChannelMessage, ChannelReport, MessageRecord, ScrapeBounds};
use crate::partition::{slugify, PartitionKey};
use crate::source::ChannelSource;

/// Directory under the images root used for in-flight downloads
pub const STAGING_DIR: &str = ".staging";

/// Buffered output of one channel's iteration
struct ChannelBatch {
    partitions: BTreeMap<PartitionKey, Vec<MessageRecord>>,
    /// (staged file, canonical file)
    images: Vec<(PathBuf, PathBuf)>,
    report: ChannelReport,
}

/// Scrapes channels from a [`ChannelSource`] into the data lake
pub struct ChannelScraper {
    source: Arc<dyn ChannelSource>,
    data_lake_root: PathBuf,
    images_root: PathBuf,
    cancel: Arc<AtomicBool>,
}

impl ChannelScraper {
    /// Create a scraper writing partitions under `data_lake_root` and images under `images_root`
    pub fn new(source: Arc<dyn ChannelSource>, data_lake_root: impl Into<PathBuf>, images_root: impl Into<PathBuf>) -> Self {
        Self {
            source,
            data_lake_root: data_lake_root.into(),
            images_root: images_root.into(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share a cancellation flag; it is checked once per message.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Scrape several channels with at most `max_concurrent` in flight.
    ///
    /// Reports come back in channel order. Channels already in flight run to
    /// completion even when another channel fails, so none is cut off
    /// mid-flush; the first error in channel order is returned.
    pub async fn scrape_channels(
        &self,
        channels: &[String],
        bounds: ScrapeBounds,
        max_concurrent: usize,
    ) -> Result<Vec<ChannelReport>> {
        // Two channels with one slug would write the same partition files
        let mut slugs = HashSet::new();
        for channel in channels {
            if !slugs.insert(slugify(channel)) {
                return Err(PipelineError::Config(format!(
                    "channel {channel:?} shares a partition slug with another channel"
                )));
            }
        }

        let outcomes: Vec<Result<ChannelReport>> =
            stream::iter(channels.iter().map(|channel| self.scrape_channel(channel, bounds)))
                .buffered(max_concurrent.max(1))
                .collect()
                .await;
        outcomes.into_iter().collect()
    }

    /// Scrape one channel and flush its partitions.
    pub async fn scrape_channel(&self, channel: &str, bounds: ScrapeBounds) -> Result<ChannelReport> {
        info!(channel, limit = bounds.limit, since = ?bounds.since, until = ?bounds.until, "Scraping channel");
        let slug = slugify(channel);
        let staging_dir = self.images_root.join(STAGING_DIR).join(&slug);

        // Leftovers of a run that died before cleanup
        remove_dir_if_exists(&staging_dir).await?;

        let result = match self.collect(channel, &slug, &staging_dir, bounds).await {
            Ok(batch) => self.flush(batch).await,
            Err(e) => Err(e),
        };

        if let Err(e) = remove_dir_if_exists(&staging_dir).await {
            warn!(channel, dir = %staging_dir.display(), error = %e, "Failed to remove staging directory");
        }

        match &result {
            Ok(report) => {
                metrics::record_channel_scraped(report);
                info!(
                    channel,
                    considered = report.considered,
                    kept = report.kept,
                    images = report.images,
                    partitions = report.partitions,
                    "Channel scraped"
                );
            }
            Err(e) => {
                metrics::record_stage_failure("scrape");
                warn!(channel, error = %e, "Channel aborted, no partitions written");
            }
        }
        result
    }

    async fn collect(&self, channel: &str, slug: &str, staging_dir: &Path, bounds: ScrapeBounds) -> Result<ChannelBatch> {
        let mut batch = ChannelBatch {
            partitions: BTreeMap::new(),
            images: Vec::new(),
            report: ChannelReport {
                channel: channel.to_string(),
                ..ChannelReport::default()
            },
        };
        let mut seen = HashSet::new();
        let mut before: Option<i64> = None;

        'pages: loop {
            if bounds.limit_reached(batch.report.considered) {
                break;
            }
            let page = self.source.fetch_page(channel, before).await?;
            let Some(oldest) = page.iter().map(|m| m.id).min() else {
                break;
            };

            for message in page {
                if bounds.limit_reached(batch.report.considered) {
                    break 'pages;
                }
                if self.cancel.load(Ordering::Relaxed) {
                    return Err(PipelineError::Cancelled(format!("channel {channel}")));
                }
                if !seen.insert(message.id) {
                    continue;
                }
                batch.report.considered += 1;
                self.process_message(channel, slug, staging_dir, &bounds, message, &mut batch).await?;
            }

            // Stop when the source stops making progress backwards
            if before.is_some_and(|b| oldest >= b) {
                break;
            }
            before = Some(oldest);
        }

        Ok(batch)
    }

    async fn process_message(
        &self,
        channel: &str,
        slug: &str,
        staging_dir: &Path,
        bounds: &ScrapeBounds,
        message: ChannelMessage,
        batch: &mut ChannelBatch,
    ) -> Result<()> {
        let Some(date) = message.date else {
            metrics::record_message_skipped("no_date");
            return Ok(());
        };
        if !bounds.contains(&date) {
            metrics::record_message_skipped("out_of_bounds");
            return Ok(());
        }

        let image_path = if message.has_photo() {
            let file_name = format!("{}.jpg", message.id);
            let staged = staging_dir.join(&file_name);
            let canonical = self.images_root.join(slug).join(&file_name);

            let bytes = self.source.fetch_media(channel, &message).await?;
            tokio::fs::create_dir_all(staging_dir).await?;
            tokio::fs::write(&staged, &bytes).await?;
            debug!(channel, message_id = message.id, bytes = bytes.len(), "Downloaded image");

            let recorded = canonical.to_string_lossy().into_owned();
            batch.images.push((staged, canonical));
            batch.report.images += 1;
            Some(recorded)
        } else {
            None
        };

        let key = PartitionKey::for_message(&date, channel);
        batch.partitions.entry(key).or_default().push(MessageRecord {
            message_id: message.id,
            channel_name: channel.to_string(),
            message_date: date,
            message_text: message.text,
            has_media: message.has_media,
            image_path,
            views: message.views,
            forwards: message.forwards,
        });
        batch.report.kept += 1;
        Ok(())
    }

    /// Make the channel's output visible.
    ///
    /// Partitions are first written in full under temporary names, then the
    /// images are promoted, then the partitions are renamed into place. A
    /// partition never becomes visible before the images it references.
    async fn flush(&self, batch: ChannelBatch) -> Result<ChannelReport> {
        let ChannelBatch {
            partitions,
            images,
            mut report,
        } = batch;

        let root = self.data_lake_root.clone();
        let staged = tokio::task::spawn_blocking(move || stage_partitions(&root, &partitions))
            .await
            .map_err(|e| PipelineError::Io(std::io::Error::other(e)))??;

        if let Err(e) = promote_images(&images).await {
            discard(staged.iter().map(|p| p.tmp.as_path())).await;
            return Err(e);
        }

        for (index, partition) in staged.iter().enumerate() {
            if let Err(e) = tokio::fs::rename(&partition.tmp, &partition.path).await {
                discard(staged[index..].iter().map(|p| p.tmp.as_path())).await;
                return Err(e.into());
            }
            report.partitions += 1;
            info!(
                partition = %partition.key,
                records = partition.records,
                path = %partition.path.display(),
                "Wrote partition"
            );
        }

        Ok(report)
    }
}

/// A partition written under its temporary name
struct StagedPartition {
    key: PartitionKey,
    tmp: PathBuf,
    path: PathBuf,
    records: usize,
}

fn stage_partitions(
    root: &Path,
    partitions: &BTreeMap<PartitionKey, Vec<MessageRecord>>,
) -> Result<Vec<StagedPartition>> {
    let mut staged: Vec<StagedPartition> = Vec::with_capacity(partitions.len());
    for (key, records) in partitions {
        let path = key.path(root);
        match stage_partition(records, &path) {
            Ok(tmp) => staged.push(StagedPartition {
                key: key.clone(),
                tmp,
                path,
                records: records.len(),
            }),
            Err(e) => {
                for partition in &staged {
                    let _ = std::fs::remove_file(&partition.tmp);
                }
                return Err(e);
            }
        }
    }
    Ok(staged)
}

/// Move staged images to their canonical paths; on failure the ones already
/// moved are removed again.
async fn promote_images(images: &[(PathBuf, PathBuf)]) -> Result<()> {
    for (index, (staged, canonical)) in images.iter().enumerate() {
        let moved = async {
            if let Some(parent) = canonical.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::rename(staged, canonical).await
        };
        if let Err(e) = moved.await {
            discard(images[..index].iter().map(|(_, canonical)| canonical.as_path())).await;
            return Err(e.into());
        }
    }
    Ok(())
}

async fn discard<'a>(paths: impl Iterator<Item = &'a Path>) {
    for path in paths {
        if let Err(e) = tokio::fs::remove_file(path).await {
            warn!(path = %path.display(), error = %e, "Failed to remove file of aborted channel");
        }
    }
}

async fn remove_dir_if_exists(dir: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
