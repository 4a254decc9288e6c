//! Image enrichment: run the detector over downloaded images and write one
//! detection row per image.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use glob::MatchOptions;
use tracing::{debug, info};

use crate::categorize::ImageCategory;
use crate::detector::ObjectDetector;
use crate::error::{PipelineError, Result};
use crate::file_writer::DetectionCsvWriter;
use crate::metrics;
use crate::models::DetectionRecord;

/// File extensions treated as images
pub const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Outcome of a scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Images processed
    pub images: usize,
    /// Rows per category
    pub by_category: BTreeMap<ImageCategory, usize>,
}

/// Find image files under `root`, skipping dot-directories, sorted.
pub fn discover_images(root: &Path) -> Result<Vec<PathBuf>> {
    let options = MatchOptions {
        case_sensitive: false,
        require_literal_leading_dot: true,
        ..MatchOptions::new()
    };
    let escaped_root = glob::Pattern::escape(&root.to_string_lossy());

    let mut images = Vec::new();
    for ext in IMAGE_EXTENSIONS {
        for entry in glob::glob_with(&format!("{escaped_root}/**/*.{ext}"), options)? {
            let path = entry?;
            if path.is_file() {
                images.push(path);
            }
        }
    }
    images.sort();
    images.dedup();
    Ok(images)
}

/// Message id encoded in an image file name (`{message-id}.jpg`)
pub fn message_id_from_path(path: &Path) -> Result<i64> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .and_then(|stem| stem.parse::<i64>().ok())
        .ok_or_else(|| PipelineError::InvalidImageName(path.to_path_buf()))
}

/// Runs a detector over every image under a root
pub struct ImageScanner<D: ObjectDetector> {
    detector: D,
    cancel: Arc<AtomicBool>,
}

impl<D: ObjectDetector> ImageScanner<D> {
    /// Create a scanner around `detector`
    pub fn new(detector: D) -> Self {
        Self {
            detector,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share a cancellation flag; it is checked before each image.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Scan `images_root` and write the detection table to `output`.
    ///
    /// Rows are flushed as they are produced; a failure leaves the rows of
    /// every image processed before it.
    pub async fn scan(&self, images_root: &Path, output: &Path) -> Result<ScanSummary> {
        let images = discover_images(images_root)?;
        info!(root = %images_root.display(), images = images.len(), "Scanning images");

        let mut writer = DetectionCsvWriter::create(output)?;
        let mut summary = ScanSummary::default();

        for image in &images {
            if self.cancel.load(Ordering::Relaxed) {
                info!(rows = writer.rows(), "Scan cancelled");
                return Err(PipelineError::Cancelled("image scan".to_string()));
            }
            let message_id = message_id_from_path(image)?;
            let detections = self.detector.detect(image).await?;
            let record = DetectionRecord::from_detections(message_id, image.to_string_lossy().into_owned(), &detections);
            debug!(
                image = %image.display(),
                classes = %record.detected_classes,
                category = %record.image_category,
                "Detected"
            );

            writer.append(&record)?;
            metrics::record_detection(record.image_category);
            *summary.by_category.entry(record.image_category).or_default() += 1;
            summary.images += 1;
        }

        info!(output = %output.display(), rows = writer.rows(), "Saved detections");
        Ok(summary)
    }
}
