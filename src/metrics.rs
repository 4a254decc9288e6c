//! Pipeline metrics.
//!
//! Thin wrappers over the `metrics` facade. Nothing is exported unless the
//! embedding binary installs a recorder; without one every call is a no-op.

use std::time::Duration;

use ::metrics::{counter, histogram};

use crate::categorize::ImageCategory;
use crate::models::{ChannelReport, LoadSummary};

/// Metric names, prefixed with the crate name
pub mod names {
    /// Messages iterated from the platform
    pub const MESSAGES_CONSIDERED: &str = "telegram_warehouse_messages_considered_total";
    /// Messages kept in a partition
    pub const MESSAGES_KEPT: &str = "telegram_warehouse_messages_kept_total";
    /// Messages dropped before partitioning
    pub const MESSAGES_SKIPPED: &str = "telegram_warehouse_messages_skipped_total";
    /// Images downloaded
    pub const IMAGES_DOWNLOADED: &str = "telegram_warehouse_images_downloaded_total";
    /// Partition files written
    pub const PARTITIONS_WRITTEN: &str = "telegram_warehouse_partitions_written_total";
    /// Rows appended to a raw table
    pub const ROWS_LOADED: &str = "telegram_warehouse_rows_loaded_total";
    /// Files skipped by the load watermark
    pub const FILES_SKIPPED: &str = "telegram_warehouse_files_skipped_total";
    /// Detection rows written
    pub const DETECTIONS: &str = "telegram_warehouse_detections_total";
    /// Stage failures
    pub const STAGE_FAILURES: &str = "telegram_warehouse_stage_failures_total";
    /// Stage wall-clock duration
    pub const STAGE_DURATION: &str = "telegram_warehouse_stage_duration_seconds";
}

/// Record the outcome of one scraped channel
pub fn record_channel_scraped(report: &ChannelReport) {
    let channel = report.channel.clone();
    counter!(names::MESSAGES_CONSIDERED, "channel" => channel.clone()).increment(report.considered as u64);
    counter!(names::MESSAGES_KEPT, "channel" => channel.clone()).increment(report.kept as u64);
    counter!(names::IMAGES_DOWNLOADED, "channel" => channel.clone()).increment(report.images as u64);
    counter!(names::PARTITIONS_WRITTEN, "channel" => channel).increment(report.partitions as u64);
}

/// Record a message dropped before partitioning
pub fn record_message_skipped(reason: &'static str) {
    counter!(names::MESSAGES_SKIPPED, "reason" => reason).increment(1);
}

/// Record a finished load into `table`
pub fn record_load(table: &'static str, summary: &LoadSummary) {
    counter!(names::ROWS_LOADED, "table" => table).increment(summary.rows_loaded);
    counter!(names::FILES_SKIPPED, "table" => table).increment(summary.files_skipped as u64);
}

/// Record one detection row
pub fn record_detection(category: ImageCategory) {
    counter!(names::DETECTIONS, "category" => category.as_str()).increment(1);
}

/// Record a failed stage
pub fn record_stage_failure(stage: &'static str) {
    counter!(names::STAGE_FAILURES, "stage" => stage).increment(1);
}

/// Record how long a stage took
pub fn record_stage_duration(stage: &'static str, duration: Duration) {
    histogram!(names::STAGE_DURATION, "stage" => stage).record(duration.as_secs_f64());
}
