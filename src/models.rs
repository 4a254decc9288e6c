//! Data models for scraped messages and image detections
//!
//! This module contains the records written to the data lake and the
//! warehouse, plus the transport-level message shape produced by a
//! [`ChannelSource`](crate::source::ChannelSource).

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::categorize::ImageCategory;

/// One captured channel post, as stored in a partition file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Platform message id, unique within the channel
    pub message_id: i64,
    /// Channel the message was read from, as configured
    pub channel_name: String,
    /// Capture timestamp with the source offset preserved
    pub message_date: DateTime<FixedOffset>,
    /// Message text, if any
    pub message_text: Option<String>,
    /// True if the post carried any media
    pub has_media: bool,
    /// Path of the downloaded image, set iff an image was downloaded
    pub image_path: Option<String>,
    /// View count
    pub views: Option<i64>,
    /// Forward count
    pub forwards: Option<i64>,
}

/// A message as delivered by the platform, before filtering
#[derive(Debug, Clone, Default)]
pub struct ChannelMessage {
    /// Platform message id
    pub id: i64,
    /// Capture timestamp; messages without one are skipped
    pub date: Option<DateTime<FixedOffset>>,
    /// Message text
    pub text: Option<String>,
    /// True if any media is attached (photo, video, document, ...)
    pub has_media: bool,
    /// Location of the attached photo, when the media is a photo
    pub photo_url: Option<String>,
    /// View count
    pub views: Option<i64>,
    /// Forward count
    pub forwards: Option<i64>,
}

impl ChannelMessage {
    /// True if the message carries a downloadable photo
    #[must_use]
    pub const fn has_photo(&self) -> bool {
        self.photo_url.is_some()
    }
}

/// Caller-supplied bounds for one channel's iteration
#[derive(Debug, Clone, Copy, Default)]
pub struct ScrapeBounds {
    /// Maximum number of messages considered (before filtering)
    pub limit: Option<usize>,
    /// Earliest timestamp kept (inclusive)
    pub since: Option<DateTime<Utc>>,
    /// Latest timestamp kept (inclusive)
    pub until: Option<DateTime<Utc>>,
}

impl ScrapeBounds {
    /// True if `date` falls inside the inclusive `[since, until]` window
    #[must_use]
    pub fn contains(&self, date: &DateTime<FixedOffset>) -> bool {
        let instant = date.with_timezone(&Utc);
        if self.since.is_some_and(|since| instant < since) {
            return false;
        }
        if self.until.is_some_and(|until| instant > until) {
            return false;
        }
        true
    }

    /// True once `considered` messages exhaust the limit
    #[must_use]
    pub fn limit_reached(&self, considered: usize) -> bool {
        self.limit.is_some_and(|limit| considered >= limit)
    }
}

/// One detected object in an image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Object class label, e.g. `person` or `bottle`
    pub label: String,
    /// Model confidence in `[0, 1]`
    pub confidence: f64,
}

/// One image's inference result, as written to the detection table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    /// Message id parsed from the image file name
    pub message_id: i64,
    /// Path of the image on disk
    pub image_path: String,
    /// Comma-joined detected class labels, in model order
    pub detected_classes: String,
    /// Maximum detection confidence, 0.0 when nothing was detected
    pub confidence_score: f64,
    /// Category derived from the detected class set
    pub image_category: ImageCategory,
}

impl DetectionRecord {
    /// Build a record from raw detections
    #[must_use]
    pub fn from_detections(message_id: i64, image_path: String, detections: &[Detection]) -> Self {
        let labels: Vec<&str> = detections.iter().map(|d| d.label.as_str()).collect();
        let confidence_score = detections
            .iter()
            .map(|d| d.confidence)
            .fold(None, |max: Option<f64>, c| Some(max.map_or(c, |m| m.max(c))))
            .unwrap_or(0.0);

        Self {
            message_id,
            image_path,
            detected_classes: labels.join(","),
            confidence_score,
            image_category: crate::categorize::categorize(labels.iter().copied()),
        }
    }
}

/// Outcome of one channel scrape
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelReport {
    /// Channel name
    pub channel: String,
    /// Messages iterated, counted against the limit
    pub considered: usize,
    /// Messages kept after filtering
    pub kept: usize,
    /// Images downloaded
    pub images: usize,
    /// Partition files written
    pub partitions: usize,
}

/// Outcome of a loader run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSummary {
    /// Files found on disk
    pub files_discovered: usize,
    /// Files whose rows were committed
    pub files_loaded: usize,
    /// Files skipped because their checksum was already recorded
    pub files_skipped: usize,
    /// Rows appended
    pub rows_loaded: u64,
}

impl LoadSummary {
    /// Summary for a run that found nothing to do
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// True when no rows were written
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        self.rows_loaded == 0 && self.files_loaded == 0
    }
}
