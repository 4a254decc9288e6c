//! Partition keys for the message data lake.
//!
//! A partition is identified by the capture date and the channel slug and is
//! stored at `{root}/telegram_messages/{YYYY-MM-DD}/{slug}.json`.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, NaiveDate};

/// Directory under the data-lake root that holds message partitions
pub const MESSAGES_DIR: &str = "telegram_messages";

const SEPARATOR: char = '_';

/// Normalize a channel name for use in paths.
///
/// Lower-cases, collapses every run of non-alphanumeric characters into a
/// single `_` and trims separators from both ends.
#[must_use]
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_separator = false;

    for ch in value.chars() {
        if ch.is_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push(SEPARATOR);
            }
            pending_separator = false;
            slug.extend(ch.to_lowercase());
        } else {
            pending_separator = true;
        }
    }

    slug
}

/// Storage identity of a partition
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionKey {
    /// Calendar date of the capture timestamp, in the source offset
    pub date: NaiveDate,
    /// Slug of the channel name
    pub channel_slug: String,
}

impl PartitionKey {
    /// Key for a message captured at `timestamp` on `channel`
    #[must_use]
    pub fn for_message(timestamp: &DateTime<FixedOffset>, channel: &str) -> Self {
        Self {
            date: timestamp.date_naive(),
            channel_slug: slugify(channel),
        }
    }

    /// Path of the partition file under the data-lake `root`
    #[must_use]
    pub fn path(&self, root: &Path) -> PathBuf {
        root.join(MESSAGES_DIR)
            .join(self.date.format("%Y-%m-%d").to_string())
            .join(format!("{}.json", self.channel_slug))
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.date.format("%Y-%m-%d"), self.channel_slug)
    }
}
