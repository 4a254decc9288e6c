//! Telegram Warehouse - channel scraping and warehouse loading
//!
//! A Rust library that scrapes public Telegram channels into a date/channel
//! partitioned JSON data lake, loads it into a Postgres raw layer and
//! enriches downloaded images with object-detection categories.
//!
//! # Features
//!
//! - Bounded, all-or-nothing channel scraping with image downloads
//! - Atomic partition files under `telegram_messages/{date}/{channel}.json`
//! - Append loaders with an optional checksum watermark
//! - Out-of-process object detection and image categorization
//! - Stage driver including the dbt transform

/// Detection categorization rules
pub mod categorize;
/// Configuration management
pub mod config;
/// Warehouse connection and bulk inserts
pub mod db;
/// Object detection capability
pub mod detector;
/// Image scanning into the detection table
pub mod enrichment;
/// Error types
pub mod error;
/// Partition and detection file I/O
pub mod file_writer;
/// Raw and detection loaders
pub mod loader;
/// Logging setup and utilities
pub mod logging;
/// Metrics collection
pub mod metrics;
/// Data models and structures
pub mod models;
/// Partition key resolution
pub mod partition;
/// Stage driver
pub mod pipeline;
/// Warehouse schema definitions
pub mod schema;
/// Channel scraping
pub mod scraper;
/// Channel history capability
pub mod source;
/// Public web-preview transport
pub mod telegram;
/// Input validation
pub mod validation;

// Re-export key components for easier access
pub use categorize::{categorize, ImageCategory};
pub use config::AppConfig;
pub use db::Warehouse;
pub use error::{PipelineError, Result};
pub use loader::LoadMode;
pub use models::{ChannelMessage, ChannelReport, Detection, DetectionRecord, LoadSummary, MessageRecord, ScrapeBounds};
pub use partition::PartitionKey;
pub use pipeline::{Pipeline, Stage};
