//! File writing utilities for the data lake.
//!
//! Partition files are pretty-printed JSON arrays of [`MessageRecord`]s,
//! written whole through a temporary sibling so readers never observe a
//! half-written partition. Detection output is a CSV table written one row
//! at a time.

use std::fs::{self, create_dir_all, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use csv::Writer;

use crate::error::{PipelineError, Result};
use crate::models::{DetectionRecord, MessageRecord};

/// Column order of the detection table
pub const DETECTION_COLUMNS: [&str; 5] = [
    "message_id",
    "image_path",
    "detected_classes",
    "confidence_score",
    "image_category",
];

/// Write a complete partition file, creating parent directories on demand.
///
/// The content goes to `{path}.tmp` first and is renamed over `path` once
/// fully flushed.
pub fn write_partition(records: &[MessageRecord], path: &Path) -> Result<()> {
    let tmp_path = stage_partition(records, path)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Write and sync a partition to its temporary sibling, returning that path.
///
/// The caller publishes it with a rename onto `path`, or removes it.
pub fn stage_partition(records: &[MessageRecord], path: &Path) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }

    let tmp_path = temp_sibling(path);
    if let Err(e) = write_synced(records, &tmp_path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }
    Ok(tmp_path)
}

fn write_synced(records: &[MessageRecord], path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, records)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(())
}

/// Parse a partition file back into records.
pub fn read_partition(path: &Path) -> Result<Vec<MessageRecord>> {
    let file = File::open(path)?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| PipelineError::MalformedPartition {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse a partition file as untyped JSON objects, preserving every field.
pub fn read_partition_values(path: &Path) -> Result<Vec<serde_json::Value>> {
    parse_partition_values(path, &fs::read(path)?)
}

/// Parse already-read partition bytes; `path` only labels errors.
pub fn parse_partition_values(path: &Path, content: &[u8]) -> Result<Vec<serde_json::Value>> {
    serde_json::from_slice(content).map_err(|source| PipelineError::MalformedPartition {
        path: path.to_path_buf(),
        source,
    })
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(std::ffi::OsStr::to_os_string).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Incremental writer for the detection table.
///
/// The header is written on creation; every [`append`](Self::append) is
/// flushed so an interrupted scan leaves a valid partial table.
pub struct DetectionCsvWriter {
    writer: Writer<File>,
    rows: usize,
}

impl DetectionCsvWriter {
    /// Create (truncate) the output file and write the header row
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            create_dir_all(parent)?;
        }
        let mut writer = Writer::from_writer(File::create(path)?);
        writer.write_record(DETECTION_COLUMNS)?;
        writer.flush()?;
        Ok(Self { writer, rows: 0 })
    }

    /// Append one record and flush it to disk
    pub fn append(&mut self, record: &DetectionRecord) -> Result<()> {
        self.writer.write_record([
            record.message_id.to_string(),
            record.image_path.clone(),
            record.detected_classes.clone(),
            record.confidence_score.to_string(),
            record.image_category.to_string(),
        ])?;
        self.writer.flush()?;
        self.rows += 1;
        Ok(())
    }

    /// Rows written so far
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }
}

/// Read every row of a detection table
pub fn read_detections(path: &Path) -> Result<Vec<DetectionRecord>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut records = Vec::new();
    for row in reader.deserialize() {
        records.push(row?);
    }
    Ok(records)
}
