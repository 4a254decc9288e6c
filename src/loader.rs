//! Bulk loading of data-lake files into the warehouse raw layer.
//!
//! Both loaders append. With [`LoadMode::SkipLoaded`] every committed file
//! also records its SHA-256 in `raw.load_ledger` inside the same
//! transaction, and a file whose checksum is already there is skipped.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use glob::MatchOptions;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::db::{self, Warehouse};
use crate::error::{PipelineError, Result};
use crate::file_writer::{parse_partition_values, read_detections};
use crate::metrics;
use crate::models::{LoadSummary, MessageRecord};
use crate::partition::MESSAGES_DIR;
use crate::schema::{image_detections, telegram_messages};

/// How a loader treats files it has seen before
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadMode {
    /// Append every row of every file, even if loaded before
    #[default]
    Append,
    /// Skip files whose content checksum is already recorded
    SkipLoaded,
}

/// Find every partition file under `{data_lake_root}/telegram_messages`, sorted.
pub fn discover_partitions(data_lake_root: &Path) -> Result<Vec<PathBuf>> {
    let base = data_lake_root.join(MESSAGES_DIR);
    let pattern = format!("{}/**/*.json", glob::Pattern::escape(&base.to_string_lossy()));
    let options = MatchOptions {
        require_literal_leading_dot: true,
        ..MatchOptions::new()
    };

    let mut files = Vec::new();
    for entry in glob::glob_with(&pattern, options)? {
        let path = entry?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Hex SHA-256 of `bytes`
#[must_use]
pub fn checksum(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Loads partition files into `raw.telegram_messages`
pub struct RawLoader {
    warehouse: Warehouse,
    mode: LoadMode,
    cancel: Arc<AtomicBool>,
}

impl RawLoader {
    /// Create a loader
    #[must_use]
    pub fn new(warehouse: Warehouse, mode: LoadMode) -> Self {
        Self {
            warehouse,
            mode,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share a cancellation flag; it is checked between files.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.load(Ordering::Relaxed) {
            return Err(PipelineError::Cancelled("raw load".to_string()));
        }
        Ok(())
    }

    /// Load every partition under `data_lake_root`.
    ///
    /// Finding no files is a no-op that never contacts the database. Each
    /// file commits in its own transaction; a malformed file aborts the run
    /// and leaves earlier files committed. Cancellation is honored between
    /// files, so a committed file is never half loaded.
    pub async fn load(&self, data_lake_root: &Path) -> Result<LoadSummary> {
        let files = discover_partitions(data_lake_root)?;
        if files.is_empty() {
            info!(root = %data_lake_root.display(), "No JSON files found in data lake");
            return Ok(LoadSummary::empty());
        }

        self.check_cancelled()?;
        self.warehouse.migrate().await?;

        let mut summary = LoadSummary {
            files_discovered: files.len(),
            ..LoadSummary::default()
        };
        for file in &files {
            if let Err(e) = self.check_cancelled() {
                info!(files = summary.files_loaded, rows = summary.rows_loaded, "Raw load cancelled");
                return Err(e);
            }
            match self.load_file(file).await? {
                Some(rows) => {
                    summary.files_loaded += 1;
                    summary.rows_loaded += rows;
                    info!(file = %file.display(), rows, "Loaded records");
                }
                None => summary.files_skipped += 1,
            }
        }

        metrics::record_load(telegram_messages::TABLE, &summary);
        info!(
            files = summary.files_loaded,
            skipped = summary.files_skipped,
            rows = summary.rows_loaded,
            "Raw message load complete"
        );
        Ok(summary)
    }

    /// Returns `None` when the file was skipped by the watermark.
    async fn load_file(&self, path: &Path) -> Result<Option<u64>> {
        let content = fs::read(path)?;
        let values = parse_partition_values(path, &content)?;
        let mut rows = Vec::with_capacity(values.len());
        for value in values {
            let record: MessageRecord =
                serde_json::from_value(value.clone()).map_err(|source| PipelineError::MalformedPartition {
                    path: path.to_path_buf(),
                    source,
                })?;
            rows.push((record, value));
        }

        let digest = checksum(&content);
        let mut tx = self.warehouse.begin().await?;
        if self.mode == LoadMode::SkipLoaded && db::is_loaded(&mut tx, telegram_messages::TABLE, &digest).await? {
            info!(file = %path.display(), "Already loaded, skipping");
            return Ok(None);
        }

        let loaded_at = Utc::now();
        let inserted = db::insert_messages(&mut tx, &rows, loaded_at).await?;
        if self.mode == LoadMode::SkipLoaded {
            db::record_load(
                &mut tx,
                telegram_messages::TABLE,
                &path.to_string_lossy(),
                &digest,
                inserted,
                loaded_at,
            )
            .await?;
        }
        tx.commit().await?;
        Ok(Some(inserted))
    }
}

/// Loads the scanner's detection table into `raw.image_detections`
pub struct DetectionLoader {
    warehouse: Warehouse,
    mode: LoadMode,
}

impl DetectionLoader {
    /// Create a loader
    #[must_use]
    pub const fn new(warehouse: Warehouse, mode: LoadMode) -> Self {
        Self { warehouse, mode }
    }

    /// Append every row of `csv_path`. A missing file is a reported no-op.
    pub async fn load(&self, csv_path: &Path) -> Result<LoadSummary> {
        if !csv_path.exists() {
            warn!(
                path = %csv_path.display(),
                "Detection output not found. Run the `detect` stage first."
            );
            return Ok(LoadSummary::empty());
        }

        let content = fs::read(csv_path)?;
        let records = read_detections(csv_path)?;
        let digest = checksum(&content);

        self.warehouse.migrate().await?;
        let mut summary = LoadSummary {
            files_discovered: 1,
            ..LoadSummary::default()
        };

        let mut tx = self.warehouse.begin().await?;
        if self.mode == LoadMode::SkipLoaded && db::is_loaded(&mut tx, image_detections::TABLE, &digest).await? {
            info!(path = %csv_path.display(), "Detections already loaded, skipping");
            summary.files_skipped = 1;
            metrics::record_load(image_detections::TABLE, &summary);
            return Ok(summary);
        }

        let loaded_at = Utc::now();
        let inserted = db::insert_detections(&mut tx, &records, loaded_at).await?;
        if self.mode == LoadMode::SkipLoaded {
            db::record_load(
                &mut tx,
                image_detections::TABLE,
                &csv_path.to_string_lossy(),
                &digest,
                inserted,
                loaded_at,
            )
            .await?;
        }
        tx.commit().await?;

        summary.files_loaded = 1;
        summary.rows_loaded = inserted;
        metrics::record_load(image_detections::TABLE, &summary);
        info!(rows = inserted, table = image_detections::QUALIFIED, "Loaded detections");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_discover_partitions_recurses_and_sorts() {
        let dir = tempdir().unwrap();
        let base = dir.path().join(MESSAGES_DIR);
        for rel in ["2024-01-06/chemed.json", "2024-01-05/chemed.json", "2024-01-05/tikvahpharma.json"] {
            let path = base.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, "[]").unwrap();
        }
        fs::write(base.join("2024-01-05/notes.txt"), "x").unwrap();
        fs::write(base.join("2024-01-05/chemed.json.tmp"), "[").unwrap();

        let files = discover_partitions(dir.path()).unwrap();

        let names: Vec<String> = files
            .iter()
            .map(|p| p.strip_prefix(&base).unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec!["2024-01-05/chemed.json", "2024-01-05/tikvahpharma.json", "2024-01-06/chemed.json"]
        );
    }

    #[test]
    fn test_discover_partitions_missing_root_is_empty() {
        let dir = tempdir().unwrap();
        assert!(discover_partitions(&dir.path().join("nope")).unwrap().is_empty());
    }

    #[test]
    fn test_checksum_is_stable() {
        assert_eq!(checksum(b"[]"), checksum(b"[]"));
        assert_ne!(checksum(b"[]"), checksum(b"[ ]"));
        assert_eq!(checksum(b"").len(), 64);
    }
}
