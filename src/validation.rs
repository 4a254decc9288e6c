use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::models::ScrapeBounds;

/// Validation utilities for command-line input
#[derive(Debug, Copy, Clone)]
pub struct InputValidator;

impl InputValidator {
    /// Validate a channel name or handle
    pub fn validate_channel_name(name: &str) -> Result<()> {
        let trimmed = name.trim().trim_start_matches('@');
        if trimmed.is_empty() {
            return Err(anyhow!("Channel name cannot be empty"));
        }

        if trimmed.len() > 64 {
            return Err(anyhow!("Channel name too long (max 64 characters)"));
        }

        if trimmed.contains('/') || trimmed.contains('?') || trimmed.chars().any(char::is_whitespace) {
            return Err(anyhow!("Channel name contains invalid characters: {name}"));
        }

        Ok(())
    }

    /// Parse a bound timestamp.
    ///
    /// Accepts RFC 3339 (`2024-01-01T00:00:00+03:00`), a naive
    /// `2024-01-01T00:00:00` or a bare `2024-01-01`; naive values are UTC.
    pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
        let raw = raw.trim();
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Ok(ts.with_timezone(&Utc));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
            return Ok(naive.and_utc());
        }
        if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
                return Ok(midnight.and_utc());
            }
        }
        Err(anyhow!(
            "Invalid timestamp {raw:?}, use ISO format such as 2024-01-01T00:00:00"
        ))
    }

    /// Validate scrape bounds
    pub fn validate_bounds(bounds: &ScrapeBounds) -> Result<()> {
        if bounds.limit == Some(0) {
            return Err(anyhow!("Limit must be greater than 0"));
        }

        if let (Some(since), Some(until)) = (bounds.since, bounds.until) {
            if since > until {
                return Err(anyhow!("--since ({since}) cannot be after --until ({until})"));
            }
        }

        if let Some(since) = bounds.since {
            if since > Utc::now() {
                tracing::warn!(%since, "--since is in the future; nothing will be scraped");
            }
        }

        Ok(())
    }

    /// Build and validate bounds from raw command-line values
    pub fn parse_bounds(limit: Option<usize>, since: Option<&str>, until: Option<&str>) -> Result<ScrapeBounds> {
        let bounds = ScrapeBounds {
            limit,
            since: since.map(Self::parse_timestamp).transpose()?,
            until: until.map(Self::parse_timestamp).transpose()?,
        };
        Self::validate_bounds(&bounds)?;
        Ok(bounds)
    }
}
