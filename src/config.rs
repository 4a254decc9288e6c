use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::loader::LoadMode;
use crate::partition::slugify;

/// Application configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub scraper: ScraperConfig,
    pub detection: DetectionConfig,
    pub transform: TransformConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Postgres connection string; required by every warehouse stage
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout_secs: u64,
    pub load_mode: LoadMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file_path: Option<String>,
    pub format: String, // "json" or "text"
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    /// Platform web-preview base URL
    pub base_url: String,
    /// Channel allow-list
    pub channels: Vec<String>,
    pub data_lake_path: String,
    pub images_path: String,
    pub request_timeout_secs: u64,
    pub max_concurrent_channels: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Model weights reference handed to the detector command
    pub model: String,
    /// Command template with `{model}` and `{image}` placeholders
    pub command: String,
    pub output_csv: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformConfig {
    pub dbt_binary: String,
    pub project_dir: String,
    pub profiles_dir: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: None,
                max_connections: 5,
                connection_timeout_secs: 30,
                load_mode: LoadMode::Append,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file_path: Some("logs/pipeline.log".to_string()),
                format: "text".to_string(),
            },
            scraper: ScraperConfig {
                base_url: "https://t.me".to_string(),
                channels: vec![
                    "chemed".to_string(),
                    "lobelia4cosmetics".to_string(),
                    "tikvahpharma".to_string(),
                ],
                data_lake_path: "data/raw".to_string(),
                images_path: "data/raw/images".to_string(),
                request_timeout_secs: 30,
                max_concurrent_channels: 1,
            },
            detection: DetectionConfig {
                model: "yolov8n.pt".to_string(),
                command: "yolo-detect --model {model} --json {image}".to_string(),
                output_csv: "data/processed/yolo_detections.csv".to_string(),
            },
            transform: TransformConfig {
                dbt_binary: "dbt".to_string(),
                project_dir: "medical_warehouse".to_string(),
                profiles_dir: "medical_warehouse".to_string(),
            },
        }
    }
}

/// Flat environment names from the original deployment, mapped onto config keys
const ENV_OVERRIDES: [(&str, &str); 5] = [
    ("DATABASE_URL", "database.url"),
    ("DATA_LAKE_PATH", "scraper.data_lake_path"),
    ("IMAGES_PATH", "scraper.images_path"),
    ("YOLO_MODEL", "detection.model"),
    ("YOLO_OUTPUT_CSV", "detection.output_csv"),
];

impl AppConfig {
    /// Load configuration from multiple sources with precedence
    pub fn load() -> Result<Self> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::load_from(&vars)
    }

    /// Load with an explicit environment, for callers that do not want the process env
    pub fn load_from(env: &HashMap<String, String>) -> Result<Self> {
        let mut builder = Config::builder()
            // Start with default values
            .add_source(Config::try_from(&Self::default())?)
            // Add config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(File::with_name("config").required(false))
            // Add environment variables with prefix
            .add_source(
                Environment::with_prefix("WAREHOUSE")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("scraper.channels")
                    .source(Some(env.clone().into_iter().collect())),
            );

        for (var, key) in ENV_OVERRIDES {
            if let Some(value) = env.get(var).filter(|v| !v.trim().is_empty()) {
                builder = builder.set_override(key, value.clone())?;
            }
        }

        let mut app_config: Self = builder.build()?.try_deserialize()?;

        if let Some(raw) = env.get("TELEGRAM_CHANNELS") {
            app_config.scraper.channels = parse_channels(raw);
        }

        app_config.validate()?;
        Ok(app_config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(PipelineError::Config(format!(
                "Invalid log level: {}. Must be one of: {:?}",
                self.logging.level, valid_levels
            )));
        }

        let valid_formats = ["text", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(PipelineError::Config(format!(
                "Invalid log format: {}. Must be one of: {:?}",
                self.logging.format, valid_formats
            )));
        }

        if self.database.max_connections == 0 {
            return Err(PipelineError::Config("max_connections must be greater than 0".to_string()));
        }

        if self.scraper.base_url.trim().is_empty() {
            return Err(PipelineError::Config("scraper.base_url must be set".to_string()));
        }
        if self.scraper.channels.is_empty() {
            return Err(PipelineError::Config("no channels configured (TELEGRAM_CHANNELS)".to_string()));
        }
        if self.scraper.request_timeout_secs == 0 {
            return Err(PipelineError::Config("request_timeout_secs must be greater than 0".to_string()));
        }
        if self.scraper.max_concurrent_channels == 0 {
            return Err(PipelineError::Config("max_concurrent_channels must be greater than 0".to_string()));
        }

        // Two channels sharing a slug would write the same partition files
        let mut slugs: HashMap<String, &str> = HashMap::new();
        for channel in &self.scraper.channels {
            let slug = slugify(channel);
            if slug.is_empty() {
                return Err(PipelineError::Config(format!("channel name has no usable characters: {channel:?}")));
            }
            if let Some(other) = slugs.insert(slug.clone(), channel) {
                return Err(PipelineError::Config(format!(
                    "channels {other:?} and {channel:?} share the partition slug {slug:?}"
                )));
            }
        }

        Ok(())
    }

    /// Database URL, or a configuration error when it is missing
    pub fn database_url(&self) -> Result<&str> {
        self.database
            .url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| PipelineError::Config("DATABASE_URL is not set".to_string()))
    }

    pub fn data_lake_path(&self) -> PathBuf {
        PathBuf::from(&self.scraper.data_lake_path)
    }

    pub fn images_path(&self) -> PathBuf {
        PathBuf::from(&self.scraper.images_path)
    }

    pub fn detection_output(&self) -> PathBuf {
        PathBuf::from(&self.detection.output_csv)
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.scraper.request_timeout_secs)
    }

    pub const fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.database.connection_timeout_secs)
    }
}

/// Split a comma-separated channel list, dropping blanks
#[must_use]
pub fn parse_channels(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.scraper.data_lake_path, "data/raw");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.scraper.max_concurrent_channels, 1);
    }

    #[test]
    fn test_config_validation() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_config() {
        let mut config = AppConfig::default();
        config.scraper.max_concurrent_channels = 0;
        assert!(config.validate().is_err());
    }
}
