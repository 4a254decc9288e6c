//! Unit tests for config.rs module

use std::collections::HashMap;
use telegram_warehouse::config::{parse_channels, AppConfig};
use telegram_warehouse::{LoadMode, PipelineError};

fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect()
}

#[test]
fn test_defaults_without_environment() {
    let config = AppConfig::load_from(&HashMap::new()).unwrap();
    assert_eq!(config.scraper.channels, vec!["chemed", "lobelia4cosmetics", "tikvahpharma"]);
    assert_eq!(config.scraper.data_lake_path, "data/raw");
    assert_eq!(config.scraper.images_path, "data/raw/images");
    assert_eq!(config.detection.output_csv, "data/processed/yolo_detections.csv");
    assert_eq!(config.database.load_mode, LoadMode::Append);
}

#[test]
fn test_missing_database_url_is_config_error() {
    let config = AppConfig::load_from(&HashMap::new()).unwrap();
    assert!(matches!(config.database_url(), Err(PipelineError::Config(_))));

    let blank = AppConfig::load_from(&env(&[("DATABASE_URL", "   ")])).unwrap();
    assert!(blank.database_url().is_err());
}

#[test]
fn test_flat_environment_overrides() {
    let config = AppConfig::load_from(&env(&[
        ("DATABASE_URL", "postgres://etl@localhost/medical"),
        ("DATA_LAKE_PATH", "/srv/lake"),
        ("IMAGES_PATH", "/srv/images"),
        ("YOLO_MODEL", "yolov8s.pt"),
        ("YOLO_OUTPUT_CSV", "/srv/out/detections.csv"),
    ]))
    .unwrap();

    assert_eq!(config.database_url().unwrap(), "postgres://etl@localhost/medical");
    assert_eq!(config.scraper.data_lake_path, "/srv/lake");
    assert_eq!(config.scraper.images_path, "/srv/images");
    assert_eq!(config.detection.model, "yolov8s.pt");
    assert_eq!(config.detection.output_csv, "/srv/out/detections.csv");
}

#[test]
fn test_prefixed_environment_overrides() {
    let config = AppConfig::load_from(&env(&[("WAREHOUSE__SCRAPER__MAX_CONCURRENT_CHANNELS", "3")])).unwrap();
    assert_eq!(config.scraper.max_concurrent_channels, 3);
}

#[test]
fn test_prefixed_channel_list_is_split() {
    let config = AppConfig::load_from(&env(&[("WAREHOUSE__SCRAPER__CHANNELS", "chemed,tikvahpharma")])).unwrap();
    assert_eq!(config.scraper.channels, vec!["chemed", "tikvahpharma"]);
}

#[test]
fn test_channel_list_from_environment() {
    let config = AppConfig::load_from(&env(&[("TELEGRAM_CHANNELS", " chemed, ,tikvahpharma ,")])).unwrap();
    assert_eq!(config.scraper.channels, vec!["chemed", "tikvahpharma"]);
}

#[test]
fn test_empty_channel_list_is_fatal() {
    let err = AppConfig::load_from(&env(&[("TELEGRAM_CHANNELS", " , ")])).unwrap_err();
    assert!(matches!(err, PipelineError::Config(_)));
}

#[test]
fn test_colliding_slugs_rejected() {
    let err = AppConfig::load_from(&env(&[("TELEGRAM_CHANNELS", "Tikvah Pharma,tikvah-pharma")])).unwrap_err();
    assert!(err.to_string().contains("tikvah_pharma"));
}

#[test]
fn test_invalid_log_format_rejected() {
    let mut config = AppConfig::default();
    config.logging.format = "xml".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_parse_channels() {
    assert_eq!(parse_channels("a,b"), vec!["a", "b"]);
    assert!(parse_channels("").is_empty());
}
