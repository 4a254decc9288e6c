//! Unit tests for validation.rs module

use chrono::{Duration, TimeZone, Utc};
use telegram_warehouse::validation::InputValidator;
use telegram_warehouse::ScrapeBounds;

#[test]
fn test_validate_channel_name_valid() {
    assert!(InputValidator::validate_channel_name("chemed").is_ok());
    assert!(InputValidator::validate_channel_name("@lobelia4cosmetics").is_ok());
}

#[test]
fn test_validate_channel_name_empty() {
    assert!(InputValidator::validate_channel_name("").is_err());
    assert!(InputValidator::validate_channel_name("  @ ").is_err());
}

#[test]
fn test_validate_channel_name_invalid_chars() {
    assert!(InputValidator::validate_channel_name("tikvah pharma").is_err());
    assert!(InputValidator::validate_channel_name("t.me/chemed").is_err());
}

#[test]
fn test_validate_channel_name_too_long() {
    assert!(InputValidator::validate_channel_name(&"a".repeat(65)).is_err());
    assert!(InputValidator::validate_channel_name(&"a".repeat(64)).is_ok());
}

#[test]
fn test_parse_timestamp_formats() {
    let midnight = Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap();
    assert_eq!(InputValidator::parse_timestamp("2024-01-05").unwrap(), midnight);
    assert_eq!(InputValidator::parse_timestamp("2024-01-05T00:00:00").unwrap(), midnight);
    assert_eq!(InputValidator::parse_timestamp("2024-01-05T03:00:00+03:00").unwrap(), midnight);
}

#[test]
fn test_parse_timestamp_invalid() {
    assert!(InputValidator::parse_timestamp("05/01/2024").is_err());
    assert!(InputValidator::parse_timestamp("").is_err());
}

#[test]
fn test_bounds_since_after_until() {
    let now = Utc::now();
    let bounds = ScrapeBounds {
        limit: None,
        since: Some(now),
        until: Some(now - Duration::days(1)),
    };
    assert!(InputValidator::validate_bounds(&bounds).is_err());
}

#[test]
fn test_bounds_zero_limit() {
    let bounds = ScrapeBounds {
        limit: Some(0),
        ..ScrapeBounds::default()
    };
    assert!(InputValidator::validate_bounds(&bounds).is_err());
}

#[test]
fn test_parse_bounds_equal_endpoints() {
    let bounds = InputValidator::parse_bounds(Some(1), Some("2024-01-05"), Some("2024-01-05")).unwrap();
    assert_eq!(bounds.since, bounds.until);
    assert_eq!(bounds.limit, Some(1));
}
