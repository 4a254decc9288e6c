//! Property tests for partition keys and image categorization

use chrono::{DateTime, FixedOffset, TimeZone};
use proptest::prelude::*;
use std::path::Path;
use telegram_warehouse::categorize::PRODUCT_CLASSES;
use telegram_warehouse::partition::slugify;
use telegram_warehouse::{categorize, ImageCategory, PartitionKey};

fn timestamp(secs: i64, offset_hours: i32) -> DateTime<FixedOffset> {
    let offset = FixedOffset::east_opt(offset_hours * 3600).unwrap();
    offset.timestamp_opt(secs, 0).unwrap()
}

proptest! {
    #[test]
    fn key_depends_only_on_date_and_channel(
        secs in 1_500_000_000i64..1_900_000_000,
        offset in -12i32..=14,
        channel in "[A-Za-z][A-Za-z0-9 _.-]{0,20}",
    ) {
        let ts = timestamp(secs, offset);
        let first = PartitionKey::for_message(&ts, &channel);
        let second = PartitionKey::for_message(&ts, &channel);
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first.date, ts.date_naive());
    }

    #[test]
    fn slug_is_path_safe(channel in "[ -~]{0,30}") {
        let slug = slugify(&channel);
        prop_assert!(!slug.contains('/'));
        prop_assert!(!slug.starts_with('_'));
        prop_assert!(!slug.ends_with('_'));
        prop_assert!(!slug.contains("__"));
        prop_assert_eq!(slugify(&slug), slug.clone());
    }

    #[test]
    fn category_ignores_order_and_duplicates(
        mut labels in prop::collection::vec(
            prop::sample::select(vec!["person", "bottle", "cup", "bowl", "box", "container", "car", "dog"]),
            0..8,
        ),
    ) {
        let expected = categorize(labels.iter().copied());
        labels.reverse();
        let doubled: Vec<&str> = labels.iter().chain(labels.iter()).copied().collect();
        prop_assert_eq!(categorize(doubled.iter().copied()), expected);
    }

    #[test]
    fn category_quadrants(person in any::<bool>(), product in 0usize..=PRODUCT_CLASSES.len(), noise in any::<bool>()) {
        let mut labels: Vec<&str> = Vec::new();
        if person {
            labels.push("person");
        }
        if product < PRODUCT_CLASSES.len() {
            labels.push(PRODUCT_CLASSES[product]);
        }
        if noise {
            labels.push("traffic light");
        }

        let expected = match (person, product < PRODUCT_CLASSES.len()) {
            (true, true) => ImageCategory::Promotional,
            (false, true) => ImageCategory::ProductDisplay,
            (true, false) => ImageCategory::Lifestyle,
            (false, false) => ImageCategory::Other,
        };
        prop_assert_eq!(categorize(labels), expected);
    }
}

#[test]
fn test_partition_path_layout() {
    let ts = DateTime::parse_from_rfc3339("2024-01-05T23:30:00+03:00").unwrap();
    let key = PartitionKey::for_message(&ts, "Tikvah Pharma");
    assert_eq!(
        key.path(Path::new("data/raw")),
        Path::new("data/raw/telegram_messages/2024-01-05/tikvah_pharma.json")
    );
}

#[test]
fn test_partition_date_uses_source_offset() {
    // 23:30 at +03:00 is still 2024-01-05 locally, 20:30 UTC
    let late = DateTime::parse_from_rfc3339("2024-01-05T23:30:00+03:00").unwrap();
    assert_eq!(PartitionKey::for_message(&late, "chemed").to_string(), "2024-01-05/chemed");
}
