//! Image categorization from detected object classes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Label the detector uses for people
pub const PERSON_CLASS: &str = "person";

/// Labels treated as product packaging
pub const PRODUCT_CLASSES: [&str; 5] = ["bottle", "cup", "bowl", "box", "container"];

/// Semantic bucket for an image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageCategory {
    /// A person together with a product
    Promotional,
    /// A product without a person
    ProductDisplay,
    /// A person without a product
    Lifestyle,
    /// Neither
    Other,
}

impl ImageCategory {
    /// All categories, in report order
    pub const ALL: [Self; 4] = [Self::Promotional, Self::ProductDisplay, Self::Lifestyle, Self::Other];

    /// Stored name of the category
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Promotional => "promotional",
            Self::ProductDisplay => "product_display",
            Self::Lifestyle => "lifestyle",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ImageCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| format!("unknown image category: {s}"))
    }
}

/// Derive a category from a set of detected labels.
///
/// Only the presence of a person label and of any product label matters;
/// order, duplicates and confidences are irrelevant.
pub fn categorize<'a, I>(labels: I) -> ImageCategory
where
    I: IntoIterator<Item = &'a str>,
{
    let mut has_person = false;
    let mut has_product = false;
    for label in labels {
        has_person |= label == PERSON_CLASS;
        has_product |= PRODUCT_CLASSES.contains(&label);
    }

    match (has_person, has_product) {
        (true, true) => ImageCategory::Promotional,
        (false, true) => ImageCategory::ProductDisplay,
        (true, false) => ImageCategory::Lifestyle,
        (false, false) => ImageCategory::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truth_table() {
        assert_eq!(categorize(["person", "bottle"]), ImageCategory::Promotional);
        assert_eq!(categorize(["cup"]), ImageCategory::ProductDisplay);
        assert_eq!(categorize(["person"]), ImageCategory::Lifestyle);
        assert_eq!(categorize(["dog", "car"]), ImageCategory::Other);
        assert_eq!(categorize(std::iter::empty()), ImageCategory::Other);
    }

    #[test]
    fn test_order_and_duplicates_ignored() {
        assert_eq!(categorize(["box", "person", "box"]), ImageCategory::Promotional);
        assert_eq!(categorize(["person", "person"]), ImageCategory::Lifestyle);
    }

    #[test]
    fn test_labels_are_case_sensitive() {
        assert_eq!(categorize(["Person", "Bottle"]), ImageCategory::Other);
    }

    #[test]
    fn test_round_trip_names() {
        for category in ImageCategory::ALL {
            assert_eq!(category.as_str().parse::<ImageCategory>().unwrap(), category);
        }
        assert!("advert".parse::<ImageCategory>().is_err());
    }
}
