//! Warehouse schema definitions
//!
//! Constants for the raw-layer schema, tables and columns created by the
//! embedded migrations in `migrations/`.

/// Schema holding the landing-zone tables
pub const RAW_SCHEMA: &str = "raw";

/// Scraped messages table schema
pub mod telegram_messages {
    /// Table name
    pub const TABLE: &str = "telegram_messages";
    /// Schema-qualified table name
    pub const QUALIFIED: &str = "raw.telegram_messages";
    /// Platform message id column
    pub const MESSAGE_ID: &str = "message_id";
    /// Channel name column
    pub const CHANNEL_NAME: &str = "channel_name";
    /// Capture timestamp column
    pub const MESSAGE_DATE: &str = "message_date";
    /// Message text column
    pub const MESSAGE_TEXT: &str = "message_text";
    /// Media flag column
    pub const HAS_MEDIA: &str = "has_media";
    /// Downloaded image path column
    pub const IMAGE_PATH: &str = "image_path";
    /// View count column
    pub const VIEWS: &str = "views";
    /// Forward count column
    pub const FORWARDS: &str = "forwards";
    /// Original partition object column
    pub const RAW_JSON: &str = "raw_json";
    /// Load timestamp column
    pub const LOADED_AT: &str = "loaded_at";

    /// Insert column order
    pub const COLUMNS: [&str; 10] = [
        MESSAGE_ID,
        CHANNEL_NAME,
        MESSAGE_DATE,
        MESSAGE_TEXT,
        HAS_MEDIA,
        IMAGE_PATH,
        VIEWS,
        FORWARDS,
        RAW_JSON,
        LOADED_AT,
    ];
}

/// Image detections table schema
pub mod image_detections {
    /// Table name
    pub const TABLE: &str = "image_detections";
    /// Schema-qualified table name
    pub const QUALIFIED: &str = "raw.image_detections";
    /// Message id column
    pub const MESSAGE_ID: &str = "message_id";
    /// Image path column
    pub const IMAGE_PATH: &str = "image_path";
    /// Comma-joined labels column
    pub const DETECTED_CLASSES: &str = "detected_classes";
    /// Max confidence column
    pub const CONFIDENCE_SCORE: &str = "confidence_score";
    /// Derived category column
    pub const IMAGE_CATEGORY: &str = "image_category";
    /// Load timestamp column
    pub const LOADED_AT: &str = "loaded_at";

    /// Insert column order
    pub const COLUMNS: [&str; 6] = [
        MESSAGE_ID,
        IMAGE_PATH,
        DETECTED_CLASSES,
        CONFIDENCE_SCORE,
        IMAGE_CATEGORY,
        LOADED_AT,
    ];
}

/// Load watermark ledger schema
pub mod load_ledger {
    /// Schema-qualified table name
    pub const QUALIFIED: &str = "raw.load_ledger";
    /// Target table the file was loaded into
    pub const TARGET_TABLE: &str = "target_table";
    /// Source file path
    pub const FILE_PATH: &str = "file_path";
    /// SHA-256 of the file content
    pub const CHECKSUM: &str = "checksum";
    /// Rows appended from the file
    pub const ROW_COUNT: &str = "row_count";
    /// Load timestamp column
    pub const LOADED_AT: &str = "loaded_at";
}
