use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder, Transaction};
use tracing::debug;

use crate::error::Result;
use crate::models::{DetectionRecord, MessageRecord};
use crate::schema::{image_detections, load_ledger, telegram_messages};

/// Rows per multi-row INSERT; keeps binds well under the Postgres limit of 65535
const INSERT_BATCH: usize = 1000;

/// Handle on the Postgres warehouse
#[derive(Clone)]
pub struct Warehouse {
    pool: PgPool,
}

impl Warehouse {
    /// Connect a pool to `database_url`
    pub async fn connect(database_url: &str, max_connections: u32, acquire_timeout: Duration) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Build a pool that only connects on first use
    pub fn connect_lazy(database_url: &str, max_connections: u32, acquire_timeout: Duration) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect_lazy(database_url)?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the raw schema and tables if they do not exist
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Start a transaction; dropping it without commit rolls back
    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>> {
        Ok(self.pool.begin().await?)
    }

    /// Count the rows of a schema-qualified table
    pub async fn count_rows(&self, qualified_table: &str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {qualified_table}");
        let count = sqlx::query_scalar::<_, i64>(&sql).fetch_one(&self.pool).await?;
        Ok(count)
    }
}

/// Append message rows, each paired with its original JSON object
pub async fn insert_messages(
    conn: &mut PgConnection,
    rows: &[(MessageRecord, serde_json::Value)],
    loaded_at: DateTime<Utc>,
) -> Result<u64> {
    let mut inserted = 0;
    for chunk in rows.chunks(INSERT_BATCH) {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "INSERT INTO {} ({}) ",
            telegram_messages::QUALIFIED,
            telegram_messages::COLUMNS.join(", ")
        ));
        builder.push_values(chunk, |mut b, (record, raw)| {
            b.push_bind(record.message_id)
                .push_bind(record.channel_name.clone())
                .push_bind(record.message_date.with_timezone(&Utc))
                .push_bind(record.message_text.clone())
                .push_bind(record.has_media)
                .push_bind(record.image_path.clone())
                .push_bind(record.views)
                .push_bind(record.forwards)
                .push_bind(Json(raw.clone()))
                .push_bind(loaded_at);
        });
        inserted += builder.build().execute(&mut *conn).await?.rows_affected();
    }
    debug!(rows = inserted, table = telegram_messages::QUALIFIED, "Inserted rows");
    Ok(inserted)
}

/// Append detection rows
pub async fn insert_detections(
    conn: &mut PgConnection,
    rows: &[DetectionRecord],
    loaded_at: DateTime<Utc>,
) -> Result<u64> {
    let mut inserted = 0;
    for chunk in rows.chunks(INSERT_BATCH) {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "INSERT INTO {} ({}) ",
            image_detections::QUALIFIED,
            image_detections::COLUMNS.join(", ")
        ));
        builder.push_values(chunk, |mut b, record| {
            b.push_bind(record.message_id)
                .push_bind(record.image_path.clone())
                .push_bind(record.detected_classes.clone())
                .push_bind(record.confidence_score)
                .push_bind(record.image_category.to_string())
                .push_bind(loaded_at);
        });
        inserted += builder.build().execute(&mut *conn).await?.rows_affected();
    }
    debug!(rows = inserted, table = image_detections::QUALIFIED, "Inserted rows");
    Ok(inserted)
}

/// True if a file with `checksum` was already committed into `target_table`
pub async fn is_loaded(conn: &mut PgConnection, target_table: &str, checksum: &str) -> Result<bool> {
    let sql = format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = $1 AND {} = $2)",
        load_ledger::QUALIFIED,
        load_ledger::TARGET_TABLE,
        load_ledger::CHECKSUM
    );
    let exists = sqlx::query_scalar::<_, bool>(&sql)
        .bind(target_table)
        .bind(checksum)
        .fetch_one(&mut *conn)
        .await?;
    Ok(exists)
}

/// Record a committed file in the watermark ledger
pub async fn record_load(
    conn: &mut PgConnection,
    target_table: &str,
    file_path: &str,
    checksum: &str,
    row_count: u64,
    loaded_at: DateTime<Utc>,
) -> Result<()> {
    let sql = format!(
        "INSERT INTO {} ({}, {}, {}, {}, {}) VALUES ($1, $2, $3, $4, $5) ON CONFLICT DO NOTHING",
        load_ledger::QUALIFIED,
        load_ledger::TARGET_TABLE,
        load_ledger::FILE_PATH,
        load_ledger::CHECKSUM,
        load_ledger::ROW_COUNT,
        load_ledger::LOADED_AT
    );
    sqlx::query(&sql)
        .bind(target_table)
        .bind(file_path)
        .bind(checksum)
        .bind(i64::try_from(row_count).unwrap_or(i64::MAX))
        .bind(loaded_at)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
