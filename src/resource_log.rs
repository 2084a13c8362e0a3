// SQLite resource log. Append-only; rows are immutable once written.
// Uses sqlx for async + connection pooling. Timestamps are UTC unix seconds,
// indexed so closed-range scans stay cheap as the table grows.

use chrono::{DateTime, TimeZone, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use std::path::Path;
use std::str::FromStr;
use tracing::instrument;

use crate::models::{DISK_SLOTS, ResourceReading, ResourceSample};

const SELECT_COLUMNS: &str = "id, timestamp, cpu_percent, memory_percent, \
     disk1_percent, disk2_percent, disk3_percent, disk4_percent, disk5_percent, \
     load_avg_1min, load_avg_5min, load_avg_15min";

pub struct ResourceLog {
    pool: SqlitePool,
}

impl ResourceLog {
    pub async fn connect(path: &str, max_pool_size: u32) -> anyhow::Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5))
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_pool_size)
            .connect_with(opts)
            .await?;
        Ok(Self { pool })
    }

    pub async fn init(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS resource_samples (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp INTEGER NOT NULL,
                cpu_percent REAL NOT NULL,
                memory_percent REAL NOT NULL,
                disk1_percent REAL NOT NULL,
                disk2_percent REAL NOT NULL,
                disk3_percent REAL NOT NULL,
                disk4_percent REAL NOT NULL,
                disk5_percent REAL NOT NULL,
                load_avg_1min REAL NOT NULL,
                load_avg_5min REAL NOT NULL,
                load_avg_15min REAL NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_resource_samples_timestamp ON resource_samples(timestamp, id)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Append with a server-assigned timestamp (now, whole seconds).
    pub async fn append(&self, reading: &ResourceReading) -> anyhow::Result<ResourceSample> {
        self.append_at(reading, Utc::now()).await
    }

    /// Append with an explicit timestamp; sub-second precision is dropped.
    #[instrument(skip(self, reading), fields(repo = "resource_log", operation = "append"))]
    pub async fn append_at(
        &self,
        reading: &ResourceReading,
        timestamp: DateTime<Utc>,
    ) -> anyhow::Result<ResourceSample> {
        let secs = timestamp.timestamp();
        let d = &reading.disk_percent;
        let result = sqlx::query(
            "INSERT INTO resource_samples (timestamp, cpu_percent, memory_percent, disk1_percent, disk2_percent, disk3_percent, disk4_percent, disk5_percent, load_avg_1min, load_avg_5min, load_avg_15min) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(secs)
        .bind(reading.cpu_percent)
        .bind(reading.memory_percent)
        .bind(d[0])
        .bind(d[1])
        .bind(d[2])
        .bind(d[3])
        .bind(d[4])
        .bind(reading.load_avg_1min)
        .bind(reading.load_avg_5min)
        .bind(reading.load_avg_15min)
        .execute(&self.pool)
        .await?;

        Ok(ResourceSample {
            id: result.last_insert_rowid(),
            timestamp: from_unix_secs(secs)?,
            reading: reading.clone(),
        })
    }

    /// Samples with `start <= timestamp <= end`, ascending by (timestamp, id).
    /// The connection is taken from the pool for this call only.
    #[instrument(skip(self), fields(repo = "resource_log", operation = "query"))]
    pub async fn query(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<ResourceSample>> {
        if start > end {
            return Ok(Vec::new());
        }
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query(&format!(
            "SELECT {} FROM resource_samples WHERE timestamp >= $1 AND timestamp <= $2 ORDER BY timestamp ASC, id ASC",
            SELECT_COLUMNS
        ))
        .bind(start.timestamp())
        .bind(end.timestamp())
        .fetch_all(&mut *conn)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(Self::parse_row(&row)?);
        }
        Ok(out)
    }

    /// Delete rows strictly older than `cutoff`. Only called when a retention
    /// period is configured.
    #[instrument(skip(self), fields(repo = "resource_log", operation = "prune_before"))]
    pub async fn prune_before(&self, cutoff: DateTime<Utc>) -> anyhow::Result<u64> {
        let r = sqlx::query("DELETE FROM resource_samples WHERE timestamp < $1")
            .bind(cutoff.timestamp())
            .execute(&self.pool)
            .await?;
        Ok(r.rows_affected())
    }

    /// Reclaim space after deletes.
    #[instrument(skip(self), fields(repo = "resource_log", operation = "vacuum"))]
    pub async fn vacuum(&self) -> anyhow::Result<()> {
        sqlx::query("VACUUM").execute(&self.pool).await?;
        Ok(())
    }

    /// Close the pool; waits for checked-out connections to come back.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn parse_row(row: &SqliteRow) -> anyhow::Result<ResourceSample> {
        let id: i64 = row.try_get("id")?;
        let timestamp: i64 = row.try_get("timestamp")?;
        let mut disk_percent = [0.0; DISK_SLOTS];
        for (i, slot) in disk_percent.iter_mut().enumerate() {
            *slot = row.try_get(format!("disk{}_percent", i + 1).as_str())?;
        }
        Ok(ResourceSample {
            id,
            timestamp: from_unix_secs(timestamp)?,
            reading: ResourceReading {
                cpu_percent: row.try_get("cpu_percent")?,
                memory_percent: row.try_get("memory_percent")?,
                disk_percent,
                load_avg_1min: row.try_get("load_avg_1min")?,
                load_avg_5min: row.try_get("load_avg_5min")?,
                load_avg_15min: row.try_get("load_avg_15min")?,
            },
        })
    }
}

fn from_unix_secs(secs: i64) -> anyhow::Result<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| anyhow::anyhow!("timestamp out of range: {}", secs))
}
