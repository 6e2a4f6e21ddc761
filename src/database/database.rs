use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use log::info;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio_rusqlite::Connection;

use super::store::HistoryStore;
use crate::food::models::ScanRecord;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] tokio_rusqlite::Error),
    #[error("Database connection error: {0}")]
    Connection(String),
    #[error("Corrupt scan record {id}: {reason}")]
    Corrupt { id: String, reason: String },
}

type ScanRow = (String, String, String, String, String, Option<String>);

#[derive(Clone)]
pub struct Database {
    conn: Arc<Connection>,
}

impl Database {
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| DatabaseError::Connection(e.to_string()))?;
            }
        }

        let conn = Connection::open(path)
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;

        Self::from_connection(conn).await
    }

    pub async fn in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;

        Self::from_connection(conn).await
    }

    async fn from_connection(conn: Connection) -> Result<Self, DatabaseError> {
        let db = Self { conn: Arc::new(conn) };
        db.initialize().await?;
        Ok(db)
    }

    async fn initialize(&self) -> Result<(), DatabaseError> {
        self.conn.call(|conn| {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS scan_history (
                    id TEXT PRIMARY KEY,
                    timestamp TEXT NOT NULL,
                    food_item TEXT NOT NULL,
                    nutrition_data TEXT NOT NULL,
                    confidence TEXT NOT NULL,
                    image_url TEXT
                );
                CREATE INDEX IF NOT EXISTS idx_scan_history_timestamp
                    ON scan_history (timestamp DESC);"
            )?;
            Ok(())
        })
        .await?;

        info!("Database initialized successfully");
        Ok(())
    }

    pub async fn save_scan(&self, record: &ScanRecord) -> Result<(), DatabaseError> {
        let nutrition_data = serde_json::to_string(&record.nutrition_data).map_err(|e| DatabaseError::Corrupt {
            id: record.id.clone(),
            reason: e.to_string(),
        })?;
        let values = [
            record.id.clone(),
            format_timestamp(&record.timestamp),
            record.food_item.clone(),
            nutrition_data,
            record.confidence.to_string(),
        ];

        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO scan_history (id, timestamp, food_item, nutrition_data, confidence)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    [&values[0], &values[1], &values[2], &values[3], &values[4]],
                )?;
                Ok(())
            })
            .await?;

        Ok(())
    }

    pub async fn get_recent_scans(&self, limit: i64) -> Result<Vec<ScanRecord>, DatabaseError> {
        let rows = self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, timestamp, food_item, nutrition_data, confidence, image_url
                     FROM scan_history
                     ORDER BY timestamp DESC, rowid DESC
                     LIMIT ?"
                )?;

                let rows = stmt.query_map([limit], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, Option<String>>(5)?,
                    ))
                })?;

                let mut scans: Vec<ScanRow> = Vec::new();
                for row in rows {
                    scans.push(row?);
                }

                Ok(scans)
            })
            .await?;

        rows.into_iter().map(record_from_row).collect()
    }
}

#[async_trait]
impl HistoryStore for Database {
    async fn append(&self, record: &ScanRecord) -> Result<(), DatabaseError> {
        self.save_scan(record).await
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<ScanRecord>, DatabaseError> {
        self.get_recent_scans(i64::try_from(limit).unwrap_or(i64::MAX)).await
    }
}

// Fixed width so lexical order matches chronological order
fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn record_from_row(row: ScanRow) -> Result<ScanRecord, DatabaseError> {
    let (id, timestamp, food_item, nutrition_data, confidence, image_url) = row;
    let corrupt = |reason: String| DatabaseError::Corrupt { id: id.clone(), reason };

    let timestamp = DateTime::parse_from_rfc3339(&timestamp)
        .map_err(|e| corrupt(format!("timestamp: {}", e)))?
        .with_timezone(&Utc);
    let nutrition_data = serde_json::from_str(&nutrition_data)
        .map_err(|e| corrupt(format!("nutrition_data: {}", e)))?;
    let confidence = confidence
        .parse::<f32>()
        .map_err(|e| corrupt(format!("confidence: {}", e)))?;

    Ok(ScanRecord {
        id,
        timestamp,
        food_item,
        nutrition_data,
        confidence,
        image_url,
    })
}
