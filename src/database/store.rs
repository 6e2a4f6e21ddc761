use async_trait::async_trait;

use crate::database::DatabaseError;
use crate::food::models::ScanRecord;

/// Append and newest-first read access to scan history.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(&self, record: &ScanRecord) -> Result<(), DatabaseError>;

    /// At most `limit` records ordered by timestamp, newest first.
    async fn list_recent(&self, limit: usize) -> Result<Vec<ScanRecord>, DatabaseError>;
}
