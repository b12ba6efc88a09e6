mod rocksdb_store;

pub use rocksdb_store::RocksDbHintStore;

use crate::error::StoreError;
use crate::types::{HintId, TargetId};
use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct ScanRow {
    pub hint_id: HintId,
    pub message_version: u32,
    pub mutation_bytes: Vec<u8>,
    pub writetime_ms: i64,
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub hint_id: HintId,
    pub message_version: u32,
}

#[derive(Debug, Default)]
pub struct ScanPage {
    pub rows: Vec<ScanRow>,
    pub next_cursor: Option<Cursor>,
}

/// Durable storage for undelivered hints, keyed by target and ordered by
/// the time each hint was written.
#[async_trait]
pub trait HintStore: Send + Sync {
    async fn insert(
        &self,
        target: TargetId,
        message_version: u32,
        mutation_bytes: Vec<u8>,
        ttl_secs: u64,
        column_family_count: usize,
    ) -> Result<HintId, StoreError>;

    async fn scan(
        &self,
        target: TargetId,
        page_size: usize,
        cursor: Option<Cursor>,
    ) -> Result<ScanPage, StoreError>;

    /// Idempotent delete keyed by writetime: a row is only removed if its
    /// stored writetime is no newer than `writetime_ms`, so a delivery
    /// session racing a concurrent re-insert can never clobber newer data.
    async fn delete(
        &self,
        target: TargetId,
        hint_id: HintId,
        message_version: u32,
        writetime_ms: i64,
    ) -> Result<(), StoreError>;

    async fn bulk_delete(&self, target: TargetId) -> Result<(), StoreError>;

    async fn truncate_all(&self) -> Result<(), StoreError>;

    async fn distinct_targets(&self) -> Result<Vec<TargetId>, StoreError>;

    async fn is_empty(&self, target: TargetId) -> Result<bool, StoreError>;

    async fn flush(&self) -> Result<(), StoreError>;

    async fn compact(&self, target: Option<TargetId>) -> Result<(), StoreError>;

    /// Running average of row size and column family count, used to size
    /// delivery pages. `None` until at least one hint has been written.
    async fn mean_row_stats(&self) -> Option<(f64, f64)>;
}
