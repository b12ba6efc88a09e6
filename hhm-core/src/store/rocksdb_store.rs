use super::{Cursor, HintStore, ScanPage, ScanRow};
use crate::error::StoreError;
use crate::types::{HintId, TargetId};
use async_trait::async_trait;
use rocksdb::{Direction, IteratorMode, Options, ReadOptions, DB};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Serialize, Deserialize)]
struct HintValue {
    writetime_ms: i64,
    ttl_secs: u64,
    mutation_bytes: Vec<u8>,
}

/// RocksDB-backed implementation of [`HintStore`].
///
/// Rows are keyed by `target_id (16B) || hint_id (16B UUIDv7) || message_version (4B BE)`.
/// Because UUIDv7 carries its creation timestamp in the high-order bytes,
/// plain byte-lexicographic key order is also insertion order within a
/// target, which is what makes paged, cursor-based scanning possible
/// without a secondary index.
pub struct RocksDbHintStore {
    db: Arc<DB>,
    delete_lock: Mutex<()>,
    stat_total_bytes: AtomicU64,
    stat_total_families: AtomicU64,
    stat_count: AtomicU64,
}

impl RocksDbHintStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let mut options = Options::default();
        options.create_if_missing(true);
        let db = DB::open(&options, path)?;

        Ok(Self {
            db: Arc::new(db),
            delete_lock: Mutex::new(()),
            stat_total_bytes: AtomicU64::new(0),
            stat_total_families: AtomicU64::new(0),
            stat_count: AtomicU64::new(0),
        })
    }
}

const KEY_LEN: usize = 16 + 16 + 4;

fn encode_key(target: TargetId, hint_id: HintId, message_version: u32) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    key[0..16].copy_from_slice(target.as_bytes());
    key[16..32].copy_from_slice(&hint_id.as_bytes());
    key[32..36].copy_from_slice(&message_version.to_be_bytes());
    key
}

fn decode_key(bytes: &[u8]) -> Option<(TargetId, HintId, u32)> {
    if bytes.len() != KEY_LEN {
        return None;
    }
    let target = Uuid::from_slice(&bytes[0..16]).ok()?;
    let mut hint_id_bytes = [0u8; 16];
    hint_id_bytes.copy_from_slice(&bytes[16..32]);
    let mut version_bytes = [0u8; 4];
    version_bytes.copy_from_slice(&bytes[32..36]);
    Some((
        target,
        HintId::from_bytes(hint_id_bytes),
        u32::from_be_bytes(version_bytes),
    ))
}

/// Exclusive upper bound for an iteration restricted to `target`'s prefix.
/// `None` only when the target id is all-ones, an astronomically unlikely
/// edge case handled by falling back to an unbounded scan.
fn prefix_upper_bound(target: TargetId) -> Option<[u8; 16]> {
    let mut bytes = *target.as_bytes();
    for byte in bytes.iter_mut().rev() {
        if *byte == 0xff {
            *byte = 0;
            continue;
        }
        *byte += 1;
        return Some(bytes);
    }
    None
}

#[async_trait]
impl HintStore for RocksDbHintStore {
    async fn insert(
        &self,
        target: TargetId,
        message_version: u32,
        mutation_bytes: Vec<u8>,
        ttl_secs: u64,
        column_family_count: usize,
    ) -> Result<HintId, StoreError> {
        let hint_id = HintId::generate();
        let writetime_ms = now_ms();
        let value = HintValue {
            writetime_ms,
            ttl_secs,
            mutation_bytes,
        };
        let value_bytes = bincode::serialize(&value)?;

        self.stat_total_bytes
            .fetch_add(value_bytes.len() as u64, Ordering::Relaxed);
        self.stat_total_families
            .fetch_add(column_family_count as u64, Ordering::Relaxed);
        self.stat_count.fetch_add(1, Ordering::Relaxed);

        let db = self.db.clone();
        let key = encode_key(target, hint_id, message_version);
        tokio::task::spawn_blocking(move || db.put(key, value_bytes))
            .await
            .expect("rocksdb put task panicked")?;

        Ok(hint_id)
    }

    async fn scan(
        &self,
        target: TargetId,
        page_size: usize,
        cursor: Option<Cursor>,
    ) -> Result<ScanPage, StoreError> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let start_key = match cursor {
                Some(c) => {
                    let mut key = encode_key(target, c.hint_id, c.message_version).to_vec();
                    // seek strictly after the cursor row
                    key.push(0);
                    key
                }
                None => target.as_bytes().to_vec(),
            };

            let mut read_opts = ReadOptions::default();
            if let Some(upper) = prefix_upper_bound(target) {
                read_opts.set_iterate_upper_bound(upper.to_vec());
            }

            let iter = db.iterator_opt(
                IteratorMode::From(&start_key, Direction::Forward),
                read_opts,
            );

            let mut rows = Vec::with_capacity(page_size);
            let mut next_cursor = None;

            for item in iter {
                let (key, value) = item?;
                let Some((row_target, hint_id, message_version)) = decode_key(&key) else {
                    continue;
                };
                if row_target != target {
                    break;
                }
                if rows.len() == page_size {
                    next_cursor = Some(Cursor {
                        hint_id,
                        message_version,
                    });
                    break;
                }

                let decoded: HintValue = bincode::deserialize(&value)?;
                rows.push(ScanRow {
                    hint_id,
                    message_version,
                    mutation_bytes: decoded.mutation_bytes,
                    writetime_ms: decoded.writetime_ms,
                    ttl_secs: decoded.ttl_secs,
                });
            }

            Ok(ScanPage { rows, next_cursor })
        })
        .await
        .expect("rocksdb scan task panicked")
    }

    async fn delete(
        &self,
        target: TargetId,
        hint_id: HintId,
        message_version: u32,
        writetime_ms: i64,
    ) -> Result<(), StoreError> {
        let _guard = self.delete_lock.lock().await;
        let db = self.db.clone();
        let key = encode_key(target, hint_id, message_version);

        tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
            if let Some(existing) = db.get(&key)? {
                let decoded: HintValue = bincode::deserialize(&existing)?;
                if decoded.writetime_ms <= writetime_ms {
                    db.delete(&key)?;
                }
            }
            Ok(())
        })
        .await
        .expect("rocksdb delete task panicked")
    }

    async fn bulk_delete(&self, target: TargetId) -> Result<(), StoreError> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
            let mut read_opts = ReadOptions::default();
            if let Some(upper) = prefix_upper_bound(target) {
                read_opts.set_iterate_upper_bound(upper.to_vec());
            }
            let start_key = target.as_bytes().to_vec();
            let iter = db.iterator_opt(
                IteratorMode::From(&start_key, Direction::Forward),
                read_opts,
            );

            let mut batch = rocksdb::WriteBatch::default();
            for item in iter {
                let (key, _) = item?;
                if decode_key(&key).map(|(t, _, _)| t) != Some(target) {
                    break;
                }
                batch.delete(&key);
            }
            db.write(batch)?;
            Ok(())
        })
        .await
        .expect("rocksdb bulk_delete task panicked")
    }

    async fn truncate_all(&self) -> Result<(), StoreError> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
            let iter = db.iterator(IteratorMode::Start);
            let mut batch = rocksdb::WriteBatch::default();
            for item in iter {
                let (key, _) = item?;
                batch.delete(&key);
            }
            db.write(batch)?;
            Ok(())
        })
        .await
        .expect("rocksdb truncate_all task panicked")
    }

    async fn distinct_targets(&self) -> Result<Vec<TargetId>, StoreError> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || -> Result<Vec<TargetId>, StoreError> {
            let mut targets = Vec::new();
            let mut last_seen: Option<TargetId> = None;
            for item in db.iterator(IteratorMode::Start) {
                let (key, _) = item?;
                let Some((target, _, _)) = decode_key(&key) else {
                    continue;
                };
                if last_seen != Some(target) {
                    targets.push(target);
                    last_seen = Some(target);
                }
            }
            Ok(targets)
        })
        .await
        .expect("rocksdb distinct_targets task panicked")
    }

    async fn is_empty(&self, target: TargetId) -> Result<bool, StoreError> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || -> Result<bool, StoreError> {
            let mut read_opts = ReadOptions::default();
            if let Some(upper) = prefix_upper_bound(target) {
                read_opts.set_iterate_upper_bound(upper.to_vec());
            }
            let start_key = target.as_bytes().to_vec();
            let mut iter = db.iterator_opt(
                IteratorMode::From(&start_key, Direction::Forward),
                read_opts,
            );
            Ok(iter.next().is_none())
        })
        .await
        .expect("rocksdb is_empty task panicked")
    }

    async fn flush(&self) -> Result<(), StoreError> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || db.flush().map_err(StoreError::from))
            .await
            .expect("rocksdb flush task panicked")
    }

    async fn compact(&self, target: Option<TargetId>) -> Result<(), StoreError> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            match target {
                Some(t) => {
                    let start = t.as_bytes().to_vec();
                    let end = prefix_upper_bound(t).map(|b| b.to_vec());
                    db.compact_range(Some(start.as_slice()), end.as_deref());
                }
                None => db.compact_range(None::<&[u8]>, None::<&[u8]>),
            }
            Ok(())
        })
        .await
        .expect("rocksdb compact task panicked")
    }

    async fn mean_row_stats(&self) -> Option<(f64, f64)> {
        let count = self.stat_count.load(Ordering::Relaxed);
        if count == 0 {
            return None;
        }
        let total_bytes = self.stat_total_bytes.load(Ordering::Relaxed) as f64;
        let total_families = self.stat_total_families.load(Ordering::Relaxed) as f64;
        Some((total_bytes / count as f64, total_families / count as f64))
    }
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_millis() as i64
}
