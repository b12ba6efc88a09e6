use crate::codec;
use crate::collaborators::AckOutcome;
use crate::error::SessionError;
use crate::manager::ManagerInner;
use crate::store::Cursor;
use crate::types::{Endpoint, TargetId};
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

const MIN_PAGE_SIZE: usize = 2;
const MAX_PAGE_SIZE: usize = 128;
const DEFAULT_PAGE_SIZE: usize = 128;
const LIVENESS_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    StoreEmpty,
    Paused,
    SchemaTimeout,
    PeerMissingFromGossip,
    PeerDead,
    WriteTimeout,
}

#[derive(Debug)]
pub enum Outcome {
    Completed { replayed: usize },
    Aborted { reason: AbortReason, replayed: usize },
}

/// Drives a single target through preflight checks, paged replay and
/// finalization. One session handles exactly one peer; concurrency across
/// peers is the worker pool's job, not this type's.
pub struct DeliverySession {
    manager: Arc<ManagerInner>,
    target: TargetId,
}

impl DeliverySession {
    pub fn new(manager: Arc<ManagerInner>, target: TargetId) -> Self {
        Self { manager, target }
    }

    pub async fn run(self) -> Result<Outcome, SessionError> {
        let m = &self.manager;

        if m.store.is_empty(self.target).await? {
            return Ok(Outcome::Aborted {
                reason: AbortReason::StoreEmpty,
                replayed: 0,
            });
        }

        if m.paused.load(Ordering::Relaxed) {
            return Ok(Outcome::Aborted {
                reason: AbortReason::Paused,
                replayed: 0,
            });
        }

        let Some(endpoint) = m.membership.endpoint_for(self.target) else {
            return Ok(Outcome::Aborted {
                reason: AbortReason::PeerMissingFromGossip,
                replayed: 0,
            });
        };

        let ring_delay = Duration::from_millis(m.config.ring_delay_ms);
        if !wait_for_schema_presence(m, &endpoint, ring_delay).await {
            return Ok(Outcome::Aborted {
                reason: AbortReason::SchemaTimeout,
                replayed: 0,
            });
        }
        if !wait_for_schema_agreement(m, &endpoint, ring_delay).await {
            return Ok(Outcome::Aborted {
                reason: AbortReason::SchemaTimeout,
                replayed: 0,
            });
        }

        if !m.failure_detector.is_alive(&endpoint) {
            return Ok(Outcome::Aborted {
                reason: AbortReason::PeerDead,
                replayed: 0,
            });
        }

        self.replay_loop(endpoint).await
    }

    async fn replay_loop(self, endpoint: Endpoint) -> Result<Outcome, SessionError> {
        let m = &self.manager;
        let page_size = compute_page_size(m).await;
        let known_families = m.gossip.known_column_families();
        let rate_limiter = crate::ratelimit::RateLimiter::new(
            m.config.hinted_handoff_throttle_kb,
            m.membership.cluster_size(),
        );

        let mut cursor: Option<Cursor> = None;
        let mut replayed = 0usize;

        loop {
            if m.paused.load(Ordering::Relaxed) {
                return Ok(Outcome::Aborted {
                    reason: AbortReason::Paused,
                    replayed,
                });
            }
            if !m.failure_detector.is_alive(&endpoint) {
                return Ok(Outcome::Aborted {
                    reason: AbortReason::PeerDead,
                    replayed,
                });
            }

            let page = m.store.scan(self.target, page_size, cursor).await?;
            if page.rows.is_empty() {
                break;
            }
            cursor = page.next_cursor;

            let mut truncation_cache: HashMap<String, i64> = HashMap::new();
            let mut inflight = FuturesUnordered::new();

            for row in page.rows {
                if m.paused.load(Ordering::Relaxed) {
                    drain(&mut inflight, m, &mut replayed).await?;
                    return Ok(Outcome::Aborted {
                        reason: AbortReason::Paused,
                        replayed,
                    });
                }
                if !m.failure_detector.is_alive(&endpoint) {
                    drain(&mut inflight, m, &mut replayed).await?;
                    return Ok(Outcome::Aborted {
                        reason: AbortReason::PeerDead,
                        replayed,
                    });
                }

                let now_ms = now_ms();
                if row.writetime_ms + (row.ttl_secs as i64) * 1000 < now_ms {
                    m.store
                        .delete(self.target, row.hint_id, row.message_version, row.writetime_ms)
                        .await?;
                    mark_dropped(m, self.target);
                    continue;
                }

                let mutation = match codec::deserialize(
                    &row.mutation_bytes,
                    row.message_version,
                    &known_families,
                ) {
                    Ok(mutation) => mutation,
                    Err(crate::error::CodecError::UnknownFamily(_)) => {
                        m.store
                            .delete(self.target, row.hint_id, row.message_version, row.writetime_ms)
                            .await?;
                        mark_dropped(m, self.target);
                        continue;
                    }
                    Err(_) => {
                        panic!(
                            "corrupt hint mutation for target {} hint {}: on-disk data is corrupt",
                            self.target, row.hint_id
                        );
                    }
                };

                for cf in &mutation.column_families {
                    truncation_cache
                        .entry(cf.name.clone())
                        .or_insert_with(|| m.gossip.truncation_time(&cf.name).unwrap_or(i64::MIN));
                }
                let stripped = codec::strip_truncated(mutation, &truncation_cache, row.writetime_ms);
                if stripped.is_empty() {
                    m.store
                        .delete(self.target, row.hint_id, row.message_version, row.writetime_ms)
                        .await?;
                    mark_dropped(m, self.target);
                    continue;
                }

                let wire = codec::serialize(&stripped)?;
                rate_limiter.acquire(wire.len()).await;

                let rpc = m.rpc.clone();
                let endpoint = endpoint.clone();
                let target = self.target;
                let hint_id = row.hint_id;
                let message_version = row.message_version;
                let writetime_ms = row.writetime_ms;

                inflight.push(async move {
                    let outcome = rpc.send(&endpoint, wire).await;
                    (outcome, target, hint_id, message_version, writetime_ms)
                });
            }

            let timed_out = drain(&mut inflight, m, &mut replayed).await?;
            if timed_out {
                return Ok(Outcome::Aborted {
                    reason: AbortReason::WriteTimeout,
                    replayed,
                });
            }
        }

        if replayed > m.config.tombstone_warn_threshold {
            log::info!(
                "target {} replayed {replayed} hints, forcing flush and compaction",
                self.target
            );
        }
        m.store.flush().await?;
        m.store.compact(Some(self.target)).await?;

        Ok(Outcome::Completed { replayed })
    }
}

type PendingAck = (
    AckOutcome,
    TargetId,
    crate::types::HintId,
    u32,
    i64,
);

/// Drains every outstanding ack future for the current page. A failed
/// delete after a successful ack is a storage-execution failure, not an
/// expected outcome, so it propagates and aborts the session per the
/// storage-execution error policy; the next scheduled sweep retries.
async fn drain(
    inflight: &mut FuturesUnordered<impl std::future::Future<Output = PendingAck>>,
    m: &ManagerInner,
    replayed: &mut usize,
) -> Result<bool, SessionError> {
    let mut timed_out = false;
    while let Some((outcome, target, hint_id, message_version, writetime_ms)) = inflight.next().await {
        match outcome {
            AckOutcome::Ack => {
                m.store
                    .delete(target, hint_id, message_version, writetime_ms)
                    .await?;
                *replayed += 1;
                m.counters.entry(target).or_default().hints_replayed += 1;
            }
            AckOutcome::Timeout => timed_out = true,
        }
    }
    Ok(timed_out)
}

fn mark_dropped(m: &ManagerInner, target: TargetId) {
    m.counters.entry(target).or_default().hints_dropped += 1;
}

async fn compute_page_size(m: &ManagerInner) -> usize {
    match m.store.mean_row_stats().await {
        Some((mean_row_bytes, mean_columns)) if mean_columns > 0.0 && mean_row_bytes > 0.0 => {
            page_size_from_stats(mean_row_bytes, mean_columns, m.config.in_memory_compaction_limit)
        }
        _ => DEFAULT_PAGE_SIZE,
    }
}

/// Pure clamp math split out of [`compute_page_size`] so it's testable
/// without a store. Always returns a value in `MIN_PAGE_SIZE..=MAX_PAGE_SIZE`
/// regardless of how extreme the input statistics are.
fn page_size_from_stats(mean_row_bytes: f64, mean_columns: f64, in_memory_compaction_limit: usize) -> usize {
    let avg_family_bytes = mean_row_bytes / mean_columns;
    let size = (in_memory_compaction_limit as f64 / avg_family_bytes) as usize;
    size.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE)
}

/// First of the two schema waits: the target must show up in gossip at all.
async fn wait_for_schema_presence(m: &ManagerInner, endpoint: &Endpoint, ring_delay: Duration) -> bool {
    let deadline = Instant::now() + ring_delay * 2;
    loop {
        if m.gossip.schema_state(endpoint).is_some() {
            return true;
        }
        if !m.membership.is_member(endpoint) {
            return false;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(LIVENESS_POLL_INTERVAL).await;
    }
}

/// Second wait: the target's gossiped schema version must match ours.
async fn wait_for_schema_agreement(m: &ManagerInner, endpoint: &Endpoint, ring_delay: Duration) -> bool {
    let deadline = Instant::now() + ring_delay * 2;
    let local = m.gossip.local_schema_version();
    loop {
        if m.gossip.schema_state(endpoint) == Some(local) {
            return true;
        }
        if !m.membership.is_member(endpoint) {
            return false;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(LIVENESS_POLL_INTERVAL).await;
    }
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_millis() as i64
}
