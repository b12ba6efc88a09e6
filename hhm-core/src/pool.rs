use crate::manager::ManagerInner;
use crate::session::{DeliverySession, Outcome};
use crate::types::TargetId;
use dashmap::DashSet;
use log::{info, warn};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Releases a target's in-flight marker on every exit path, including panics
/// unwinding out of a session task.
struct InFlightGuard {
    in_flight: Arc<DashSet<TargetId>>,
    target: TargetId,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.remove(&self.target);
    }
}

/// Bounds how many delivery sessions run concurrently and de-duplicates
/// schedule requests for a target that already has one in flight.
pub struct DeliveryWorkerPool {
    semaphore: Arc<Semaphore>,
    in_flight: Arc<DashSet<TargetId>>,
}

impl DeliveryWorkerPool {
    pub fn new(max_hint_threads: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_hint_threads)),
            in_flight: Arc::new(DashSet::new()),
        }
    }

    pub fn in_flight_targets(&self) -> Vec<TargetId> {
        self.in_flight.iter().map(|t| *t).collect()
    }

    /// Schedules a delivery session for `target` unless one is already
    /// running. Returns `false` if the target was already in flight.
    pub fn try_schedule(&self, manager: Arc<ManagerInner>, target: TargetId) -> bool {
        if !self.in_flight.insert(target) {
            return false;
        }

        let semaphore = self.semaphore.clone();
        let in_flight = self.in_flight.clone();

        tokio::spawn(async move {
            // Constructed before the permit is awaited: if this task is
            // dropped while still queued (e.g. during shutdown), the guard's
            // Drop still runs and releases the in-flight marker.
            let _guard = InFlightGuard {
                in_flight,
                target,
            };
            let permit = semaphore.acquire().await;

            match permit {
                Ok(_permit) => match DeliverySession::new(manager, target).run().await {
                    Ok(Outcome::Completed { replayed }) => {
                        info!("delivery session for {target} completed, replayed {replayed} hints");
                    }
                    Ok(Outcome::Aborted { reason, replayed }) => {
                        info!("delivery session for {target} aborted ({reason:?}) after replaying {replayed} hints");
                    }
                    Err(err) => {
                        warn!("delivery session for {target} failed: {err}");
                    }
                },
                Err(_) => {
                    warn!("semaphore closed, dropping delivery session for {target}");
                }
            }
        });

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::ManagerInner;
    use crate::store::RocksDbHintStore;
    use crate::testing::{FakeFailureDetector, FakeGossip, FakeMembership, FakeRpc};
    use dashmap::DashMap;
    use hhm_utils::config::{Config, Env};
    use hhm_utils::dirs::HhmDirs;
    use std::sync::atomic::AtomicBool;
    use uuid::Uuid;

    fn test_manager(tmp: &std::path::Path) -> Arc<ManagerInner> {
        let store = Arc::new(RocksDbHintStore::open(tmp).unwrap());
        Arc::new(ManagerInner {
            config: Config {
                env: Env::Dev,
                log_level: log::LevelFilter::Off,
                hhm_dirs: HhmDirs::new(tmp.to_path_buf()),
                management_listen_ip: "127.0.0.1".to_string(),
                management_port: 0,
                allowed_origins: vec![],
                max_hint_threads: 4,
                max_hint_ttl_seconds: 3600,
                hinted_handoff_throttle_kb: 0,
                in_memory_compaction_limit: 16 * 1024 * 1024,
                tombstone_warn_threshold: 1000,
                ring_delay_ms: 10,
            },
            store,
            rpc: Arc::new(FakeRpc::new()),
            membership: Arc::new(FakeMembership::new(1)),
            failure_detector: Arc::new(FakeFailureDetector::new()),
            gossip: Arc::new(FakeGossip::new(0)),
            paused: AtomicBool::new(false),
            counters: DashMap::new(),
        })
    }

    #[tokio::test]
    async fn concurrent_schedule_for_same_target_collapses_to_one_session() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = test_manager(tmp.path());
        let pool = DeliveryWorkerPool::new(4);
        let target = Uuid::new_v4();

        assert!(pool.try_schedule(manager.clone(), target));
        assert!(!pool.try_schedule(manager.clone(), target));
        assert!(!pool.try_schedule(manager.clone(), target));
        assert_eq!(pool.in_flight_targets(), vec![target]);
    }

    #[tokio::test]
    async fn schedule_after_release_admits_again() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = test_manager(tmp.path());
        let pool = DeliveryWorkerPool::new(4);
        let target = Uuid::new_v4();

        assert!(pool.try_schedule(manager.clone(), target));
        // the store is empty, so the spawned session exits almost
        // immediately and releases the in-flight marker on drop
        for _ in 0..50 {
            if pool.in_flight_targets().is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(pool.try_schedule(manager, target));
    }
}
