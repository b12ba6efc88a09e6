use crate::codec::{self, Mutation};
use crate::collaborators::{FailureDetector, GossipSchema, Membership, RpcClient};
use crate::error::{ControlError, SessionError};
use crate::pool::DeliveryWorkerPool;
use crate::scheduler::Scheduler;
use crate::store::HintStore;
use crate::types::TargetId;
use dashmap::DashMap;
use hhm_utils::config::Config;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct EndpointCounters {
    pub hints_created: u64,
    pub hints_replayed: u64,
    pub hints_dropped: u64,
}

/// Shared state every delivery session, the scheduler and the control
/// surface all operate on.
pub struct ManagerInner {
    pub config: Config,
    pub store: Arc<dyn HintStore>,
    pub rpc: Arc<dyn RpcClient>,
    pub membership: Arc<dyn Membership>,
    pub failure_detector: Arc<dyn FailureDetector>,
    pub gossip: Arc<dyn GossipSchema>,
    pub paused: AtomicBool,
    pub counters: DashMap<TargetId, EndpointCounters>,
}

/// Public handle to a running hinted handoff manager. Cheap to clone; every
/// clone shares the same underlying state.
#[derive(Clone)]
pub struct HintedHandoffManager {
    inner: Arc<ManagerInner>,
    pool: Arc<DeliveryWorkerPool>,
}

impl HintedHandoffManager {
    pub fn new(
        config: Config,
        store: Arc<dyn HintStore>,
        rpc: Arc<dyn RpcClient>,
        membership: Arc<dyn Membership>,
        failure_detector: Arc<dyn FailureDetector>,
        gossip: Arc<dyn GossipSchema>,
    ) -> Self {
        let pool = Arc::new(DeliveryWorkerPool::new(config.max_hint_threads));
        let inner = Arc::new(ManagerInner {
            config,
            store,
            rpc,
            membership,
            failure_detector,
            gossip,
            paused: AtomicBool::new(false),
            counters: DashMap::new(),
        });

        Self { inner, pool }
    }

    pub fn inner(&self) -> Arc<ManagerInner> {
        self.inner.clone()
    }

    /// Spawns the periodic sweep and the failure-detector event listener.
    pub fn spawn_scheduler(&self, shutdown: Arc<AtomicBool>) -> Scheduler {
        let rx = self.inner.failure_detector.subscribe();
        let scheduler = Scheduler::new(self.inner.clone(), self.pool.clone());
        scheduler.spawn(rx, shutdown);
        scheduler
    }

    /// Accepts a mutation destined for `target` that couldn't be delivered
    /// synchronously, computing its TTL from the mutation's column families.
    pub async fn insert_hint(
        &self,
        target: TargetId,
        mutation: &Mutation,
    ) -> Result<(), SessionError> {
        let ttl_secs = codec::ttl_for(mutation, self.inner.config.max_hint_ttl_seconds)?;
        let bytes = codec::serialize(mutation)?;
        self.inner
            .store
            .insert(
                target,
                codec::CURRENT_VERSION,
                bytes,
                ttl_secs,
                mutation.column_family_count(),
            )
            .await?;

        self.inner
            .counters
            .entry(target)
            .or_default()
            .hints_created += 1;

        Ok(())
    }

    pub fn pause(&self) {
        self.inner.paused.store(true, Ordering::Relaxed);
    }

    pub fn resume(&self) {
        self.inner.paused.store(false, Ordering::Relaxed);
    }

    pub fn is_paused(&self) -> bool {
        self.inner.paused.load(Ordering::Relaxed)
    }

    /// Deletes every hint stored for `target` without replaying them, then
    /// compacts that target's range. Refuses targets the membership view no
    /// longer recognizes, since purging a peer that was never a member (or
    /// whose id was mistyped) would silently no-op and mask the mistake.
    pub async fn purge(&self, target: TargetId) -> Result<(), ControlError> {
        if self.inner.membership.endpoint_for(target).is_none() {
            return Err(ControlError::UnknownTarget(target));
        }

        self.inner.store.bulk_delete(target).await?;
        self.inner.store.compact(Some(target)).await?;
        self.inner.counters.remove(&target);
        Ok(())
    }

    pub async fn truncate_all(&self) -> Result<(), ControlError> {
        self.inner.store.truncate_all().await?;
        self.inner.counters.clear();
        Ok(())
    }

    pub async fn list_pending_targets(&self) -> Result<Vec<TargetId>, ControlError> {
        Ok(self.inner.store.distinct_targets().await?)
    }

    pub fn counters_for(&self, target: TargetId) -> EndpointCounters {
        self.inner.counters.get(&target).map(|c| *c).unwrap_or_default()
    }

    /// Schedules an immediate delivery attempt for `target`, bypassing the
    /// periodic sweep. No-op if a session for this target is already running.
    pub fn schedule_now(&self, target: TargetId) -> bool {
        self.pool.try_schedule(self.inner.clone(), target)
    }

    pub fn in_flight_targets(&self) -> Vec<TargetId> {
        self.pool.in_flight_targets()
    }
}
