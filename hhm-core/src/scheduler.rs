use crate::manager::ManagerInner;
use crate::pool::DeliveryWorkerPool;
use crate::types::Endpoint;
use log::{debug, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration};

const SWEEP_INTERVAL: Duration = Duration::from_secs(600);

/// Wakes delivery sessions two ways: a periodic sweep over every target the
/// store still has hints for, and an event-driven wake-up the moment the
/// failure detector reports a peer back up.
pub struct Scheduler {
    manager: Arc<ManagerInner>,
    pool: Arc<DeliveryWorkerPool>,
}

impl Scheduler {
    pub fn new(manager: Arc<ManagerInner>, pool: Arc<DeliveryWorkerPool>) -> Self {
        Self { manager, pool }
    }

    pub fn spawn(&self, mut event_rx: mpsc::UnboundedReceiver<Endpoint>, shutdown: Arc<AtomicBool>) {
        let sweep_manager = self.manager.clone();
        let sweep_pool = self.pool.clone();
        let sweep_shutdown = shutdown.clone();

        tokio::spawn(async move {
            let mut ticker = interval(SWEEP_INTERVAL);
            loop {
                ticker.tick().await;
                if sweep_shutdown.load(Ordering::Relaxed) {
                    return;
                }

                match sweep_manager.store.distinct_targets().await {
                    Ok(targets) => {
                        for target in targets {
                            match sweep_manager.membership.endpoint_for(target) {
                                Some(_) => {
                                    sweep_pool.try_schedule(sweep_manager.clone(), target);
                                }
                                None => debug!("target {target} has no known endpoint, skipping sweep"),
                            }
                        }
                    }
                    Err(err) => warn!("periodic sweep failed to list targets: {err}"),
                }
            }
        });

        let event_manager = self.manager.clone();
        let event_pool = self.pool.clone();
        tokio::spawn(async move {
            while let Some(endpoint) = event_rx.recv().await {
                if shutdown.load(Ordering::Relaxed) {
                    return;
                }
                match event_manager.membership.host_id(&endpoint) {
                    Some(target) => {
                        event_pool.try_schedule(event_manager.clone(), target);
                    }
                    None => debug!("endpoint {endpoint} has no known host id, skipping schedule"),
                }
            }
        });
    }
}
