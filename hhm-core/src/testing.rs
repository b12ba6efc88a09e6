//! Hand-written fakes for the collaborator traits, used by integration
//! tests in this crate and `hhm-daemon`'s own test suite.

use crate::collaborators::{AckOutcome, FailureDetector, GossipSchema, Membership, RpcClient};
use crate::types::{Endpoint, TargetId};
use async_trait::async_trait;
use dashmap::DashSet;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tokio::sync::mpsc;

#[derive(Default)]
pub struct FakeMembership {
    state: Mutex<MembershipState>,
    cluster_size: usize,
}

#[derive(Default)]
struct MembershipState {
    endpoint_for: HashMap<TargetId, Endpoint>,
    host_of: HashMap<Endpoint, TargetId>,
}

impl FakeMembership {
    pub fn new(cluster_size: usize) -> Self {
        Self {
            state: Mutex::new(MembershipState::default()),
            cluster_size,
        }
    }

    pub fn add(&self, target: TargetId, endpoint: Endpoint) {
        let mut state = self.state.lock().unwrap();
        state.host_of.insert(endpoint.clone(), target);
        state.endpoint_for.insert(target, endpoint);
    }

    pub fn remove(&self, endpoint: &Endpoint) {
        let mut state = self.state.lock().unwrap();
        if let Some(target) = state.host_of.remove(endpoint) {
            state.endpoint_for.remove(&target);
        }
    }
}

impl Membership for FakeMembership {
    fn endpoint_for(&self, target: TargetId) -> Option<Endpoint> {
        self.state.lock().unwrap().endpoint_for.get(&target).cloned()
    }

    fn host_id(&self, endpoint: &Endpoint) -> Option<TargetId> {
        self.state.lock().unwrap().host_of.get(endpoint).copied()
    }

    fn all_endpoints(&self) -> Vec<Endpoint> {
        self.state.lock().unwrap().host_of.keys().cloned().collect()
    }

    fn is_member(&self, endpoint: &Endpoint) -> bool {
        self.state.lock().unwrap().host_of.contains_key(endpoint)
    }

    fn cluster_size(&self) -> usize {
        self.cluster_size
    }
}

#[derive(Default)]
pub struct FakeFailureDetector {
    alive: DashSet<Endpoint>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<Endpoint>>>,
}

impl FakeFailureDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_alive(&self, endpoint: Endpoint) {
        self.alive.insert(endpoint.clone());
        self.subscribers
            .lock()
            .unwrap()
            .retain(|tx| tx.send(endpoint.clone()).is_ok());
    }

    pub fn mark_dead(&self, endpoint: &Endpoint) {
        self.alive.remove(endpoint);
    }
}

impl FailureDetector for FakeFailureDetector {
    fn is_alive(&self, endpoint: &Endpoint) -> bool {
        self.alive.contains(endpoint)
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<Endpoint> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().unwrap().push(tx);
        rx
    }
}

#[derive(Default)]
pub struct FakeGossip {
    schema_state: Mutex<HashMap<Endpoint, u64>>,
    local_version: u64,
    truncations: Mutex<HashMap<String, i64>>,
    known_families: Mutex<HashSet<String>>,
}

impl FakeGossip {
    pub fn new(local_version: u64) -> Self {
        Self {
            local_version,
            ..Default::default()
        }
    }

    pub fn set_schema_state(&self, endpoint: Endpoint, version: u64) {
        self.schema_state.lock().unwrap().insert(endpoint, version);
    }

    pub fn set_truncation(&self, column_family: &str, truncated_at_ms: i64) {
        self.truncations
            .lock()
            .unwrap()
            .insert(column_family.to_string(), truncated_at_ms);
    }

    pub fn add_known_family(&self, name: &str) {
        self.known_families.lock().unwrap().insert(name.to_string());
    }
}

impl GossipSchema for FakeGossip {
    fn schema_state(&self, endpoint: &Endpoint) -> Option<u64> {
        self.schema_state.lock().unwrap().get(endpoint).copied()
    }

    fn local_schema_version(&self) -> u64 {
        self.local_version
    }

    fn truncation_time(&self, column_family: &str) -> Option<i64> {
        self.truncations.lock().unwrap().get(column_family).copied()
    }

    fn known_column_families(&self) -> HashSet<String> {
        self.known_families.lock().unwrap().clone()
    }
}

#[derive(Default)]
pub struct FakeRpc {
    outcomes: Mutex<HashMap<Endpoint, AckOutcome>>,
    sent: Mutex<Vec<(Endpoint, Vec<u8>)>>,
    #[allow(clippy::type_complexity)]
    callback_after: Mutex<Option<(usize, Box<dyn Fn() + Send + Sync>)>>,
}

impl FakeRpc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_outcome(&self, endpoint: Endpoint, outcome: AckOutcome) {
        self.outcomes.lock().unwrap().insert(endpoint, outcome);
    }

    pub fn sent_count(&self, endpoint: &Endpoint) -> usize {
        self.sent.lock().unwrap().iter().filter(|(e, _)| e == endpoint).count()
    }

    pub fn sent_payloads(&self, endpoint: &Endpoint) -> Vec<Vec<u8>> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(e, _)| e == endpoint)
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    /// Runs `callback` synchronously the moment the `n`th call to `send`
    /// (across all endpoints) is recorded. Lets a test assert on mid-replay
    /// state deterministically instead of racing real wall-clock time.
    pub fn call_after_nth_send(&self, n: usize, callback: impl Fn() + Send + Sync + 'static) {
        *self.callback_after.lock().unwrap() = Some((n, Box::new(callback)));
    }
}

#[async_trait]
impl RpcClient for FakeRpc {
    async fn send(&self, endpoint: &Endpoint, mutation_bytes: Vec<u8>) -> AckOutcome {
        let count = {
            let mut sent = self.sent.lock().unwrap();
            sent.push((endpoint.clone(), mutation_bytes));
            sent.len()
        };
        if let Some((n, callback)) = self.callback_after.lock().unwrap().as_ref() {
            if *n == count {
                callback();
            }
        }
        self.outcomes
            .lock()
            .unwrap()
            .get(endpoint)
            .copied()
            .unwrap_or(AckOutcome::Ack)
    }
}
