use crate::types::Endpoint;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Result of handing a serialized mutation to the wire layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    Ack,
    Timeout,
}

/// The narrow slice of the peer-to-peer RPC layer a delivery session needs:
/// replay a mutation at-least-once and report whether it was acknowledged.
#[async_trait]
pub trait RpcClient: Send + Sync {
    async fn send(&self, endpoint: &Endpoint, mutation_bytes: Vec<u8>) -> AckOutcome;
}

/// A read-only view of cluster membership, as seen by the local node's gossip state.
pub trait Membership: Send + Sync {
    fn endpoint_for(&self, target: crate::types::TargetId) -> Option<Endpoint>;
    fn host_id(&self, endpoint: &Endpoint) -> Option<crate::types::TargetId>;
    fn all_endpoints(&self) -> Vec<Endpoint>;
    fn is_member(&self, endpoint: &Endpoint) -> bool;
    fn cluster_size(&self) -> usize;
}

/// Liveness oracle. `subscribe` yields an endpoint each time it transitions
/// from down to up, so the scheduler can wake sessions eagerly instead of
/// waiting for the next periodic sweep.
pub trait FailureDetector: Send + Sync {
    fn is_alive(&self, endpoint: &Endpoint) -> bool;
    fn subscribe(&self) -> mpsc::UnboundedReceiver<Endpoint>;
}

/// Schema agreement and truncation-time metadata, both normally carried by
/// the same gossip subsystem that propagates table schema in a clustered
/// store.
pub trait GossipSchema: Send + Sync {
    /// The schema version a remote endpoint is currently gossiping, if known.
    fn schema_state(&self, endpoint: &Endpoint) -> Option<u64>;

    /// This node's own current schema version.
    fn local_schema_version(&self) -> u64;

    /// Wall-clock time, in epoch milliseconds, a column family was last
    /// truncated locally. `None` if it has never been truncated.
    fn truncation_time(&self, column_family: &str) -> Option<i64>;

    /// Column families this node's local schema currently recognizes.
    /// An empty set disables the unknown-family check entirely, which a
    /// test harness may prefer over enumerating every family up front.
    fn known_column_families(&self) -> std::collections::HashSet<String>;
}
