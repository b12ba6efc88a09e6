use std::fmt;
use uuid::Uuid;

/// Identifies the peer a batch of hints is destined for.
pub type TargetId = Uuid;

/// A time-ordered, unique identifier for a single stored hint.
///
/// Backed by a UUIDv7 so that raw byte comparison (as used by the RocksDB
/// key ordering) also orders hints by the time they were written.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct HintId(pub Uuid);

impl HintId {
    pub fn generate() -> Self {
        HintId(Uuid::now_v7())
    }

    pub fn as_bytes(&self) -> [u8; 16] {
        *self.0.as_bytes()
    }

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        HintId(Uuid::from_bytes(bytes))
    }
}

impl fmt::Display for HintId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Network address of a cluster member, as reported by the membership view.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Endpoint(pub String);

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
