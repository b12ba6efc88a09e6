use crate::types::{HintId, TargetId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("rocksdb: {0}")]
    RocksDb(#[from] rocksdb::Error),

    #[error("failed to encode hint row: {0}")]
    Encode(#[from] bincode::Error),

    #[error("hint row for target {target} is corrupt")]
    CorruptRow { target: TargetId },
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("mutation carries no column family updates")]
    EmptyMutation,

    #[error("mutation's minimum grace window resolves to a non-positive TTL")]
    NonPositiveTtl,

    #[error("mutation references unknown column family {0}")]
    UnknownFamily(String),

    #[error("mutation bytes are corrupt")]
    Corrupt,

    #[error("unsupported message version {0}")]
    UnsupportedVersion(u32),

    #[error("encode failure: {0}")]
    Encode(#[from] bincode::Error),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

#[derive(Debug, Error)]
pub enum ControlError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("target {0} is not known to the membership view")]
    UnknownTarget(TargetId),

    #[error("hint {hint_id} not found for target {target}")]
    HintNotFound { target: TargetId, hint_id: HintId },
}
