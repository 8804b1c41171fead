use crate::shard::{RangeId, ShardId};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Shard {0} not found")]
    NotFound(ShardId),

    #[error("Shard {0} already exists")]
    DuplicateKey(ShardId),

    #[error("Transient failure: {0}")]
    Transient(String),

    /// Raised by callers that compare fencing tokens, never by the store itself.
    #[error("Shard {shard_id} range id changed: expected {expected}, found {actual}")]
    StaleFencingToken {
        shard_id: ShardId,
        expected: RangeId,
        actual: RangeId,
    },

    #[error("Shard {0} range id is exhausted")]
    RangeExhausted(ShardId),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Transaction error: {0}")]
    Transaction(String),
}

impl StoreError {
    /// Whether the whole operation may be retried from scratch.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl From<rmp_serde::encode::Error> for StoreError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        Self::Codec(err.to_string())
    }
}

impl From<rmp_serde::decode::Error> for StoreError {
    fn from(err: rmp_serde::decode::Error) -> Self {
        Self::Codec(err.to_string())
    }
}
