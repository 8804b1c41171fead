// ============================================================================
// Shard Store Library
// ============================================================================
//
// Shard ownership and progress tracking for a sharded task-processing
// service. One `shards` row per shard records its owner, its fencing token
// (range id) and how far its replication, transfer and timer processors got.
//
// Layers:
// - core: values, rows, errors
// - shard: the ShardRecord entity and its ids
// - storage: the ShardStore trait, row codec and the in-memory backend
// - transaction: caller-held transactions with row-level locks
// - ownership: fencing discipline and retries on top of a store
//
// ============================================================================

pub mod config;
pub mod core;
pub mod ownership;
pub mod shard;
pub mod storage;
pub mod transaction;

pub use config::StoreConfig;
pub use core::{Result, StoreError};
pub use ownership::{Clock, FixedClock, RetryPolicy, ShardManager, SystemClock};
pub use shard::{RangeId, ShardId, ShardRecord, zero_time};
pub use storage::{InMemoryShardStore, ShardStore};
pub use transaction::{LockMode, Transaction, TransactionState, TransactionStats};
