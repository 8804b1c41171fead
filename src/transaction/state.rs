// ============================================================================
// Transaction State Management
// ============================================================================
//
// A Transaction is the handle callers thread through every store operation.
// It owns the row locks it acquired and the writes it buffered; both live
// exactly as long as the transaction is active:
//
//   Active ──commit──> Committed   (writes applied, locks released)
//     │
//     └──rollback/drop──> Aborted  (writes discarded, locks released)
//
// ============================================================================

use super::Change;
use super::lock::{LockMode, RowLockGuard};
use super::manager::TransactionCounters;
use crate::core::{Result, Row, StoreError};
use crate::shard::ShardId;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Global transaction ID counter
static NEXT_TXN_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(pub u64);

impl TransactionId {
    /// Generate a new unique transaction ID
    pub fn new() -> Self {
        TransactionId(NEXT_TXN_ID.fetch_add(1, Ordering::SeqCst))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "txn_{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Committed,
    Aborted,
}

impl TransactionState {
    pub fn is_active(&self) -> bool {
        matches!(self, TransactionState::Active)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionState::Committed | TransactionState::Aborted
        )
    }
}

impl std::fmt::Display for TransactionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionState::Active => write!(f, "ACTIVE"),
            TransactionState::Committed => write!(f, "COMMITTED"),
            TransactionState::Aborted => write!(f, "ABORTED"),
        }
    }
}

#[derive(Debug)]
pub struct Transaction {
    id: TransactionId,

    /// Identity of the store that began this transaction.
    store_id: u64,

    state: TransactionState,

    locks: HashMap<ShardId, RowLockGuard>,

    /// Buffered writes, applied on commit.
    changes: BTreeMap<ShardId, Change>,

    counters: Arc<TransactionCounters>,

    start_time: std::time::Instant,
}

impl Transaction {
    pub(crate) fn new(store_id: u64, counters: Arc<TransactionCounters>) -> Self {
        Self {
            id: TransactionId::new(),
            store_id,
            state: TransactionState::Active,
            locks: HashMap::new(),
            changes: BTreeMap::new(),
            counters,
            start_time: std::time::Instant::now(),
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn store_id(&self) -> u64 {
        self.store_id
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    pub fn duration(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }

    pub fn change_count(&self) -> usize {
        self.changes.len()
    }

    /// Strongest lock this transaction holds on the row, if any.
    pub fn lock_mode(&self, shard_id: ShardId) -> Option<LockMode> {
        self.locks.get(&shard_id).map(RowLockGuard::mode)
    }

    pub fn held_lock_count(&self) -> usize {
        self.locks.len()
    }

    pub(crate) fn ensure_active(&self) -> Result<()> {
        if !self.is_active() {
            return Err(StoreError::Transaction(format!(
                "{} is {}",
                self.id, self.state
            )));
        }
        Ok(())
    }

    pub(crate) fn hold(&mut self, shard_id: ShardId, guard: RowLockGuard) {
        self.locks.insert(shard_id, guard);
    }

    pub(crate) fn release(&mut self, shard_id: ShardId) -> Option<RowLockGuard> {
        self.locks.remove(&shard_id)
    }

    pub(crate) fn pending(&self, shard_id: ShardId) -> Option<&Change> {
        self.changes.get(&shard_id)
    }

    pub(crate) fn pending_row(&self, shard_id: ShardId) -> Option<&Row> {
        self.pending(shard_id).map(Change::row)
    }

    pub(crate) fn record_insert(&mut self, shard_id: ShardId, row: Row) {
        self.changes.insert(shard_id, Change::Insert(row));
    }

    pub(crate) fn record_update(&mut self, shard_id: ShardId, row: Row) {
        let change = match self.changes.get(&shard_id) {
            Some(Change::Insert(_)) => Change::Insert(row),
            _ => Change::Update(row),
        };
        self.changes.insert(shard_id, change);
    }

    pub(crate) fn take_changes(&mut self) -> BTreeMap<ShardId, Change> {
        std::mem::take(&mut self.changes)
    }

    /// Moves to a terminal state, dropping buffered writes and every lock.
    pub(crate) fn finish(&mut self, state: TransactionState) {
        if !self.state.is_active() {
            return;
        }
        self.state = state;
        self.changes.clear();
        self.locks.clear();
        self.counters.finished(state);
        debug!(txn = %self.id, %state, elapsed_us = self.duration().as_micros() as u64, "transaction finished");
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.state.is_active() {
            debug!(txn = %self.id, changes = self.changes.len(), "dropping active transaction");
            self.finish(TransactionState::Aborted);
        }
    }
}
