// ============================================================================
// Transaction Manager
// ============================================================================

use super::{Transaction, TransactionState};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tracing::debug;

static NEXT_STORE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Default)]
pub struct TransactionCounters {
    active: AtomicUsize,
    committed: AtomicU64,
    aborted: AtomicU64,
}

impl TransactionCounters {
    fn started(&self) {
        self.active.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn finished(&self, state: TransactionState) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        match state {
            TransactionState::Committed => self.committed.fetch_add(1, Ordering::SeqCst),
            _ => self.aborted.fetch_add(1, Ordering::SeqCst),
        };
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionStats {
    pub active: usize,
    pub committed: u64,
    pub aborted: u64,
}

/// Hands out transactions bound to one store instance and counts their outcomes.
#[derive(Debug)]
pub struct TransactionManager {
    store_id: u64,
    counters: Arc<TransactionCounters>,
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionManager {
    pub fn new() -> Self {
        Self {
            store_id: NEXT_STORE_ID.fetch_add(1, Ordering::SeqCst),
            counters: Arc::new(TransactionCounters::default()),
        }
    }

    pub fn store_id(&self) -> u64 {
        self.store_id
    }

    pub fn begin(&self) -> Transaction {
        self.counters.started();
        let txn = Transaction::new(self.store_id, Arc::clone(&self.counters));
        debug!(txn = %txn.id(), store = self.store_id, "transaction started");
        txn
    }

    /// Whether `txn` was begun by this manager.
    pub fn owns(&self, txn: &Transaction) -> bool {
        txn.store_id() == self.store_id
    }

    pub fn stats(&self) -> TransactionStats {
        TransactionStats {
            active: self.counters.active.load(Ordering::SeqCst),
            committed: self.counters.committed.load(Ordering::SeqCst),
            aborted: self.counters.aborted.load(Ordering::SeqCst),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_ids_increase() {
        let manager = TransactionManager::new();
        let a = manager.begin();
        let b = manager.begin();
        assert!(b.id() > a.id());
        assert_eq!(manager.stats().active, 2);
    }

    #[test]
    fn test_drop_counts_as_abort() {
        let manager = TransactionManager::new();
        {
            let txn = manager.begin();
            assert!(txn.is_active());
        }
        let stats = manager.stats();
        assert_eq!(stats.active, 0);
        assert_eq!(stats.aborted, 1);
        assert_eq!(stats.committed, 0);
    }

    #[test]
    fn test_finish_is_idempotent() {
        let manager = TransactionManager::new();
        let mut txn = manager.begin();
        txn.finish(TransactionState::Committed);
        txn.finish(TransactionState::Aborted);
        assert_eq!(txn.state(), TransactionState::Committed);
        assert!(txn.ensure_active().is_err());
        drop(txn);
        let stats = manager.stats();
        assert_eq!(stats.committed, 1);
        assert_eq!(stats.aborted, 0);
    }

    #[test]
    fn test_managers_do_not_share_transactions() {
        let first = TransactionManager::new();
        let second = TransactionManager::new();
        let txn = first.begin();
        assert!(first.owns(&txn));
        assert!(!second.owns(&txn));
    }

    #[test]
    fn test_update_after_insert_stays_insert() {
        use crate::core::Value;
        use crate::shard::ShardId;

        let manager = TransactionManager::new();
        let mut txn = manager.begin();
        txn.record_insert(ShardId(1), vec![Value::Integer(1)]);
        txn.record_update(ShardId(1), vec![Value::Integer(2)]);
        let pending = txn.pending(ShardId(1)).unwrap();
        assert!(pending.is_insert());
        assert_eq!(pending.row(), &vec![Value::Integer(2)]);
        assert_eq!(txn.change_count(), 1);
    }
}
