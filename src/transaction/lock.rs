// ============================================================================
// Row Locks
// ============================================================================
//
// One tokio RwLock per shard id. Shared locks are read guards, exclusive
// locks are write guards. Guards are owned so a Transaction can hold them
// until it commits, aborts or is dropped.
//
// ============================================================================

use crate::core::{Result, StoreError};
use crate::shard::ShardId;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

impl LockMode {
    /// Whether holding `self` already grants `wanted`.
    pub fn covers(&self, wanted: LockMode) -> bool {
        matches!(
            (self, wanted),
            (LockMode::Exclusive, _) | (LockMode::Shared, LockMode::Shared)
        )
    }
}

#[derive(Debug)]
pub enum RowLockGuard {
    Shared(OwnedRwLockReadGuard<()>),
    Exclusive(OwnedRwLockWriteGuard<()>),
}

impl RowLockGuard {
    pub fn mode(&self) -> LockMode {
        match self {
            RowLockGuard::Shared(_) => LockMode::Shared,
            RowLockGuard::Exclusive(_) => LockMode::Exclusive,
        }
    }
}

#[derive(Default)]
pub struct RowLockTable {
    locks: Mutex<HashMap<ShardId, Arc<RwLock<()>>>>,
}

impl RowLockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for the row lock, giving up after `wait` with a transient error.
    pub async fn acquire(
        &self,
        shard_id: ShardId,
        mode: LockMode,
        wait: Option<Duration>,
    ) -> Result<RowLockGuard> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(shard_id)
                .or_insert_with(|| Arc::new(RwLock::new(())))
                .clone()
        };

        match mode {
            LockMode::Shared => bounded(shard_id, wait, lock.read_owned())
                .await
                .map(RowLockGuard::Shared),
            LockMode::Exclusive => bounded(shard_id, wait, lock.write_owned())
                .await
                .map(RowLockGuard::Exclusive),
        }
    }

    /// Drops the row's entry once no transaction holds or waits for it.
    pub async fn forget(&self, shard_id: ShardId) {
        let mut locks = self.locks.lock().await;
        if locks
            .get(&shard_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&shard_id);
        }
    }

    /// Number of rows with a lock entry.
    pub async fn tracked_rows(&self) -> usize {
        self.locks.lock().await.len()
    }
}

async fn bounded<T>(
    shard_id: ShardId,
    wait: Option<Duration>,
    fut: impl Future<Output = T>,
) -> Result<T> {
    match wait {
        Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
            StoreError::Transient(format!("lock wait timeout exceeded for shard {}", shard_id))
        }),
        None => Ok(fut.await),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHORT: Option<Duration> = Some(Duration::from_millis(50));

    #[test]
    fn test_lock_mode_coverage() {
        assert!(LockMode::Exclusive.covers(LockMode::Shared));
        assert!(LockMode::Exclusive.covers(LockMode::Exclusive));
        assert!(LockMode::Shared.covers(LockMode::Shared));
        assert!(!LockMode::Shared.covers(LockMode::Exclusive));
    }

    #[tokio::test]
    async fn test_shared_locks_are_compatible() {
        let table = RowLockTable::new();
        let a = table.acquire(ShardId(1), LockMode::Shared, SHORT).await.unwrap();
        let b = table.acquire(ShardId(1), LockMode::Shared, SHORT).await.unwrap();
        assert_eq!(a.mode(), LockMode::Shared);
        assert_eq!(b.mode(), LockMode::Shared);
    }

    #[tokio::test]
    async fn test_exclusive_waits_for_shared_and_times_out() {
        let table = RowLockTable::new();
        let _shared = table.acquire(ShardId(1), LockMode::Shared, SHORT).await.unwrap();
        let err = table
            .acquire(ShardId(1), LockMode::Exclusive, SHORT)
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_released_lock_can_be_reacquired() {
        let table = RowLockTable::new();
        let guard = table.acquire(ShardId(1), LockMode::Exclusive, SHORT).await.unwrap();
        drop(guard);
        assert!(table.acquire(ShardId(1), LockMode::Exclusive, SHORT).await.is_ok());
    }

    #[tokio::test]
    async fn test_forget_keeps_entries_in_use() {
        let table = RowLockTable::new();
        let guard = table.acquire(ShardId(1), LockMode::Shared, SHORT).await.unwrap();
        table.forget(ShardId(1)).await;
        assert_eq!(table.tracked_rows().await, 1);

        drop(guard);
        table.forget(ShardId(1)).await;
        assert_eq!(table.tracked_rows().await, 0);
    }

    #[tokio::test]
    async fn test_locks_on_different_rows_are_independent() {
        let table = RowLockTable::new();
        let _one = table.acquire(ShardId(1), LockMode::Exclusive, SHORT).await.unwrap();
        assert!(table.acquire(ShardId(2), LockMode::Exclusive, SHORT).await.is_ok());
    }
}
