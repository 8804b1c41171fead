use crate::core::Result;
use crate::shard::{RangeId, ShardId, ShardRecord};
use crate::transaction::Transaction;
use async_trait::async_trait;

/// Shard record store - allows pluggable storage backends
///
/// Every statement runs inside a caller-supplied [`Transaction`] obtained from
/// [`ShardStore::begin`]. Writes take the row's exclusive lock and become
/// visible at commit. Locks are released when the transaction commits, rolls
/// back or is dropped.
///
/// The store performs no fencing checks and no retries; see
/// [`ShardManager`](crate::ownership::ShardManager) for the caller side.
#[async_trait]
pub trait ShardStore: Send + Sync {
    async fn begin(&self) -> Result<Transaction>;

    async fn commit(&self, txn: Transaction) -> Result<()>;

    async fn rollback(&self, txn: Transaction) -> Result<()>;

    /// Insert a new shard row. Fails with `DuplicateKey` if the id exists.
    async fn insert_shard(&self, txn: &mut Transaction, record: &ShardRecord) -> Result<()>;

    /// Overwrite every field of an existing row. Fails with `NotFound` if
    /// zero rows would be affected.
    async fn update_shard(&self, txn: &mut Transaction, record: &ShardRecord) -> Result<()>;

    /// Non-locking read of the current record.
    async fn select_shard(&self, txn: &Transaction, shard_id: ShardId) -> Result<ShardRecord>;

    /// Take a shared lock on the row and return its range id.
    async fn read_lock_shard(&self, txn: &mut Transaction, shard_id: ShardId) -> Result<RangeId>;

    /// Take an exclusive lock on the row and return its range id.
    async fn write_lock_shard(&self, txn: &mut Transaction, shard_id: ShardId)
    -> Result<RangeId>;

    /// Create in its own transaction.
    async fn create(&self, record: &ShardRecord) -> Result<()> {
        let mut txn = self.begin().await?;
        self.insert_shard(&mut txn, record).await?;
        self.commit(txn).await
    }

    /// Update in its own transaction.
    async fn update(&self, record: &ShardRecord) -> Result<()> {
        let mut txn = self.begin().await?;
        self.update_shard(&mut txn, record).await?;
        self.commit(txn).await
    }

    /// Read in its own transaction.
    async fn read(&self, shard_id: ShardId) -> Result<ShardRecord> {
        let txn = self.begin().await?;
        let record = self.select_shard(&txn, shard_id).await?;
        self.commit(txn).await?;
        Ok(record)
    }
}
