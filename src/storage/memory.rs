use super::convert::{RowCodec, range_id_of};
use super::engine::ShardStore;
use super::table::ShardTable;
use crate::config::StoreConfig;
use crate::core::{Result, Row, StoreError};
use crate::shard::{RangeId, ShardId, ShardRecord};
use crate::transaction::{
    LockMode, RowLockTable, Transaction, TransactionManager, TransactionState, TransactionStats,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

/// In-process shard store with row-level locking.
///
/// Committed rows live in a single [`ShardTable`]; row locks come from a
/// [`RowLockTable`] and are parked in the caller's transaction.
pub struct InMemoryShardStore {
    table: RwLock<ShardTable>,
    locks: RowLockTable,
    transactions: TransactionManager,
    codec: RowCodec,
    config: StoreConfig,
    available: AtomicBool,
}

impl InMemoryShardStore {
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            table: RwLock::new(ShardTable::new()),
            locks: RowLockTable::new(),
            transactions: TransactionManager::new(),
            codec: RowCodec::default(),
            config,
            available: AtomicBool::new(true),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Simulates the backend going away: while unavailable every operation
    /// fails with a transient error.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    pub fn transaction_stats(&self) -> TransactionStats {
        self.transactions.stats()
    }

    /// Number of committed rows.
    pub async fn row_count(&self) -> usize {
        self.table.read().await.row_count()
    }

    fn check_available(&self) -> Result<()> {
        if !self.is_available() {
            return Err(StoreError::Transient("backend unavailable".into()));
        }
        Ok(())
    }

    fn check_transaction(&self, txn: &Transaction) -> Result<()> {
        self.check_available()?;
        if !self.transactions.owns(txn) {
            return Err(StoreError::Transaction(format!(
                "{} does not belong to this store",
                txn.id()
            )));
        }
        txn.ensure_active()
    }

    /// Takes the row lock for `txn`. Returns true when the transaction held no
    /// lock on the row before.
    ///
    /// A shared lock is upgraded by giving it up and then waiting for the
    /// exclusive one, so two upgraders never wait on each other. If that wait
    /// times out the transaction is left holding no lock on the row.
    async fn lock_row(&self, txn: &mut Transaction, shard_id: ShardId, mode: LockMode) -> Result<bool> {
        let held = txn.lock_mode(shard_id);
        if let Some(held) = held
            && held.covers(mode)
        {
            return Ok(false);
        }
        if held.is_some() {
            txn.release(shard_id);
            debug!(txn = %txn.id(), shard_id = %shard_id, "upgrading shared row lock");
        }
        let guard = self
            .locks
            .acquire(shard_id, mode, self.config.lock_wait_timeout)
            .await?;
        debug!(txn = %txn.id(), shard_id = %shard_id, ?mode, "row lock acquired");
        txn.hold(shard_id, guard);
        Ok(held.is_none())
    }

    /// Gives back a lock taken for a row that turned out not to exist.
    async fn unlock_missing(&self, txn: &mut Transaction, shard_id: ShardId) {
        txn.release(shard_id);
        self.locks.forget(shard_id).await;
    }

    /// The row as this transaction sees it: its own pending write, else the
    /// committed row.
    async fn visible_row(&self, txn: &Transaction, shard_id: ShardId) -> Result<Row> {
        if let Some(row) = txn.pending_row(shard_id) {
            return Ok(row.clone());
        }
        let table = self.table.read().await;
        table
            .get(shard_id)
            .cloned()
            .ok_or(StoreError::NotFound(shard_id))
    }

    async fn row_exists(&self, txn: &Transaction, shard_id: ShardId) -> bool {
        txn.pending(shard_id).is_some() || self.table.read().await.contains(shard_id)
    }

    async fn locked_range_id(
        &self,
        txn: &mut Transaction,
        shard_id: ShardId,
        mode: LockMode,
    ) -> Result<RangeId> {
        self.check_transaction(txn)?;
        let fresh = self.lock_row(txn, shard_id, mode).await?;
        match self.visible_row(txn, shard_id).await {
            Ok(row) => range_id_of(&row),
            Err(err) => {
                if fresh {
                    self.unlock_missing(txn, shard_id).await;
                }
                Err(err)
            }
        }
    }
}

impl Default for InMemoryShardStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ShardStore for InMemoryShardStore {
    async fn begin(&self) -> Result<Transaction> {
        self.check_available()?;
        Ok(self.transactions.begin())
    }

    async fn commit(&self, mut txn: Transaction) -> Result<()> {
        // On any error below `txn` is dropped, which aborts it.
        self.check_transaction(&txn)?;
        let changes = txn.take_changes();
        if !changes.is_empty() {
            let mut table = self.table.write().await;
            table.apply(changes)?;
        }
        txn.finish(TransactionState::Committed);
        Ok(())
    }

    async fn rollback(&self, mut txn: Transaction) -> Result<()> {
        if !self.transactions.owns(&txn) {
            return Err(StoreError::Transaction(format!(
                "{} does not belong to this store",
                txn.id()
            )));
        }
        txn.finish(TransactionState::Aborted);
        Ok(())
    }

    async fn insert_shard(&self, txn: &mut Transaction, record: &ShardRecord) -> Result<()> {
        self.check_transaction(txn)?;
        let row = self.codec.to_row(record)?;
        self.lock_row(txn, record.shard_id, LockMode::Exclusive).await?;
        if self.row_exists(txn, record.shard_id).await {
            return Err(StoreError::DuplicateKey(record.shard_id));
        }
        txn.record_insert(record.shard_id, row);
        debug!(txn = %txn.id(), shard_id = %record.shard_id, range_id = %record.range_id, "shard inserted");
        Ok(())
    }

    async fn update_shard(&self, txn: &mut Transaction, record: &ShardRecord) -> Result<()> {
        self.check_transaction(txn)?;
        let row = self.codec.to_row(record)?;
        let fresh = self.lock_row(txn, record.shard_id, LockMode::Exclusive).await?;
        if !self.row_exists(txn, record.shard_id).await {
            if fresh {
                self.unlock_missing(txn, record.shard_id).await;
            }
            return Err(StoreError::NotFound(record.shard_id));
        }
        txn.record_update(record.shard_id, row);
        debug!(txn = %txn.id(), shard_id = %record.shard_id, range_id = %record.range_id, "shard updated");
        Ok(())
    }

    async fn select_shard(&self, txn: &Transaction, shard_id: ShardId) -> Result<ShardRecord> {
        self.check_transaction(txn)?;
        let row = self.visible_row(txn, shard_id).await?;
        self.codec.from_row(&row)
    }

    async fn read_lock_shard(&self, txn: &mut Transaction, shard_id: ShardId) -> Result<RangeId> {
        self.locked_range_id(txn, shard_id, LockMode::Shared).await
    }

    async fn write_lock_shard(
        &self,
        txn: &mut Transaction,
        shard_id: ShardId,
    ) -> Result<RangeId> {
        self.locked_range_id(txn, shard_id, LockMode::Exclusive).await
    }
}
