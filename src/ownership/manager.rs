// ============================================================================
// Shard Manager
// ============================================================================
//
// Caller-side fencing on top of a ShardStore. Every mutating cycle is
//
//   begin → write_lock (returns current range id) → compare → update → commit
//
// and aborts with StaleFencingToken when the range id moved underneath the
// caller. Transient failures are retried from scratch with backoff.
//
// ============================================================================

use super::clock::{Clock, SystemClock};
use super::retry::RetryPolicy;
use crate::core::{Result, StoreError};
use crate::shard::{RangeId, ShardId, ShardRecord};
use crate::storage::ShardStore;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct ShardManager<S: ShardStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
}

impl<S: ShardStore> ShardManager<S> {
    pub fn new(store: Arc<S>, retry: RetryPolicy) -> Self {
        Self::with_clock(store, retry, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<S>, retry: RetryPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            retry,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub async fn create_shard(&self, record: &ShardRecord) -> Result<()> {
        self.retrying("create_shard", record.shard_id, move || self.store.create(record))
            .await
    }

    pub async fn get_shard(&self, shard_id: ShardId) -> Result<ShardRecord> {
        self.retrying("get_shard", shard_id, move || self.store.read(shard_id))
            .await
    }

    /// Persists `record` only if the shard still carries `previous_range_id`.
    ///
    /// `record.range_id` may equal `previous_range_id` (progress update) or be
    /// larger (range renewal); a smaller value is refused.
    pub async fn update_shard(
        &self,
        record: &ShardRecord,
        previous_range_id: RangeId,
    ) -> Result<()> {
        if record.range_id < previous_range_id {
            return Err(StoreError::StaleFencingToken {
                shard_id: record.shard_id,
                expected: previous_range_id,
                actual: record.range_id,
            });
        }
        self.retrying("update_shard", record.shard_id, move || {
            self.try_update(record, previous_range_id)
        })
        .await
    }

    /// Takes the shard for `owner` regardless of who holds it now.
    ///
    /// Returns the record as written, carrying the new range id.
    pub async fn acquire_shard(&self, shard_id: ShardId, owner: &str) -> Result<ShardRecord> {
        self.retrying("acquire_shard", shard_id, move || {
            self.take_ownership(shard_id, owner, None)
        })
        .await
    }

    /// Renews ownership only if nobody moved the range id since `expected`.
    pub async fn renew_shard(
        &self,
        shard_id: ShardId,
        owner: &str,
        expected: RangeId,
    ) -> Result<ShardRecord> {
        self.retrying("renew_shard", shard_id, move || {
            self.take_ownership(shard_id, owner, Some(expected))
        })
        .await
    }

    /// Confirms under a shared lock that `range_id` is still current.
    pub async fn assert_owner(&self, shard_id: ShardId, range_id: RangeId) -> Result<()> {
        self.retrying("assert_owner", shard_id, move || self.try_assert(shard_id, range_id))
            .await
    }

    async fn try_update(&self, record: &ShardRecord, previous: RangeId) -> Result<()> {
        let mut txn = self.store.begin().await?;
        let current = self.store.write_lock_shard(&mut txn, record.shard_id).await?;
        if current != previous {
            self.store.rollback(txn).await?;
            return Err(stale(record.shard_id, previous, current));
        }
        self.store.update_shard(&mut txn, record).await?;
        self.store.commit(txn).await
    }

    async fn take_ownership(
        &self,
        shard_id: ShardId,
        owner: &str,
        expected: Option<RangeId>,
    ) -> Result<ShardRecord> {
        let mut txn = self.store.begin().await?;
        let current = self.store.write_lock_shard(&mut txn, shard_id).await?;
        if let Some(expected) = expected
            && current != expected
        {
            self.store.rollback(txn).await?;
            return Err(stale(shard_id, expected, current));
        }

        let mut record = self.store.select_shard(&txn, shard_id).await?;
        if record.owner == owner {
            record.stolen_since_renew = 0;
        } else {
            record.stolen_since_renew = record.stolen_since_renew.saturating_add(1);
            record.owner = owner.to_string();
        }
        record.range_id = current
            .next()
            .ok_or(StoreError::RangeExhausted(shard_id))?;
        record.updated_at = self.clock.now();

        self.store.update_shard(&mut txn, &record).await?;
        self.store.commit(txn).await?;
        debug!(shard_id = %shard_id, owner, range_id = %record.range_id, "shard ownership taken");
        Ok(record)
    }

    async fn try_assert(&self, shard_id: ShardId, range_id: RangeId) -> Result<()> {
        let mut txn = self.store.begin().await?;
        let current = self.store.read_lock_shard(&mut txn, shard_id).await?;
        self.store.rollback(txn).await?;
        if current != range_id {
            return Err(stale(shard_id, range_id, current));
        }
        Ok(())
    }

    async fn retrying<T, F, Fut>(&self, op: &'static str, shard_id: ShardId, mut attempt: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match attempt().await {
                Err(err) if err.is_transient() && self.retry.should_retry(attempts) => {
                    let delay = self.retry.next_delay(attempts);
                    warn!(op, shard_id = %shard_id, attempts, ?delay, error = %err, "transient failure, retrying");
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }
}

fn stale(shard_id: ShardId, expected: RangeId, actual: RangeId) -> StoreError {
    warn!(shard_id = %shard_id, expected = %expected, actual = %actual, "stale fencing token");
    StoreError::StaleFencingToken {
        shard_id,
        expected,
        actual,
    }
}
