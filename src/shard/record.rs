use super::{RangeId, ShardId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Remote cluster name → transfer-queue watermark.
pub type ClusterTransferAckLevels = BTreeMap<String, i64>;

/// Remote cluster name → timer-queue watermark.
pub type ClusterTimerAckLevels = BTreeMap<String, DateTime<Utc>>;

/// The "never" timestamp (0001-01-01T00:00:00Z), used for unset time fields.
pub fn zero_time() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(1, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|t| t.and_utc())
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Ownership and progress state of one shard.
///
/// Ack levels only move forward for a correct caller; the store overwrites
/// whatever it is given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardRecord {
    pub shard_id: ShardId,
    pub owner: String,
    pub range_id: RangeId,
    pub stolen_since_renew: i32,
    pub updated_at: DateTime<Utc>,
    pub replication_ack_level: i64,
    pub transfer_ack_level: i64,
    pub timer_ack_level: DateTime<Utc>,
    pub cluster_transfer_ack_level: ClusterTransferAckLevels,
    pub cluster_timer_ack_level: ClusterTimerAckLevels,
    pub domain_notification_version: i64,
}

impl ShardRecord {
    /// A freshly assigned shard: no progress yet, timestamps at [`zero_time`].
    pub fn new(shard_id: ShardId, owner: impl Into<String>, range_id: RangeId) -> Self {
        Self {
            shard_id,
            owner: owner.into(),
            range_id,
            stolen_since_renew: 0,
            updated_at: zero_time(),
            replication_ack_level: 0,
            transfer_ack_level: 0,
            timer_ack_level: zero_time(),
            cluster_transfer_ack_level: ClusterTransferAckLevels::new(),
            cluster_timer_ack_level: ClusterTimerAckLevels::new(),
            domain_notification_version: 0,
        }
    }

    pub fn transfer_ack_level_for(&self, cluster: &str) -> Option<i64> {
        self.cluster_transfer_ack_level.get(cluster).copied()
    }

    pub fn timer_ack_level_for(&self, cluster: &str) -> Option<DateTime<Utc>> {
        self.cluster_timer_ack_level.get(cluster).copied()
    }
}
