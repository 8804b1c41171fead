pub mod ids;
pub mod record;

pub use ids::{RangeId, ShardId};
pub use record::{ClusterTimerAckLevels, ClusterTransferAckLevels, ShardRecord, zero_time};
