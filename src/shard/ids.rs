use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a shard; the primary key of the `shards` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShardId(pub i32);

impl ShardId {
    pub fn as_i32(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for ShardId {
    fn from(id: i32) -> Self {
        ShardId(id)
    }
}

/// Fencing token of a shard.
///
/// Every ownership change or renewal writes a larger range id; holders of an
/// older value are stale writers and must stop acting on the shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RangeId(pub i64);

impl RangeId {
    pub fn as_i64(&self) -> i64 {
        self.0
    }

    /// The token the next ownership cycle must write, `None` once the range
    /// is exhausted.
    pub fn next(&self) -> Option<RangeId> {
        self.0.checked_add(1).map(RangeId)
    }
}

impl fmt::Display for RangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for RangeId {
    fn from(id: i64) -> Self {
        RangeId(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_id_next_is_strictly_greater() {
        let r = RangeId(41);
        assert_eq!(r.next(), Some(RangeId(42)));
        assert!(r.next().unwrap() > r);
    }

    #[test]
    fn test_range_id_next_at_max() {
        assert_eq!(RangeId(i64::MAX).next(), None);
    }

    #[test]
    fn test_ids_serialize_as_plain_numbers() {
        assert_eq!(serde_json::to_string(&ShardId(7)).unwrap(), "7");
        assert_eq!(serde_json::to_string(&RangeId(-1)).unwrap(), "-1");
    }
}
