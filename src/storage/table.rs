use super::convert::shard_id_of;
use crate::core::{Column, DataType, Result, Row, Schema, StoreError};
use crate::shard::ShardId;
use crate::transaction::Change;
use std::collections::BTreeMap;

pub const SHARDS_TABLE: &str = "shards";

#[derive(Debug, Clone)]
pub struct TableSchema {
    name: String,
    schema: Schema,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            schema: Schema::new(columns),
        }
    }

    /// Layout of the `shards` table, one column per record field.
    pub fn shards() -> Self {
        Self::new(
            SHARDS_TABLE,
            vec![
                Column::new("shard_id", DataType::Integer).primary_key(),
                Column::new("owner", DataType::Text).not_null(),
                Column::new("range_id", DataType::Integer).not_null(),
                Column::new("stolen_since_renew", DataType::Integer).not_null(),
                Column::new("updated_at", DataType::Timestamp).not_null(),
                Column::new("replication_ack_level", DataType::Integer).not_null(),
                Column::new("transfer_ack_level", DataType::Integer).not_null(),
                Column::new("timer_ack_level", DataType::Timestamp).not_null(),
                Column::new("cluster_transfer_ack_level", DataType::Blob).not_null(),
                Column::new("cluster_timer_ack_level", DataType::Blob).not_null(),
                Column::new("domain_notification_version", DataType::Integer).not_null(),
            ],
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}

/// The `shards` table: one row per shard id, committed data only.
#[derive(Debug, Clone)]
pub struct ShardTable {
    schema: TableSchema,
    rows: BTreeMap<ShardId, Row>,
}

impl ShardTable {
    pub fn new() -> Self {
        Self {
            schema: TableSchema::shards(),
            rows: BTreeMap::new(),
        }
    }

    pub fn get(&self, shard_id: ShardId) -> Option<&Row> {
        self.rows.get(&shard_id)
    }

    pub fn contains(&self, shard_id: ShardId) -> bool {
        self.rows.contains_key(&shard_id)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Applies a transaction's buffered writes, all or nothing.
    ///
    /// Inserts fail on an existing key, updates on a missing one (zero rows
    /// affected). Each row must match the schema and carry its own key.
    pub fn apply(&mut self, changes: BTreeMap<ShardId, Change>) -> Result<()> {
        for (shard_id, change) in &changes {
            self.schema.schema().validate_row(change.row())?;
            if shard_id_of(change.row())? != *shard_id {
                return Err(StoreError::TypeMismatch(format!(
                    "{}: row buffered for shard {} carries another key",
                    self.schema.name(),
                    shard_id
                )));
            }
            let exists = self.contains(*shard_id);
            if change.is_insert() && exists {
                return Err(StoreError::DuplicateKey(*shard_id));
            }
            if !change.is_insert() && !exists {
                return Err(StoreError::NotFound(*shard_id));
            }
        }
        for (shard_id, change) in changes {
            self.rows.insert(shard_id, change.into_row());
        }
        Ok(())
    }
}

impl Default for ShardTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shard::{RangeId, ShardRecord};
    use crate::storage::convert::RowCodec;

    fn row(shard_id: i32, owner: &str, range_id: i64) -> Row {
        RowCodec::default()
            .to_row(&ShardRecord::new(ShardId(shard_id), owner, RangeId(range_id)))
            .unwrap()
    }

    fn one(shard_id: i32, change: Change) -> BTreeMap<ShardId, Change> {
        BTreeMap::from([(ShardId(shard_id), change)])
    }

    #[test]
    fn test_insert_then_duplicate() {
        let mut table = ShardTable::new();
        table.apply(one(1, Change::Insert(row(1, "a", 1)))).unwrap();
        let err = table.apply(one(1, Change::Insert(row(1, "b", 2)))).unwrap_err();
        assert_eq!(err, StoreError::DuplicateKey(ShardId(1)));
        assert_eq!(table.row_count(), 1);
    }

    #[test]
    fn test_update_missing_row_affects_nothing() {
        let mut table = ShardTable::new();
        let err = table.apply(one(4, Change::Update(row(4, "a", 1)))).unwrap_err();
        assert_eq!(err, StoreError::NotFound(ShardId(4)));
        assert!(!table.contains(ShardId(4)));
    }

    #[test]
    fn test_apply_is_all_or_nothing() {
        let mut table = ShardTable::new();
        table.apply(one(1, Change::Insert(row(1, "a", 1)))).unwrap();

        let mut changes = BTreeMap::new();
        changes.insert(ShardId(1), Change::Update(row(1, "b", 2)));
        changes.insert(ShardId(2), Change::Update(row(2, "b", 2)));
        assert_eq!(table.apply(changes).unwrap_err(), StoreError::NotFound(ShardId(2)));

        let kept = RowCodec::default().from_row(table.get(ShardId(1)).unwrap()).unwrap();
        assert_eq!(kept.owner, "a");
    }

    #[test]
    fn test_schema_rejects_malformed_row() {
        let mut table = ShardTable::new();
        let mut bad = row(1, "a", 1);
        bad.pop();
        let err = table.apply(one(1, Change::Insert(bad))).unwrap_err();
        assert!(matches!(err, StoreError::TypeMismatch(_)));
        assert_eq!(table.row_count(), 0);
    }

    #[test]
    fn test_row_key_must_match_change_key() {
        let mut table = ShardTable::new();
        let err = table.apply(one(2, Change::Insert(row(1, "a", 1)))).unwrap_err();
        assert!(matches!(err, StoreError::TypeMismatch(_)));
    }
}
