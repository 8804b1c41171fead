// ============================================================================
// Shard Row Codec
// ============================================================================
//
// Maps a ShardRecord onto a row of the `shards` table and back.
// Time-valued columns go through DateTimeConverter; the per-cluster ack
// level maps are stored as MessagePack blobs.
//
// ============================================================================

use crate::core::{Result, Row, StoreError, Value};
use crate::shard::{RangeId, ShardId, ShardRecord, zero_time};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;

pub const COL_SHARD_ID: usize = 0;
pub const COL_OWNER: usize = 1;
pub const COL_RANGE_ID: usize = 2;
pub const COL_STOLEN_SINCE_RENEW: usize = 3;
pub const COL_UPDATED_AT: usize = 4;
pub const COL_REPLICATION_ACK_LEVEL: usize = 5;
pub const COL_TRANSFER_ACK_LEVEL: usize = 6;
pub const COL_TIMER_ACK_LEVEL: usize = 7;
pub const COL_CLUSTER_TRANSFER_ACK_LEVEL: usize = 8;
pub const COL_CLUSTER_TIMER_ACK_LEVEL: usize = 9;
pub const COL_DOMAIN_NOTIFICATION_VERSION: usize = 10;

/// Smallest value a backend DATETIME column accepts (1000-01-01 00:00:00).
pub fn min_storage_datetime() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1000, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or(NaiveDateTime::MIN)
}

/// Normalizes timestamps into the backend's DATETIME range.
///
/// The zero time lies outside that range, so it is stored as the range
/// minimum and the minimum reads back as the zero time. The minimum itself
/// and anything earlier are refused on write.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateTimeConverter;

impl DateTimeConverter {
    pub fn to_storage(&self, t: DateTime<Utc>) -> Result<NaiveDateTime> {
        if t == zero_time() {
            return Ok(min_storage_datetime());
        }
        let naive = t.naive_utc();
        if naive <= min_storage_datetime() {
            return Err(StoreError::Codec(format!(
                "timestamp {} is outside the storable range",
                t.to_rfc3339()
            )));
        }
        Ok(naive)
    }

    pub fn from_storage(&self, t: NaiveDateTime) -> DateTime<Utc> {
        if t == min_storage_datetime() {
            return zero_time();
        }
        t.and_utc()
    }
}

/// Encodes records into `shards` rows, in column order.
#[derive(Debug, Clone, Copy, Default)]
pub struct RowCodec {
    converter: DateTimeConverter,
}

impl RowCodec {
    pub fn new(converter: DateTimeConverter) -> Self {
        Self { converter }
    }

    pub fn to_row(&self, record: &ShardRecord) -> Result<Row> {
        Ok(vec![
            Value::from(record.shard_id.as_i32()),
            Value::from(record.owner.as_str()),
            Value::from(record.range_id.as_i64()),
            Value::from(record.stolen_since_renew),
            Value::Timestamp(self.converter.to_storage(record.updated_at)?),
            Value::from(record.replication_ack_level),
            Value::from(record.transfer_ack_level),
            Value::Timestamp(self.converter.to_storage(record.timer_ack_level)?),
            Value::Blob(encode_map(&record.cluster_transfer_ack_level)?),
            Value::Blob(encode_map(&record.cluster_timer_ack_level)?),
            Value::from(record.domain_notification_version),
        ])
    }

    pub fn from_row(&self, row: &Row) -> Result<ShardRecord> {
        Ok(ShardRecord {
            shard_id: shard_id_of(row)?,
            owner: text(row, COL_OWNER)?.to_string(),
            range_id: range_id_of(row)?,
            stolen_since_renew: narrow(integer(row, COL_STOLEN_SINCE_RENEW)?, COL_STOLEN_SINCE_RENEW)?,
            updated_at: self.converter.from_storage(timestamp(row, COL_UPDATED_AT)?),
            replication_ack_level: integer(row, COL_REPLICATION_ACK_LEVEL)?,
            transfer_ack_level: integer(row, COL_TRANSFER_ACK_LEVEL)?,
            timer_ack_level: self.converter.from_storage(timestamp(row, COL_TIMER_ACK_LEVEL)?),
            cluster_transfer_ack_level: decode_map(blob(row, COL_CLUSTER_TRANSFER_ACK_LEVEL)?)?,
            cluster_timer_ack_level: decode_map(blob(row, COL_CLUSTER_TIMER_ACK_LEVEL)?)?,
            domain_notification_version: integer(row, COL_DOMAIN_NOTIFICATION_VERSION)?,
        })
    }
}

pub fn shard_id_of(row: &Row) -> Result<ShardId> {
    Ok(ShardId(narrow(integer(row, COL_SHARD_ID)?, COL_SHARD_ID)?))
}

pub fn range_id_of(row: &Row) -> Result<RangeId> {
    Ok(RangeId(integer(row, COL_RANGE_ID)?))
}

fn encode_map<T: Serialize>(map: &T) -> Result<Vec<u8>> {
    Ok(rmp_serde::to_vec(map)?)
}

fn decode_map<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(rmp_serde::from_slice(bytes)?)
}

fn column(row: &Row, idx: usize) -> Result<&Value> {
    row.get(idx)
        .ok_or_else(|| StoreError::Codec(format!("row has no column {}", idx)))
}

fn mismatch(idx: usize, expected: &str, got: &Value) -> StoreError {
    StoreError::Codec(format!(
        "column {} expected {}, got {}",
        idx,
        expected,
        got.type_name()
    ))
}

fn integer(row: &Row, idx: usize) -> Result<i64> {
    let value = column(row, idx)?;
    value.as_i64().ok_or_else(|| mismatch(idx, "INTEGER", value))
}

fn text(row: &Row, idx: usize) -> Result<&str> {
    let value = column(row, idx)?;
    value.as_str().ok_or_else(|| mismatch(idx, "TEXT", value))
}

fn timestamp(row: &Row, idx: usize) -> Result<NaiveDateTime> {
    let value = column(row, idx)?;
    value.as_timestamp().ok_or_else(|| mismatch(idx, "DATETIME", value))
}

fn blob(row: &Row, idx: usize) -> Result<&[u8]> {
    let value = column(row, idx)?;
    value.as_blob().ok_or_else(|| mismatch(idx, "BLOB", value))
}

fn narrow(value: i64, idx: usize) -> Result<i32> {
    i32::try_from(value)
        .map_err(|_| StoreError::Codec(format!("column {} value {} overflows i32", idx, value)))
}
