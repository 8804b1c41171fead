use crate::core::Row;

/// A write buffered in a transaction until commit.
///
/// One entry per shard; later writes replace earlier ones, and an update of
/// a row the same transaction inserted stays an insert.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Insert(Row),
    Update(Row),
}

impl Change {
    pub fn row(&self) -> &Row {
        match self {
            Change::Insert(row) | Change::Update(row) => row,
        }
    }

    pub fn into_row(self) -> Row {
        match self {
            Change::Insert(row) | Change::Update(row) => row,
        }
    }

    pub fn is_insert(&self) -> bool {
        matches!(self, Change::Insert(_))
    }
}
