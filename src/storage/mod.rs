pub mod convert;
pub mod engine;
pub mod memory;
pub mod table;

pub use convert::{DateTimeConverter, RowCodec};
pub use engine::ShardStore;
pub use memory::InMemoryShardStore;
pub use table::{SHARDS_TABLE, ShardTable, TableSchema};
