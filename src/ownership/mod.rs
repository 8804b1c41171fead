//! Ownership discipline layered over a [`ShardStore`](crate::storage::ShardStore).
//!
//! The store only overwrites rows and hands out locks; this module is where
//! range ids are compared, bumped and retried.

pub mod clock;
pub mod manager;
pub mod retry;

pub use clock::{Clock, FixedClock, SystemClock};
pub use manager::ShardManager;
pub use retry::RetryPolicy;
