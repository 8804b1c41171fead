// ============================================================================
// Transaction Management Module
// ============================================================================
//
// Transactions are created by a store and passed back into it by the caller.
// Row locks and buffered writes are scoped to the transaction handle, so
// they are released on commit, on rollback and when the handle is dropped.
//
// ============================================================================

pub mod change;
pub mod lock;
pub mod manager;
pub mod state;

pub use change::Change;
pub use lock::{LockMode, RowLockGuard, RowLockTable};
pub use manager::{TransactionManager, TransactionStats};
pub use state::{Transaction, TransactionId, TransactionState};
