// ============================================================================
// Transaction Management Module
// ============================================================================
//
// Transaction-scoped connection leasing. A `Session` is the per-request
// handle: the first `run_in_transaction` leases a connection and switches
// auto-commit off, nested calls reuse it, and only the outermost scope
// commits or rolls back, restores auto-commit and returns the connection.
//
// ============================================================================

pub mod manager;
pub mod state;

pub use manager::{DaoManager, Session};
pub use state::ScopeState;
