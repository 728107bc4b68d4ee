// ============================================================================
// Unit of Work
// ============================================================================
//
// Identity map, change tracker and the session that ties them to a store.
//
// Rows are mutated in place on the managed copy. Field writes that must be
// flushed regardless of the dirty check are registered with an explicit
// old/new pair; collection edits are detected by comparing against the
// snapshot taken when the row was loaded.
//
// ============================================================================

pub mod change;
pub mod session;
pub mod unit_of_work;

pub use change::Change;
pub use session::Session;
pub use unit_of_work::{FlushSummary, Savepoint, UnitOfWork};
