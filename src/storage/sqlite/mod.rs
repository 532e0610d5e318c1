//! SQLite storage implementations.

mod ledger;
mod session_store;

pub use ledger::SqliteLedger;
pub use session_store::SqliteSessionStore;
