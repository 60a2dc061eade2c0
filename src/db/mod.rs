//! Database module: models and schema for persistent storage.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring DB rows
//! - `schema.rs`: SQL DDL for initializing the database (SQLite-first)
//! - `sqlite.rs`: the query layer used by the ledger, auth and archive code
//! - `retry.rs`: backoff policy for transient storage faults

pub mod models;
pub(crate) mod retry;
pub mod schema;
pub mod sqlite;
#[cfg(test)]
pub(crate) mod testing;

pub use models::{Expense, HistoryEntry, User, UserId};
pub use schema::SQLITE_INIT;
pub(crate) use retry::retry_storage;
pub use sqlite::{BudgetStorage, SqlitePool};
