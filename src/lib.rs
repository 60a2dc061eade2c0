pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod ledger;
pub mod middleware;
pub mod render;
pub mod router;
pub mod savings;
pub mod service;

pub use error::BudgetError;
pub use ledger::Ledger;
pub use service::archive::{ArchiveProcess, ArchiveReport};
