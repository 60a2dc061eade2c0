use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ledger::LedgerEntry;

pub type UserId = i64;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub salary: f64,
    pub savings_goal: f64,
}

/// An active, not yet archived expense.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Expense {
    pub id: i64,
    pub user_id: UserId,
    pub category: String,
    pub amount: f64,
    pub timestamp: DateTime<Utc>,
}

/// An archived expense. Same shape as [`Expense`], never modified after insert.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub id: i64,
    pub user_id: UserId,
    pub category: String,
    pub amount: f64,
    pub timestamp: DateTime<Utc>,
}

impl LedgerEntry for Expense {
    fn category(&self) -> &str {
        &self.category
    }

    fn amount(&self) -> f64 {
        self.amount
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl LedgerEntry for HistoryEntry {
    fn category(&self) -> &str {
        &self.category
    }

    fn amount(&self) -> f64 {
        self.amount
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}
