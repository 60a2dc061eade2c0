//! Active expenses and the aggregates derived from them.
//!
//! The aggregation functions are pure over a slice of records and work for
//! both active expenses and archived history through [`LedgerEntry`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tracing::info;

use crate::db::{BudgetStorage, Expense, HistoryEntry, User, UserId, retry_storage};
use crate::error::BudgetError;

/// Category reserved for money set aside rather than spent.
pub const SAVINGS_CATEGORY: &str = "Savings";

pub const MAX_CATEGORY_LEN: usize = 50;

/// Largest accepted magnitude for a single amount, keeping sums finite.
pub const MAX_AMOUNT: f64 = 1e12;

/// Read access shared by active and archived records.
pub trait LedgerEntry {
    fn category(&self) -> &str;
    fn amount(&self) -> f64;
    fn timestamp(&self) -> DateTime<Utc>;
}

pub fn total_expenses<E: LedgerEntry>(records: &[E]) -> f64 {
    records.iter().fold(0.0, |acc, r| acc + r.amount())
}

/// Mean amount; an empty set averages to 0.
pub fn average_expense<E: LedgerEntry>(records: &[E]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    total_expenses(records) / records.len() as f64
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTotal {
    pub category: String,
    pub amount: f64,
}

/// Per-category sums, iterated in order of first appearance.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CategoryTotals {
    totals: Vec<CategoryTotal>,
}

impl CategoryTotals {
    pub fn get(&self, category: &str) -> Option<f64> {
        self.totals
            .iter()
            .find(|t| t.category == category)
            .map(|t| t.amount)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CategoryTotal> {
        self.totals.iter()
    }

    pub fn len(&self) -> usize {
        self.totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }
}

pub fn group_by_category<E: LedgerEntry>(records: &[E]) -> CategoryTotals {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut totals: Vec<CategoryTotal> = Vec::new();
    for record in records {
        let slot = *index.entry(record.category()).or_insert_with(|| {
            totals.push(CategoryTotal {
                category: record.category().to_string(),
                amount: 0.0,
            });
            totals.len() - 1
        });
        totals[slot].amount += record.amount();
    }
    CategoryTotals { totals }
}

/// Parse a raw form value into an amount. Only finite numbers are accepted.
pub fn parse_amount(raw: &str) -> Result<f64, BudgetError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(BudgetError::validation("amount", "Amount is required"));
    }
    let amount: f64 = raw
        .parse()
        .map_err(|_| BudgetError::validation("amount", "Amount must be a number"))?;
    check_amount(amount)
}

fn check_amount(amount: f64) -> Result<f64, BudgetError> {
    if !amount.is_finite() {
        return Err(BudgetError::validation("amount", "Amount must be a finite number"));
    }
    if amount.abs() > MAX_AMOUNT {
        return Err(BudgetError::validation("amount", "Amount is too large"));
    }
    Ok(amount)
}

/// Trim and check a category label.
pub fn normalize_category(raw: &str) -> Result<String, BudgetError> {
    let category = raw.trim();
    if category.is_empty() {
        return Err(BudgetError::validation("category", "Category is required"));
    }
    if category.chars().count() > MAX_CATEGORY_LEN {
        return Err(BudgetError::validation(
            "category",
            format!("Category must be at most {MAX_CATEGORY_LEN} characters"),
        ));
    }
    Ok(category.to_string())
}

/// Per-user view of the active expenses, backed by [`BudgetStorage`].
#[derive(Clone)]
pub struct Ledger {
    storage: BudgetStorage,
}

impl Ledger {
    pub fn new(storage: BudgetStorage) -> Self {
        Self { storage }
    }

    pub async fn require_user(&self, user_id: UserId) -> Result<User, BudgetError> {
        retry_storage("user lookup", || self.storage.get_user(user_id))
            .await?
            .ok_or_else(|| BudgetError::user_not_found(user_id))
    }

    /// Record an expense stamped with the current time. Returns the new id.
    pub async fn add_expense(
        &self,
        user_id: UserId,
        category: &str,
        amount: f64,
    ) -> Result<i64, BudgetError> {
        let category = normalize_category(category)?;
        let amount = check_amount(amount)?;
        self.require_user(user_id).await?;

        let timestamp = Utc::now();
        let id = retry_storage("expense insert", || {
            self.storage
                .insert_expense(user_id, &category, amount, timestamp)
        })
        .await?;

        info!(user_id, expense_id = id, category = %category, amount, "expense recorded");
        Ok(id)
    }

    /// Form-level entry point: validates the raw amount text first.
    pub async fn add_expense_raw(
        &self,
        user_id: UserId,
        category: &str,
        raw_amount: &str,
    ) -> Result<i64, BudgetError> {
        let category = normalize_category(category)?;
        let amount = parse_amount(raw_amount)?;
        self.add_expense(user_id, &category, amount).await
    }

    pub async fn list_expenses(
        &self,
        user_id: UserId,
        exclude_category: Option<&str>,
    ) -> Result<Vec<Expense>, BudgetError> {
        self.require_user(user_id).await?;
        retry_storage("expense listing", || {
            self.storage.list_expenses(user_id, exclude_category)
        })
        .await
    }

    /// Active expenses oldest first, as the history view shows them.
    pub async fn list_chronological(&self, user_id: UserId) -> Result<Vec<Expense>, BudgetError> {
        self.require_user(user_id).await?;
        retry_storage("expense listing", || {
            self.storage.list_expenses_chronological(user_id)
        })
        .await
    }

    pub async fn list_history(&self, user_id: UserId) -> Result<Vec<HistoryEntry>, BudgetError> {
        self.require_user(user_id).await?;
        retry_storage("history listing", || self.storage.list_history(user_id)).await
    }

    /// Irreversibly delete all active expenses and history of the user.
    pub async fn reset_all(&self, user_id: UserId) -> Result<(), BudgetError> {
        self.require_user(user_id).await?;
        let (expenses, history) =
            retry_storage("reset", || self.storage.reset_user(user_id)).await?;
        info!(user_id, expenses, history, "expenses and history reset");
        Ok(())
    }
}
