use serde::Serialize;

use crate::error::BudgetError;
use crate::ledger::MAX_AMOUNT;

/// Target fraction of salary to keep, in `(0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SavingsGoal(f64);

impl SavingsGoal {
    pub const DEFAULT: SavingsGoal = SavingsGoal(0.2);

    pub fn new(ratio: f64) -> Result<Self, BudgetError> {
        if !ratio.is_finite() || ratio <= 0.0 || ratio > 1.0 {
            return Err(BudgetError::validation(
                "savings_goal",
                "Savings goal must be between 0 and 100 percent",
            ));
        }
        Ok(Self(ratio))
    }

    /// The profile form submits a percentage.
    pub fn from_percent(percent: f64) -> Result<Self, BudgetError> {
        Self::new(percent / 100.0)
    }

    pub fn from_percent_str(raw: &str) -> Result<Self, BudgetError> {
        let percent: f64 = raw.trim().parse().map_err(|_| {
            BudgetError::validation("savings_goal", "Savings goal must be a number")
        })?;
        Self::from_percent(percent)
    }

    pub fn ratio(self) -> f64 {
        self.0
    }
}

impl Default for SavingsGoal {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Salary must be a positive number no larger than [`MAX_AMOUNT`].
pub fn parse_salary(raw: &str) -> Result<f64, BudgetError> {
    let salary: f64 = raw
        .trim()
        .parse()
        .map_err(|_| BudgetError::validation("salary", "Salary must be a number"))?;
    if !salary.is_finite() || salary <= 0.0 {
        return Err(BudgetError::validation("salary", "Salary must be a positive number"));
    }
    if salary > MAX_AMOUNT {
        return Err(BudgetError::validation("salary", "Salary is too large"));
    }
    Ok(salary)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SavingsStatus {
    pub salary: f64,
    pub total_expenses: f64,
    /// Salary minus expenses; negative when overspent.
    pub savings: f64,
    pub savings_goal_amount: f64,
    pub goal_reached: bool,
}

/// Evaluate the savings goal for a period. Pure in its three inputs.
pub fn evaluate(salary: f64, goal: SavingsGoal, total_expenses: f64) -> SavingsStatus {
    let savings = salary - total_expenses;
    let savings_goal_amount = salary * goal.ratio();
    SavingsStatus {
        salary,
        total_expenses,
        savings,
        savings_goal_amount,
        goal_reached: savings >= savings_goal_amount,
    }
}
