//! Account management: registration, credential checks and profile updates.

pub mod password;

use tracing::{info, warn};

use crate::db::{BudgetStorage, User, retry_storage};
use crate::error::BudgetError;
use crate::savings::{SavingsGoal, parse_salary};

pub use password::{hash_password, verify_password};

pub const MAX_USERNAME_LEN: usize = 150;

#[derive(Clone)]
pub struct Authenticator {
    storage: BudgetStorage,
}

impl Authenticator {
    pub fn new(storage: BudgetStorage) -> Self {
        Self { storage }
    }

    /// Create an account with the default savings goal. Returns the new user.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        confirmation: &str,
        raw_salary: &str,
    ) -> Result<User, BudgetError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(BudgetError::validation("username", "Username is required"));
        }
        if username.chars().count() > MAX_USERNAME_LEN {
            return Err(BudgetError::validation(
                "username",
                format!("Username must be at most {MAX_USERNAME_LEN} characters"),
            ));
        }
        if password.is_empty() {
            return Err(BudgetError::validation("password", "Password is required"));
        }
        if password != confirmation {
            return Err(BudgetError::validation("confirmation", "Passwords do not match"));
        }
        let salary = parse_salary(raw_salary)?;

        let existing = retry_storage("user lookup", || {
            self.storage.find_user_by_username(username)
        })
        .await?;
        if existing.is_some() {
            return Err(BudgetError::validation("username", "Username already exists"));
        }

        let hash = hash_password(password)?;
        let goal = SavingsGoal::default();
        let id = retry_storage("user insert", || {
            self.storage
                .insert_user(username, &hash, salary, goal.ratio())
        })
        .await?;
        info!(user_id = id, username, "user registered");

        Ok(User {
            id,
            username: username.to_string(),
            password_hash: hash,
            salary,
            savings_goal: goal.ratio(),
        })
    }

    pub async fn verify_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<User, BudgetError> {
        let username = username.trim();
        let found = retry_storage("user lookup", || {
            self.storage.find_user_by_username(username)
        })
        .await?;
        let Some(user) = found else {
            return Err(BudgetError::InvalidCredentials);
        };
        if !verify_password(password, &user.password_hash)? {
            warn!(user_id = user.id, "rejected login with wrong password");
            return Err(BudgetError::InvalidCredentials);
        }
        Ok(user)
    }

    pub async fn change_password(
        &self,
        user: &User,
        old_password: &str,
        new_password: &str,
        confirmation: &str,
    ) -> Result<(), BudgetError> {
        if old_password.is_empty() {
            return Err(BudgetError::validation("old_password", "Must provide old password"));
        }
        if new_password.is_empty() {
            return Err(BudgetError::validation("password", "Must provide new password"));
        }
        if confirmation.is_empty() {
            return Err(BudgetError::validation("confirmation", "Must provide confirmation"));
        }
        if new_password != confirmation {
            return Err(BudgetError::validation("confirmation", "New passwords do not match"));
        }
        if !verify_password(old_password, &user.password_hash)? {
            return Err(BudgetError::validation("old_password", "Invalid old password"));
        }

        let hash = hash_password(new_password)?;
        retry_storage("password update", || {
            self.storage.update_password(user.id, &hash)
        })
        .await?;
        info!(user_id = user.id, "password changed");
        Ok(())
    }

    /// Update salary and savings goal; the goal arrives as a percentage.
    pub async fn update_budget(
        &self,
        user: &User,
        raw_salary: &str,
        raw_goal_percent: &str,
    ) -> Result<(f64, SavingsGoal), BudgetError> {
        let salary = parse_salary(raw_salary)?;
        let goal = SavingsGoal::from_percent_str(raw_goal_percent)?;
        retry_storage("budget update", || {
            self.storage
                .update_budget(user.id, salary, goal.ratio())
        })
        .await?;
        info!(user_id = user.id, salary, savings_goal = goal.ratio(), "budget updated");
        Ok((salary, goal))
    }
}
