//! Month-end archiving: moves every active expense into history.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};

use crate::db::{BudgetStorage, UserId, retry_storage};
use crate::error::BudgetError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArchiveFailure {
    pub user_id: UserId,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArchiveReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub users_processed: usize,
    pub entries_moved: u64,
    pub failures: Vec<ArchiveFailure>,
}

#[derive(Clone)]
pub struct ArchiveProcess {
    storage: BudgetStorage,
}

impl ArchiveProcess {
    pub fn new(storage: BudgetStorage) -> Self {
        Self { storage }
    }

    /// Archive all users. Each user is moved in its own transaction; a user
    /// that fails is rolled back, reported, and the run carries on.
    pub async fn run(&self) -> Result<ArchiveReport, BudgetError> {
        let started_at = Utc::now();
        let user_ids = retry_storage("user listing", || self.storage.list_user_ids()).await?;

        let mut users_processed = 0;
        let mut entries_moved = 0;
        let mut failures = Vec::new();

        for user_id in user_ids {
            match self.archive_user(user_id).await {
                Ok(moved) => {
                    users_processed += 1;
                    entries_moved += moved;
                }
                Err(e) => {
                    error!(user_id, error = %e, "archive failed; user rolled back");
                    failures.push(ArchiveFailure {
                        user_id,
                        reason: e.user_message(),
                    });
                }
            }
        }

        let report = ArchiveReport {
            started_at,
            finished_at: Utc::now(),
            users_processed,
            entries_moved,
            failures,
        };
        info!(
            users = report.users_processed,
            moved = report.entries_moved,
            failed = report.failures.len(),
            "archive run finished"
        );
        Ok(report)
    }

    async fn archive_user(&self, user_id: UserId) -> Result<u64, BudgetError> {
        retry_storage("archive", || self.storage.archive_user(user_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::TempDb;
    use chrono::TimeZone;
    use std::time::Duration;

    #[tokio::test]
    async fn moves_every_expense_once_and_clears_ledger() {
        let storage = BudgetStorage::in_memory().await.unwrap();
        let user = storage.insert_user("hana", "hash", 2000.0, 0.2).await.unwrap();
        let t1 = Utc.with_ymd_and_hms(2024, 1, 3, 10, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2024, 1, 4, 11, 0, 0).unwrap();
        storage.insert_expense(user, "Food", 20.0, t1).await.unwrap();
        storage.insert_expense(user, "Rent", 900.0, t2).await.unwrap();

        let report = ArchiveProcess::new(storage.clone()).run().await.unwrap();
        assert_eq!(report.users_processed, 1);
        assert_eq!(report.entries_moved, 2);
        assert!(report.failures.is_empty());

        assert!(storage.list_expenses(user, None).await.unwrap().is_empty());
        let history: Vec<_> = storage
            .list_history(user)
            .await
            .unwrap()
            .into_iter()
            .map(|h| (h.category, h.amount, h.timestamp))
            .collect();
        assert_eq!(
            history,
            [("Food".to_string(), 20.0, t1), ("Rent".to_string(), 900.0, t2)]
        );

        // a second run has nothing left to move
        let again = ArchiveProcess::new(storage.clone()).run().await.unwrap();
        assert_eq!(again.entries_moved, 0);
        assert_eq!(storage.list_history(user).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn failing_user_is_rolled_back_and_others_continue() {
        let storage = BudgetStorage::in_memory().await.unwrap();
        let broken = storage.insert_user("ivan", "hash", 100.0, 0.2).await.unwrap();
        let healthy = storage.insert_user("jade", "hash", 100.0, 0.2).await.unwrap();
        let now = Utc::now();
        storage.insert_expense(broken, "Food", 1.0, now).await.unwrap();
        storage.insert_expense(broken, "Poison", 2.0, now).await.unwrap();
        storage.insert_expense(healthy, "Food", 3.0, now).await.unwrap();

        // reject the second history insert of the first user, after the first one succeeded
        sqlx::query(
            r#"CREATE TRIGGER reject_poison BEFORE INSERT ON history
               WHEN NEW.category = 'Poison'
               BEGIN SELECT RAISE(ABORT, 'poisoned row'); END"#,
        )
        .execute(storage.pool())
        .await
        .unwrap();

        let report = ArchiveProcess::new(storage.clone()).run().await.unwrap();
        assert_eq!(report.users_processed, 1);
        assert_eq!(report.entries_moved, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].user_id, broken);

        // nothing of the broken user moved
        assert_eq!(storage.list_expenses(broken, None).await.unwrap().len(), 2);
        assert!(storage.list_history(broken).await.unwrap().is_empty());
        // the healthy user was archived
        assert!(storage.list_expenses(healthy, None).await.unwrap().is_empty());
        assert_eq!(storage.list_history(healthy).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn locked_database_is_retried_not_reported() {
        let db = TempDb::new("archive-lock").await;
        let user = db.storage.insert_user("kai", "hash", 500.0, 0.2).await.unwrap();
        db.storage
            .insert_expense(user, "Food", 4.5, Utc::now())
            .await
            .unwrap();

        let release = db.lock_for(Duration::from_millis(80)).await;
        let report = ArchiveProcess::new(db.storage.clone()).run().await.unwrap();
        release.await.unwrap();

        assert!(report.failures.is_empty(), "{:?}", report.failures);
        assert_eq!(report.users_processed, 1);
        assert_eq!(report.entries_moved, 1);
        assert_eq!(db.storage.list_history(user).await.unwrap().len(), 1);
        assert!(db.storage.list_expenses(user, None).await.unwrap().is_empty());
    }
}
