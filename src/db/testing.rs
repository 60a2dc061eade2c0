//! File-backed database for tests that need a second connection.

use sqlx::{Connection, sqlite::SqliteConnection};
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::task::JoinHandle;

use crate::db::BudgetStorage;

pub(crate) struct TempDb {
    pub storage: BudgetStorage,
    url: String,
    path: PathBuf,
}

impl TempDb {
    /// Storage gives up on a lock after 10ms so contention surfaces as `SQLITE_BUSY`.
    pub async fn new(tag: &str) -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before UNIX_EPOCH")
            .as_nanos();
        let mut path = std::env::temp_dir();
        path.push(format!("budget-tracker-{tag}-{}-{nanos}.sqlite", std::process::id()));
        let url = format!("sqlite:{}", path.display());
        let storage = BudgetStorage::connect_with_busy_timeout(&url, Duration::from_millis(10))
            .await
            .expect("failed to open temp database");
        Self { storage, url, path }
    }

    /// Take an exclusive lock from another connection and release it after `hold`.
    pub async fn lock_for(&self, hold: Duration) -> JoinHandle<()> {
        let mut conn = SqliteConnection::connect(&self.url)
            .await
            .expect("failed to open locking connection");
        sqlx::query("BEGIN EXCLUSIVE")
            .execute(&mut conn)
            .await
            .expect("failed to take exclusive lock");
        tokio::spawn(async move {
            tokio::time::sleep(hold).await;
            sqlx::query("COMMIT")
                .execute(&mut conn)
                .await
                .expect("failed to release lock");
            let _ = conn.close().await;
        })
    }
}

impl Drop for TempDb {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm", "-journal"] {
            let mut p = self.path.clone().into_os_string();
            p.push(suffix);
            let _ = fs::remove_file(p);
        }
    }
}
