use crate::db::models::{Expense, HistoryEntry, User, UserId};
use crate::db::schema::SQLITE_INIT;
use crate::error::BudgetError;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

pub type SqlitePool = Pool<Sqlite>;

pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct BudgetStorage {
    pool: SqlitePool,
}

impl BudgetStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) the database file and apply the schema.
    pub async fn connect(database_url: &str) -> Result<Self, BudgetError> {
        Self::connect_with_busy_timeout(database_url, DEFAULT_BUSY_TIMEOUT).await
    }

    /// Like [`connect`](Self::connect), waiting at most `busy_timeout` on a
    /// locked database before the statement fails with `SQLITE_BUSY`.
    pub async fn connect_with_busy_timeout(
        database_url: &str,
        busy_timeout: Duration,
    ) -> Result<Self, BudgetError> {
        let connect_opts = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(busy_timeout);
        let pool = SqlitePoolOptions::new().connect_with(connect_opts).await?;
        let storage = Self::new(pool);
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Private in-memory database. A single pinned connection keeps it alive.
    pub async fn in_memory() -> Result<Self, BudgetError> {
        let connect_opts = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(connect_opts)
            .await?;
        let storage = Self::new(pool);
        storage.init_schema().await?;
        Ok(storage)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Initialize the schema by executing the bundled DDL.
    pub async fn init_schema(&self) -> Result<(), BudgetError> {
        for stmt in SQLITE_INIT.split(';') {
            let s = stmt.trim();
            if s.is_empty() {
                continue;
            }
            sqlx::query(s).execute(&self.pool).await?;
        }
        Ok(())
    }

    // ---- users ----

    /// Insert a user and return its id. A taken username is a validation failure.
    pub async fn insert_user(
        &self,
        username: &str,
        password_hash: &str,
        salary: f64,
        savings_goal: f64,
    ) -> Result<UserId, BudgetError> {
        let res = sqlx::query(
            "INSERT INTO users (username, password, salary, savings_goal) VALUES (?, ?, ?, ?)",
        )
        .bind(username)
        .bind(password_hash)
        .bind(salary)
        .bind(savings_goal)
        .execute(&self.pool)
        .await;

        match res {
            Ok(done) => Ok(done.last_insert_rowid()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(
                BudgetError::validation("username", "Username already exists"),
            ),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_user(&self, id: UserId) -> Result<Option<User>, BudgetError> {
        let row = sqlx::query(
            "SELECT id, username, password, salary, savings_goal FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_user).transpose()
    }

    pub async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, BudgetError> {
        let row = sqlx::query(
            "SELECT id, username, password, salary, savings_goal FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_user).transpose()
    }

    pub async fn list_user_ids(&self) -> Result<Vec<UserId>, BudgetError> {
        let ids: Vec<(i64,)> = sqlx::query_as("SELECT id FROM users ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids.into_iter().map(|(id,)| id).collect())
    }

    pub async fn update_budget(
        &self,
        id: UserId,
        salary: f64,
        savings_goal: f64,
    ) -> Result<(), BudgetError> {
        let done = sqlx::query("UPDATE users SET salary = ?, savings_goal = ? WHERE id = ?")
            .bind(salary)
            .bind(savings_goal)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if done.rows_affected() == 0 {
            return Err(BudgetError::user_not_found(id));
        }
        Ok(())
    }

    pub async fn update_password(
        &self,
        id: UserId,
        password_hash: &str,
    ) -> Result<(), BudgetError> {
        let done = sqlx::query("UPDATE users SET password = ? WHERE id = ?")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if done.rows_affected() == 0 {
            return Err(BudgetError::user_not_found(id));
        }
        Ok(())
    }

    // ---- expenses ----

    pub async fn insert_expense(
        &self,
        user_id: UserId,
        category: &str,
        amount: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<i64, BudgetError> {
        let done = sqlx::query(
            "INSERT INTO expenses (user_id, category, amount, timestamp) VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(category)
        .bind(amount)
        .bind(encode_timestamp(timestamp))
        .execute(&self.pool)
        .await?;
        Ok(done.last_insert_rowid())
    }

    /// Active expenses in insertion order, optionally skipping one category.
    pub async fn list_expenses(
        &self,
        user_id: UserId,
        exclude_category: Option<&str>,
    ) -> Result<Vec<Expense>, BudgetError> {
        let rows = sqlx::query(
            r#"SELECT id, user_id, category, amount, timestamp
               FROM expenses
               WHERE user_id = ? AND (? IS NULL OR category != ?)
               ORDER BY id"#,
        )
        .bind(user_id)
        .bind(exclude_category)
        .bind(exclude_category)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::row_to_expense).collect()
    }

    /// Active expenses ordered by timestamp, oldest first.
    pub async fn list_expenses_chronological(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Expense>, BudgetError> {
        let rows = sqlx::query(
            r#"SELECT id, user_id, category, amount, timestamp
               FROM expenses WHERE user_id = ? ORDER BY timestamp, id"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::row_to_expense).collect()
    }

    pub async fn list_history(&self, user_id: UserId) -> Result<Vec<HistoryEntry>, BudgetError> {
        let rows = sqlx::query(
            r#"SELECT id, user_id, category, amount, timestamp
               FROM history WHERE user_id = ? ORDER BY timestamp, id"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::row_to_history).collect()
    }

    /// Delete every expense and history row of the user in one transaction.
    /// Returns `(expenses_deleted, history_deleted)`.
    pub async fn reset_user(&self, user_id: UserId) -> Result<(u64, u64), BudgetError> {
        let mut tx = self.pool.begin().await?;
        let expenses = sqlx::query("DELETE FROM expenses WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let history = sqlx::query("DELETE FROM history WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        Ok((expenses, history))
    }

    /// Move all active expenses of one user into history using a single
    /// transaction. Any failure rolls the whole user back. Returns rows moved.
    pub async fn archive_user(&self, user_id: UserId) -> Result<u64, BudgetError> {
        let mut tx = self.pool.begin().await?;

        let rows: Vec<(i64, String, f64, String)> = sqlx::query_as(
            "SELECT id, category, amount, timestamp FROM expenses WHERE user_id = ? ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await?;

        let mut moved = 0;
        for (id, category, amount, timestamp) in rows {
            // timestamp text is copied verbatim so the archived value is identical
            sqlx::query(
                "INSERT INTO history (user_id, category, amount, timestamp) VALUES (?, ?, ?, ?)",
            )
            .bind(user_id)
            .bind(category)
            .bind(amount)
            .bind(timestamp)
            .execute(&mut *tx)
            .await?;

            sqlx::query("DELETE FROM expenses WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            moved += 1;
        }

        tx.commit().await?;
        debug!(user_id, moved, "archived user expenses");
        Ok(moved)
    }

    fn row_to_user(row: SqliteRow) -> Result<User, BudgetError> {
        Ok(User {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            password_hash: row.try_get("password")?,
            salary: row.try_get("salary")?,
            savings_goal: row.try_get("savings_goal")?,
        })
    }

    fn row_to_expense(row: SqliteRow) -> Result<Expense, BudgetError> {
        let timestamp: String = row.try_get("timestamp")?;
        Ok(Expense {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            category: row.try_get("category")?,
            amount: row.try_get("amount")?,
            timestamp: decode_timestamp(&timestamp)?,
        })
    }

    fn row_to_history(row: SqliteRow) -> Result<HistoryEntry, BudgetError> {
        let timestamp: String = row.try_get("timestamp")?;
        Ok(HistoryEntry {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            category: row.try_get("category")?,
            amount: row.try_get("amount")?,
            timestamp: decode_timestamp(&timestamp)?,
        })
    }
}

fn encode_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_timestamp(raw: &str) -> Result<DateTime<Utc>, BudgetError> {
    let parsed = DateTime::parse_from_rfc3339(raw).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
    Ok(parsed.with_timezone(&Utc))
}
