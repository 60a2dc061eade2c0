//! SQL DDL for initializing the budget storage.
//! SQLite-first design; can be adapted for other RDBMS.

/// SQLite schema with:
/// - `users.username` UNIQUE (creates an index implicitly)
/// - `expenses` and `history` sharing one shape, both owned by a user
///   and removed with it (`ON DELETE CASCADE`)
/// - `timestamp` stored as RFC3339 text in UTC so lexical order is chronological
pub const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    password TEXT NOT NULL,
    salary REAL NOT NULL,
    savings_goal REAL NOT NULL DEFAULT 0.2
);

CREATE TABLE IF NOT EXISTS expenses (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    category TEXT NOT NULL,
    amount REAL NOT NULL,
    timestamp TEXT NOT NULL -- RFC3339
);

CREATE TABLE IF NOT EXISTS history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    category TEXT NOT NULL,
    amount REAL NOT NULL,
    timestamp TEXT NOT NULL -- RFC3339
);

CREATE INDEX IF NOT EXISTS idx_expenses_user_id ON expenses(user_id);
CREATE INDEX IF NOT EXISTS idx_history_user_id ON history(user_id);
"#;
