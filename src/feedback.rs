//! Append-only feedback store (SQLite).

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Open the feedback database, creating the file and table if needed.
pub async fn connect(path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS feedback (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            created_at TEXT    NOT NULL,
            query      TEXT    NOT NULL,
            answer     TEXT    NOT NULL,
            rating     TEXT    NOT NULL CHECK(rating IN ('up', 'down')),
            comment    TEXT
        )
        "#,
    )
    .execute(&pool)
    .await?;

    Ok(pool)
}

/// Record one rating for an answer.
pub async fn insert(
    pool: &SqlitePool,
    query: &str,
    answer: &str,
    rating: &str,
    comment: Option<&str>,
) -> Result<()> {
    let created_at = chrono::Utc::now().to_rfc3339();
    sqlx::query(
        "INSERT INTO feedback (created_at, query, answer, rating, comment) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(created_at)
    .bind(query)
    .bind(answer)
    .bind(rating)
    .bind(comment)
    .execute(pool)
    .await?;

    Ok(())
}
