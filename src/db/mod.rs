//! Database module for SQLite persistence.
//!
//! SQLite is the source of truth for the reference store. Link tables carry
//! foreign keys so deleting a referenced entity fails instead of leaving
//! dangling links.

mod repository;
mod store;

pub use repository::*;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS meta (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            schema_version INTEGER NOT NULL DEFAULT 1,
            revision_id INTEGER NOT NULL DEFAULT 0,
            generated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        INSERT OR IGNORE INTO meta (id, schema_version, revision_id, generated_at)
        VALUES (1, 1, 0, datetime('now'));
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS periods (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT,
            open_date TEXT NOT NULL,
            close_date TEXT NOT NULL,
            kind TEXT NOT NULL CHECK (kind IN ('open', 'inactive', 'closed', 'assigned')),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS topics (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS questions (
            id TEXT PRIMARY KEY,
            text TEXT NOT NULL,
            kind TEXT NOT NULL,
            category TEXT,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS categories (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            description TEXT,
            criterion TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS students (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            display_name TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS period_questions (
            period_id TEXT NOT NULL REFERENCES periods(id) ON DELETE RESTRICT,
            question_id TEXT NOT NULL REFERENCES questions(id) ON DELETE RESTRICT,
            PRIMARY KEY (period_id, question_id)
        );

        CREATE TABLE IF NOT EXISTS topic_constraints (
            topic_id TEXT NOT NULL REFERENCES topics(id) ON DELETE RESTRICT,
            category_id TEXT NOT NULL REFERENCES categories(id) ON DELETE RESTRICT,
            PRIMARY KEY (topic_id, category_id)
        );

        CREATE TABLE IF NOT EXISTS topic_allow_list (
            topic_id TEXT NOT NULL REFERENCES topics(id) ON DELETE CASCADE,
            email TEXT NOT NULL,
            PRIMARY KEY (topic_id, email)
        );

        CREATE TABLE IF NOT EXISTS assignments (
            period_id TEXT NOT NULL REFERENCES periods(id) ON DELETE RESTRICT,
            student_id TEXT NOT NULL REFERENCES students(id) ON DELETE RESTRICT,
            topic_id TEXT NOT NULL REFERENCES topics(id) ON DELETE RESTRICT,
            preference_rank INTEGER NOT NULL,
            is_matched INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (period_id, student_id)
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for common queries
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_periods_kind ON periods(kind);
        CREATE INDEX IF NOT EXISTS idx_questions_category ON questions(category);
        CREATE INDEX IF NOT EXISTS idx_period_questions_question ON period_questions(question_id);
        CREATE INDEX IF NOT EXISTS idx_topic_constraints_category ON topic_constraints(category_id);
        CREATE INDEX IF NOT EXISTS idx_assignments_student ON assignments(student_id);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
