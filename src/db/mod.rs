pub mod comments;
pub mod filter;
pub mod models;
pub mod posts;
pub mod reactions;
pub mod sessions;
pub mod users;

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::functions::FunctionFlags;
use rusqlite::{params, Connection};

use crate::state::DbPool;

pub const MIGRATIONS: &[(&str, &str)] = &[(
    "001_initial",
    include_str!("../../migrations/001_initial.sql"),
)];

/// Storage calls give up after this long instead of hanging the request.
const STORE_TIMEOUT: Duration = Duration::from_secs(3);

/// Format used for every timestamp column. Lexicographic order matches
/// chronological order, which the date filter and `ORDER BY` rely on.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

pub fn timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

pub fn now() -> String {
    timestamp(Utc::now())
}

/// SQL function lowercasing text with Unicode rules. SQLite's own `lower()`
/// and `LIKE` only fold ASCII.
pub const FOLD_CASE_FN: &str = "fold_case";

fn init_connection(conn: &Connection, pragmas: &str) -> rusqlite::Result<()> {
    conn.execute_batch(pragmas)?;
    conn.create_scalar_function(
        FOLD_CASE_FN,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text: Option<String> = ctx.get(0)?;
            Ok(text.map(|t| t.to_lowercase()))
        },
    )
}

pub fn create_pool(db_path: &Path) -> anyhow::Result<DbPool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
        init_connection(
            conn,
            "
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 3000;
            ",
        )
    });
    let pool = Pool::builder()
        .max_size(8)
        .connection_timeout(STORE_TIMEOUT)
        .build(manager)?;

    let conn = pool.get()?;
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        ",
    )?;

    Ok(pool)
}

/// In-memory pool for tests. A single connection, so every checkout sees the
/// same database.
pub fn memory_pool() -> anyhow::Result<DbPool> {
    let manager = SqliteConnectionManager::memory()
        .with_init(|conn| init_connection(conn, "PRAGMA foreign_keys = ON;"));
    let pool = Pool::builder()
        .max_size(1)
        .connection_timeout(STORE_TIMEOUT)
        .build(manager)?;
    Ok(pool)
}

pub fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    let conn = pool.get()?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    for (name, sql) in MIGRATIONS {
        let already_applied: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM schema_version WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;

        if !already_applied {
            tracing::info!("Applying migration: {}", name);
            conn.execute_batch(sql)?;
            conn.execute(
                "INSERT INTO schema_version (name) VALUES (?1)",
                params![name],
            )?;
        }
    }

    tracing::info!("Database migrations complete");
    Ok(())
}

/// Ids bound per `IN (...)` query, well under SQLite's default limit of 999
/// host parameters.
pub(crate) const IN_CHUNK: usize = 500;

/// Builds a `?, ?, ?` placeholder list for an `IN (...)` clause.
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}
