// Database layer: SQLite storage for the pending post queue.
//
// rusqlite with the "bundled" feature, so there's no system SQLite
// dependency. The database file lives wherever TWEETSYNC_DB_PATH points
// (defaults to ./tweetsync.db).

pub mod queries;
pub mod schema;
pub mod sqlite;
pub mod traits;

pub use traits::PostQueue;

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;

/// Open (or create) the database, run migrations, and return the queue.
///
/// Called by `tweetsync init` and by anything that writes to the queue.
pub fn initialize(db_path: &str) -> Result<Arc<dyn PostQueue>> {
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create the directory holding {db_path}"))?;
        }
    }

    connect(db_path)
}

/// Open an existing database (fails if it doesn't exist yet).
pub fn open(db_path: &str) -> Result<Arc<dyn PostQueue>> {
    if !Path::new(db_path).exists() {
        anyhow::bail!("No queue database at {db_path}. Run `tweetsync init` first.");
    }

    // Older files may predate the latest migration.
    connect(db_path)
}

fn connect(db_path: &str) -> Result<Arc<dyn PostQueue>> {
    let conn = Connection::open(db_path)
        .with_context(|| format!("Failed to open queue database {db_path}"))?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    schema::create_tables(&conn)?;
    Ok(Arc::new(sqlite::SqliteQueue::new(conn)))
}

/// In-memory queue for tests and dry runs.
pub fn in_memory() -> Result<Arc<dyn PostQueue>> {
    let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
    schema::create_tables(&conn)?;
    Ok(Arc::new(sqlite::SqliteQueue::new(conn)))
}
