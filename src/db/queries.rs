// Database queries: every SQL statement the queue needs.
//
// Callers above this module only see posts and counts.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use crate::model::Post;

/// Storage key holding the pending queue.
pub const PENDING_KEY: &str = "pendingTweets";

// --- Key/value ---

/// Get a stored value by key.
pub fn get_value(conn: &Connection, key: &str) -> Result<Option<String>> {
    let mut stmt = conn.prepare("SELECT value FROM kv_store WHERE key = ?1")?;
    let result = stmt.query_row(params![key], |row| row.get(0)).optional()?;
    Ok(result)
}

/// Set a stored value (upsert).
pub fn set_value(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO kv_store (key, value, updated_at)
         VALUES (?1, ?2, datetime('now'))
         ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
        params![key, value],
    )?;
    Ok(())
}

// --- Pending queue ---

/// Load the pending queue. A missing key is an empty queue.
pub fn load_pending(conn: &Connection) -> Result<Vec<Post>> {
    match get_value(conn, PENDING_KEY)? {
        Some(json) => serde_json::from_str(&json)
            .with_context(|| format!("Stored {PENDING_KEY} is not a valid post list")),
        None => Ok(Vec::new()),
    }
}

/// Replace the pending queue wholesale.
pub fn store_pending(conn: &Connection, posts: &[Post]) -> Result<()> {
    let json = serde_json::to_string(posts)?;
    set_value(conn, PENDING_KEY, &json)
}

// --- Publish log ---

pub fn record_published(conn: &Connection, tweet_id: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO publish_log (tweet_id) VALUES (?1)",
        params![tweet_id],
    )?;
    Ok(())
}

pub fn published_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM publish_log", [], |row| row.get(0))?;
    Ok(count)
}
