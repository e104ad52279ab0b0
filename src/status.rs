// System status display: DB stats and queue summary.

use anyhow::Result;
use std::path::Path;

use crate::config::Config;

/// Display system status to the terminal.
pub async fn show(config: &Config) -> Result<()> {
    let db_path = &config.db_path;
    if !Path::new(db_path).exists() {
        println!("Database: not initialized");
        println!("\nRun `tweetsync init` to set up the database.");
        return Ok(());
    }

    let file_size = std::fs::metadata(db_path)
        .map(|m| format_bytes(m.len()))
        .unwrap_or_else(|_| "unknown".to_string());
    println!("Database: {} ({})", db_path, file_size);
    let queue = crate::db::open(db_path)?;

    println!(
        "Automation: {}",
        if config.enabled { "enabled" } else { "disabled" }
    );
    match config.credentials() {
        Some(creds) => println!("Bluesky account: {}", creds.username),
        None => println!("Bluesky account: not configured"),
    }

    let posts = queue.load().await?;
    let replies: usize = posts.iter().map(|p| p.replies.len()).sum();
    println!(
        "Pending queue: {} posts ({} threads, {} replies)",
        posts.len(),
        posts.iter().filter(|p| !p.replies.is_empty()).count(),
        replies
    );
    if let Some(oldest) = posts.iter().map(|p| p.timestamp).min() {
        println!("  Oldest entry: {}", oldest.format("%Y-%m-%d %H:%M UTC"));
    }

    println!("Published so far: {}", queue.published_count().await?);

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
