// SqliteQueue: rusqlite backend implementing the PostQueue trait.
//
// The Connection is wrapped in tokio::sync::Mutex because Connection is !Sync.
// Trait methods lock the mutex, do synchronous rusqlite work, and return.
// The default read-modify-write edits in the trait take the lock twice, so
// `push` and `remove_by_tweet_id` are overridden to run under one lock.

use anyhow::Result;
use async_trait::async_trait;
use rusqlite::Connection;
use tokio::sync::Mutex;

use super::queries;
use super::traits::PostQueue;
use crate::model::Post;

pub struct SqliteQueue {
    conn: Mutex<Connection>,
}

impl SqliteQueue {
    /// Wrap an already-opened rusqlite Connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }
}

#[async_trait]
impl PostQueue for SqliteQueue {
    async fn table_count(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        super::schema::table_count(&conn)
    }

    async fn load(&self) -> Result<Vec<Post>> {
        let conn = self.conn.lock().await;
        queries::load_pending(&conn)
    }

    async fn store(&self, posts: &[Post]) -> Result<()> {
        let conn = self.conn.lock().await;
        queries::store_pending(&conn, posts)
    }

    async fn record_published(&self, tweet_id: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        queries::record_published(&conn, tweet_id)
    }

    async fn published_count(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        queries::published_count(&conn)
    }

    async fn push(&self, post: Post) -> Result<usize> {
        let conn = self.conn.lock().await;
        let mut posts = queries::load_pending(&conn)?;
        posts.push(post);
        queries::store_pending(&conn, &posts)?;
        Ok(posts.len())
    }

    async fn remove_by_tweet_id(&self, tweet_id: &str) -> Result<Option<Post>> {
        let conn = self.conn.lock().await;
        let mut posts = queries::load_pending(&conn)?;
        let Some(index) = posts.iter().position(|p| p.tweet_id == tweet_id) else {
            return Ok(None);
        };
        let removed = posts.remove(index);
        queries::store_pending(&conn, &posts)?;
        Ok(Some(removed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;
    use chrono::Utc;

    fn queue() -> SqliteQueue {
        let conn = Connection::open_in_memory().unwrap();
        schema::create_tables(&conn).unwrap();
        SqliteQueue::new(conn)
    }

    fn post(id: &str, replies: usize) -> Post {
        Post {
            text: format!("post {id}"),
            images: vec![],
            links: vec![],
            tweet_id: id.to_string(),
            timestamp: Utc::now(),
            replies: (0..replies).map(|i| post(&format!("{id}-{i}"), 0)).collect(),
        }
    }

    #[tokio::test]
    async fn test_push_appends_in_order() {
        let q = queue();
        assert_eq!(q.push(post("1", 0)).await.unwrap(), 1);
        assert_eq!(q.push(post("2", 0)).await.unwrap(), 2);
        let ids: Vec<_> = q.load().await.unwrap().into_iter().map(|p| p.tweet_id).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn test_remove_by_tweet_id_takes_first_match_only() {
        let q = queue();
        q.push(post("7", 0)).await.unwrap();
        q.push(post("8", 0)).await.unwrap();
        q.push(post("7", 1)).await.unwrap();

        let removed = q.remove_by_tweet_id("7").await.unwrap().unwrap();
        assert!(removed.replies.is_empty());

        let left = q.load().await.unwrap();
        assert_eq!(left.len(), 2);
        assert_eq!(left[1].tweet_id, "7");
        assert_eq!(left[1].replies.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_unknown_id_is_noop() {
        let q = queue();
        q.push(post("1", 0)).await.unwrap();
        assert!(q.remove_by_tweet_id("nope").await.unwrap().is_none());
        assert_eq!(q.load().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_at_out_of_range() {
        let q = queue();
        q.push(post("1", 0)).await.unwrap();
        let err = q.remove_at(3).await.unwrap_err();
        assert!(err.to_string().contains("index 3"));
        assert_eq!(q.remove_at(0).await.unwrap().tweet_id, "1");
    }

    #[tokio::test]
    async fn test_removing_last_reply_collapses_thread() {
        let q = queue();
        q.push(post("1", 2)).await.unwrap();
        assert_eq!(q.remove_reply(0, 1).await.unwrap().tweet_id, "1-1");
        q.remove_reply(0, 0).await.unwrap();

        let left = q.load().await.unwrap();
        assert!(left[0].replies.is_empty());
        assert!(q.remove_reply(0, 0).await.is_err());
    }

    #[tokio::test]
    async fn test_clear_and_publish_log() {
        let q = queue();
        q.push(post("1", 0)).await.unwrap();
        q.push(post("2", 0)).await.unwrap();
        q.record_published("1").await.unwrap();
        assert_eq!(q.clear().await.unwrap(), 2);
        assert!(q.load().await.unwrap().is_empty());
        assert_eq!(q.published_count().await.unwrap(), 1);
        assert_eq!(q.table_count().await.unwrap(), 3);
    }
}
