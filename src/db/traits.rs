// PostQueue trait: backend-agnostic async interface over the pending queue.
//
// Backends only provide wholesale load/store plus the publish log; the
// queue edits are default methods built from those, matching how the queue
// has always been read-modify-written as one JSON array.

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::model::Post;

#[async_trait]
pub trait PostQueue: Send + Sync {
    // --- Lifecycle ---

    /// Count the number of user-created tables in the database.
    async fn table_count(&self) -> Result<i64>;

    // --- Storage primitives ---

    /// Load the whole queue, oldest first.
    async fn load(&self) -> Result<Vec<Post>>;

    /// Replace the whole queue.
    async fn store(&self, posts: &[Post]) -> Result<()>;

    /// Note that a post was published.
    async fn record_published(&self, tweet_id: &str) -> Result<()>;

    /// Total posts published since the database was created.
    async fn published_count(&self) -> Result<i64>;

    // --- Queue edits ---

    /// Append a post. Returns the new queue length.
    async fn push(&self, post: Post) -> Result<usize> {
        let mut posts = self.load().await?;
        posts.push(post);
        self.store(&posts).await?;
        Ok(posts.len())
    }

    /// Remove the first post with this tweet id, if any.
    async fn remove_by_tweet_id(&self, tweet_id: &str) -> Result<Option<Post>> {
        let mut posts = self.load().await?;
        let Some(index) = posts.iter().position(|p| p.tweet_id == tweet_id) else {
            return Ok(None);
        };
        let removed = posts.remove(index);
        self.store(&posts).await?;
        Ok(Some(removed))
    }

    /// Remove the post at `index`.
    async fn remove_at(&self, index: usize) -> Result<Post> {
        let mut posts = self.load().await?;
        if index >= posts.len() {
            bail!(
                "No queued post at index {} (queue has {} posts)",
                index,
                posts.len()
            );
        }
        let removed = posts.remove(index);
        self.store(&posts).await?;
        Ok(removed)
    }

    /// Remove one reply from a queued thread. When the last reply goes the
    /// post becomes a single post again.
    async fn remove_reply(&self, post_index: usize, reply_index: usize) -> Result<Post> {
        let mut posts = self.load().await?;
        let Some(post) = posts.get_mut(post_index) else {
            bail!("No queued post at index {}", post_index);
        };
        if reply_index >= post.replies.len() {
            bail!(
                "Post {} has no reply at index {} ({} replies)",
                post_index,
                reply_index,
                post.replies.len()
            );
        }
        let removed = post.replies.remove(reply_index);
        self.store(&posts).await?;
        Ok(removed)
    }

    /// Drop everything. Returns how many posts were removed.
    async fn clear(&self) -> Result<usize> {
        let count = self.load().await?.len();
        self.store(&[]).await?;
        Ok(count)
    }
}
