// Background service: the long-lived side of the bridge.
//
// Owns the pending queue and the settings. Page-side automation never
// touches storage directly; it asks this service over the bridge.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::json;
use tracing::{error, info, warn};

use crate::bridge::{Message, MessageHandler, Response};
use crate::db::PostQueue;
use crate::model::{Post, Settings};

pub struct BackgroundService {
    queue: Arc<dyn PostQueue>,
    settings: Settings,
}

impl BackgroundService {
    pub fn new(queue: Arc<dyn PostQueue>, settings: Settings) -> Self {
        Self { queue, settings }
    }

    /// Validate that a target account is configured for a direct sync.
    ///
    /// Posting itself happens through the composer; there is no remote API
    /// call behind this.
    pub async fn sync(&self, post: &Post) -> Result<serde_json::Value> {
        let creds = self
            .settings
            .target_credentials
            .as_ref()
            .ok_or_else(|| anyhow!("Configure the Bluesky account in settings first"))?;
        info!(
            tweet_id = %post.tweet_id,
            account = %creds.username,
            "Sync requested"
        );
        Ok(json!({ "message": "Sync succeeded" }))
    }

    /// Drop a published post from the queue and log it.
    pub async fn delete_published(&self, tweet_id: &str) -> Result<bool> {
        let removed = self.queue.remove_by_tweet_id(tweet_id).await?;
        if removed.is_some() {
            self.queue.record_published(tweet_id).await?;
            info!(tweet_id = tweet_id, "Removed published post from queue");
        }
        Ok(removed.is_some())
    }

    pub async fn enqueue(&self, post: Post) -> Result<usize> {
        let tweet_id = post.tweet_id.clone();
        let replies = post.replies.len();
        let len = self.queue.push(post).await?;
        info!(
            tweet_id = %tweet_id,
            replies = replies,
            queue_len = len,
            "Queued post"
        );
        Ok(len)
    }
}

#[async_trait]
impl MessageHandler for BackgroundService {
    async fn handle(&self, message: Message) -> Response {
        match message {
            Message::SyncTweet(post) => match self.sync(&post).await {
                Ok(data) => Response::ok(data),
                Err(e) => {
                    warn!(error = %e, "Sync failed");
                    Response::failure(e.to_string())
                }
            },
            Message::DeletePublishedTweet { tweet_id } => {
                match self.delete_published(&tweet_id).await {
                    Ok(removed) => Response::ok(json!({ "removed": removed })),
                    Err(e) => {
                        // The publish already happened; nothing to roll back.
                        error!(tweet_id = %tweet_id, error = %e, "Failed to delete published post");
                        Response::failure(e.to_string())
                    }
                }
            }
            Message::QueueTweet(post) => match self.enqueue(post).await {
                Ok(len) => Response::ok(json!({ "queued": len })),
                Err(e) => {
                    error!(error = %e, "Failed to queue post");
                    Response::failure(e.to_string())
                }
            },
            Message::PostToBsky(_) => {
                Response::failure("POST_TO_BSKY is handled by the composer page")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::model::Credentials;
    use chrono::Utc;

    fn post(id: &str) -> Post {
        Post {
            text: "hi".to_string(),
            images: vec![],
            links: vec![],
            tweet_id: id.to_string(),
            timestamp: Utc::now(),
            replies: vec![],
        }
    }

    fn settings(with_creds: bool) -> Settings {
        Settings {
            is_enabled: true,
            target_credentials: with_creds.then(|| Credentials {
                username: "me.bsky.social".to_string(),
                password: "app-pass".to_string(),
            }),
            source_username: "me".to_string(),
        }
    }

    #[tokio::test]
    async fn sync_without_credentials_fails() {
        let svc = BackgroundService::new(db::in_memory().unwrap(), settings(false));
        let resp = svc.handle(Message::SyncTweet(post("1"))).await;
        assert!(!resp.success);
        assert!(resp.error.unwrap().contains("Configure the Bluesky account"));
    }

    #[tokio::test]
    async fn sync_with_credentials_succeeds() {
        let svc = BackgroundService::new(db::in_memory().unwrap(), settings(true));
        let resp = svc.handle(Message::SyncTweet(post("1"))).await;
        assert!(resp.success);
        assert_eq!(resp.data.unwrap()["message"], "Sync succeeded");
    }

    #[tokio::test]
    async fn queue_then_delete_published() {
        let queue = db::in_memory().unwrap();
        let svc = BackgroundService::new(queue.clone(), settings(true));

        svc.handle(Message::QueueTweet(post("1"))).await;
        svc.handle(Message::QueueTweet(post("2"))).await;
        let resp = svc
            .handle(Message::DeletePublishedTweet {
                tweet_id: "1".to_string(),
            })
            .await;
        assert_eq!(resp.data.unwrap()["removed"], true);

        let left = queue.load().await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].tweet_id, "2");
        assert_eq!(queue.published_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn deleting_unknown_id_leaves_queue_alone() {
        let queue = db::in_memory().unwrap();
        let svc = BackgroundService::new(queue.clone(), settings(true));
        svc.handle(Message::QueueTweet(post("1"))).await;
        let resp = svc
            .handle(Message::DeletePublishedTweet {
                tweet_id: "9".to_string(),
            })
            .await;
        assert_eq!(resp.data.unwrap()["removed"], false);
        assert_eq!(queue.load().await.unwrap().len(), 1);
        assert_eq!(queue.published_count().await.unwrap(), 0);
    }
}
