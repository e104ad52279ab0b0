// Cross-context message bridge.
//
// Extraction results, publish requests and publish completions travel
// between the page-side automation and the background service as a tagged
// union. Each request gets a typed response back through a oneshot channel,
// with an explicit timeout, instead of a "keep the channel open" flag.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::error::{AutomationError, PageResult};
use crate::model::Post;

/// Default time a caller waits for a response.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const CHANNEL_CAPACITY: usize = 64;

/// Messages exchanged between contexts. Serialized as
/// `{"type": "SYNC_TWEET", "data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    /// Sync a post to the target account (requires credentials).
    SyncTweet(Post),
    /// A post was published; drop it from the pending queue.
    DeletePublishedTweet {
        #[serde(rename = "tweetId")]
        tweet_id: String,
    },
    /// Start the thread publisher on this post.
    PostToBsky(Post),
    /// Append a freshly extracted post to the pending queue.
    QueueTweet(Post),
}

/// Which side of the bridge handles a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Background,
    Content,
}

impl Message {
    pub fn kind(&self) -> &'static str {
        match self {
            Message::SyncTweet(_) => "SYNC_TWEET",
            Message::DeletePublishedTweet { .. } => "DELETE_PUBLISHED_TWEET",
            Message::PostToBsky(_) => "POST_TO_BSKY",
            Message::QueueTweet(_) => "QUEUE_TWEET",
        }
    }

    pub fn destination(&self) -> Destination {
        match self {
            Message::PostToBsky(_) => Destination::Content,
            _ => Destination::Background,
        }
    }
}

/// Reply to a request: `{success, data?, error?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// A message in flight together with its reply slot.
#[derive(Debug)]
pub struct Envelope {
    pub message: Message,
    pub reply: oneshot::Sender<Response>,
}

/// Create a connected client/receiver pair.
pub fn channel(timeout: Duration) -> (BridgeClient, BridgeReceiver) {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    (BridgeClient { tx, timeout }, BridgeReceiver { rx })
}

/// Sending half. Cheap to clone.
#[derive(Debug, Clone)]
pub struct BridgeClient {
    tx: mpsc::Sender<Envelope>,
    timeout: Duration,
}

impl BridgeClient {
    /// Send a request and wait for its response.
    ///
    /// A closed channel means the other context is gone, which surfaces as
    /// `HostContextInvalidated`.
    pub async fn request(&self, message: Message) -> PageResult<Response> {
        let kind = message.kind();
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Envelope { message, reply })
            .await
            .map_err(|_| AutomationError::HostContextInvalidated)?;
        debug!(kind = kind, "Bridge request sent");

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(AutomationError::HostContextInvalidated),
            Err(_) => Err(AutomationError::Bridge(format!(
                "{kind} timed out after {} ms",
                self.timeout.as_millis()
            ))),
        }
    }

    /// Like `request`, but an unsuccessful response becomes an error.
    pub async fn call(&self, message: Message) -> PageResult<Option<serde_json::Value>> {
        let response = self.request(message).await?;
        if response.success {
            Ok(response.data)
        } else {
            Err(AutomationError::Bridge(
                response.error.unwrap_or_else(|| "request failed".to_string()),
            ))
        }
    }
}

/// Receiving half, consumed by a [`Router`].
#[derive(Debug)]
pub struct BridgeReceiver {
    rx: mpsc::Receiver<Envelope>,
}

impl BridgeReceiver {
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.rx.recv().await
    }
}

/// Something that answers bridge messages.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: Message) -> Response;
}

/// Dispatches incoming messages to the background or content handler.
pub struct Router {
    background: Arc<dyn MessageHandler>,
    content: Option<Arc<dyn MessageHandler>>,
}

impl Router {
    pub fn new(background: Arc<dyn MessageHandler>) -> Self {
        Self {
            background,
            content: None,
        }
    }

    pub fn with_content(mut self, content: Arc<dyn MessageHandler>) -> Self {
        self.content = Some(content);
        self
    }

    /// Serve until every client is dropped. Each message is handled on its
    /// own task so a handler may itself call back into the bridge.
    pub async fn serve(self, mut rx: BridgeReceiver) {
        while let Some(Envelope { message, reply }) = rx.recv().await {
            let handler = match message.destination() {
                Destination::Background => Some(self.background.clone()),
                Destination::Content => self.content.clone(),
            };
            tokio::spawn(async move {
                let kind = message.kind();
                let response = match handler {
                    Some(handler) => handler.handle(message).await,
                    None => Response::failure(format!("no handler for {kind}")),
                };
                if reply.send(response).is_err() {
                    warn!(kind = kind, "Requester went away before the response");
                }
            });
        }
        debug!("Bridge closed");
    }
}
