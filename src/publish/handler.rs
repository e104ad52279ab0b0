// POST_TO_BSKY handler on the composer side of the bridge.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::warn;

use super::{PublishOutcome, ThreadPublisher};
use crate::bridge::{Message, MessageHandler, Response};
use crate::error::AutomationError;
use crate::notify::{notify, Toast};

/// Starts the publisher for each POST_TO_BSKY request.
///
/// The request is answered as soon as the run starts; the run itself
/// reports through toasts. The most recent run can be awaited with
/// [`PublishHandler::take_last_run`].
pub struct PublishHandler {
    publisher: Arc<ThreadPublisher>,
    enabled: bool,
    last_run: Mutex<Option<JoinHandle<PublishOutcome>>>,
}

impl PublishHandler {
    pub fn new(publisher: Arc<ThreadPublisher>, enabled: bool) -> Self {
        Self {
            publisher,
            enabled,
            last_run: Mutex::new(None),
        }
    }

    pub async fn take_last_run(&self) -> Option<JoinHandle<PublishOutcome>> {
        self.last_run.lock().await.take()
    }
}

#[async_trait]
impl MessageHandler for PublishHandler {
    async fn handle(&self, message: Message) -> Response {
        let Message::PostToBsky(post) = message else {
            return Response::failure(format!("{} is not handled here", message.kind()));
        };

        if !self.enabled {
            let err = AutomationError::AutomationDisabled;
            warn!(tweet_id = %post.tweet_id, "Publish refused: automation disabled");
            notify(self.publisher.page(), Toast::important(err.to_string())).await;
            return Response::failure(err.to_string());
        }

        // The publisher needs the page to itself.
        let mut last_run = self.last_run.lock().await;
        if last_run.as_ref().is_some_and(|run| !run.is_finished()) {
            warn!(tweet_id = %post.tweet_id, "Publish refused: another run is in progress");
            return Response::failure("a publish is already in progress");
        }

        let editors = post.editor_count();
        let publisher = self.publisher.clone();
        *last_run = Some(tokio::spawn(async move { publisher.publish(&post).await }));
        Response::ok(json!({ "started": true, "editors": editors }))
    }
}
