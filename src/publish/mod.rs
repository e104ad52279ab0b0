// Thread publisher: fills the target composer with a post and its replies,
// then waits for the user to press publish.
//
// The publisher never presses publish itself. It leaves a one-shot listener
// on the publish control; when the user clicks, the post is dropped from the
// queue after a short delay.
//
// State machine:
//   Idle -> Opening -> Filling(0)
//        -> (AwaitingAppendAffordance(i) -> AppendingEditor(i) -> Filling(i+1))*
//        -> AwaitingPublish -> Completed | Failed

pub mod handler;
pub mod images;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::bridge::{BridgeClient, Message};
use crate::error::{AutomationError, PageResult};
use crate::locator::TargetLocators;
use crate::model::Post;
use crate::notify::{notify, Toast};
use crate::page::{ClickListener, DomEvent, ElementId, Page};
use crate::rewrite::{paragraphs, rewrite};
use crate::wait::{self, wait_for_count_above, wait_for_element, WaitRequest};

use self::images::{fetch_all, ImageFetcher};

pub const REVIEW_MESSAGE: &str = "Review the content and click Publish";
pub const PUBLISHED_MESSAGE: &str = "Published to Bluesky";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishState {
    Idle,
    Opening,
    /// Writing content into the editor for post `post_index` (0 = root).
    Filling { post_index: usize },
    AwaitingAppendAffordance { reply_index: usize },
    AppendingEditor { reply_index: usize },
    AwaitingPublish,
    /// The composer is filled and the publish listener is armed.
    Completed,
    Failed { reason: String },
}

impl fmt::Display for PublishState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishState::Idle => write!(f, "idle"),
            PublishState::Opening => write!(f, "opening"),
            PublishState::Filling { post_index } => write!(f, "filling({post_index})"),
            PublishState::AwaitingAppendAffordance { reply_index } => {
                write!(f, "awaiting-append({reply_index})")
            }
            PublishState::AppendingEditor { reply_index } => write!(f, "appending({reply_index})"),
            PublishState::AwaitingPublish => write!(f, "awaiting-publish"),
            PublishState::Completed => write!(f, "completed"),
            PublishState::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

/// Every state the publisher passed through, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishTrace {
    states: Vec<PublishState>,
}

impl PublishTrace {
    fn enter(&mut self, state: PublishState) {
        info!(state = %state, "Publisher state");
        self.states.push(state);
    }

    pub fn states(&self) -> &[PublishState] {
        &self.states
    }

    pub fn last(&self) -> Option<&PublishState> {
        self.states.last()
    }

    /// Post indices filled, in order.
    pub fn filled(&self) -> Vec<usize> {
        self.states
            .iter()
            .filter_map(|s| match s {
                PublishState::Filling { post_index } => Some(*post_index),
                _ => None,
            })
            .collect()
    }

    pub fn appends(&self) -> usize {
        self.states
            .iter()
            .filter(|s| matches!(s, PublishState::AppendingEditor { .. }))
            .count()
    }
}

/// How the publisher waits for the composer to catch up after an edit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SettleMode {
    /// Sleep for the configured delay.
    #[default]
    Fixed,
    /// Poll the editor until its content stops changing, bounded by the
    /// configured delay.
    Stable,
}

#[derive(Debug, Clone)]
pub struct PublishTimings {
    pub wait_timeout: Duration,
    pub drag_settle: Duration,
    pub text_settle: Duration,
    pub image_settle: Duration,
    /// Delay between the user's publish click and dropping the post from
    /// the queue.
    pub completion_delay: Duration,
    pub settle_mode: SettleMode,
}

impl Default for PublishTimings {
    fn default() -> Self {
        Self {
            wait_timeout: wait::DEFAULT_TIMEOUT,
            drag_settle: Duration::from_millis(100),
            text_settle: Duration::from_millis(500),
            image_settle: Duration::from_millis(1000),
            completion_delay: Duration::from_millis(2000),
            settle_mode: SettleMode::Fixed,
        }
    }
}

/// Result of one publish run.
#[derive(Debug)]
pub struct PublishOutcome {
    pub trace: PublishTrace,
    pub editors_filled: usize,
    /// Completion task, present once the publish listener is armed. It
    /// finishes after the user clicks publish and the queue is updated.
    pub completion: Option<JoinHandle<()>>,
    pub error: Option<AutomationError>,
}

impl PublishOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self.trace.last(), Some(PublishState::Completed))
    }
}

pub struct ThreadPublisher {
    page: Arc<dyn Page>,
    locators: Arc<dyn TargetLocators>,
    images: Arc<dyn ImageFetcher>,
    bridge: BridgeClient,
    timings: PublishTimings,
}

impl ThreadPublisher {
    pub fn new(
        page: Arc<dyn Page>,
        locators: Arc<dyn TargetLocators>,
        images: Arc<dyn ImageFetcher>,
        bridge: BridgeClient,
    ) -> Self {
        Self {
            page,
            locators,
            images,
            bridge,
            timings: PublishTimings::default(),
        }
    }

    pub fn with_timings(mut self, timings: PublishTimings) -> Self {
        self.timings = timings;
        self
    }

    pub fn page(&self) -> &Arc<dyn Page> {
        &self.page
    }

    /// Fill the composer with `post` and its replies. Failures are reported
    /// through a toast and the returned outcome, never propagated. A lost
    /// host context reloads the page instead of toasting.
    pub async fn publish(&self, post: &Post) -> PublishOutcome {
        let mut trace = PublishTrace::default();
        let mut editors_filled = 0;
        trace.enter(PublishState::Idle);
        info!(
            tweet_id = %post.tweet_id,
            replies = post.replies.len(),
            images = post.images.len(),
            "Publishing post"
        );

        match self.drive(post, &mut trace, &mut editors_filled).await {
            Ok(completion) => {
                notify(&self.page, Toast::important(REVIEW_MESSAGE)).await;
                trace.enter(PublishState::Completed);
                PublishOutcome {
                    trace,
                    editors_filled,
                    completion: Some(completion),
                    error: None,
                }
            }
            Err(e) => {
                error!(tweet_id = %post.tweet_id, error = %e, "Publish failed");
                if e.is_context_invalidated() {
                    info!("Context invalidated, reloading page");
                    if let Err(reload) = self.page.reload().await {
                        error!(error = %reload, "Reload failed");
                    }
                } else {
                    notify(&self.page, Toast::important(format!("Publish failed: {e}"))).await;
                }
                trace.enter(PublishState::Failed {
                    reason: e.to_string(),
                });
                PublishOutcome {
                    trace,
                    editors_filled,
                    completion: None,
                    error: Some(e),
                }
            }
        }
    }

    async fn drive(
        &self,
        post: &Post,
        trace: &mut PublishTrace,
        editors_filled: &mut usize,
    ) -> PageResult<JoinHandle<()>> {
        let page = &*self.page;
        let timeout = self.timings.wait_timeout;
        let editor_selector = self.locators.editor();

        trace.enter(PublishState::Opening);
        let open = self
            .locators
            .composer_open_control(page)
            .await?
            .ok_or(AutomationError::MissingComposerControl)?;
        page.click(open).await?;

        trace.enter(PublishState::Filling { post_index: 0 });
        let editor = wait_for_element(page, editor_selector, timeout).await?;
        self.fill(editor, post).await?;
        *editors_filled += 1;

        let add_request = WaitRequest::new(self.locators.add_post_control(), timeout);
        for (i, reply) in post.replies.iter().enumerate() {
            trace.enter(PublishState::AwaitingAppendAffordance { reply_index: i });
            let existing = page.query_all(None, editor_selector).await?;
            let before = existing.len();
            // The add control belongs to whichever editor has focus.
            if let Some(&last) = existing.last() {
                page.focus(last).await?;
            }
            let add = add_request.run(page).await?;

            trace.enter(PublishState::AppendingEditor { reply_index: i });
            page.click(add).await?;
            let editors = wait_for_count_above(page, editor_selector, before, timeout).await?;
            if editors.len() != before + 1 {
                warn!(
                    before = before,
                    after = editors.len(),
                    "Unexpected editor count after append"
                );
            }
            let target = editors.last().copied().ok_or(AutomationError::MissingEditor)?;

            trace.enter(PublishState::Filling { post_index: i + 1 });
            self.fill(target, reply).await?;
            *editors_filled += 1;
        }

        trace.enter(PublishState::AwaitingPublish);
        let publish = wait_for_element(page, self.locators.publish_control(), timeout).await?;
        let aria_disabled = page.attribute(publish, "aria-disabled").await?;
        if page.is_disabled(publish).await? || aria_disabled.as_deref() == Some("true") {
            return Err(AutomationError::PublishControlUnavailable);
        }
        let clicked = page.once_clicked(publish).await?;
        Ok(self.spawn_completion(clicked, post.tweet_id.clone()))
    }

    /// Overwrite one editor with a post's text and images.
    async fn fill(&self, editor: ElementId, post: &Post) -> PageResult<()> {
        let page = &*self.page;
        page.focus(editor).await?;

        let html = paragraphs(&rewrite(&post.text, &post.links));
        page.set_inner_html(editor, &html).await?;
        page.dispatch(editor, DomEvent::Input).await?;
        self.settle(editor, self.timings.text_settle).await?;

        if !post.images.is_empty() {
            let attachments = fetch_all(&*self.images, &post.images).await?;
            debug!(count = attachments.len(), "Dropping images into editor");
            page.dispatch(editor, DomEvent::DragEnter).await?;
            self.settle(editor, self.timings.drag_settle).await?;
            page.dispatch(editor, DomEvent::DragOver).await?;
            self.settle(editor, self.timings.drag_settle).await?;
            page.dispatch(editor, DomEvent::Drop { attachments }).await?;
            self.settle(editor, self.timings.image_settle).await?;
        }

        match page.ancestor(editor, self.locators.scroll_ancestor_depth()).await? {
            Some(container) => page.scroll_to_bottom(container).await?,
            None => debug!(editor = %editor, "No scroll container above editor"),
        }
        Ok(())
    }

    async fn settle(&self, editor: ElementId, delay: Duration) -> PageResult<()> {
        match self.timings.settle_mode {
            SettleMode::Fixed => tokio::time::sleep(delay).await,
            SettleMode::Stable => {
                let page = &*self.page;
                let stable = wait::wait_for_stable(page, || page.text_content(editor), delay).await?;
                if !stable {
                    debug!(editor = %editor, "Editor still changing after settle bound");
                }
            }
        }
        Ok(())
    }

    fn spawn_completion(&self, clicked: ClickListener, tweet_id: String) -> JoinHandle<()> {
        let page = self.page.clone();
        let bridge = self.bridge.clone();
        let delay = self.timings.completion_delay;
        tokio::spawn(async move {
            if clicked.await.is_err() {
                debug!("Publish listener dropped before a click");
                return;
            }
            info!(tweet_id = %tweet_id, "Publish clicked");
            tokio::time::sleep(delay).await;
            if let Err(e) = bridge
                .call(Message::DeletePublishedTweet {
                    tweet_id: tweet_id.clone(),
                })
                .await
            {
                error!(tweet_id = %tweet_id, error = %e, "Failed to drop published post from queue");
            }
            notify(&page, Toast::info(PUBLISHED_MESSAGE)).await;
        })
    }
}
