// Source watcher: attaches a sync control to each of the user's own posts
// as the timeline renders them, and queues the post when it is activated.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{current_username, extract, is_owned_by, ExtractOptions};
use crate::bridge::{BridgeClient, Message};
use crate::error::PageResult;
use crate::locator::SourceLocators;
use crate::notify::{notify, Toast};
use crate::page::{ElementId, Page};

pub const QUEUED_MESSAGE: &str = "Tweet added to sync queue";
pub const SAVE_FAILED_MESSAGE: &str = "Save failed, please try again";

#[derive(Clone)]
pub struct SourceWatcher {
    page: Arc<dyn Page>,
    locators: Arc<dyn SourceLocators>,
    bridge: BridgeClient,
    /// Click loops by control. A loop ends once its control leaves the page.
    listeners: Arc<Mutex<HashMap<ElementId, JoinHandle<()>>>>,
}

impl SourceWatcher {
    pub fn new(page: Arc<dyn Page>, locators: Arc<dyn SourceLocators>, bridge: BridgeClient) -> Self {
        Self {
            page,
            locators,
            bridge,
            listeners: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of controls whose click loop is still running.
    pub async fn active_listeners(&self) -> usize {
        let mut listeners = self.listeners.lock().await;
        listeners.retain(|_, run| !run.is_finished());
        listeners.len()
    }

    /// Abort every click loop.
    pub async fn stop(&self) {
        for (_, run) in self.listeners.lock().await.drain() {
            run.abort();
        }
    }

    fn control_html(&self) -> String {
        format!(
            r#"<div class="{}"><div role="button" tabindex="0"><span>Sync</span></div></div>"#,
            self.locators.sync_control_class()
        )
    }

    /// Attach sync controls under `root`, then keep doing so for everything
    /// the page adds. Runs until the page stops reporting mutations.
    pub async fn run(self) -> PageResult<()> {
        let body = self.page.body().await?;
        let mut mutations = self.page.subscribe(body).await?;
        let injected = self.scan(body).await?;
        info!(controls = injected.len(), "Source watcher started");

        while let Some(batch) = mutations.next().await {
            for root in batch.added {
                if let Err(e) = self.scan(root).await {
                    warn!(root = %root, error = %e, "Failed to scan added subtree");
                }
            }
            let active = self.active_listeners().await;
            debug!(active, "Sync control listeners");
        }
        debug!("Mutation stream ended");
        self.stop().await;
        Ok(())
    }

    /// Inject a sync control into every eligible post in `root` (including
    /// `root` itself). Returns the injected controls.
    pub async fn scan(&self, root: ElementId) -> PageResult<Vec<ElementId>> {
        let article_selector = self.locators.post_article();
        let mut articles = self.page.query_all(Some(root), article_selector).await?;
        if self.page.closest(root, article_selector).await? == Some(root) {
            articles.insert(0, root);
        }
        if articles.is_empty() {
            return Ok(Vec::new());
        }

        let Some(username) = current_username(&*self.page, &*self.locators).await? else {
            warn!("Could not read the signed-in username, no sync controls added");
            return Ok(Vec::new());
        };

        let existing = format!(".{}", self.locators.sync_control_class());
        let html = self.control_html();
        let mut injected = Vec::new();
        for article in articles {
            if self.page.query(Some(article), &existing).await?.is_some() {
                continue;
            }
            let Some(action_bar) = self.page.query(Some(article), self.locators.action_bar()).await?
            else {
                continue;
            };
            if !is_owned_by(&*self.page, &*self.locators, article, &username).await? {
                continue;
            }
            if let Some(&control) = self.page.append_html(action_bar, &html).await?.first() {
                let run = self.arm(control);
                self.listeners.lock().await.insert(control, run);
                injected.push(control);
            }
        }
        if !injected.is_empty() {
            debug!(count = injected.len(), "Sync controls injected");
        }
        Ok(injected)
    }

    /// Re-arming click loop for one control. Ends when the control is
    /// removed, since the page then refuses or drops its listener.
    fn arm(&self, control: ElementId) -> JoinHandle<()> {
        let watcher = self.clone();
        tokio::spawn(async move {
            loop {
                let clicked = match watcher.page.once_clicked(control).await {
                    Ok(listener) => listener,
                    Err(e) => {
                        debug!(control = %control, error = %e, "Sync control gone");
                        return;
                    }
                };
                if clicked.await.is_err() {
                    debug!(control = %control, "Sync control removed");
                    return;
                }
                watcher.on_sync_activated(control).await;
            }
        })
    }

    /// Handle a sync control activation: extract the enclosing post and send
    /// it to the queue. Failures end here as a toast.
    pub async fn on_sync_activated(&self, control: ElementId) {
        let article = match self.page.closest(control, "article").await {
            Ok(Some(article)) => article,
            Ok(None) => {
                error!(control = %control, "Sync control is not inside a post");
                return;
            }
            Err(e) => {
                error!(control = %control, error = %e, "Failed to locate the post container");
                return;
            }
        };

        let post = extract(
            &*self.page,
            &*self.locators,
            article,
            ExtractOptions {
                include_replies: true,
            },
        )
        .await;
        let tweet_id = post.tweet_id.clone();

        match self.bridge.call(Message::QueueTweet(post)).await {
            Ok(_) => {
                info!(tweet_id = %tweet_id, "Post queued");
                notify(&self.page, Toast::info(QUEUED_MESSAGE)).await;
            }
            Err(e) => {
                error!(tweet_id = %tweet_id, error = %e, "Failed to queue post");
                notify(&self.page, Toast::info(SAVE_FAILED_MESSAGE)).await;
                if e.is_context_invalidated() {
                    info!("Context invalidated, reloading page");
                    if let Err(e) = self.page.reload().await {
                        error!(error = %e, "Reload failed");
                    }
                }
            }
        }
    }
}
