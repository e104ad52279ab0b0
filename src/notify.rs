// Toast notifications shown on the host page.
//
// Each toast is its own overlay with an explicit lifecycle: created, attached
// to the page, then detached by a timer. Nothing is shared between toasts.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::PageResult;
use crate::page::Page;

/// How long a toast stays on screen.
pub const TOAST_LIFETIME: Duration = Duration::from_millis(2000);

const TOAST_CLASS: &str = "bsky-sync-toast";
const IMPORTANT_CLASS: &str = "bsky-sync-toast important";

/// A transient, auto-dismissing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub message: String,
    /// Important toasts are rendered larger and centered.
    pub important: bool,
    pub lifetime: Duration,
}

impl Toast {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            important: false,
            lifetime: TOAST_LIFETIME,
        }
    }

    pub fn important(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            important: true,
            lifetime: TOAST_LIFETIME,
        }
    }

    fn class(&self) -> &'static str {
        if self.important {
            IMPORTANT_CLASS
        } else {
            TOAST_CLASS
        }
    }

    /// Attach the toast and schedule its removal. The returned handle
    /// completes once the toast is gone.
    pub async fn show(self, page: Arc<dyn Page>) -> PageResult<JoinHandle<()>> {
        let overlay = page.show_overlay(&self.message, self.class()).await?;
        info!(message = %self.message, important = self.important, "Toast shown");
        let lifetime = self.lifetime;
        Ok(tokio::spawn(async move {
            tokio::time::sleep(lifetime).await;
            if let Err(e) = page.remove_overlay(overlay).await {
                debug!(error = %e, "Toast already gone");
            }
        }))
    }
}

/// Show a toast, logging instead of failing if the page refuses it.
pub async fn notify(page: &Arc<dyn Page>, toast: Toast) {
    if let Err(e) = toast.clone().show(page.clone()).await {
        warn!(message = %toast.message, error = %e, "Failed to show toast");
    }
}
