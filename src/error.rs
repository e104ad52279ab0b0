// Automation error taxonomy.
//
// Everything that can go wrong while driving a host page ends up as one of
// these variants. Application glue (CLI, queue, background service) keeps
// using anyhow; this enum exists so callers can tell a timeout apart from a
// disabled publish control or a torn-down execution context.

use std::time::Duration;

/// Failures raised by the wait service, extractor plumbing and publisher.
#[derive(Debug, thiserror::Error)]
pub enum AutomationError {
    /// No element matching `selector` became present and visible in time.
    #[error("timed out after {timeout_ms} ms waiting for element {selector}")]
    ElementNotFound { selector: String, timeout_ms: u64 },

    /// The control that opens the composer could not be located.
    #[error("compose button not found")]
    MissingComposerControl,

    /// An editable surface that should exist could not be (re)acquired.
    #[error("editor input not found")]
    MissingEditor,

    /// The publish control exists but is disabled or aria-disabled.
    #[error("publish button is currently unavailable")]
    PublishControlUnavailable,

    /// The execution context backing the automation was torn down mid-run.
    /// The only failure that triggers a page reload instead of a toast.
    #[error("extension context invalidated")]
    HostContextInvalidated,

    /// Automation is switched off in the settings.
    #[error("automation is disabled; set TWEETSYNC_ENABLED=true to enable it")]
    AutomationDisabled,

    /// A selector used syntax outside the supported subset.
    #[error("invalid selector {selector:?}: {reason}")]
    InvalidSelector { selector: String, reason: String },

    /// The element handle no longer refers to anything in the document.
    #[error("stale element handle {0}")]
    StaleElement(u64),

    /// The message bridge rejected or timed out a request.
    #[error("bridge error: {0}")]
    Bridge(String),

    /// Anything else (image fetches, backend transport errors, ...).
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AutomationError {
    pub fn element_not_found(selector: &str, timeout: Duration) -> Self {
        AutomationError::ElementNotFound {
            selector: selector.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    /// Whether this failure should reload the page rather than notify the user.
    pub fn is_context_invalidated(&self) -> bool {
        matches!(self, AutomationError::HostContextInvalidated)
    }
}

/// Result alias used by every host-page operation.
pub type PageResult<T> = Result<T, AutomationError>;
