// Host page abstraction.
//
// The automation never owns the document it works on. Everything it does
// (querying, reading layout, clicking, writing editor content, listening for
// mutations) goes through the `Page` trait, so the same wait service,
// extractor and publisher run against a live browser tab or an in-memory
// document.

pub mod memory;

#[cfg(feature = "cdp")]
pub mod cdp;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::error::PageResult;

/// Opaque, transient reference to one element of the host document.
///
/// Never persisted. A handle may go stale once the page re-renders, so
/// callers re-acquire handles after every mutating action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub u64);

impl std::fmt::Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Layout box of an element, in document coordinates.
#[derive(Debug, Clone, Copy, PartialEq, serde::Deserialize)]
pub struct Rect {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

/// A binary file handed to the page as part of a synthetic drop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Synthetic events the automation dispatches on an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomEvent {
    /// Tells the page's own state observers that editable content changed.
    Input,
    DragEnter,
    DragOver,
    /// Carries every attachment at once.
    Drop { attachments: Vec<Attachment> },
}

impl DomEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DomEvent::Input => "input",
            DomEvent::DragEnter => "dragenter",
            DomEvent::DragOver => "dragover",
            DomEvent::Drop { .. } => "drop",
        }
    }
}

/// Handle to a transient overlay (toast) shown on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OverlayId(pub u64);

/// One batch of structural changes: elements inserted under the watched root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationBatch {
    pub added: Vec<ElementId>,
}

/// Registered interest in a subtree. Dropping it unsubscribes.
pub struct MutationSubscription {
    rx: mpsc::UnboundedReceiver<MutationBatch>,
}

impl MutationSubscription {
    pub fn new(rx: mpsc::UnboundedReceiver<MutationBatch>) -> Self {
        Self { rx }
    }

    /// Wait for the next batch. `None` once the page stops delivering.
    pub async fn next(&mut self) -> Option<MutationBatch> {
        self.rx.recv().await
    }
}

/// Resolves once the element it was armed on gets clicked. One-shot.
pub type ClickListener = oneshot::Receiver<()>;

/// A live (or simulated) document the automation can read and drive.
///
/// Selectors are ordinary CSS selectors.
/// Scoped queries follow `querySelectorAll` semantics: the selector is
/// matched against the whole document and results are limited to strict
/// descendants of `scope`.
#[async_trait]
pub trait Page: Send + Sync {
    /// Current page URL.
    async fn location(&self) -> PageResult<String>;

    /// The document body.
    async fn body(&self) -> PageResult<ElementId>;

    /// All matches in document order.
    async fn query_all(&self, scope: Option<ElementId>, selector: &str)
        -> PageResult<Vec<ElementId>>;

    /// First match in document order.
    async fn query(&self, scope: Option<ElementId>, selector: &str) -> PageResult<Option<ElementId>> {
        Ok(self.query_all(scope, selector).await?.into_iter().next())
    }

    /// Nearest ancestor-or-self matching `selector`.
    async fn closest(&self, element: ElementId, selector: &str) -> PageResult<Option<ElementId>>;

    /// The ancestor `levels` steps up (`0` is the element itself).
    async fn ancestor(&self, element: ElementId, levels: usize) -> PageResult<Option<ElementId>>;

    /// Concatenated text of the element and its descendants.
    async fn text_content(&self, element: ElementId) -> PageResult<String>;

    async fn attribute(&self, element: ElementId, name: &str) -> PageResult<Option<String>>;

    /// The DOM `disabled` property.
    async fn is_disabled(&self, element: ElementId) -> PageResult<bool>;

    /// `None` when the element has no layout box.
    async fn bounding_box(&self, element: ElementId) -> PageResult<Option<Rect>>;

    /// Computed value of a CSS property (`display`, `visibility`).
    async fn computed_style(&self, element: ElementId, property: &str) -> PageResult<String>;

    async fn click(&self, element: ElementId) -> PageResult<()>;

    async fn focus(&self, element: ElementId) -> PageResult<()>;

    /// Replace the element's children wholesale.
    async fn set_inner_html(&self, element: ElementId, html: &str) -> PageResult<()>;

    /// Parse `html` and append it to `parent`, returning the new top-level elements.
    async fn append_html(&self, parent: ElementId, html: &str) -> PageResult<Vec<ElementId>>;

    async fn dispatch(&self, element: ElementId, event: DomEvent) -> PageResult<()>;

    /// Scroll a scrollable element to its bottom extent.
    async fn scroll_to_bottom(&self, element: ElementId) -> PageResult<()>;

    /// Resolves on the host's next render tick.
    async fn next_frame(&self);

    /// Receive a batch per structural change under `root`.
    async fn subscribe(&self, root: ElementId) -> PageResult<MutationSubscription>;

    /// Arm a one-shot listener for the next click on `element`.
    async fn once_clicked(&self, element: ElementId) -> PageResult<ClickListener>;

    /// Attach a text overlay carrying the given CSS class list.
    async fn show_overlay(&self, text: &str, class: &str) -> PageResult<OverlayId>;

    async fn remove_overlay(&self, overlay: OverlayId) -> PageResult<()>;

    /// Full page reload. Only used after the execution context was invalidated.
    async fn reload(&self) -> PageResult<()>;
}

/// Visible = has a layout box, `display` isn't `none`, `visibility` isn't `hidden`.
pub async fn is_visible(page: &dyn Page, element: ElementId) -> PageResult<bool> {
    if page.bounding_box(element).await?.is_none() {
        return Ok(false);
    }
    if page.computed_style(element, "display").await? == "none" {
        return Ok(false);
    }
    Ok(page.computed_style(element, "visibility").await? != "hidden")
}
