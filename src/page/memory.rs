// MemoryPage: an in-process document implementing `Page`.
//
// The document is a `scraper::Html` whose tree is edited in place, so
// queries run through `scraper::Selector` with full CSS semantics while the
// automation writes editor content into it and watches it change. Layout is
// derived from inline styles only:
//   - an element has a layout box unless it or an ancestor carries
//     `display: none` or the `hidden` attribute, or it is detached;
//   - its vertical offset is the sum of `top: Npx` and
//     `transform: translateY(Npx)` over the element and its ancestors,
//     which is how virtualized timelines position their cells.
//
// Click reactions let a fixture behave like a host page ("clicking the add
// button appends another editor"), and every dispatched event, focus change
// and scroll is recorded for inspection.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use ego_tree::{NodeId, NodeRef};
use scraper::{ElementRef, Html, Node, Selector};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, warn};

use super::{
    ClickListener, DomEvent, ElementId, MutationBatch, MutationSubscription, OverlayId, Page, Rect,
};
use crate::error::{AutomationError, PageResult};

/// Simulated render tick.
pub const FRAME: Duration = Duration::from_millis(16);

const DEFAULT_HEIGHT: f64 = 20.0;

/// What a click on a matching element does to the document.
#[derive(Debug, Clone)]
pub enum Reaction {
    /// Append `html` to the last element matching `target`.
    AppendHtml { target: String, html: String },
}

/// A dispatched synthetic event, as recorded by the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    pub target: ElementId,
    pub event: DomEvent,
}

/// Parse a selector, mapping failures into the automation taxonomy.
pub fn parse_selector(selector: &str) -> PageResult<Selector> {
    Selector::parse(selector).map_err(|e| AutomationError::InvalidSelector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

struct Document {
    html: Html,
    body: NodeId,
    /// `ElementId(n)` names `handles[n]`; handles are never reused.
    handles: Vec<NodeId>,
    handle_of: HashMap<NodeId, u64>,
    location: String,
    focused: Option<ElementId>,
    events: Vec<RecordedEvent>,
    clicks: Vec<ElementId>,
    scrolled: Vec<ElementId>,
    reactions: Vec<(String, Reaction)>,
    click_listeners: HashMap<NodeId, Vec<oneshot::Sender<()>>>,
    subscribers: Vec<(NodeId, mpsc::UnboundedSender<MutationBatch>)>,
    reloads: usize,
}

/// In-memory `Page` backed by a parsed HTML tree.
pub struct MemoryPage {
    doc: Mutex<Document>,
}

impl MemoryPage {
    /// Parse a full HTML document served at `location`.
    pub fn from_html(html: &str, location: &str) -> Self {
        let html = Html::parse_document(html);
        let root = html.root_element();
        let body = root
            .descendent_elements()
            .find(|el| el.value().name() == "body")
            .unwrap_or(root)
            .id();
        Self {
            doc: Mutex::new(Document {
                html,
                body,
                handles: Vec::new(),
                handle_of: HashMap::new(),
                location: location.to_string(),
                focused: None,
                events: Vec::new(),
                clicks: Vec::new(),
                scrolled: Vec::new(),
                reactions: Vec::new(),
                click_listeners: HashMap::new(),
                subscribers: Vec::new(),
                reloads: 0,
            }),
        }
    }

    /// Register a click reaction for elements matching `trigger`.
    pub fn with_click_reaction(mut self, trigger: &str, reaction: Reaction) -> Self {
        self.doc
            .get_mut()
            .reactions
            .push((trigger.to_string(), reaction));
        self
    }

    /// Every synthetic event dispatched so far, in order.
    pub async fn events(&self) -> Vec<RecordedEvent> {
        self.doc.lock().await.events.clone()
    }

    /// Every element clicked so far, in order.
    pub async fn clicks(&self) -> Vec<ElementId> {
        self.doc.lock().await.clicks.clone()
    }

    /// Every element scrolled to its bottom so far, in order.
    pub async fn scrolled(&self) -> Vec<ElementId> {
        self.doc.lock().await.scrolled.clone()
    }

    pub async fn focused(&self) -> Option<ElementId> {
        self.doc.lock().await.focused
    }

    pub async fn reload_count(&self) -> usize {
        self.doc.lock().await.reloads
    }

    /// Whether anything is currently waiting for a click on `element`.
    pub async fn has_click_listener(&self, element: ElementId) -> bool {
        let doc = self.doc.lock().await;
        let Ok(node) = doc.node(element) else {
            return false;
        };
        doc.click_listeners
            .get(&node)
            .is_some_and(|listeners| listeners.iter().any(|tx| !tx.is_closed()))
    }

    /// Serialized children of `element`.
    pub async fn inner_html(&self, element: ElementId) -> PageResult<String> {
        let doc = self.doc.lock().await;
        let node = doc.node(element)?;
        Ok(doc.element(node).map(|el| el.inner_html()).unwrap_or_default())
    }
}

impl Document {
    fn node(&self, id: ElementId) -> PageResult<NodeId> {
        self.handles
            .get(id.0 as usize)
            .copied()
            .ok_or(AutomationError::StaleElement(id.0))
    }

    fn handle(&mut self, node: NodeId) -> ElementId {
        if let Some(&h) = self.handle_of.get(&node) {
            return ElementId(h);
        }
        let h = self.handles.len() as u64;
        self.handles.push(node);
        self.handle_of.insert(node, h);
        ElementId(h)
    }

    fn handles_for(&mut self, nodes: Vec<NodeId>) -> Vec<ElementId> {
        nodes.into_iter().map(|n| self.handle(n)).collect()
    }

    fn element(&self, node: NodeId) -> Option<ElementRef<'_>> {
        self.html.tree.get(node).and_then(ElementRef::wrap)
    }

    /// The element and its element ancestors, nearest first.
    fn chain(&self, node: NodeId) -> Vec<NodeId> {
        let Some(start) = self.html.tree.get(node) else {
            return Vec::new();
        };
        std::iter::once(start)
            .chain(start.ancestors())
            .filter(|n| n.value().is_element())
            .map(|n| n.id())
            .collect()
    }

    fn matches(&self, node: NodeId, selector: &Selector) -> bool {
        self.element(node).is_some_and(|el| selector.matches(&el))
    }

    /// Connected elements matching `selector`, in document order. With a
    /// scope, only its strict descendants.
    fn select(&self, scope: Option<NodeId>, selector: &Selector) -> Vec<NodeId> {
        match scope.and_then(|s| self.element(s)) {
            Some(el) => el.select(selector).map(|hit| hit.id()).collect(),
            None if scope.is_some() => Vec::new(),
            None => self
                .html
                .tree
                .root()
                .descendants()
                .filter_map(ElementRef::wrap)
                .filter(|el| selector.matches(el))
                .map(|el| el.id())
                .collect(),
        }
    }

    fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node)?.value().attr(name)
    }

    fn is_connected(&self, node: NodeId) -> bool {
        let root = self.html.tree.root().id();
        node == root
            || self
                .html
                .tree
                .get(node)
                .is_some_and(|n| n.ancestors().any(|a| a.id() == root))
    }

    fn inline_style(&self, node: NodeId, property: &str) -> Option<String> {
        self.attr(node, "style")?
            .split(';')
            .filter_map(|decl| decl.split_once(':'))
            .filter(|(name, _)| name.trim().eq_ignore_ascii_case(property))
            .map(|(_, value)| value.trim().to_ascii_lowercase())
            .last()
    }

    fn is_display_none(&self, node: NodeId) -> bool {
        self.attr(node, "hidden").is_some()
            || self.inline_style(node, "display").as_deref() == Some("none")
    }

    fn vertical_offset(&self, node: NodeId) -> f64 {
        self.chain(node)
            .into_iter()
            .map(|n| {
                let top = self
                    .inline_style(n, "top")
                    .and_then(|v| parse_px(&v))
                    .unwrap_or(0.0);
                let translate = self
                    .inline_style(n, "transform")
                    .and_then(|v| parse_translate_y(&v))
                    .unwrap_or(0.0);
                top + translate
            })
            .sum()
    }

    /// Copy `source` and its subtree under `parent`.
    fn graft(&mut self, parent: NodeId, source: NodeRef<'_, Node>) -> Option<NodeId> {
        let id = self
            .html
            .tree
            .get_mut(parent)?
            .append(source.value().clone())
            .id();
        for child in source.children() {
            self.graft(id, child);
        }
        Some(id)
    }

    /// Parse a fragment, append its top-level nodes to `parent` and report
    /// the new top-level elements to subscribers.
    fn append(&mut self, parent: NodeId, html: &str) -> Vec<NodeId> {
        let fragment = Html::parse_fragment(html);
        let mut added = Vec::new();
        for child in fragment.root_element().children() {
            if let Some(id) = self.graft(parent, child) {
                if child.value().is_element() {
                    added.push(id);
                }
            }
        }
        self.notify(parent, &added);
        added
    }

    /// Detach `node`. Click listeners inside the removed subtree are dropped,
    /// so whoever awaits them sees the channel close.
    fn detach(&mut self, node: NodeId) {
        if let Some(mut n) = self.html.tree.get_mut(node) {
            n.detach();
        }
        let gone: Vec<NodeId> = self
            .click_listeners
            .keys()
            .copied()
            .filter(|&n| !self.is_connected(n))
            .collect();
        for n in gone {
            self.click_listeners.remove(&n);
        }
    }

    fn detach_children(&mut self, node: NodeId) {
        let children: Vec<NodeId> = match self.html.tree.get(node) {
            Some(n) => n.children().map(|c| c.id()).collect(),
            None => return,
        };
        for child in children {
            self.detach(child);
        }
    }

    /// Deliver a batch to every subscriber watching an ancestor-or-self of `parent`.
    fn notify(&mut self, parent: NodeId, added: &[NodeId]) {
        if added.is_empty() {
            return;
        }
        let chain = self.chain(parent);
        let batch = MutationBatch {
            added: self.handles_for(added.to_vec()),
        };
        self.subscribers.retain(|(root, tx)| {
            if chain.contains(root) {
                tx.send(batch.clone()).is_ok()
            } else {
                !tx.is_closed()
            }
        });
    }

    fn apply(&mut self, reaction: &Reaction) {
        match reaction {
            Reaction::AppendHtml { target, html } => {
                let Ok(selector) = parse_selector(target) else {
                    warn!(target = %target, "Ignoring reaction with invalid target selector");
                    return;
                };
                if let Some(&parent) = self.select(None, &selector).last() {
                    self.append(parent, html);
                }
            }
        }
    }
}

fn parse_px(value: &str) -> Option<f64> {
    value.trim().strip_suffix("px")?.trim().parse().ok()
}

fn parse_translate_y(value: &str) -> Option<f64> {
    let start = value.find("translatey(")? + "translatey(".len();
    let rest = &value[start..];
    let end = rest.find(')')?;
    parse_px(&rest[..end])
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[async_trait]
impl Page for MemoryPage {
    async fn location(&self) -> PageResult<String> {
        Ok(self.doc.lock().await.location.clone())
    }

    async fn body(&self) -> PageResult<ElementId> {
        let mut doc = self.doc.lock().await;
        let body = doc.body;
        Ok(doc.handle(body))
    }

    async fn query_all(
        &self,
        scope: Option<ElementId>,
        selector: &str,
    ) -> PageResult<Vec<ElementId>> {
        let selector = parse_selector(selector)?;
        let mut doc = self.doc.lock().await;
        let scope = scope.map(|id| doc.node(id)).transpose()?;
        let hits = doc.select(scope, &selector);
        Ok(doc.handles_for(hits))
    }

    async fn closest(&self, element: ElementId, selector: &str) -> PageResult<Option<ElementId>> {
        let selector = parse_selector(selector)?;
        let mut doc = self.doc.lock().await;
        let node = doc.node(element)?;
        let hit = doc
            .chain(node)
            .into_iter()
            .find(|&n| doc.matches(n, &selector));
        Ok(hit.map(|n| doc.handle(n)))
    }

    async fn ancestor(&self, element: ElementId, levels: usize) -> PageResult<Option<ElementId>> {
        let mut doc = self.doc.lock().await;
        let node = doc.node(element)?;
        let hit = doc.chain(node).get(levels).copied();
        Ok(hit.map(|n| doc.handle(n)))
    }

    async fn text_content(&self, element: ElementId) -> PageResult<String> {
        let doc = self.doc.lock().await;
        let node = doc.node(element)?;
        Ok(doc
            .element(node)
            .map(|el| el.text().collect())
            .unwrap_or_default())
    }

    async fn attribute(&self, element: ElementId, name: &str) -> PageResult<Option<String>> {
        let doc = self.doc.lock().await;
        let node = doc.node(element)?;
        Ok(doc.attr(node, name).map(str::to_string))
    }

    async fn is_disabled(&self, element: ElementId) -> PageResult<bool> {
        let doc = self.doc.lock().await;
        let node = doc.node(element)?;
        Ok(doc.attr(node, "disabled").is_some())
    }

    async fn bounding_box(&self, element: ElementId) -> PageResult<Option<Rect>> {
        let doc = self.doc.lock().await;
        let node = doc.node(element)?;
        if !doc.is_connected(node)
            || doc
                .chain(node)
                .into_iter()
                .any(|n| doc.is_display_none(n))
        {
            return Ok(None);
        }
        let height = doc
            .inline_style(node, "height")
            .and_then(|v| parse_px(&v))
            .unwrap_or(DEFAULT_HEIGHT);
        Ok(Some(Rect {
            top: doc.vertical_offset(node),
            left: 0.0,
            width: 100.0,
            height,
        }))
    }

    async fn computed_style(&self, element: ElementId, property: &str) -> PageResult<String> {
        let doc = self.doc.lock().await;
        let node = doc.node(element)?;
        let value = match property {
            "display" => {
                if doc.attr(node, "hidden").is_some() {
                    "none".to_string()
                } else {
                    doc.inline_style(node, "display")
                        .unwrap_or_else(|| "block".to_string())
                }
            }
            // visibility is inherited
            "visibility" => doc
                .chain(node)
                .into_iter()
                .find_map(|n| doc.inline_style(n, "visibility"))
                .unwrap_or_else(|| "visible".to_string()),
            other => doc.inline_style(node, other).unwrap_or_default(),
        };
        Ok(value)
    }

    async fn click(&self, element: ElementId) -> PageResult<()> {
        let mut doc = self.doc.lock().await;
        let node = doc.node(element)?;
        doc.clicks.push(element);

        // click listeners see the event bubble through every ancestor
        let chain = doc.chain(node);
        for n in &chain {
            if let Some(listeners) = doc.click_listeners.remove(n) {
                for tx in listeners {
                    let _ = tx.send(());
                }
            }
        }

        let triggered: Vec<Reaction> = doc
            .reactions
            .iter()
            .filter(|(trigger, _)| match parse_selector(trigger) {
                Ok(selector) => chain.iter().any(|&n| doc.matches(n, &selector)),
                Err(_) => false,
            })
            .map(|(_, reaction)| reaction.clone())
            .collect();
        for reaction in &triggered {
            debug!(element = %element, ?reaction, "Click reaction");
            doc.apply(reaction);
        }
        Ok(())
    }

    async fn focus(&self, element: ElementId) -> PageResult<()> {
        let mut doc = self.doc.lock().await;
        doc.node(element)?;
        doc.focused = Some(element);
        Ok(())
    }

    async fn set_inner_html(&self, element: ElementId, html: &str) -> PageResult<()> {
        let mut doc = self.doc.lock().await;
        let node = doc.node(element)?;
        doc.detach_children(node);
        doc.append(node, html);
        Ok(())
    }

    async fn append_html(&self, parent: ElementId, html: &str) -> PageResult<Vec<ElementId>> {
        let mut doc = self.doc.lock().await;
        let node = doc.node(parent)?;
        let added = doc.append(node, html);
        Ok(doc.handles_for(added))
    }

    async fn dispatch(&self, element: ElementId, event: DomEvent) -> PageResult<()> {
        let mut doc = self.doc.lock().await;
        doc.node(element)?;
        doc.events.push(RecordedEvent {
            target: element,
            event,
        });
        Ok(())
    }

    async fn scroll_to_bottom(&self, element: ElementId) -> PageResult<()> {
        let mut doc = self.doc.lock().await;
        doc.node(element)?;
        doc.scrolled.push(element);
        Ok(())
    }

    async fn next_frame(&self) {
        tokio::time::sleep(FRAME).await;
    }

    async fn subscribe(&self, root: ElementId) -> PageResult<MutationSubscription> {
        let mut doc = self.doc.lock().await;
        let node = doc.node(root)?;
        let (tx, rx) = mpsc::unbounded_channel();
        doc.subscribers.push((node, tx));
        Ok(MutationSubscription::new(rx))
    }

    async fn once_clicked(&self, element: ElementId) -> PageResult<ClickListener> {
        let mut doc = self.doc.lock().await;
        let node = doc.node(element)?;
        if !doc.is_connected(node) {
            return Err(AutomationError::StaleElement(element.0));
        }
        let (tx, rx) = oneshot::channel();
        doc.click_listeners.entry(node).or_default().push(tx);
        Ok(rx)
    }

    async fn show_overlay(&self, text: &str, class: &str) -> PageResult<OverlayId> {
        let mut doc = self.doc.lock().await;
        let body = doc.body;
        // overlays are not page content, so subscribers never hear about them
        let fragment = Html::parse_fragment(&format!(
            r#"<div class="{}">{}</div>"#,
            escape_html(class),
            escape_html(text)
        ));
        let node = fragment
            .root_element()
            .first_child()
            .and_then(|source| doc.graft(body, source))
            .ok_or_else(|| AutomationError::Other(anyhow::anyhow!("overlay could not be attached")))?;
        Ok(OverlayId(doc.handle(node).0))
    }

    async fn remove_overlay(&self, overlay: OverlayId) -> PageResult<()> {
        let mut doc = self.doc.lock().await;
        let node = doc.node(ElementId(overlay.0))?;
        doc.detach(node);
        Ok(())
    }

    async fn reload(&self) -> PageResult<()> {
        self.doc.lock().await.reloads += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HTML: &str = r#"<html><body>
        <div id="list">
          <div class="cell" style="transform: translateY(300px); position: absolute;"><p>late</p></div>
          <div class="cell" style="top: 100px"><p>early</p></div>
          <div class="cell" hidden><p>gone</p></div>
          <div class="cell" style="visibility: hidden"><p>ghost</p></div>
        </div>
        <button id="add">add</button>
    </body></html>"#;

    fn page() -> MemoryPage {
        MemoryPage::from_html(HTML, "https://example.com/").with_click_reaction(
            "#add",
            Reaction::AppendHtml {
                target: "#list".to_string(),
                html: r#"<div class="cell"><p>new</p></div>"#.to_string(),
            },
        )
    }

    #[tokio::test]
    async fn queries_in_document_order() {
        let page = page();
        let cells = page.query_all(None, "div.cell").await.unwrap();
        assert_eq!(cells.len(), 4);
        let texts: Vec<String> = futures::future::join_all(
            cells.iter().map(|c| page.text_content(*c)),
        )
        .await
        .into_iter()
        .map(|t| t.unwrap())
        .collect();
        assert_eq!(texts, vec!["late", "early", "gone", "ghost"]);
    }

    #[tokio::test]
    async fn layout_comes_from_inline_styles() {
        let page = page();
        let cells = page.query_all(None, "div.cell").await.unwrap();
        let p = page.query(Some(cells[0]), "p").await.unwrap().unwrap();
        assert_eq!(page.bounding_box(p).await.unwrap().unwrap().top, 300.0);
        let early = page.bounding_box(cells[1]).await.unwrap().unwrap();
        assert_eq!(early.top, 100.0);
        assert!(page.bounding_box(cells[2]).await.unwrap().is_none());
        let ghost_p = page.query(Some(cells[3]), "p").await.unwrap().unwrap();
        assert_eq!(page.computed_style(ghost_p, "visibility").await.unwrap(), "hidden");
    }

    #[tokio::test]
    async fn click_reaction_appends_and_notifies_subscribers() {
        let page = page();
        let list = page.query(None, "#list").await.unwrap().unwrap();
        let mut sub = page.subscribe(list).await.unwrap();
        let add = page.query(None, "#add").await.unwrap().unwrap();
        page.click(add).await.unwrap();

        assert_eq!(page.query_all(None, "div.cell").await.unwrap().len(), 5);
        let batch = sub.next().await.unwrap();
        assert_eq!(batch.added.len(), 1);
        assert_eq!(page.text_content(batch.added[0]).await.unwrap(), "new");
    }

    #[tokio::test]
    async fn set_inner_html_replaces_children() {
        let page = page();
        let list = page.query(None, "#list").await.unwrap().unwrap();
        let old = page.query(None, "div.cell").await.unwrap().unwrap();
        page.set_inner_html(list, "<p>one</p><p><br></p>").await.unwrap();
        assert_eq!(page.inner_html(list).await.unwrap(), "<p>one</p><p><br></p>");
        assert!(page.bounding_box(old).await.unwrap().is_none());
        assert!(page.query_all(None, "div.cell").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn click_listeners_fire_once_through_bubbling() {
        let page = MemoryPage::from_html(
            r#"<html><body><button id="go"><span>Go</span></button></body></html>"#,
            "https://example.com/",
        );
        let button = page.query(None, "#go").await.unwrap().unwrap();
        let span = page.query(Some(button), "span").await.unwrap().unwrap();
        let listener = page.once_clicked(button).await.unwrap();
        assert!(page.has_click_listener(button).await);
        page.click(span).await.unwrap();
        listener.await.unwrap();
        assert!(!page.has_click_listener(button).await);
    }

    #[tokio::test]
    async fn overlays_attach_and_detach() {
        let page = page();
        let id = page.show_overlay("Saved", "bsky-sync-toast").await.unwrap();
        let toast = page.query(None, ".bsky-sync-toast").await.unwrap().unwrap();
        assert_eq!(page.text_content(toast).await.unwrap(), "Saved");
        page.remove_overlay(id).await.unwrap();
        assert!(page.query(None, ".bsky-sync-toast").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn full_css_selectors_are_supported() {
        let page = MemoryPage::from_html(
            r#"<html><body><div id="bar">
                 <button aria-label="Publish Post" disabled>one</button>
                 <button aria-label="Add another post">two</button>
               </div></body></html>"#,
            "https://example.com/",
        );
        let texts = |ids: Vec<ElementId>| {
            let page = &page;
            async move {
                let mut out = Vec::new();
                for id in ids {
                    out.push(page.text_content(id).await.unwrap());
                }
                out
            }
        };
        let enabled = page.query_all(None, "button:not([disabled])").await.unwrap();
        assert_eq!(texts(enabled).await, vec!["two"]);
        let first = page.query_all(None, "button:first-child").await.unwrap();
        assert_eq!(texts(first).await, vec!["one"]);
        let adjacent = page.query_all(None, "button + button").await.unwrap();
        assert_eq!(texts(adjacent).await, vec!["two"]);
        let insensitive = page
            .query_all(None, r#"[aria-label="publish post" i]"#)
            .await
            .unwrap();
        assert_eq!(texts(insensitive).await, vec!["one"]);
    }

    #[tokio::test]
    async fn malformed_selector_is_reported() {
        let page = page();
        let err = page.query_all(None, "div[").await.unwrap_err();
        assert!(matches!(err, AutomationError::InvalidSelector { .. }));
    }

    #[tokio::test]
    async fn removing_an_element_closes_its_click_listeners() {
        let page = page();
        let list = page.query(None, "#list").await.unwrap().unwrap();
        let cell = page.query(Some(list), "div.cell").await.unwrap().unwrap();
        let listener = page.once_clicked(cell).await.unwrap();
        page.set_inner_html(list, "<p>replaced</p>").await.unwrap();
        assert!(listener.await.is_err());
        assert!(!page.has_click_listener(cell).await);
    }

    #[tokio::test]
    async fn detached_elements_refuse_click_listeners() {
        let page = page();
        let list = page.query(None, "#list").await.unwrap().unwrap();
        let cell = page.query(Some(list), "div.cell").await.unwrap().unwrap();
        page.set_inner_html(list, "<p>replaced</p>").await.unwrap();
        assert!(matches!(
            page.once_clicked(cell).await,
            Err(AutomationError::StaleElement(_))
        ));
    }
}
