// CdpPage: `Page` over a live browser tab via the DevTools protocol.
//
// Element handles are indices into a registry kept on `window`. A handle
// stays valid while its node is connected; once the node leaves the
// document the handle is stale and its registry slot is cleared. Listeners and
// mutation observers run in the page and leave their results in queues that
// small polling tasks on this side drain.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::error::CdpError;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{
    ClickListener, DomEvent, ElementId, MutationBatch, MutationSubscription, OverlayId, Page, Rect,
};
use crate::error::{AutomationError, PageResult};

/// Fallback frame length, and the cap on waiting for a real one. Hidden tabs
/// do not run animation frames at all.
const FRAME: Duration = Duration::from_millis(16);
const FRAME_CAP: Duration = Duration::from_millis(100);
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Registry prelude. Every script runs with `ts`, `reg` and `get` in scope.
const PRELUDE: &str = r#"
const ts = window.__tweetsync || (window.__tweetsync = { nodes: [], clicks: {}, queues: {}, observers: {} });
const reg = (el) => {
  if (el.__tweetsyncId === undefined || ts.nodes[el.__tweetsyncId] !== el) {
    el.__tweetsyncId = ts.nodes.length;
    ts.nodes.push(el);
  }
  return el.__tweetsyncId;
};
const get = (id) => {
  const el = ts.nodes[id];
  if (!el || !el.isConnected) {
    ts.nodes[id] = null;
    throw new Error("tweetsync: stale element " + id + ";");
  }
  return el;
};
"#;

const STALE_MARKER: &str = "tweetsync: stale element ";

#[derive(Deserialize)]
struct Wrapped<T> {
    v: T,
}

/// A connected browser plus the task pumping its protocol handler.
pub struct CdpSession {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl CdpSession {
    /// Attach to a running browser's DevTools websocket.
    pub async fn connect(ws_url: &str) -> anyhow::Result<Self> {
        let (browser, mut handler) = Browser::connect(ws_url)
            .await
            .with_context(|| format!("Failed to connect to browser at {ws_url}"))?;

        let handler = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });
        info!(ws_url = ws_url, "Connected to browser");
        Ok(Self { browser, handler })
    }

    /// The first open tab whose URL contains `needle`.
    pub async fn page_matching(&self, needle: &str) -> anyhow::Result<CdpPage> {
        for page in self.browser.pages().await? {
            let url = page.url().await?.unwrap_or_default();
            if url.contains(needle) {
                debug!(url = %url, "Attached to tab");
                return Ok(CdpPage::new(page));
            }
        }
        anyhow::bail!("No open tab matching {needle}. Open it in the browser first.")
    }
}

impl Drop for CdpSession {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

pub struct CdpPage {
    page: chromiumoxide::Page,
    next_key: Arc<AtomicU64>,
}

impl CdpPage {
    pub fn new(page: chromiumoxide::Page) -> Self {
        Self {
            page,
            next_key: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Run `body` (which must `return` a value) with the registry prelude.
    async fn eval<T: DeserializeOwned>(&self, body: &str) -> PageResult<T> {
        eval(&self.page, body).await
    }

    fn key(&self) -> u64 {
        self.next_key.fetch_add(1, Ordering::Relaxed)
    }
}

async fn eval<T: DeserializeOwned>(page: &chromiumoxide::Page, body: &str) -> PageResult<T> {
    let script = format!("(() => {{ {PRELUDE} return {{ v: (() => {{ {body} }})() }}; }})()");
    let result = page.evaluate(script).await.map_err(map_cdp_error)?;
    let wrapped: Wrapped<T> = result
        .into_value()
        .map_err(|e| AutomationError::Other(anyhow!("unexpected script result: {e}")))?;
    Ok(wrapped.v)
}

/// JSON-encode a value for splicing into a script.
fn js<T: serde::Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

fn map_cdp_error(err: CdpError) -> AutomationError {
    let message = match &err {
        CdpError::JavascriptException(details) => format!("{details:?}"),
        other => other.to_string(),
    };
    if let Some(id) = stale_id(&message) {
        return AutomationError::StaleElement(id);
    }
    if message.contains("Execution context was destroyed")
        || message.contains("Cannot find context")
        || message.contains("Extension context invalidated")
    {
        return AutomationError::HostContextInvalidated;
    }
    AutomationError::Other(anyhow!("browser: {message}"))
}

/// Element id from a stale-handle exception message.
fn stale_id(message: &str) -> Option<u64> {
    let (_, rest) = message.split_once(STALE_MARKER)?;
    rest.split(|c: char| !c.is_ascii_digit()).next()?.parse().ok()
}

#[async_trait]
impl Page for CdpPage {
    async fn location(&self) -> PageResult<String> {
        self.eval("return location.href;").await
    }

    async fn body(&self) -> PageResult<ElementId> {
        Ok(ElementId(self.eval("return reg(document.body);").await?))
    }

    async fn query_all(
        &self,
        scope: Option<ElementId>,
        selector: &str,
    ) -> PageResult<Vec<ElementId>> {
        let root = match scope {
            Some(id) => format!("get({})", id.0),
            None => "document".to_string(),
        };
        let ids: Vec<u64> = self
            .eval(&format!(
                "return [...{root}.querySelectorAll({})].map(reg);",
                js(selector)
            ))
            .await?;
        Ok(ids.into_iter().map(ElementId).collect())
    }

    async fn closest(&self, element: ElementId, selector: &str) -> PageResult<Option<ElementId>> {
        let id: Option<u64> = self
            .eval(&format!(
                "const el = get({}).closest({}); return el ? reg(el) : null;",
                element.0,
                js(selector)
            ))
            .await?;
        Ok(id.map(ElementId))
    }

    async fn ancestor(&self, element: ElementId, levels: usize) -> PageResult<Option<ElementId>> {
        let id: Option<u64> = self
            .eval(&format!(
                "let el = get({}); for (let i = 0; i < {levels} && el; i++) el = el.parentElement; \
                 return el ? reg(el) : null;",
                element.0
            ))
            .await?;
        Ok(id.map(ElementId))
    }

    async fn text_content(&self, element: ElementId) -> PageResult<String> {
        self.eval(&format!("return get({}).textContent || '';", element.0))
            .await
    }

    async fn attribute(&self, element: ElementId, name: &str) -> PageResult<Option<String>> {
        self.eval(&format!(
            "return get({}).getAttribute({});",
            element.0,
            js(name)
        ))
        .await
    }

    async fn is_disabled(&self, element: ElementId) -> PageResult<bool> {
        self.eval(&format!("return !!get({}).disabled;", element.0))
            .await
    }

    async fn bounding_box(&self, element: ElementId) -> PageResult<Option<Rect>> {
        self.eval(&format!(
            "const el = get({}); if (el.getClientRects().length === 0) return null; \
             const r = el.getBoundingClientRect(); \
             return {{ top: r.top, left: r.left, width: r.width, height: r.height }};",
            element.0
        ))
        .await
    }

    async fn computed_style(&self, element: ElementId, property: &str) -> PageResult<String> {
        self.eval(&format!(
            "return getComputedStyle(get({})).getPropertyValue({});",
            element.0,
            js(property)
        ))
        .await
    }

    async fn click(&self, element: ElementId) -> PageResult<()> {
        self.eval::<bool>(&format!("get({}).click(); return true;", element.0))
            .await?;
        Ok(())
    }

    async fn focus(&self, element: ElementId) -> PageResult<()> {
        self.eval::<bool>(&format!("get({}).focus(); return true;", element.0))
            .await?;
        Ok(())
    }

    async fn set_inner_html(&self, element: ElementId, html: &str) -> PageResult<()> {
        self.eval::<bool>(&format!(
            "get({}).innerHTML = {}; return true;",
            element.0,
            js(html)
        ))
        .await?;
        Ok(())
    }

    async fn append_html(&self, parent: ElementId, html: &str) -> PageResult<Vec<ElementId>> {
        let ids: Vec<u64> = self
            .eval(&format!(
                "const t = document.createElement('template'); t.innerHTML = {}; \
                 const added = [...t.content.children]; get({}).append(t.content); \
                 return added.map(reg);",
                js(html),
                parent.0
            ))
            .await?;
        Ok(ids.into_iter().map(ElementId).collect())
    }

    async fn dispatch(&self, element: ElementId, event: DomEvent) -> PageResult<()> {
        let script = match &event {
            DomEvent::Input => format!(
                "get({}).dispatchEvent(new InputEvent('input', {{ bubbles: true, cancelable: true }})); \
                 return true;",
                element.0
            ),
            DomEvent::DragEnter | DomEvent::DragOver => format!(
                "get({}).dispatchEvent(new DragEvent({}, {{ bubbles: true }})); return true;",
                element.0,
                js(event.name())
            ),
            DomEvent::Drop { attachments } => {
                let files: Vec<String> = attachments
                    .iter()
                    .map(|a| {
                        format!(
                            "new File([new Uint8Array({})], {}, {{ type: {} }})",
                            js(&a.bytes),
                            js(&a.name),
                            js(&a.mime)
                        )
                    })
                    .collect();
                format!(
                    "const dt = new DataTransfer(); [{}].forEach(f => dt.items.add(f)); \
                     get({}).dispatchEvent(new DragEvent('drop', {{ bubbles: true, cancelable: true, dataTransfer: dt }})); \
                     return true;",
                    files.join(", "),
                    element.0
                )
            }
        };
        self.eval::<bool>(&script).await?;
        Ok(())
    }

    async fn scroll_to_bottom(&self, element: ElementId) -> PageResult<()> {
        self.eval::<bool>(&format!(
            "const el = get({}); el.scrollTop = el.scrollHeight; return true;",
            element.0
        ))
        .await?;
        Ok(())
    }

    async fn next_frame(&self) {
        let frame = async {
            let params = EvaluateParams::builder()
                .expression("new Promise((resolve) => requestAnimationFrame(() => resolve(true)))")
                .await_promise(true)
                .return_by_value(true)
                .build()
                .map_err(|e| AutomationError::Other(anyhow!(e)))?;
            self.page
                .evaluate_expression(params)
                .await
                .map_err(map_cdp_error)?;
            Ok::<(), AutomationError>(())
        };
        match tokio::time::timeout(FRAME_CAP, frame).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(error = %e, "Animation frame unavailable");
                tokio::time::sleep(FRAME).await;
            }
            Err(_) => debug!("No animation frame, tab is likely hidden"),
        }
    }

    async fn subscribe(&self, root: ElementId) -> PageResult<MutationSubscription> {
        let key = self.key();
        self.eval::<bool>(&format!(
            "ts.queues[{key}] = []; \
             const o = new MutationObserver((ms) => {{ for (const m of ms) for (const n of m.addedNodes) \
               if (n.nodeType === 1) ts.queues[{key}].push(n); }}); \
             o.observe(get({}), {{ childList: true, subtree: true }}); \
             ts.observers[{key}] = o; \
             return true;",
            root.0
        ))
        .await?;

        let (tx, rx) = mpsc::unbounded_channel();
        let page = self.page.clone();
        tokio::spawn(async move {
            let drain = format!(
                "const q = ts.queues[{key}] || []; ts.queues[{key}] = []; return q.map(reg);"
            );
            let release = format!(
                "const o = ts.observers[{key}]; if (o) o.disconnect(); \
                 delete ts.observers[{key}]; delete ts.queues[{key}]; return true;"
            );
            loop {
                tokio::time::sleep(POLL_INTERVAL).await;
                if tx.is_closed() {
                    if let Err(e) = eval::<bool>(&page, &release).await {
                        debug!(error = %e, "Observer release failed");
                    }
                    break;
                }
                match eval::<Vec<u64>>(&page, &drain).await {
                    Ok(ids) if ids.is_empty() => {}
                    Ok(ids) => {
                        let added = ids.into_iter().map(ElementId).collect();
                        if tx.send(MutationBatch { added }).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Mutation polling stopped");
                        break;
                    }
                }
            }
        });
        Ok(MutationSubscription::new(rx))
    }

    async fn once_clicked(&self, element: ElementId) -> PageResult<ClickListener> {
        let key = self.key();
        self.eval::<bool>(&format!(
            "ts.clicks[{key}] = false; \
             get({}).addEventListener('click', () => {{ ts.clicks[{key}] = true; }}, {{ once: true, capture: true }}); \
             return true;",
            element.0
        ))
        .await?;

        let (tx, rx) = oneshot::channel();
        let page = self.page.clone();
        let target = element.0;
        tokio::spawn(async move {
            // `null` once the target has left the document.
            let check = format!(
                "const el = ts.nodes[{target}]; \
                 if (!el || !el.isConnected) {{ ts.nodes[{target}] = null; delete ts.clicks[{key}]; return null; }} \
                 if (ts.clicks[{key}] === true) {{ delete ts.clicks[{key}]; return true; }} \
                 return false;"
            );
            let release = format!("delete ts.clicks[{key}]; return true;");
            loop {
                tokio::time::sleep(POLL_INTERVAL).await;
                if tx.is_closed() {
                    if let Err(e) = eval::<bool>(&page, &release).await {
                        debug!(error = %e, "Click listener release failed");
                    }
                    break;
                }
                match eval::<Option<bool>>(&page, &check).await {
                    Ok(Some(true)) => {
                        let _ = tx.send(());
                        break;
                    }
                    Ok(Some(false)) => {}
                    Ok(None) => {
                        debug!(element = target, "Click target detached");
                        break;
                    }
                    Err(e) => {
                        debug!(error = %e, "Click polling stopped");
                        break;
                    }
                }
            }
        });
        Ok(rx)
    }

    async fn show_overlay(&self, text: &str, class: &str) -> PageResult<OverlayId> {
        let id: u64 = self
            .eval(&format!(
                "const d = document.createElement('div'); d.className = {}; d.textContent = {}; \
                 document.body.appendChild(d); return reg(d);",
                js(class),
                js(text)
            ))
            .await?;
        Ok(OverlayId(id))
    }

    async fn remove_overlay(&self, overlay: OverlayId) -> PageResult<()> {
        self.eval::<bool>(&format!("get({}).remove(); return true;", overlay.0))
            .await?;
        Ok(())
    }

    async fn reload(&self) -> PageResult<()> {
        // The reload tears down the context the script runs in.
        match self.eval::<bool>("setTimeout(() => location.reload(), 0); return true;").await {
            Ok(_) | Err(AutomationError::HostContextInvalidated) => Ok(()),
            Err(e) => Err(e),
        }
    }
}
