// Element wait service: the primitive everything else suspends on.
//
// The host page renders asynchronously and gives no completion signal, so
// each wait re-queries on every render tick (`Page::next_frame`) until the
// condition holds or the deadline passes. The deadline is checked only after
// a failed attempt, so a zero timeout still gets one look at the page.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::error::{AutomationError, PageResult};
use crate::page::{is_visible, ElementId, Page};

/// Default timeout for every wait the automation performs.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// A selector to wait for and how long to wait. Visibility is implied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitRequest {
    pub selector: String,
    pub timeout: Duration,
}

impl WaitRequest {
    pub fn new(selector: impl Into<String>, timeout: Duration) -> Self {
        Self {
            selector: selector.into(),
            timeout,
        }
    }

    pub async fn run(&self, page: &dyn Page) -> PageResult<ElementId> {
        wait_for_element(page, &self.selector, self.timeout).await
    }
}

/// Wait until the first element matching `selector` is present and visible.
///
/// Like `querySelector`, only the first match in document order is
/// considered on each tick.
pub async fn wait_for_element(
    page: &dyn Page,
    selector: &str,
    timeout: Duration,
) -> PageResult<ElementId> {
    let start = Instant::now();
    loop {
        if let Some(element) = page.query(None, selector).await? {
            if is_visible(page, element).await? {
                debug!(selector = selector, "Element found and visible");
                return Ok(element);
            }
        }
        if start.elapsed() >= timeout {
            return Err(AutomationError::element_not_found(selector, timeout));
        }
        page.next_frame().await;
    }
}

/// Wait until at least one match is visible, then return every visible match.
pub async fn wait_for_all_visible(
    page: &dyn Page,
    selector: &str,
    timeout: Duration,
) -> PageResult<Vec<ElementId>> {
    let start = Instant::now();
    loop {
        let mut visible = Vec::new();
        for element in page.query_all(None, selector).await? {
            if is_visible(page, element).await? {
                visible.push(element);
            }
        }
        if !visible.is_empty() {
            debug!(selector = selector, count = visible.len(), "Visible elements found");
            return Ok(visible);
        }
        if start.elapsed() >= timeout {
            return Err(AutomationError::element_not_found(selector, timeout));
        }
        page.next_frame().await;
    }
}

/// Wait until more than `previous` elements match `selector`, returning all
/// matches in document order.
///
/// Needed for freshly appended editors: they share the selector of the
/// existing ones and differ only by position.
pub async fn wait_for_count_above(
    page: &dyn Page,
    selector: &str,
    previous: usize,
    timeout: Duration,
) -> PageResult<Vec<ElementId>> {
    let start = Instant::now();
    loop {
        let matches = page.query_all(None, selector).await?;
        if matches.len() > previous {
            debug!(
                selector = selector,
                previous = previous,
                count = matches.len(),
                "Element count increased"
            );
            return Ok(matches);
        }
        if start.elapsed() >= timeout {
            return Err(AutomationError::element_not_found(selector, timeout));
        }
        page.next_frame().await;
    }
}

/// Settle predicate: poll `sample` once per frame until it returns the same
/// value on two consecutive ticks, or `max` elapses.
///
/// Returns `true` when the value stabilized, `false` when it fell back to
/// the bounded wait.
pub async fn wait_for_stable<T, F, Fut>(page: &dyn Page, mut sample: F, max: Duration) -> PageResult<bool>
where
    T: PartialEq,
    F: FnMut() -> Fut,
    Fut: Future<Output = PageResult<T>>,
{
    let start = Instant::now();
    let mut last = sample().await?;
    loop {
        page.next_frame().await;
        let current = sample().await?;
        if current == last {
            return Ok(true);
        }
        if start.elapsed() >= max {
            return Ok(false);
        }
        last = current;
    }
}
