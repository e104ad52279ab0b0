// Content extractor: turns a rendered post on the source platform into a
// `Post`, optionally collecting the author's own follow-ups on a detail view.
//
// Extraction never fails. Every field degrades to empty on its own, with a
// warning, so one odd node doesn't cost the user the whole post.

pub mod watcher;

use chrono::Utc;
use reqwest::Url;
use tracing::{debug, warn};

use crate::error::PageResult;
use crate::locator::SourceLocators;
use crate::model::{Link, Post};
use crate::page::{ElementId, Page};

const ELLIPSIS: char = '…';

#[derive(Debug, Clone, Copy)]
pub struct ExtractOptions {
    /// Collect the author's follow-ups when on a detail view.
    pub include_replies: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            include_replies: true,
        }
    }
}

/// Extract the post rendered in `container`.
pub async fn extract(
    page: &dyn Page,
    locators: &dyn SourceLocators,
    container: ElementId,
    opts: ExtractOptions,
) -> Post {
    let mut post = read_post(page, locators, container, locators.status_link()).await;

    if opts.include_replies && on_detail_view(page, locators).await {
        post.replies = extract_thread(page, locators, container).await;
    }
    debug!(
        tweet_id = %post.tweet_id,
        images = post.images.len(),
        links = post.links.len(),
        replies = post.replies.len(),
        "Extracted post"
    );
    post
}

/// Read one post's own fields. `id_selector` picks the anchor whose href
/// carries the post id.
async fn read_post(
    page: &dyn Page,
    locators: &dyn SourceLocators,
    container: ElementId,
    id_selector: &str,
) -> Post {
    let text = degrade("text", read_text(page, locators, container).await);
    let images = degrade("images", read_images(page, locators, container).await);
    let links = degrade("links", read_links(page, locators, container).await);
    let tweet_id = degrade("tweet id", read_tweet_id(page, container, id_selector).await);

    Post {
        text,
        images,
        links,
        tweet_id,
        timestamp: Utc::now(),
        replies: Vec::new(),
    }
}

fn degrade<T: Default>(field: &str, result: PageResult<T>) -> T {
    result.unwrap_or_else(|e| {
        warn!(field = field, error = %e, "Extraction fell back to empty");
        T::default()
    })
}

async fn read_text(
    page: &dyn Page,
    locators: &dyn SourceLocators,
    container: ElementId,
) -> PageResult<String> {
    match page.query(Some(container), locators.post_text()).await? {
        Some(el) => page.text_content(el).await,
        None => Ok(String::new()),
    }
}

async fn read_images(
    page: &dyn Page,
    locators: &dyn SourceLocators,
    container: ElementId,
) -> PageResult<Vec<String>> {
    let marker = locators.decorative_image_marker();
    let mut images = Vec::new();
    for img in page.query_all(Some(container), locators.post_images()).await? {
        match page.attribute(img, "src").await? {
            Some(src) if !src.is_empty() && !src.contains(marker) => images.push(src),
            _ => {}
        }
    }
    Ok(images)
}

async fn read_links(
    page: &dyn Page,
    locators: &dyn SourceLocators,
    container: ElementId,
) -> PageResult<Vec<Link>> {
    let mut links = Vec::new();
    for anchor in page.query_all(Some(container), locators.text_links()).await? {
        let text = page.text_content(anchor).await?.trim().to_string();
        links.push(Link {
            url: text.replacen(ELLIPSIS, "", 1),
            text,
        });
    }
    Ok(links)
}

async fn read_tweet_id(
    page: &dyn Page,
    container: ElementId,
    selector: &str,
) -> PageResult<String> {
    let Some(anchor) = page.query(Some(container), selector).await? else {
        return Ok(String::new());
    };
    let href = page.attribute(anchor, "href").await?.unwrap_or_default();
    Ok(tweet_id_from_href(&href))
}

/// The path segment after `/status/`, without query string or trailing path.
pub fn tweet_id_from_href(href: &str) -> String {
    match href.split_once("/status/") {
        Some((_, rest)) => rest.split(['?', '#', '/']).next().unwrap_or("").to_string(),
        None => String::new(),
    }
}

async fn on_detail_view(page: &dyn Page, locators: &dyn SourceLocators) -> bool {
    let location = match page.location().await {
        Ok(location) => location,
        Err(e) => {
            warn!(error = %e, "Could not read page location");
            return false;
        }
    };
    let marker = locators.detail_path_marker();
    match Url::parse(&location) {
        Ok(url) => url.path().contains(marker),
        Err(_) => location.contains(marker),
    }
}

/// The signed-in username from the account switcher, without a leading `@`.
pub async fn current_username(
    page: &dyn Page,
    locators: &dyn SourceLocators,
) -> PageResult<Option<String>> {
    let Some(switcher) = page.query(None, locators.account_switcher()).await? else {
        return Ok(None);
    };
    let Some(label) = page.query(Some(switcher), locators.username_label()).await? else {
        return Ok(None);
    };
    let text = page.text_content(label).await?;
    let username = text.trim();
    let username = username.strip_prefix('@').unwrap_or(username);
    Ok((!username.is_empty()).then(|| username.to_string()))
}

/// Whether the post in `article` was written by `username`.
pub async fn is_owned_by(
    page: &dyn Page,
    locators: &dyn SourceLocators,
    article: ElementId,
    username: &str,
) -> PageResult<bool> {
    let Some(link) = page.query(Some(article), locators.author_link()).await? else {
        return Ok(false);
    };
    let href = page.attribute(link, "href").await?.unwrap_or_default();
    Ok(href.contains(&format!("/{username}/")))
}

async fn extract_thread(
    page: &dyn Page,
    locators: &dyn SourceLocators,
    container: ElementId,
) -> Vec<Post> {
    match collect_replies(page, locators, container).await {
        Ok(replies) => replies,
        Err(e) => {
            warn!(error = %e, "Thread extraction failed, keeping the post alone");
            Vec::new()
        }
    }
}

async fn collect_replies(
    page: &dyn Page,
    locators: &dyn SourceLocators,
    container: ElementId,
) -> PageResult<Vec<Post>> {
    let Some(username) = current_username(page, locators).await? else {
        warn!("Could not read the signed-in username, skipping thread extraction");
        return Ok(Vec::new());
    };

    let cells = page.query_all(None, locators.thread_cell()).await?;
    let main_cell = page.closest(container, locators.thread_cell()).await?;
    // A post outside the thread region scans every cell.
    let start = main_cell
        .and_then(|cell| cells.iter().position(|c| *c == cell))
        .map_or(0, |i| i + 1);

    let mut candidates = Vec::new();
    for &cell in &cells[start..] {
        let Some(article) = page.query(Some(cell), locators.post_article()).await? else {
            continue;
        };
        if article == container || !is_owned_by(page, locators, article, &username).await? {
            continue;
        }
        let top = page.bounding_box(article).await?.map_or(0.0, |r| r.top);
        candidates.push((top, article));
    }

    // Stable: ties keep document order.
    candidates.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut replies = Vec::with_capacity(candidates.len());
    for (_, article) in candidates {
        // One level deep: follow-ups of follow-ups are not collected.
        replies.push(read_post(page, locators, article, locators.author_link()).await);
    }
    Ok(replies)
}
