// Extraction tests against a saved-page shaped fixture.
//
// The fixture mirrors a detail view: an account switcher carrying the
// signed-in username, and a virtualized thread region whose cells are
// positioned with translateY, so document order differs from visual order.

use std::sync::Arc;

use tweetsync::extract::{current_username, extract, tweet_id_from_href, ExtractOptions};
use tweetsync::locator::{SourceLocators, TwitterLocators};
use tweetsync::page::memory::MemoryPage;
use tweetsync::page::{ElementId, Page};

const SWITCHER: &str = r#"
<div data-testid="SideNav_AccountSwitcher_Button">
  <div><img src="https://pbs.twimg.com/profile/alice.jpg"></div>
  <div><div>
    <div><span>Alice</span></div>
    <div><span>@alice</span></div>
  </div></div>
</div>"#;

fn article(author: &str, id: &str, text: &str) -> String {
    format!(
        r#"<article data-testid="tweet">
             <a role="link" href="/{author}/status/{id}">{author}</a>
             <div data-testid="tweetText">{text}</div>
             <div role="group"><button>Reply</button></div>
           </article>"#
    )
}

fn thread_page(with_switcher: bool) -> String {
    let main = r#"<article data-testid="tweet" id="main">
          <a role="link" href="/alice/status/100?s=20">Alice</a>
          <div data-testid="tweetText">Read <a href="https://t.co/abc">example.com/long-article…</a> today
second line</div>
          <div data-testid="tweetPhoto"><img src="https://pbs.twimg.com/media/one.jpg"></div>
          <div data-testid="tweetPhoto"><img src="https://abs-0.twimg.com/emoji/v2/svg/1f600.svg"></div>
          <div data-testid="tweetPhoto"><img src=""></div>
          <div data-testid="tweetPhoto"><img src="https://pbs.twimg.com/media/two.jpg"></div>
        </article>"#;

    format!(
        r#"<html><body>
          <header>{switcher}</header>
          <main><section role="region">
            <div data-testid="cellInnerDiv" style="transform: translateY(0px)">{main}</div>
            <div data-testid="cellInnerDiv" style="transform: translateY(300px)">{a}</div>
            <div data-testid="cellInnerDiv" style="transform: translateY(100px)">{b}</div>
            <div data-testid="cellInnerDiv" style="transform: translateY(200px)">{c}</div>
            <div data-testid="cellInnerDiv" style="transform: translateY(150px)">{bob}</div>
            <div data-testid="cellInnerDiv" style="transform: translateY(400px)"><div>Show more replies</div></div>
          </section></main>
        </body></html>"#,
        switcher = if with_switcher { SWITCHER } else { "" },
        a = article("alice", "101", "A"),
        b = article("alice", "102", "B"),
        c = article("alice", "103", "C"),
        bob = article("bob", "104", "not mine"),
    )
}

const DETAIL_URL: &str = "https://x.com/alice/status/100";

async fn main_article(page: &MemoryPage) -> ElementId {
    page.query(None, "#main").await.unwrap().unwrap()
}

// ============================================================
// Single post fields
// ============================================================

#[tokio::test]
async fn text_is_verbatim_and_links_drop_the_ellipsis() {
    let page = MemoryPage::from_html(&thread_page(true), "https://x.com/home");
    let main = main_article(&page).await;
    let post = extract(&page, &TwitterLocators, main, ExtractOptions::default()).await;

    assert_eq!(post.text, "Read example.com/long-article… today\nsecond line");
    assert_eq!(post.links.len(), 1);
    assert_eq!(post.links[0].text, "example.com/long-article…");
    assert_eq!(post.links[0].url, "example.com/long-article");
}

#[tokio::test]
async fn emoji_and_empty_images_are_skipped() {
    let page = MemoryPage::from_html(&thread_page(true), "https://x.com/home");
    let main = main_article(&page).await;
    let post = extract(&page, &TwitterLocators, main, ExtractOptions::default()).await;

    assert_eq!(
        post.images,
        vec![
            "https://pbs.twimg.com/media/one.jpg".to_string(),
            "https://pbs.twimg.com/media/two.jpg".to_string(),
        ]
    );
}

#[tokio::test]
async fn tweet_id_has_no_query_string() {
    let page = MemoryPage::from_html(&thread_page(true), "https://x.com/home");
    let main = main_article(&page).await;
    let post = extract(&page, &TwitterLocators, main, ExtractOptions::default()).await;
    assert_eq!(post.tweet_id, "100");
    assert_eq!(tweet_id_from_href("https://x.com/a/status/9?ref=x"), "9");
}

#[tokio::test]
async fn missing_pieces_degrade_to_empty() {
    let page = MemoryPage::from_html(
        r#"<html><body><article data-testid="tweet" id="bare"></article></body></html>"#,
        "https://x.com/home",
    );
    let bare = page.query(None, "#bare").await.unwrap().unwrap();
    let post = extract(&page, &TwitterLocators, bare, ExtractOptions::default()).await;
    assert!(post.text.is_empty());
    assert!(post.images.is_empty());
    assert!(post.links.is_empty());
    assert!(post.tweet_id.is_empty());
    assert!(post.replies.is_empty());
}

// ============================================================
// Threads
// ============================================================

#[tokio::test]
async fn replies_follow_visual_order_and_skip_other_authors() {
    let page = MemoryPage::from_html(&thread_page(true), DETAIL_URL);
    let main = main_article(&page).await;
    let post = extract(&page, &TwitterLocators, main, ExtractOptions::default()).await;

    let texts: Vec<&str> = post.replies.iter().map(|r| r.text.as_str()).collect();
    assert_eq!(texts, vec!["B", "C", "A"]);
    let ids: Vec<&str> = post.replies.iter().map(|r| r.tweet_id.as_str()).collect();
    assert_eq!(ids, vec!["102", "103", "101"]);
    assert!(post.replies.iter().all(|r| r.replies.is_empty()));
    assert_eq!(post.editor_count(), 4);
}

#[tokio::test]
async fn extraction_is_idempotent_on_a_static_page() {
    let page = MemoryPage::from_html(&thread_page(true), DETAIL_URL);
    let main = main_article(&page).await;
    let first = extract(&page, &TwitterLocators, main, ExtractOptions::default()).await;
    let second = extract(&page, &TwitterLocators, main, ExtractOptions::default()).await;
    assert!(first.same_content(&second));
}

#[tokio::test]
async fn no_replies_off_a_detail_view() {
    let page = MemoryPage::from_html(&thread_page(true), "https://x.com/home");
    let main = main_article(&page).await;
    let post = extract(&page, &TwitterLocators, main, ExtractOptions::default()).await;
    assert!(post.replies.is_empty());
}

#[tokio::test]
async fn replies_can_be_switched_off() {
    let page = MemoryPage::from_html(&thread_page(true), DETAIL_URL);
    let main = main_article(&page).await;
    let post = extract(
        &page,
        &TwitterLocators,
        main,
        ExtractOptions {
            include_replies: false,
        },
    )
    .await;
    assert!(post.replies.is_empty());
}

#[tokio::test]
async fn unknown_username_means_no_replies() {
    let page = MemoryPage::from_html(&thread_page(false), DETAIL_URL);
    let main = main_article(&page).await;
    let post = extract(&page, &TwitterLocators, main, ExtractOptions::default()).await;
    assert_eq!(post.tweet_id, "100");
    assert!(post.replies.is_empty());
}

#[tokio::test]
async fn username_is_read_without_the_at_sign() {
    let page: Arc<dyn Page> = Arc::new(MemoryPage::from_html(&thread_page(true), DETAIL_URL));
    let locators = TwitterLocators;
    assert_eq!(
        current_username(&*page, &locators).await.unwrap().as_deref(),
        Some("alice")
    );
    assert_eq!(locators.detail_path_marker(), "/status/");
}

/// A thread where an earlier post of the same author is rendered above the
/// main post, and two replies share a vertical position.
fn thread_with_context() -> String {
    format!(
        r#"<html><body>
          <header>{SWITCHER}</header>
          <main><section role="region">
            <div data-testid="cellInnerDiv" style="transform: translateY(50px)">{earlier}</div>
            <div data-testid="cellInnerDiv" style="transform: translateY(200px)">
              <article data-testid="tweet" id="main">
                <a role="link" href="/alice/status/200">Alice</a>
                <div data-testid="tweetText">main</div>
              </article>
            </div>
            <div data-testid="cellInnerDiv" style="transform: translateY(300px)">{first_tie}</div>
            <div data-testid="cellInnerDiv" style="transform: translateY(300px)">{second_tie}</div>
            <div data-testid="cellInnerDiv" style="transform: translateY(250px)">{above_ties}</div>
          </section></main>
        </body></html>"#,
        earlier = article("alice", "199", "earlier"),
        first_tie = article("alice", "201", "first tie"),
        second_tie = article("alice", "202", "second tie"),
        above_ties = article("alice", "203", "above ties"),
    )
}

#[tokio::test]
async fn posts_before_the_main_post_are_not_replies() {
    let page = MemoryPage::from_html(&thread_with_context(), "https://x.com/alice/status/200");
    let main = main_article(&page).await;
    let post = extract(&page, &TwitterLocators, main, ExtractOptions::default()).await;

    assert_eq!(post.tweet_id, "200");
    assert!(post.replies.iter().all(|r| r.tweet_id != "199"));
    assert_eq!(post.replies.len(), 3);
}

#[tokio::test]
async fn replies_at_the_same_height_keep_document_order() {
    let page = MemoryPage::from_html(&thread_with_context(), "https://x.com/alice/status/200");
    let main = main_article(&page).await;
    let post = extract(&page, &TwitterLocators, main, ExtractOptions::default()).await;

    let ids: Vec<&str> = post.replies.iter().map(|r| r.tweet_id.as_str()).collect();
    assert_eq!(ids, vec!["203", "201", "202"]);
}
