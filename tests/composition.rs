// Composition tests: a post travels from the source page, through the
// queue, into the target composer.
//
//   sync control click -> extract -> QUEUE_TWEET -> queue
//   queue -> POST_TO_BSKY -> publisher -> publish click -> DELETE_PUBLISHED_TWEET
//
// Both pages are in-memory fixtures; the queue is an in-memory SQLite store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use tweetsync::background::BackgroundService;
use tweetsync::bridge::{self, Message, Router};
use tweetsync::db::{self, PostQueue};
use tweetsync::extract::watcher::SourceWatcher;
use tweetsync::locator::{BlueskyLocators, TwitterLocators};
use tweetsync::model::Settings;
use tweetsync::output::{external_links, truncate_chars, LinkLabel};
use tweetsync::page::memory::{MemoryPage, Reaction};
use tweetsync::page::Page;
use tweetsync::publish::handler::PublishHandler;
use tweetsync::publish::images::ImageFetcher;
use tweetsync::publish::ThreadPublisher;

const THREAD: &str = r#"<html><body>
  <div data-testid="SideNav_AccountSwitcher_Button">
    <div></div>
    <div><div><div><span>Alice</span></div><div><span>@alice</span></div></div></div>
  </div>
  <section role="region">
    <div data-testid="cellInnerDiv" style="transform: translateY(0px)">
      <article data-testid="tweet" id="root">
        <a role="link" href="/alice/status/500">Alice</a>
        <div data-testid="tweetText">Read <a href="https://t.co/x">example.com/a…</a> now</div>
        <div data-testid="tweetPhoto"><img src="https://pbs.twimg.com/media/root.jpg"></div>
        <div role="group"><button>Reply</button></div>
      </article>
    </div>
    <div data-testid="cellInnerDiv" style="transform: translateY(250px)">
      <article data-testid="tweet">
        <a role="link" href="/alice/status/502">Alice</a>
        <div data-testid="tweetText">and finally</div>
        <div role="group"><button>Reply</button></div>
      </article>
    </div>
    <div data-testid="cellInnerDiv" style="transform: translateY(120px)">
      <article data-testid="tweet">
        <a role="link" href="/alice/status/501">Alice</a>
        <div data-testid="tweetText">then this</div>
        <div role="group"><button>Reply</button></div>
      </article>
    </div>
  </section>
</body></html>"#;

const EDITOR_BLOCK: &str = r#"<div class="post"><div contenteditable="true"></div></div>"#;

fn composer_page() -> Arc<MemoryPage> {
    let html = r#"<html><body>
        <div id="composer-root"></div>
        <button tabindex="0">New post</button>
    </body></html>"#;
    let composer = format!(
        r#"<div><div><div><div><div><div id="posts">{EDITOR_BLOCK}</div></div></div></div></div>
           <button aria-label="Add another post">+</button>
           <button aria-label="Publish post">Post</button></div>"#
    );
    Arc::new(
        MemoryPage::from_html(html, "https://bsky.app/")
            .with_click_reaction(
                r#"button[tabindex="0"]"#,
                Reaction::AppendHtml {
                    target: "#composer-root".to_string(),
                    html: composer,
                },
            )
            .with_click_reaction(
                r#"[aria-label="Add another post"]"#,
                Reaction::AppendHtml {
                    target: "#posts".to_string(),
                    html: EDITOR_BLOCK.to_string(),
                },
            ),
    )
}

struct Canned;

#[async_trait]
impl ImageFetcher for Canned {
    async fn fetch(&self, _url: &str) -> anyhow::Result<Vec<u8>> {
        Ok(vec![1, 2, 3])
    }
}

// ============================================================
// Chain: source page -> queue -> composer -> queue
// ============================================================

#[tokio::test(start_paused = true)]
async fn thread_round_trips_from_source_page_to_composer() {
    let queue = db::in_memory().unwrap();
    let settings = Settings {
        is_enabled: true,
        target_credentials: None,
        source_username: "alice".to_string(),
    };
    let (client, rx) = bridge::channel(bridge::DEFAULT_REQUEST_TIMEOUT);

    let source = Arc::new(MemoryPage::from_html(
        THREAD,
        "https://x.com/alice/status/500",
    ));
    let target = composer_page();
    let publisher = Arc::new(ThreadPublisher::new(
        target.clone(),
        Arc::new(BlueskyLocators::default()),
        Arc::new(Canned),
        client.clone(),
    ));
    let handler = Arc::new(PublishHandler::new(publisher, true));
    tokio::spawn(
        Router::new(Arc::new(BackgroundService::new(queue.clone(), settings)))
            .with_content(handler.clone())
            .serve(rx),
    );

    // Source side: every own post gets a control; the root's is clicked.
    let watcher = SourceWatcher::new(source.clone(), Arc::new(TwitterLocators), client.clone());
    let body = source.body().await.unwrap();
    assert_eq!(watcher.scan(body).await.unwrap().len(), 3);
    tokio::time::sleep(Duration::from_millis(10)).await;
    let root = source.query(None, "#root").await.unwrap().unwrap();
    let button = source
        .query(Some(root), r#".sync-to-bsky-button [role="button"]"#)
        .await
        .unwrap()
        .unwrap();
    source.click(button).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let queued = queue.load().await.unwrap();
    assert_eq!(queued.len(), 1);
    let post = queued[0].clone();
    assert_eq!(post.tweet_id, "500");
    assert_eq!(post.images, vec!["https://pbs.twimg.com/media/root.jpg"]);
    let reply_ids: Vec<&str> = post.replies.iter().map(|r| r.tweet_id.as_str()).collect();
    assert_eq!(reply_ids, vec!["501", "502"]);
    assert_eq!(
        external_links(&post.links),
        vec![LinkLabel::Host("example.com".to_string())]
    );

    // Target side: the queued post is handed to the composer.
    let started = client
        .call(Message::PostToBsky(post))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(started["editors"], 3);
    let outcome = handler.take_last_run().await.unwrap().await.unwrap();
    assert!(outcome.is_completed(), "{:?}", outcome.error);

    let editors = target
        .query_all(None, r#"div[contenteditable="true"]"#)
        .await
        .unwrap();
    let mut contents = Vec::new();
    for editor in &editors {
        contents.push(target.inner_html(*editor).await.unwrap());
    }
    assert_eq!(
        contents,
        vec![
            "<p>Read example.com/a now</p>".to_string(),
            "<p>then this</p>".to_string(),
            "<p>and finally</p>".to_string(),
        ]
    );

    // Still queued until the user actually publishes.
    assert_eq!(queue.load().await.unwrap().len(), 1);
    let publish = target
        .query(None, r#"[aria-label="Publish post"]"#)
        .await
        .unwrap()
        .unwrap();
    target.click(publish).await.unwrap();
    outcome.completion.unwrap().await.unwrap();

    assert!(queue.load().await.unwrap().is_empty());
    assert_eq!(queue.published_count().await.unwrap(), 1);
}

// ============================================================
// Chain: queue -> listing helpers
// ============================================================

#[tokio::test]
async fn queued_post_preview_is_display_safe() {
    let queue = db::in_memory().unwrap();
    let service = BackgroundService::new(queue.clone(), Settings::default());
    let post = tweetsync::model::Post {
        text: "🦋".repeat(200),
        images: vec![],
        links: vec![
            tweetsync::model::Link {
                url: "x.com/alice/status/9".to_string(),
                text: "x.com/alice/status/9".to_string(),
            },
            tweetsync::model::Link {
                url: "blog.example.org/post".to_string(),
                text: "blog.example.org/po…".to_string(),
            },
        ],
        tweet_id: "9".to_string(),
        timestamp: chrono::Utc::now(),
        replies: vec![],
    };
    assert_eq!(service.enqueue(post).await.unwrap(), 1);

    let stored = &queue.load().await.unwrap()[0];
    let preview = truncate_chars(&stored.text, 120);
    assert_eq!(preview.chars().count(), 123);
    assert_eq!(
        external_links(&stored.links),
        vec![LinkLabel::Host("blog.example.org".to_string())]
    );
}
