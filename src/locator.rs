// Locator policies: where each affordance lives on a given platform.
//
// Host pages expose several look-alike controls and no stable ids, so
// finding "the" compose button or "the" publish button is a heuristic. The
// heuristics live here, one implementation per platform, and the extractor
// and publisher only talk to the traits. Expect these to break whenever the
// host markup changes; that is the whole reason they are isolated.

use async_trait::async_trait;

use crate::error::PageResult;
use crate::page::{ElementId, Page};

/// Selectors for reading posts off the source platform.
pub trait SourceLocators: Send + Sync {
    /// A rendered post.
    fn post_article(&self) -> &str;
    /// The post's text node.
    fn post_text(&self) -> &str;
    /// Images attached to the post.
    fn post_images(&self) -> &str;
    /// Anchors inside the post text.
    fn text_links(&self) -> &str;
    /// Any anchor pointing at a detail view.
    fn status_link(&self) -> &str;
    /// The author link used to decide ownership.
    fn author_link(&self) -> &str;
    /// Top-level cells of the thread region on a detail view.
    fn thread_cell(&self) -> &str;
    /// The account switcher holding the signed-in username.
    fn account_switcher(&self) -> &str;
    /// The username label inside the account switcher.
    fn username_label(&self) -> &str;
    /// The post's action bar, where the sync control is attached.
    fn action_bar(&self) -> &str;
    /// CSS class of the injected sync control.
    fn sync_control_class(&self) -> &str;
    /// Path marker of a detail view URL.
    fn detail_path_marker(&self) -> &str;
    /// Substring identifying decorative (emoji) images.
    fn decorative_image_marker(&self) -> &str;
}

/// Selectors and heuristics for driving the target platform's composer.
#[async_trait]
pub trait TargetLocators: Send + Sync {
    /// Find the control that opens the composer.
    async fn composer_open_control(&self, page: &dyn Page) -> PageResult<Option<ElementId>>;
    /// Editable surfaces, one per post in the thread.
    fn editor(&self) -> &str;
    /// The "add another post" control.
    fn add_post_control(&self) -> &str;
    /// The publish control.
    fn publish_control(&self) -> &str;
    /// How many levels above an editor its scrollable container sits.
    fn scroll_ancestor_depth(&self) -> usize;
}

/// X / Twitter markup.
#[derive(Debug, Clone, Copy, Default)]
pub struct TwitterLocators;

impl SourceLocators for TwitterLocators {
    fn post_article(&self) -> &str {
        r#"article[data-testid="tweet"]"#
    }

    fn post_text(&self) -> &str {
        r#"[data-testid="tweetText"]"#
    }

    fn post_images(&self) -> &str {
        r#"div[data-testid="tweetPhoto"]>img"#
    }

    fn text_links(&self) -> &str {
        r#"div[data-testid="tweetText"] a"#
    }

    fn status_link(&self) -> &str {
        r#"a[href*="/status/"]"#
    }

    fn author_link(&self) -> &str {
        r#"a[role="link"][href*="/status/"]"#
    }

    fn thread_cell(&self) -> &str {
        r#"section[role="region"] div[data-testid="cellInnerDiv"]"#
    }

    fn account_switcher(&self) -> &str {
        r#"[data-testid="SideNav_AccountSwitcher_Button"]"#
    }

    fn username_label(&self) -> &str {
        "div:nth-child(2) > div > div:nth-child(2) span"
    }

    fn action_bar(&self) -> &str {
        r#"[role="group"]"#
    }

    fn sync_control_class(&self) -> &str {
        "sync-to-bsky-button"
    }

    fn detail_path_marker(&self) -> &str {
        "/status/"
    }

    fn decorative_image_marker(&self) -> &str {
        "emoji"
    }
}

/// Bluesky web composer markup.
#[derive(Debug, Clone, Copy)]
pub struct BlueskyLocators {
    pub scroll_depth: usize,
}

impl Default for BlueskyLocators {
    fn default() -> Self {
        Self { scroll_depth: 6 }
    }
}

#[async_trait]
impl TargetLocators for BlueskyLocators {
    /// The last focusable button on the page. Positional and fragile: it
    /// relies on the floating compose button being rendered after the nav.
    async fn composer_open_control(&self, page: &dyn Page) -> PageResult<Option<ElementId>> {
        Ok(page
            .query_all(None, r#"button[tabindex="0"]"#)
            .await?
            .last()
            .copied())
    }

    fn editor(&self) -> &str {
        r#"div[contenteditable="true"]"#
    }

    fn add_post_control(&self) -> &str {
        r#"[aria-label="Add another post"]"#
    }

    fn publish_control(&self) -> &str {
        r#"[aria-label="Publish post"]"#
    }

    fn scroll_ancestor_depth(&self) -> usize {
        self.scroll_depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::memory::MemoryPage;
    use scraper::Selector;

    #[test]
    fn every_source_selector_parses() {
        let loc = TwitterLocators;
        for selector in [
            loc.post_article(),
            loc.post_text(),
            loc.post_images(),
            loc.text_links(),
            loc.status_link(),
            loc.author_link(),
            loc.thread_cell(),
            loc.account_switcher(),
            loc.username_label(),
            loc.action_bar(),
        ] {
            assert!(Selector::parse(selector).is_ok(), "{selector}");
        }
    }

    #[test]
    fn every_target_selector_parses() {
        let loc = BlueskyLocators::default();
        for selector in [loc.editor(), loc.add_post_control(), loc.publish_control()] {
            assert!(Selector::parse(selector).is_ok(), "{selector}");
        }
    }

    #[tokio::test]
    async fn composer_open_control_is_the_last_focusable_button() {
        let page = MemoryPage::from_html(
            r#"<html><body>
                <nav><button tabindex="0">Home</button><button tabindex="0">Search</button></nav>
                <button tabindex="-1">Skip</button>
                <button tabindex="0" id="compose">New post</button>
            </body></html>"#,
            "https://bsky.app/",
        );
        let found = BlueskyLocators::default()
            .composer_open_control(&page)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(page.attribute(found, "id").await.unwrap().as_deref(), Some("compose"));
    }
}
