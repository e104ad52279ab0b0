// Data models: the Post record and its pieces.
//
// The serialized shape is the one the pending queue has always stored
// (camelCase `tweetId`, ISO-8601 `timestamp`), so existing queue contents
// keep loading.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One authored item of content, plus the author's own follow-up posts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub text: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub tweet_id: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    /// Follow-up posts by the same author, in on-page order. Only ever one
    /// level deep: replies extracted here never carry replies of their own.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replies: Vec<Post>,
}

impl Post {
    /// Number of editors a thread publish of this post fills.
    pub fn editor_count(&self) -> usize {
        1 + self.replies.len()
    }

    /// True when the structural content matches, ignoring timestamps.
    pub fn same_content(&self, other: &Post) -> bool {
        self.text == other.text
            && self.images == other.images
            && self.links == other.links
            && self.tweet_id == other.tweet_id
            && self.replies.len() == other.replies.len()
            && self
                .replies
                .iter()
                .zip(&other.replies)
                .all(|(a, b)| a.same_content(b))
    }
}

/// A link as displayed in the post text.
///
/// `text` is the (possibly truncated) display string that appears inside
/// `Post::text`; `url` is that text with the ellipsis stripped. The source
/// platform renders full URLs as anchor text, so no href resolution happens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub url: String,
    pub text: String,
}

/// Target-platform account credentials.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"****")
            .finish()
    }
}

/// User settings consulted by the automation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Gates whether automation runs at all.
    pub is_enabled: bool,
    /// Required before any sync action.
    pub target_credentials: Option<Credentials>,
    /// Persisted alongside; the automation reads the username from the page.
    pub source_username: String,
}
