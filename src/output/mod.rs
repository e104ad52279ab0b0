// Output formatting: terminal display of the pending queue.

pub mod terminal;

use reqwest::Url;

use crate::model::Link;

/// Hosts belonging to the source platform. Links to them are not worth
/// listing next to a queued post.
const SOURCE_HOSTS: &[&str] = &["twitter.com", "x.com", "t.co"];

/// Truncate a string to at most `max_chars` characters, appending "..." if truncated.
///
/// Unlike byte slicing (`&text[..120]`), this respects UTF-8 character boundaries
/// and will never panic on multi-byte characters like emoji or accented letters.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    let char_count = text.chars().count();
    if char_count <= max_chars {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_chars).collect();
        format!("{truncated}...")
    }
}

/// How an external link is labelled in listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkLabel {
    /// Parsed fine; shown by hostname.
    Host(String),
    /// Unparseable; shown by its display text.
    Invalid(String),
}

/// Links pointing off the source platform, labelled for display.
pub fn external_links(links: &[Link]) -> Vec<LinkLabel> {
    links
        .iter()
        .filter(|link| !SOURCE_HOSTS.iter().any(|host| link.url.contains(host)))
        .map(|link| {
            let url = if link.url.starts_with("http") {
                link.url.clone()
            } else {
                format!("https://{}", link.url)
            };
            match Url::parse(&url).ok().and_then(|u| u.host_str().map(str::to_string)) {
                Some(host) => LinkLabel::Host(host),
                None => LinkLabel::Invalid(link.text.clone()),
            }
        })
        .collect()
}
