// Link rewriting and editor paragraph rendering.
//
// The source page shows long URLs truncated ("example.com/some/pa…"). Before
// text goes into the target editor, each truncated display string is swapped
// back for its full URL. Longer display strings are replaced first so a
// shorter one can't eat into a longer one that contains it.

use regex_lite::{NoExpand, Regex};
use tracing::warn;

use crate::model::Link;

/// Replace every occurrence of each link's display text with its URL.
///
/// Links are applied longest display text first (stable for equal lengths).
/// Not idempotent: if a URL itself contains another link's display text,
/// that later replacement rewrites inside the URL.
pub fn rewrite(text: &str, links: &[Link]) -> String {
    let mut ordered: Vec<&Link> = links.iter().collect();
    ordered.sort_by(|a, b| b.text.chars().count().cmp(&a.text.chars().count()));

    let mut out = text.to_string();
    for link in ordered {
        // an empty pattern would match between every character
        if link.text.is_empty() {
            continue;
        }
        let pattern = match Regex::new(&regex_lite::escape(&link.text)) {
            Ok(re) => re,
            Err(e) => {
                warn!(text = %link.text, error = %e, "Skipping link with unusable display text");
                continue;
            }
        };
        out = pattern.replace_all(&out, NoExpand(&link.url)).into_owned();
    }
    out
}

/// Render text as editor paragraphs: one `<p>` per line, and `<p><br></p>`
/// for blank lines so the line break survives.
pub fn paragraphs(text: &str) -> String {
    text.split('\n')
        .map(|line| {
            if line.trim().is_empty() {
                "<p><br></p>".to_string()
            } else {
                format!("<p>{line}</p>")
            }
        })
        .collect()
}
