// TweetSync: migrate X/Twitter posts and threads into the Bluesky composer.
//
// This is the library root. The page-side automation (page, wait, extract,
// rewrite, publish) talks to the background side (background, db) only
// through the bridge.

pub mod background;
pub mod bridge;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod locator;
pub mod model;
pub mod notify;
pub mod output;
pub mod page;
pub mod publish;
pub mod rewrite;
pub mod status;
pub mod wait;

pub use error::{AutomationError, PageResult};
pub use model::{Link, Post, Settings};
