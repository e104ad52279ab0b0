// Image fetching for the composer's drop target.
//
// Images are fetched concurrently and all-or-nothing: one failed fetch
// fails the whole publish, matching what a user would see if a drop
// silently lost an attachment.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use futures::future::try_join_all;
use tracing::debug;

use crate::error::PageResult;
use crate::page::Attachment;

/// Attached files are always labelled JPEG; the composer sniffs the bytes.
pub const ATTACHMENT_MIME: &str = "image/jpeg";

/// Source of image bytes. The HTTP implementation is the real one; tests
/// plug in canned bytes.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Fetch images over HTTP with reqwest.
pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("tweetsync/0.1 (post-migration)")
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Image request failed: {url}"))?;

        if !response.status().is_success() {
            anyhow::bail!("Image fetch returned {} for {}", response.status(), url);
        }

        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read image body: {url}"))?;
        Ok(bytes.to_vec())
    }
}

/// Fetch every image concurrently and wrap each as a named attachment.
/// Any failure fails the whole batch.
pub async fn fetch_all(fetcher: &dyn ImageFetcher, urls: &[String]) -> PageResult<Vec<Attachment>> {
    let stamp = Utc::now().timestamp_millis();
    let fetches = urls.iter().enumerate().map(|(i, url)| async move {
        let bytes = fetcher.fetch(url).await?;
        debug!(url = %url, bytes = bytes.len(), "Image fetched");
        Ok::<_, anyhow::Error>(Attachment {
            name: format!("image_{stamp}_{i}.jpg"),
            mime: ATTACHMENT_MIME.to_string(),
            bytes,
        })
    });
    Ok(try_join_all(fetches).await?)
}
