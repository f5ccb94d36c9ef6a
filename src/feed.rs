//! RSS / Atom feed fetching.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{PusherError, Result};

const USER_AGENT: &str = concat!("news-pusher/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsItem {
    pub title: String,
    pub link: String,
    pub published: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self, url: &str, limit: usize) -> Result<Vec<NewsItem>>;
}

pub struct FeedClient {
    client: reqwest::Client,
}

impl FeedClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FeedSource for FeedClient {
    /// Fetch `url` and return at most `limit` entries in feed order.
    async fn fetch(&self, url: &str, limit: usize) -> Result<Vec<NewsItem>> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PusherError::Fetch(format!("request to {url} failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(PusherError::Fetch(format!(
                "{url} returned {}",
                resp.status()
            )));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| PusherError::Fetch(format!("reading {url} failed: {e}")))?;
        debug!(url, bytes = bytes.len(), "feed downloaded");

        let items = parse(&bytes, limit)?;
        info!(url, count = items.len(), "feed parsed");
        Ok(items)
    }
}

/// Parse an RSS 2.0 or Atom document.
pub fn parse(content: &[u8], limit: usize) -> Result<Vec<NewsItem>> {
    let feed = feed_rs::parser::parse(content).map_err(|e| PusherError::FeedParse(e.to_string()))?;

    let items = feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let link = entry.links.first().map(|l| l.href.trim().to_string())?;
            if link.is_empty() {
                return None;
            }
            let title = entry
                .title
                .map(|t| t.content.trim().to_string())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "(untitled)".into());
            Some(NewsItem {
                title,
                link,
                published: entry.published.or(entry.updated),
            })
        })
        .take(limit)
        .collect();

    Ok(items)
}
