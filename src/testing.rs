//! Test doubles shared by the unit tests.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use url::Url;

use crate::archive::ArchiveStore;
use crate::error::{PusherError, Result};
use crate::feed::{FeedSource, NewsItem};
use crate::notifier::{Transport, TransportResponse};

/// Records every request and replies with a canned response.
pub struct FakeTransport {
    calls: AtomicUsize,
    requests: Mutex<Vec<(Url, Value)>>,
    reply: std::result::Result<TransportResponse, String>,
}

impl FakeTransport {
    pub fn replying(status: u16, body: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            reply: Ok(TransportResponse {
                status,
                body: body.to_string(),
            }),
        })
    }

    pub fn failing(reason: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            reply: Err(reason.to_string()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_body(&self) -> Value {
        self.requests.lock().unwrap().last().unwrap().1.clone()
    }

    pub fn last_url(&self) -> Url {
        self.requests.lock().unwrap().last().unwrap().0.clone()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn post_json(
        &self,
        url: &Url,
        body: &Value,
    ) -> std::result::Result<TransportResponse, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap()
            .push((url.clone(), body.clone()));
        self.reply.clone()
    }
}

/// Serves a fixed item list, or a fetch error when `items` is `None`.
pub struct StaticFeed {
    pub items: Option<Vec<NewsItem>>,
}

impl StaticFeed {
    pub fn with(items: Vec<NewsItem>) -> Self {
        Self { items: Some(items) }
    }

    pub fn broken() -> Self {
        Self { items: None }
    }
}

#[async_trait]
impl FeedSource for StaticFeed {
    async fn fetch(&self, url: &str, limit: usize) -> Result<Vec<NewsItem>> {
        match &self.items {
            Some(items) => Ok(items.iter().take(limit).cloned().collect()),
            None => Err(PusherError::Fetch(format!("{url} returned 503 Service Unavailable"))),
        }
    }
}

/// Archive whose reads or writes fail with an I/O-style error.
pub struct FailingArchive {
    fail_load: bool,
    fail_store: bool,
    stored: usize,
}

impl FailingArchive {
    pub fn on_load() -> Self {
        Self {
            fail_load: true,
            fail_store: false,
            stored: 0,
        }
    }

    pub fn on_store() -> Self {
        Self {
            fail_load: false,
            fail_store: true,
            stored: 0,
        }
    }

    /// Number of `store` calls, successful or not.
    pub fn stored(&self) -> usize {
        self.stored
    }
}

impl ArchiveStore for FailingArchive {
    fn load(&self, _key: &str) -> Result<Option<String>> {
        if self.fail_load {
            return Err(PusherError::Archive("failed to read archive: permission denied".into()));
        }
        Ok(None)
    }

    fn store(&mut self, _key: &str, _content: &str) -> Result<()> {
        self.stored += 1;
        if self.fail_store {
            return Err(PusherError::Archive("failed to write archive: disk full".into()));
        }
        Ok(())
    }
}
