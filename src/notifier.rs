//! DingTalk robot delivery.
//!
//! Every call signs a fresh URL, sends exactly one POST and reports the
//! outcome as a [`DeliveryResult`]. Nothing is retried here; callers decide.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use url::Url;

use crate::config::{Credential, MessageConfig, MsgType};
use crate::error::Result;
use crate::signing::SignedRequest;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "msgtype", rename_all = "lowercase")]
pub enum RobotMessage {
    Markdown { markdown: MarkdownBody },
    Text { text: TextBody },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarkdownBody {
    pub title: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextBody {
    pub content: String,
}

impl RobotMessage {
    pub fn new(msg_type: MsgType, title: &str, text: &str) -> Self {
        match msg_type {
            MsgType::Markdown => RobotMessage::Markdown {
                markdown: MarkdownBody {
                    title: title.to_string(),
                    text: text.to_string(),
                },
            },
            MsgType::Text => RobotMessage::Text {
                text: TextBody {
                    content: text.to_string(),
                },
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct RobotResponse {
    errcode: i64,
    #[serde(default)]
    errmsg: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryResult {
    Delivered,
    RejectedByService { errcode: i64, errmsg: String },
    TransportFailure { reason: String },
    MisconfiguredCredential { reason: String },
}

impl DeliveryResult {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryResult::Delivered)
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// One outbound JSON POST. Errors are transport-level failures
/// (timeout, connection refused, TLS).
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_json(
        &self,
        url: &Url,
        body: &Value,
    ) -> std::result::Result<TransportResponse, String>;
}

pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("news-pusher/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn post_json(
        &self,
        url: &Url,
        body: &Value,
    ) -> std::result::Result<TransportResponse, String> {
        let resp = self
            .client
            .post(url.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    "request timed out".to_string()
                } else {
                    // Strip the URL: it carries the access token and signature.
                    format!("request failed: {}", e.without_url())
                }
            })?;

        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| format!("failed to read response body: {}", e.without_url()))?;
        Ok(TransportResponse { status, body })
    }
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

pub struct Notifier {
    transport: Arc<dyn Transport>,
    message: MessageConfig,
}

impl Notifier {
    pub fn new(transport: Arc<dyn Transport>, message: MessageConfig) -> Self {
        Self { transport, message }
    }

    /// Sign, truncate and POST `payload` to the robot behind `credential`.
    pub async fn deliver(&self, payload: &str, credential: &Credential) -> DeliveryResult {
        if let Err(e) = credential.validate() {
            error!("refusing to deliver: {e}");
            return DeliveryResult::MisconfiguredCredential {
                reason: e.to_string(),
            };
        }

        let signed = match SignedRequest::now(credential) {
            Ok(s) => s,
            Err(e) => {
                error!("refusing to deliver: {e}");
                return DeliveryResult::MisconfiguredCredential {
                    reason: e.to_string(),
                };
            }
        };

        let text = truncate_chars(payload, self.message.max_chars);
        if text.len() < payload.len() {
            warn!(
                max_chars = self.message.max_chars,
                "message truncated to the robot's length limit"
            );
        }

        let message = RobotMessage::new(self.message.msg_type, &self.message.title, text);
        let body = match serde_json::to_value(&message) {
            Ok(v) => v,
            Err(e) => {
                return DeliveryResult::TransportFailure {
                    reason: format!("failed to serialize message: {e}"),
                }
            }
        };

        let host = credential.host();
        let resp = match self.transport.post_json(&signed.url, &body).await {
            Ok(r) => r,
            Err(reason) => {
                warn!(%host, "delivery failed: {reason}");
                return DeliveryResult::TransportFailure { reason };
            }
        };

        if !(200..300).contains(&resp.status) {
            warn!(%host, status = resp.status, "delivery returned non-success status");
            return DeliveryResult::TransportFailure {
                reason: format!("HTTP {}: {}", resp.status, resp.body.trim()),
            };
        }

        let parsed: RobotResponse = match serde_json::from_str(&resp.body) {
            Ok(p) => p,
            Err(e) => {
                warn!(%host, "unparseable robot response: {e}");
                return DeliveryResult::TransportFailure {
                    reason: format!("unparseable response: {e}"),
                };
            }
        };

        if parsed.errcode == 0 {
            info!(%host, msgtype = self.message.msg_type.as_str(), "message delivered");
            DeliveryResult::Delivered
        } else {
            warn!(
                %host,
                errcode = parsed.errcode,
                errmsg = %parsed.errmsg,
                "message rejected by robot"
            );
            DeliveryResult::RejectedByService {
                errcode: parsed.errcode,
                errmsg: parsed.errmsg,
            }
        }
    }
}

/// First `max` characters of `s` (Unicode scalar values, not bytes).
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
