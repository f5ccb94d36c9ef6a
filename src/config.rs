use chrono_tz::Tz;
use clap::{Parser, ValueEnum};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{PusherError, Result};
use crate::signing;

/// DingTalk caps robot message bodies; longer text is cut to this many characters.
pub const DEFAULT_MAX_MESSAGE_CHARS: usize = 3000;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_FEED_URL: &str = "https://www.bbc.com/news/rss.xml";
pub const DEFAULT_HEADING: &str = "📰 今日BBC英语新闻:";

/// Webhook base URL plus the robot's signing secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    webhook_url: String,
    secret: String,
}

impl Credential {
    pub fn new(webhook_url: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            webhook_url: webhook_url.into(),
            secret: secret.into(),
        }
    }

    pub fn webhook_url(&self) -> &str {
        &self.webhook_url
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Check the preconditions for delivery without touching the network.
    pub fn validate(&self) -> Result<()> {
        if self.webhook_url.trim().is_empty() {
            return Err(PusherError::ConfigurationMissing("webhook URL"));
        }
        if self.secret.is_empty() {
            return Err(PusherError::ConfigurationMissing("webhook secret"));
        }
        signing::parse_webhook_url(&self.webhook_url)?;
        Ok(())
    }

    /// Host part of the webhook URL, safe to log.
    pub fn host(&self) -> String {
        signing::parse_webhook_url(&self.webhook_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| "<invalid>".into())
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("webhook_host", &self.host())
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MsgType {
    Markdown,
    Text,
}

impl MsgType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MsgType::Markdown => "markdown",
            MsgType::Text => "text",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub url: String,
    pub limit: usize,
}

#[derive(Debug, Clone)]
pub struct MessageConfig {
    pub msg_type: MsgType,
    pub title: String,
    pub heading: String,
    pub max_chars: usize,
}

impl Default for MessageConfig {
    fn default() -> Self {
        Self {
            msg_type: MsgType::Markdown,
            title: "BBC News".into(),
            heading: DEFAULT_HEADING.into(),
            max_chars: DEFAULT_MAX_MESSAGE_CHARS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    pub dir: PathBuf,
}

/// Everything a run needs, resolved once at startup and passed down explicitly.
#[derive(Debug, Clone)]
pub struct Config {
    pub credential: Credential,
    pub feed: FeedConfig,
    pub message: MessageConfig,
    pub archive: Option<ArchiveConfig>,
    pub timezone: Tz,
    pub timeout: Duration,
    pub force: bool,
    pub dry_run: bool,
}

/// Fetch a news feed and push a digest to a DingTalk group robot.
#[derive(Debug, Parser)]
#[command(name = "news-pusher", version, about, long_about = None)]
pub struct Cli {
    /// DingTalk robot webhook URL (including access_token)
    #[arg(long, env = "DINGTALK_WEBHOOK", hide_env_values = true)]
    pub webhook: Option<String>,

    /// DingTalk robot signing secret
    #[arg(long, env = "DINGTALK_SECRET", hide_env_values = true)]
    pub secret: Option<String>,

    /// RSS or Atom feed to read
    #[arg(long, env = "NEWS_FEED_URL", default_value = DEFAULT_FEED_URL)]
    pub feed_url: String,

    /// Number of newest entries to include
    #[arg(long, env = "NEWS_LIMIT", default_value_t = 5)]
    pub limit: usize,

    /// Message type sent to the robot
    #[arg(long, env = "DINGTALK_MSG_TYPE", value_enum, default_value_t = MsgType::Markdown)]
    pub msg_type: MsgType,

    /// Title shown in the DingTalk conversation list (markdown only)
    #[arg(long, env = "DINGTALK_TITLE", default_value = "BBC News")]
    pub title: String,

    /// First line of the digest body
    #[arg(long, env = "NEWS_HEADING", default_value = DEFAULT_HEADING)]
    pub heading: String,

    /// Maximum message length in characters
    #[arg(long, env = "DINGTALK_MAX_LENGTH", default_value_t = DEFAULT_MAX_MESSAGE_CHARS)]
    pub max_length: usize,

    /// Directory holding one archived digest per day; enables the unchanged-content check
    #[arg(long, env = "NEWS_ARCHIVE_DIR")]
    pub archive_dir: Option<PathBuf>,

    /// IANA timezone used for the archive date and publication times
    #[arg(long, env = "NEWS_TIMEZONE", default_value = "Asia/Shanghai")]
    pub timezone: String,

    /// HTTP timeout in seconds for both the feed fetch and the delivery
    #[arg(long, env = "NEWS_HTTP_TIMEOUT", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    /// Deliver even if today's archived digest is identical
    #[arg(long)]
    pub force: bool,

    /// Print the message instead of delivering it
    #[arg(long)]
    pub dry_run: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "NEWS_PUSHER_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let webhook = cli
            .webhook
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or(PusherError::ConfigurationMissing("DINGTALK_WEBHOOK"))?;
        let secret = cli
            .secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(PusherError::ConfigurationMissing("DINGTALK_SECRET"))?;

        let credential = Credential::new(webhook, secret);
        credential.validate()?;

        if cli.limit == 0 {
            return Err(PusherError::InvalidConfiguration(
                "limit must be at least 1".into(),
            ));
        }
        if cli.max_length == 0 {
            return Err(PusherError::InvalidConfiguration(
                "max length must be at least 1".into(),
            ));
        }

        let timezone: Tz = cli.timezone.parse().map_err(|e| {
            PusherError::InvalidConfiguration(format!("unknown timezone {}: {e}", cli.timezone))
        })?;

        Ok(Self {
            credential,
            feed: FeedConfig {
                url: cli.feed_url.clone(),
                limit: cli.limit,
            },
            message: MessageConfig {
                msg_type: cli.msg_type,
                title: cli.title.clone(),
                heading: cli.heading.clone(),
                max_chars: cli.max_length,
            },
            archive: cli.archive_dir.clone().map(|dir| ArchiveConfig { dir }),
            timezone,
            timeout: Duration::from_secs(cli.timeout_secs),
            force: cli.force,
            dry_run: cli.dry_run,
        })
    }
}
