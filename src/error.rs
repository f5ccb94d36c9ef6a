use thiserror::Error;

/// Errors raised while preparing a delivery. Delivery itself reports its
/// outcome as a [`crate::notifier::DeliveryResult`] value.
#[derive(Error, Debug)]
pub enum PusherError {
    #[error("Missing required configuration: {0}")]
    ConfigurationMissing(&'static str),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Feed fetch failed: {0}")]
    Fetch(String),

    #[error("Feed parse error: {0}")]
    FeedParse(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, PusherError>;
