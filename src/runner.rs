use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::archive::{self, ArchiveStore, GateDecision};
use crate::config::Config;
use crate::digest::Digest;
use crate::feed::FeedSource;
use crate::notifier::{DeliveryResult, Notifier};

/// How a run ended. Maps one-to-one onto the process exit code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Delivered,
    DryRun { message: String },
    NothingToSend,
    Unchanged { period: String },
    FetchFailed { reason: String },
    DeliveryFailed(DeliveryResult),
}

impl Outcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Delivered
            | Outcome::DryRun { .. }
            | Outcome::NothingToSend
            | Outcome::Unchanged { .. } => 0,
            Outcome::FetchFailed { .. } | Outcome::DeliveryFailed(_) => 1,
        }
    }
}

/// Fetch, format, gate and deliver once.
pub async fn run(
    config: &Config,
    feed: &dyn FeedSource,
    notifier: &Notifier,
    archive_store: Option<&mut dyn ArchiveStore>,
    now: DateTime<Utc>,
) -> Outcome {
    let items = match feed.fetch(&config.feed.url, config.feed.limit).await {
        Ok(items) => items,
        Err(e) => {
            error!("{e}");
            return Outcome::FetchFailed {
                reason: e.to_string(),
            };
        }
    };

    let digest = match Digest::from_items(&config.message.heading, &items, config.timezone) {
        Some(d) => d,
        None => {
            warn!(url = %config.feed.url, "feed has no entries, nothing to send");
            return Outcome::NothingToSend;
        }
    };

    if config.dry_run {
        return Outcome::DryRun {
            message: digest.body,
        };
    }

    let period = archive::period_key(now, config.timezone);
    if let Some(store) = archive_store.as_deref() {
        if !config.force {
            match archive::check(store, &period, &digest.body) {
                Ok(GateDecision::Unchanged { fingerprint }) => {
                    info!(%period, %fingerprint, "digest unchanged since last delivery, skipping");
                    return Outcome::Unchanged { period };
                }
                Ok(GateDecision::Updated {
                    fingerprint,
                    previous,
                }) => {
                    info!(%period, %fingerprint, ?previous, "digest changed, delivering");
                }
                // An archive failure does not block delivery.
                Err(e) => error!(%period, "archive check failed: {e}"),
            }
        }
    }

    match notifier.deliver(&digest.body, &config.credential).await {
        DeliveryResult::Delivered => {
            // Only delivered content is recorded.
            if let Some(store) = archive_store {
                match store.store(&period, &digest.body) {
                    Ok(()) => info!(%period, "digest archived"),
                    Err(e) => error!(%period, "failed to archive digest: {e}"),
                }
            }
            Outcome::Delivered
        }
        other => Outcome::DeliveryFailed(other),
    }
}
