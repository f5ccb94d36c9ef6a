//! Fetch a news feed and push a signed digest to a DingTalk group robot.

pub mod archive;
pub mod config;
pub mod digest;
pub mod error;
pub mod feed;
pub mod notifier;
pub mod runner;
pub mod signing;

#[cfg(test)]
mod testing;

pub use config::{Config, Credential};
pub use error::{PusherError, Result};
pub use notifier::{DeliveryResult, Notifier};
pub use runner::Outcome;
