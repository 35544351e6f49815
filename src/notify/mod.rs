//! Alert notification.
//!
//! Defines the `Notifier` trait the controller dispatches each cycle's
//! batched alert text through, and the Discord webhook implementation.

pub mod discord;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::Delivery;

/// A channel that accepts one text message at a time.
///
/// A rejected message is reported through `Delivery`, not as an error;
/// `Err` is reserved for failures to even attempt the send.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str) -> Result<Delivery>;
}
