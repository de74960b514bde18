use async_trait::async_trait;
use nostr_sdk::prelude::*;

use crate::nchan::channels::ChannelSummary;

pub type PublishError = Box<dyn std::error::Error + Send + Sync>;

/// Serializes, signs and transmits what the aggregator produces.
///
/// Implementations own transmission failures: they log them and never retry.
/// The aggregator only logs the errors returned here (signing, serialization).
#[async_trait]
pub trait ChannelPublisher: Send + Sync {
    /// Overwrites the replaceable channel list document with `channels`
    async fn publish_channel_list(&self, channels: &[ChannelSummary]) -> Result<(), PublishError>;

    /// Publishes a plain text note, optionally as a reply to `reply_to`
    async fn publish_note(&self, content: &str, reply_to: Option<&Event>)
    -> Result<(), PublishError>;
}
