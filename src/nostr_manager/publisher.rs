//! Signing and publishing of the events nchan produces.

use async_trait::async_trait;
use nostr_sdk::prelude::*;

use crate::nchan::channel_publisher::{ChannelPublisher, PublishError};
use crate::nchan::channels::ChannelSummary;
use crate::nostr_manager::{NostrManager, Result};

impl NostrManager {
    /// Builds the signed kind 30078 channel list document
    pub(crate) fn build_channel_list(
        &self,
        channels: &[ChannelSummary],
        identifier: &str,
    ) -> Result<Event> {
        let content = serde_json::to_string(channels)?;
        let event = EventBuilder::new(Kind::ApplicationSpecificData, content)
            .tag(Tag::identifier(identifier))
            .sign_with_keys(self.keys())?;
        Ok(event)
    }

    /// Builds a signed text note. Replies tag the target event and its author
    /// and are stamped one second after the target.
    pub(crate) fn build_note(&self, content: &str, reply_to: Option<&Event>) -> Result<Event> {
        let builder = match reply_to {
            Some(target) => EventBuilder::text_note(content)
                .tags([Tag::event(target.id), Tag::public_key(target.pubkey)])
                .custom_created_at(target.created_at + 1u64),
            None => EventBuilder::text_note(content),
        };
        Ok(builder.sign_with_keys(self.keys())?)
    }

    /// Publishes an event to all relays in a background task.
    ///
    /// This is a fire-and-forget operation: failures are logged and never retried.
    pub(crate) fn background_publish_event(&self, event: Event) {
        let client = self.client.clone();

        tokio::spawn(async move {
            match client.send_event(&event).await {
                Ok(output) => {
                    tracing::debug!(
                        target: "nchan::nostr_manager::background_publish_event",
                        "Published event {} (kind {}) to {} relay(s), {} failed",
                        event.id,
                        event.kind.as_u16(),
                        output.success.len(),
                        output.failed.len()
                    );
                }
                Err(e) => {
                    tracing::error!(
                        target: "nchan::nostr_manager::background_publish_event",
                        "Failed to publish event {} in background task: {}",
                        event.id,
                        e
                    );
                }
            }
        });
    }
}

#[async_trait]
impl ChannelPublisher for NostrManager {
    async fn publish_channel_list(
        &self,
        channels: &[ChannelSummary],
    ) -> std::result::Result<(), PublishError> {
        let event = self.build_channel_list(channels, self.list_identifier())?;
        tracing::debug!(
            target: "nchan::nostr_manager::publish_channel_list",
            "Publishing channel list with {} channels",
            channels.len()
        );
        self.background_publish_event(event);
        Ok(())
    }

    async fn publish_note(
        &self,
        content: &str,
        reply_to: Option<&Event>,
    ) -> std::result::Result<(), PublishError> {
        let event = self.build_note(content, reply_to)?;
        self.background_publish_event(event);
        Ok(())
    }
}
