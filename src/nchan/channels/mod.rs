//! Channel Aggregation Module
//!
//! Merges NIP-28 channel creations (kind 40), renames (kind 41) and messages
//! (kind 42) into per-channel state and projects it into the ranked channel
//! list. State is built in bulk by the [`reconciler`], kept current by the
//! [`live_updater`] and published through a [`ChannelPublisher`] after every
//! change.

mod events;
mod live_updater;
mod ranker;
mod reconciler;
mod store;
mod types;

#[cfg(test)]
pub(crate) mod test_utils;

pub use events::{ChannelEvent, ChannelEventError};
pub use live_updater::{UpdateOutcome, apply_event};
pub use ranker::{DEFAULT_RANKED_LIMIT, rank};
pub use reconciler::{ChannelSnapshot, ReconcilerConfig, fetch_snapshot, rebuild};
pub use store::ChannelStore;
pub use types::{
    ChannelAggregate, ChannelMessage, ChannelMetadata, ChannelSummary, MAX_RECENT_MESSAGES,
};

use std::sync::Arc;

use nostr_sdk::prelude::*;

use crate::nchan::channel_publisher::ChannelPublisher;
use events::log_dropped_event;

/// Owns the channel store and republishes the ranked list after each change.
///
/// Not `Sync` by intent of use: a single task (the event processing loop)
/// owns the aggregator and is the only writer of the store.
pub struct ChannelAggregator {
    store: ChannelStore,
    publisher: Arc<dyn ChannelPublisher>,
    ranked_limit: usize,
}

impl ChannelAggregator {
    pub fn new(publisher: Arc<dyn ChannelPublisher>, ranked_limit: usize) -> Self {
        Self {
            store: ChannelStore::new(),
            publisher,
            ranked_limit,
        }
    }

    pub fn store(&self) -> &ChannelStore {
        &self.store
    }

    /// The current ranked channel list
    pub fn ranked(&self) -> Vec<ChannelSummary> {
        rank(&self.store, self.ranked_limit)
    }

    /// Decodes and applies one live event, republishing if anything changed.
    ///
    /// Dropped events are logged here; the error is returned for callers that
    /// want to count them.
    pub async fn handle_event(&mut self, event: &Event) -> Result<UpdateOutcome, ChannelEventError> {
        let result = ChannelEvent::try_from(event)
            .and_then(|decoded| apply_event(&mut self.store, decoded));

        match &result {
            Ok(outcome) if outcome.changed() => {
                tracing::debug!(
                    target: "nchan::channels::handle_event",
                    "Event {} (kind {}) applied: {:?}",
                    event.id,
                    event.kind.as_u16(),
                    outcome
                );
                self.publish().await;
            }
            Ok(_) => {}
            Err(e) => log_dropped_event(e),
        }

        result
    }

    /// Rebuilds from a resync snapshot, merges it into the store and republishes
    pub async fn apply_snapshot(&mut self, snapshot: &ChannelSnapshot) {
        let rebuilt = rebuild(snapshot);
        tracing::info!(
            target: "nchan::channels::apply_snapshot",
            "Resync rebuilt {} channels ({} known before)",
            rebuilt.len(),
            self.store.len()
        );
        self.store.absorb(rebuilt);
        self.publish().await;
    }

    /// Hands the current ranked list to the publisher
    pub async fn publish(&self) {
        let channels = self.ranked();
        if let Err(e) = self.publisher.publish_channel_list(&channels).await {
            tracing::error!(
                target: "nchan::channels::publish",
                "Failed to publish channel list: {}",
                e
            );
        }
    }
}
