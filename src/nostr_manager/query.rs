//! Historical queries against the configured relays.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use nostr_sdk::prelude::*;

use crate::nchan::event_source::{ChannelFilter, EventSource, SourceError, merge_unique};
use crate::nostr_manager::{NostrManager, Result, subscriptions::CHANNELS_SUBSCRIPTION_ID};

/// Filters of one query that are in flight at the same time
const MAX_CONCURRENT_FETCHES: usize = 5;

impl NostrManager {
    /// Fetches the events matching a single filter from all relays
    pub(crate) async fn fetch_filter(&self, filter: &ChannelFilter) -> Result<Vec<Event>> {
        let events = self
            .client
            .fetch_events(filter.to_filter(), self.timeout())
            .await?;
        Ok(filter.select(events))
    }
}

#[async_trait]
impl EventSource for NostrManager {
    async fn query(&self, filters: Vec<ChannelFilter>) -> std::result::Result<Vec<Event>, SourceError> {
        let filter_count = filters.len();
        let results: Vec<Result<Vec<Event>>> = stream::iter(filters)
            .map(|filter| async move { self.fetch_filter(&filter).await })
            .buffered(MAX_CONCURRENT_FETCHES)
            .collect()
            .await;

        let results = results.into_iter().collect::<Result<Vec<_>>>()?;
        let events = merge_unique(results);

        tracing::debug!(
            target: "nchan::nostr_manager::query",
            "Fetched {} events for {} filters",
            events.len(),
            filter_count
        );

        Ok(events)
    }

    async fn subscribe(&self, filter: ChannelFilter) -> std::result::Result<(), SourceError> {
        self.subscribe_with_id(CHANNELS_SUBSCRIPTION_ID, &filter).await?;
        Ok(())
    }
}
