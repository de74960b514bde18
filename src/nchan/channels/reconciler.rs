//! Bulk rebuild of the channel store from historical relay queries.
//!
//! The rebuild is split in two halves: [`fetch_snapshot`] performs all the
//! network round-trips and touches no state, [`rebuild`] is a pure function of
//! the fetched events. Only the latter runs inside the event processing task,
//! so a resync is never interleaved with a live update.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use nostr_sdk::prelude::*;

use super::events::{ChannelEvent, log_dropped_event};
use super::live_updater::apply_event;
use super::store::ChannelStore;
use super::types::MAX_RECENT_MESSAGES;
use crate::nchan::event_source::{ChannelFilter, EventSource, SourceError, merge_unique};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// How many of the most recent channel creations are fetched
    pub creation_limit: usize,
    /// Maximum number of channel ids (one filter each) per relay query
    pub batch_size: usize,
    /// Messages fetched per channel
    pub messages_per_channel: usize,
    /// Whether owner renames (kind 41) are fetched
    pub fetch_metadata: bool,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            creation_limit: 1000,
            batch_size: 20,
            messages_per_channel: MAX_RECENT_MESSAGES,
            fetch_metadata: true,
        }
    }
}

/// Raw events collected by one resync
#[derive(Debug, Clone, Default)]
pub struct ChannelSnapshot {
    pub creations: Vec<Event>,
    pub metadata_updates: Vec<Event>,
    pub messages: Vec<Event>,
}

impl ChannelSnapshot {
    pub fn len(&self) -> usize {
        self.creations.len() + self.metadata_updates.len() + self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Fetches everything a rebuild needs.
///
/// Any failed query aborts the whole fetch, so a partial snapshot never
/// replaces good state.
pub async fn fetch_snapshot(
    source: &dyn EventSource,
    config: &ReconcilerConfig,
) -> Result<ChannelSnapshot, SourceError> {
    let creations = source
        .query(vec![
            ChannelFilter::new()
                .kind(Kind::ChannelCreation)
                .limit(config.creation_limit),
        ])
        .await?;

    // Sorted by id so batches are the same from one run to the next
    let channels: Vec<(EventId, PublicKey)> = creations
        .iter()
        .map(|event| (event.id, event.pubkey))
        .collect::<BTreeMap<_, _>>()
        .into_iter()
        .collect();

    tracing::debug!(
        target: "nchan::channels::reconciler::fetch_snapshot",
        "Fetched {} channel creations",
        channels.len()
    );

    let metadata_updates = if config.fetch_metadata {
        fetch_batched(source, &channels, config.batch_size, |(id, author)| {
            ChannelFilter::new()
                .kind(Kind::ChannelMetadata)
                .channel(*id)
                .author(*author)
                .limit(1)
        })
        .await?
    } else {
        Vec::new()
    };

    let messages = fetch_batched(source, &channels, config.batch_size, |(id, _)| {
        ChannelFilter::new()
            .kind(Kind::ChannelMessage)
            .channel(*id)
            .limit(config.messages_per_channel)
    })
    .await?;

    tracing::debug!(
        target: "nchan::channels::reconciler::fetch_snapshot",
        "Fetched {} channel renames and {} channel messages",
        metadata_updates.len(),
        messages.len()
    );

    Ok(ChannelSnapshot {
        creations,
        metadata_updates,
        messages,
    })
}

async fn fetch_batched<F>(
    source: &dyn EventSource,
    channels: &[(EventId, PublicKey)],
    batch_size: usize,
    filter_for: F,
) -> Result<Vec<Event>, SourceError>
where
    F: Fn(&(EventId, PublicKey)) -> ChannelFilter + Send + Sync,
{
    let mut results = Vec::with_capacity(channels.len().div_ceil(batch_size.max(1)));
    for batch in channels.chunks(batch_size.max(1)) {
        let filters: Vec<ChannelFilter> = batch.iter().map(&filter_for).collect();
        results.push(source.query(filters).await?);
    }
    Ok(merge_unique(results))
}

/// Builds a fresh store from a snapshot.
///
/// Creations go first, then renames oldest to newest (so the newest owner
/// rename wins), then messages. Events go through the same rules as live
/// updates; the result does not depend on the order of the snapshot vectors.
pub fn rebuild(snapshot: &ChannelSnapshot) -> ChannelStore {
    let mut store = ChannelStore::new();

    for event in decode(&snapshot.creations) {
        if let ChannelEvent::Creation { .. } = event {
            apply(&mut store, event);
        }
    }

    let mut renames: Vec<((Timestamp, Reverse<EventId>), ChannelEvent)> =
        decode(&snapshot.metadata_updates)
            .filter_map(|event| {
                let key = match &event {
                    ChannelEvent::MetadataUpdate {
                        event_id,
                        created_at,
                        ..
                    } => (*created_at, Reverse(*event_id)),
                    _ => return None,
                };
                Some((key, event))
            })
            .collect();
    renames.sort_by(|a, b| a.0.cmp(&b.0));
    for (_, rename) in renames {
        apply(&mut store, rename);
    }

    for event in decode(&snapshot.messages) {
        if let ChannelEvent::MessagePost { .. } = event {
            apply(&mut store, event);
        }
    }

    tracing::debug!(
        target: "nchan::channels::reconciler::rebuild",
        "Rebuilt {} channels from {} events",
        store.len(),
        snapshot.len()
    );

    store
}

fn decode(events: &[Event]) -> impl Iterator<Item = ChannelEvent> + '_ {
    events
        .iter()
        .filter_map(|event| match ChannelEvent::try_from(event) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                log_dropped_event(&e);
                None
            }
        })
}

fn apply(store: &mut ChannelStore, event: ChannelEvent) {
    if let Err(e) = apply_event(store, event) {
        log_dropped_event(&e);
    }
}
