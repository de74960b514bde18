use nostr_sdk::prelude::*;

use crate::nchan::channels::ChannelSnapshot;

/// Work items for the nchan event processing loop
#[derive(Debug)]
pub enum ProcessableEvent {
    /// A Nostr event delivered by a live subscription
    NostrEvent {
        event: Event,
        subscription_id: Option<String>,
    },
    /// Events fetched by a periodic resync, to be merged into the store
    Resync(Box<ChannelSnapshot>),
    /// A relay message for logging/monitoring purposes
    RelayMessage(RelayUrl, String),
}

impl ProcessableEvent {
    pub fn new_nostr_event(event: Event, subscription_id: Option<String>) -> Self {
        Self::NostrEvent {
            event,
            subscription_id,
        }
    }
}
