//! Decoding of raw Nostr events into channel events.
//!
//! Every event entering the aggregator (bulk or live) is decoded exactly once
//! into a [`ChannelEvent`]; the rest of the engine only pattern matches on it.

use nostr_sdk::prelude::*;
use thiserror::Error;

use super::types::{ChannelMessage, ChannelMetadata};

const ROOT_MARKER: &str = "root";

/// Reasons a single channel event is dropped
#[derive(Error, Debug)]
pub enum ChannelEventError {
    #[error("Malformed content in event {event_id}: {source}")]
    Ingestion {
        event_id: EventId,
        #[source]
        source: serde_json::Error,
    },

    #[error("Event {event_id} does not reference a known channel")]
    Resolution {
        event_id: EventId,
        channel_id: Option<EventId>,
    },

    #[error("Event {event_id} from {author} is not allowed to update channel {channel_id}")]
    OwnershipViolation {
        event_id: EventId,
        channel_id: EventId,
        author: PublicKey,
    },
}

/// A raw event decoded by kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// Kind 40: a new channel whose id is the event id
    Creation {
        id: EventId,
        author: PublicKey,
        metadata: ChannelMetadata,
        created_at: Timestamp,
    },
    /// Kind 41: rename of an existing channel
    MetadataUpdate {
        event_id: EventId,
        channel_id: EventId,
        author: PublicKey,
        metadata: ChannelMetadata,
        created_at: Timestamp,
    },
    /// Kind 42: message posted to a channel
    MessagePost {
        channel_id: EventId,
        message: ChannelMessage,
    },
    /// Any other kind; ignored by the aggregator
    Other(Kind),
}

impl ChannelEvent {
    /// Id of the channel this event belongs to, if any
    pub fn channel_id(&self) -> Option<EventId> {
        match self {
            Self::Creation { id, .. } => Some(*id),
            Self::MetadataUpdate { channel_id, .. } | Self::MessagePost { channel_id, .. } => {
                Some(*channel_id)
            }
            Self::Other(_) => None,
        }
    }
}

impl TryFrom<&Event> for ChannelEvent {
    type Error = ChannelEventError;

    fn try_from(event: &Event) -> Result<Self, Self::Error> {
        match event.kind {
            Kind::ChannelCreation => Ok(Self::Creation {
                id: event.id,
                author: event.pubkey,
                metadata: parse_metadata(event)?,
                created_at: event.created_at,
            }),
            Kind::ChannelMetadata => {
                let channel_id = channel_reference(event)?;
                Ok(Self::MetadataUpdate {
                    event_id: event.id,
                    channel_id,
                    author: event.pubkey,
                    metadata: parse_metadata(event)?,
                    created_at: event.created_at,
                })
            }
            Kind::ChannelMessage => Ok(Self::MessagePost {
                channel_id: root_channel_reference(event)?,
                message: ChannelMessage {
                    id: event.id,
                    content: event.content.clone(),
                    author: event.pubkey,
                    created_at: event.created_at,
                },
            }),
            other => Ok(Self::Other(other)),
        }
    }
}

/// Logs a dropped event at a level matching how suspicious the drop is
pub(crate) fn log_dropped_event(err: &ChannelEventError) {
    match err {
        ChannelEventError::Ingestion { .. } => {
            tracing::error!(target: "nchan::channels::events", "Dropping event: {}", err);
        }
        ChannelEventError::Resolution { channel_id, .. } => {
            tracing::debug!(
                target: "nchan::channels::events",
                "Dropping event: {} (channel: {:?})",
                err,
                channel_id
            );
        }
        ChannelEventError::OwnershipViolation { .. } => {
            tracing::warn!(target: "nchan::channels::events", "Dropping event: {}", err);
        }
    }
}

fn parse_metadata(event: &Event) -> Result<ChannelMetadata, ChannelEventError> {
    serde_json::from_str(&event.content).map_err(|source| ChannelEventError::Ingestion {
        event_id: event.id,
        source,
    })
}

fn is_e_tag(tag: &Tag) -> bool {
    tag.kind() == TagKind::e()
}

fn tag_event_id(event: &Event, tag: Option<&Tag>) -> Result<EventId, ChannelEventError> {
    tag.and_then(|tag| tag.content())
        .and_then(|content| EventId::from_hex(content).ok())
        .ok_or(ChannelEventError::Resolution {
            event_id: event.id,
            channel_id: None,
        })
}

/// The first `e` tag of a kind 41 event names the channel being updated
pub(crate) fn channel_reference(event: &Event) -> Result<EventId, ChannelEventError> {
    tag_event_id(event, event.tags.iter().find(|tag| is_e_tag(tag)))
}

/// Kind 42 events point at their channel with an `e` tag carrying the `root` marker
pub(crate) fn root_channel_reference(event: &Event) -> Result<EventId, ChannelEventError> {
    let root = event.tags.iter().find(|tag| {
        is_e_tag(tag) && tag.as_slice().iter().skip(2).any(|value| value == ROOT_MARKER)
    });
    tag_event_id(event, root)
}
