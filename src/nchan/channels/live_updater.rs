//! Incremental, one event at a time updates of the channel store.

use super::events::{ChannelEvent, ChannelEventError};
use super::store::ChannelStore;
use super::types::ChannelAggregate;

/// What applying a single event did to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// A previously unknown channel was registered
    Created,
    /// The owner renamed a known channel
    Renamed,
    /// A message was retained by a known channel
    MessageAdded,
    /// The event was valid but changed nothing (duplicate creation, rename or
    /// message, message too old to be retained, unrelated kind)
    Unchanged,
}

impl UpdateOutcome {
    /// Whether the ranked list has to be recomputed and republished
    pub fn changed(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

/// Applies one decoded event to the store.
///
/// Errors leave the store untouched; they are isolated to the offending event.
pub fn apply_event(
    store: &mut ChannelStore,
    event: ChannelEvent,
) -> Result<UpdateOutcome, ChannelEventError> {
    match event {
        ChannelEvent::Creation {
            id,
            author,
            metadata,
            created_at,
        } => {
            let channel = ChannelAggregate::new(id, author, metadata, created_at);
            if store.upsert(channel) {
                Ok(UpdateOutcome::Created)
            } else {
                Ok(UpdateOutcome::Unchanged)
            }
        }
        ChannelEvent::MetadataUpdate {
            event_id,
            channel_id,
            author,
            metadata,
            created_at,
        } => {
            let channel = store
                .get_mut(&channel_id)
                .ok_or(ChannelEventError::Resolution {
                    event_id,
                    channel_id: Some(channel_id),
                })?;
            if channel.author != author {
                return Err(ChannelEventError::OwnershipViolation {
                    event_id,
                    channel_id,
                    author,
                });
            }
            if channel.rename(metadata, created_at) {
                Ok(UpdateOutcome::Renamed)
            } else {
                Ok(UpdateOutcome::Unchanged)
            }
        }
        ChannelEvent::MessagePost {
            channel_id,
            message,
        } => {
            let event_id = message.id;
            let channel = store
                .get_mut(&channel_id)
                .ok_or(ChannelEventError::Resolution {
                    event_id,
                    channel_id: Some(channel_id),
                })?;
            if channel.push_message(message) {
                Ok(UpdateOutcome::MessageAdded)
            } else {
                Ok(UpdateOutcome::Unchanged)
            }
        }
        ChannelEvent::Other(_) => Ok(UpdateOutcome::Unchanged),
    }
}
