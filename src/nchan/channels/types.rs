use std::cmp::Ordering;

use nostr_sdk::prelude::*;
use serde::{Deserialize, Serialize};

/// Maximum number of messages retained (and published) per channel
pub const MAX_RECENT_MESSAGES: usize = 3;

/// Content of a kind 40 channel creation or kind 41 channel metadata event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMetadata {
    /// Display name of the channel. Missing names decode as an empty string.
    #[serde(default)]
    pub name: String,
}

/// A message posted to a channel, as kept in the channel list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelMessage {
    /// Id of the kind 42 event; used for de-duplication only
    #[serde(skip)]
    pub id: EventId,

    /// Raw message content
    pub content: String,

    /// Public key of the message author
    pub author: PublicKey,

    /// Timestamp of the message event
    pub created_at: Timestamp,
}

impl ChannelMessage {
    /// Orders messages newest first; equal timestamps fall back to the event id
    pub(crate) fn newest_first(a: &Self, b: &Self) -> Ordering {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    }
}

/// Aggregated state of a single channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelAggregate {
    pub(crate) id: EventId,
    pub(crate) author: PublicKey,
    pub(crate) name: String,
    pub(crate) created_at: Timestamp,
    pub(crate) latest_update: Timestamp,
    pub(crate) recent_messages: Vec<ChannelMessage>,
    /// Timestamp of the rename that set the current name
    pub(crate) renamed_at: Option<Timestamp>,
}

impl ChannelAggregate {
    pub(crate) fn new(
        id: EventId,
        author: PublicKey,
        metadata: ChannelMetadata,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            author,
            name: metadata.name,
            created_at,
            latest_update: created_at,
            recent_messages: Vec::with_capacity(MAX_RECENT_MESSAGES + 1),
            renamed_at: None,
        }
    }

    /// The channel id (id of the creation event)
    pub fn id(&self) -> EventId {
        self.id
    }

    /// The channel creator
    pub fn author(&self) -> PublicKey {
        self.author
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Most recent activity: creation, accepted rename or retained message
    pub fn latest_update(&self) -> Timestamp {
        self.latest_update
    }

    /// Retained messages, newest first
    pub fn recent_messages(&self) -> &[ChannelMessage] {
        &self.recent_messages
    }

    /// Applies an owner rename. `latest_update` never moves backwards.
    ///
    /// Returns `false` when neither the name nor `latest_update` changed, e.g.
    /// the same rename delivered by several relays.
    pub(crate) fn rename(&mut self, metadata: ChannelMetadata, renamed_at: Timestamp) -> bool {
        let previous_update = self.latest_update;
        let renamed = self.name != metadata.name;

        self.name = metadata.name;
        self.renamed_at = Some(renamed_at);
        self.latest_update = self.latest_update.max(renamed_at);

        renamed || self.latest_update != previous_update
    }

    /// Folds a rebuilt copy of this channel into the live one.
    ///
    /// Messages go through [`Self::push_message`], the rebuilt name is taken
    /// only if its rename is newer than the one applied here, and
    /// `latest_update` keeps the later of the two.
    pub(crate) fn merge(&mut self, rebuilt: ChannelAggregate) {
        if rebuilt.renamed_at > self.renamed_at {
            self.name = rebuilt.name;
            self.renamed_at = rebuilt.renamed_at;
        }
        for message in rebuilt.recent_messages {
            self.push_message(message);
        }
        self.latest_update = self.latest_update.max(rebuilt.latest_update);
    }

    /// Inserts a message and keeps only the newest [`MAX_RECENT_MESSAGES`].
    ///
    /// Returns `false` when the aggregate did not change, i.e. the message was
    /// already retained or is older than every retained message.
    pub(crate) fn push_message(&mut self, message: ChannelMessage) -> bool {
        if self.recent_messages.iter().any(|m| m.id == message.id) {
            return false;
        }

        let message_id = message.id;
        let created_at = message.created_at;
        self.recent_messages.push(message);
        self.recent_messages.sort_by(ChannelMessage::newest_first);
        self.recent_messages.truncate(MAX_RECENT_MESSAGES);

        if !self.recent_messages.iter().any(|m| m.id == message_id) {
            return false;
        }

        self.latest_update = self.latest_update.max(created_at);
        true
    }
}

/// One entry of the published channel list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelSummary {
    pub id: EventId,
    pub author: PublicKey,
    pub latest_update: Timestamp,
    pub name: String,
    pub events: Vec<ChannelMessage>,
}

impl From<&ChannelAggregate> for ChannelSummary {
    fn from(channel: &ChannelAggregate) -> Self {
        Self {
            id: channel.id,
            author: channel.author,
            latest_update: channel.latest_update,
            name: channel.name.clone(),
            events: channel.recent_messages.clone(),
        }
    }
}
