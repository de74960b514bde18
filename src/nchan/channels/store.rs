use std::collections::HashMap;

use nostr_sdk::prelude::*;

use super::types::ChannelAggregate;

/// In-memory registry of channel aggregates keyed by channel id.
///
/// The store has no interior locking: it is owned by the single event
/// processing task, which is the only writer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelStore {
    channels: HashMap<EventId, ChannelAggregate>,
}

impl ChannelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &EventId) -> Option<&ChannelAggregate> {
        self.channels.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &EventId) -> Option<&mut ChannelAggregate> {
        self.channels.get_mut(id)
    }

    pub fn contains(&self, id: &EventId) -> bool {
        self.channels.contains_key(id)
    }

    /// Inserts a freshly created channel. The first creation wins: returns
    /// `false` and leaves the store untouched if the id is already known.
    pub(crate) fn upsert(&mut self, channel: ChannelAggregate) -> bool {
        if self.channels.contains_key(&channel.id) {
            return false;
        }
        self.channels.insert(channel.id, channel);
        true
    }

    pub fn all(&self) -> impl Iterator<Item = &ChannelAggregate> {
        self.channels.values()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Merges the result of a bulk rebuild into this store.
    ///
    /// A snapshot can be older than what the live feed already delivered, so
    /// rebuilt channels are merged into known ones rather than replacing them.
    /// Channels the rebuild did not see (e.g. older than the creation query
    /// window) are kept; channels only the rebuild saw are inserted.
    pub(crate) fn absorb(&mut self, rebuilt: ChannelStore) {
        for (id, channel) in rebuilt.channels {
            match self.channels.get_mut(&id) {
                Some(known) => known.merge(channel),
                None => {
                    self.channels.insert(id, channel);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nchan::channels::types::{ChannelMessage, ChannelMetadata};

    fn channel(keys: &Keys, name: &str, created_at: u64) -> ChannelAggregate {
        let event = EventBuilder::new(Kind::ChannelCreation, format!(r#"{{"name":"{}"}}"#, name))
            .custom_created_at(Timestamp::from(created_at))
            .sign_with_keys(keys)
            .unwrap();
        ChannelAggregate::new(
            event.id,
            keys.public_key(),
            ChannelMetadata {
                name: name.to_string(),
            },
            event.created_at,
        )
    }

    #[test]
    fn test_upsert_first_creation_wins() {
        let keys = Keys::generate();
        let mut store = ChannelStore::new();
        let original = channel(&keys, "foo", 100);

        assert!(store.upsert(original.clone()));

        let mut duplicate = original.clone();
        duplicate.name = "bar".to_string();
        assert!(!store.upsert(duplicate));

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&original.id).unwrap().name(), "foo");
    }

    #[test]
    fn test_get_mut_mutates_in_place() {
        let keys = Keys::generate();
        let mut store = ChannelStore::new();
        let original = channel(&keys, "foo", 100);
        let id = original.id;
        store.upsert(original);

        store.get_mut(&id).unwrap().rename(
            ChannelMetadata {
                name: "renamed".to_string(),
            },
            Timestamp::from(120),
        );

        let updated = store.get(&id).unwrap();
        assert_eq!(updated.name(), "renamed");
        assert_eq!(updated.latest_update(), Timestamp::from(120));
    }

    #[test]
    fn test_absorb_merges_rebuilt_and_keeps_unseen() {
        let keys = Keys::generate();
        let mut live = ChannelStore::new();
        let seen = channel(&keys, "seen", 100);
        let unseen = channel(&keys, "unseen", 50);
        live.upsert(seen.clone());
        live.upsert(unseen.clone());

        let mut rebuilt_seen = seen.clone();
        rebuilt_seen.push_message(ChannelMessage {
            id: unseen.id,
            content: "hi".to_string(),
            author: keys.public_key(),
            created_at: Timestamp::from(300),
        });
        let mut rebuilt = ChannelStore::new();
        rebuilt.upsert(rebuilt_seen.clone());

        live.absorb(rebuilt);

        assert_eq!(live.len(), 2);
        assert_eq!(live.get(&seen.id), Some(&rebuilt_seen));
        assert_eq!(live.get(&unseen.id), Some(&unseen));
    }

    #[test]
    fn test_absorb_keeps_newer_live_state() {
        let keys = Keys::generate();
        let base = channel(&keys, "foo", 100);

        let mut live = ChannelStore::new();
        let mut known = base.clone();
        known.rename(
            ChannelMetadata {
                name: "live-name".to_string(),
            },
            Timestamp::from(400),
        );
        known.push_message(ChannelMessage {
            id: channel(&keys, "other", 1).id,
            content: "live".to_string(),
            author: keys.public_key(),
            created_at: Timestamp::from(500),
        });
        live.upsert(known);

        let mut older = base.clone();
        older.rename(
            ChannelMetadata {
                name: "old-name".to_string(),
            },
            Timestamp::from(200),
        );
        older.push_message(ChannelMessage {
            id: base.id,
            content: "old".to_string(),
            author: keys.public_key(),
            created_at: Timestamp::from(300),
        });
        let mut rebuilt = ChannelStore::new();
        rebuilt.upsert(older);

        live.absorb(rebuilt);

        let merged = live.get(&base.id).unwrap();
        assert_eq!(merged.name(), "live-name");
        assert_eq!(merged.latest_update(), Timestamp::from(500));
        let contents: Vec<&str> = merged
            .recent_messages()
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(contents, vec!["live", "old"]);
    }

    #[test]
    fn test_empty_store() {
        let store = ChannelStore::new();
        assert!(store.is_empty());
        assert_eq!(store.all().count(), 0);
    }
}
