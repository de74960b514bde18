//! Event builders and in-memory doubles shared by the channel tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use nostr_sdk::prelude::*;

use super::ChannelSummary;
use crate::nchan::channel_publisher::{ChannelPublisher, PublishError};
use crate::nchan::event_source::{ChannelFilter, EventSource, SourceError, merge_unique};

pub(crate) fn raw_event(
    keys: &Keys,
    kind: Kind,
    content: &str,
    tags: Vec<Tag>,
    created_at: u64,
) -> Event {
    EventBuilder::new(kind, content)
        .tags(tags)
        .custom_created_at(Timestamp::from(created_at))
        .sign_with_keys(keys)
        .unwrap()
}

pub(crate) fn creation_event(keys: &Keys, name: &str, created_at: u64) -> Event {
    let content = serde_json::json!({ "name": name, "about": "", "picture": "" }).to_string();
    raw_event(keys, Kind::ChannelCreation, &content, vec![], created_at)
}

pub(crate) fn rename_event(keys: &Keys, channel_id: EventId, name: &str, created_at: u64) -> Event {
    let content = serde_json::json!({ "name": name }).to_string();
    raw_event(
        keys,
        Kind::ChannelMetadata,
        &content,
        vec![Tag::event(channel_id)],
        created_at,
    )
}

pub(crate) fn root_tag(channel_id: EventId) -> Tag {
    Tag::custom(
        TagKind::e(),
        [channel_id.to_hex(), String::new(), "root".to_string()],
    )
}

pub(crate) fn message_event(
    keys: &Keys,
    channel_id: EventId,
    content: &str,
    created_at: u64,
) -> Event {
    raw_event(
        keys,
        Kind::ChannelMessage,
        content,
        vec![root_tag(channel_id)],
        created_at,
    )
}

/// Relay network double backed by a fixed set of events
#[derive(Default)]
pub(crate) struct MockEventSource {
    events: Vec<Event>,
    queries: Mutex<Vec<Vec<ChannelFilter>>>,
    subscriptions: Mutex<Vec<ChannelFilter>>,
    failing: AtomicBool,
    failing_subscribe: AtomicBool,
}

impl MockEventSource {
    pub(crate) fn new(events: Vec<Event>) -> Self {
        Self {
            events,
            ..Default::default()
        }
    }

    /// Makes every following query fail
    pub(crate) fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    /// Makes every following subscription fail
    pub(crate) fn fail_subscribe(&self) {
        self.failing_subscribe.store(true, Ordering::SeqCst);
    }

    pub(crate) fn queries(&self) -> Vec<Vec<ChannelFilter>> {
        self.queries.lock().unwrap().clone()
    }

    pub(crate) fn subscriptions(&self) -> Vec<ChannelFilter> {
        self.subscriptions.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventSource for MockEventSource {
    async fn query(&self, filters: Vec<ChannelFilter>) -> Result<Vec<Event>, SourceError> {
        self.queries.lock().unwrap().push(filters.clone());
        if self.failing.load(Ordering::SeqCst) {
            return Err("relay unreachable".into());
        }
        Ok(merge_unique(
            filters
                .iter()
                .map(|filter| filter.select(self.events.iter().cloned())),
        ))
    }

    async fn subscribe(&self, filter: ChannelFilter) -> Result<(), SourceError> {
        self.subscriptions.lock().unwrap().push(filter);
        if self.failing_subscribe.load(Ordering::SeqCst) {
            return Err("subscription rejected".into());
        }
        Ok(())
    }
}

/// Publisher double that records what it was asked to publish
#[derive(Default)]
pub(crate) struct RecordingPublisher {
    lists: Mutex<Vec<Vec<ChannelSummary>>>,
    notes: Mutex<Vec<(String, Option<EventId>)>>,
    failing: AtomicBool,
}

impl RecordingPublisher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub(crate) fn lists(&self) -> Vec<Vec<ChannelSummary>> {
        self.lists.lock().unwrap().clone()
    }

    pub(crate) fn last_list(&self) -> Option<Vec<ChannelSummary>> {
        self.lists.lock().unwrap().last().cloned()
    }

    pub(crate) fn notes(&self) -> Vec<(String, Option<EventId>)> {
        self.notes.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChannelPublisher for RecordingPublisher {
    async fn publish_channel_list(&self, channels: &[ChannelSummary]) -> Result<(), PublishError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err("signer unavailable".into());
        }
        self.lists.lock().unwrap().push(channels.to_vec());
        Ok(())
    }

    async fn publish_note(
        &self,
        content: &str,
        reply_to: Option<&Event>,
    ) -> Result<(), PublishError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err("signer unavailable".into());
        }
        self.notes
            .lock()
            .unwrap()
            .push((content.to_string(), reply_to.map(|event| event.id)));
        Ok(())
    }
}
