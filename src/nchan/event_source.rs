use std::collections::HashSet;

use async_trait::async_trait;
use nostr_sdk::prelude::*;

pub type SourceError = Box<dyn std::error::Error + Send + Sync>;

/// Historical queries and live subscriptions against the relay network
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Runs all filters and returns the union of their results, de-duplicated by
    /// event id. Each filter contributes at most its `limit` newest events.
    /// The order of the returned events is unspecified.
    async fn query(&self, filters: Vec<ChannelFilter>) -> Result<Vec<Event>, SourceError>;

    /// Starts a live subscription. Matching events are delivered to the event
    /// processing queue the source was created with.
    async fn subscribe(&self, filter: ChannelFilter) -> Result<(), SourceError>;
}

/// Relay filter restricted to the fields the channel aggregator uses
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelFilter {
    pub kinds: Vec<Kind>,
    pub ids: Vec<EventId>,
    pub authors: Vec<PublicKey>,
    /// Referenced channel ids (`#e`)
    pub channels: Vec<EventId>,
    pub since: Option<Timestamp>,
    pub limit: Option<usize>,
}

impl ChannelFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: Kind) -> Self {
        self.kinds.push(kind);
        self
    }

    pub fn kinds<I>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = Kind>,
    {
        self.kinds.extend(kinds);
        self
    }

    pub fn id(mut self, id: EventId) -> Self {
        self.ids.push(id);
        self
    }

    pub fn author(mut self, author: PublicKey) -> Self {
        self.authors.push(author);
        self
    }

    pub fn channel(mut self, channel_id: EventId) -> Self {
        self.channels.push(channel_id);
        self
    }

    pub fn since(mut self, since: Timestamp) -> Self {
        self.since = Some(since);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Converts to a relay filter
    pub fn to_filter(&self) -> Filter {
        let mut filter = Filter::new();
        if !self.kinds.is_empty() {
            filter = filter.kinds(self.kinds.clone());
        }
        if !self.ids.is_empty() {
            filter = filter.ids(self.ids.clone());
        }
        if !self.authors.is_empty() {
            filter = filter.authors(self.authors.clone());
        }
        if !self.channels.is_empty() {
            filter = filter.events(self.channels.clone());
        }
        if let Some(since) = self.since {
            filter = filter.since(since);
        }
        if let Some(limit) = self.limit {
            filter = filter.limit(limit);
        }
        filter
    }

    pub fn matches(&self, event: &Event) -> bool {
        (self.kinds.is_empty() || self.kinds.contains(&event.kind))
            && (self.ids.is_empty() || self.ids.contains(&event.id))
            && (self.authors.is_empty() || self.authors.contains(&event.pubkey))
            && self.since.is_none_or(|since| event.created_at >= since)
            && (self.channels.is_empty() || self.references_channel(event))
    }

    fn references_channel(&self, event: &Event) -> bool {
        event
            .tags
            .iter()
            .filter(|tag| tag.kind() == TagKind::e())
            .filter_map(|tag| tag.content().and_then(|c| EventId::from_hex(c).ok()))
            .any(|id| self.channels.contains(&id))
    }

    /// Keeps the matching events, newest first, capped at `limit`.
    ///
    /// Relays are not trusted to honour the filter, and results merged from
    /// several relays can exceed the limit.
    pub fn select<I>(&self, events: I) -> Vec<Event>
    where
        I: IntoIterator<Item = Event>,
    {
        let mut selected: Vec<Event> = events.into_iter().filter(|e| self.matches(e)).collect();
        selected.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        selected.dedup_by_key(|e| e.id);
        if let Some(limit) = self.limit {
            selected.truncate(limit);
        }
        selected
    }
}

/// Union of several result sets, keeping the first copy of each event id
pub fn merge_unique<I>(results: I) -> Vec<Event>
where
    I: IntoIterator<Item = Vec<Event>>,
{
    let mut seen = HashSet::new();
    results
        .into_iter()
        .flatten()
        .filter(|event| seen.insert(event.id))
        .collect()
}
