use super::store::ChannelStore;
use super::types::{ChannelAggregate, ChannelSummary};

/// Default number of channels in the published list
pub const DEFAULT_RANKED_LIMIT: usize = 50;

/// Projects the store into at most `limit` summaries, most recently active first.
///
/// Channels with the same `latest_update` are ordered by creation time (older
/// first) and then by id, so the output never depends on map iteration order.
pub fn rank(store: &ChannelStore, limit: usize) -> Vec<ChannelSummary> {
    let mut channels: Vec<&ChannelAggregate> = store.all().collect();
    channels.sort_by(|a, b| {
        b.latest_update
            .cmp(&a.latest_update)
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });
    channels
        .into_iter()
        .take(limit)
        .map(ChannelSummary::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use nostr_sdk::prelude::*;

    use super::*;
    use crate::nchan::channels::events::ChannelEvent;
    use crate::nchan::channels::live_updater::apply_event;
    use crate::nchan::channels::test_utils::*;

    fn store_with(channels: &[(&Keys, &str, u64)]) -> (ChannelStore, Vec<EventId>) {
        let mut store = ChannelStore::new();
        let mut ids = Vec::new();
        for (keys, name, created_at) in channels {
            let event = creation_event(keys, name, *created_at);
            apply_event(&mut store, ChannelEvent::try_from(&event).unwrap()).unwrap();
            ids.push(event.id);
        }
        (store, ids)
    }

    #[test]
    fn test_rank_sorts_by_latest_update_descending() {
        let keys = Keys::generate();
        let (store, ids) = store_with(&[(&keys, "c1", 200), (&keys, "c2", 300)]);

        let ranked = rank(&store, DEFAULT_RANKED_LIMIT);
        let ranked_ids: Vec<EventId> = ranked.iter().map(|s| s.id).collect();
        assert_eq!(ranked_ids, vec![ids[1], ids[0]]);
    }

    #[test]
    fn test_rank_truncates_to_limit() {
        let keys = Keys::generate();
        let specs: Vec<(&Keys, String, u64)> = (0..60)
            .map(|i| (&keys, format!("channel-{}", i), 1_000 + i as u64))
            .collect();
        let borrowed: Vec<(&Keys, &str, u64)> = specs
            .iter()
            .map(|(k, name, ts)| (*k, name.as_str(), *ts))
            .collect();
        let (store, _) = store_with(&borrowed);

        let ranked = rank(&store, DEFAULT_RANKED_LIMIT);
        assert_eq!(ranked.len(), DEFAULT_RANKED_LIMIT);
        assert!(
            ranked
                .windows(2)
                .all(|pair| pair[0].latest_update >= pair[1].latest_update)
        );
        assert_eq!(ranked[0].name, "channel-59");

        let small = rank(&store, 5);
        assert_eq!(small.len(), 5);
    }

    #[test]
    fn test_rank_of_small_store_returns_everything() {
        let keys = Keys::generate();
        let (store, _) = store_with(&[(&keys, "a", 1), (&keys, "b", 2), (&keys, "c", 3)]);
        assert_eq!(rank(&store, DEFAULT_RANKED_LIMIT).len(), 3);
        assert!(rank(&ChannelStore::new(), DEFAULT_RANKED_LIMIT).is_empty());
    }

    #[test]
    fn test_rank_tie_break_is_deterministic() {
        let keys = Keys::generate();
        let (mut store, ids) = store_with(&[(&keys, "older", 100), (&keys, "newer", 150)]);
        // Bring both channels to the same latest_update
        for id in &ids {
            let message = message_event(&keys, *id, "tie", 400);
            apply_event(&mut store, ChannelEvent::try_from(&message).unwrap()).unwrap();
        }

        let first = rank(&store, DEFAULT_RANKED_LIMIT);
        assert_eq!(first[0].id, ids[0]);
        assert_eq!(first[1].id, ids[1]);
        for _ in 0..5 {
            assert_eq!(rank(&store.clone(), DEFAULT_RANKED_LIMIT), first);
        }
    }

    #[test]
    fn test_summary_json_shape() {
        let creator = Keys::generate();
        let poster = Keys::generate();
        let (mut store, ids) = store_with(&[(&creator, "foo", 100)]);
        let message = message_event(&poster, ids[0], "hi", 150);
        apply_event(&mut store, ChannelEvent::try_from(&message).unwrap()).unwrap();

        let json = serde_json::to_value(rank(&store, DEFAULT_RANKED_LIMIT)).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{
                "id": ids[0].to_hex(),
                "author": creator.public_key().to_hex(),
                "latest_update": 150,
                "name": "foo",
                "events": [{
                    "content": "hi",
                    "author": poster.public_key().to_hex(),
                    "created_at": 150
                }]
            }])
        );
    }
}
