use nostr_sdk::prelude::*;
use tokio::sync::mpsc::Receiver;

use crate::nchan::channels::ChannelAggregator;
use crate::types::ProcessableEvent;

/// Main event processing loop.
///
/// Sole owner of the aggregator: live events and resync snapshots are applied
/// one at a time in queue order. After a shutdown signal the remaining queue is
/// drained before the loop exits. Returns the aggregator so callers can inspect
/// the final state.
pub(crate) async fn process_events(
    mut aggregator: ChannelAggregator,
    mut receiver: Receiver<ProcessableEvent>,
    mut shutdown: Receiver<()>,
) -> ChannelAggregator {
    tracing::debug!(
        target: "nchan::event_processor::process_events",
        "Starting event processing loop"
    );

    let mut shutting_down = false;

    loop {
        tokio::select! {
            event = receiver.recv() => {
                let Some(event) = event else {
                    tracing::debug!(
                        target: "nchan::event_processor::process_events",
                        "Event queue closed, exiting event processing loop"
                    );
                    break;
                };
                match event {
                    ProcessableEvent::NostrEvent { event, subscription_id } => {
                        if subscription_id.is_none() {
                            tracing::debug!(
                                target: "nchan::event_processor::process_events",
                                "Event {} received without subscription ID",
                                event.id
                            );
                        }
                        // Dropped events are logged by the aggregator
                        let _ = aggregator.handle_event(&event).await;
                    }
                    ProcessableEvent::Resync(snapshot) => {
                        aggregator.apply_snapshot(&snapshot).await;
                    }
                    ProcessableEvent::RelayMessage(relay_url, message) => {
                        process_relay_message(relay_url, message);
                    }
                }
                if shutting_down && receiver.is_empty() {
                    tracing::debug!(
                        target: "nchan::event_processor::process_events",
                        "Queue flushed, shutting down event processor"
                    );
                    break;
                }
            }
            Some(_) = shutdown.recv(), if !shutting_down => {
                tracing::info!(
                    target: "nchan::event_processor::process_events",
                    "Received shutdown signal, finishing current queue..."
                );
                shutting_down = true;
                if receiver.is_empty() {
                    break;
                }
            }
        }
    }

    aggregator
}

/// Process relay messages for logging/monitoring
fn process_relay_message(relay_url: RelayUrl, message_type: String) {
    tracing::debug!(
        target: "nchan::event_processor::process_relay_message",
        "Processing message from {}: {}",
        relay_url,
        message_type
    );
}
