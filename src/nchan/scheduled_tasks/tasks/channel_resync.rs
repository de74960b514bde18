use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::Sender;

use crate::NchanError;
use crate::nchan::channels::{ReconcilerConfig, fetch_snapshot};
use crate::nchan::event_source::EventSource;
use crate::nchan::scheduled_tasks::Task;
use crate::types::ProcessableEvent;

/// Periodically re-fetches channel history and hands it to the event processor.
///
/// The fetch runs here, off the processing loop; the rebuild and merge happen
/// when the processor dequeues the snapshot, between two live events.
pub(crate) struct ChannelResync {
    source: Arc<dyn EventSource>,
    config: ReconcilerConfig,
    event_sender: Sender<ProcessableEvent>,
    interval: Duration,
}

impl ChannelResync {
    pub(crate) fn new(
        source: Arc<dyn EventSource>,
        config: ReconcilerConfig,
        event_sender: Sender<ProcessableEvent>,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            config,
            event_sender,
            interval,
        }
    }
}

#[async_trait]
impl Task for ChannelResync {
    fn name(&self) -> &'static str {
        "channel_resync"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn execute(&self) -> Result<(), NchanError> {
        tracing::debug!(
            target: "nchan::scheduler::channel_resync",
            "Starting channel resync"
        );

        let snapshot = fetch_snapshot(self.source.as_ref(), &self.config).await?;

        tracing::info!(
            target: "nchan::scheduler::channel_resync",
            "Fetched {} events, queueing rebuild",
            snapshot.len()
        );

        self.event_sender
            .send(ProcessableEvent::Resync(Box::new(snapshot)))
            .await
            .map_err(|_| NchanError::EventQueueClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nchan::channels::test_utils::{MockEventSource, creation_event};
    use nostr_sdk::prelude::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_resync_queues_snapshot() {
        let keys = Keys::generate();
        let creation = creation_event(&keys, "foo", 100);
        let source = Arc::new(MockEventSource::new(vec![creation.clone()]));
        let (sender, mut receiver) = mpsc::channel(10);
        let task = ChannelResync::new(
            source,
            ReconcilerConfig::default(),
            sender,
            Duration::from_secs(3600),
        );

        task.execute().await.unwrap();

        match receiver.recv().await.unwrap() {
            ProcessableEvent::Resync(snapshot) => {
                assert_eq!(snapshot.creations.len(), 1);
                assert_eq!(snapshot.creations[0].id, creation.id);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failed_fetch_queues_nothing() {
        let source = Arc::new(MockEventSource::new(vec![]));
        source.fail();
        let (sender, mut receiver) = mpsc::channel(10);
        let task = ChannelResync::new(
            source,
            ReconcilerConfig::default(),
            sender,
            Duration::from_secs(3600),
        );

        assert!(matches!(
            task.execute().await,
            Err(NchanError::EventSource(_))
        ));
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_closed_queue() {
        let source = Arc::new(MockEventSource::new(vec![]));
        let (sender, receiver) = mpsc::channel(1);
        drop(receiver);
        let task = ChannelResync::new(
            source,
            ReconcilerConfig::default(),
            sender,
            Duration::from_secs(3600),
        );

        assert!(matches!(
            task.execute().await,
            Err(NchanError::EventQueueClosed)
        ));
    }
}
