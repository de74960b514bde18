use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use nostr_sdk::prelude::*;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::{NchanError, Result};
use crate::init_tracing;
use crate::nostr_manager::NostrManager;
use crate::types::ProcessableEvent;
use channel_publisher::ChannelPublisher;
use channels::{ChannelAggregator, DEFAULT_RANKED_LIMIT, ReconcilerConfig, fetch_snapshot};
use event_source::{ChannelFilter, EventSource};
use scheduled_tasks::{ChannelResync, SchedulerConfig, Task};

pub mod channel_publisher;
pub mod channels;
pub mod event_source;
mod event_processor;
pub mod scheduled_tasks;

/// Relays the channel directory reads from and publishes to by default
pub const DEFAULT_RELAYS: [&str; 4] = [
    "wss://relay-jp.nostr.wirednet.jp",
    "wss://r.kojira.io",
    "wss://yabu.me",
    "wss://relay-jp.shino3.net",
];

/// Note published once at startup
pub const DEFAULT_ANNOUNCEMENT: &str = "n-chan thread system auto update.";

/// `d` tag of the published channel list
pub const DEFAULT_LIST_IDENTIFIER: &str = "nchan_list";

const DEFAULT_RESYNC_INTERVAL: Duration = Duration::from_secs(60 * 60);
const DEFAULT_EVENT_QUEUE_SIZE: usize = 500;

#[derive(Clone, Debug)]
pub struct NchanConfig {
    /// Keys used to sign the channel list and the announcement
    pub keys: Keys,

    /// Relays used for queries, the live subscription and publishing
    pub relays: Vec<RelayUrl>,

    /// Directory for application logs; stdout only when unset
    pub logs_dir: Option<PathBuf>,

    /// `d` tag of the published channel list
    pub list_identifier: String,

    /// Note published once at startup; nothing is announced when unset
    pub announcement: Option<String>,

    /// Number of channels in the published list
    pub ranked_limit: usize,

    /// Interval of the periodic full resync; disabled when unset
    pub resync_interval: Option<Duration>,

    /// Exit after running this long
    pub max_runtime: Option<Duration>,

    /// Timeout for relay queries
    pub request_timeout: Duration,

    pub reconciler: ReconcilerConfig,

    /// Capacity of the event processing queue
    pub event_queue_size: usize,
}

impl NchanConfig {
    /// Configuration with the default relays, identifier, announcement and
    /// hourly resync
    pub fn new(keys: Keys) -> Result<Self> {
        Ok(Self {
            keys,
            relays: Self::parse_relays(&DEFAULT_RELAYS)?,
            logs_dir: None,
            list_identifier: DEFAULT_LIST_IDENTIFIER.to_string(),
            announcement: Some(DEFAULT_ANNOUNCEMENT.to_string()),
            ranked_limit: DEFAULT_RANKED_LIMIT,
            resync_interval: Some(DEFAULT_RESYNC_INTERVAL),
            max_runtime: None,
            request_timeout: NostrManager::default_timeout(),
            reconciler: ReconcilerConfig::default(),
            event_queue_size: DEFAULT_EVENT_QUEUE_SIZE,
        })
    }

    /// Parses relay URLs, rejecting an empty list
    pub fn parse_relays<S>(urls: &[S]) -> Result<Vec<RelayUrl>>
    where
        S: AsRef<str>,
    {
        if urls.is_empty() {
            return Err(NchanError::Configuration(
                "At least one relay is required".to_string(),
            ));
        }
        urls.iter()
            .map(|url| RelayUrl::parse(url.as_ref()).map_err(NchanError::from))
            .collect()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.relays.is_empty() {
            return Err(NchanError::Configuration(
                "At least one relay is required".to_string(),
            ));
        }
        if self.ranked_limit == 0 {
            return Err(NchanError::Configuration(
                "Ranked limit must be greater than zero".to_string(),
            ));
        }
        if self.reconciler.batch_size == 0 {
            return Err(NchanError::Configuration(
                "Batch size must be greater than zero".to_string(),
            ));
        }
        if self.event_queue_size == 0 {
            return Err(NchanError::Configuration(
                "Event queue size must be greater than zero".to_string(),
            ));
        }
        if self.resync_interval.is_some_and(|interval| interval.is_zero()) {
            return Err(NchanError::Configuration(
                "Resync interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// A running channel directory.
///
/// Owns the background tasks: the event processing loop (sole owner of the
/// channel store) and the scheduled resync.
pub struct Nchan {
    config: NchanConfig,
    nostr: Option<Arc<NostrManager>>,
    event_sender: Sender<ProcessableEvent>,
    shutdown_sender: Sender<()>,
    scheduler_shutdown: watch::Sender<bool>,
    processor: JoinHandle<ChannelAggregator>,
    scheduled: Vec<JoinHandle<()>>,
}

impl Nchan {
    /// Starts the directory against the configured relays.
    ///
    /// Sets up logging, connects, publishes the announcement, runs the initial
    /// fetch and publish, then opens the live subscription.
    pub async fn start(config: NchanConfig) -> Result<Self> {
        config.validate()?;

        if let Some(logs_dir) = &config.logs_dir {
            std::fs::create_dir_all(logs_dir)
                .with_context(|| format!("Failed to create logs directory: {:?}", logs_dir))
                .map_err(NchanError::from)?;
        }
        init_tracing(config.logs_dir.as_deref())?;

        let (event_sender, event_receiver) = mpsc::channel(config.event_queue_size);

        let nostr = NostrManager::new(
            config.keys.clone(),
            config.relays.clone(),
            event_sender.clone(),
            config.request_timeout,
        )
        .await?
        .with_list_identifier(config.list_identifier.clone());
        nostr.ensure_relays_connected().await?;

        tracing::info!(
            target: "nchan::start",
            "Publishing channel list as {} to {} relays",
            nostr.public_key(),
            nostr.relays().len()
        );

        let nostr = Arc::new(nostr);
        match Self::start_with(
            config,
            nostr.clone(),
            nostr.clone(),
            event_sender,
            event_receiver,
        )
        .await
        {
            Ok(mut nchan) => {
                nchan.nostr = Some(nostr);
                Ok(nchan)
            }
            Err(e) => {
                nostr.shutdown().await;
                Err(e)
            }
        }
    }

    /// Starts the directory on top of any event source and publisher.
    ///
    /// `event_receiver` must be the queue the source delivers live events to.
    pub(crate) async fn start_with(
        config: NchanConfig,
        source: Arc<dyn EventSource>,
        publisher: Arc<dyn ChannelPublisher>,
        event_sender: Sender<ProcessableEvent>,
        event_receiver: Receiver<ProcessableEvent>,
    ) -> Result<Self> {
        config.validate()?;

        // Live events from this moment on overlap the initial fetch; the
        // overlap is absorbed because every update is idempotent.
        let since = Timestamp::now();

        if let Some(announcement) = &config.announcement {
            if let Err(e) = publisher.publish_note(announcement, None).await {
                tracing::error!(
                    target: "nchan::start",
                    "Failed to publish announcement: {}",
                    e
                );
            }
        }

        let mut aggregator = ChannelAggregator::new(publisher, config.ranked_limit);

        tracing::info!(target: "nchan::start", "Initial channel fetch starting");
        match fetch_snapshot(source.as_ref(), &config.reconciler).await {
            Ok(snapshot) => {
                aggregator.apply_snapshot(&snapshot).await;
                tracing::info!(
                    target: "nchan::start",
                    "Initial channel fetch done: {} channels",
                    aggregator.store().len()
                );
            }
            Err(e) => {
                // Publishing an empty list here would overwrite the last good one
                tracing::error!(
                    target: "nchan::start",
                    "Initial channel fetch failed, waiting for live events and resync: {}",
                    e
                );
            }
        }

        let (shutdown_sender, shutdown_receiver) = mpsc::channel(1);
        let processor = tokio::spawn(event_processor::process_events(
            aggregator,
            event_receiver,
            shutdown_receiver,
        ));

        let subscription = source
            .subscribe(
                ChannelFilter::new()
                    .kinds([
                        Kind::ChannelCreation,
                        Kind::ChannelMetadata,
                        Kind::ChannelMessage,
                    ])
                    .since(since),
            )
            .await;
        if let Err(e) = subscription {
            tracing::error!(target: "nchan::start", "Live channel subscription failed: {}", e);
            shutdown_sender.send(()).await.ok();
            if let Err(join_error) = processor.await {
                tracing::warn!(target: "nchan::start", "Event processor panicked: {}", join_error);
            }
            return Err(NchanError::from(e));
        }

        tracing::info!(target: "nchan::start", "Live channel subscription started");

        let (scheduler_shutdown, scheduler_shutdown_receiver) = watch::channel(false);
        let tasks: Vec<Arc<dyn Task>> = match config.resync_interval {
            Some(interval) => vec![Arc::new(ChannelResync::new(
                source,
                config.reconciler.clone(),
                event_sender.clone(),
                interval,
            ))],
            None => Vec::new(),
        };
        let scheduled = scheduled_tasks::start_scheduled_tasks(
            tasks,
            &SchedulerConfig::default(),
            scheduler_shutdown_receiver,
        );

        Ok(Self {
            config,
            nostr: None,
            event_sender,
            shutdown_sender,
            scheduler_shutdown,
            processor,
            scheduled,
        })
    }

    pub fn config(&self) -> &NchanConfig {
        &self.config
    }

    /// Runs until Ctrl-C or until `max_runtime` elapses, then shuts down
    pub async fn run(self) -> Result<()> {
        let max_runtime = self.config.max_runtime;
        let deadline = async {
            match max_runtime {
                Some(runtime) => tokio::time::sleep(runtime).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C").map_err(NchanError::from)?;
                tracing::info!(target: "nchan::run", "Received Ctrl-C");
            }
            _ = deadline => {
                tracing::info!(target: "nchan::run", "Maximum runtime reached");
            }
        }

        let aggregator = self.shutdown().await?;
        tracing::info!(
            target: "nchan::run",
            "Stopped with {} channels known",
            aggregator.store().len()
        );
        Ok(())
    }

    /// Stops the scheduled tasks, drains the event queue and disconnects.
    ///
    /// Returns the final aggregator state.
    pub async fn shutdown(self) -> Result<ChannelAggregator> {
        tracing::info!(target: "nchan::shutdown", "Shutting down");

        self.scheduler_shutdown.send(true).ok();
        for handle in self.scheduled {
            if let Err(e) = handle.await {
                tracing::warn!(target: "nchan::shutdown", "Scheduled task panicked: {}", e);
            }
        }

        if let Some(nostr) = &self.nostr {
            nostr.shutdown().await;
        }

        // Expected to fail if the processor already exited
        self.shutdown_sender.send(()).await.ok();
        drop(self.event_sender);

        self.processor
            .await
            .context("Event processor task failed")
            .map_err(NchanError::from)
    }
}
