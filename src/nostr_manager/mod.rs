use std::time::Duration;

use nostr_sdk::prelude::*;
use thiserror::Error;
use tokio::sync::mpsc::Sender;

use crate::types::ProcessableEvent;
use crate::nchan::DEFAULT_LIST_IDENTIFIER;

pub mod publisher;
pub mod query;
pub mod subscriptions;

#[derive(Error, Debug)]
pub enum NostrManagerError {
    #[error("Client Error: {0}")]
    Client(#[from] nostr_sdk::client::Error),
    #[error("Failed to connect to any relays")]
    NoRelayConnections,
    #[error("Nostr Event error: {0}")]
    NostrEventBuilderError(#[from] nostr_sdk::event::builder::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Relay plumbing for nchan: one client, one signing key, a fixed relay set.
#[derive(Debug, Clone)]
pub struct NostrManager {
    pub(crate) client: Client,
    keys: Keys,
    relays: Vec<RelayUrl>,
    list_identifier: String,
    timeout: Duration,
}

pub type Result<T> = std::result::Result<T, NostrManagerError>;

impl NostrManager {
    /// Default timeout for client requests
    pub(crate) fn default_timeout() -> Duration {
        Duration::from_secs(10)
    }

    /// Create a new Nostr manager
    ///
    /// # Arguments
    ///
    /// * `keys` - Keys used to sign everything nchan publishes
    /// * `relays` - Relays used for queries, subscriptions and publishing
    /// * `event_sender` - Channel sender for forwarding subscription events to the event processor
    /// * `timeout` - Timeout for client requests
    pub async fn new(
        keys: Keys,
        relays: Vec<RelayUrl>,
        event_sender: Sender<ProcessableEvent>,
        timeout: Duration,
    ) -> Result<Self> {
        let opts = ClientOptions::default();
        let client = Client::builder().opts(opts).build();

        tracing::debug!(
            target: "nchan::nostr_manager::new",
            "Setting up notification handler..."
        );

        // Spawn notification handler in a background task to prevent blocking
        let client_clone = client.clone();
        tokio::spawn(async move {
            if let Err(e) = client_clone
                .handle_notifications(move |notification| {
                    let sender = event_sender.clone();
                    async move { Ok(Self::forward_notification(&sender, notification).await) }
                })
                .await
            {
                tracing::error!(
                    target: "nchan::nostr_manager::handle_notifications",
                    "Notification handler error: {:?}",
                    e
                );
            }
        });

        Ok(Self {
            client,
            keys,
            relays,
            list_identifier: DEFAULT_LIST_IDENTIFIER.to_string(),
            timeout,
        })
    }

    /// Overrides the `d` tag of the published channel list
    pub fn with_list_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.list_identifier = identifier.into();
        self
    }

    /// Pushes a relay pool notification onto the event queue.
    ///
    /// Returns `true` when the notification loop should exit.
    async fn forward_notification(
        sender: &Sender<ProcessableEvent>,
        notification: RelayPoolNotification,
    ) -> bool {
        match notification {
            RelayPoolNotification::Message { relay_url, message } => {
                let processable = match message {
                    RelayMessage::Event {
                        subscription_id,
                        event,
                    } => ProcessableEvent::new_nostr_event(
                        event.as_ref().clone(),
                        Some(subscription_id.to_string()),
                    ),
                    other => ProcessableEvent::RelayMessage(relay_url, relay_message_name(&other)),
                };

                if sender.send(processable).await.is_err() {
                    // SendError only occurs when channel is closed, so exit gracefully
                    tracing::debug!(
                        target: "nchan::nostr_manager::handle_notifications",
                        "Event channel closed, exiting notification handler"
                    );
                    return true;
                }
                false
            }
            RelayPoolNotification::Shutdown => {
                tracing::debug!(
                    target: "nchan::nostr_manager::handle_notifications",
                    "Relay pool shutdown"
                );
                true
            }
            _ => false,
        }
    }

    pub fn public_key(&self) -> PublicKey {
        self.keys.public_key()
    }

    pub(crate) fn keys(&self) -> &Keys {
        &self.keys
    }

    pub fn relays(&self) -> &[RelayUrl] {
        &self.relays
    }

    pub(crate) fn list_identifier(&self) -> &str {
        &self.list_identifier
    }

    pub(crate) fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Adds every configured relay to the client and connects.
    ///
    /// Individual relays that cannot be added are logged and skipped; fails
    /// only when none of them could be added.
    pub(crate) async fn ensure_relays_connected(&self) -> Result<()> {
        tracing::debug!(
            target: "nchan::nostr_manager::ensure_relays_connected",
            "Ensuring connection to {} relays",
            self.relays.len()
        );

        let mut added = 0usize;
        for url in &self.relays {
            match self.client.add_relay(url.clone()).await {
                Ok(_) => {
                    added += 1;
                    tracing::debug!(
                        target: "nchan::nostr_manager::ensure_relays_connected",
                        "Added relay: {}",
                        url
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        target: "nchan::nostr_manager::ensure_relays_connected",
                        "Failed to add relay {}: {}",
                        url,
                        e
                    );
                }
            }
        }

        if added == 0 {
            return Err(NostrManagerError::NoRelayConnections);
        }

        self.client.connect().await;

        tracing::info!(
            target: "nchan::nostr_manager::ensure_relays_connected",
            "Connecting to {} relays",
            added
        );

        Ok(())
    }

    /// Unsubscribes and disconnects from every relay
    pub(crate) async fn shutdown(&self) {
        self.client.unsubscribe_all().await;
        self.client.disconnect().await;
    }
}

fn relay_message_name(message: &RelayMessage) -> String {
    match message {
        RelayMessage::Ok { .. } => "Ok",
        RelayMessage::Notice { .. } => "Notice",
        RelayMessage::Closed { .. } => "Closed",
        RelayMessage::EndOfStoredEvents(_) => "EndOfStoredEvents",
        RelayMessage::Auth { .. } => "Auth",
        RelayMessage::Count { .. } => "Count",
        RelayMessage::NegMsg { .. } => "NegMsg",
        RelayMessage::NegErr { .. } => "NegErr",
        _ => "Unknown",
    }
    .to_string()
}
