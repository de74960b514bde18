use crate::nostr_manager::NostrManagerError;
use thiserror::Error;

pub type Result<T> = core::result::Result<T, NchanError>;

#[derive(Error, Debug)]
pub enum NchanError {
    #[error("Filesystem error: {0}")]
    Filesystem(#[from] std::io::Error),

    #[error("Logging setup error: {0}")]
    LoggingSetup(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Nostr key error: {0}")]
    NostrKey(#[from] nostr_sdk::key::Error),

    #[error("Nostr url error: {0}")]
    NostrUrl(#[from] nostr_sdk::types::url::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Nostr manager error: {0}")]
    NostrManager(#[from] NostrManagerError),

    #[error("Event source error: {0}")]
    EventSource(String),

    #[error("Event queue closed")]
    EventQueueClosed,

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<Box<dyn std::error::Error + Send + Sync>> for NchanError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        NchanError::EventSource(err.to_string())
    }
}
