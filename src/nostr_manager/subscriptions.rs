//! Subscription functions for NostrManager

use nostr_sdk::prelude::*;

use crate::nchan::event_source::ChannelFilter;
use crate::nostr_manager::{NostrManager, Result};

/// Subscription id of the live channel feed (kinds 40, 41 and 42)
pub(crate) const CHANNELS_SUBSCRIPTION_ID: &str = "nchan_channels";

impl NostrManager {
    /// Opens (or replaces) a live subscription on every configured relay
    pub(crate) async fn subscribe_with_id(&self, id: &str, filter: &ChannelFilter) -> Result<()> {
        let subscription_id = SubscriptionId::new(id);

        tracing::debug!(
            target: "nchan::nostr_manager::subscribe_with_id",
            "Subscribing {} to {} relays",
            subscription_id,
            self.relays().len()
        );

        self.client
            .subscribe_with_id_to(
                self.relays().to_vec(),
                subscription_id,
                filter.to_filter(),
                None,
            )
            .await?;

        Ok(())
    }
}
