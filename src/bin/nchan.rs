use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use nostr_sdk::prelude::*;

use nchan::{Nchan, NchanConfig};

/// Publishes a ranked directory of Nostr public chat channels
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Secret key (hex or nsec) used to sign the channel list
    #[clap(long, env = "NCHAN_SECRET_KEY", hide_env_values = true)]
    secret_key: String,

    /// Relays to read from and publish to
    #[clap(long, env = "NCHAN_RELAYS", value_delimiter = ',')]
    relays: Vec<String>,

    /// Directory for application logs
    #[clap(long, env = "NCHAN_LOGS_DIR", value_name = "PATH")]
    logs_dir: Option<PathBuf>,

    /// Identifier (`d` tag) of the published channel list
    #[clap(long, env = "NCHAN_LIST_IDENTIFIER", default_value = nchan::nchan::DEFAULT_LIST_IDENTIFIER)]
    list_identifier: String,

    /// Note published once at startup
    #[clap(long, env = "NCHAN_ANNOUNCEMENT", default_value = nchan::nchan::DEFAULT_ANNOUNCEMENT)]
    announcement: String,

    /// Do not publish the startup note
    #[clap(long)]
    no_announcement: bool,

    /// Number of channels in the published list
    #[clap(long, env = "NCHAN_RANKED_LIMIT", default_value_t = nchan::DEFAULT_RANKED_LIMIT)]
    ranked_limit: usize,

    /// Seconds between full resyncs, 0 disables them
    #[clap(long, env = "NCHAN_RESYNC_INTERVAL_SECS", default_value_t = 3600)]
    resync_interval_secs: u64,

    /// Exit after running this many seconds
    #[clap(long, env = "NCHAN_MAX_RUNTIME_SECS")]
    max_runtime_secs: Option<u64>,

    /// Timeout for relay queries in seconds
    #[clap(long, env = "NCHAN_TIMEOUT_SECS", default_value_t = 10)]
    timeout_secs: u64,
}

impl Args {
    fn into_config(self) -> Result<NchanConfig> {
        let keys = Keys::parse(&self.secret_key).context("Invalid secret key")?;
        let mut config = NchanConfig::new(keys)?;

        if !self.relays.is_empty() {
            config.relays = NchanConfig::parse_relays(&self.relays)?;
        }
        config.logs_dir = self.logs_dir;
        config.list_identifier = self.list_identifier;
        config.announcement = (!self.no_announcement).then_some(self.announcement);
        config.ranked_limit = self.ranked_limit;
        config.resync_interval =
            (self.resync_interval_secs > 0).then(|| Duration::from_secs(self.resync_interval_secs));
        config.max_runtime = self.max_runtime_secs.map(Duration::from_secs);
        config.request_timeout = Duration::from_secs(self.timeout_secs);

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let config = args.into_config()?;
    let nchan = Nchan::start(config)
        .await
        .context("Failed to start nchan")?;

    nchan.run().await?;

    Ok(())
}
