//! Node configuration loaded from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use tycoon_ledger::{AdminSet, NotifierConfig};

pub const DEFAULT_ADDR: &str = "0.0.0.0:3000";

/// Runtime settings of a node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Listen address (`TYCOON_ADDR`).
    pub addr: SocketAddr,

    /// Administrator identifiers (`TYCOON_ADMIN_IDS`, comma separated).
    pub admins: AdminSet,

    /// SQLite database path (`TYCOON_DATABASE`). In-memory store when unset.
    pub database: Option<PathBuf>,

    /// JSON seed file applied to an empty store (`TYCOON_SEED`).
    pub seed: Option<PathBuf>,

    /// Period of automatic monthly settlement (`TYCOON_SETTLEMENT_INTERVAL_SECS`).
    pub settlement_interval: Option<Duration>,

    /// Notification fan-out (`TYCOON_NOTIFICATION_BUFFER`).
    pub notifier: NotifierConfig,
}

impl NodeConfig {
    /// Read the configuration from process environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let addr = var("TYCOON_ADDR")
            .unwrap_or_else(|| DEFAULT_ADDR.to_string())
            .parse::<SocketAddr>()
            .context("TYCOON_ADDR must be a socket address such as 0.0.0.0:3000")?;

        let admins = match var("TYCOON_ADMIN_IDS") {
            Some(raw) => AdminSet::parse(&raw).context("TYCOON_ADMIN_IDS must list integer user ids")?,
            None => AdminSet::default(),
        };

        let settlement_interval = var("TYCOON_SETTLEMENT_INTERVAL_SECS")
            .map(|raw| {
                raw.trim()
                    .parse::<u64>()
                    .context("TYCOON_SETTLEMENT_INTERVAL_SECS must be a whole number of seconds")
            })
            .transpose()?
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        let buffer = match var("TYCOON_NOTIFICATION_BUFFER") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .context("TYCOON_NOTIFICATION_BUFFER must be a positive integer")?,
            None => NotifierConfig::default().buffer,
        };

        Ok(Self {
            addr,
            admins,
            database: var("TYCOON_DATABASE").map(PathBuf::from),
            seed: var("TYCOON_SEED").map(PathBuf::from),
            settlement_interval,
            notifier: NotifierConfig { buffer },
        })
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            admins: AdminSet::default(),
            database: None,
            seed: None,
            settlement_interval: None,
            notifier: NotifierConfig::default(),
        }
    }
}
