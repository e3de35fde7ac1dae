//! Process-level configuration for the `serve` command.

use std::{net::SocketAddr, path::PathBuf, time::Duration};

use crate::runtime::handle::RuntimeConfig;

/// Default listen port.
pub const DEFAULT_PORT: u16 = 4912;
/// Default primary snapshot file name.
pub const DEFAULT_DATA_FILE: &str = "db.dump";
/// Default scheduler period.
pub const DEFAULT_SNAPSHOT_INTERVAL: Duration = Duration::from_secs(59);

/// Server settings, filled from defaults and CLI flags.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Address the HTTP service listens on.
    pub bind_addr: SocketAddr,
    /// Primary snapshot artifact.
    pub data_path: PathBuf,
    /// Companion metadata artifact; `None` means `<data_path>.stat`.
    pub stat_path: Option<PathBuf>,
    /// Period of the snapshot scheduler; zero disables it.
    pub snapshot_interval: Duration,
    /// Queue a snapshot after every create and delete.
    pub save_on_mutation: bool,
    /// Capacity of the store command queue.
    pub command_queue_bound: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)),
            data_path: PathBuf::from(DEFAULT_DATA_FILE),
            stat_path: None,
            snapshot_interval: DEFAULT_SNAPSHOT_INTERVAL,
            save_on_mutation: true,
            command_queue_bound: 256,
        }
    }
}

impl ServerConfig {
    /// Store runtime settings derived from this configuration.
    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            snapshot_interval_ms: self.snapshot_interval.as_millis() as u64,
            save_on_mutation: self.save_on_mutation,
            command_queue_bound: self.command_queue_bound,
            ..RuntimeConfig::default()
        }
    }
}
