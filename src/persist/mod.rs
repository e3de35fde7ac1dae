pub mod json;

use std::{num::ParseIntError, sync::Arc};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::{
    core::store::EntryStore,
    entry::Entry,
    types::{SaveCount, UnixSecs},
};

/// Snapshot read/write failures. All are recoverable.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// The artifact could not be created, written, renamed or read.
    #[error("snapshot io: {0}")]
    Io(#[from] std::io::Error),
    /// The artifact exists but is not a valid entry array.
    #[error("snapshot decode: {0}")]
    Decode(#[from] serde_json::Error),
    /// Anything else, e.g. a malformed metadata line or a failed blocking task.
    #[error("{0}")]
    Message(String),
}

/// Result alias for persistence operations.
pub type PersistResult<T> = Result<T, PersistError>;

/// Contents of the companion metadata artifact for one save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveReport {
    /// When the save completed, Unix seconds.
    pub last_saved: UnixSecs,
    /// Save attempts made by this process, including this one.
    pub save_count: SaveCount,
    /// Entries written.
    pub size: usize,
}

impl SaveReport {
    /// Renders the `key=value` metadata lines.
    pub fn to_stat_lines(&self) -> String {
        format!(
            "last_saved={}\nsave_count={}\nsize={}\n",
            self.last_saved, self.save_count, self.size
        )
    }

    /// Parses metadata lines written by [`SaveReport::to_stat_lines`]. Unknown keys are ignored.
    pub fn parse_stat_lines(text: &str) -> PersistResult<Self> {
        let mut last_saved = None;
        let mut save_count = None;
        let mut size = None;

        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let Some((key, value)) = line.split_once('=') else {
                return Err(PersistError::Message(format!("malformed stat line: {line}")));
            };
            let bad = |_: ParseIntError| PersistError::Message(format!("bad value for {key}: {value}"));
            match key {
                "last_saved" => last_saved = Some(value.parse::<UnixSecs>().map_err(bad)?),
                "save_count" => save_count = Some(value.parse::<SaveCount>().map_err(bad)?),
                "size" => size = Some(value.parse::<usize>().map_err(bad)?),
                _ => {}
            }
        }

        match (last_saved, save_count, size) {
            (Some(last_saved), Some(save_count), Some(size)) => Ok(Self {
                last_saved,
                save_count,
                size,
            }),
            _ => Err(PersistError::Message("incomplete stat file".to_string())),
        }
    }
}

/// Durable destination for store snapshots.
pub trait SnapshotSink: Send {
    /// Writes the full entry collection plus its metadata.
    fn write_snapshot(&mut self, entries: &[Entry]) -> PersistResult<SaveReport>;
    /// Reads the last written collection, `None` if nothing was ever saved.
    fn load_snapshot(&self) -> PersistResult<Option<Vec<Entry>>>;
}

/// Builds a store from `sink`, starting empty when the snapshot is missing or unreadable.
pub fn load_or_empty(sink: &dyn SnapshotSink) -> EntryStore {
    match sink.load_snapshot() {
        Ok(Some(entries)) => {
            let store = EntryStore::from_entries(entries);
            info!(size = store.len(), "loaded snapshot and rebuilt indices");
            store
        }
        Ok(None) => {
            info!("no snapshot found, starting empty");
            EntryStore::new()
        }
        Err(err) => {
            error!(%err, "failed to load snapshot, starting empty");
            EntryStore::new()
        }
    }
}

/// Single-slot admission gate in front of a [`SnapshotSink`].
///
/// At most one save runs at a time; later callers wait without timeout. The
/// slot is released when the write finishes, whether it succeeded or not.
#[derive(Clone)]
pub struct SnapshotGate {
    sink: Arc<Mutex<Box<dyn SnapshotSink>>>,
}

impl SnapshotGate {
    /// Wraps `sink` behind the gate.
    pub fn new(sink: Box<dyn SnapshotSink>) -> Self {
        Self {
            sink: Arc::new(Mutex::new(sink)),
        }
    }

    /// Writes `entries` once the gate is free.
    pub async fn save(&self, entries: Vec<Entry>) -> PersistResult<SaveReport> {
        debug!("acquiring snapshot gate");
        let guard = Arc::clone(&self.sink).lock_owned().await;
        debug!("snapshot gate acquired");

        let result = tokio::task::spawn_blocking(move || {
            let mut sink = guard;
            sink.write_snapshot(&entries)
        })
        .await
        .map_err(|e| PersistError::Message(format!("join error: {e}")))
        .and_then(|r| r);
        debug!("snapshot gate released");

        match &result {
            Ok(report) => info!(
                save_count = report.save_count,
                size = report.size,
                "snapshot saved"
            ),
            Err(err) => error!(%err, "snapshot save failed"),
        }
        result
    }
}
