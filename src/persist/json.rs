//! JSON file snapshot sink with a `key=value` metadata companion.

use std::{
    ffi::OsString,
    fs::{self, File},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use crate::{
    entry::Entry,
    types::{SaveCount, now_secs},
};

use super::{PersistResult, SaveReport, SnapshotSink};

/// Writes the entry collection as a JSON array to `data_path` and the save
/// metadata to `stat_path`.
///
/// Both files are replaced by write-to-temp plus rename, so a reader never
/// sees a half-written snapshot.
#[derive(Debug)]
pub struct JsonFileSink {
    data_path: PathBuf,
    stat_path: PathBuf,
    save_count: SaveCount,
}

impl JsonFileSink {
    /// Sink writing `data_path` and `<data_path>.stat`.
    pub fn new(data_path: impl Into<PathBuf>) -> Self {
        let data_path = data_path.into();
        let stat_path = with_suffix(&data_path, ".stat");
        Self::with_stat_path(data_path, stat_path)
    }

    /// Sink with an explicit metadata location.
    pub fn with_stat_path(data_path: impl Into<PathBuf>, stat_path: impl Into<PathBuf>) -> Self {
        Self {
            data_path: data_path.into(),
            stat_path: stat_path.into(),
            save_count: 0,
        }
    }

    /// Location of the primary artifact.
    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    /// Location of the metadata artifact.
    pub fn stat_path(&self) -> &Path {
        &self.stat_path
    }

    /// Save attempts made through this sink.
    pub fn save_count(&self) -> SaveCount {
        self.save_count
    }

    /// Reads back the metadata of the last save, `None` if there is none.
    pub fn read_stats(&self) -> PersistResult<Option<SaveReport>> {
        match fs::read_to_string(&self.stat_path) {
            Ok(text) => SaveReport::parse_stat_lines(&text).map(Some),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

impl SnapshotSink for JsonFileSink {
    fn write_snapshot(&mut self, entries: &[Entry]) -> PersistResult<SaveReport> {
        self.save_count += 1;

        let payload = serde_json::to_vec(entries)?;
        write_atomic(&self.data_path, &payload)?;

        let report = SaveReport {
            last_saved: now_secs(),
            save_count: self.save_count,
            size: entries.len(),
        };
        write_atomic(&self.stat_path, report.to_stat_lines().as_bytes())?;
        Ok(report)
    }

    fn load_snapshot(&self) -> PersistResult<Option<Vec<Entry>>> {
        let bytes = match fs::read(&self.data_path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let entries: Vec<Entry> = serde_json::from_slice(&bytes)?;
        Ok(Some(entries))
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s = OsString::from(path.as_os_str());
    s.push(suffix);
    PathBuf::from(s)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> PersistResult<()> {
    let tmp_path = with_suffix(path, ".tmp");
    let mut file = File::create(&tmp_path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}
