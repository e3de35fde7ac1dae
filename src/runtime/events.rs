//! Runtime event stream payloads.

use crate::persist::SaveReport;

/// What caused a snapshot save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveTrigger {
    /// The periodic scheduler fired.
    Interval,
    /// A create or delete succeeded.
    Mutation,
    /// A caller asked for a synchronous save.
    Manual,
    /// Final flush while shutting down.
    Shutdown,
}

/// Events emitted from the single-writer runtime loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// A new entry was added.
    Added {
        /// Name of the added entry.
        name: String,
    },
    /// An entry was deleted.
    Deleted {
        /// Name of the deleted entry.
        name: String,
    },
    /// A snapshot reached durable storage.
    Saved {
        /// Why the save ran.
        trigger: SaveTrigger,
        /// Metadata written alongside the snapshot.
        report: SaveReport,
    },
    /// A snapshot write failed. The runtime keeps going.
    SaveFailed {
        /// Why the save ran.
        trigger: SaveTrigger,
        /// Rendered error.
        reason: String,
    },
}
