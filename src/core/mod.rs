//! In-memory authoritative store and index helpers.

/// Helper index aliases and tag index maintenance.
pub mod indices;
/// Authoritative entry store with name, URL and tag indices.
pub mod store;
