use hashbrown::{HashMap, HashSet};
use tracing::warn;

use crate::{
    core::indices::{KeyIndex, TagIndex, index_tags, unindex_tags},
    entry::Entry,
    types::{EntryId, now_secs},
};

/// Failures reported by [`EntryStore`] operations. Neither leaves the store modified.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("entry {0} already exists")]
    DuplicateName(String),
    #[error("{0}: no such record")]
    NotFound(String),
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Indices {
    by_name: KeyIndex,
    by_url: KeyIndex,
    by_tag: TagIndex,
}

impl Indices {
    fn insert(&mut self, entry: &Entry, id: EntryId) {
        self.by_name.insert(entry.name.clone(), id);
        // Last writer wins on URL collisions.
        self.by_url.insert(entry.url.clone(), id);
        index_tags(&mut self.by_tag, entry.distinct_tags(), id);
    }

    fn build(order: &[EntryId], records: &HashMap<EntryId, Entry>) -> Self {
        let mut out = Self::default();
        for id in order {
            if let Some(entry) = records.get(id) {
                out.insert(entry, *id);
            }
        }
        out
    }
}

/// Canonical ordered entry collection plus name, URL and tag indices.
///
/// Indices hold [`EntryId`]s only; the store owns every [`Entry`]. All
/// mutation goes through `&mut self`, so exclusive access is enforced by the
/// caller (see [`crate::runtime::handle`]).
#[derive(Debug, Default)]
pub struct EntryStore {
    records: HashMap<EntryId, Entry>,
    order: Vec<EntryId>,
    indices: Indices,
    next_id: EntryId,
}

impl EntryStore {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            ..Self::default()
        }
    }

    pub fn from_entries(entries: Vec<Entry>) -> Self {
        let mut store = Self::new();
        store.replace_entries(entries);
        store
    }

    /// Replaces the canonical collection wholesale and rebuilds every index.
    ///
    /// Later entries reusing an earlier name are dropped; returns how many were.
    pub fn replace_entries(&mut self, entries: Vec<Entry>) -> usize {
        self.records.clear();
        self.order.clear();

        let mut seen = HashSet::new();
        let mut dropped = 0;
        for entry in entries {
            if !seen.insert(entry.name.clone()) {
                warn!(name = %entry.name, "dropping duplicate name from snapshot");
                dropped += 1;
                continue;
            }
            let id = self.take_next_id();
            self.order.push(id);
            self.records.insert(id, entry);
        }

        self.rebuild_index();
        dropped
    }

    pub fn add(&mut self, entry: Entry) -> Result<(), StoreError> {
        if self.indices.by_name.contains_key(&entry.name) {
            return Err(StoreError::DuplicateName(entry.name));
        }

        let id = self.take_next_id();
        self.indices.insert(&entry, id);
        self.order.push(id);
        self.records.insert(id, entry);
        Ok(())
    }

    pub fn find_by_name(&mut self, name: &str) -> Result<&Entry, StoreError> {
        let id = *self
            .indices
            .by_name
            .get(name)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;
        let entry = self
            .records
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;
        entry.touch(now_secs());
        Ok(&*entry)
    }

    /// Looks up the entry currently holding `url`. Does not record a view.
    pub fn find_by_url(&self, url: &str) -> Result<&Entry, StoreError> {
        self.indices
            .by_url
            .get(url)
            .and_then(|id| self.records.get(id))
            .ok_or_else(|| StoreError::NotFound(url.to_string()))
    }

    /// Collects the entries under each tag, in the order the tags are given.
    ///
    /// An entry listed under two requested tags appears twice and is viewed
    /// twice. Unknown tags contribute nothing.
    pub fn find_by_tags<S: AsRef<str>>(&mut self, tags: &[S]) -> Vec<Entry> {
        let mut hits = Vec::new();
        for tag in tags {
            if let Some(members) = self.indices.by_tag.get(tag.as_ref()) {
                hits.extend_from_slice(members);
            }
        }

        let now = now_secs();
        for id in &hits {
            if let Some(entry) = self.records.get_mut(id) {
                entry.touch(now);
            }
        }

        hits.iter()
            .filter_map(|id| self.records.get(id).cloned())
            .collect()
    }

    /// Removes the named entry from the collection and every index.
    pub fn delete(&mut self, name: &str) -> Result<Entry, StoreError> {
        let id = self
            .indices
            .by_name
            .remove(name)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;
        let entry = self
            .records
            .remove(&id)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;

        self.order.retain(|x| *x != id);
        unindex_tags(&mut self.indices.by_tag, entry.distinct_tags(), id);

        if self.indices.by_url.get(&entry.url) == Some(&id) {
            let fallback = self
                .order
                .iter()
                .rev()
                .find(|x| self.records.get(*x).is_some_and(|r| r.url == entry.url))
                .copied();
            match fallback {
                Some(other) => {
                    self.indices.by_url.insert(entry.url.clone(), other);
                }
                None => {
                    self.indices.by_url.remove(&entry.url);
                }
            }
        }

        Ok(entry)
    }

    pub fn rebuild_index(&mut self) {
        self.indices = Indices::build(&self.order, &self.records);
    }

    /// Returns true when the live indices equal a fresh rebuild.
    pub fn indices_consistent(&self) -> bool {
        self.indices == Indices::build(&self.order, &self.records)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Reads an entry by name without recording a view.
    pub fn get(&self, name: &str) -> Option<&Entry> {
        self.indices
            .by_name
            .get(name)
            .and_then(|id| self.records.get(id))
    }

    /// Reads the members of one tag without recording views.
    pub fn tag_members(&self, tag: &str) -> Vec<&Entry> {
        self.indices
            .by_tag
            .get(tag)
            .into_iter()
            .flat_map(|ids| ids.iter())
            .filter_map(|id| self.records.get(id))
            .collect()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.indices.by_tag.contains_key(tag)
    }

    pub fn tags(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self.indices.by_tag.keys().map(String::as_str).collect();
        out.sort_unstable();
        out
    }

    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.order.iter().filter_map(|id| self.records.get(id))
    }

    pub fn export_snapshot(&self) -> Vec<Entry> {
        self.entries().cloned().collect()
    }

    fn take_next_id(&mut self) -> EntryId {
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        id
    }
}
