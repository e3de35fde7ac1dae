//! Entry record and creation payload.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{UnixSecs, ViewCount, now_secs};

/// A named, URL-addressed record with usage metadata.
///
/// `name` and `created` never change once the entry exists. `accessed` and
/// `views` move forward on every view-counting lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Unique key.
    #[serde(alias = "Name")]
    pub name: String,
    /// Secondary key, not required to be unique.
    #[serde(alias = "URL")]
    pub url: String,
    /// Labels in insertion order.
    #[serde(alias = "Tags", default)]
    pub tags: Vec<String>,
    /// Creation time in Unix seconds.
    #[serde(alias = "Created", default)]
    pub created: UnixSecs,
    /// Last view-counting lookup in Unix seconds, `0` if never viewed.
    #[serde(alias = "Accessed", default)]
    pub accessed: UnixSecs,
    /// Number of view-counting lookups.
    #[serde(alias = "Views", default)]
    pub views: ViewCount,
}

impl Entry {
    /// Creates a fresh entry stamped with the current time and zero views.
    pub fn new(name: impl Into<String>, url: impl Into<String>, tags: Vec<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            tags,
            created: now_secs(),
            accessed: 0,
            views: 0,
        }
    }

    /// Records one view at `now`.
    pub fn touch(&mut self, now: UnixSecs) {
        self.views = self.views.saturating_add(1);
        self.accessed = now;
    }

    /// Iterates the entry's tags with repeats removed, keeping first occurrence order.
    pub fn distinct_tags(&self) -> impl Iterator<Item = &str> {
        self.tags
            .iter()
            .enumerate()
            .filter(|(i, t)| !self.tags[..*i].contains(t))
            .map(|(_, t)| t.as_str())
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {} | {} | Views: {}",
            self.name,
            self.url,
            self.tags.join(","),
            self.views
        )
    }
}

/// Fields a caller supplies to create an [`Entry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryDraft {
    /// Unique key.
    pub name: String,
    /// Target URL.
    pub url: String,
    /// Labels; must contain at least one.
    pub tags: Vec<String>,
}

/// A draft field that was left empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("missing param {0}")]
pub struct MissingField(pub &'static str);

impl EntryDraft {
    /// Builds a draft from raw form values, splitting `tags` on commas.
    pub fn from_parts(name: &str, url: &str, tags: &str) -> Result<Self, MissingField> {
        let draft = Self {
            name: name.trim().to_string(),
            url: url.trim().to_string(),
            tags: split_tags(tags),
        };
        draft.validate()?;
        Ok(draft)
    }

    /// Rejects drafts with an empty name, URL or tag list.
    pub fn validate(&self) -> Result<(), MissingField> {
        if self.name.is_empty() {
            return Err(MissingField("name"));
        }
        if self.url.is_empty() {
            return Err(MissingField("url"));
        }
        if self.tags.is_empty() {
            return Err(MissingField("tags"));
        }
        Ok(())
    }

    /// Stamps the draft into a new [`Entry`].
    pub fn into_entry(self) -> Entry {
        Entry::new(self.name, self.url, self.tags)
    }
}

/// Splits a comma-separated tag list, trimming whitespace and dropping empty pieces.
pub fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}
