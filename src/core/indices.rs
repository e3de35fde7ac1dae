use hashbrown::HashMap;

use crate::types::EntryId;

/// Unique string key to entry id.
pub type KeyIndex = HashMap<String, EntryId>;
/// Tag to member ids, in insertion order.
pub type TagIndex = HashMap<String, Vec<EntryId>>;

/// Registers `id` under each tag in `tags`. Callers pass distinct tags.
pub fn index_tags<'a>(index: &mut TagIndex, tags: impl IntoIterator<Item = &'a str>, id: EntryId) {
    for tag in tags {
        index.entry(tag.to_string()).or_default().push(id);
    }
}

/// Removes `id` from each tag in `tags`.
///
/// A tag whose only member is `id` is dropped entirely. Otherwise only `id` is
/// filtered out and the other members keep their relative order.
pub fn unindex_tags<'a>(index: &mut TagIndex, tags: impl IntoIterator<Item = &'a str>, id: EntryId) {
    for tag in tags {
        let Some(members) = index.get_mut(tag) else {
            continue;
        };
        if members.len() == 1 && members[0] == id {
            index.remove(tag);
            continue;
        }
        members.retain(|m| *m != id);
        if members.is_empty() {
            index.remove(tag);
        }
    }
}
