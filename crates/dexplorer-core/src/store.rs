use std::collections::BTreeMap;

use crate::{Detail, Entry};

/// What [`EntryStore::merge`] did with an incoming entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// First time this id was seen.
    Inserted,
    /// The id existed; new detail parts were added.
    Enriched,
    /// The id existed and nothing new arrived.
    Unchanged,
    /// The entry broke the record invariants and was dropped.
    Rejected,
}

/// Every entry fetched so far, keyed by identifier.
///
/// Grows monotonically: merging never removes an entry, never drops its
/// categories, and never discards detail parts that were already fetched.
#[derive(Debug, Default, Clone)]
pub struct EntryStore {
    entries: BTreeMap<u32, Entry>,
}

impl EntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&mut self, mut entry: Entry) -> MergeOutcome {
        if !entry.is_well_formed() {
            tracing::warn!(id = entry.id, name = %entry.name, "dropping malformed entry");
            return MergeOutcome::Rejected;
        }
        match self.entries.get_mut(&entry.id) {
            None => {
                self.entries.insert(entry.id, entry);
                MergeOutcome::Inserted
            }
            Some(existing) => match entry.detail.take() {
                Some(incoming) => {
                    let before = existing.detail.clone();
                    existing
                        .detail
                        .get_or_insert_with(Detail::default)
                        .absorb(incoming);
                    if existing.detail == before {
                        MergeOutcome::Unchanged
                    } else {
                        MergeOutcome::Enriched
                    }
                }
                None => MergeOutcome::Unchanged,
            },
        }
    }

    /// Merge a batch; returns how many ids were new.
    pub fn merge_all(&mut self, entries: impl IntoIterator<Item = Entry>) -> usize {
        let mut added = 0;
        for entry in entries {
            if self.merge(entry) == MergeOutcome::Inserted {
                added += 1;
            }
        }
        added
    }

    /// Attach detail parts to a resident entry. Returns `false` when the id is
    /// unknown.
    pub fn merge_detail(&mut self, id: u32, detail: Detail) -> bool {
        match self.entries.get_mut(&id) {
            Some(entry) => {
                entry
                    .detail
                    .get_or_insert_with(Detail::default)
                    .absorb(detail);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: u32) -> Option<&Entry> {
        self.entries.get(&id)
    }

    pub fn contains(&self, id: u32) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Category, Description, Stats};

    fn entry(id: u32, name: &str, categories: &[Category]) -> Entry {
        Entry::new(id, name, categories.to_vec(), "https://a.test")
    }

    #[test]
    fn insert_then_duplicate_is_unchanged() {
        let mut store = EntryStore::new();
        assert_eq!(
            store.merge(entry(1, "bulbasaur", &[Category::Grass, Category::Poison])),
            MergeOutcome::Inserted
        );
        assert_eq!(
            store.merge(entry(1, "bulbasaur", &[Category::Grass, Category::Poison])),
            MergeOutcome::Unchanged
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn malformed_entries_are_rejected() {
        let mut store = EntryStore::new();
        assert_eq!(store.merge(entry(0, "zero", &[Category::Normal])), MergeOutcome::Rejected);
        assert_eq!(store.merge(entry(2, "", &[Category::Normal])), MergeOutcome::Rejected);
        assert_eq!(store.merge(entry(3, "none", &[])), MergeOutcome::Rejected);
        assert!(store.is_empty());
    }

    #[test]
    fn merge_never_discards_existing_detail() {
        let mut store = EntryStore::new();
        let mut first = entry(4, "charmander", &[Category::Fire]);
        first.detail = Some(Detail {
            description: Some(Description::Text("Prefers hot places.".into())),
            stats: None,
        });
        store.merge(first);

        // A bare re-fetch of the same id keeps the description.
        store.merge(entry(4, "charmander", &[Category::Fire]));
        let kept = store.get(4).and_then(|e| e.detail.clone()).unwrap();
        assert!(kept.description.is_some());

        let mut with_stats = entry(4, "charmander", &[Category::Fire]);
        with_stats.detail = Some(Detail {
            description: Some(Description::Unavailable),
            stats: Some(Stats {
                health: 39,
                ..Stats::default()
            }),
        });
        assert_eq!(store.merge(with_stats), MergeOutcome::Enriched);
        let detail = store.get(4).and_then(|e| e.detail.clone()).unwrap();
        assert_eq!(
            detail.description,
            Some(Description::Text("Prefers hot places.".into()))
        );
        assert_eq!(detail.stats.map(|s| s.health), Some(39));
    }

    #[test]
    fn merge_all_counts_new_ids_only() {
        let mut store = EntryStore::new();
        store.merge(entry(1, "a", &[Category::Bug]));
        let added = store.merge_all(vec![
            entry(1, "a", &[Category::Bug]),
            entry(2, "b", &[Category::Bug]),
            entry(3, "c", &[Category::Bug]),
        ]);
        assert_eq!(added, 2);
        assert_eq!(store.iter().map(|e| e.id).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn merge_detail_on_unknown_id() {
        let mut store = EntryStore::new();
        assert!(!store.merge_detail(9, Detail::default()));
        store.merge(entry(9, "blastoise", &[Category::Water]));
        assert!(store.merge_detail(
            9,
            Detail {
                description: Some(Description::Unavailable),
                stats: None,
            }
        ));
        assert!(store.get(9).unwrap().detail.is_some());
    }
}
