//! Pure filter and sort predicates over the entry store.

use std::collections::BTreeSet;

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::store::EntryStore;
use crate::{Category, Entry, SortMode};

/// The user-controlled predicate over the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpec {
    pub text: String,
    pub categories: BTreeSet<Category>,
    pub sort: SortMode,
}

impl FilterSpec {
    /// Whether any narrowing predicate is set. Sorting alone does not count.
    pub fn is_active(&self) -> bool {
        !self.text.trim().is_empty() || !self.categories.is_empty()
    }

    pub fn matches(&self, entry: &Entry) -> bool {
        matches_text(entry, &self.text) && matches_categories(entry, &self.categories)
    }
}

/// `text` is a case-insensitive substring of the name, or a substring of the
/// decimal id. Whitespace-only text matches everything; otherwise the text is
/// used as typed, surrounding spaces included.
pub fn matches_text(entry: &Entry, text: &str) -> bool {
    if text.trim().is_empty() {
        return true;
    }
    let needle = text.to_lowercase();
    entry.name.to_lowercase().contains(&needle) || entry.id.to_string().contains(&needle)
}

/// Exact set equality between the entry's categories and `selected`. An empty
/// selection matches everything.
pub fn matches_categories(entry: &Entry, selected: &BTreeSet<Category>) -> bool {
    if selected.is_empty() {
        return true;
    }
    let own: BTreeSet<Category> = entry.categories.iter().copied().collect();
    own == *selected
}

/// Diacritic-folded, lower-cased sort key for names.
pub fn collation_key(name: &str) -> String {
    name.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

pub fn sort_entries(entries: &mut [&Entry], mode: SortMode) {
    match mode {
        SortMode::ByIdentifier => entries.sort_by_key(|e| e.id),
        SortMode::ByName => entries.sort_by_cached_key(|e| (collation_key(&e.name), e.id)),
    }
}

/// Every store entry passing `spec`, in `spec.sort` order.
pub fn apply_filters<'a>(store: &'a EntryStore, spec: &FilterSpec) -> Vec<&'a Entry> {
    let mut out: Vec<&Entry> = store.iter().filter(|e| spec.matches(e)).collect();
    sort_entries(&mut out, spec.sort);
    out
}

/// Ids of `entries` in order, for comparisons that do not need the records.
pub fn ids(entries: &[&Entry]) -> Vec<u32> {
    entries.iter().map(|e| e.id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: u32, name: &str, categories: &[Category]) -> Entry {
        Entry::new(id, name, categories.to_vec(), "https://a.test")
    }

    fn store(entries: Vec<Entry>) -> EntryStore {
        let mut store = EntryStore::new();
        store.merge_all(entries);
        store
    }

    fn spec(text: &str, categories: &[Category], sort: SortMode) -> FilterSpec {
        FilterSpec {
            text: text.to_string(),
            categories: categories.iter().copied().collect(),
            sort,
        }
    }

    #[test]
    fn text_matches_name_case_insensitively() {
        let e = entry(25, "Pikachu", &[Category::Electric]);
        assert!(matches_text(&e, "pika"));
        assert!(matches_text(&e, "CHU"));
        assert!(!matches_text(&e, "raichu"));
    }

    #[test]
    fn text_matches_id_digits() {
        let e = entry(150, "mewtwo", &[Category::Psychic]);
        assert!(matches_text(&e, "15"));
        assert!(matches_text(&e, "50"));
        assert!(!matches_text(&e, "151"));
    }

    #[test]
    fn surrounding_spaces_are_part_of_the_needle() {
        let e = entry(25, "pikachu", &[Category::Electric]);
        assert!(!matches_text(&e, " 25"));
        assert!(!matches_text(&e, "pika "));
        assert!(matches_text(&e, "25"));
    }

    #[test]
    fn blank_text_matches_all() {
        let e = entry(1, "bulbasaur", &[Category::Grass]);
        assert!(matches_text(&e, ""));
        assert!(matches_text(&e, "   "));
    }

    #[test]
    fn category_match_is_exact_both_ways() {
        let fire = entry(4, "charmander", &[Category::Fire]);
        let fire_flying = entry(6, "charizard", &[Category::Fire, Category::Flying]);

        let only_fire: BTreeSet<_> = [Category::Fire].into();
        assert!(matches_categories(&fire, &only_fire));
        assert!(!matches_categories(&fire_flying, &only_fire));

        let both: BTreeSet<_> = [Category::Flying, Category::Fire].into();
        assert!(!matches_categories(&fire, &both));
        assert!(matches_categories(&fire_flying, &both));
    }

    #[test]
    fn sort_by_identifier() {
        let s = store(vec![
            entry(5, "e", &[Category::Bug]),
            entry(1, "a", &[Category::Bug]),
            entry(3, "c", &[Category::Bug]),
        ]);
        let out = apply_filters(&s, &spec("", &[], SortMode::ByIdentifier));
        assert_eq!(ids(&out), vec![1, 3, 5]);
    }

    #[test]
    fn sort_by_name() {
        let s = store(vec![
            entry(16, "Pidgey", &[Category::Normal, Category::Flying]),
            entry(63, "Abra", &[Category::Psychic]),
        ]);
        let out = apply_filters(&s, &spec("", &[], SortMode::ByName));
        let names: Vec<&str> = out.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Abra", "Pidgey"]);
    }

    #[test]
    fn name_sort_folds_diacritics_and_breaks_ties_by_id() {
        let s = store(vec![
            entry(3, "flabébé", &[Category::Fairy]),
            entry(2, "Flabebe", &[Category::Fairy]),
            entry(1, "flaaffy", &[Category::Electric]),
        ]);
        let out = apply_filters(&s, &spec("", &[], SortMode::ByName));
        assert_eq!(ids(&out), vec![1, 2, 3]);
    }

    #[test]
    fn collation_key_strips_marks() {
        assert_eq!(collation_key("Flabébé"), "flabebe");
        assert_eq!(collation_key("NIDORAN"), "nidoran");
    }

    #[test]
    fn filtering_is_idempotent() {
        let s = store(vec![
            entry(1, "bulbasaur", &[Category::Grass, Category::Poison]),
            entry(2, "ivysaur", &[Category::Grass, Category::Poison]),
            entry(43, "oddish", &[Category::Grass, Category::Poison]),
            entry(4, "charmander", &[Category::Fire]),
        ]);
        let f = spec("saur", &[Category::Poison, Category::Grass], SortMode::ByName);
        let once = apply_filters(&s, &f);
        let twice: Vec<&Entry> = once.iter().copied().filter(|e| f.matches(e)).collect();
        assert_eq!(ids(&once), ids(&twice));
        assert_eq!(ids(&once), vec![1, 2]);
    }

    #[test]
    fn sorting_alone_is_not_an_active_filter() {
        assert!(!spec("", &[], SortMode::ByName).is_active());
        assert!(!spec("  ", &[], SortMode::ByIdentifier).is_active());
        assert!(spec("a", &[], SortMode::ByIdentifier).is_active());
        assert!(spec("", &[Category::Ice], SortMode::ByIdentifier).is_active());
    }
}
