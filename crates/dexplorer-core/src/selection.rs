//! Focused-entry state: detail loading and next/previous navigation.
//!
//! Like the view engine this is a synchronous state machine. Every fetch it
//! asks for carries a token; completions whose token is no longer current are
//! dropped, so closing or moving the selection discards late results.

use crate::category::{self, Category};
use crate::provider::ProviderError;
use crate::{Description, Detail, Direction, Entry, Stats};

/// A fetch the controller wants performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionRequest {
    /// Full entry by id, for navigation.
    Entry { token: u64, id: u32 },
    Description { token: u64, id: u32 },
    Stats { token: u64, id: u32 },
}

/// Presentation snapshot of the selection.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionSnapshot {
    pub selection: Option<Entry>,
    pub is_description_loading: bool,
    pub is_stats_loading: bool,
    /// A navigation fetch is outstanding.
    pub is_navigating: bool,
}

impl SelectionSnapshot {
    fn categories(&self) -> &[Category] {
        self.selection
            .as_ref()
            .map(|e| e.categories.as_slice())
            .unwrap_or_default()
    }

    pub fn description(&self) -> Option<&Description> {
        self.selection
            .as_ref()
            .and_then(|e| e.detail.as_ref())
            .and_then(|d| d.description.as_ref())
    }

    pub fn stats(&self) -> Option<&Stats> {
        self.selection
            .as_ref()
            .and_then(|e| e.detail.as_ref())
            .and_then(|d| d.stats.as_ref())
    }

    pub fn weaknesses(&self) -> Vec<Category> {
        category::weaknesses(self.categories())
    }

    pub fn strengths(&self) -> Vec<Category> {
        category::strengths(self.categories())
    }

    pub fn theme_color(&self) -> Option<(u8, u8, u8)> {
        self.selection
            .as_ref()
            .map(|e| category::theme_color(&e.categories))
    }
}

#[derive(Debug)]
pub struct SelectionController {
    max_id: u32,
    current: Option<Entry>,
    /// Tags detail fetches of `current`.
    detail_token: u64,
    /// Tags navigation fetches.
    nav_token: u64,
    description_loading: bool,
    stats_loading: bool,
    navigating: bool,
}

impl SelectionController {
    pub fn new(max_id: u32) -> Self {
        Self {
            max_id,
            current: None,
            detail_token: 0,
            nav_token: 0,
            description_loading: false,
            stats_loading: false,
            navigating: false,
        }
    }

    pub fn current(&self) -> Option<&Entry> {
        self.current.as_ref()
    }

    /// Focus `entry` and request whichever detail parts it lacks.
    pub fn open(&mut self, entry: Entry) -> Vec<SelectionRequest> {
        self.detail_token += 1;
        self.nav_token += 1;
        self.navigating = false;

        let id = entry.id;
        let detail = entry.detail.as_ref();
        let need_description = detail.is_none_or(|d| d.description.is_none());
        let need_stats = detail.is_none_or(|d| d.stats.is_none());
        self.current = Some(entry);
        self.description_loading = need_description;
        self.stats_loading = need_stats;

        let token = self.detail_token;
        let mut requests = Vec::with_capacity(2);
        if need_description {
            requests.push(SelectionRequest::Description { token, id });
        }
        if need_stats {
            requests.push(SelectionRequest::Stats { token, id });
        }
        tracing::debug!(id, requests = requests.len(), "selection opened");
        requests
    }

    /// Clear the selection. Outstanding results will be discarded.
    pub fn close(&mut self) {
        self.detail_token += 1;
        self.nav_token += 1;
        self.current = None;
        self.description_loading = false;
        self.stats_loading = false;
        self.navigating = false;
    }

    /// Ask for the neighbouring entry. `None` when nothing is selected or the
    /// neighbour is outside `[1, max_id]`.
    pub fn navigate(&mut self, direction: Direction) -> Option<SelectionRequest> {
        let current = self.current.as_ref()?.id;
        let next = match direction {
            Direction::Previous => current.checked_sub(1)?,
            Direction::Next => current.checked_add(1)?,
        };
        if !(1..=self.max_id).contains(&next) {
            tracing::debug!(current, next, "navigation out of range");
            return None;
        }
        self.nav_token += 1;
        self.navigating = true;
        Some(SelectionRequest::Entry {
            token: self.nav_token,
            id: next,
        })
    }

    /// Ask for an entry by id to open it, e.g. one not in the store yet.
    pub fn open_id(&mut self, id: u32) -> Option<SelectionRequest> {
        if !(1..=self.max_id).contains(&id) {
            tracing::debug!(id, "requested id out of range");
            return None;
        }
        self.nav_token += 1;
        self.navigating = true;
        Some(SelectionRequest::Entry {
            token: self.nav_token,
            id,
        })
    }

    /// Navigation result. On success the selection is replaced wholesale and
    /// its detail requested.
    pub fn on_entry_fetched(
        &mut self,
        token: u64,
        result: Result<Option<Entry>, ProviderError>,
    ) -> Vec<SelectionRequest> {
        if token != self.nav_token {
            return Vec::new();
        }
        self.navigating = false;
        match result {
            Ok(Some(entry)) => self.open(entry),
            Ok(None) => Vec::new(),
            Err(err) => {
                tracing::warn!(error = %err, "navigation fetch failed");
                Vec::new()
            }
        }
    }

    /// Returns the detail to merge into the store, if any.
    pub fn on_description_loaded(
        &mut self,
        token: u64,
        id: u32,
        result: Result<Description, ProviderError>,
    ) -> Option<(u32, Detail)> {
        if token != self.detail_token {
            return None;
        }
        self.description_loading = false;
        let description = match result {
            Ok(description) => description,
            Err(err) => {
                tracing::warn!(id, error = %err, "description fetch failed");
                return None;
            }
        };
        let detail = Detail {
            description: Some(description),
            stats: None,
        };
        self.absorb(detail.clone());
        Some((id, detail))
    }

    /// Returns the detail to merge into the store, if any.
    pub fn on_stats_loaded(
        &mut self,
        token: u64,
        id: u32,
        result: Result<Stats, ProviderError>,
    ) -> Option<(u32, Detail)> {
        if token != self.detail_token {
            return None;
        }
        self.stats_loading = false;
        let stats = match result {
            Ok(stats) => stats,
            Err(err) => {
                tracing::warn!(id, error = %err, "stats fetch failed");
                return None;
            }
        };
        let detail = Detail {
            description: None,
            stats: Some(stats),
        };
        self.absorb(detail.clone());
        Some((id, detail))
    }

    fn absorb(&mut self, detail: Detail) {
        if let Some(entry) = self.current.as_mut() {
            entry
                .detail
                .get_or_insert_with(Detail::default)
                .absorb(detail);
        }
    }

    pub fn snapshot(&self) -> SelectionSnapshot {
        SelectionSnapshot {
            selection: self.current.clone(),
            is_description_loading: self.description_loading,
            is_stats_loading: self.stats_loading,
            is_navigating: self.navigating,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: u32, categories: &[Category]) -> Entry {
        Entry::new(id, format!("entry-{id}"), categories.to_vec(), "https://a.test")
    }

    fn opened(id: u32, max_id: u32) -> (SelectionController, u64) {
        let mut sel = SelectionController::new(max_id);
        let requests = sel.open(entry(id, &[Category::Fire]));
        let token = match requests.first() {
            Some(SelectionRequest::Description { token, .. }) => *token,
            other => panic!("unexpected requests: {other:?}"),
        };
        (sel, token)
    }

    #[test]
    fn open_requests_both_parts_independently() {
        let mut sel = SelectionController::new(1025);
        let requests = sel.open(entry(4, &[Category::Fire]));
        assert_eq!(requests.len(), 2);
        assert!(matches!(requests[0], SelectionRequest::Description { id: 4, .. }));
        assert!(matches!(requests[1], SelectionRequest::Stats { id: 4, .. }));
        let snap = sel.snapshot();
        assert!(snap.is_description_loading && snap.is_stats_loading);
    }

    #[test]
    fn open_skips_parts_already_fetched() {
        let mut sel = SelectionController::new(1025);
        let mut e = entry(4, &[Category::Fire]);
        e.detail = Some(Detail {
            description: Some(Description::Unavailable),
            stats: None,
        });
        let requests = sel.open(e);
        assert_eq!(requests.len(), 1);
        assert!(matches!(requests[0], SelectionRequest::Stats { .. }));
        assert!(!sel.snapshot().is_description_loading);
    }

    #[test]
    fn parts_arrive_independently() {
        let (mut sel, token) = opened(4, 1025);
        let merged = sel.on_stats_loaded(
            token,
            4,
            Ok(Stats {
                speed: 65,
                ..Stats::default()
            }),
        );
        assert_eq!(merged.map(|(id, _)| id), Some(4));
        let snap = sel.snapshot();
        assert!(!snap.is_stats_loading);
        assert!(snap.is_description_loading);
        assert_eq!(snap.stats().map(|s| s.speed), Some(65));
        assert!(snap.description().is_none());
    }

    #[test]
    fn failed_part_clears_flag_and_keeps_selection() {
        let (mut sel, token) = opened(4, 1025);
        let merged =
            sel.on_description_loaded(token, 4, Err(ProviderError::Timeout { url: "x".into() }));
        assert!(merged.is_none());
        let snap = sel.snapshot();
        assert!(!snap.is_description_loading);
        assert_eq!(snap.selection.map(|e| e.id), Some(4));
    }

    #[test]
    fn late_results_after_close_are_dropped() {
        let (mut sel, token) = opened(4, 1025);
        sel.close();
        assert!(sel.on_description_loaded(token, 4, Ok(Description::Unavailable)).is_none());
        assert!(sel.snapshot().selection.is_none());
    }

    #[test]
    fn navigate_within_range() {
        let (mut sel, _) = opened(4, 1025);
        let request = sel.navigate(Direction::Next).unwrap();
        let SelectionRequest::Entry { token, id } = request else {
            panic!("expected an entry request, got {request:?}");
        };
        assert_eq!(id, 5);
        assert!(sel.snapshot().is_navigating);

        let follow_up = sel.on_entry_fetched(token, Ok(Some(entry(5, &[Category::Water]))));
        assert_eq!(follow_up.len(), 2);
        let snap = sel.snapshot();
        assert_eq!(snap.selection.as_ref().map(|e| e.id), Some(5));
        assert!(!snap.is_navigating);
    }

    #[test]
    fn navigate_at_boundaries_is_a_no_op() {
        let (mut sel, _) = opened(1, 1025);
        assert_eq!(sel.navigate(Direction::Previous), None);
        assert!(!sel.snapshot().is_navigating);

        let (mut sel, _) = opened(1025, 1025);
        assert_eq!(sel.navigate(Direction::Next), None);
        assert_eq!(sel.current().map(|e| e.id), Some(1025));
    }

    #[test]
    fn open_id_fetches_then_opens() {
        let mut sel = SelectionController::new(151);
        assert_eq!(sel.open_id(0), None);
        assert_eq!(sel.open_id(152), None);

        let Some(SelectionRequest::Entry { token, id }) = sel.open_id(151) else {
            panic!("expected an entry request");
        };
        assert_eq!(id, 151);
        let follow_up = sel.on_entry_fetched(token, Ok(Some(entry(151, &[Category::Psychic]))));
        assert_eq!(follow_up.len(), 2);
        assert_eq!(sel.current().map(|e| e.id), Some(151));
    }

    #[test]
    fn navigate_without_selection() {
        let mut sel = SelectionController::new(1025);
        assert_eq!(sel.navigate(Direction::Next), None);
    }

    #[test]
    fn superseded_navigation_is_dropped() {
        let (mut sel, _) = opened(4, 1025);
        let Some(SelectionRequest::Entry { token: first, .. }) = sel.navigate(Direction::Next)
        else {
            panic!("expected an entry request");
        };
        let Some(SelectionRequest::Entry { token: second, .. }) = sel.navigate(Direction::Previous)
        else {
            panic!("expected an entry request");
        };
        assert!(sel.on_entry_fetched(first, Ok(Some(entry(5, &[Category::Water])))).is_empty());
        assert_eq!(sel.current().map(|e| e.id), Some(4));
        sel.on_entry_fetched(second, Ok(Some(entry(3, &[Category::Grass]))));
        assert_eq!(sel.current().map(|e| e.id), Some(3));
    }

    #[test]
    fn failed_navigation_keeps_current() {
        let (mut sel, _) = opened(4, 1025);
        let Some(SelectionRequest::Entry { token, .. }) = sel.navigate(Direction::Next) else {
            panic!("expected an entry request");
        };
        let follow_up = sel.on_entry_fetched(token, Err(ProviderError::Transport("x".into())));
        assert!(follow_up.is_empty());
        assert_eq!(sel.current().map(|e| e.id), Some(4));
        assert!(!sel.snapshot().is_navigating);
    }

    #[test]
    fn snapshot_exposes_matchups_and_theme() {
        let mut sel = SelectionController::new(1025);
        sel.open(entry(6, &[Category::Fire, Category::Flying]));
        let snap = sel.snapshot();
        assert_eq!(
            snap.theme_color(),
            Some(category::mix_colors(
                Category::Fire.color(),
                Category::Flying.color()
            ))
        );
        let weak = snap.weaknesses();
        assert!(weak.contains(&Category::Rock));
        assert!(!weak.contains(&Category::Ground));
        assert!(!snap.strengths().is_empty());
    }
}
