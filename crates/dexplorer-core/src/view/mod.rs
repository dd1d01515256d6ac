//! Visible-list state machine.
//!
//! [`ViewEngine`] is synchronous: user events and fetch completions are method
//! calls, and any fetch the engine wants is returned to the caller as a
//! [`FetchRequest`]. Page fetches carry the generation current at issue time;
//! completions from an older generation are merged into the store but never
//! reach the visible list.

pub mod filter;


use std::collections::{BTreeSet, HashSet};
use std::time::Duration;

use tokio::time::Instant;

use crate::provider::ProviderError;
use crate::store::EntryStore;
use crate::{Category, Config, Detail, Entry, SortMode};

pub use filter::FilterSpec;

/// Most categories a selection may hold.
pub const MAX_SELECTED_CATEGORIES: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ViewError {
    #[error("entries can only have up to two categories")]
    TooManyCategories,
}

/// Coarse state of the visible list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewPhase {
    Idle,
    InitialLoading,
    PageLoading,
    FilterApplied,
    Exhausted,
}

impl ViewPhase {
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::InitialLoading => "loading",
            Self::PageLoading => "loading more",
            Self::FilterApplied => "filtered",
            Self::Exhausted => "end of list",
        }
    }
}

/// One incremental page fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub id: u64,
    pub generation: u64,
    pub offset: usize,
    pub limit: usize,
}

/// A fetch the engine wants performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchRequest {
    FullIndex,
    Page(PageRequest),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    NotMounted,
    FilterActive,
    InFlight,
    Exhausted,
}

/// Result of a load-more request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMore {
    /// Entries appended straight from the loaded index.
    Appended(usize),
    /// A page fetch must be performed.
    Fetching(PageRequest),
    Suppressed(SuppressReason),
}

/// What a page completion did to the visible list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    Applied { added: usize },
    /// Merged into the store only.
    Stale,
    Failed,
}

/// Scroll geometry at the time of a scroll event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollPosition {
    /// Top edge of the end-of-list sentinel, relative to the viewport top.
    pub sentinel_top: f64,
    pub viewport_height: f64,
}

impl ScrollPosition {
    /// The sentinel is within one viewport height of the viewport bottom.
    pub fn near_end(&self) -> bool {
        self.sentinel_top - self.viewport_height <= 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IndexState {
    NotRequested,
    Pending,
    Loaded,
    Failed,
}

/// Presentation snapshot of the visible list.
#[derive(Debug, Clone, PartialEq)]
pub struct ListSnapshot {
    pub entries: Vec<Entry>,
    pub is_loading: bool,
    pub is_exhausted: bool,
    pub phase: ViewPhase,
}

pub struct ViewEngine {
    store: EntryStore,
    filter: FilterSpec,
    visible: Vec<u32>,
    cursor: usize,
    generation: u64,
    next_request: u64,
    in_flight: Option<PageRequest>,
    index: IndexState,
    /// A fallback page came back short.
    pages_exhausted: bool,
    mounted: bool,
    max_id: u32,
    page_size: usize,
    first_page_size: usize,
    page_ceiling: usize,
    debounce: Duration,
    scroll_deadline: Option<Instant>,
}

impl ViewEngine {
    pub fn new(config: &Config) -> Self {
        Self {
            store: EntryStore::new(),
            filter: FilterSpec::default(),
            visible: Vec::new(),
            cursor: 0,
            generation: 0,
            next_request: 0,
            in_flight: None,
            index: IndexState::NotRequested,
            pages_exhausted: false,
            mounted: false,
            max_id: config.max_id,
            page_size: config.page_size.max(1),
            first_page_size: config.first_page_size.max(1),
            page_ceiling: config.page_ceiling(),
            debounce: config.scroll_debounce(),
            scroll_deadline: None,
        }
    }

    // ── Accessors ──────────────────────────────────────────────────────

    pub fn store(&self) -> &EntryStore {
        &self.store
    }

    pub fn filter(&self) -> &FilterSpec {
        &self.filter
    }

    pub fn visible_ids(&self) -> &[u32] {
        &self.visible
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn in_flight(&self) -> Option<PageRequest> {
        self.in_flight
    }

    pub fn index_loaded(&self) -> bool {
        self.index == IndexState::Loaded
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some() || (self.index == IndexState::Pending && self.visible.is_empty())
    }

    /// No further unfiltered entries can be shown.
    pub fn is_exhausted(&self) -> bool {
        if self.cursor >= self.page_ceiling {
            return true;
        }
        match self.index {
            IndexState::Loaded => self.cursor * self.page_size >= self.store.len(),
            _ => self.pages_exhausted,
        }
    }

    pub fn phase(&self) -> ViewPhase {
        if !self.mounted {
            ViewPhase::Idle
        } else if self.filter.is_active() {
            ViewPhase::FilterApplied
        } else if self.is_loading() {
            if self.visible.is_empty() {
                ViewPhase::InitialLoading
            } else {
                ViewPhase::PageLoading
            }
        } else if self.is_exhausted() {
            ViewPhase::Exhausted
        } else {
            ViewPhase::Idle
        }
    }

    pub fn snapshot(&self) -> ListSnapshot {
        ListSnapshot {
            entries: self
                .visible
                .iter()
                .filter_map(|id| self.store.get(*id).cloned())
                .collect(),
            is_loading: self.is_loading(),
            is_exhausted: self.is_exhausted(),
            phase: self.phase(),
        }
    }

    // ── Mount and data arrival ─────────────────────────────────────────

    /// Request the first page and the full index. A second call is a no-op.
    pub fn mount(&mut self) -> Vec<FetchRequest> {
        if self.mounted {
            return Vec::new();
        }
        self.mounted = true;
        self.index = IndexState::Pending;
        let first = self.issue_page(0, self.first_page_size);
        tracing::debug!(generation = self.generation, "view mounted");
        vec![FetchRequest::Page(first), FetchRequest::FullIndex]
    }

    /// Ask for the full index again after a failure.
    pub fn request_index_reload(&mut self) -> Option<FetchRequest> {
        match self.index {
            IndexState::Failed | IndexState::NotRequested if self.mounted => {
                self.index = IndexState::Pending;
                Some(FetchRequest::FullIndex)
            }
            _ => None,
        }
    }

    pub fn on_index_loaded(&mut self, result: Result<Vec<Entry>, ProviderError>) {
        match result {
            Ok(entries) => {
                let added = self.store.merge_all(self.in_range(entries));
                self.index = IndexState::Loaded;
                // The index supersedes any fallback page still outstanding.
                self.in_flight = None;
                if self.filter.is_active() {
                    self.refilter();
                } else {
                    self.cursor = self.cursor.max(1);
                    let shown = self.cursor * self.page_size;
                    self.visible = self.sorted_index().into_iter().take(shown).collect();
                }
                tracing::info!(
                    added,
                    total = self.store.len(),
                    visible = self.visible.len(),
                    "index merged"
                );
            }
            Err(err) => {
                self.index = IndexState::Failed;
                tracing::warn!(error = %err, "full index unavailable, paging incrementally");
            }
        }
    }

    pub fn on_page_loaded(
        &mut self,
        request: PageRequest,
        result: Result<Vec<Entry>, ProviderError>,
    ) -> PageOutcome {
        if self.in_flight.is_some_and(|r| r.id == request.id) {
            self.in_flight = None;
        }
        let entries = match result {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(
                    offset = request.offset,
                    limit = request.limit,
                    error = %err,
                    "page fetch failed"
                );
                return PageOutcome::Failed;
            }
        };

        let returned = entries.len();
        let entries = self.in_range(entries);
        let ids: Vec<u32> = entries.iter().map(|e| e.id).collect();
        self.store.merge_all(entries);

        if request.generation != self.generation
            || self.index == IndexState::Loaded
            || self.filter.is_active()
        {
            tracing::debug!(
                request_generation = request.generation,
                generation = self.generation,
                "discarding stale page"
            );
            return PageOutcome::Stale;
        }

        let mut seen: HashSet<u32> = self.visible.iter().copied().collect();
        let mut added = 0;
        for id in ids {
            if self.store.contains(id) && seen.insert(id) {
                self.visible.push(id);
                added += 1;
            }
        }
        if self.filter.sort != SortMode::ByIdentifier {
            self.sort_visible();
        }
        self.cursor = self
            .cursor
            .max((request.offset + returned) / self.page_size);
        if returned < request.limit || request.offset + returned >= self.max_id as usize {
            self.pages_exhausted = true;
        }
        PageOutcome::Applied { added }
    }

    /// Attach fetched detail to a resident entry.
    pub fn merge_detail(&mut self, id: u32, detail: Detail) -> bool {
        self.store.merge_detail(id, detail)
    }

    // ── User events ────────────────────────────────────────────────────

    pub fn on_filter_text_change(&mut self, text: &str) -> Option<FetchRequest> {
        if self.filter.text == text {
            return None;
        }
        self.filter.text = text.to_string();
        self.reset()
    }

    /// Replace the category selection. More than two categories is rejected
    /// and leaves state unchanged.
    pub fn on_categories_change(
        &mut self,
        categories: &[Category],
    ) -> Result<Option<FetchRequest>, ViewError> {
        let selected: BTreeSet<Category> = categories.iter().copied().collect();
        if selected.len() > MAX_SELECTED_CATEGORIES {
            return Err(ViewError::TooManyCategories);
        }
        if selected == self.filter.categories {
            return Ok(None);
        }
        self.filter.categories = selected;
        Ok(self.reset())
    }

    /// Add `category` if absent, remove it if present.
    pub fn toggle_category(
        &mut self,
        category: Category,
    ) -> Result<Option<FetchRequest>, ViewError> {
        let mut next: Vec<Category> = self.filter.categories.iter().copied().collect();
        match next.iter().position(|c| *c == category) {
            Some(pos) => {
                next.remove(pos);
            }
            None => next.push(category),
        }
        self.on_categories_change(&next)
    }

    pub fn on_sort_mode_change(&mut self, mode: SortMode) -> Option<FetchRequest> {
        if self.filter.sort == mode {
            return None;
        }
        self.filter.sort = mode;
        self.reset()
    }

    pub fn on_load_more_requested(&mut self) -> LoadMore {
        if !self.mounted {
            return LoadMore::Suppressed(SuppressReason::NotMounted);
        }
        if self.filter.is_active() {
            return LoadMore::Suppressed(SuppressReason::FilterActive);
        }
        if self.in_flight.is_some() {
            return LoadMore::Suppressed(SuppressReason::InFlight);
        }
        if self.is_exhausted() {
            return LoadMore::Suppressed(SuppressReason::Exhausted);
        }

        if self.index == IndexState::Loaded {
            let start = self.cursor * self.page_size;
            let mut seen: HashSet<u32> = self.visible.iter().copied().collect();
            let slice: Vec<u32> = self
                .sorted_index()
                .into_iter()
                .skip(start)
                .take(self.page_size)
                .filter(|id| seen.insert(*id))
                .collect();
            let added = slice.len();
            self.visible.extend(slice);
            self.cursor += 1;
            LoadMore::Appended(added)
        } else {
            let offset = self.cursor * self.page_size;
            LoadMore::Fetching(self.issue_page(offset, self.page_size))
        }
    }

    /// Record a scroll event. Only events near the end arm (or re-arm) the
    /// debounce timer; scrolling away afterwards leaves it armed. The request
    /// itself is made by [`poll_scroll`].
    ///
    /// [`poll_scroll`]: ViewEngine::poll_scroll
    pub fn on_scroll(&mut self, position: ScrollPosition, now: Instant) {
        if !self.mounted || self.filter.is_active() || self.in_flight.is_some() {
            return;
        }
        if position.near_end() {
            self.scroll_deadline = Some(now + self.debounce);
        }
    }

    /// Load more once the debounce window has passed.
    pub fn poll_scroll(&mut self, now: Instant) -> Option<LoadMore> {
        let deadline = self.scroll_deadline?;
        if now < deadline {
            return None;
        }
        self.scroll_deadline = None;
        Some(self.on_load_more_requested())
    }

    pub fn scroll_deadline(&self) -> Option<Instant> {
        self.scroll_deadline
    }

    // ── Internals ──────────────────────────────────────────────────────

    /// Fallback pages never reach past `max_id`; the provider index continues
    /// with ids outside the catalog range.
    fn issue_page(&mut self, offset: usize, size: usize) -> PageRequest {
        let limit = size.min((self.max_id as usize).saturating_sub(offset));
        self.next_request += 1;
        let request = PageRequest {
            id: self.next_request,
            generation: self.generation,
            offset,
            limit,
        };
        self.in_flight = Some(request);
        request
    }

    fn in_range(&self, entries: Vec<Entry>) -> Vec<Entry> {
        let max_id = self.max_id;
        entries
            .into_iter()
            .filter(|e| {
                let keep = e.id <= max_id;
                if !keep {
                    tracing::debug!(id = e.id, max_id, "dropping out-of-range entry");
                }
                keep
            })
            .collect()
    }

    /// Every store entry in the current sort order, ignoring text and
    /// category predicates.
    fn sorted_index(&self) -> Vec<u32> {
        let unfiltered = FilterSpec {
            sort: self.filter.sort,
            ..FilterSpec::default()
        };
        filter::ids(&filter::apply_filters(&self.store, &unfiltered))
    }

    fn refilter(&mut self) {
        self.visible = filter::ids(&filter::apply_filters(&self.store, &self.filter));
    }

    fn sort_visible(&mut self) {
        let mut entries: Vec<&Entry> = self
            .visible
            .iter()
            .filter_map(|id| self.store.get(*id))
            .collect();
        filter::sort_entries(&mut entries, self.filter.sort);
        self.visible = filter::ids(&entries);
    }

    fn reset(&mut self) -> Option<FetchRequest> {
        self.generation += 1;
        self.cursor = 0;
        self.visible.clear();
        self.pages_exhausted = false;
        self.scroll_deadline = None;

        if self.filter.is_active() {
            self.refilter();
            tracing::debug!(
                generation = self.generation,
                matches = self.visible.len(),
                "filter applied"
            );
            return None;
        }
        if self.index == IndexState::Loaded {
            self.cursor = 1;
            self.visible = self
                .sorted_index()
                .into_iter()
                .take(self.page_size)
                .collect();
            return None;
        }
        if !self.mounted {
            return None;
        }
        Some(FetchRequest::Page(self.issue_page(0, self.page_size)))
    }
}
