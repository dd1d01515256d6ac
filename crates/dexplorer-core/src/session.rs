//! Async driver for the view and selection state machines.
//!
//! The session owns both state machines. Fetch requests they return are run
//! on spawned tokio tasks; completions come back over one mpsc channel and are
//! applied by whoever owns the session, so state is only ever mutated there.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::client::CatalogClient;
use crate::provider::ProviderError;
use crate::selection::{SelectionController, SelectionRequest, SelectionSnapshot};
use crate::store::EntryStore;
use crate::view::{
    FetchRequest, ListSnapshot, LoadMore, PageRequest, ScrollPosition, ViewEngine, ViewError,
};
use crate::{Category, Config, Description, Direction, Entry, SortMode, Stats};

/// A finished fetch, routed back to the state machine that asked for it.
#[derive(Debug)]
enum Completion {
    Index(Result<Vec<Entry>, ProviderError>),
    Page(PageRequest, Result<Vec<Entry>, ProviderError>),
    Entry {
        token: u64,
        result: Result<Option<Entry>, ProviderError>,
    },
    Description {
        token: u64,
        id: u32,
        result: Result<Description, ProviderError>,
    },
    Stats {
        token: u64,
        id: u32,
        result: Result<Stats, ProviderError>,
    },
}

pub struct Session {
    client: Arc<CatalogClient>,
    view: ViewEngine,
    selection: SelectionController,
    tx: mpsc::UnboundedSender<Completion>,
    rx: mpsc::UnboundedReceiver<Completion>,
    cancel: CancellationToken,
    outstanding: usize,
}

impl Session {
    pub fn new(client: Arc<CatalogClient>, config: &Config) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            selection: SelectionController::new(client.max_id()),
            view: ViewEngine::new(config),
            client,
            tx,
            rx,
            cancel: CancellationToken::new(),
            outstanding: 0,
        }
    }

    // ── Event sink ─────────────────────────────────────────────────────

    pub fn mount(&mut self) {
        for request in self.view.mount() {
            self.dispatch(request);
        }
    }

    pub fn on_filter_text_change(&mut self, text: &str) {
        if let Some(request) = self.view.on_filter_text_change(text) {
            self.dispatch(request);
        }
    }

    pub fn on_categories_change(&mut self, categories: &[Category]) -> Result<(), ViewError> {
        if let Some(request) = self.view.on_categories_change(categories)? {
            self.dispatch(request);
        }
        Ok(())
    }

    pub fn toggle_category(&mut self, category: Category) -> Result<(), ViewError> {
        if let Some(request) = self.view.toggle_category(category)? {
            self.dispatch(request);
        }
        Ok(())
    }

    pub fn on_sort_mode_change(&mut self, mode: SortMode) {
        if let Some(request) = self.view.on_sort_mode_change(mode) {
            self.dispatch(request);
        }
    }

    pub fn on_load_more_requested(&mut self) -> LoadMore {
        let outcome = self.view.on_load_more_requested();
        if let LoadMore::Fetching(page) = outcome {
            self.dispatch(FetchRequest::Page(page));
        }
        outcome
    }

    pub fn on_scroll(&mut self, position: ScrollPosition) {
        self.view.on_scroll(position, Instant::now());
    }

    pub fn retry_index(&mut self) {
        if let Some(request) = self.view.request_index_reload() {
            self.dispatch(request);
        }
    }

    /// Focus a resident entry. Returns `false` when the id is not in the store.
    pub fn on_entry_selected(&mut self, id: u32) -> bool {
        let Some(entry) = self.view.store().get(id).cloned() else {
            return false;
        };
        for request in self.selection.open(entry) {
            self.dispatch_selection(request);
        }
        true
    }

    /// Fetch an entry by id and focus it once it arrives.
    pub fn open_by_id(&mut self, id: u32) {
        if let Some(request) = self.selection.open_id(id) {
            self.dispatch_selection(request);
        }
    }

    pub fn on_selection_closed(&mut self) {
        self.selection.close();
    }

    pub fn on_navigate(&mut self, direction: Direction) {
        if let Some(request) = self.selection.navigate(direction) {
            self.dispatch_selection(request);
        }
    }

    // ── Presentation ───────────────────────────────────────────────────

    pub fn list(&self) -> ListSnapshot {
        self.view.snapshot()
    }

    pub fn selection(&self) -> SelectionSnapshot {
        self.selection.snapshot()
    }

    pub fn view(&self) -> &ViewEngine {
        &self.view
    }

    pub fn store(&self) -> &EntryStore {
        self.view.store()
    }

    /// Fetches spawned but not yet applied.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    // ── Driving ────────────────────────────────────────────────────────

    /// Wait for the next completion (or debounce deadline) and apply it.
    /// Returns `false` once there is nothing left to wait for, or after
    /// shutdown.
    pub async fn next_completion(&mut self) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        let deadline = self.view.scroll_deadline();
        if self.outstanding == 0 && deadline.is_none() {
            return false;
        }
        let sleep_until = deadline.unwrap_or_else(Instant::now);

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            Some(completion) = self.rx.recv(), if self.outstanding > 0 => {
                self.outstanding -= 1;
                self.apply(completion);
                true
            }
            _ = tokio::time::sleep_until(sleep_until), if deadline.is_some() => {
                if let Some(LoadMore::Fetching(page)) = self.view.poll_scroll(Instant::now()) {
                    self.dispatch(FetchRequest::Page(page));
                }
                true
            }
        }
    }

    /// Apply completions until nothing is outstanding.
    pub async fn settle(&mut self) {
        while self.next_completion().await {}
    }

    /// Cancel every outstanding fetch. Later completions are never applied.
    pub fn shutdown(&mut self) {
        self.cancel.cancel();
        self.outstanding = 0;
    }

    // ── Internals ──────────────────────────────────────────────────────

    fn dispatch(&mut self, request: FetchRequest) {
        let client = Arc::clone(&self.client);
        match request {
            FetchRequest::FullIndex => {
                self.spawn(async move { Completion::Index(client.list_all().await) });
            }
            FetchRequest::Page(page) => {
                self.spawn(async move {
                    let result = client.list_page(page.offset, page.limit).await;
                    Completion::Page(page, result)
                });
            }
        }
    }

    fn dispatch_selection(&mut self, request: SelectionRequest) {
        let client = Arc::clone(&self.client);
        match request {
            SelectionRequest::Entry { token, id } => self.spawn(async move {
                Completion::Entry {
                    token,
                    result: client.fetch_by_id(id).await,
                }
            }),
            SelectionRequest::Description { token, id } => self.spawn(async move {
                Completion::Description {
                    token,
                    id,
                    result: client.fetch_description(id).await,
                }
            }),
            SelectionRequest::Stats { token, id } => self.spawn(async move {
                Completion::Stats {
                    token,
                    id,
                    result: client.fetch_stats(id).await,
                }
            }),
        }
    }

    fn spawn<F>(&mut self, fetch: F)
    where
        F: Future<Output = Completion> + Send + 'static,
    {
        let tx = self.tx.clone();
        let cancel = self.cancel.clone();
        self.outstanding += 1;
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                completion = fetch => {
                    let _ = tx.send(completion);
                }
            }
        });
    }

    fn apply(&mut self, completion: Completion) {
        match completion {
            Completion::Index(result) => self.view.on_index_loaded(result),
            Completion::Page(page, result) => {
                self.view.on_page_loaded(page, result);
            }
            Completion::Entry { token, result } => {
                for request in self.selection.on_entry_fetched(token, result) {
                    self.dispatch_selection(request);
                }
            }
            Completion::Description { token, id, result } => {
                let loaded = self.selection.on_description_loaded(token, id, result);
                if let Some((id, detail)) = loaded {
                    self.view.merge_detail(id, detail);
                }
            }
            Completion::Stats { token, id, result } => {
                if let Some((id, detail)) = self.selection.on_stats_loaded(token, id, result) {
                    self.view.merge_detail(id, detail);
                }
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::provider::mock::MockProvider;
    use crate::view::ViewPhase;

    fn session(mock: MockProvider, max_id: u32) -> (Session, Arc<MockProvider>) {
        let mock = Arc::new(mock);
        let config = Config {
            max_id,
            ..Config::default()
        };
        let client = Arc::new(CatalogClient::new(mock.clone(), &config));
        (Session::new(client, &config), mock)
    }

    #[tokio::test(start_paused = true)]
    async fn mount_and_settle_loads_everything() {
        let (mut s, mock) = session(MockProvider::generated(35), 35);
        s.mount();
        assert_eq!(s.list().phase, ViewPhase::InitialLoading);
        s.settle().await;

        let list = s.list();
        assert_eq!(list.entries.len(), 10);
        assert!(!list.is_loading);
        assert_eq!(s.store().len(), 35);
        assert_eq!(mock.index_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_to_wait_for_before_mount() {
        let (mut s, _) = session(MockProvider::generated(5), 5);
        assert!(!s.next_completion().await);
    }

    #[tokio::test(start_paused = true)]
    async fn scroll_burst_waits_for_debounce() {
        let (mut s, _) = session(MockProvider::generated(40), 40);
        s.mount();
        s.settle().await;

        let near = ScrollPosition {
            sentinel_top: 100.0,
            viewport_height: 600.0,
        };
        s.on_scroll(near);
        tokio::time::advance(Duration::from_millis(200)).await;
        s.on_scroll(near);
        let start = Instant::now();
        s.settle().await;
        assert_eq!(start.elapsed(), Duration::from_millis(500));
        assert_eq!(s.list().entries.len(), 20);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_drops_outstanding_fetches() {
        let (mut s, _) = session(
            MockProvider::generated(20).with_delay(Duration::from_secs(5)),
            20,
        );
        s.mount();
        assert_eq!(s.outstanding(), 2);
        s.shutdown();
        assert!(!s.next_completion().await);
        assert!(s.store().is_empty());
    }
}
