//! In-memory provider for tests and offline demos.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{
    CatalogProvider, EntryRecord, FlavorText, IndexItem, IndexPage, ProviderError, ProviderFuture,
};
use crate::{Category, Stats};

const URL_PREFIX: &str = "mock://record/";

/// A hand-rolled [`CatalogProvider`] backed by a fixed catalog.
///
/// Supports:
/// - Queued index failures (returned in order before the index succeeds),
///   optionally only for calls asking for at least some number of rows.
/// - Per-id record and species failures.
/// - Optional per-call latency.
/// - Call counting per endpoint.
pub struct MockProvider {
    records: BTreeMap<u32, EntryRecord>,
    flavor_texts: HashMap<u32, Vec<FlavorText>>,
    /// `(min_limit, error)` pairs, consumed front to back.
    index_failures: Mutex<VecDeque<(usize, ProviderError)>>,
    failing_records: HashSet<u32>,
    failing_species: HashSet<u32>,
    delay: Option<Duration>,
    index_calls: AtomicUsize,
    record_calls: AtomicUsize,
    species_calls: AtomicUsize,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    /// An empty catalog.
    pub fn new() -> Self {
        Self {
            records: BTreeMap::new(),
            flavor_texts: HashMap::new(),
            index_failures: Mutex::new(VecDeque::new()),
            failing_records: HashSet::new(),
            failing_species: HashSet::new(),
            delay: None,
            index_calls: AtomicUsize::new(0),
            record_calls: AtomicUsize::new(0),
            species_calls: AtomicUsize::new(0),
        }
    }

    /// A catalog of `count` generated entries with ids `1..=count`.
    ///
    /// Names are `entry-NNNN`; categories cycle through the vocabulary and
    /// every third entry gets a secondary category.
    pub fn generated(count: u32) -> Self {
        let mut mock = Self::new();
        for id in 1..=count {
            let primary = Category::ALL[(id as usize - 1) % Category::ALL.len()];
            let mut categories = vec![primary];
            if id % 3 == 0 {
                let secondary = Category::ALL[(id as usize + 4) % Category::ALL.len()];
                if secondary != primary {
                    categories.push(secondary);
                }
            }
            mock = mock.with_entry(id, &format!("entry-{id:04}"), &categories);
        }
        mock
    }

    /// Add (or replace) an entry.
    pub fn with_entry(mut self, id: u32, name: &str, categories: &[Category]) -> Self {
        self.records.insert(
            id,
            EntryRecord {
                id,
                name: name.to_string(),
                categories: categories.to_vec(),
                stats: Stats::default(),
            },
        );
        self
    }

    /// Set the stats of an existing entry.
    pub fn with_stats(mut self, id: u32, stats: Stats) -> Self {
        if let Some(record) = self.records.get_mut(&id) {
            record.stats = stats;
        }
        self
    }

    pub fn with_flavor_texts(mut self, id: u32, texts: Vec<FlavorText>) -> Self {
        self.flavor_texts.insert(id, texts);
        self
    }

    /// Fail the next `times` index calls with `error`.
    pub fn with_index_failures(self, times: usize, error: ProviderError) -> Self {
        self.with_large_index_failures(0, times, error)
    }

    /// Fail the next `times` index calls whose limit is at least `min_limit`.
    /// Smaller page requests pass untouched while such a failure is queued.
    pub fn with_large_index_failures(
        self,
        min_limit: usize,
        times: usize,
        error: ProviderError,
    ) -> Self {
        if let Ok(mut queue) = self.index_failures.lock() {
            queue.extend(std::iter::repeat_n((min_limit, error), times));
        }
        self
    }

    pub fn with_failing_record(mut self, id: u32) -> Self {
        self.failing_records.insert(id);
        self
    }

    pub fn with_failing_species(mut self, id: u32) -> Self {
        self.failing_species.insert(id);
        self
    }

    /// Set simulated network latency per call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn index_calls(&self) -> usize {
        self.index_calls.load(Ordering::SeqCst)
    }

    pub fn record_calls(&self) -> usize {
        self.record_calls.load(Ordering::SeqCst)
    }

    pub fn species_calls(&self) -> usize {
        self.species_calls.load(Ordering::SeqCst)
    }

    fn next_index_failure(&self, limit: usize) -> Option<ProviderError> {
        let mut queue = self.index_failures.lock().ok()?;
        let due = queue
            .front()
            .is_some_and(|(min_limit, _)| limit >= *min_limit);
        if due {
            queue.pop_front().map(|(_, err)| err)
        } else {
            None
        }
    }

    fn record(&self, id: u32) -> Result<EntryRecord, ProviderError> {
        if self.failing_records.contains(&id) {
            return Err(ProviderError::Status {
                status: 500,
                url: format!("{URL_PREFIX}{id}"),
            });
        }
        self.records.get(&id).cloned().ok_or(ProviderError::Status {
            status: 404,
            url: format!("{URL_PREFIX}{id}"),
        })
    }

    async fn latency(&self) {
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
    }
}

impl CatalogProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn fetch_index<'a>(&'a self, offset: usize, limit: usize) -> ProviderFuture<'a, IndexPage> {
        self.index_calls.fetch_add(1, Ordering::SeqCst);
        let failure = self.next_index_failure(limit);
        Box::pin(async move {
            self.latency().await;
            if let Some(err) = failure {
                return Err(err);
            }
            Ok(IndexPage {
                results: self
                    .records
                    .values()
                    .skip(offset)
                    .take(limit)
                    .map(|r| IndexItem {
                        name: r.name.clone(),
                        url: format!("{URL_PREFIX}{}", r.id),
                    })
                    .collect(),
            })
        })
    }

    fn fetch_record<'a>(&'a self, url: &'a str) -> ProviderFuture<'a, EntryRecord> {
        self.record_calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            self.latency().await;
            let id = url
                .strip_prefix(URL_PREFIX)
                .and_then(|rest| rest.parse::<u32>().ok())
                .ok_or_else(|| ProviderError::Transport(format!("unknown url {url}")))?;
            self.record(id)
        })
    }

    fn fetch_record_by_id<'a>(&'a self, id: u32) -> ProviderFuture<'a, EntryRecord> {
        self.record_calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            self.latency().await;
            self.record(id)
        })
    }

    fn fetch_flavor_texts<'a>(&'a self, id: u32) -> ProviderFuture<'a, Vec<FlavorText>> {
        self.species_calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            self.latency().await;
            if self.failing_species.contains(&id) {
                return Err(ProviderError::Timeout {
                    url: format!("mock://species/{id}"),
                });
            }
            Ok(self.flavor_texts.get(&id).cloned().unwrap_or_default())
        })
    }
}
