//! Paginated, searchable view over one collection endpoint at a time.
//!
//! The backend pages forward with opaque cursors, so the store remembers the
//! cursor that leads to each page it has already visited and can only move one
//! page at a time in either direction.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use shared::{
    domain::Row,
    protocol::{PageQuery, PageResponse, DEFAULT_PAGE_SIZE},
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::CollectionBackend;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationState {
    pub current_page: usize,
    pub page_size: u32,
    /// `next_page_keys[i]` fetches page `i + 1`.
    pub next_page_keys: Vec<String>,
    pub has_next_page: bool,
    pub total_count: Option<u64>,
}

impl Default for PaginationState {
    fn default() -> Self {
        Self {
            current_page: 0,
            page_size: DEFAULT_PAGE_SIZE,
            next_page_keys: Vec::new(),
            has_next_page: false,
            total_count: None,
        }
    }
}

impl PaginationState {
    pub fn total_pages(&self) -> Option<u64> {
        let size = u64::from(self.page_size.max(1));
        self.total_count.map(|total| total.div_ceil(size))
    }

    pub fn can_go_next(&self) -> bool {
        self.has_next_page && self.next_page_keys.len() > self.current_page
    }

    pub fn can_go_previous(&self) -> bool {
        self.current_page > 0
    }

    /// `Page 2 of 10 (100 total items)`, or `Page 2 of ?` when the total is unknown.
    pub fn label(&self) -> String {
        let page = self.current_page + 1;
        match (self.total_pages(), self.total_count) {
            (Some(pages), Some(total)) => format!("Page {page} of {pages} ({total} total items)"),
            _ => format!("Page {page} of ?"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataSnapshot {
    pub endpoint: Option<String>,
    pub data: Vec<Row>,
    pub loading: bool,
    pub error: Option<String>,
    pub search_query: String,
    pub pagination: PaginationState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The response replaced the current page.
    Applied,
    /// The request failed; `error` is set and prior rows are kept.
    Failed,
    /// A newer request was issued before this one completed.
    Superseded,
    /// Navigation was not possible from the current position.
    Skipped,
}

/// Cursors are only meaningful for the query that produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CursorScope {
    endpoint: String,
    search: Option<String>,
    page_size: u32,
}

impl CursorScope {
    fn of(endpoint: &str, query: &PageQuery) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            search: query.search.clone(),
            page_size: query.size,
        }
    }
}

#[derive(Default)]
struct Inner {
    snapshot: DataSnapshot,
    generation: u64,
    cursor_scope: Option<CursorScope>,
}

impl Inner {
    /// Whether the recorded history belongs to `endpoint` under the stored
    /// search text and page size.
    fn history_matches(&self, endpoint: &str) -> bool {
        let query = PageQuery::first_page(self.snapshot.pagination.page_size)
            .with_search(Some(&self.snapshot.search_query));
        self.cursor_scope.as_ref() == Some(&CursorScope::of(endpoint, &query))
    }
}

struct PendingFetch {
    generation: u64,
    query: PageQuery,
    target_page: Option<usize>,
}

pub struct DataStore {
    backend: Arc<dyn CollectionBackend>,
    inner: Mutex<Inner>,
    events: broadcast::Sender<DataSnapshot>,
}

impl DataStore {
    pub fn new(backend: Arc<dyn CollectionBackend>) -> Self {
        Self::with_page_size(backend, DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(backend: Arc<dyn CollectionBackend>, page_size: u32) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let mut inner = Inner::default();
        inner.snapshot.pagination.page_size = page_size.max(1);
        Self {
            backend,
            inner: Mutex::new(inner),
            events,
        }
    }

    /// Receives a snapshot after every state transition.
    pub fn subscribe(&self) -> broadcast::Receiver<DataSnapshot> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> DataSnapshot {
        self.lock().snapshot.clone()
    }

    pub fn pagination(&self) -> PaginationState {
        self.lock().snapshot.pagination.clone()
    }

    pub fn search_query(&self) -> String {
        self.lock().snapshot.search_query.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.lock().snapshot.loading
    }

    /// Stores the search text without fetching.
    pub fn set_search_query(&self, query: impl Into<String>) {
        let mut inner = self.lock();
        inner.snapshot.search_query = query.into();
        self.publish(&inner);
    }

    /// Fetches one page. A fetch without a cursor loads page 0; a fetch with a
    /// recorded cursor loads the page that cursor leads to.
    pub async fn fetch_data(
        &self,
        endpoint: &str,
        search: Option<&str>,
        page_size: Option<u32>,
        cursor: Option<&str>,
    ) -> FetchOutcome {
        let pending = {
            let mut inner = self.lock();
            let size = page_size.unwrap_or(inner.snapshot.pagination.page_size);
            let scope = CursorScope::of(endpoint, &PageQuery::first_page(size).with_search(search));
            let target_page = match cursor {
                None => Some(0),
                Some(_) if inner.cursor_scope.as_ref() != Some(&scope) => None,
                Some(cursor) => inner
                    .snapshot
                    .pagination
                    .next_page_keys
                    .iter()
                    .position(|key| key == cursor)
                    .map(|index| index + 1),
            };
            self.begin(&mut inner, endpoint, search, page_size, cursor, target_page)
        };
        self.complete(endpoint, pending).await
    }

    pub async fn go_to_next_page(&self, endpoint: &str) -> FetchOutcome {
        let pending = {
            let mut inner = self.lock();
            if !inner.history_matches(endpoint) {
                debug!(endpoint, "cursor history belongs to another query");
                return FetchOutcome::Skipped;
            }
            let pagination = &inner.snapshot.pagination;
            if !pagination.has_next_page {
                debug!(endpoint, "no next page");
                return FetchOutcome::Skipped;
            }
            let Some(cursor) = pagination.next_page_keys.get(pagination.current_page).cloned()
            else {
                warn!(
                    endpoint,
                    page = pagination.current_page,
                    "no cursor recorded for next page"
                );
                return FetchOutcome::Skipped;
            };
            let target = pagination.current_page + 1;
            let search = inner.snapshot.search_query.clone();
            self.begin(
                &mut inner,
                endpoint,
                Some(&search),
                None,
                Some(&cursor),
                Some(target),
            )
        };
        self.complete(endpoint, pending).await
    }

    pub async fn go_to_previous_page(&self, endpoint: &str) -> FetchOutcome {
        let pending = {
            let mut inner = self.lock();
            let current = inner.snapshot.pagination.current_page;
            if current > 0 && !inner.history_matches(endpoint) {
                debug!(endpoint, "cursor history belongs to another query");
                return FetchOutcome::Skipped;
            }
            let cursor = match current {
                0 => return FetchOutcome::Skipped,
                1 => None,
                _ => match inner.snapshot.pagination.next_page_keys.get(current - 2) {
                    Some(key) => Some(key.clone()),
                    None => {
                        warn!(endpoint, page = current, "no cursor recorded for previous page");
                        return FetchOutcome::Skipped;
                    }
                },
            };
            let search = inner.snapshot.search_query.clone();
            self.begin(
                &mut inner,
                endpoint,
                Some(&search),
                None,
                cursor.as_deref(),
                Some(current - 1),
            )
        };
        self.complete(endpoint, pending).await
    }

    /// Drops all pagination history and reloads page 0 with the current search.
    pub async fn refresh_data(&self, endpoint: &str) -> FetchOutcome {
        let pending = {
            let mut inner = self.lock();
            inner.snapshot.pagination.current_page = 0;
            inner.snapshot.pagination.next_page_keys.clear();
            inner.cursor_scope = None;
            let search = inner.snapshot.search_query.clone();
            self.begin(&mut inner, endpoint, Some(&search), None, None, Some(0))
        };
        self.complete(endpoint, pending).await
    }

    fn begin(
        &self,
        inner: &mut Inner,
        endpoint: &str,
        search: Option<&str>,
        page_size: Option<u32>,
        cursor: Option<&str>,
        target_page: Option<usize>,
    ) -> PendingFetch {
        inner.generation += 1;
        let size = page_size.unwrap_or(inner.snapshot.pagination.page_size);
        inner.snapshot.endpoint = Some(endpoint.to_string());
        inner.snapshot.loading = true;
        inner.snapshot.error = None;
        self.publish(inner);
        PendingFetch {
            generation: inner.generation,
            query: PageQuery::first_page(size)
                .with_search(search)
                .with_cursor(cursor),
            target_page,
        }
    }

    async fn complete(&self, endpoint: &str, pending: PendingFetch) -> FetchOutcome {
        let result = self.backend.fetch_page(endpoint, &pending.query).await;

        let mut inner = self.lock();
        if inner.generation != pending.generation {
            debug!(
                endpoint,
                generation = pending.generation,
                latest = inner.generation,
                "discarding superseded response"
            );
            return FetchOutcome::Superseded;
        }
        inner.snapshot.loading = false;
        let outcome = match result {
            Ok(page) => {
                apply_page(&mut inner, endpoint, &pending, page);
                info!(
                    endpoint,
                    page = inner.snapshot.pagination.current_page,
                    rows = inner.snapshot.data.len(),
                    has_next = inner.snapshot.pagination.has_next_page,
                    "page loaded"
                );
                FetchOutcome::Applied
            }
            Err(err) => {
                warn!(endpoint, %err, "page fetch failed");
                inner.snapshot.error = Some(err.to_string());
                FetchOutcome::Failed
            }
        };
        self.publish(&inner);
        outcome
    }

    fn publish(&self, inner: &Inner) {
        // No subscribers is fine.
        let _ = self.events.send(inner.snapshot.clone());
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn apply_page(inner: &mut Inner, endpoint: &str, pending: &PendingFetch, page: PageResponse) {
    let query = &pending.query;
    if query.next_page_key.is_none() {
        let scope = CursorScope::of(endpoint, query);
        if inner.cursor_scope.as_ref() != Some(&scope) {
            inner.snapshot.pagination.next_page_keys.clear();
            inner.cursor_scope = Some(scope);
        }
    }

    let pagination = &mut inner.snapshot.pagination;
    pagination.page_size = query.size;
    pagination.has_next_page = page.next_page_key.is_some();
    pagination.total_count = page.total_count;
    if let Some(index) = pending.target_page {
        if let Some(next) = page.next_page_key {
            if pagination.next_page_keys.len() == index {
                pagination.next_page_keys.push(next);
            }
        }
        pagination.current_page = index;
    }
    inner.snapshot.data = page.data;
}

#[cfg(test)]
#[path = "tests/data_store_tests.rs"]
mod tests;
