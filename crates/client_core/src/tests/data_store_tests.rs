use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use async_trait::async_trait;

use super::*;
use crate::error::ClientError;

const ENDPOINT: &str = "/api/input";

/// Scripted backend: pages are addressed by `cursor-N` tokens.
struct FakeBackend {
    pages: usize,
    queries: Mutex<Vec<(String, PageQuery)>>,
    fail: AtomicBool,
}

impl FakeBackend {
    fn with_pages(pages: usize) -> Arc<Self> {
        Arc::new(Self {
            pages,
            queries: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        })
    }

    fn queries(&self) -> Vec<PageQuery> {
        self.queries
            .lock()
            .expect("queries lock")
            .iter()
            .map(|(_, query)| query.clone())
            .collect()
    }

    fn last_query(&self) -> PageQuery {
        self.queries().pop().expect("at least one query")
    }
}

#[async_trait]
impl CollectionBackend for FakeBackend {
    async fn fetch_page(
        &self,
        endpoint: &str,
        query: &PageQuery,
    ) -> Result<PageResponse, ClientError> {
        self.queries
            .lock()
            .expect("queries lock")
            .push((endpoint.to_string(), query.clone()));
        if let Some(search) = query.search.as_deref() {
            if let Some(millis) = search.strip_prefix("delay-") {
                let millis: u64 = millis.parse().unwrap_or(0);
                tokio::time::sleep(Duration::from_millis(millis)).await;
            }
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(ClientError::Network("connection refused".into()));
        }
        let page = match query.next_page_key.as_deref() {
            None => 0,
            Some(key) => key
                .strip_prefix("cursor-")
                .and_then(|n| n.parse::<usize>().ok())
                .expect("fake cursor"),
        };
        let tag = query.search.clone().unwrap_or_default();
        let data = (0..query.size)
            .map(|i| {
                Row::new(format!("{tag}p{page}-{i}"))
                    .with_field("name", format!("Item {i}"))
            })
            .collect();
        Ok(PageResponse {
            data,
            next_page_key: (page + 1 < self.pages).then(|| format!("cursor-{}", page + 1)),
            total_count: Some((self.pages as u64) * u64::from(query.size)),
        })
    }
}

fn store(backend: &Arc<FakeBackend>) -> DataStore {
    DataStore::new(backend.clone())
}

fn first_id(store: &DataStore) -> String {
    store.snapshot().data[0].id.0.clone()
}

#[tokio::test]
async fn fetch_fills_page_and_clears_loading() {
    let backend = FakeBackend::with_pages(5);
    let store = store(&backend);

    let outcome = store.fetch_data(ENDPOINT, Some("abc"), Some(10), None).await;
    assert_eq!(outcome, FetchOutcome::Applied);

    let snapshot = store.snapshot();
    assert_eq!(snapshot.data.len(), 10);
    assert!(!snapshot.loading);
    assert_eq!(snapshot.error, None);
    assert_eq!(snapshot.endpoint.as_deref(), Some(ENDPOINT));
    assert_eq!(snapshot.pagination.current_page, 0);
    assert!(snapshot.pagination.has_next_page);
    assert_eq!(snapshot.pagination.total_count, Some(50));
    assert_eq!(snapshot.pagination.next_page_keys, vec!["cursor-1".to_string()]);
}

#[tokio::test]
async fn failed_fetch_keeps_rows_and_reports_error() {
    let backend = FakeBackend::with_pages(3);
    let store = store(&backend);
    store.fetch_data(ENDPOINT, None, None, None).await;
    let rows_before = store.snapshot().data;

    backend.fail.store(true, Ordering::SeqCst);
    let outcome = store.refresh_data(ENDPOINT).await;
    assert_eq!(outcome, FetchOutcome::Failed);

    let snapshot = store.snapshot();
    assert!(!snapshot.loading);
    assert_eq!(snapshot.data, rows_before);
    assert!(snapshot
        .error
        .as_deref()
        .is_some_and(|msg| msg.contains("connection refused")));

    backend.fail.store(false, Ordering::SeqCst);
    assert_eq!(store.refresh_data(ENDPOINT).await, FetchOutcome::Applied);
    assert_eq!(store.snapshot().error, None);
}

#[tokio::test]
async fn empty_search_is_not_sent() {
    let backend = FakeBackend::with_pages(2);
    let store = store(&backend);
    store.fetch_data(ENDPOINT, Some(""), None, None).await;
    assert_eq!(backend.last_query().search, None);
    assert_eq!(backend.last_query().size, DEFAULT_PAGE_SIZE);
}

#[tokio::test]
async fn search_query_round_trips_to_the_backend() {
    let backend = FakeBackend::with_pages(2);
    let store = store(&backend);

    store.set_search_query("x");
    assert!(backend.queries().is_empty(), "setting the query must not fetch");

    let search = store.search_query();
    store.fetch_data(ENDPOINT, Some(&search), None, None).await;
    assert_eq!(backend.last_query().search.as_deref(), Some("x"));
    assert_eq!(store.search_query(), "x");
}

#[tokio::test]
async fn next_next_previous_walks_recorded_cursors() {
    let backend = FakeBackend::with_pages(5);
    let store = store(&backend);
    store.fetch_data(ENDPOINT, None, Some(10), None).await;
    assert_eq!(store.pagination().next_page_keys.len(), 1);

    assert_eq!(store.go_to_next_page(ENDPOINT).await, FetchOutcome::Applied);
    let pagination = store.pagination();
    assert_eq!(pagination.current_page, 1);
    assert_eq!(pagination.next_page_keys[0], "cursor-1");
    assert_eq!(backend.last_query().next_page_key.as_deref(), Some("cursor-1"));
    assert_eq!(store.snapshot().data.len(), 10);
    assert_eq!(first_id(&store), "p1-0");

    assert_eq!(store.go_to_next_page(ENDPOINT).await, FetchOutcome::Applied);
    let pagination = store.pagination();
    assert_eq!(pagination.current_page, 2);
    assert_eq!(pagination.next_page_keys[1], "cursor-2");

    assert_eq!(store.go_to_previous_page(ENDPOINT).await, FetchOutcome::Applied);
    assert_eq!(store.pagination().current_page, 1);
    assert_eq!(backend.last_query().next_page_key.as_deref(), Some("cursor-1"));
    assert_eq!(first_id(&store), "p1-0");
}

#[tokio::test]
async fn previous_from_page_one_is_cursorless() {
    let backend = FakeBackend::with_pages(4);
    let store = store(&backend);
    store.fetch_data(ENDPOINT, None, None, None).await;
    store.go_to_next_page(ENDPOINT).await;
    store.go_to_next_page(ENDPOINT).await;
    store.go_to_previous_page(ENDPOINT).await;
    assert_eq!(store.pagination().current_page, 1);

    assert_eq!(store.go_to_previous_page(ENDPOINT).await, FetchOutcome::Applied);
    assert_eq!(store.pagination().current_page, 0);
    assert_eq!(backend.last_query().next_page_key, None);
    assert_eq!(first_id(&store), "p0-0");
    // Revisiting page 0 does not duplicate history.
    assert_eq!(
        store.pagination().next_page_keys,
        vec!["cursor-1".to_string(), "cursor-2".to_string(), "cursor-3".to_string()]
    );
}

#[tokio::test]
async fn previous_at_first_page_is_skipped() {
    let backend = FakeBackend::with_pages(3);
    let store = store(&backend);
    store.fetch_data(ENDPOINT, None, None, None).await;
    let before = store.snapshot();

    assert_eq!(store.go_to_previous_page(ENDPOINT).await, FetchOutcome::Skipped);
    assert_eq!(store.snapshot(), before);
    assert_eq!(backend.queries().len(), 1);
}

#[tokio::test]
async fn next_without_next_page_or_cursor_leaves_state_unchanged() {
    let backend = FakeBackend::with_pages(1);
    let store = store(&backend);

    // Nothing fetched yet: no cursor recorded at all.
    let before = store.snapshot();
    assert_eq!(store.go_to_next_page(ENDPOINT).await, FetchOutcome::Skipped);
    assert_eq!(store.snapshot(), before);

    store.fetch_data(ENDPOINT, None, None, None).await;
    assert!(!store.pagination().has_next_page);
    assert!(!store.pagination().can_go_next());
    let before = store.snapshot();
    assert_eq!(store.go_to_next_page(ENDPOINT).await, FetchOutcome::Skipped);
    assert_eq!(store.snapshot(), before);
    assert_eq!(backend.queries().len(), 1);
}

#[tokio::test]
async fn refresh_resets_to_first_page_with_fresh_history() {
    let backend = FakeBackend::with_pages(1);
    let store = store(&backend);
    store.fetch_data(ENDPOINT, None, None, None).await;
    store.refresh_data(ENDPOINT).await;
    let pagination = store.pagination();
    assert_eq!(pagination.current_page, 0);
    assert!(pagination.next_page_keys.is_empty());

    let backend = FakeBackend::with_pages(6);
    let store = DataStore::new(backend.clone());
    store.fetch_data(ENDPOINT, None, None, None).await;
    for _ in 0..4 {
        store.go_to_next_page(ENDPOINT).await;
    }
    assert_eq!(store.pagination().current_page, 4);
    assert_eq!(store.pagination().next_page_keys.len(), 5);

    assert_eq!(store.refresh_data(ENDPOINT).await, FetchOutcome::Applied);
    let pagination = store.pagination();
    assert_eq!(pagination.current_page, 0);
    // Only the cursor returned by the refreshed page 0 remains.
    assert_eq!(pagination.next_page_keys, vec!["cursor-1".to_string()]);
    assert_eq!(backend.last_query().next_page_key, None);
}

#[tokio::test]
async fn refresh_uses_stored_search_and_page_size() {
    let backend = FakeBackend::with_pages(3);
    let store = DataStore::with_page_size(backend.clone(), 25);
    store.set_search_query("jobs");
    store.refresh_data(ENDPOINT).await;

    let query = backend.last_query();
    assert_eq!(query.search.as_deref(), Some("jobs"));
    assert_eq!(query.size, 25);
    assert_eq!(store.snapshot().data.len(), 25);
}

#[tokio::test]
async fn switching_endpoint_starts_a_fresh_cursor_history() {
    let backend = FakeBackend::with_pages(4);
    let store = store(&backend);
    store.fetch_data(ENDPOINT, None, None, None).await;
    store.go_to_next_page(ENDPOINT).await;
    store.go_to_next_page(ENDPOINT).await;
    assert_eq!(store.pagination().next_page_keys.len(), 3);

    store.fetch_data("/api/profile", None, None, None).await;
    let pagination = store.pagination();
    assert_eq!(pagination.current_page, 0);
    assert_eq!(pagination.next_page_keys, vec!["cursor-1".to_string()]);
}

#[tokio::test]
async fn failed_endpoint_switch_never_reuses_old_cursors() {
    let backend = FakeBackend::with_pages(5);
    let store = store(&backend);
    store.fetch_data(ENDPOINT, None, None, None).await;
    store.go_to_next_page(ENDPOINT).await;
    store.go_to_next_page(ENDPOINT).await;

    backend.fail.store(true, Ordering::SeqCst);
    assert_eq!(
        store.fetch_data("/api/profile", None, None, None).await,
        FetchOutcome::Failed
    );
    backend.fail.store(false, Ordering::SeqCst);
    let sent = backend.queries().len();

    assert_eq!(store.go_to_next_page("/api/profile").await, FetchOutcome::Skipped);
    assert_eq!(store.go_to_previous_page("/api/profile").await, FetchOutcome::Skipped);
    assert_eq!(backend.queries().len(), sent);

    assert_eq!(
        store.fetch_data("/api/profile", None, None, None).await,
        FetchOutcome::Applied
    );
    assert_eq!(store.go_to_next_page("/api/profile").await, FetchOutcome::Applied);
    let pagination = store.pagination();
    assert_eq!(pagination.current_page, 1);
    assert_eq!(pagination.next_page_keys, vec!["cursor-1".to_string(), "cursor-2".to_string()]);
}

#[tokio::test]
async fn changed_search_text_is_not_paged_with_old_cursors() {
    let backend = FakeBackend::with_pages(4);
    let store = store(&backend);
    store.fetch_data(ENDPOINT, None, None, None).await;

    store.set_search_query("fresh");
    assert_eq!(store.go_to_next_page(ENDPOINT).await, FetchOutcome::Skipped);
    assert_eq!(backend.queries().len(), 1);

    let search = store.search_query();
    store.fetch_data(ENDPOINT, Some(&search), None, None).await;
    assert_eq!(store.go_to_next_page(ENDPOINT).await, FetchOutcome::Applied);
    let query = backend.last_query();
    assert_eq!(query.search.as_deref(), Some("fresh"));
    assert_eq!(query.next_page_key.as_deref(), Some("cursor-1"));
}

#[tokio::test]
async fn failed_navigation_keeps_page_and_history() {
    let backend = FakeBackend::with_pages(5);
    let store = store(&backend);
    store.fetch_data(ENDPOINT, None, None, None).await;
    store.go_to_next_page(ENDPOINT).await;
    let before = store.snapshot();
    assert_eq!(before.pagination.current_page, 1);

    backend.fail.store(true, Ordering::SeqCst);
    for outcome in [
        store.go_to_next_page(ENDPOINT).await,
        store.go_to_previous_page(ENDPOINT).await,
    ] {
        assert_eq!(outcome, FetchOutcome::Failed);
        let snapshot = store.snapshot();
        assert!(!snapshot.loading);
        assert!(snapshot.error.is_some());
        assert_eq!(snapshot.data, before.data);
        assert_eq!(snapshot.pagination, before.pagination);
    }
}

#[tokio::test]
async fn explicit_cursor_fetch_moves_to_the_page_it_leads_to() {
    let backend = FakeBackend::with_pages(4);
    let store = store(&backend);
    store.fetch_data(ENDPOINT, None, None, None).await;

    store.fetch_data(ENDPOINT, None, None, Some("cursor-1")).await;
    assert_eq!(store.pagination().current_page, 1);
    assert_eq!(first_id(&store), "p1-0");
}

#[tokio::test(start_paused = true)]
async fn stale_response_never_overwrites_newer_one() {
    let backend = FakeBackend::with_pages(3);
    let store = store(&backend);

    let (slow, fast) = tokio::join!(
        store.fetch_data(ENDPOINT, Some("delay-500"), None, None),
        async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            store.fetch_data(ENDPOINT, Some("delay-50"), None, None).await
        }
    );

    assert_eq!(slow, FetchOutcome::Superseded);
    assert_eq!(fast, FetchOutcome::Applied);
    let snapshot = store.snapshot();
    assert!(!snapshot.loading);
    assert_eq!(snapshot.data[0].id.0, "delay-50p0-0");
}

#[tokio::test(start_paused = true)]
async fn loading_stays_set_while_newest_request_is_pending() {
    let backend = FakeBackend::with_pages(3);
    let store = store(&backend);

    let (first, _) = tokio::join!(
        store.fetch_data(ENDPOINT, Some("delay-10"), None, None),
        async {
            tokio::time::sleep(Duration::from_millis(1)).await;
            store.fetch_data(ENDPOINT, Some("delay-100"), None, None).await
        }
    );
    assert_eq!(first, FetchOutcome::Superseded);
    assert!(!store.is_loading());
}

#[tokio::test]
async fn subscribers_see_loading_then_result() {
    let backend = FakeBackend::with_pages(2);
    let store = store(&backend);
    let mut events = store.subscribe();

    store.fetch_data(ENDPOINT, None, None, None).await;

    let started = events.recv().await.expect("loading event");
    assert!(started.loading);
    let finished = events.recv().await.expect("result event");
    assert!(!finished.loading);
    assert_eq!(finished.data.len(), 10);
}

#[test]
fn pagination_label_reports_known_and_unknown_totals() {
    let mut pagination = PaginationState {
        current_page: 1,
        total_count: Some(95),
        ..PaginationState::default()
    };
    assert_eq!(pagination.total_pages(), Some(10));
    assert_eq!(pagination.label(), "Page 2 of 10 (95 total items)");

    pagination.total_count = None;
    assert_eq!(pagination.label(), "Page 2 of ?");
    assert!(pagination.can_go_previous());
}
