use std::sync::Arc;

use shared::{
    domain::{CollectionView, Row, User},
    error::{ApiError, ErrorCode},
    protocol::{
        ChangePasswordRequest, LoginRequest, PageQuery, PageResponse, RegisterRequest,
        MAX_PAGE_SIZE,
    },
};
use tracing::info;

mod cursor;
mod dataset;
mod identity;

pub use cursor::{decode_cursor, encode_cursor, CursorError};
pub use dataset::{CollectionCatalog, DatasetConfig};
pub use identity::{IdentityDirectory, DEMO_EMAIL, DEMO_PASSWORD, MIN_PASSWORD_LEN};

#[derive(Clone)]
pub struct ApiContext {
    pub catalog: Arc<CollectionCatalog>,
    pub identity: Arc<IdentityDirectory>,
}

impl ApiContext {
    pub fn new(dataset: DatasetConfig) -> Self {
        Self {
            catalog: Arc::new(CollectionCatalog::generate(dataset)),
            identity: Arc::new(IdentityDirectory::with_demo_account()),
        }
    }
}

/// Serves one page of `endpoint`, filtered by the query's search text and
/// resumed from its cursor.
pub fn list_page(
    ctx: &ApiContext,
    endpoint: &str,
    query: &PageQuery,
) -> Result<PageResponse, ApiError> {
    let view = CollectionView::from_endpoint(endpoint).ok_or_else(|| {
        ApiError::new(ErrorCode::NotFound, format!("unknown collection {endpoint}"))
    })?;
    if query.size == 0 || query.size > MAX_PAGE_SIZE {
        return Err(ApiError::new(
            ErrorCode::Validation,
            format!("size must be between 1 and {MAX_PAGE_SIZE}"),
        ));
    }
    let offset = match query.next_page_key.as_deref() {
        Some(token) => decode_cursor(token)
            .map_err(|err| ApiError::new(ErrorCode::Validation, err.to_string()))?,
        None => 0,
    };

    let needle = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);
    let matching: Vec<&Row> = ctx
        .catalog
        .rows(view)
        .iter()
        .filter(|row| needle.as_deref().map_or(true, |n| row_matches(row, n)))
        .collect();

    let size = query.size as usize;
    let data: Vec<Row> = matching
        .iter()
        .skip(offset)
        .take(size)
        .map(|row| (*row).clone())
        .collect();
    let end = offset.saturating_add(size);
    let next_page_key = (end < matching.len()).then(|| encode_cursor(end));

    info!(
        endpoint,
        offset,
        returned = data.len(),
        total = matching.len(),
        "served collection page"
    );

    Ok(PageResponse {
        data,
        next_page_key,
        total_count: Some(matching.len() as u64),
    })
}

pub fn login(ctx: &ApiContext, request: &LoginRequest) -> Result<User, ApiError> {
    ctx.identity.login(request)
}

pub fn register(ctx: &ApiContext, request: &RegisterRequest) -> Result<User, ApiError> {
    let user = ctx.identity.register(request)?;
    info!(user_id = %user.id, "account registered");
    Ok(user)
}

pub fn change_password(ctx: &ApiContext, request: &ChangePasswordRequest) -> Result<(), ApiError> {
    ctx.identity.change_password(request)?;
    info!(email = %request.email, "password changed");
    Ok(())
}

fn row_matches(row: &Row, needle: &str) -> bool {
    row.id.0.to_lowercase().contains(needle)
        || ["name", "status"]
            .into_iter()
            .any(|field| row.cell_text(field).to_lowercase().contains(needle))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn setup(rows_per_collection: usize) -> ApiContext {
        ApiContext::new(DatasetConfig {
            seed: 11,
            rows_per_collection,
        })
    }

    #[test]
    fn first_page_reports_total_and_cursor() {
        let ctx = setup(25);
        let page = list_page(&ctx, "/api/input", &PageQuery::first_page(10)).expect("page");
        assert_eq!(page.data.len(), 10);
        assert_eq!(page.total_count, Some(25));
        assert!(page.next_page_key.is_some());
    }

    #[test]
    fn cursors_walk_the_whole_collection_without_repeats() {
        let ctx = setup(23);
        let mut seen = HashSet::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0;
        loop {
            let query = PageQuery::first_page(10).with_cursor(cursor.as_deref());
            let page = list_page(&ctx, "/api/artifact-jobs", &query).expect("page");
            pages += 1;
            for row in page.data {
                assert!(seen.insert(row.id), "row repeated across pages");
            }
            match page.next_page_key {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        assert_eq!(pages, 3);
        assert_eq!(seen.len(), 23);
    }

    #[test]
    fn search_filters_case_insensitively() {
        let ctx = setup(60);
        let query = PageQuery::first_page(100).with_search(Some("INACTIVE"));
        let page = list_page(&ctx, "/api/input", &query).expect("page");
        assert!(!page.data.is_empty());
        assert!(page
            .data
            .iter()
            .all(|row| row.cell_text("status") == "Inactive"));
        assert_eq!(page.total_count, Some(page.data.len() as u64));
        assert_eq!(page.next_page_key, None);
    }

    #[test]
    fn exact_multiple_of_page_size_has_no_trailing_cursor() {
        let ctx = setup(20);
        let first = list_page(&ctx, "/api/profile", &PageQuery::first_page(10)).expect("first");
        let second = list_page(
            &ctx,
            "/api/profile",
            &PageQuery::first_page(10).with_cursor(first.next_page_key.as_deref()),
        )
        .expect("second");
        assert_eq!(second.data.len(), 10);
        assert_eq!(second.next_page_key, None);
    }

    #[test]
    fn unknown_endpoint_is_not_found() {
        let ctx = setup(5);
        let err = list_page(&ctx, "/api/nope", &PageQuery::first_page(10)).expect_err("404");
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[test]
    fn bad_size_and_cursor_are_validation_errors() {
        let ctx = setup(5);
        let err = list_page(&ctx, "/api/input", &PageQuery::first_page(0)).expect_err("size");
        assert_eq!(err.code, ErrorCode::Validation);

        let query = PageQuery::first_page(10).with_cursor(Some("not a cursor"));
        let err = list_page(&ctx, "/api/input", &query).expect_err("cursor");
        assert_eq!(err.code, ErrorCode::Validation);
    }
}
