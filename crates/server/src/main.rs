use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use server_api::{change_password, list_page, login, register, ApiContext};
use shared::{
    domain::User,
    error::{ApiError, ErrorCode},
    protocol::{
        ChangePasswordRequest, LoginRequest, PageQuery, PageResponse, RegisterRequest,
        CHANGE_PASSWORD_ROUTE, DEFAULT_PAGE_SIZE, LOGIN_ROUTE, REGISTER_ROUTE,
    },
};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod app_state;
mod config;

use app_state::AppState;
use config::load_settings;

const MAX_REQUEST_BODY_BYTES: usize = 64 * 1024;

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    size: Option<u32>,
    search: Option<String>,
    next_page_key: Option<String>,
}

impl From<ListQuery> for PageQuery {
    fn from(q: ListQuery) -> Self {
        PageQuery::first_page(q.size.unwrap_or(DEFAULT_PAGE_SIZE))
            .with_search(q.search.as_deref())
            .with_cursor(q.next_page_key.as_deref())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let settings = load_settings();
    let api = ApiContext::new(settings.dataset);
    info!(
        seed = settings.dataset.seed,
        rows_per_collection = settings.dataset.rows_per_collection,
        "generated mock collections"
    );

    let app = build_router(Arc::new(AppState { api }));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(LOGIN_ROUTE, post(http_login))
        .route(REGISTER_ROUTE, post(http_register))
        .route(CHANGE_PASSWORD_ROUTE, post(http_change_password))
        .route("/api/:collection", get(http_list_collection))
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BODY_BYTES))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn http_list_collection(
    State(state): State<Arc<AppState>>,
    Path(collection): Path<String>,
    Query(q): Query<ListQuery>,
) -> ApiResult<Json<PageResponse>> {
    let endpoint = format!("/api/{collection}");
    list_page(&state.api, &endpoint, &q.into())
        .map(Json)
        .map_err(reject)
}

async fn http_login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<User>> {
    login(&state.api, &req).map(Json).map_err(|err| {
        warn!(email = %req.email, "login rejected");
        reject(err)
    })
}

async fn http_register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    register(&state.api, &req)
        .map(|user| (StatusCode::CREATED, Json(user)))
        .map_err(reject)
}

async fn http_change_password(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<StatusCode> {
    change_password(&state.api, &req)
        .map(|()| StatusCode::NO_CONTENT)
        .map_err(reject)
}

fn reject(err: ApiError) -> (StatusCode, Json<ApiError>) {
    let status = match err.code {
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Conflict => StatusCode::CONFLICT,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(err))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
