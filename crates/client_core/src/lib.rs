use async_trait::async_trait;
use shared::{
    domain::User,
    protocol::{ChangePasswordRequest, PageQuery, PageResponse, RegisterRequest},
};

pub mod config;
pub mod data_store;
pub mod debounce;
pub mod error;
pub mod http;
pub mod local;
pub mod session_store;
pub mod validation;

pub use config::{load_settings, ClientSettings};
pub use data_store::{DataSnapshot, DataStore, FetchOutcome, PaginationState};
pub use debounce::{Debouncer, SEARCH_DEBOUNCE};
pub use error::{ClientError, Field, FieldErrors};
pub use http::HttpBackend;
pub use local::LocalBackend;
pub use session_store::{SessionState, SessionStore, SESSION_STORAGE_KEY};

/// Source of paginated collection data.
#[async_trait]
pub trait CollectionBackend: Send + Sync {
    async fn fetch_page(&self, endpoint: &str, query: &PageQuery)
        -> Result<PageResponse, ClientError>;
}

/// Identity operations the session store delegates to.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn authenticate(&self, email: &str, password: &str) -> Result<User, ClientError>;
    async fn register(&self, request: &RegisterRequest) -> Result<(), ClientError>;
    async fn change_password(&self, request: &ChangePasswordRequest) -> Result<(), ClientError>;
}
