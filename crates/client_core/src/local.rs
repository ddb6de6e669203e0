use std::time::Duration;

use async_trait::async_trait;
use server_api::{ApiContext, DatasetConfig};
use shared::{
    domain::User,
    protocol::{ChangePasswordRequest, LoginRequest, PageQuery, PageResponse, RegisterRequest},
};
use tracing::debug;

use crate::{error::ClientError, CollectionBackend, IdentityProvider};

pub const FETCH_LATENCY: Duration = Duration::from_millis(500);
pub const AUTH_LATENCY: Duration = Duration::from_millis(1000);

/// In-process backend over generated mock data, with simulated network latency.
#[derive(Clone)]
pub struct LocalBackend {
    api: ApiContext,
    fetch_latency: Duration,
    auth_latency: Duration,
}

impl LocalBackend {
    pub fn new(dataset: DatasetConfig) -> Self {
        Self::with_latency(dataset, FETCH_LATENCY, AUTH_LATENCY)
    }

    pub fn with_latency(dataset: DatasetConfig, fetch: Duration, auth: Duration) -> Self {
        Self {
            api: ApiContext::new(dataset),
            fetch_latency: fetch,
            auth_latency: auth,
        }
    }

    /// No simulated latency.
    pub fn instant(dataset: DatasetConfig) -> Self {
        Self::with_latency(dataset, Duration::ZERO, Duration::ZERO)
    }
}

async fn simulate(latency: Duration) {
    if !latency.is_zero() {
        tokio::time::sleep(latency).await;
    }
}

#[async_trait]
impl CollectionBackend for LocalBackend {
    async fn fetch_page(
        &self,
        endpoint: &str,
        query: &PageQuery,
    ) -> Result<PageResponse, ClientError> {
        simulate(self.fetch_latency).await;
        debug!(endpoint, "serving page from local dataset");
        Ok(server_api::list_page(&self.api, endpoint, query)?)
    }
}

#[async_trait]
impl IdentityProvider for LocalBackend {
    async fn authenticate(&self, email: &str, password: &str) -> Result<User, ClientError> {
        simulate(self.auth_latency).await;
        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        Ok(server_api::login(&self.api, &request)?)
    }

    async fn register(&self, request: &RegisterRequest) -> Result<(), ClientError> {
        simulate(self.auth_latency).await;
        server_api::register(&self.api, request)?;
        Ok(())
    }

    async fn change_password(&self, request: &ChangePasswordRequest) -> Result<(), ClientError> {
        simulate(self.auth_latency).await;
        Ok(server_api::change_password(&self.api, request)?)
    }
}
