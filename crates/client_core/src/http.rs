use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::User,
    error::ApiError,
    protocol::{
        ChangePasswordRequest, LoginRequest, PageQuery, PageResponse, RegisterRequest,
        CHANGE_PASSWORD_ROUTE, LOGIN_ROUTE, REGISTER_ROUTE,
    },
};
use tracing::{debug, warn};
use url::Url;

use crate::{
    config::{endpoint_url, ClientSettings},
    error::ClientError,
    CollectionBackend, IdentityProvider,
};

/// Talks to a dashboard backend over HTTP.
#[derive(Clone)]
pub struct HttpBackend {
    http: Client,
    base_url: Url,
}

impl HttpBackend {
    pub fn new(base_url: Url) -> Self {
        Self {
            http: Client::new(),
            base_url,
        }
    }

    pub fn from_settings(settings: &ClientSettings) -> Result<Self, ClientError> {
        Ok(Self::new(settings.require_backend_url()?))
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn post_json<B: serde::Serialize + Sync>(
        &self,
        route: &str,
        body: &B,
    ) -> Result<Response, ClientError> {
        let url = endpoint_url(&self.base_url, route)?;
        let response = self.http.post(url).json(body).send().await?;
        check_status(response).await
    }
}

#[async_trait]
impl CollectionBackend for HttpBackend {
    async fn fetch_page(
        &self,
        endpoint: &str,
        query: &PageQuery,
    ) -> Result<PageResponse, ClientError> {
        let url = endpoint_url(&self.base_url, endpoint)?;
        debug!(%url, cursor = ?query.next_page_key, "fetching collection page");
        let response = self.http.get(url).query(query).send().await?;
        read_json(check_status(response).await?).await
    }
}

#[async_trait]
impl IdentityProvider for HttpBackend {
    async fn authenticate(&self, email: &str, password: &str) -> Result<User, ClientError> {
        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        read_json(self.post_json(LOGIN_ROUTE, &request).await?).await
    }

    async fn register(&self, request: &RegisterRequest) -> Result<(), ClientError> {
        self.post_json(REGISTER_ROUTE, request).await.map(|_| ())
    }

    async fn change_password(&self, request: &ChangePasswordRequest) -> Result<(), ClientError> {
        self.post_json(CHANGE_PASSWORD_ROUTE, request)
            .await
            .map(|_| ())
    }
}

/// Turns non-success responses into errors, preferring the server's JSON error body.
async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ApiError>(&body) {
        Ok(api_err) => Err(api_err.into()),
        Err(_) => {
            warn!(%status, "backend returned a non-JSON error");
            Err(ClientError::RequestFailed(format!(
                "backend responded with {status}"
            )))
        }
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    Ok(response.json::<T>().await?)
}

#[cfg(test)]
#[path = "tests/http_tests.rs"]
mod tests;
