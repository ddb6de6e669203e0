use serde::{Deserialize, Serialize};

use crate::domain::Row;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

pub const LOGIN_ROUTE: &str = "/api/auth/login";
pub const REGISTER_ROUTE: &str = "/api/auth/register";
pub const CHANGE_PASSWORD_ROUTE: &str = "/api/auth/change-password";

/// Query accepted by every collection endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    pub size: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_key: Option<String>,
}

impl PageQuery {
    pub fn first_page(size: u32) -> Self {
        Self {
            size,
            search: None,
            next_page_key: None,
        }
    }

    /// Empty search text is never sent.
    pub fn with_search(mut self, search: Option<&str>) -> Self {
        self.search = search.filter(|s| !s.is_empty()).map(str::to_string);
        self
    }

    pub fn with_cursor(mut self, cursor: Option<&str>) -> Self {
        self.next_page_key = cursor.map(str::to_string);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse {
    pub data: Vec<Row>,
    pub next_page_key: Option<String>,
    #[serde(default)]
    pub total_count: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub email: String,
    pub old_password: String,
    pub new_password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_query_omits_empty_search_and_missing_cursor() {
        let query = PageQuery::first_page(10).with_search(Some(""));
        let encoded = serde_json::to_value(&query).expect("json");
        assert_eq!(encoded, serde_json::json!({ "size": 10 }));

        let query = PageQuery::first_page(25)
            .with_search(Some("job"))
            .with_cursor(Some("abc"));
        let encoded = serde_json::to_value(&query).expect("json");
        assert_eq!(
            encoded,
            serde_json::json!({ "size": 25, "search": "job", "nextPageKey": "abc" })
        );
    }

    #[test]
    fn page_response_accepts_null_cursor() {
        let response: PageResponse = serde_json::from_str(
            r#"{"data":[{"id":"1","name":"Item 1"}],"nextPageKey":null,"totalCount":100}"#,
        )
        .expect("json");
        assert_eq!(response.data.len(), 1);
        assert_eq!(response.next_page_key, None);
        assert_eq!(response.total_count, Some(100));
    }
}
