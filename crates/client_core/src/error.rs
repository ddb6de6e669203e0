use std::{collections::BTreeMap, fmt};

use shared::error::{ApiError, ErrorCode};
use thiserror::Error;

/// Form fields that can carry a validation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    FirstName,
    LastName,
    Email,
    Password,
    ConfirmPassword,
    CurrentPassword,
    NewPassword,
}

impl Field {
    pub fn name(self) -> &'static str {
        match self {
            Field::FirstName => "firstName",
            Field::LastName => "lastName",
            Field::Email => "email",
            Field::Password => "password",
            Field::ConfirmPassword => "confirmPassword",
            Field::CurrentPassword => "currentPassword",
            Field::NewPassword => "newPassword",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<Field, String>);

impl FieldErrors {
    pub fn insert(&mut self, field: Field, message: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| message.into());
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> {
        self.0.iter().map(|(field, message)| (*field, message.as_str()))
    }

    pub fn into_result(self) -> Result<(), ClientError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ClientError::Validation(self))
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (field, message)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {message}", field.name())?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("validation failed: {0}")]
    Validation(FieldErrors),
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("request failed: {0}")]
    RequestFailed(String),
    #[error("configuration missing: {0}")]
    ConfigurationMissing(String),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("no authenticated session")]
    NotAuthenticated,
}

impl ClientError {
    /// Failures a user can recover from by re-issuing the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Network(_) | ClientError::RequestFailed(_))
    }

    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            ClientError::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

impl From<ApiError> for ClientError {
    fn from(err: ApiError) -> Self {
        match err.code {
            ErrorCode::Unauthorized => ClientError::AuthenticationFailed(err.message),
            _ => ClientError::RequestFailed(err.message),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::RequestFailed(format!("malformed response: {err}"))
        } else {
            ClientError::Network(err.to_string())
        }
    }
}
