use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        PoisonError, RwLock,
    },
};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest, Sha256};
use shared::{
    domain::{is_plausible_email, User, UserId},
    error::{ApiError, ErrorCode},
    protocol::{ChangePasswordRequest, LoginRequest, RegisterRequest},
};
use tracing::warn;

pub const MIN_PASSWORD_LEN: usize = 8;
pub const DEMO_EMAIL: &str = "demo@example.com";
pub const DEMO_PASSWORD: &str = "password123";

struct Account {
    user: User,
    password_digest: String,
}

/// In-memory account directory backing the mocked identity routes.
pub struct IdentityDirectory {
    accounts: RwLock<HashMap<String, Account>>,
    next_id: AtomicU64,
}

impl Default for IdentityDirectory {
    fn default() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl IdentityDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory pre-seeded with the demo account (`demo@example.com` / `password123`).
    pub fn with_demo_account() -> Self {
        let directory = Self::new();
        if let Err(err) = directory.register(&RegisterRequest {
            first_name: "John".into(),
            last_name: "Doe".into(),
            email: DEMO_EMAIL.into(),
            password: DEMO_PASSWORD.into(),
        }) {
            warn!(message = %err.message, "failed to seed demo account");
        }
        directory
    }

    pub fn register(&self, request: &RegisterRequest) -> Result<User, ApiError> {
        let first_name = request.first_name.trim();
        let last_name = request.last_name.trim();
        if first_name.is_empty() || last_name.is_empty() {
            return Err(ApiError::new(
                ErrorCode::Validation,
                "first and last name are required",
            ));
        }
        let email = normalize_email(&request.email);
        if !is_plausible_email(&email) {
            return Err(ApiError::new(ErrorCode::Validation, "email is invalid"));
        }
        ensure_password_strength(&request.password)?;

        let mut accounts = self.accounts.write().unwrap_or_else(PoisonError::into_inner);
        if accounts.contains_key(&email) {
            return Err(ApiError::new(
                ErrorCode::Conflict,
                "an account with this email already exists",
            ));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let user = User {
            id: UserId(id.to_string()),
            email: email.clone(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
        };
        accounts.insert(
            email.clone(),
            Account {
                user: user.clone(),
                password_digest: password_digest(&email, &request.password),
            },
        );
        Ok(user)
    }

    pub fn login(&self, request: &LoginRequest) -> Result<User, ApiError> {
        let email = normalize_email(&request.email);
        let accounts = self.accounts.read().unwrap_or_else(PoisonError::into_inner);
        match accounts.get(&email) {
            Some(account)
                if account.password_digest == password_digest(&email, &request.password) =>
            {
                Ok(account.user.clone())
            }
            _ => Err(invalid_credentials()),
        }
    }

    pub fn change_password(&self, request: &ChangePasswordRequest) -> Result<(), ApiError> {
        let email = normalize_email(&request.email);
        ensure_password_strength(&request.new_password)?;

        let mut accounts = self.accounts.write().unwrap_or_else(PoisonError::into_inner);
        let account = accounts
            .get_mut(&email)
            .filter(|account| {
                account.password_digest == password_digest(&email, &request.old_password)
            })
            .ok_or_else(invalid_credentials)?;
        account.password_digest = password_digest(&email, &request.new_password);
        Ok(())
    }

    pub fn account_count(&self) -> usize {
        self.accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

fn ensure_password_strength(password: &str) -> Result<(), ApiError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::new(
            ErrorCode::Validation,
            format!("password must be at least {MIN_PASSWORD_LEN} characters"),
        ));
    }
    Ok(())
}

fn password_digest(email: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(email.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    STANDARD.encode(hasher.finalize())
}

fn invalid_credentials() -> ApiError {
    ApiError::new(ErrorCode::Unauthorized, "invalid email or password")
}
