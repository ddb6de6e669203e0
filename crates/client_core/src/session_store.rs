use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, PoisonError, RwLock,
};

use serde::{Deserialize, Serialize};
use shared::{domain::User, protocol::ChangePasswordRequest};
use storage::StateStore;
use tracing::{error, info, warn};

use crate::{
    error::ClientError,
    validation::{LoginForm, PasswordChangeForm, RegistrationForm},
    IdentityProvider,
};

pub const SESSION_STORAGE_KEY: &str = "auth-storage";
const SESSION_STATE_VERSION: u32 = 0;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub user: Option<User>,
    pub is_authenticated: bool,
}

#[derive(Serialize, Deserialize)]
struct PersistedSession {
    state: SessionState,
    version: u32,
}

/// Owns the signed-in identity and keeps it in client storage.
pub struct SessionStore {
    identity: Arc<dyn IdentityProvider>,
    storage: Arc<dyn StateStore>,
    state: RwLock<SessionState>,
    busy: AtomicBool,
}

struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn enter(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl SessionStore {
    /// Builds the store and hydrates it from whatever session was last persisted.
    pub async fn load(
        identity: Arc<dyn IdentityProvider>,
        storage: Arc<dyn StateStore>,
    ) -> Self {
        let state = match storage.get_value(SESSION_STORAGE_KEY).await {
            Ok(Some(raw)) => match serde_json::from_str::<PersistedSession>(&raw) {
                Ok(persisted) => persisted.state,
                Err(err) => {
                    warn!(%err, "discarding unreadable persisted session");
                    SessionState::default()
                }
            },
            Ok(None) => SessionState::default(),
            Err(err) => {
                warn!(error = %format!("{err:#}"), "failed to read persisted session");
                SessionState::default()
            }
        };
        if let Some(user) = &state.user {
            info!(user_id = %user.id, "restored session");
        }
        Self {
            identity,
            storage,
            state: RwLock::new(state),
            busy: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn user(&self) -> Option<User> {
        self.state().user
    }

    pub fn is_authenticated(&self) -> bool {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_authenticated
    }

    /// True while an identity request is in flight.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub async fn login(&self, form: &LoginForm) -> Result<User, ClientError> {
        form.validate()?;
        let request = form.to_request();
        let user = {
            let _busy = BusyGuard::enter(&self.busy);
            self.identity
                .authenticate(&request.email, &request.password)
                .await?
        };
        info!(user_id = %user.id, "signed in");
        self.replace_state(SessionState {
            user: Some(user.clone()),
            is_authenticated: true,
        })
        .await;
        Ok(user)
    }

    /// Creates an account without signing in.
    pub async fn register(&self, form: &RegistrationForm) -> Result<(), ClientError> {
        form.validate()?;
        let request = form.to_request();
        let _busy = BusyGuard::enter(&self.busy);
        match self.identity.register(&request).await {
            Ok(()) => {
                info!(email = %request.email, "account registered");
                Ok(())
            }
            Err(err) => {
                error!(email = %request.email, %err, "registration failed");
                Err(err)
            }
        }
    }

    pub async fn logout(&self) {
        if let Some(user) = self.user() {
            info!(user_id = %user.id, "signed out");
        }
        self.replace_state(SessionState::default()).await;
    }

    /// Rotates the password of the signed-in account, then ends the session.
    pub async fn change_password(&self, form: &PasswordChangeForm) -> Result<(), ClientError> {
        let user = self.user().ok_or(ClientError::NotAuthenticated)?;
        form.validate()?;
        let request = ChangePasswordRequest {
            email: user.email.clone(),
            old_password: form.current_password.clone(),
            new_password: form.new_password.clone(),
        };
        {
            let _busy = BusyGuard::enter(&self.busy);
            self.identity.change_password(&request).await?;
        }
        info!(user_id = %user.id, "password changed; ending session");
        self.logout().await;
        Ok(())
    }

    async fn replace_state(&self, next: SessionState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = next.clone();
        let persisted = PersistedSession {
            state: next,
            version: SESSION_STATE_VERSION,
        };
        let encoded = match serde_json::to_string(&persisted) {
            Ok(encoded) => encoded,
            Err(err) => {
                error!(%err, "failed to encode session");
                return;
            }
        };
        if let Err(err) = self.storage.put_value(SESSION_STORAGE_KEY, &encoded).await {
            error!(error = %format!("{err:#}"), "failed to persist session");
        }
    }
}

#[cfg(test)]
#[path = "tests/session_store_tests.rs"]
mod tests;
