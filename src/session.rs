//! Session context: bearer token plus resolved identity, shared by every controller.

use crate::api::{LacornApi, RequestAuth};
use crate::error::{ClientError, Result};
use crate::models::{Identity, RegisterRequest};
use crate::profile;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, info, warn};

/// Durable home of the bearer token between runs.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Option<String>;
    fn save(&self, token: &str) -> anyhow::Result<()>;
    fn clear(&self) -> anyhow::Result<()>;
}

#[derive(Serialize, Deserialize)]
struct StoredToken {
    token: String,
}

#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Option<String> {
        let raw = fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str::<StoredToken>(&raw) {
            Ok(stored) if !stored.token.trim().is_empty() => Some(stored.token),
            Ok(_) => None,
            Err(e) => {
                warn!("Ignoring unreadable token file {:?}: {}", self.path, e);
                None
            }
        }
    }

    fn save(&self, token: &str) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let body = serde_json::to_string(&StoredToken {
            token: token.to_string(),
        })?;
        fs::write(&self.path, body)
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }

    fn clear(&self) -> anyhow::Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to remove {}", self.path.display()))
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn with_token(token: &str) -> Self {
        Self {
            token: Mutex::new(Some(token.to_string())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Option<String> {
        self.token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn save(&self, token: &str) -> anyhow::Result<()> {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> anyhow::Result<()> {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

/// Sign-up form. `birth_date` is in display form (`dd.mm.yyyy`).
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub birth_date: String,
    pub password: String,
}

#[derive(Debug, Clone, Default)]
struct SessionState {
    token: Option<String>,
    identity: Option<Identity>,
}

pub struct Session {
    api: Arc<dyn LacornApi>,
    store: Arc<dyn TokenStore>,
    state: RwLock<SessionState>,
}

impl Session {
    /// Starts anonymous; call [`Session::restore_session`] to pick up a stored token.
    pub fn new(api: Arc<dyn LacornApi>, store: Arc<dyn TokenStore>) -> Self {
        Self {
            api,
            store,
            state: RwLock::new(SessionState::default()),
        }
    }

    pub fn api(&self) -> Arc<dyn LacornApi> {
        self.api.clone()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.read().identity.clone()
    }

    pub fn token(&self) -> Option<String> {
        self.read().token.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        let state = self.read();
        state.token.is_some() && state.identity.is_some()
    }

    /// Credentials for the next request; anonymous when signed out.
    pub fn auth(&self) -> RequestAuth {
        let state = self.read();
        RequestAuth {
            token: state.token.clone(),
            user_id: state.identity.as_ref().map(|i| i.id),
        }
    }

    /// Resolves a persisted token into an identity. Never fails: any problem
    /// leaves the session anonymous and drops the stored token.
    pub async fn restore_session(&self) -> Option<Identity> {
        let Some(token) = self.store.load() else {
            debug!("No stored token, starting anonymous");
            *self.write() = SessionState::default();
            return None;
        };

        match self.api.current_user(&RequestAuth::bearer(token.clone())).await {
            Ok(identity) => {
                info!("Restored session for {}", identity.username);
                *self.write() = SessionState {
                    token: Some(token),
                    identity: Some(identity.clone()),
                };
                Some(identity)
            }
            Err(e) => {
                warn!("Stored token rejected, continuing anonymous: {}", e);
                if let Err(e) = self.store.clear() {
                    warn!("Failed to clear stored token: {:#}", e);
                }
                *self.write() = SessionState::default();
                None
            }
        }
    }

    /// Exchanges credentials for a token and identity. Prior state is kept on failure.
    pub async fn login(&self, username: &str, password: &str) -> Result<Identity> {
        let token = self.api.login(username, password).await?.token;
        if token.trim().is_empty() {
            warn!("Login for {} returned an empty token", username);
            return Err(ClientError::InvalidCredentials);
        }
        let identity = self
            .api
            .current_user(&RequestAuth::bearer(token.clone()))
            .await?;

        if let Err(e) = self.store.save(&token) {
            warn!("Failed to persist session token: {:#}", e);
        }
        *self.write() = SessionState {
            token: Some(token),
            identity: Some(identity.clone()),
        };
        info!("Logged in as {}", identity.username);
        Ok(identity)
    }

    /// Creates the account, then signs in with the same credentials.
    pub async fn register(&self, form: Registration) -> Result<Identity> {
        if form.username.trim().is_empty() || form.password.is_empty() {
            return Err(ClientError::ValidationFailed(
                "username and password are required".to_string(),
            ));
        }
        // Only validates; the register endpoint expects the display form.
        profile::server_birth_date(&form.birth_date)?;

        let request = RegisterRequest {
            username: form.username.trim().to_string(),
            email: form.email.trim().to_string(),
            birth_date: form.birth_date.trim().to_string(),
            password: form.password,
        };
        let created = self.api.register(&request).await?;
        info!("Registered user {} (id {})", created.username, created.id);
        self.login(&request.username, &request.password).await
    }

    pub fn logout(&self) {
        if let Err(e) = self.store.clear() {
            warn!("Failed to clear stored token: {:#}", e);
        }
        let previous = std::mem::take(&mut *self.write());
        if let Some(identity) = previous.identity {
            info!("Logged out {}", identity.username);
        }
    }

    /// Replaces the cached identity, e.g. after a profile edit.
    pub fn update_identity(&self, identity: Identity) {
        let mut state = self.write();
        if state.token.is_some() {
            state.identity = Some(identity);
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}
