// Session credential store

use std::sync::{Arc, OnceLock, RwLock};

use super::types::CredentialSet;
use crate::storage::{DurableStorage, MemoryStorage};

/// Storage key of the user access token
pub const TOKEN_KEY: &str = "token-538";
/// Storage key of the refresh token
pub const REFRESH_TOKEN_KEY: &str = "refreshToken-538";
/// Storage key of the websocket token
pub const WS_TOKEN_KEY: &str = "wsToken-538";

#[derive(Debug, Default)]
struct SessionTokens {
    token: String,
    refresh_token: String,
    ws_token: String,
}

/// Credential store shared by every client
///
/// User, refresh and ws tokens write through to durable storage and to an
/// in-memory mirror. Reads prefer a non-empty durable value. The app token
/// lives in memory only and is set once per process by the config bootstrap.
pub struct CredentialStore {
    storage: Arc<dyn DurableStorage>,
    memory: RwLock<SessionTokens>,
    app_token: OnceLock<String>,
}

impl CredentialStore {
    /// Create a store over durable storage, rehydrating any persisted session
    pub fn new(storage: Arc<dyn DurableStorage>) -> Self {
        let memory = SessionTokens {
            token: storage.get(TOKEN_KEY).unwrap_or_default(),
            refresh_token: storage.get(REFRESH_TOKEN_KEY).unwrap_or_default(),
            ws_token: storage.get(WS_TOKEN_KEY).unwrap_or_default(),
        };

        tracing::debug!(
            has_token = !memory.token.is_empty(),
            has_refresh_token = !memory.refresh_token.is_empty(),
            "Credential store initialized"
        );

        Self {
            storage,
            memory: RwLock::new(memory),
            app_token: OnceLock::new(),
        }
    }

    /// Store backed only by process memory
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// App token, empty until the bootstrap has run
    pub fn app_token(&self) -> String {
        self.app_token.get().cloned().unwrap_or_default()
    }

    pub fn has_app_token(&self) -> bool {
        self.app_token
            .get()
            .is_some_and(|token| !token.trim().is_empty())
    }

    /// Set the app token. Returns false if one was already set; the first value wins.
    pub fn set_app_token(&self, token: impl Into<String>) -> bool {
        let token = token.into();
        match self.app_token.set(token) {
            Ok(()) => true,
            Err(rejected) => {
                if self.app_token.get() != Some(&rejected) {
                    tracing::warn!("App token already set for this process, ignoring new value");
                }
                false
            }
        }
    }

    pub fn user_access_token(&self) -> String {
        self.read_through(TOKEN_KEY, |m| &m.token)
    }

    pub fn set_user_access_token(&self, token: &str) {
        self.write_through(TOKEN_KEY, token, |m| &mut m.token);
    }

    pub fn refresh_token(&self) -> String {
        self.read_through(REFRESH_TOKEN_KEY, |m| &m.refresh_token)
    }

    pub fn set_refresh_token(&self, token: &str) {
        self.write_through(REFRESH_TOKEN_KEY, token, |m| &mut m.refresh_token);
    }

    pub fn ws_token(&self) -> String {
        self.read_through(WS_TOKEN_KEY, |m| &m.ws_token)
    }

    pub fn set_ws_token(&self, token: &str) {
        self.write_through(WS_TOKEN_KEY, token, |m| &mut m.ws_token);
    }

    /// Store a full session, as returned by login or refresh
    pub fn set_session(&self, token: &str, refresh_token: &str, ws_token: &str) {
        self.set_user_access_token(token);
        self.set_refresh_token(refresh_token);
        self.set_ws_token(ws_token);
    }

    /// True when a user session is present
    pub fn is_logged_in(&self) -> bool {
        !self.user_access_token().is_empty()
    }

    pub fn snapshot(&self) -> CredentialSet {
        CredentialSet {
            app_token: self.app_token(),
            user_access_token: self.user_access_token(),
            refresh_token: self.refresh_token(),
            ws_token: self.ws_token(),
        }
    }

    /// Wipe the session and every other persisted key. The app token stays.
    pub fn clear_all(&self) {
        let mut memory = self
            .memory
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        self.storage.clear();
        *memory = SessionTokens::default();

        tracing::info!("Session credentials cleared");
    }

    fn read_through(&self, key: &str, field: impl Fn(&SessionTokens) -> &String) -> String {
        if let Some(value) = self.storage.get(key).filter(|v| !v.is_empty()) {
            return value;
        }

        let memory = self
            .memory
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        field(&memory).clone()
    }

    fn write_through(
        &self,
        key: &str,
        value: &str,
        field: impl Fn(&mut SessionTokens) -> &mut String,
    ) {
        // Hold the mirror lock across the durable write so readers never see them disagree
        let mut memory = self
            .memory
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        self.storage.set(key, value);
        *field(&mut memory) = value.to_string();
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("has_app_token", &self.has_app_token())
            .field("logged_in", &self.is_logged_in())
            .finish()
    }
}
