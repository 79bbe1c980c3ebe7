//! Session store with pluggable persistence.
//!
//! The session is an explicit object with a defined lifecycle: loaded once at
//! init, validity-checked on every read, and torn down by `logout`, which
//! clears every persisted key. Storage access goes through the injected
//! [`SessionBackend`] rather than any ambient global.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api_client::ApiClient;

const SESSION_KEY: &str = "opspulse_session";
const ENDPOINT_KEY: &str = "opspulse_endpoint";

/// How long a demo session stays valid.
const SESSION_TTL_HOURS: i64 = 24;

// Demo-only credentials, compared in plaintext. This mirrors the demo login of
// the dashboard and must be replaced with a real identity provider before any
// production use.
const DEMO_USERNAME: &str = "admin";
const DEMO_PASSWORD: &str = "demo1234";

/// Key/value persistence seam for session data.
pub trait SessionBackend: Send + Sync {
    fn load(&self, key: &str) -> Option<String>;
    /// Returns `true` if the write succeeded.
    fn save(&self, key: &str, value: &str) -> bool;
    fn remove(&self, key: &str);
}

/// JSON files in the platform config directory (`~/.config/opspulse/` on
/// Linux).
pub struct FileBackend {
    dir: Option<PathBuf>,
}

impl FileBackend {
    pub fn new() -> Self {
        Self::with_dir(dirs::config_dir().map(|d| d.join("opspulse")))
    }

    /// Use a specific directory instead of the platform default.
    pub fn with_dir(dir: Option<PathBuf>) -> Self {
        if let Some(dir) = &dir {
            if !dir.exists() {
                let _ = std::fs::create_dir_all(dir);
            }
        }
        Self { dir }
    }

    fn file_path(&self, key: &str) -> Option<PathBuf> {
        let dir = self.dir.as_ref()?;
        // Sanitize the key so it is a valid filename.
        let safe_key = key.replace(['/', '\\', ':', '*', '?', '"', '<', '>', '|'], "_");
        Some(dir.join(format!("{safe_key}.json")))
    }
}

impl Default for FileBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionBackend for FileBackend {
    fn load(&self, key: &str) -> Option<String> {
        let path = self.file_path(key)?;
        std::fs::read_to_string(path).ok()
    }

    fn save(&self, key: &str, value: &str) -> bool {
        let Some(path) = self.file_path(key) else {
            return false;
        };
        std::fs::write(path, value).is_ok()
    }

    fn remove(&self, key: &str) {
        if let Some(path) = self.file_path(key) {
            let _ = std::fs::remove_file(path);
        }
    }
}

/// In-memory backend for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryBackend {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionBackend for MemoryBackend {
    fn load(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .expect("memory backend poisoned")
            .get(key)
            .cloned()
    }

    fn save(&self, key: &str, value: &str) -> bool {
        self.values
            .lock()
            .expect("memory backend poisoned")
            .insert(key.to_string(), value.to_string());
        true
    }

    fn remove(&self, key: &str) {
        self.values
            .lock()
            .expect("memory backend poisoned")
            .remove(key);
    }
}

/// An authenticated session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub user_id: String,
    pub token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_valid(&self) -> bool {
        Utc::now() < self.expires_at
    }
}

/// Holds the current session and keeps it in sync with the backend.
pub struct SessionStore {
    backend: Arc<dyn SessionBackend>,
    session: Mutex<Option<Session>>,
}

impl SessionStore {
    /// Load any persisted session; an expired one is discarded immediately.
    pub fn init(backend: Arc<dyn SessionBackend>) -> Self {
        let session = backend
            .load(SESSION_KEY)
            .and_then(|json| serde_json::from_str::<Session>(&json).ok())
            .filter(|session| {
                if session.is_valid() {
                    true
                } else {
                    tracing::info!("discarding expired session for {}", session.user_id);
                    backend.remove(SESSION_KEY);
                    false
                }
            });
        Self {
            backend,
            session: Mutex::new(session),
        }
    }

    /// Store and persist a session for `user_id` with a fresh token.
    pub fn login(&self, user_id: impl Into<String>) -> Session {
        let now = Utc::now();
        let session = Session {
            user_id: user_id.into(),
            token: Uuid::new_v4().to_string(),
            issued_at: now,
            expires_at: now + Duration::hours(SESSION_TTL_HOURS),
        };
        if let Ok(json) = serde_json::to_string(&session) {
            if !self.backend.save(SESSION_KEY, &json) {
                tracing::warn!("failed to persist session");
            }
        }
        *self.session.lock().expect("session store poisoned") = Some(session.clone());
        session
    }

    /// Demo login: plaintext comparison against literal constants.
    pub fn login_demo(&self, username: &str, password: &str) -> Result<Session, String> {
        if username == DEMO_USERNAME && password == DEMO_PASSWORD {
            Ok(self.login(username))
        } else {
            Err("Invalid credentials".to_string())
        }
    }

    /// Tear down the session and clear every persisted key.
    pub fn logout(&self) {
        self.backend.remove(SESSION_KEY);
        self.backend.remove(ENDPOINT_KEY);
        *self.session.lock().expect("session store poisoned") = None;
    }

    /// Current session, revalidated against its expiry on every read.
    pub fn current(&self) -> Option<Session> {
        let mut guard = self.session.lock().expect("session store poisoned");
        if let Some(session) = guard.as_ref() {
            if !session.is_valid() {
                tracing::info!("session for {} expired", session.user_id);
                self.backend.remove(SESSION_KEY);
                *guard = None;
            }
        }
        guard.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.current().is_some()
    }

    pub fn user_id(&self) -> Option<String> {
        self.current().map(|s| s.user_id)
    }

    /// Persist the preferred API endpoint.
    pub fn set_endpoint(&self, endpoint: &str) {
        self.backend.save(ENDPOINT_KEY, endpoint);
    }

    pub fn endpoint(&self) -> Option<String> {
        self.backend.load(ENDPOINT_KEY)
    }

    /// An API client carrying this session's token.
    pub fn api_client(&self, base_url: &str) -> ApiClient {
        ApiClient::new()
            .with_base_url(base_url)
            .with_token(self.current().map(|s| s.token))
    }
}
