//! Auth session state: the session itself, where it is persisted, and who is
//! told when it changes.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use uuid::Uuid;

use crate::{Error, Result};

/// Authenticated user as reported by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

impl User {
    /// Best display name available: full name from the provider, then email.
    pub fn display_name(&self) -> Option<String> {
        ["full_name", "name"]
            .iter()
            .find_map(|key| self.user_metadata.get(key).and_then(|v| v.as_str()))
            .map(String::from)
            .or_else(|| self.email.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Unix seconds
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: User,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl Session {
    /// True when the session expires within `margin_secs` of `now`.
    pub fn expires_within(&self, margin_secs: i64, now: i64) -> bool {
        self.expires_at
            .map(|at| at.saturating_sub(now) <= margin_secs)
            .unwrap_or(false)
    }
}

/// Tokens handed to a client to adopt an existing session.
#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

pub type AuthListener = Arc<dyn Fn(AuthEvent, Option<&Session>) + Send + Sync>;

/// Registered auth state listeners.
#[derive(Default)]
pub struct AuthListeners {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(u64, AuthListener)>>,
}

impl AuthListeners {
    pub fn subscribe(self: &Arc<Self>, listener: AuthListener) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().push((id, listener));
        Subscription {
            registration: Some((Arc::downgrade(self), id)),
        }
    }

    pub fn emit(&self, event: AuthEvent, session: Option<&Session>) {
        // Snapshot so listeners may subscribe or unsubscribe while being called.
        let listeners: Vec<AuthListener> = self.lock().iter().map(|(_, l)| l.clone()).collect();
        for listener in listeners {
            listener(event, session);
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remove(&self, id: u64) {
        self.lock().retain(|(existing, _)| *existing != id);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(u64, AuthListener)>> {
        self.listeners.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Handle returned by `on_auth_state_change`; always safe to unsubscribe.
#[derive(Debug, Default)]
pub struct Subscription {
    registration: Option<(Weak<AuthListeners>, u64)>,
}

impl Subscription {
    /// A subscription attached to nothing.
    pub fn noop() -> Self {
        Self { registration: None }
    }

    pub fn is_active(&self) -> bool {
        self.registration
            .as_ref()
            .map(|(listeners, _)| listeners.strong_count() > 0)
            .unwrap_or(false)
    }

    pub fn unsubscribe(self) {
        if let Some((listeners, id)) = self.registration {
            if let Some(listeners) = listeners.upgrade() {
                listeners.remove(id);
            }
        }
    }
}

impl std::fmt::Debug for AuthListeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthListeners")
            .field("count", &self.len())
            .finish()
    }
}

/// Where a client keeps its session between process runs.
pub trait SessionStore: Send + Sync {
    fn load(&self) -> Result<Option<Session>>;
    fn save(&self, session: &Session) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Keeps nothing; the session lives only in the client.
#[derive(Debug, Default)]
pub struct MemorySessionStore;

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<Session>> {
        Ok(None)
    }

    fn save(&self, _session: &Session) -> Result<()> {
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        Ok(())
    }
}

/// JSON file holding the last session.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<Session>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Internal(format!(
                "Failed to read session file {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    fn save(&self, session: &Session) -> Result<()> {
        let contents = serde_json::to_string_pretty(session)?;
        fs::write(&self.path, contents).map_err(|e| {
            Error::Internal(format!(
                "Failed to write session file {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Internal(format!(
                "Failed to remove session file {}: {}",
                self.path.display(),
                e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn session() -> Session {
        Session {
            access_token: "access".to_string(),
            refresh_token: Some("refresh".to_string()),
            token_type: "bearer".to_string(),
            expires_at: Some(1_000),
            user: User {
                id: Uuid::new_v4(),
                email: Some("jane@example.com".to_string()),
                user_metadata: serde_json::json!({"full_name": "Jane Smith"}),
            },
        }
    }

    #[test]
    fn test_expires_within() {
        let s = session();
        assert!(s.expires_within(60, 950));
        assert!(!s.expires_within(60, 900));

        let no_expiry = Session {
            expires_at: None,
            ..session()
        };
        assert!(!no_expiry.expires_within(60, i64::MAX));

        let far_past = Session {
            expires_at: Some(i64::MIN),
            ..session()
        };
        assert!(far_past.expires_within(60, 1_000));

        let far_future = Session {
            expires_at: Some(i64::MAX),
            ..session()
        };
        assert!(!far_future.expires_within(60, -1_000));
    }

    #[test]
    fn test_display_name_prefers_metadata() {
        let s = session();
        assert_eq!(s.user.display_name().as_deref(), Some("Jane Smith"));

        let user = User {
            user_metadata: serde_json::Value::Null,
            ..s.user
        };
        assert_eq!(user.display_name().as_deref(), Some("jane@example.com"));
    }

    #[test]
    fn test_listeners_receive_events_until_unsubscribed() {
        let listeners = Arc::new(AuthListeners::default());
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        let subscription = listeners.subscribe(Arc::new(move |event, _| {
            assert_eq!(event, AuthEvent::SignedOut);
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert!(subscription.is_active());

        listeners.emit(AuthEvent::SignedOut, None);
        subscription.unsubscribe();
        listeners.emit(AuthEvent::SignedOut, None);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(listeners.is_empty());
    }

    #[test]
    fn test_noop_subscription() {
        let subscription = Subscription::noop();
        assert!(!subscription.is_active());
        subscription.unsubscribe();
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().join("session.json"));

        assert_eq!(store.load().unwrap(), None);

        let s = session();
        store.save(&s).unwrap();
        assert_eq!(store.load().unwrap(), Some(s));

        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
        store.clear().unwrap();
    }
}
