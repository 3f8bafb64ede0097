//! Backend client: one capability surface, two implementations.
//!
//! [`create_client`] returns a [`RemoteClient`] when the backend endpoint and
//! public key are both configured, and a [`DegradedClient`] otherwise. Callers
//! hold an `Arc<dyn Backend>` and never check configuration themselves; with
//! the degraded client every remote operation fails with
//! [`Error::NotConfigured`](crate::Error::NotConfigured).

mod degraded;
mod query;
mod remote;
mod session;

use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

use crate::config::{BackendConfig, Config, Environment};
use crate::Result;

pub use degraded::DegradedClient;
pub use query::{Filter, Ordering, SortOrder, TableQuery};
pub use remote::RemoteClient;
pub(crate) use remote::remote_error;
pub use session::{
    AuthEvent, AuthListener, AuthListeners, FileSessionStore, MemorySessionStore, Session,
    SessionStore, SessionTokens, Subscription, User,
};

/// Request to start an OAuth sign-in through the backend.
#[derive(Debug, Clone, Default)]
pub struct OAuthSignIn {
    pub provider: String,
    pub redirect_to: Option<String>,
    pub scopes: Option<String>,
    /// Extra parameters forwarded to the provider
    pub query_params: Vec<(String, String)>,
}

/// Where to send the user to continue an OAuth sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthRedirect {
    pub provider: String,
    pub url: String,
}

/// Everything the site asks of the hosted backend.
#[async_trait]
pub trait Backend: Send + Sync {
    /// False for the degraded client.
    fn is_configured(&self) -> bool;

    fn on_auth_state_change(&self, listener: AuthListener) -> Subscription;

    async fn sign_in_with_oauth(&self, request: OAuthSignIn) -> Result<OAuthRedirect>;

    async fn get_session(&self) -> Result<Option<Session>>;

    /// Adopt a session from tokens obtained elsewhere, validating them with the backend.
    async fn set_session(&self, tokens: SessionTokens) -> Result<Session>;

    /// Pick up a session embedded in an OAuth callback URL.
    async fn session_from_url(&self, url: &str) -> Result<Option<Session>>;

    async fn sign_out(&self) -> Result<()>;

    async fn select(&self, query: &TableQuery) -> Result<Vec<Value>>;

    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>>;

    async fn update(&self, query: &TableQuery, values: Value) -> Result<Vec<Value>>;

    async fn delete(&self, query: &TableQuery) -> Result<()>;

    /// Call a remote function with a JSON body.
    async fn invoke(&self, function: &str, body: Value) -> Result<Value>;
}

/// Client behavior switches.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub auto_refresh_token: bool,
    pub persist_session: bool,
    pub detect_session_in_url: bool,
    /// Backing file when `persist_session` is on; in-memory otherwise
    pub session_file: Option<PathBuf>,
    pub environment: Environment,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            auto_refresh_token: true,
            persist_session: true,
            detect_session_in_url: true,
            session_file: None,
            environment: Environment::default(),
        }
    }
}

impl ClientOptions {
    /// Interactive defaults plus the configured session file and environment.
    pub fn from_config(config: &Config) -> Self {
        Self {
            session_file: config.session_file.clone(),
            environment: config.environment,
            ..Self::default()
        }
    }

    /// Per-request client: no refresh, no persistence, no URL detection.
    pub fn server(environment: Environment) -> Self {
        Self {
            auto_refresh_token: false,
            persist_session: false,
            detect_session_in_url: false,
            session_file: None,
            environment,
        }
    }
}

/// Build a backend client, degrading to [`DegradedClient`] when the
/// endpoint or public key is missing.
pub fn create_client(config: &BackendConfig, options: ClientOptions) -> Arc<dyn Backend> {
    if config.is_complete() {
        return Arc::new(RemoteClient::new(config, options));
    }

    if options.environment.is_development() {
        warn!(
            endpoint_set = !config.endpoint_url.trim().is_empty(),
            public_key_set = !config.public_key.trim().is_empty(),
            "Supabase environment variables are missing; remote operations will fail"
        );
    }

    Arc::new(DegradedClient)
}

/// Build the client described by the application configuration.
pub fn client_from_config(config: &Config) -> Arc<dyn Backend> {
    create_client(&config.backend, ClientOptions::from_config(config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, NOT_CONFIGURED_MESSAGE};

    fn options() -> ClientOptions {
        ClientOptions {
            persist_session: false,
            ..ClientOptions::default()
        }
    }

    #[test]
    fn test_missing_config_always_degrades() {
        let combos = [
            ("", ""),
            ("https://x.supabase.co", ""),
            ("", "anon-key"),
            ("   ", "anon-key"),
            ("https://x.supabase.co", "  "),
        ];

        for (url, key) in combos {
            let client = create_client(&BackendConfig::new(url, key), options());
            assert!(!client.is_configured(), "expected degraded for {:?}", (url, key));
        }
    }

    #[test]
    fn test_complete_config_builds_remote_client() {
        let client = create_client(
            &BackendConfig::new("https://x.supabase.co", "anon-key"),
            options(),
        );
        assert!(client.is_configured());
    }

    #[tokio::test]
    async fn test_degraded_client_fails_with_fixed_message() {
        let client = create_client(&BackendConfig::default(), options());

        let err = client
            .sign_in_with_oauth(OAuthSignIn {
                provider: "linkedin_oidc".to_string(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotConfigured));
        assert_eq!(err.to_string(), NOT_CONFIGURED_MESSAGE);

        let err = client
            .select(&TableQuery::new("schedules"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), NOT_CONFIGURED_MESSAGE);
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn logs_while_creating(config: &BackendConfig, environment: Environment) -> String {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            create_client(
                config,
                ClientOptions {
                    environment,
                    ..options()
                },
            );
        });

        logs.contents()
    }

    #[test]
    fn test_missing_config_warns_once_in_development_only() {
        let missing = BackendConfig::new("https://x.supabase.co", "");

        let logs = logs_while_creating(&missing, Environment::Development);
        assert_eq!(logs.matches("Supabase environment variables are missing").count(), 1);
        assert!(logs.contains("WARN"));

        let logs = logs_while_creating(&missing, Environment::Production);
        assert!(logs.is_empty(), "unexpected output: {}", logs);

        let complete = BackendConfig::new("https://x.supabase.co", "anon-key");
        let logs = logs_while_creating(&complete, Environment::Development);
        assert!(!logs.contains("WARN"), "unexpected output: {}", logs);
    }

    #[test]
    fn test_independent_clients() {
        let config = BackendConfig::new("https://x.supabase.co", "anon-key");
        let a = create_client(&config, options());
        let b = create_client(&config, options());
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
