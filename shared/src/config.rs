//! Configuration management, loaded once from environment variables.

use std::env;
use std::path::PathBuf;

const DEFAULT_APP_URL: &str = "http://localhost:3000";
const DEFAULT_MAIL_FROM: &str = "Course Site <noreply@example.com>";

/// Execution context; development mode surfaces configuration warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Default for Environment {
    fn default() -> Self {
        Self::parse(None)
    }
}

impl Environment {
    fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("production") | Some("prod") => Environment::Production,
            Some("development") | Some("dev") => Environment::Development,
            _ if cfg!(debug_assertions) => Environment::Development,
            _ => Environment::Production,
        }
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }
}

/// Endpoint and public key of the hosted backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendConfig {
    pub endpoint_url: String,
    pub public_key: String,
}

impl BackendConfig {
    pub fn new(endpoint_url: impl Into<String>, public_key: impl Into<String>) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            public_key: public_key.into(),
        }
    }

    /// Both values must be non-blank for a real client to be built.
    pub fn is_complete(&self) -> bool {
        !self.endpoint_url.trim().is_empty() && !self.public_key.trim().is_empty()
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend endpoint and public key
    pub backend: BackendConfig,
    /// Public URL of the site, used for OAuth redirects
    pub app_url: String,
    /// API key of the mail delivery service
    pub mail_api_key: Option<String>,
    /// Sender address for outgoing mail
    pub mail_from: String,
    /// Where the CLI persists its auth session
    pub session_file: Option<PathBuf>,
    pub environment: Environment,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Never fails: missing backend values leave [`BackendConfig`] incomplete,
    /// which the client factory turns into a degraded client.
    pub fn from_env() -> Self {
        Self {
            backend: BackendConfig {
                endpoint_url: env::var("SUPABASE_URL").unwrap_or_default(),
                public_key: env::var("SUPABASE_ANON_KEY").unwrap_or_default(),
            },
            app_url: non_empty_var("APP_URL").unwrap_or_else(|| DEFAULT_APP_URL.to_string()),
            mail_api_key: non_empty_var("RESEND_API_KEY"),
            mail_from: non_empty_var("MAIL_FROM").unwrap_or_else(|| DEFAULT_MAIL_FROM.to_string()),
            session_file: non_empty_var("SESSION_FILE").map(PathBuf::from),
            environment: Environment::parse(env::var("APP_ENV").ok().as_deref()),
        }
    }

    /// Where the OAuth provider sends the user back to.
    pub fn oauth_redirect_url(&self) -> String {
        format!("{}/auth/callback", self.app_url.trim_end_matches('/'))
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_config_completeness() {
        assert!(BackendConfig::new("https://x.supabase.co", "anon").is_complete());
        assert!(!BackendConfig::new("", "anon").is_complete());
        assert!(!BackendConfig::new("https://x.supabase.co", "").is_complete());
        assert!(!BackendConfig::new("  ", "\t").is_complete());
        assert!(!BackendConfig::default().is_complete());
    }

    #[test]
    fn test_environment_parse() {
        assert_eq!(Environment::parse(Some("production")), Environment::Production);
        assert_eq!(Environment::parse(Some("DEV")), Environment::Development);
    }

    #[test]
    fn test_redirect_url_strips_trailing_slash() {
        let config = Config {
            backend: BackendConfig::default(),
            app_url: "https://courses.example.com/".to_string(),
            mail_api_key: None,
            mail_from: DEFAULT_MAIL_FROM.to_string(),
            session_file: None,
            environment: Environment::Production,
        };
        assert_eq!(
            config.oauth_redirect_url(),
            "https://courses.example.com/auth/callback"
        );
    }
}
