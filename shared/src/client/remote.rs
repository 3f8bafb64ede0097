//! Client bound to the hosted backend's REST endpoints.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

use super::{
    AuthEvent, AuthListener, AuthListeners, Backend, ClientOptions, FileSessionStore,
    MemorySessionStore, OAuthRedirect, OAuthSignIn, Session, SessionStore, SessionTokens,
    Subscription, TableQuery, User,
};
use crate::auth::decode_claims;
use crate::config::BackendConfig;
use crate::{Error, Result};

/// Sessions this close to expiry are refreshed before use.
const REFRESH_MARGIN_SECS: i64 = 60;

/// Token endpoint response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: User,
}

impl TokenResponse {
    fn into_session(self, now: i64) -> Result<Session> {
        Ok(Session {
            expires_at: expiry(self.expires_at, self.expires_in, now)?,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            token_type: self.token_type.unwrap_or_else(|| "bearer".to_string()),
            user: self.user,
        })
    }
}

/// Absolute expiry from either an explicit timestamp or a lifetime in seconds.
fn expiry(expires_at: Option<i64>, expires_in: Option<i64>, now: i64) -> Result<Option<i64>> {
    match (expires_at, expires_in) {
        (Some(at), _) => Ok(Some(at)),
        (None, Some(secs)) => now
            .checked_add(secs)
            .map(Some)
            .ok_or_else(|| Error::Auth(format!("Token lifetime out of range: {}", secs))),
        (None, None) => Ok(None),
    }
}

/// Backend client talking to `/auth/v1`, `/rest/v1` and `/functions/v1`.
pub struct RemoteClient {
    http: reqwest::Client,
    endpoint: String,
    public_key: String,
    options: ClientOptions,
    session: RwLock<Option<Session>>,
    store: Box<dyn SessionStore>,
    listeners: Arc<AuthListeners>,
}

impl RemoteClient {
    pub fn new(config: &BackendConfig, options: ClientOptions) -> Self {
        let store: Box<dyn SessionStore> = match (&options.session_file, options.persist_session) {
            (Some(path), true) => Box::new(FileSessionStore::new(path.clone())),
            _ => Box::new(MemorySessionStore),
        };

        let session = store.load().unwrap_or_else(|e| {
            warn!(error = %e, "Discarding unreadable persisted session");
            None
        });

        Self {
            http: reqwest::Client::new(),
            endpoint: config.endpoint_url.trim().trim_end_matches('/').to_string(),
            public_key: config.public_key.trim().to_string(),
            options,
            session: RwLock::new(session),
            store,
            listeners: Arc::new(AuthListeners::default()),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    /// Generate the authorize URL the user is redirected to.
    fn authorize_url(&self, request: &OAuthSignIn) -> String {
        let mut url = format!(
            "{}?provider={}",
            self.url("/auth/v1/authorize"),
            urlencoding::encode(&request.provider)
        );

        if let Some(redirect_to) = &request.redirect_to {
            url.push_str(&format!("&redirect_to={}", urlencoding::encode(redirect_to)));
        }
        if let Some(scopes) = &request.scopes {
            url.push_str(&format!("&scopes={}", urlencoding::encode(scopes)));
        }
        for (key, value) in &request.query_params {
            url.push_str(&format!(
                "&{}={}",
                urlencoding::encode(key),
                urlencoding::encode(value)
            ));
        }

        url
    }

    /// Bearer for data requests: the session's access token, else the public key.
    ///
    /// A session that exists but can no longer be refreshed is an error, not
    /// an anonymous request.
    async fn access_token(&self) -> Result<String> {
        Ok(match self.get_session().await? {
            Some(session) => session.access_token,
            None => self.public_key.clone(),
        })
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(remote_error(status, &body));
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        Ok(serde_json::from_str(&body)?)
    }

    async fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let token = self.access_token().await?;
        Ok(request.header("apikey", &self.public_key).bearer_auth(token))
    }

    async fn fetch_user(&self, access_token: &str) -> Result<User> {
        let request = self
            .http
            .get(self.url("/auth/v1/user"))
            .header("apikey", &self.public_key)
            .bearer_auth(access_token);

        let body = self.send(request).await.map_err(as_auth_error)?;
        Ok(serde_json::from_value(body)?)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Session> {
        let request = self
            .http
            .post(self.url("/auth/v1/token"))
            .query(&[("grant_type", "refresh_token")])
            .header("apikey", &self.public_key)
            .json(&serde_json::json!({ "refresh_token": refresh_token }));

        let body = self.send(request).await.map_err(as_auth_error)?;
        let token: TokenResponse = serde_json::from_value(body)?;
        token.into_session(Utc::now().timestamp())
    }

    async fn replace_session(&self, session: Option<Session>, event: AuthEvent) {
        *self.session.write().await = session.clone();

        if self.options.persist_session {
            let persisted = match &session {
                Some(s) => self.store.save(s),
                None => self.store.clear(),
            };
            if let Err(e) = persisted {
                warn!(error = %e, "Failed to persist auth session");
            }
        }

        self.listeners.emit(event, session.as_ref());
    }
}

#[async_trait]
impl Backend for RemoteClient {
    fn is_configured(&self) -> bool {
        true
    }

    fn on_auth_state_change(&self, listener: AuthListener) -> Subscription {
        self.listeners.subscribe(listener)
    }

    async fn sign_in_with_oauth(&self, request: OAuthSignIn) -> Result<OAuthRedirect> {
        Ok(OAuthRedirect {
            url: self.authorize_url(&request),
            provider: request.provider,
        })
    }

    async fn get_session(&self) -> Result<Option<Session>> {
        let current = self.session.read().await.clone();
        let Some(session) = current else {
            return Ok(None);
        };

        let now = Utc::now().timestamp();
        if !self.options.auto_refresh_token || !session.expires_within(REFRESH_MARGIN_SECS, now) {
            return Ok(Some(session));
        }
        let Some(refresh_token) = session.refresh_token.clone() else {
            return Ok(Some(session));
        };

        match self.refresh(&refresh_token).await {
            Ok(fresh) => {
                debug!(user_id = %fresh.user.id, "Refreshed auth session");
                self.replace_session(Some(fresh.clone()), AuthEvent::TokenRefreshed)
                    .await;
                Ok(Some(fresh))
            }
            Err(e) => {
                warn!(error = %e, "Session refresh failed, signing out");
                self.replace_session(None, AuthEvent::SignedOut).await;
                Err(e)
            }
        }
    }

    async fn set_session(&self, tokens: SessionTokens) -> Result<Session> {
        let user = self.fetch_user(&tokens.access_token).await?;
        let expires_at = match decode_claims(&tokens.access_token) {
            Ok(claims) => claims.exp,
            Err(e) => {
                debug!(error = %e, "Access token expiry unreadable");
                None
            }
        };

        let session = Session {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            token_type: "bearer".to_string(),
            expires_at,
            user,
        };

        self.replace_session(Some(session.clone()), AuthEvent::SignedIn)
            .await;
        Ok(session)
    }

    async fn session_from_url(&self, url: &str) -> Result<Option<Session>> {
        if !self.options.detect_session_in_url {
            return Ok(None);
        }

        let params = callback_params(url)?;

        if let Some(error) = params
            .get("error_description")
            .or_else(|| params.get("error"))
        {
            return Err(Error::Auth(error.clone()));
        }

        let Some(access_token) = params.get("access_token") else {
            return Ok(None);
        };

        let expires_at = expiry(
            params.get("expires_at").and_then(|v| v.parse::<i64>().ok()),
            params.get("expires_in").and_then(|v| v.parse::<i64>().ok()),
            Utc::now().timestamp(),
        )?;
        let user = self.fetch_user(access_token).await?;

        let session = Session {
            access_token: access_token.clone(),
            refresh_token: params.get("refresh_token").cloned(),
            token_type: params
                .get("token_type")
                .cloned()
                .unwrap_or_else(|| "bearer".to_string()),
            expires_at,
            user,
        };

        info!(user_id = %session.user.id, "Session detected in callback URL");
        self.replace_session(Some(session.clone()), AuthEvent::SignedIn)
            .await;
        Ok(Some(session))
    }

    async fn sign_out(&self) -> Result<()> {
        let current = self.session.read().await.clone();

        let result = match current {
            Some(session) => {
                let request = self
                    .http
                    .post(self.url("/auth/v1/logout"))
                    .header("apikey", &self.public_key)
                    .bearer_auth(&session.access_token);

                match self.send(request).await {
                    // Session already gone server-side
                    Err(Error::Remote {
                        status: 401 | 403 | 404,
                        ..
                    }) => Ok(()),
                    other => other.map(|_| ()),
                }
            }
            None => Ok(()),
        };

        self.replace_session(None, AuthEvent::SignedOut).await;
        result
    }

    async fn select(&self, query: &TableQuery) -> Result<Vec<Value>> {
        let request = self
            .http
            .get(self.url(&format!("/rest/v1/{}", query.table)))
            .query(&query.query_pairs());

        let body = self.send(self.authorized(request).await?).await?;
        Ok(into_rows(body))
    }

    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>> {
        let request = self
            .http
            .post(self.url(&format!("/rest/v1/{}", table)))
            .header("Prefer", "return=representation")
            .json(&rows);

        let body = self.send(self.authorized(request).await?).await?;
        Ok(into_rows(body))
    }

    async fn update(&self, query: &TableQuery, values: Value) -> Result<Vec<Value>> {
        let request = self
            .http
            .patch(self.url(&format!("/rest/v1/{}", query.table)))
            .query(&query.filter_pairs())
            .header("Prefer", "return=representation")
            .json(&values);

        let body = self.send(self.authorized(request).await?).await?;
        Ok(into_rows(body))
    }

    async fn delete(&self, query: &TableQuery) -> Result<()> {
        let request = self
            .http
            .delete(self.url(&format!("/rest/v1/{}", query.table)))
            .query(&query.filter_pairs());

        self.send(self.authorized(request).await?).await?;
        Ok(())
    }

    async fn invoke(&self, function: &str, body: Value) -> Result<Value> {
        let request = self
            .http
            .post(self.url(&format!("/functions/v1/{}", function)))
            .json(&body);

        self.send(self.authorized(request).await?).await
    }
}

/// Build the error for a non-2xx response, keeping the backend's own message.
pub(crate) fn remote_error(status: StatusCode, body: &str) -> Error {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|json| {
            ["message", "error_description", "msg", "error"]
                .iter()
                .find_map(|key| json.get(key).and_then(|v| v.as_str()).map(String::from))
        })
        .or_else(|| {
            let trimmed = body.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        });

    Error::Remote {
        status: status.as_u16(),
        message,
    }
}

/// Client errors from the auth endpoints mean the credentials were rejected.
fn as_auth_error(error: Error) -> Error {
    match error {
        Error::Remote { status, message } if (400..500).contains(&status) => Error::Auth(message),
        other => other,
    }
}

fn into_rows(body: Value) -> Vec<Value> {
    match body {
        Value::Array(rows) => rows,
        Value::Null => Vec::new(),
        row => vec![row],
    }
}

/// Query and fragment parameters of a callback URL, fragment winning.
fn callback_params(url: &str) -> Result<HashMap<String, String>> {
    let parsed = Url::parse(url).map_err(|e| Error::Auth(format!("Invalid callback URL: {}", e)))?;

    let mut params: HashMap<String, String> = parsed.query_pairs().into_owned().collect();
    if let Some(fragment) = parsed.fragment() {
        params.extend(url::form_urlencoded::parse(fragment.as_bytes()).into_owned());
    }

    Ok(params)
}
