use async_trait::async_trait;
use serde_json::Value;

use super::{
    AuthListener, Backend, OAuthRedirect, OAuthSignIn, Session, SessionTokens, Subscription,
    TableQuery,
};
use crate::{Error, Result};

/// Stand-in used when the backend is not configured.
///
/// Same surface as [`RemoteClient`](super::RemoteClient); every remote
/// operation fails with [`Error::NotConfigured`] and there is never a session.
#[derive(Debug, Default, Clone, Copy)]
pub struct DegradedClient;

#[async_trait]
impl Backend for DegradedClient {
    fn is_configured(&self) -> bool {
        false
    }

    fn on_auth_state_change(&self, _listener: AuthListener) -> Subscription {
        Subscription::noop()
    }

    async fn sign_in_with_oauth(&self, _request: OAuthSignIn) -> Result<OAuthRedirect> {
        Err(Error::NotConfigured)
    }

    async fn get_session(&self) -> Result<Option<Session>> {
        Ok(None)
    }

    async fn set_session(&self, _tokens: SessionTokens) -> Result<Session> {
        Err(Error::NotConfigured)
    }

    async fn session_from_url(&self, _url: &str) -> Result<Option<Session>> {
        Err(Error::NotConfigured)
    }

    async fn sign_out(&self) -> Result<()> {
        Err(Error::NotConfigured)
    }

    async fn select(&self, _query: &TableQuery) -> Result<Vec<Value>> {
        Err(Error::NotConfigured)
    }

    async fn insert(&self, _table: &str, _rows: Vec<Value>) -> Result<Vec<Value>> {
        Err(Error::NotConfigured)
    }

    async fn update(&self, _query: &TableQuery, _values: Value) -> Result<Vec<Value>> {
        Err(Error::NotConfigured)
    }

    async fn delete(&self, _query: &TableQuery) -> Result<()> {
        Err(Error::NotConfigured)
    }

    async fn invoke(&self, _function: &str, _body: Value) -> Result<Value> {
        Err(Error::NotConfigured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_every_remote_operation_is_not_configured() {
        let client = DegradedClient;
        let query = TableQuery::new("schedules").eq("id", 1);

        assert!(matches!(client.sign_out().await, Err(Error::NotConfigured)));
        assert!(matches!(
            client.insert("schedules", vec![serde_json::json!({})]).await,
            Err(Error::NotConfigured)
        ));
        assert!(matches!(
            client.update(&query, serde_json::json!({"title": "x"})).await,
            Err(Error::NotConfigured)
        ));
        assert!(matches!(client.delete(&query).await, Err(Error::NotConfigured)));
        assert!(matches!(
            client.invoke("send-email", Value::Null).await,
            Err(Error::NotConfigured)
        ));
        assert!(matches!(
            client.session_from_url("https://site/#access_token=x").await,
            Err(Error::NotConfigured)
        ));
    }

    #[tokio::test]
    async fn test_no_session_and_noop_subscription() {
        let client = DegradedClient;
        assert_eq!(client.get_session().await.unwrap(), None);

        let subscription = client.on_auth_state_change(Arc::new(|_, _| {}));
        assert!(!subscription.is_active());
        subscription.unsubscribe();
    }
}
