//! Send Email Lambda - delivers transactional mail for the site.
//!
//! - OPTIONS - CORS preflight
//! - POST `{to, subject, html, text?}` - send through Resend
//!
//! Responds 200 `{success: true}`, 400 when a required field is missing,
//! 500 when the mail provider rejects the message.

use lambda_http::{run, service_fn, Body, Error, Request, Response};
use serde::Serialize;
use shared::http::{error_response, json_response, preflight_response};
use shared::mail::{MailSender, ResendMailer, SendEmailPayload};
use shared::Config;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Serialize)]
struct SendResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
}

/// Application state
struct AppState {
    mailer: Box<dyn MailSender>,
}

impl AppState {
    fn new(config: Config) -> Self {
        if config.mail_api_key.is_none() {
            warn!("RESEND_API_KEY not set; sends will fail");
        }

        Self {
            mailer: Box::new(ResendMailer::new(config.mail_api_key, config.mail_from)),
        }
    }
}

async fn handler(state: Arc<AppState>, event: Request) -> Result<Response<Body>, Error> {
    match event.method().as_str() {
        "OPTIONS" => preflight_response(),
        "POST" => send(&state, &event).await,
        other => error_response(405, format!("Method {} not allowed", other)),
    }
}

async fn send(state: &AppState, event: &Request) -> Result<Response<Body>, Error> {
    let body = event.body();
    let payload: SendEmailPayload = if body.as_ref().is_empty() {
        SendEmailPayload::default()
    } else {
        match serde_json::from_slice(body.as_ref()) {
            Ok(payload) => payload,
            Err(e) => return error_response(400, format!("Invalid request body: {}", e)),
        }
    };

    let email = match payload.into_request() {
        Ok(email) => email,
        Err(_) => return error_response(400, shared::mail::MISSING_FIELDS_MESSAGE),
    };

    match state.mailer.send(&email).await {
        Ok(sent) => {
            info!(subject = %email.subject, "Email delivered to provider");
            json_response(
                200,
                &SendResponse {
                    success: true,
                    id: sent.id,
                },
            )
        }
        Err(e) => {
            error!(error = %e, subject = %email.subject, "Failed to send email");
            error_response(500, e.to_string())
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let state = Arc::new(AppState::new(Config::from_env()));

    run(service_fn(move |event| {
        let state = Arc::clone(&state);
        async move { handler(state, event).await }
    }))
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lambda_http::http;
    use shared::mail::{EmailRequest, SentEmail};
    use shared::Error as SharedError;
    use std::sync::Mutex;

    /// Accepts or rejects every message, remembering what it was given.
    struct FakeMailer {
        failure: Option<String>,
        sent: Mutex<Vec<EmailRequest>>,
    }

    #[async_trait]
    impl MailSender for FakeMailer {
        async fn send(&self, email: &EmailRequest) -> shared::Result<SentEmail> {
            self.sent.lock().unwrap().push(email.clone());
            match &self.failure {
                Some(message) => Err(SharedError::Remote {
                    status: 422,
                    message: message.clone(),
                }),
                None => Ok(serde_json::from_value(serde_json::json!({"id": "email_1"})).unwrap()),
            }
        }
    }

    fn state(failure: Option<&str>) -> Arc<AppState> {
        Arc::new(AppState {
            mailer: Box::new(FakeMailer {
                failure: failure.map(String::from),
                sent: Mutex::new(Vec::new()),
            }),
        })
    }

    fn request(method: &str, body: &str) -> Request {
        http::Request::builder()
            .method(method)
            .uri("/send-email")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn json(response: &Response<Body>) -> serde_json::Value {
        serde_json::from_slice(response.body().as_ref()).unwrap()
    }

    #[tokio::test]
    async fn test_missing_fields_is_400() {
        for body in [
            r#"{"subject":"Hi","html":"<p>x</p>"}"#,
            r#"{"to":"a@b.c","html":"<p>x</p>"}"#,
            r#"{"to":"a@b.c","subject":"Hi"}"#,
            "",
        ] {
            let response = handler(state(None), request("POST", body)).await.unwrap();
            assert_eq!(response.status(), 400, "body: {}", body);
            assert_eq!(json(&response)["error"], shared::mail::MISSING_FIELDS_MESSAGE);
        }
    }

    #[tokio::test]
    async fn test_malformed_json_is_400() {
        let response = handler(state(None), request("POST", "{not json")).await.unwrap();
        assert_eq!(response.status(), 400);
        assert!(json(&response)["error"].is_string());
    }

    #[tokio::test]
    async fn test_accepted_message_is_200() {
        let response = handler(
            state(None),
            request(
                "POST",
                r#"{"to":"a@b.c","subject":"Hi","html":"<p>x</p>","text":"x"}"#,
            ),
        )
        .await
        .unwrap();

        assert_eq!(response.status(), 200);
        let body = json(&response);
        assert_eq!(body["success"], true);
        assert_eq!(body["id"], "email_1");
    }

    #[tokio::test]
    async fn test_provider_failure_is_500_with_message() {
        let response = handler(
            state(Some("Invalid `to` field.")),
            request("POST", r#"{"to":"nope","subject":"Hi","html":"<p>x</p>"}"#),
        )
        .await
        .unwrap();

        assert_eq!(response.status(), 500);
        assert_eq!(json(&response)["error"], "Invalid `to` field.");
    }

    #[tokio::test]
    async fn test_preflight_and_method_not_allowed() {
        let response = handler(state(None), request("OPTIONS", "")).await.unwrap();
        assert_eq!(response.status(), 200);
        assert!(response
            .headers()
            .contains_key("access-control-allow-headers"));

        let response = handler(state(None), request("GET", "")).await.unwrap();
        assert_eq!(response.status(), 405);
    }
}
