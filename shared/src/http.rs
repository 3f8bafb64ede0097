//! HTTP helpers for Lambda functions.

use lambda_http::{Body, Request, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::error;

use crate::auth::bearer_token;
use crate::models::ApiResponse;
use crate::Error;

pub const CORS_ALLOW_HEADERS: &str = "authorization, x-client-info, apikey, content-type";

/// Create a JSON response with the given status code and data.
pub fn json_response<T: Serialize>(status: u16, data: &T) -> Result<Response<Body>, lambda_http::Error> {
    Ok(Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .header("access-control-allow-origin", "*")
        .header("access-control-allow-headers", CORS_ALLOW_HEADERS)
        .body(Body::from(serde_json::to_string(data)?))?)
}

/// Create an error response with the given status code and message.
pub fn error_response(status: u16, message: impl Into<String>) -> Result<Response<Body>, lambda_http::Error> {
    json_response(status, &ApiResponse::error(message))
}

/// Map a library error onto its status code, logging server-side failures.
pub fn error_to_response(err: &Error) -> Result<Response<Body>, lambda_http::Error> {
    let status = err.status_code();
    if status >= 500 {
        error!(error = %err, status, "Request failed");
    }
    error_response(status, err.to_string())
}

/// Answer a CORS preflight request.
pub fn preflight_response() -> Result<Response<Body>, lambda_http::Error> {
    Ok(Response::builder()
        .status(200)
        .header("access-control-allow-origin", "*")
        .header("access-control-allow-headers", CORS_ALLOW_HEADERS)
        .header("access-control-allow-methods", "GET, POST, PUT, DELETE, OPTIONS")
        .body(Body::from("ok"))?)
}

/// Bearer token from the request's `Authorization` header.
pub fn request_bearer_token(event: &Request) -> Option<String> {
    event
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .map(String::from)
}

/// Parse request body as JSON, returning a 400 response on failure.
///
/// Returns `Ok(Ok(T))` on successful parse, `Ok(Err(Response))` on parse error (400),
/// or `Err(lambda_http::Error)` on serialization failure.
pub fn parse_json_body<T: DeserializeOwned>(body: &Body) -> Result<Result<T, Response<Body>>, lambda_http::Error> {
    match serde_json::from_slice(body.as_ref()) {
        Ok(parsed) => Ok(Ok(parsed)),
        Err(e) => {
            let response = error_response(400, format!("Invalid request body: {}", e))?;
            Ok(Err(response))
        }
    }
}

/// Macro to parse request body, returning early with 400 on parse error.
///
/// Usage:
/// ```ignore
/// let request: MyRequest = parse_body!(event.body());
/// ```
#[macro_export]
macro_rules! parse_body {
    ($body:expr) => {
        match shared::http::parse_json_body($body)? {
            Ok(parsed) => parsed,
            Err(response) => return Ok(response),
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Payload {
        name: String,
    }

    fn body_json(response: &Response<Body>) -> serde_json::Value {
        serde_json::from_slice(response.body().as_ref()).unwrap()
    }

    #[test]
    fn test_error_to_response_uses_status_code() {
        let response = error_to_response(&Error::NotAuthenticated).unwrap();
        assert_eq!(response.status(), 401);
        assert_eq!(
            body_json(&response),
            serde_json::json!({"success": false, "error": "User not authenticated"})
        );
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "*"
        );
    }

    #[test]
    fn test_parse_json_body() {
        let parsed: Payload = parse_json_body(&Body::from(r#"{"name":"x"}"#)).unwrap().unwrap();
        assert_eq!(parsed.name, "x");

        let rejected = parse_json_body::<Payload>(&Body::from("{")).unwrap().unwrap_err();
        assert_eq!(rejected.status(), 400);
    }

    #[test]
    fn test_request_bearer_token() {
        let request = lambda_http::http::Request::builder()
            .header("Authorization", "Bearer abc")
            .body(Body::Empty)
            .unwrap();
        assert_eq!(request_bearer_token(&request).as_deref(), Some("abc"));

        let request = lambda_http::http::Request::builder()
            .body(Body::Empty)
            .unwrap();
        assert_eq!(request_bearer_token(&request), None);
    }
}
