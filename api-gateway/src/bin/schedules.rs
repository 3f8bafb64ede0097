//! Schedules API Lambda - CRUD operations for the caller's schedules.
//!
//! Endpoints:
//! - GET /schedules - List schedules, earliest first
//! - POST /schedules - Create a schedule
//! - PUT /schedules/{id} - Update a schedule
//! - DELETE /schedules/{id} - Delete a schedule

use lambda_http::{run, service_fn, Body, Error, Request, Response};
use shared::client::{Backend, ClientOptions, SessionTokens};
use shared::http::{
    error_response, error_to_response, json_response, preflight_response, request_bearer_token,
};
use shared::{
    create_client, create_schedule, delete_schedule, get_schedules, parse_body, update_schedule,
    ApiResponse, Config, NewSchedule, ScheduleUpdate,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Application state
struct AppState {
    config: Config,
}

async fn handler(state: Arc<AppState>, event: Request) -> Result<Response<Body>, Error> {
    let method = event.method().as_str();
    let raw_path = event.uri().path();
    // Strip /api stage prefix if present (API Gateway REST API includes stage in path)
    let path = raw_path.strip_prefix("/api").unwrap_or(raw_path);

    info!("Schedules request: {} {}", method, path);

    if method == "OPTIONS" {
        return preflight_response();
    }

    let Some(access_token) = request_bearer_token(&event) else {
        return error_response(401, "Missing bearer token");
    };

    // Sessions belong to the caller, so every request gets its own client.
    let client = create_client(
        &state.config.backend,
        ClientOptions::server(state.config.environment),
    );

    if let Err(e) = client
        .set_session(SessionTokens {
            access_token,
            refresh_token: None,
        })
        .await
    {
        return error_to_response(&e);
    }

    route(client.as_ref(), method, path, &event).await
}

async fn route(
    client: &dyn Backend,
    method: &str,
    path: &str,
    event: &Request,
) -> Result<Response<Body>, Error> {
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

    match (method, segments.as_slice()) {
        // List schedules
        ("GET", ["schedules"]) => match get_schedules(client).await {
            Ok(schedules) => json_response(200, &ApiResponse::success(schedules)),
            Err(e) => error_to_response(&e),
        },

        // Create schedule
        ("POST", ["schedules"]) => {
            let request: NewSchedule = parse_body!(event.body());

            match create_schedule(client, &request).await {
                Ok(schedule) => json_response(201, &ApiResponse::success(schedule)),
                Err(e) => error_to_response(&e),
            }
        }

        // Update schedule
        ("PUT", ["schedules", id]) | ("PATCH", ["schedules", id]) => {
            let Ok(schedule_id) = Uuid::parse_str(id) else {
                return error_response(400, "Invalid schedule id");
            };
            let updates: ScheduleUpdate = parse_body!(event.body());

            match update_schedule(client, schedule_id, &updates).await {
                Ok(schedule) => json_response(200, &ApiResponse::success(schedule)),
                Err(e) => error_to_response(&e),
            }
        }

        // Delete schedule
        ("DELETE", ["schedules", id]) => {
            let Ok(schedule_id) = Uuid::parse_str(id) else {
                return error_response(400, "Invalid schedule id");
            };

            match delete_schedule(client, schedule_id).await {
                Ok(()) => json_response(
                    200,
                    &ApiResponse::success(serde_json::json!({
                        "message": "Schedule deleted",
                        "scheduleId": schedule_id,
                    })),
                ),
                Err(e) => error_to_response(&e),
            }
        }

        _ => error_response(404, "Not found"),
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let state = Arc::new(AppState {
        config: Config::from_env(),
    });

    run(service_fn(move |event| {
        let state = Arc::clone(&state);
        async move { handler(state, event).await }
    }))
    .await
}
