//! Shared library for the course site's Lambda functions and CLI.
//!
//! This crate provides the backend client (real or degraded), the schedules
//! and sign-in wrappers built on it, avatar URLs and mail delivery.

pub mod auth;
pub mod avatar;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod mail;
pub mod models;
pub mod schedules;

pub use auth::{handle_oauth_callback, sign_in_with_linkedin};
pub use avatar::{avatar_url, DEFAULT_AVATAR_SIZE};
pub use client::{client_from_config, create_client, Backend, ClientOptions, Session};
pub use config::{BackendConfig, Config, Environment};
pub use error::{Error, ErrorKind, Result, NOT_CONFIGURED_MESSAGE};
pub use mail::{send_email, EmailRequest, MailSender, ResendMailer};
pub use models::{ApiResponse, NewSchedule, Schedule, ScheduleUpdate};
pub use schedules::{create_schedule, delete_schedule, get_schedules, update_schedule};
