//! `site` - command-line front end for the course site.
//!
//! Builds one backend client at startup and shares it across the command:
//! sign in with LinkedIn, manage schedules, build avatar URLs, send mail.

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use shared::client::{AuthEvent, Backend, ClientOptions};
use shared::mail::Recipients;
use shared::{
    avatar_url, create_client, create_schedule, delete_schedule, get_schedules,
    handle_oauth_callback, send_email, sign_in_with_linkedin, update_schedule, Config,
    EmailRequest, ErrorKind, NewSchedule, ScheduleUpdate, DEFAULT_AVATAR_SIZE,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

const DEFAULT_SESSION_FILE: &str = ".site-session.json";

#[derive(Debug, Parser)]
#[command(name = "site", about = "Course site command-line client", version)]
struct Cli {
    /// Session file (defaults to $SESSION_FILE, then .site-session.json)
    #[arg(long, global = true)]
    session_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the LinkedIn sign-in URL
    Login,
    /// Complete sign-in from the URL LinkedIn redirected back to
    Callback { url: String },
    /// Show the signed-in user
    Whoami,
    /// Sign out and forget the stored session
    Logout,
    /// Manage your schedules
    #[command(subcommand)]
    Schedules(ScheduleCommand),
    /// Print an avatar image URL for a name
    Avatar {
        name: String,
        #[arg(long, default_value_t = DEFAULT_AVATAR_SIZE)]
        size: u32,
    },
    /// Send an email through the site's mail function
    SendEmail {
        #[arg(long, required = true)]
        to: Vec<String>,
        #[arg(long)]
        subject: String,
        #[arg(long)]
        html: String,
        #[arg(long)]
        text: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
enum ScheduleCommand {
    List,
    Create {
        #[arg(long)]
        title: String,
        /// RFC 3339 start time, e.g. 2026-11-02T09:00:00Z
        #[arg(long)]
        start: DateTime<Utc>,
        #[arg(long)]
        end: Option<DateTime<Utc>>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        location: Option<String>,
    },
    Update {
        id: Uuid,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        start: Option<DateTime<Utc>>,
        #[arg(long)]
        end: Option<DateTime<Utc>>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        location: Option<String>,
    },
    Delete {
        id: Uuid,
    },
}

async fn run(client: &dyn Backend, config: &Config, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Login => {
            let redirect = sign_in_with_linkedin(client, &config.oauth_redirect_url()).await?;
            println!("Open this URL to sign in with LinkedIn:\n{}", redirect.url);
            println!("Then run `site callback '<redirected URL>'`.");
        }
        Command::Callback { url } => {
            let session = handle_oauth_callback(client, &url).await?;
            println!(
                "Signed in as {}",
                session
                    .user
                    .display_name()
                    .unwrap_or_else(|| session.user.id.to_string())
            );
        }
        Command::Whoami => match client.get_session().await? {
            Some(session) => {
                let name = session.user.display_name();
                println!("{}", session.user.id);
                if let Some(email) = &session.user.email {
                    println!("{}", email);
                }
                if let Some(name) = name {
                    println!("{}", avatar_url(&name, DEFAULT_AVATAR_SIZE));
                }
            }
            None => bail!("Not signed in"),
        },
        Command::Logout => {
            client.sign_out().await?;
            println!("Signed out");
        }
        Command::Schedules(command) => run_schedules(client, command).await?,
        Command::Avatar { name, size } => println!("{}", avatar_url(&name, size)),
        Command::SendEmail {
            to,
            subject,
            html,
            text,
        } => {
            let to = match <[String; 1]>::try_from(to) {
                Ok([single]) => Recipients::One(single),
                Err(many) => Recipients::Many(many),
            };
            send_email(
                client,
                &EmailRequest {
                    to,
                    subject,
                    html,
                    text,
                },
            )
            .await?;
            println!("Email sent");
        }
    }

    Ok(())
}

async fn run_schedules(client: &dyn Backend, command: ScheduleCommand) -> anyhow::Result<()> {
    match command {
        ScheduleCommand::List => {
            let schedules = get_schedules(client).await?;
            println!("{}", serde_json::to_string_pretty(&schedules)?);
        }
        ScheduleCommand::Create {
            title,
            start,
            end,
            description,
            location,
        } => {
            let schedule = create_schedule(
                client,
                &NewSchedule {
                    title,
                    description,
                    start_time: start,
                    end_time: end,
                    location,
                },
            )
            .await?;
            println!("{}", serde_json::to_string_pretty(&schedule)?);
        }
        ScheduleCommand::Update {
            id,
            title,
            start,
            end,
            description,
            location,
        } => {
            let schedule = update_schedule(
                client,
                id,
                &ScheduleUpdate {
                    title,
                    description,
                    start_time: start,
                    end_time: end,
                    location,
                },
            )
            .await?;
            println!("{}", serde_json::to_string_pretty(&schedule)?);
        }
        ScheduleCommand::Delete { id } => {
            delete_schedule(client, id).await?;
            println!("Deleted {}", id);
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    let session_file = cli
        .session_file
        .clone()
        .or_else(|| config.session_file.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SESSION_FILE));

    let client: Arc<dyn Backend> = create_client(
        &config.backend,
        ClientOptions {
            session_file: Some(session_file),
            ..ClientOptions::from_config(&config)
        },
    );

    let _subscription = client.on_auth_state_change(Arc::new(|event, session| {
        let user_id = session.map(|s| s.user.id.to_string());
        match event {
            AuthEvent::SignedIn => debug!(?user_id, "Signed in"),
            AuthEvent::SignedOut => debug!("Signed out"),
            AuthEvent::TokenRefreshed => debug!(?user_id, "Token refreshed"),
        }
    }));

    if let Err(e) = run(client.as_ref(), &config, cli.command).await {
        if let Some(shared_error) = e.downcast_ref::<shared::Error>() {
            if shared_error.kind() == ErrorKind::NotAuthenticated {
                error!("Not signed in; run `site login` first");
            }
        }
        return Err(e).context("command failed");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::client::DegradedClient;
    use shared::{BackendConfig, Environment};

    fn config() -> Config {
        Config {
            backend: BackendConfig::default(),
            app_url: "http://localhost:3000".to_string(),
            mail_api_key: None,
            mail_from: "noreply@example.com".to_string(),
            session_file: None,
            environment: Environment::Production,
        }
    }

    #[test]
    fn test_parse_schedule_create() {
        let cli = Cli::try_parse_from([
            "site",
            "schedules",
            "create",
            "--title",
            "Rust fundamentals",
            "--start",
            "2026-11-02T09:00:00Z",
        ])
        .unwrap();

        match cli.command {
            Command::Schedules(ScheduleCommand::Create { title, start, end, .. }) => {
                assert_eq!(title, "Rust fundamentals");
                assert_eq!(start.to_rfc3339(), "2026-11-02T09:00:00+00:00");
                assert!(end.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_avatar_default_size() {
        let cli = Cli::try_parse_from(["site", "avatar", "Cher"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Avatar { ref name, size } if name == "Cher" && size == DEFAULT_AVATAR_SIZE
        ));
    }

    #[test]
    fn test_send_email_requires_recipient() {
        assert!(Cli::try_parse_from(["site", "send-email", "--subject", "Hi", "--html", "x"]).is_err());
    }

    #[tokio::test]
    async fn test_commands_on_degraded_client_report_not_configured() {
        let err = run(&DegradedClient, &config(), Command::Login).await.unwrap_err();
        assert_eq!(err.to_string(), shared::NOT_CONFIGURED_MESSAGE);

        let err = run(
            &DegradedClient,
            &config(),
            Command::Schedules(ScheduleCommand::Delete { id: Uuid::new_v4() }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), shared::NOT_CONFIGURED_MESSAGE);
    }

    #[tokio::test]
    async fn test_avatar_and_whoami_without_session() {
        run(
            &DegradedClient,
            &config(),
            Command::Avatar {
                name: "Jane Smith".to_string(),
                size: 100,
            },
        )
        .await
        .unwrap();

        let err = run(&DegradedClient, &config(), Command::Whoami).await.unwrap_err();
        assert_eq!(err.to_string(), "Not signed in");
    }
}
