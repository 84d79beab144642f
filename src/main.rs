//! pingdeck CLI: accounts, profiles, and monitored endpoints with live
//! geolocation/latency enrichment.

mod api;
mod auth;
mod config;
mod error;
mod geo;
mod models;
mod security;

use anyhow::Result;
use auth::AuthSession;
use clap::{Parser, Subcommand};
use config::Config;
use dialoguer::Password;
use error::Error;
use models::ProfileUpdate;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pingdeck", version, about = "Dashboard client: accounts, profiles, monitored endpoints")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an account and sign in
    Register {
        username: String,
        email: String,
    },
    /// Sign in with email + password
    Login {
        email: String,
    },
    /// Sign out and clear the stored session
    Logout,
    /// Show the current identity
    Whoami,
    /// Verify the stored token against the server
    Status,
    /// Change the account password
    Passwd,
    /// Profile operations
    Profile {
        #[command(subcommand)]
        command: ProfileCommand,
    },
    /// Monitored endpoints
    Server {
        #[command(subcommand)]
        command: ServerCommand,
    },
    /// Hosted identity provider sign-in
    Sso {
        #[command(subcommand)]
        command: SsoCommand,
    },
}

#[derive(Subcommand)]
enum ProfileCommand {
    /// Fetch and display the canonical profile
    Show,
    /// Update profile fields
    Update {
        #[arg(long)]
        full_name: Option<String>,
        #[arg(long)]
        bio: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        location: Option<String>,
    },
    /// Upload a new avatar image (JPEG/PNG/GIF, max 5MB)
    Avatar {
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum ServerCommand {
    /// List monitored endpoints with geo/latency enrichment
    List {
        /// Skip the geolocation/latency lookups
        #[arg(long)]
        plain: bool,
    },
    /// Add a monitored endpoint
    Add {
        name: String,
        /// IPv4 address, e.g. 8.8.8.8
        address: String,
    },
    /// Remove a monitored endpoint by id
    Remove {
        id: String,
    },
}

#[derive(Subcommand)]
enum SsoCommand {
    /// Print the provider authorize URL to open in a browser
    Login,
    /// Complete sign-in from the provider callback URL
    Callback {
        url: String,
        /// State printed by `sso login`
        #[arg(long)]
        state: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;
    let session = AuthSession::new(&config)?;

    let outcome = run(cli.command, &session).await;
    if let Err(e) = outcome {
        eprintln!("error: {}", user_message(&e));
        std::process::exit(1);
    }
    Ok(())
}

async fn run(command: Command, session: &AuthSession) -> error::Result<()> {
    match command {
        Command::Register { username, email } => {
            let password = prompt_password("Password (min 8 chars, mixed case, digit, symbol)")?;
            let identity = session.register(&username, &email, &password).await?;
            println!("registered {} <{}>", identity.username, identity.email);
        }
        Command::Login { email } => {
            let password = prompt_password("Password")?;
            let identity = session.login(&email, &password).await?;
            println!("signed in as {} <{}>", identity.username, identity.email);
        }
        Command::Logout => {
            match session.logout() {
                Some(provider_url) => {
                    println!("signed out locally; finish provider sign-out at:\n  {provider_url}");
                }
                None => println!("signed out"),
            }
        }
        Command::Whoami => match session.current_identity() {
            Some(identity) => {
                println!("{} <{}>", identity.username, identity.email);
                if let Some(name) = &identity.name {
                    println!("name:   {name}");
                }
                if let Some(avatar) = identity.effective_avatar() {
                    println!("avatar: {avatar}");
                }
            }
            None => println!("not signed in"),
        },
        Command::Status => {
            let identity = session.auth_client().check().await?;
            println!("token valid for {} <{}>", identity.username, identity.email);
        }
        Command::Passwd => {
            let current = prompt_password("Current password")?;
            let new = prompt_password("New password")?;
            session.change_password(&current, &new).await?;
            println!("password updated");
        }
        Command::Profile { command } => run_profile(command, session).await?,
        Command::Server { command } => run_server(command, session).await?,
        Command::Sso { command } => run_sso(command, session).await?,
    }
    Ok(())
}

async fn run_profile(command: ProfileCommand, session: &AuthSession) -> error::Result<()> {
    match command {
        ProfileCommand::Show => {
            let identity = session.refresh_profile().await?;
            println!("{} <{}>", identity.username, identity.email);
            if let Some(name) = &identity.name {
                println!("name:   {name}");
            }
            if let Some(avatar) = identity.effective_avatar() {
                println!("avatar: {avatar}");
            }
        }
        ProfileCommand::Update {
            full_name,
            bio,
            phone,
            location,
        } => {
            if let Some(phone) = phone.as_deref() {
                if !security::is_valid_phone(phone) {
                    return Err(Error::Validation("Invalid phone number".into()));
                }
            }
            let profile = session
                .update_profile(ProfileUpdate {
                    full_name,
                    bio,
                    phone,
                    location,
                })
                .await?;
            println!(
                "profile updated ({})",
                profile.full_name.as_deref().unwrap_or("unnamed")
            );
        }
        ProfileCommand::Avatar { file } => {
            let avatar_url = session.upload_avatar(&file).await?;
            println!("avatar updated: {avatar_url}");
        }
    }
    Ok(())
}

async fn run_server(command: ServerCommand, session: &AuthSession) -> error::Result<()> {
    let servers = session.servers();
    match command {
        ServerCommand::List { plain } => {
            let records = servers.list().await?;
            if records.is_empty() {
                println!("no monitored endpoints yet; add one with `pingdeck server add`");
                return Ok(());
            }

            let geo_client = if plain { None } else { Some(geo::GeoClient::new()?) };
            for record in records {
                match &geo_client {
                    Some(client) => {
                        let geo = client.lookup(&record.address).await;
                        let latency = client.probe_latency(&record.address).await;
                        let latency = latency
                            .map(|ms| format!("{ms}ms"))
                            .unwrap_or_else(|| "-".into());
                        println!(
                            "{:<6} {:<24} {:<16} {} {}, {}  {}",
                            record.id,
                            record.name,
                            record.address,
                            geo::flag_emoji(&geo.country_code),
                            geo.city,
                            geo.country,
                            latency,
                        );
                    }
                    None => {
                        println!("{:<6} {:<24} {}", record.id, record.name, record.address);
                    }
                }
            }
        }
        ServerCommand::Add { name, address } => {
            let record = servers.add(&name, &address).await?;
            println!("added {} ({}) as #{}", record.name, record.address, record.id);
        }
        ServerCommand::Remove { id } => {
            servers.remove(&id).await?;
            println!("removed #{id}");
        }
    }
    Ok(())
}

async fn run_sso(command: SsoCommand, session: &AuthSession) -> error::Result<()> {
    match command {
        SsoCommand::Login => {
            let (url, state) = session.sso_authorize()?;
            println!("open in a browser:\n  {url}\n");
            println!("then finish with:\n  pingdeck sso callback <redirect-url> --state {state}");
        }
        SsoCommand::Callback { url, state } => {
            let identity = session.sso_complete(&url, &state).await?;
            println!("signed in as {} <{}>", identity.username, identity.email);
        }
    }
    Ok(())
}

fn prompt_password(prompt: &str) -> error::Result<String> {
    Password::new()
        .with_prompt(prompt)
        .interact()
        .map_err(|e| Error::Validation(format!("could not read password: {e}")))
}

/// Map the error taxonomy to user-facing text. This is the only place
/// wire codes become sentences.
fn user_message(error: &Error) -> String {
    match error {
        Error::RetryAfter(seconds) => {
            format!("too many attempts; retry in {seconds} seconds")
        }
        Error::TooManyAttempts => "too many attempts; please try again later".into(),
        Error::NoToken => "not signed in; run `pingdeck login` first".into(),
        Error::Network(e) => {
            tracing::error!(error = %e, "network failure");
            "could not reach the server; check your connection".into()
        }
        Error::Server(_) => "the server had a problem; please try again later".into(),
        other => other.to_string(),
    }
}
