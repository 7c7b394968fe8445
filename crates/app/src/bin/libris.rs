// Libris - command-line client
// Signs in against the configured backend and issues authenticated requests

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use libris_api::ApiError;
use libris_app::{create_client, LibrisClient};
use libris_auth::{AuthError, GuardDecision, RegistrationForm};
use libris_common::ClientConfig;

#[derive(Parser, Debug)]
#[command(name = "libris", about = "Libris library client", version)]
struct Cli {
    /// Override LIBRIS_API_BASE_URL
    #[arg(long, env = "LIBRIS_API_BASE_URL")]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the current session
    Status,
    /// Sign in and store the tokens
    Login {
        username: String,
        #[arg(long, env = "LIBRIS_PASSWORD")]
        password: String,
    },
    /// Create an account
    Register {
        username: String,
        email: String,
        #[arg(long, env = "LIBRIS_PASSWORD")]
        password: String,
        /// Confirmation, defaults to the password
        #[arg(long)]
        password2: Option<String>,
    },
    /// Drop the stored tokens
    Logout,
    /// GET a resource path and print the JSON response
    Get { path: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = ClientConfig::from_env()?;
    if let Some(base_url) = cli.base_url {
        config = config.with_api_base_url(&base_url)?;
    }

    // Logs go to stderr so command output stays pipeable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.rust_log).unwrap_or_else(|_| EnvFilter::new("libris=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    info!(
        api_base_url = %config.api_base_url,
        auth_provider = %config.auth_provider,
        "Starting Libris client"
    );

    let client = create_client(config).map_err(|e| {
        error!("Failed to create client: {}", e);
        e
    })?;
    client.session().initialize();

    match cli.command {
        Command::Status => status(&client),
        Command::Login { username, password } => login(&client, &username, &password).await,
        Command::Register {
            username,
            email,
            password,
            password2,
        } => {
            let form = RegistrationForm::new(username, email, password.clone())
                .with_confirmation(password2.unwrap_or(password));
            register(&client, &form).await
        }
        Command::Logout => {
            client.session().logout();
            println!("Logged out");
            Ok(())
        }
        Command::Get { path } => get(&client, &path).await,
    }
}

fn status(client: &LibrisClient) -> anyhow::Result<()> {
    let state = client.session().state();
    match client.guard().evaluate(&state) {
        GuardDecision::Allow | GuardDecision::Forbidden => {
            if let Some(user) = state.user {
                let expires = user
                    .expires_at_utc()
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| user.expires_at.to_string());
                println!("Logged in as {} ({}), token expires {}", user.subject, user.role, expires);
            }
        }
        GuardDecision::Redirect(path) => println!("Not logged in (see {})", path),
        GuardDecision::Loading => println!("Session still initializing"),
    }
    Ok(())
}

async fn login(client: &LibrisClient, username: &str, password: &str) -> anyhow::Result<()> {
    match client.session().login(username, password).await {
        Ok(()) => {
            let subject = client
                .session()
                .user()
                .map(|u| u.subject)
                .unwrap_or_default();
            println!("Logged in as {}", subject);
            Ok(())
        }
        Err(e) => Err(report_auth_error(e)),
    }
}

async fn register(client: &LibrisClient, form: &RegistrationForm) -> anyhow::Result<()> {
    match client.session().register(form).await {
        Ok(()) => {
            println!("Registered {}. You can now log in.", form.username);
            Ok(())
        }
        Err(e) => Err(report_auth_error(e)),
    }
}

fn report_auth_error(e: AuthError) -> anyhow::Error {
    if let Some(fields) = e.field_errors() {
        for (field, messages) in fields.iter() {
            for message in messages {
                eprintln!("  {}: {}", field, message);
            }
        }
    }
    anyhow::anyhow!(e)
}

async fn get(client: &LibrisClient, path: &str) -> anyhow::Result<()> {
    match client.api().get_json::<serde_json::Value>(path).await {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        Err(e @ ApiError::SessionExpired(_)) => {
            let location = client.navigator().current().unwrap_or_default();
            eprintln!("Session expired. Log in again ({}).", location);
            Err(e.into())
        }
        Err(e) => {
            if let Some(detail) = e.detail() {
                eprintln!("{}", detail);
            }
            Err(e.into())
        }
    }
}
