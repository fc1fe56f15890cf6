//! SecondWind CLI - a command-line client for the SecondWind running community API.
//!
//! Restores a session from the refresh cookie, issues authenticated requests
//! (renewing the access token transparently) and logs out.

use std::io;
use std::sync::Arc;

use anyhow::{Context, Result};
use secondwind_core::{
    ApiClient, ApiError, ApiRequest, Config, CredentialStore, FileStore, KeyringStore, Session,
};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const RELOGIN_HINT: &str = "Session expired - run `secondwind restore` or log in again";

/// Directory for rolling log files; unset means stderr only
const ENV_LOG_DIR: &str = "SECONDWIND_LOG_DIR";

const USAGE: &str = "\
Usage: secondwind [--keyring] <command>

Commands:
  restore              Restore the session from the refresh cookie
  get <path>           Authenticated GET, prints status and body
  post <path> <json>   Authenticated POST with a JSON body
  logout               Forget the stored access token

Environment:
  SECONDWIND_API_URL         API base URL
  SECONDWIND_REFRESH_COOKIE  Refresh cookie (name=value) for headless use
  SECONDWIND_LOG_DIR         Also write daily log files here
  RUST_LOG                   Log filter (default: warn)";

/// Initialize the tracing subscriber for logging.
/// Returns the file writer guard, which must live until exit.
fn init_tracing() -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::env::var(ENV_LOG_DIR) {
        Ok(dir) if !dir.trim().is_empty() => {
            let appender = tracing_appender::rolling::daily(dir.trim(), "secondwind.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

enum Command {
    Restore,
    Get(String),
    Post(String, String),
    Logout,
}

struct Args {
    use_keyring: bool,
    command: Command,
}

fn parse_args(raw: &[String]) -> Result<Args> {
    let mut use_keyring = false;
    let mut rest = Vec::new();
    for arg in raw {
        match arg.as_str() {
            "--keyring" => use_keyring = true,
            "-h" | "--help" => anyhow::bail!("{}", USAGE),
            _ => rest.push(arg.as_str()),
        }
    }

    let command = match rest.as_slice() {
        ["restore"] => Command::Restore,
        ["get", path] => Command::Get(path.to_string()),
        ["post", path, body] => Command::Post(path.to_string(), body.to_string()),
        ["logout"] => Command::Logout,
        _ => anyhow::bail!("{}", USAGE),
    };

    Ok(Args {
        use_keyring,
        command,
    })
}

fn open_store(config: &Config, use_keyring: bool) -> Result<Arc<dyn CredentialStore>> {
    if use_keyring {
        Ok(Arc::new(KeyringStore::new(config.keyring_account.as_deref())))
    } else {
        Ok(Arc::new(FileStore::new(config.cache_dir()?)))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let _guard = init_tracing();

    let raw: Vec<String> = std::env::args().skip(1).collect();
    let args = parse_args(&raw)?;

    let config = Config::load()?;
    info!(api_url = %config.api_url, "SecondWind CLI starting");

    let client = ApiClient::new(&config).context("Failed to create API client")?;
    let store = open_store(&config, args.use_keyring)?;
    let mut session = Session::new(client, store);
    let sync = session.spawn_sync();

    let result = run(&mut session, args.command).await;
    if result.as_ref().is_err_and(needs_relogin) {
        eprintln!("{}", RELOGIN_HINT);
    }

    drop(session);
    let _ = sync.await;
    result
}

/// Whether `err` means the stored session can no longer be renewed
fn needs_relogin(err: &anyhow::Error) -> bool {
    err.downcast_ref::<ApiError>()
        .is_some_and(ApiError::is_auth_failure)
}

async fn run(session: &mut Session, command: Command) -> Result<()> {
    match command {
        Command::Restore => {
            let user = session.restore().await?;
            println!("{}", serde_json::to_string_pretty(user)?);
        }
        Command::Get(path) => {
            let url = session.client().endpoint(&path);
            print_response(session.request(ApiRequest::get(url)).await?).await?;
        }
        Command::Post(path, body) => {
            let body: serde_json::Value =
                serde_json::from_str(&body).context("Body is not valid JSON")?;
            let url = session.client().endpoint(&path);
            let req = ApiRequest::post(url).json(&body)?;
            print_response(session.request(req).await?).await?;
        }
        Command::Logout => {
            session.logout()?;
            eprintln!("Logged out");
        }
    }
    Ok(())
}

async fn print_response(response: reqwest::Response) -> Result<()> {
    let status = response.status();
    let body = response.text().await.context("Failed to read response body")?;
    eprintln!("{}", status);

    // Pretty-print JSON bodies, pass anything else through
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", body),
    }

    if status == reqwest::StatusCode::UNAUTHORIZED {
        eprintln!("{}", RELOGIN_HINT);
    }
    Ok(())
}
