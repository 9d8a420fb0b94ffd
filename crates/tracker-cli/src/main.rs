//! Tracker CLI - a terminal shell for the tracker portfolio API.
//!
//! Startup order mirrors the web front-end: acquire the CSRF cookie first,
//! then hand control to the interactive shell. Session state is kept in the
//! data directory, so `tracker status` reports the last known login without
//! touching the network.

mod shell;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tracker_core::auth::session::SESSION_STATE_KEY;
use tracker_core::{
    Config, FileStore, KeyValueStore, Keychain, MemoryStore, SessionManager, SessionState,
};

/// Log file name inside the data directory
const LOG_FILE: &str = "tracker.log";

/// Terminal client for the tracker portfolio API
#[derive(Parser)]
#[command(name = "tracker", version, about, long_about = None)]
struct Cli {
    /// API base URL, e.g. http://localhost:8000/api (overrides TRACKER_API_BASE_URL)
    #[arg(long, global = true)]
    api_base_url: Option<String>,

    /// Keep session state in memory only (shell); `status` refuses it
    #[arg(long, global = true, default_value_t = false)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive shell (default)
    Shell,

    /// Show the persisted session without contacting the server
    Status,

    /// Remove a stored password from the OS keychain
    Forget {
        /// Login email the password was stored under
        email: String,
    },
}

/// Initialize the tracing subscriber. Logs go to a file so they do not
/// interleave with the shell's output.
fn init_tracing(log_dir: &Path) -> WorkerGuard {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let appender = tracing_appender::rolling::never(log_dir, LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let data_dir = Config::data_dir()?;
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create {}", data_dir.display()))?;
    let _log_guard = init_tracing(&data_dir);
    info!("Tracker starting");

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "Failed to load config, using defaults");
            Config::default()
        }
    };

    match cli.command.unwrap_or(Commands::Shell) {
        Commands::Status => {
            let store = status_store(cli.ephemeral, data_dir)?;
            print_status(read_snapshot(&store)?);
            Ok(())
        }
        Commands::Forget { email } => {
            Keychain::delete(&email)?;
            println!("Removed stored password for {}", email);
            Ok(())
        }
        Commands::Shell => {
            let store: Arc<dyn KeyValueStore> = if cli.ephemeral {
                Arc::new(MemoryStore::new())
            } else {
                Arc::new(FileStore::new(data_dir.clone())?)
            };

            let session_config = config.session_config(cli.api_base_url.as_deref())?;
            let session = Arc::new(SessionManager::new(&session_config, store)?);

            // Must happen before any other request
            session.acquire_csrf_token().await;

            let result = shell::run(session, config, &data_dir).await;
            info!("Tracker shutting down");
            result
        }
    }
}

/// The store `status` reads from. Ephemeral sessions are never written, so
/// there is nothing to report for them.
fn status_store(ephemeral: bool, data_dir: PathBuf) -> Result<FileStore> {
    if ephemeral {
        bail!("--ephemeral sessions are not saved; nothing to show");
    }
    FileStore::new(data_dir)
}

/// Read the persisted session snapshot, if any.
fn read_snapshot(store: &dyn KeyValueStore) -> Result<Option<SessionState>> {
    store
        .get(SESSION_STATE_KEY)?
        .map(|snapshot| SessionState::from_snapshot(&snapshot))
        .transpose()
}

fn print_status(snapshot: Option<SessionState>) {
    match snapshot {
        None => println!("No saved session."),
        Some(state) if state.is_authenticated => {
            println!("Logged in as {}", shell::display_user(state.user.as_ref()));
        }
        Some(_) => println!("Not logged in."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_snapshot() {
        let store = MemoryStore::new();
        assert!(read_snapshot(&store).unwrap().is_none());

        store
            .set(
                SESSION_STATE_KEY,
                r#"{"user":{"email":"ada@example.com"},"isAuthenticated":true}"#,
            )
            .unwrap();
        let state = read_snapshot(&store).unwrap().unwrap();
        assert!(state.is_authenticated);
        assert_eq!(state.user.unwrap()["email"], "ada@example.com");

        store.set(SESSION_STATE_KEY, "garbage").unwrap();
        assert!(read_snapshot(&store).is_err());
    }

    #[test]
    fn test_status_rejects_ephemeral() {
        let dir = std::env::temp_dir().join("tracker-status-store");
        let err = status_store(true, dir.clone())
            .err()
            .expect("ephemeral status refused");
        assert!(err.to_string().contains("--ephemeral"));

        let cli = Cli::parse_from(["tracker", "status", "--ephemeral"]);
        assert!(matches!(cli.command, Some(Commands::Status)));
        assert!(status_store(cli.ephemeral, dir).is_err());
    }

    #[test]
    fn test_cli_parses_global_flags() {
        let cli = Cli::parse_from(["tracker", "shell", "--ephemeral"]);
        assert!(cli.ephemeral);
        assert!(matches!(cli.command, Some(Commands::Shell)));

        let cli = Cli::parse_from(["tracker", "--api-base-url", "http://localhost:8000/api"]);
        assert_eq!(cli.api_base_url.as_deref(), Some("http://localhost:8000/api"));
        assert!(cli.command.is_none());
    }
}
