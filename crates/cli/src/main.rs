//! Smart Bookmarks CLI - Database migrations and a terminal feed watcher.
//!
//! # Usage
//!
//! ```bash
//! # Apply database migrations (bookmarks table, triggers, session store)
//! sb-cli migrate
//!
//! # Follow your bookmark list live
//! sb-cli watch --base-url http://127.0.0.1:3000 --session <sb_session cookie>
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `watch` - Print the bookmark list after every change

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::time::Duration;

use clap::{Parser, Subcommand};
use secrecy::SecretString;

mod commands;

#[derive(Parser)]
#[command(name = "sb-cli")]
#[command(author, version, about = "Smart Bookmarks CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Follow the live bookmark list
    Watch {
        /// Server base URL
        #[arg(long, env = "BOOKMARKS_BASE_URL", default_value = "http://127.0.0.1:3000")]
        base_url: String,

        /// Value of the `sb_session` cookie from a signed-in browser
        #[arg(long, env = "SB_SESSION", hide_env_values = true)]
        session: String,

        /// Seconds to wait for the subscription to be confirmed
        #[arg(long, default_value_t = 10)]
        timeout_secs: u64,
    },
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sb_cli=info,warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Watch {
            base_url,
            session,
            timeout_secs,
        } => {
            commands::watch::run(commands::watch::WatchOptions {
                base_url,
                session: SecretString::from(session),
                handshake_timeout: Duration::from_secs(timeout_secs),
            })
            .await?;
        }
    }
    Ok(())
}
