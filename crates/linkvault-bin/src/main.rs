//! LinkVault CLI - private bookmarks, synced live across sessions.

mod app;
mod commands;
mod output;
mod routes;
mod views;

use std::path::PathBuf;

use app::AppContext;
use clap::{Parser, Subcommand};
use linkvault_config_and_utils::{init_logging, Config, Paths};
use tracing::debug;

/// LinkVault - save links privately and watch them sync.
#[derive(Parser)]
#[command(name = "linkvault")]
#[command(about = "Private bookmark manager with live sync")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: output::OutputFormat,

    /// Log level (trace, debug, info, warn, error). Defaults to the configured level
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Base directory for config, session and logs. Defaults to ~/.linkvault
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    /// Mirror log events to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with Google in the browser
    Login,

    /// Sign out and clear the local session
    Logout,

    /// Check the session
    Status,

    /// List your bookmarks
    List,

    /// Save a bookmark
    Add {
        /// Bookmark title
        #[arg(short, long)]
        title: String,
        /// Absolute URL
        #[arg(short, long)]
        url: String,
    },

    /// Delete a bookmark
    Delete {
        /// Bookmark ID
        id: String,
    },

    /// Show the dashboard and keep it updated until interrupted
    Watch,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    paths.ensure_dirs()?;
    let config = Config::load(&paths)?;

    let level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    init_logging(&paths, level, cli.verbose);
    debug!(base_dir = %paths.base_dir().display(), "starting");

    let ctx = AppContext::new(config, paths)?;
    let format = cli.format;

    let result = match cli.command {
        Some(Commands::Login) => commands::login(&ctx, &format).await,
        Some(Commands::Logout) => commands::logout(&ctx, &format).await,
        Some(Commands::Status) => commands::status(&ctx, &format).await,
        Some(Commands::List) => commands::list(&ctx, &format).await,
        Some(Commands::Add { title, url }) => commands::add(&ctx, &title, &url, &format).await,
        Some(Commands::Delete { id }) => commands::delete(&ctx, &id, &format).await,
        Some(Commands::Watch) => commands::watch(&ctx, &format).await,
        // No command: open whichever view the guard allows.
        None => commands::list(&ctx, &format).await,
    };

    if let Err(e) = result {
        output::print_error(&e.to_string(), &format);
        std::process::exit(1);
    }

    Ok(())
}
