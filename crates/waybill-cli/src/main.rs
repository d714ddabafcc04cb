//! Waybill CLI
//!
//! Operator front end for the live notification feed: watch notifications
//! arrive, list or clear them, and manage local preferences and the session.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod context;

use commands::{prefs::PrefsCommand, session::SessionCommand};
use context::CliContext;

#[derive(Parser)]
#[command(name = "waybill")]
#[command(about = "Waybill - live notifications for the logistics dashboard", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override a config value, e.g. `--set live.keep_warm=true`
    #[arg(long = "set", global = true, value_name = "KEY=VALUE")]
    overrides: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Follow notifications live until interrupted
    Watch {
        /// Print every item on each change instead of only new arrivals
        #[arg(long)]
        full: bool,
    },

    /// Print the current notifications
    List {
        /// Show at most this many rows
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Delete every notification on the backend
    Clear,

    /// Show or change local preferences
    #[command(subcommand)]
    Prefs(PrefsCommand),

    /// Manage the stored session credential
    #[command(subcommand)]
    Session(SessionCommand),

    /// Print the effective configuration
    Config,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let ctx = CliContext::load(cli.config, &cli.overrides)?;

    match cli.command {
        Commands::Watch { full } => commands::watch::run(&ctx, full).await?,
        Commands::List { limit, json } => commands::list::run(&ctx, limit, json).await?,
        Commands::Clear => commands::clear::run(&ctx).await?,
        Commands::Prefs(cmd) => commands::prefs::run(&ctx, cmd)?,
        Commands::Session(cmd) => commands::session::run(&ctx, cmd)?,
        Commands::Config => {
            println!("# {}", ctx.config_path().display());
            print!("{}", ctx.config.to_toml()?);
        }
    }

    Ok(())
}
