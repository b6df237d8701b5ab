pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::config::config;
use crate::database::DatabaseManager;
use crate::state::AppState;

#[derive(Parser)]
#[command(name = "mspfa")]
#[command(about = "MSPFA CLI - Database and staff administration for the MSPFA API")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Create any missing tables and indexes")]
    Migrate,

    #[command(about = "Grant or revoke staff perms")]
    Perms {
        #[command(subcommand)]
        cmd: commands::perms::PermsCommands,
    },

    #[command(about = "Inspect user accounts")]
    User {
        #[command(subcommand)]
        cmd: commands::user::UserCommands,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

/// Connect to the configured database. Unlike the server, commands fail
/// immediately when it is unreachable.
pub async fn connect() -> anyhow::Result<(DatabaseManager, AppState)> {
    let db = DatabaseManager::connect_lazy(&config().database)?;
    db.health_check().await?;
    let state = AppState::from_database(&db);
    Ok((db, state))
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Migrate => commands::migrate::handle(output_format).await,
        Commands::Perms { cmd } => commands::perms::handle(cmd, output_format).await,
        Commands::User { cmd } => commands::user::handle(cmd, output_format).await,
    }
}
