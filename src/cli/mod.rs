pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::config;
use crate::server::init_tracing;
use crate::state::AppState;

#[derive(Parser)]
#[command(name = "agency")]
#[command(about = "Agency CLI - Operator tooling for the agency back office")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[arg(long, global = true, help = "Use the in-process memory backend instead of the hosted one")]
    pub memory: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the HTTP API")]
    Serve {
        #[arg(long, help = "Port to listen on (defaults to the configured port)")]
        port: Option<u16>,
    },

    #[command(about = "Create the first administrator account and role")]
    BootstrapAdmin {
        #[arg(long, help = "Administrator email")]
        email: String,
        #[arg(long, help = "Display name", default_value = "Administrator")]
        full_name: String,
        #[arg(long, help = "Password (falls back to AGENCY_ADMIN_PASSWORD)")]
        password: Option<String>,
    },

    #[command(flatten)]
    Entity(commands::entity::EntityCommands),

    #[command(about = "Interactively page, search and sort one entity")]
    Browse {
        #[arg(help = "Entity table name, e.g. countries")]
        entity: String,
        #[arg(long, help = "Rows per page (defaults to the configured page size)")]
        page_size: Option<i64>,
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

/// Build the backend for a command from the loaded configuration
pub fn build_state(memory: bool) -> anyhow::Result<AppState> {
    let config = config::config().clone();
    if memory {
        Ok(AppState::in_memory(config)?)
    } else {
        AppState::from_config(config)
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);
    if !matches!(cli.command, Commands::Serve { .. }) {
        // serve installs its own, noisier filter
        init_tracing("agency_office=warn");
    }
    let state = build_state(cli.memory)?;

    match cli.command {
        Commands::Serve { port } => commands::serve::handle(state, port).await,
        Commands::BootstrapAdmin { email, full_name, password } => {
            commands::bootstrap::handle(state, email, full_name, password, output_format).await
        }
        Commands::Entity(cmd) => commands::entity::handle(state, cmd, output_format).await,
        Commands::Browse { entity, page_size } => commands::browse::handle(state, &entity, page_size).await,
    }
}
