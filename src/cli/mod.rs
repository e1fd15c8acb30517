//! CLI surface for Maestro
//!
//! Commands:
//! - `run`: execute a named command through the coordinator
//! - `commands`: list the available command definitions
//! - `doctor`: diagnose configuration and provider readiness

use clap::{Parser, Subcommand};
use uuid::Uuid;

pub mod commands;
pub mod doctor;
pub mod prompts;
pub mod run;

/// Maestro CLI
#[derive(Parser, Debug)]
#[command(name = "maestro")]
#[command(about = "Multi-stage AI command workflows with provider fallback")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute a named command
    Run {
        /// Command name, e.g. `implement` or `review-plan`
        name: String,
        /// Positional arguments handed to the command's stages
        args: Vec<String>,
        /// Provider override (anthropic, openai, google, xai, moonshot, cursor)
        #[arg(long)]
        provider: Option<String>,
        /// Model override
        #[arg(long)]
        model: Option<String>,
        /// Execution mode (chat, plan, agent)
        #[arg(long)]
        mode: Option<String>,
        /// Force a specific agent role, skipping dynamic selection
        #[arg(long)]
        agent: Option<String>,
        /// Reuse an existing session
        #[arg(long)]
        session_id: Option<Uuid>,
        /// Disable all interactive prompts
        #[arg(long)]
        no_interactive: bool,
    },
    /// List available commands
    Commands,
    /// Run configuration diagnostics
    Doctor,
}

/// Run the CLI command
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Some(Commands::Run {
            name,
            args,
            provider,
            model,
            mode,
            agent,
            session_id,
            no_interactive,
        }) => {
            run::run(run::RunArgs {
                name,
                args,
                provider,
                model,
                mode,
                agent,
                session_id,
                interactive: !no_interactive,
            })
            .await
        }
        Some(Commands::Commands) => commands::run().await,
        Some(Commands::Doctor) => doctor::run().await,
        None => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            cmd.print_help()?;
            println!();
            Ok(())
        }
    }
}
