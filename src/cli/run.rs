//! `maestro run` implementation

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use maestro_core::{
    AppContext, CommandExecutionOptions, Prompts, UserFriendlyError,
};
use maestro_llm::Mode;

use super::prompts::{InquireAgentConfirm, InquireRemapPrompt};

/// Parsed arguments for one `run` invocation
pub struct RunArgs {
    pub name: String,
    pub args: Vec<String>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub mode: Option<String>,
    pub agent: Option<String>,
    pub session_id: Option<Uuid>,
    pub interactive: bool,
}

pub async fn run(args: RunArgs) -> anyhow::Result<()> {
    let mode = args
        .mode
        .as_deref()
        .map(str::parse::<Mode>)
        .transpose()
        .map_err(|e| anyhow::anyhow!(e))?;

    let prompts = if args.interactive {
        Prompts {
            remap: Some(Arc::new(InquireRemapPrompt)),
            agent_confirm: Some(Arc::new(InquireAgentConfirm)),
        }
    } else {
        Prompts::default()
    };

    let app = AppContext::from_env(None, prompts)?;
    let options = CommandExecutionOptions {
        args: args.args,
        provider: args.provider,
        model: args.model,
        mode,
        agent: args.agent,
        session_id: args.session_id,
        interactive: args.interactive,
    };

    match app.coordinator.execute(&args.name, &options).await {
        Ok(outcome) => {
            debug!(
                session = %outcome.session_id,
                agent = %outcome.agent,
                provider = %outcome.provider_name,
                duration_ms = outcome.duration_ms,
                "Command finished"
            );
            println!("{}", outcome.result.response);
            if !outcome.result.skipped_stages.is_empty() {
                eprintln!("(skipped stages: {})", outcome.result.skipped_stages.join(", "));
            }
            eprintln!("session: {}", outcome.session_id);
            app.shutdown().await;
            Ok(())
        }
        Err(e) => {
            eprintln!("error: {}", e.user_message());
            if let Some(suggestion) = e.suggestion() {
                eprintln!("{suggestion}");
            }
            app.shutdown().await;
            std::process::exit(1);
        }
    }
}
