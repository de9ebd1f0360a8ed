use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use procura_agent::{AgentRuntime, ChatError};
use procura_core::config::LoadOptions;
use procura_core::ApplicationError;
use procura_db::{SqlArtifactSink, SqlRecordStore};
use tracing::{info, warn};

use crate::commands::{build_runtime, load_config, open_database, CommandResult};

const PROMPT: &str = "> ";

pub fn run(options: LoadOptions, owner_id: &str, context_file: Option<&Path>) -> CommandResult {
    let reference_context = match context_file.map(std::fs::read_to_string).transpose() {
        Ok(context) => context,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                "context_file",
                format!("failed to read reference context: {error}"),
                2,
            )
        }
    };

    let config = match load_config("chat", options) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match build_runtime("chat") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;
        let agent = AgentRuntime::with_gemini(
            &config,
            Arc::new(SqlRecordStore::new(pool.clone())),
            Arc::new(SqlArtifactSink::new(pool.clone())),
        )
        .map_err(|error| ("llm_config", error.to_string(), 2u8))?;

        let stdin = io::stdin();
        let conversed = converse(
            &agent,
            owner_id,
            reference_context.as_deref(),
            stdin.lock(),
            io::stdout(),
        )
        .await
        .map_err(|error| ("chat_session", format!("{error:#}"), 6u8));
        pool.close().await;
        conversed
    });

    match result {
        Ok(turns) => {
            CommandResult::success("chat", format!("conversation ended after {turns} turns"))
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("chat", error_class, message, exit_code)
        }
    }
}

/// Line-oriented conversation loop. `/reset` starts a fresh session and
/// `/quit` or end of input stops. Returns the number of answered turns.
pub async fn converse(
    runtime: &AgentRuntime,
    owner_id: &str,
    reference_context: Option<&str>,
    mut input: impl BufRead,
    mut output: impl Write,
) -> anyhow::Result<usize> {
    let mut key = runtime
        .start_session(owner_id, reference_context)
        .await
        .context("failed to start chat session")?;
    info!(session = %key, "chat session started");
    writeln!(output, "Procura is ready. Type /reset to start over or /quit to leave.")?;

    let mut turns = 0;
    let mut line = String::new();
    loop {
        write!(output, "{PROMPT}")?;
        output.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            break;
        }

        match line.trim() {
            "" => continue,
            "/quit" => break,
            "/reset" => {
                let outcome = runtime.reset(&key).await;
                if !outcome.cleared {
                    warn!(session = %key, "reset detached a session that was still busy");
                }
                key = runtime
                    .start_session(owner_id, reference_context)
                    .await
                    .context("failed to restart chat session")?;
                writeln!(output, "Conversation cleared.")?;
            }
            message => match runtime.handle_message(&key, message).await {
                Ok(outcome) => {
                    turns += 1;
                    writeln!(output, "{}", outcome.reply)?;
                }
                Err(ChatError::MessageRejected { message, .. }) => {
                    writeln!(output, "{message}")?;
                }
                Err(error) => {
                    let failure =
                        ApplicationError::from(error).into_interface(key.session_id.clone());
                    warn!(session = %key, error = %failure, "chat turn failed");
                    writeln!(
                        output,
                        "{} (ref {})",
                        failure.user_message(),
                        failure.correlation_id()
                    )?;
                }
            },
        }
    }

    Ok(turns)
}
