//! Local REPL that drives the turn orchestrator against the in-memory demo
//! bank. Lines starting with `/` are REPL commands; everything else is a
//! customer utterance.

use std::path::PathBuf;

use serde_json::json;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use vaulta_agent::{Collaborators, DemoBank, OrchestratorSettings, TurnOrchestrator};
use vaulta_core::config::{AppConfig, LoadOptions};
use vaulta_core::{ResetScope, SessionStore};

use crate::commands::{CommandResult, EXIT_IO, EXIT_RUNTIME};

const PROMPT: &str = "you> ";
const BANNER: &str = "Vaulta demo chat. Demo customers: id 1111 / PIN 2222, id 1234 / PIN 5678.
Commands: /session shows the session snapshot, /reset starts over, /quit exits.";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChatSummary {
    pub turns: usize,
    pub verified: bool,
    pub handoff_requested: bool,
}

pub fn run(session_id: String, config_path: Option<PathBuf>) -> CommandResult {
    let config = match AppConfig::load(LoadOptions { config_path, ..LoadOptions::default() }) {
        Ok(config) => config,
        Err(error) => return CommandResult::config_failure("chat", &error),
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                EXIT_RUNTIME,
            );
        }
    };

    let orchestrator = demo_orchestrator(&config);
    let result = runtime.block_on(async {
        let mut stdout = tokio::io::stdout();
        let stdin = BufReader::new(tokio::io::stdin());
        stdout.write_all(format!("{BANNER}\n").as_bytes()).await?;
        drive(&orchestrator, &session_id, stdin, &mut stdout).await
    });

    match result {
        Ok(summary) => CommandResult::success(
            "chat",
            "chat session ended",
            Some(json!({
                "session_id": session_id,
                "turns": summary.turns,
                "verified": summary.verified,
                "handoff_requested": summary.handoff_requested,
            })),
        ),
        Err(error) => CommandResult::failure("chat", "io", error.to_string(), EXIT_IO),
    }
}

pub fn demo_orchestrator(config: &AppConfig) -> TurnOrchestrator {
    TurnOrchestrator::new(
        SessionStore::from_config(&config.session),
        Collaborators::demo_without_classifier(DemoBank::seeded()),
        OrchestratorSettings::from_config(config),
    )
}

/// Reads utterances until `/quit` or end of input, writing one reply per
/// turn. A rejected turn is reported inline and the loop carries on.
pub async fn drive<R, W>(
    orchestrator: &TurnOrchestrator,
    session_id: &str,
    mut input: R,
    output: &mut W,
) -> std::io::Result<ChatSummary>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut summary = ChatSummary::default();
    let mut line = String::new();

    loop {
        output.write_all(PROMPT.as_bytes()).await?;
        output.flush().await?;

        line.clear();
        if input.read_line(&mut line).await? == 0 {
            break;
        }
        let utterance = line.trim();
        if utterance.is_empty() {
            continue;
        }

        let rendered = match utterance {
            "/quit" | "/exit" => break,
            "/reset" => {
                orchestrator.store().reset(ResetScope::One(session_id.to_string()));
                summary = ChatSummary::default();
                "session cleared".to_string()
            }
            "/session" => match orchestrator.store().snapshot(session_id) {
                Some(snapshot) => serde_json::to_string_pretty(&snapshot)
                    .unwrap_or_else(|error| format!("snapshot unavailable: {error}")),
                None => "no active session".to_string(),
            },
            _ => match orchestrator.process_turn(session_id, utterance).await {
                Ok(reply) => {
                    summary.turns += 1;
                    summary.verified = reply.session.verified;
                    summary.handoff_requested |= reply.requires_human;
                    if reply.requires_human {
                        format!("vaulta> {}\n[handoff to a human agent requested]", reply.reply_text)
                    } else {
                        format!("vaulta> {}", reply.reply_text)
                    }
                }
                Err(error) => format!("[turn rejected: {}]", error.code()),
            },
        };

        output.write_all(rendered.as_bytes()).await?;
        output.write_all(b"\n").await?;
    }

    output.flush().await?;
    Ok(summary)
}
