//! Session execution boundary for the external coding agent.
//!
//! [`SessionRunner`] decouples the loop from the agent backend. The loop sees
//! only a normalized [`SessionOutcome`]: deadline races become `timeout`
//! outcomes, adapter faults become `sdk-error` outcomes, and approval prompts
//! are settled by spawn-time flags so nothing interactive ever reaches the
//! loop. Tests use scripted runners that return predetermined outcomes
//! without spawning processes.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process::Command;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};

use crate::core::session::{OutcomeKind, SessionOutcome};
use crate::core::telemetry::{TokenDedup, TokenEvent, TokenTotals};
use crate::io::events::{is_turn_boundary, token_event_from_line};
use crate::io::process::run_command_with_timeout;

/// Environment variable overriding the agent binary, read once at
/// construction.
pub const AGENT_BIN_ENV: &str = "FOREMAN_AGENT_BIN";

/// Bound on the raw telemetry queue within one session. Events beyond the
/// bound are dropped rather than blocking the stream reader.
const EVENT_QUEUE_CAP: usize = 1024;

/// Parameters for one session.
#[derive(Debug, Clone)]
pub struct SessionRequest {
    /// Prompt text describing exactly one feature.
    pub prompt: String,
    /// Working directory for the agent process.
    pub workdir: PathBuf,
    /// Deadline for the whole session.
    pub timeout: Duration,
    /// When set, raw stdout lines are teed here for observability.
    pub stream_log_path: Option<PathBuf>,
    /// Truncate captured agent output beyond this many bytes.
    pub output_limit_bytes: usize,
}

/// Abstraction over agent execution backends.
pub trait SessionRunner {
    /// Run one session to completion or deadline. Faults are folded into the
    /// outcome kind; this call does not fail.
    fn run_session(&self, request: &SessionRequest) -> SessionOutcome;
}

enum StreamItem {
    Tokens(TokenEvent),
    Turn,
}

/// Runner that spawns `codex exec` with JSONL telemetry on stdout.
pub struct CodexSessionRunner {
    program: String,
    args: Vec<String>,
}

impl CodexSessionRunner {
    /// Build from the configured command, honoring [`AGENT_BIN_ENV`].
    pub fn from_config(command: &[String]) -> Self {
        let program = std::env::var(AGENT_BIN_ENV)
            .ok()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| command.first().cloned())
            .unwrap_or_else(|| "codex".to_string());
        let args = command.iter().skip(1).cloned().collect();
        Self { program, args }
    }

    fn execute(&self, request: &SessionRequest, started: Instant) -> Result<SessionOutcome> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg("--json")
            // Approval prompts are resolved here, at spawn time; the loop
            // never sees agent-side permission UX.
            .arg("--sandbox")
            .arg("danger-full-access")
            .arg("--skip-git-repo-check")
            .arg("-")
            .current_dir(&request.workdir);

        let stream_file = match &request.stream_log_path {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)
                        .with_context(|| format!("create stream dir {}", parent.display()))?;
                }
                let file = fs::File::create(path)
                    .with_context(|| format!("create stream log {}", path.display()))?;
                Some(BufWriter::new(file))
            }
            None => None,
        };

        let (event_tx, event_rx) = mpsc::sync_channel::<StreamItem>(EVENT_QUEUE_CAP);
        let mut stream_file = stream_file;
        let on_line = move |line: &[u8]| {
            if let Some(writer) = stream_file.as_mut() {
                if let Err(e) = writer.write_all(line) {
                    warn!(err = %e, "failed to write stream log");
                }
            }
            let at_ms = started.elapsed().as_millis() as u64;
            if let Ok(text) = std::str::from_utf8(line) {
                if let Some(event) = token_event_from_line(text, at_ms) {
                    let _ = event_tx.try_send(StreamItem::Tokens(event));
                } else if is_turn_boundary(text) {
                    let _ = event_tx.try_send(StreamItem::Turn);
                }
            }
        };

        let output = run_command_with_timeout(
            cmd,
            Some(request.prompt.as_bytes()),
            request.timeout,
            request.output_limit_bytes,
            on_line,
        )
        .context("run agent process")?;

        // The observer (and with it the sender) is gone once the reader
        // thread has joined, so this drain terminates.
        let mut fold = TokenDedup::new();
        let mut turns = 0u32;
        for item in event_rx {
            match item {
                StreamItem::Tokens(event) => {
                    fold.push(event);
                }
                StreamItem::Turn => turns += 1,
            }
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        let tokens = fold.totals();
        let turns = (turns > 0).then_some(turns);

        if output.timed_out {
            warn!(
                timeout_secs = request.timeout.as_secs(),
                "agent session timed out"
            );
            return Ok(SessionOutcome {
                success: false,
                duration_ms,
                tokens,
                turns,
                kind: OutcomeKind::Timeout,
            });
        }

        let success = output.status.success();
        if !success {
            warn!(
                exit_code = ?output.status.code(),
                stderr = %String::from_utf8_lossy(&output.stderr),
                "agent session failed"
            );
        } else {
            debug!(duration_ms, total_tokens = tokens.total(), "agent session completed");
        }
        Ok(SessionOutcome {
            success,
            duration_ms,
            tokens,
            turns,
            kind: if success {
                OutcomeKind::Success
            } else {
                OutcomeKind::Failed
            },
        })
    }
}

impl SessionRunner for CodexSessionRunner {
    #[instrument(skip_all, fields(timeout_secs = request.timeout.as_secs()))]
    fn run_session(&self, request: &SessionRequest) -> SessionOutcome {
        info!(workdir = %request.workdir.display(), "starting agent session");
        let started = Instant::now();
        match self.execute(request, started) {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(err = %format!("{err:#}"), "agent invocation failed");
                SessionOutcome {
                    success: false,
                    duration_ms: started.elapsed().as_millis() as u64,
                    tokens: TokenTotals::default(),
                    turns: None,
                    kind: OutcomeKind::SdkError,
                }
            }
        }
    }
}
