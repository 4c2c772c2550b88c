//! One session of the loop: select, execute, confirm, record.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{info, instrument};

use crate::core::feature::Feature;
use crate::core::selector::next_feature;
use crate::core::session::{OutcomeKind, SessionOutcome, SessionRecord};
use crate::core::telemetry::TokenTotals;
use crate::io::config::LoopConfig;
use crate::io::feature_store::FeatureStore;
use crate::io::ledger::ProgressLedger;
use crate::io::paths::ProjectPaths;
use crate::io::prompt::{PromptInputs, render_session_prompt};
use crate::io::session::{SessionRequest, SessionRunner};

/// Result of one completed session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub session_id: u64,
    pub feature_id: String,
    /// Final classification after confirming against durable state.
    pub kind: OutcomeKind,
    /// True only when the flip is visible in the checklist on disk.
    pub confirmed: bool,
    pub tokens: TokenTotals,
    pub duration_ms: u64,
}

/// Run exactly one session against the next failing feature.
///
/// The runner's claimed success is re-validated against the checklist on
/// disk: a session that reports success without flipping the feature counts
/// as a failure. Exactly one ledger block is appended, whatever the outcome.
#[instrument(skip_all)]
pub fn run_step<R: SessionRunner>(
    paths: &ProjectPaths,
    store: &mut FeatureStore,
    ledger: &mut ProgressLedger,
    runner: &R,
    cfg: &LoopConfig,
) -> Result<StepOutcome> {
    let list = store.load().context("load feature list")?;
    let feature = next_feature(&list)
        .cloned()
        .ok_or_else(|| anyhow!("no failing feature to select (checklist complete)"))?;

    let session_id = ledger.parse().context("parse ledger")?.next_session_id();
    let prompt = render_session_prompt(&PromptInputs::new(&list, &feature))?;
    let started_at = chrono::Utc::now().to_rfc3339();

    info!(
        session_id,
        feature_id = %feature.id,
        priority = feature.priority.as_str(),
        "running session"
    );

    let request = SessionRequest {
        prompt,
        workdir: paths.root.clone(),
        timeout: Duration::from_secs(cfg.session_timeout_secs),
        stream_log_path: Some(paths.session_stream_path(session_id)),
        output_limit_bytes: cfg.stream_log_limit_bytes,
    };
    let outcome = runner.run_session(&request);

    let confirmed = outcome.success
        && store
            .was_feature_completed(&feature.id)
            .context("confirm feature completion")?;
    let kind = match outcome.kind {
        OutcomeKind::Success if confirmed => OutcomeKind::Success,
        OutcomeKind::Success => OutcomeKind::Unconfirmed,
        other => other,
    };

    let record = SessionRecord {
        session_id,
        feature_id: feature.id.clone(),
        started_at,
        duration_ms: outcome.duration_ms,
        success: confirmed,
        tokens: outcome.tokens,
        turns: outcome.turns,
        outcome: kind,
    };
    ledger
        .append(&record, &narrative_for(&feature, kind, &outcome))
        .context("append ledger")?;

    info!(session_id, outcome = kind.as_str(), "session recorded");
    Ok(StepOutcome {
        session_id,
        feature_id: feature.id,
        kind,
        confirmed,
        tokens: outcome.tokens,
        duration_ms: outcome.duration_ms,
    })
}

fn narrative_for(feature: &Feature, kind: OutcomeKind, outcome: &SessionOutcome) -> String {
    let lead = format!(
        "Ran the agent against `{}` ({} priority).",
        feature.id,
        feature.priority.as_str()
    );
    let result = match kind {
        OutcomeKind::Success => {
            "The agent finished and the checklist now marks the feature passing.".to_string()
        }
        OutcomeKind::Unconfirmed => {
            "The agent reported success, but the checklist still marks the feature failing; \
             counted as a failure."
                .to_string()
        }
        OutcomeKind::Timeout => format!(
            "The session hit its deadline after {} ms and was killed; the feature remains failing.",
            outcome.duration_ms
        ),
        OutcomeKind::SdkError => {
            "The agent invocation failed before completing; see the session stream log.".to_string()
        }
        OutcomeKind::Failed => "The agent exited without completing the feature.".to_string(),
    };
    format!("{lead} {result}")
}
