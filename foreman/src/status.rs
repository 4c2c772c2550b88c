//! Progress reporting for `foreman status`.

use anyhow::{Context, Result};
use serde::Serialize;

use crate::core::selector::failing_by_priority;
use crate::core::session::SessionRecord;
use crate::core::telemetry::TokenTotals;
use crate::io::feature_store::FeatureStore;
use crate::io::ledger::ProgressLedger;

/// Combined view over checklist progress and session history.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub project_name: Option<String>,
    pub total: usize,
    pub passing: usize,
    pub failing: usize,
    pub percentage: f64,
    pub is_complete: bool,
    pub next_feature: Option<NextFeature>,
    pub sessions_recorded: usize,
    pub sessions_failed: usize,
    pub tokens: TokenTotals,
    pub last_session: Option<SessionRecord>,
    pub ledger_warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NextFeature {
    pub id: String,
    pub priority: String,
    pub category: String,
    pub description: String,
}

/// Build the status report from durable state.
pub fn status_report(
    store: &mut FeatureStore,
    ledger: &mut ProgressLedger,
) -> Result<StatusReport> {
    let list = store.load().context("load feature list")?;
    let parsed = ledger.parse().context("parse ledger")?;

    let total = list.features.len();
    let passing = list.features.iter().filter(|f| f.passes).count();
    let failing = total - passing;
    let percentage = if total == 0 {
        100.0
    } else {
        passing as f64 / total as f64 * 100.0
    };

    let next_feature = failing_by_priority(&list).first().map(|f| NextFeature {
        id: f.id.clone(),
        priority: f.priority.as_str().to_string(),
        category: f.category.clone(),
        description: f.description.clone(),
    });

    Ok(StatusReport {
        project_name: list.metadata.project_name.clone(),
        total,
        passing,
        failing,
        percentage,
        is_complete: failing == 0,
        next_feature,
        sessions_recorded: parsed.sessions.len(),
        sessions_failed: parsed.sessions.iter().filter(|s| !s.success).count(),
        tokens: parsed.totals,
        last_session: parsed.last_session().cloned(),
        ledger_warnings: parsed.warnings,
    })
}

/// Human-readable rendering of the report.
pub fn render_human(report: &StatusReport) -> String {
    let mut out = String::new();
    if let Some(name) = &report.project_name {
        out.push_str(&format!("Project: {name}\n"));
    }
    out.push_str(&format!(
        "Progress: {}/{} features ({:.1}%)\n",
        report.passing, report.total, report.percentage
    ));
    if report.is_complete {
        out.push_str("All features complete.\n");
    } else if let Some(next) = &report.next_feature {
        out.push_str(&format!(
            "Next: [{}] ({}) {}\n",
            next.id,
            next.priority,
            truncate(&next.description, 60)
        ));
    }
    out.push_str(&format!(
        "Sessions recorded: {} ({} failed)\n",
        report.sessions_recorded, report.sessions_failed
    ));
    out.push_str(&format!(
        "Token usage: {} input / {} output / {} reasoning\n",
        report.tokens.input, report.tokens.output, report.tokens.reasoning
    ));
    if let Some(last) = &report.last_session {
        out.push_str(&format!(
            "Last session: #{} [{}] {} ({} ms)\n",
            last.session_id,
            last.feature_id,
            last.outcome.as_str(),
            last.duration_ms
        ));
    }
    for warning in &report.ledger_warnings {
        out.push_str(&format!("Warning: {warning}\n"));
    }
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max).collect();
        format!("{head}…")
    }
}
