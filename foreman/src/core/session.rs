//! Shared contracts for session execution and recording.

use serde::{Deserialize, Serialize};

use crate::core::telemetry::TokenTotals;

/// Normalized classification of one completed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutcomeKind {
    /// Runner reported success and durable state confirms the flip.
    Success,
    /// Agent exited without completing the feature.
    Failed,
    /// Runner reported success but the checklist still marks the feature
    /// failing; counted as a failure.
    Unconfirmed,
    /// Session exceeded its deadline and was killed.
    Timeout,
    /// Adapter-level fault (spawn failure, transport error).
    SdkError,
}

impl OutcomeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OutcomeKind::Success => "success",
            OutcomeKind::Failed => "failed",
            OutcomeKind::Unconfirmed => "unconfirmed",
            OutcomeKind::Timeout => "timeout",
            OutcomeKind::SdkError => "sdk-error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(OutcomeKind::Success),
            "failed" => Some(OutcomeKind::Failed),
            "unconfirmed" => Some(OutcomeKind::Unconfirmed),
            "timeout" => Some(OutcomeKind::Timeout),
            "sdk-error" => Some(OutcomeKind::SdkError),
            _ => None,
        }
    }
}

/// What a session runner hands back to the loop.
///
/// `success` is the runner's claim; the loop confirms it against durable
/// state before treating the session as a success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    pub success: bool,
    pub duration_ms: u64,
    /// Post-deduplication cumulative token usage.
    pub tokens: TokenTotals,
    pub turns: Option<u32>,
    pub kind: OutcomeKind,
}

/// One completed session as recorded in the progress ledger.
///
/// Appended once, never mutated or removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionRecord {
    pub session_id: u64,
    pub feature_id: String,
    /// RFC 3339 start time.
    pub started_at: String,
    pub duration_ms: u64,
    pub success: bool,
    pub tokens: TokenTotals,
    pub turns: Option<u32>,
    pub outcome: OutcomeKind,
}
