//! Multi-session looping for `foreman run`.
//!
//! The loop is the only writer to the feature store and the ledger, and at
//! most one session is in flight at a time. Durable truth (which features
//! pass, what happened in prior sessions) always lives on disk; the counters
//! here only bound a single process run, so a crashed loop resumes correctly
//! from persisted state on the next invocation.

use anyhow::Result;

use crate::io::config::LoopConfig;
use crate::io::feature_store::FeatureStore;
use crate::io::ledger::ProgressLedger;
use crate::io::paths::ProjectPaths;
use crate::io::session::SessionRunner;
use crate::step::{StepOutcome, run_step};

/// Reason why `run_loop` stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopStop {
    /// Every feature passes.
    Complete,
    /// Too many consecutive failed sessions.
    Stuck {
        consecutive_failures: u32,
        max_failures: u32,
    },
    /// Configured session budget exhausted.
    SessionLimit {
        sessions_run: u32,
        max_sessions: u32,
    },
}

/// Summary of a loop invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopOutcome {
    pub sessions_run: u32,
    pub stop: LoopStop,
}

/// Process-local bounds for one `run` invocation.
#[derive(Debug, Clone)]
pub struct LoopLimits {
    pub max_failures: u32,
    pub max_sessions: Option<u32>,
}

/// Run sessions until the checklist completes or a stop condition fires.
///
/// Stop conditions are checked before each selection, in priority order:
/// completion always wins over the failure-count stop, which wins over the
/// session limit. Session-level faults never abort the loop; only store or
/// ledger persistence errors do.
pub fn run_loop<R: SessionRunner, F: FnMut(&StepOutcome)>(
    paths: &ProjectPaths,
    store: &mut FeatureStore,
    ledger: &mut ProgressLedger,
    runner: &R,
    cfg: &LoopConfig,
    limits: &LoopLimits,
    mut on_step: F,
) -> Result<LoopOutcome> {
    let mut sessions_run = 0u32;
    let mut consecutive_failures = 0u32;

    loop {
        if store.is_complete()? {
            return Ok(LoopOutcome {
                sessions_run,
                stop: LoopStop::Complete,
            });
        }
        if consecutive_failures >= limits.max_failures {
            return Ok(LoopOutcome {
                sessions_run,
                stop: LoopStop::Stuck {
                    consecutive_failures,
                    max_failures: limits.max_failures,
                },
            });
        }
        if let Some(max_sessions) = limits.max_sessions
            && sessions_run >= max_sessions
        {
            return Ok(LoopOutcome {
                sessions_run,
                stop: LoopStop::SessionLimit {
                    sessions_run,
                    max_sessions,
                },
            });
        }

        let step = run_step(paths, store, ledger, runner, cfg)?;
        sessions_run += 1;
        if step.confirmed {
            consecutive_failures = 0;
        } else {
            consecutive_failures += 1;
        }
        on_step(&step);
    }
}
