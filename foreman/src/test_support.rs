//! Test-only helpers: checklist builders, fixtures, and scripted runners.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;

use serde_json::Value;

use crate::core::feature::{Feature, FeatureList, Priority};
use crate::core::session::{OutcomeKind, SessionOutcome, SessionRecord};
use crate::core::telemetry::TokenTotals;
use crate::io::config::LoopConfig;
use crate::io::feature_store::FeatureStore;
use crate::io::init::{InitOptions, init_project};
use crate::io::ledger::ProgressLedger;
use crate::io::paths::ProjectPaths;
use crate::io::session::{SessionRequest, SessionRunner};

/// Create a deterministic feature with default text fields.
pub fn feature(id: &str, priority: Priority, passes: bool) -> Feature {
    Feature {
        id: id.to_string(),
        category: "core".to_string(),
        description: format!("{id} description"),
        priority,
        steps: vec![format!("{id} step")],
        passes,
    }
}

/// Wrap features in a checklist with default metadata.
pub fn feature_list(features: Vec<Feature>) -> FeatureList {
    FeatureList {
        features,
        ..FeatureList::default()
    }
}

/// Create a deterministic session record with the given token counts.
pub fn session_record(
    session_id: u64,
    feature_id: &str,
    outcome: OutcomeKind,
    input: u64,
    output: u64,
) -> SessionRecord {
    SessionRecord {
        session_id,
        feature_id: feature_id.to_string(),
        started_at: "2026-01-01T00:00:00+00:00".to_string(),
        duration_ms: 1_000,
        success: outcome == OutcomeKind::Success,
        tokens: TokenTotals {
            input,
            output,
            reasoning: 0,
        },
        turns: None,
        outcome,
    }
}

/// Outcome for a runner that claims success.
pub fn success_outcome(input: u64, output: u64) -> SessionOutcome {
    SessionOutcome {
        success: true,
        duration_ms: 1_000,
        tokens: TokenTotals {
            input,
            output,
            reasoning: 0,
        },
        turns: Some(1),
        kind: OutcomeKind::Success,
    }
}

/// Outcome for a failed session of the given kind.
pub fn failure_outcome(kind: OutcomeKind) -> SessionOutcome {
    SessionOutcome {
        success: false,
        duration_ms: 1_000,
        tokens: TokenTotals::default(),
        turns: None,
        kind,
    }
}

/// One scripted session for [`ScriptedRunner`].
#[derive(Debug, Clone)]
pub struct ScriptedSession {
    pub outcome: SessionOutcome,
    /// Feature id to flip to passing in the checklist before returning,
    /// simulating the agent editing `feature_list.json` out-of-band.
    pub complete_feature: Option<String>,
}

impl ScriptedSession {
    /// A session that succeeds and flips the feature.
    pub fn completing(feature_id: &str) -> Self {
        Self {
            outcome: success_outcome(5, 10),
            complete_feature: Some(feature_id.to_string()),
        }
    }

    /// A session that fails without touching the checklist.
    pub fn failing() -> Self {
        Self {
            outcome: failure_outcome(OutcomeKind::Failed),
            complete_feature: None,
        }
    }
}

/// Session runner returning predetermined outcomes without spawning
/// processes. Panics when more sessions run than were scripted.
pub struct ScriptedRunner {
    sessions: RefCell<VecDeque<ScriptedSession>>,
}

impl ScriptedRunner {
    pub fn new(sessions: Vec<ScriptedSession>) -> Self {
        Self {
            sessions: RefCell::new(sessions.into()),
        }
    }
}

impl SessionRunner for ScriptedRunner {
    fn run_session(&self, request: &SessionRequest) -> SessionOutcome {
        let session = self
            .sessions
            .borrow_mut()
            .pop_front()
            .expect("scripted runner exhausted");

        if let Some(feature_id) = &session.complete_feature {
            // Edit the checklist the way the real agent does: directly,
            // outside the store's cache.
            let path = request.workdir.join("feature_list.json");
            let contents = fs::read_to_string(&path).expect("read checklist");
            let mut value: Value = serde_json::from_str(&contents).expect("parse checklist");
            let features = value["features"].as_array_mut().expect("features array");
            let feature = features
                .iter_mut()
                .find(|f| f["id"].as_str() == Some(feature_id))
                .expect("scripted feature id exists");
            feature["passes"] = Value::Bool(true);
            fs::write(&path, value.to_string()).expect("write checklist");
        }

        session.outcome
    }
}

/// Temporary project with scaffolding and a seeded checklist.
pub struct TestProject {
    _temp: tempfile::TempDir,
    paths: ProjectPaths,
}

impl TestProject {
    pub fn new(features: Vec<Feature>) -> Self {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = init_project(temp.path(), &InitOptions { force: false }).expect("init");

        let mut store = FeatureStore::new(&paths.feature_list_path);
        let mut list = feature_list(features);
        store.save(&mut list).expect("seed checklist");

        Self { _temp: temp, paths }
    }

    pub fn paths(&self) -> &ProjectPaths {
        &self.paths
    }

    /// Fresh store and ledger handles over the project files.
    pub fn open(&self) -> (FeatureStore, ProgressLedger) {
        (
            FeatureStore::new(&self.paths.feature_list_path),
            ProgressLedger::new(&self.paths.ledger_path),
        )
    }

    pub fn config(&self) -> LoopConfig {
        LoopConfig::default()
    }
}
