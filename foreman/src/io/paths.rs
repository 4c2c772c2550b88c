//! Canonical file locations within a project root.

use std::path::PathBuf;

/// All files the loop reads or writes for one project.
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    pub root: PathBuf,
    /// The feature checklist (`feature_list.json`).
    pub feature_list_path: PathBuf,
    /// The append-only progress ledger (`PROGRESS.md`).
    pub ledger_path: PathBuf,
    /// Loop configuration (`foreman.toml`).
    pub config_path: PathBuf,
    /// Internal state directory (`.foreman/`).
    pub internal_dir: PathBuf,
    /// Per-session raw event stream logs (`.foreman/sessions/`).
    pub sessions_dir: PathBuf,
    pub gitignore_path: PathBuf,
}

impl ProjectPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let internal_dir = root.join(".foreman");
        let sessions_dir = internal_dir.join("sessions");
        Self {
            feature_list_path: root.join("feature_list.json"),
            ledger_path: root.join("PROGRESS.md"),
            config_path: root.join("foreman.toml"),
            gitignore_path: internal_dir.join(".gitignore"),
            internal_dir,
            sessions_dir,
            root,
        }
    }

    /// Stream log path for one session.
    pub fn session_stream_path(&self, session_id: u64) -> PathBuf {
        self.sessions_dir.join(format!("session-{session_id}.jsonl"))
    }
}
