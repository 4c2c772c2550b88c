//! Project scaffolding for `foreman init`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};

use crate::core::feature::FeatureList;
use crate::io::config::{LoopConfig, write_config};
use crate::io::feature_store::FeatureStore;
use crate::io::paths::ProjectPaths;

const INTERNAL_GITIGNORE: &str = "sessions/\n";

/// Options for `init_project`.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// If true, overwrite existing scaffolding.
    pub force: bool,
}

/// Create checklist, ledger, and config scaffolding in `root`.
///
/// Fails if scaffolding already exists unless `options.force` is set.
pub fn init_project(root: &Path, options: &InitOptions) -> Result<ProjectPaths> {
    let paths = ProjectPaths::new(root);

    if !options.force {
        for existing in [&paths.feature_list_path, &paths.config_path] {
            if existing.exists() {
                return Err(anyhow!(
                    "foreman init: {} already exists (use --force to overwrite)",
                    existing.display()
                ));
            }
        }
    }

    fs::create_dir_all(&paths.internal_dir)
        .with_context(|| format!("create directory {}", paths.internal_dir.display()))?;
    fs::create_dir_all(&paths.sessions_dir)
        .with_context(|| format!("create directory {}", paths.sessions_dir.display()))?;
    fs::write(&paths.gitignore_path, INTERNAL_GITIGNORE)
        .with_context(|| format!("write {}", paths.gitignore_path.display()))?;

    // The starter checklist is empty; an initializer (human or agent) fills
    // it in before the first `foreman run`.
    let mut store = FeatureStore::new(&paths.feature_list_path);
    let mut list = FeatureList::default();
    store
        .save(&mut list)
        .with_context(|| format!("write {}", paths.feature_list_path.display()))?;

    write_config(&paths.config_path, &LoopConfig::default())
        .with_context(|| format!("write {}", paths.config_path.display()))?;

    Ok(paths)
}
