//! Durable storage and selection queries for the feature checklist.
//!
//! The store owns a per-path snapshot cache: reads within the TTL are served
//! from memory, while `save` always writes atomically (temp file + rename)
//! and invalidates the cached snapshot regardless of its age. Confirmation
//! reads bypass the cache entirely because the agent flips `passes`
//! out-of-band.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::core::feature::{Feature, FeatureList};
use crate::core::invariants::{Issue, validate_invariants};
use crate::core::selector::next_feature;

const FEATURE_LIST_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/schemas/feature_list.schema.json"
));

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5);

/// Errors surfaced by checklist load/save.
///
/// All variants are fatal to the caller: the loop must not operate on a
/// checklist it cannot read, trust, or persist.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("feature list not found at {} (run `foreman init` to scaffold one)", .path.display())]
    NotFound { path: PathBuf },

    #[error("malformed JSON in {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("invalid feature list {} (run `foreman validate` for details):\n{}", .path.display(), format_issues(.issues))]
    Validation { path: PathBuf, issues: Vec<Issue> },

    #[error("{op} {}: {source}", .path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn format_issues(issues: &[Issue]) -> String {
    issues
        .iter()
        .map(|i| format!("- [{}] {}: {}", i.feature_id, i.field, i.message))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Result of flipping one feature's `passes` flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetPassesOutcome {
    /// False when the flag already had the requested value.
    pub changed: bool,
    pub feature: Feature,
    pub passing: usize,
    pub total: usize,
}

#[derive(Debug)]
struct CacheEntry {
    list: FeatureList,
    loaded_at: Instant,
}

/// Durable CRUD + selection queries over `feature_list.json`.
#[derive(Debug)]
pub struct FeatureStore {
    path: PathBuf,
    ttl: Duration,
    cache: HashMap<PathBuf, CacheEntry>,
}

impl FeatureStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_ttl(path, DEFAULT_CACHE_TTL)
    }

    pub fn with_ttl(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            path: path.into(),
            ttl,
            cache: HashMap::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Return the checklist, served from cache when the snapshot is fresh.
    pub fn load(&mut self) -> Result<FeatureList, StoreError> {
        if let Some(entry) = self.cache.get(&self.path)
            && entry.loaded_at.elapsed() < self.ttl
        {
            debug!(path = %self.path.display(), "feature list served from cache");
            return Ok(entry.list.clone());
        }
        let list = self.read_validated()?;
        self.cache.insert(
            self.path.clone(),
            CacheEntry {
                list: list.clone(),
                loaded_at: Instant::now(),
            },
        );
        Ok(list)
    }

    /// Recompute metadata, write atomically, and invalidate the cache.
    ///
    /// On write failure the previous file content is untouched.
    pub fn save(&mut self, list: &mut FeatureList) -> Result<(), StoreError> {
        list.recompute_metadata();
        list.metadata.last_updated = Some(chrono::Utc::now().to_rfc3339());

        let mut buf = serde_json::to_string_pretty(list).map_err(|err| StoreError::Io {
            op: "serialize feature list",
            path: self.path.clone(),
            source: io::Error::new(io::ErrorKind::InvalidData, err),
        })?;
        buf.push('\n');
        self.write_atomic(&buf)?;

        // A save always supersedes whatever snapshot was cached.
        self.cache.remove(&self.path);
        debug!(path = %self.path.display(), total = list.metadata.total_features, "feature list saved");
        Ok(())
    }

    /// Highest-priority failing feature, ties broken by insertion order.
    pub fn get_next_feature(&mut self) -> Result<Option<Feature>, StoreError> {
        let list = self.load()?;
        Ok(next_feature(&list).cloned())
    }

    /// True when every feature passes (vacuously true for zero features).
    pub fn is_complete(&mut self) -> Result<bool, StoreError> {
        Ok(self.load()?.is_complete())
    }

    /// Durable-truth check for a claimed completion.
    ///
    /// Reads the file directly: the flip is written by the agent out-of-band,
    /// so a TTL-fresh snapshot is not evidence. The fresh read replaces the
    /// cached snapshot. Unknown ids report `false`.
    pub fn was_feature_completed(&mut self, id: &str) -> Result<bool, StoreError> {
        let list = self.read_validated()?;
        let completed = list.feature(id).is_some_and(|f| f.passes);
        self.cache.insert(
            self.path.clone(),
            CacheEntry {
                list,
                loaded_at: Instant::now(),
            },
        );
        Ok(completed)
    }

    /// Flip `passes` for one feature, backing up the previous file first.
    ///
    /// Reports `changed: false` without writing when the flag already has the
    /// requested value. Unknown ids are a validation error.
    pub fn set_passes(&mut self, id: &str, passes: bool) -> Result<SetPassesOutcome, StoreError> {
        let mut list = self.read_validated()?;
        let Some(feature) = list.features.iter_mut().find(|f| f.id == id) else {
            return Err(StoreError::Validation {
                path: self.path.clone(),
                issues: vec![Issue::new(id, "id", "unknown feature id")],
            });
        };

        if feature.passes == passes {
            let feature = feature.clone();
            list.recompute_metadata();
            return Ok(SetPassesOutcome {
                changed: false,
                feature,
                passing: list.metadata.passing,
                total: list.metadata.total_features,
            });
        }

        feature.passes = passes;
        let feature = feature.clone();

        let backup_path = self.path.with_extension("json.bak");
        fs::copy(&self.path, &backup_path).map_err(|err| StoreError::Io {
            op: "back up feature list",
            path: backup_path.clone(),
            source: err,
        })?;

        self.save(&mut list)?;
        Ok(SetPassesOutcome {
            changed: true,
            feature,
            passing: list.metadata.passing,
            total: list.metadata.total_features,
        })
    }

    fn read_validated(&self) -> Result<FeatureList, StoreError> {
        if !self.path.exists() {
            return Err(StoreError::NotFound {
                path: self.path.clone(),
            });
        }
        let contents = fs::read_to_string(&self.path).map_err(|err| StoreError::Io {
            op: "read feature list",
            path: self.path.clone(),
            source: err,
        })?;
        let value: Value = serde_json::from_str(&contents).map_err(|err| StoreError::Parse {
            path: self.path.clone(),
            message: err.to_string(),
        })?;

        let issues = schema_issues(&value);
        if !issues.is_empty() {
            return Err(StoreError::Validation {
                path: self.path.clone(),
                issues,
            });
        }

        // The schema has already pinned field types, so residual failures here
        // are shape mismatches the schema cannot express.
        let list: FeatureList =
            serde_json::from_value(value).map_err(|err| StoreError::Validation {
                path: self.path.clone(),
                issues: vec![Issue::new("document", "document", err.to_string())],
            })?;

        let issues = validate_invariants(&list);
        if !issues.is_empty() {
            return Err(StoreError::Validation {
                path: self.path.clone(),
                issues,
            });
        }
        Ok(list)
    }

    fn write_atomic(&self, contents: &str) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|err| StoreError::Io {
                op: "create directory",
                path: parent.to_path_buf(),
                source: err,
            })?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, contents).map_err(|err| StoreError::Io {
            op: "write temp feature list",
            path: tmp_path.clone(),
            source: err,
        })?;
        fs::rename(&tmp_path, &self.path).map_err(|err| StoreError::Io {
            op: "replace feature list",
            path: self.path.clone(),
            source: err,
        })?;
        Ok(())
    }
}

/// Validate a raw checklist document against the embedded JSON Schema.
///
/// Errors are mapped back to the offending feature id and field where the
/// instance path allows it.
pub(crate) fn schema_issues(value: &Value) -> Vec<Issue> {
    let schema: Value = match serde_json::from_str(FEATURE_LIST_SCHEMA) {
        Ok(schema) => schema,
        Err(err) => return vec![Issue::new("schema", "schema", err.to_string())],
    };
    let validator = match jsonschema::validator_for(&schema) {
        Ok(validator) => validator,
        Err(err) => return vec![Issue::new("schema", "schema", err.to_string())],
    };

    validator
        .iter_errors(value)
        .map(|err| {
            let pointer = err.instance_path().to_string();
            let segments: Vec<&str> = pointer.split('/').filter(|s| !s.is_empty()).collect();
            let mut feature_id = String::from("document");
            let mut field = String::from("document");
            if segments.first() == Some(&"features") {
                if let Some(index) = segments.get(1).and_then(|s| s.parse::<usize>().ok()) {
                    feature_id = value
                        .pointer(&format!("/features/{index}/id"))
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("features[{index}]"));
                }
                field = segments.get(2).copied().unwrap_or("feature").to_string();
            }
            Issue {
                feature_id,
                field,
                message: err.to_string(),
            }
        })
        .collect()
}
