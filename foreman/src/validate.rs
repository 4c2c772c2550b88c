//! Checklist validation for `foreman validate`.
//!
//! Unlike the store's load path, which fails fast on the first problem class,
//! this collects every finding so a broken checklist can be repaired in one
//! pass. Missing or unreadable files and malformed JSON remain fatal.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;

use crate::core::feature::FeatureList;
use crate::core::invariants::{Issue, collect_warnings, validate_invariants};
use crate::io::feature_store::schema_issues;

/// Full validation outcome.
#[derive(Debug, Clone, Serialize)]
pub struct ValidateReport {
    pub valid: bool,
    pub errors: Vec<Issue>,
    pub warnings: Vec<Issue>,
    pub stats: Stats,
}

/// Checklist statistics, computed even for invalid documents where possible.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Stats {
    pub total: usize,
    pub passing: usize,
    pub failing: usize,
    pub by_category: BTreeMap<String, usize>,
    pub by_priority: BTreeMap<String, usize>,
}

/// Validate the checklist at `path`, collecting all findings.
pub fn validate_checklist(path: &Path) -> Result<ValidateReport> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("read feature list {}", path.display()))?;
    let value: Value = serde_json::from_str(&contents)
        .with_context(|| format!("malformed JSON in {}", path.display()))?;

    let mut errors = schema_issues(&value);
    let mut warnings = Vec::new();

    if errors.is_empty() {
        match serde_json::from_value::<FeatureList>(value.clone()) {
            Ok(list) => {
                errors.extend(validate_invariants(&list));
                warnings.extend(collect_warnings(&list));
            }
            Err(err) => {
                errors.push(Issue::new("document", "document", err.to_string()));
            }
        }
    }

    Ok(ValidateReport {
        valid: errors.is_empty(),
        stats: stats_from_value(&value),
        errors,
        warnings,
    })
}

fn stats_from_value(value: &Value) -> Stats {
    let mut stats = Stats::default();
    let Some(features) = value.get("features").and_then(Value::as_array) else {
        return stats;
    };

    stats.total = features.len();
    for feature in features {
        if feature.get("passes").and_then(Value::as_bool) == Some(true) {
            stats.passing += 1;
        }
        let category = feature
            .get("category")
            .and_then(Value::as_str)
            .unwrap_or("uncategorized");
        *stats.by_category.entry(category.to_string()).or_insert(0) += 1;
        let priority = feature
            .get("priority")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        *stats.by_priority.entry(priority.to_string()).or_insert(0) += 1;
    }
    stats.failing = stats.total - stats.passing;
    stats
}

/// Human-readable rendering of the report.
pub fn render_human(report: &ValidateReport) -> String {
    let mut out = String::new();
    if report.valid {
        out.push_str("Validation passed.\n");
    } else {
        out.push_str("Validation failed.\n");
    }

    if !report.errors.is_empty() {
        out.push_str(&format!("\nErrors ({}):\n", report.errors.len()));
        for issue in &report.errors {
            out.push_str(&format!(
                "  [{}] {}: {}\n",
                issue.feature_id, issue.field, issue.message
            ));
        }
    }
    if !report.warnings.is_empty() {
        out.push_str(&format!("\nWarnings ({}):\n", report.warnings.len()));
        for issue in &report.warnings {
            out.push_str(&format!(
                "  [{}] {}: {}\n",
                issue.feature_id, issue.field, issue.message
            ));
        }
    }

    out.push_str(&format!(
        "\nFeatures: {} total, {} passing, {} failing\n",
        report.stats.total, report.stats.passing, report.stats.failing
    ));
    if !report.stats.by_category.is_empty() {
        out.push_str("By category:\n");
        for (category, count) in &report.stats.by_category {
            out.push_str(&format!("  {category}: {count}\n"));
        }
    }
    if !report.stats.by_priority.is_empty() {
        out.push_str("By priority:\n");
        for (priority, count) in &report.stats.by_priority {
            out.push_str(&format!("  {priority}: {count}\n"));
        }
    }
    out
}
