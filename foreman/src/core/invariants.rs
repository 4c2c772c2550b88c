//! Semantic checklist invariants not expressible via JSON Schema.

use std::collections::HashSet;

use serde::Serialize;

use crate::core::feature::FeatureList;

/// A single validation finding tied to a feature and field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub feature_id: String,
    pub field: String,
    pub message: String,
}

impl Issue {
    pub fn new(feature_id: &str, field: &str, message: impl Into<String>) -> Self {
        Self {
            feature_id: feature_id.to_string(),
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Check invariants the schema cannot express:
/// - No duplicate ids
/// - Non-blank id and description
pub fn validate_invariants(list: &FeatureList) -> Vec<Issue> {
    let mut issues = Vec::new();
    let mut seen = HashSet::new();

    for feature in &list.features {
        if !seen.insert(feature.id.clone()) {
            issues.push(Issue::new(&feature.id, "id", "duplicate feature id"));
        }
        if feature.id.trim().is_empty() {
            issues.push(Issue::new(&feature.id, "id", "blank feature id"));
        }
        if feature.description.trim().is_empty() {
            issues.push(Issue::new(&feature.id, "description", "empty description"));
        }
    }

    issues
}

/// Findings that do not invalidate the checklist.
pub fn collect_warnings(list: &FeatureList) -> Vec<Issue> {
    list.features
        .iter()
        .filter(|f| f.steps.is_empty())
        .map(|f| Issue::new(&f.id, "steps", "no verification steps"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::feature::Priority;
    use crate::test_support::{feature, feature_list};

    #[test]
    fn duplicate_ids_are_reported() {
        let list = feature_list(vec![
            feature("dup", Priority::High, false),
            feature("dup", Priority::Low, false),
        ]);

        let issues = validate_invariants(&list);
        assert!(
            issues
                .iter()
                .any(|i| i.feature_id == "dup" && i.message.contains("duplicate"))
        );
    }

    #[test]
    fn empty_description_is_reported() {
        let mut list = feature_list(vec![feature("a", Priority::High, false)]);
        list.features[0].description = "  ".to_string();

        let issues = validate_invariants(&list);
        assert!(issues.iter().any(|i| i.field == "description"));
    }

    #[test]
    fn valid_checklist_has_no_issues() {
        let list = feature_list(vec![
            feature("a", Priority::High, false),
            feature("b", Priority::Low, true),
        ]);
        assert!(validate_invariants(&list).is_empty());
    }

    #[test]
    fn missing_steps_is_a_warning_not_an_error() {
        let mut list = feature_list(vec![feature("a", Priority::High, false)]);
        list.features[0].steps.clear();

        assert!(validate_invariants(&list).is_empty());
        let warnings = collect_warnings(&list);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].field, "steps");
    }
}
