//! Deterministic selection over the feature checklist.

use crate::core::feature::{Feature, FeatureList};

/// Highest-priority failing feature, ties broken by original position.
///
/// Returns `None` if all features pass (checklist is complete).
pub fn next_feature(list: &FeatureList) -> Option<&Feature> {
    // min_by_key keeps the first of equal keys, which is the insertion-order
    // tie-break the checklist contract requires.
    list.features
        .iter()
        .filter(|f| !f.passes)
        .min_by_key(|f| f.priority.rank())
}

/// All failing features, stably ordered by priority rank then position.
pub fn failing_by_priority(list: &FeatureList) -> Vec<&Feature> {
    let mut failing: Vec<&Feature> = list.features.iter().filter(|f| !f.passes).collect();
    failing.sort_by_key(|f| f.priority.rank());
    failing
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::feature::Priority;
    use crate::test_support::{feature, feature_list};

    #[test]
    fn next_feature_picks_highest_priority() {
        let list = feature_list(vec![
            feature("slow", Priority::Low, false),
            feature("urgent", Priority::Critical, false),
            feature("soon", Priority::High, false),
        ]);

        let selected = next_feature(&list).expect("open feature");
        assert_eq!(selected.id, "urgent");
    }

    #[test]
    fn next_feature_breaks_ties_by_insertion_order() {
        let list = feature_list(vec![
            feature("zeta", Priority::High, false),
            feature("alpha", Priority::High, false),
        ]);

        let selected = next_feature(&list).expect("open feature");
        assert_eq!(selected.id, "zeta");
    }

    #[test]
    fn next_feature_never_returns_passing() {
        let list = feature_list(vec![
            feature("done", Priority::Critical, true),
            feature("open", Priority::Low, false),
        ]);

        let selected = next_feature(&list).expect("open feature");
        assert_eq!(selected.id, "open");
    }

    #[test]
    fn next_feature_none_when_all_pass() {
        let list = feature_list(vec![feature("done", Priority::High, true)]);
        assert!(next_feature(&list).is_none());
        assert!(next_feature(&FeatureList::default()).is_none());
    }

    #[test]
    fn failing_by_priority_is_stable() {
        let list = feature_list(vec![
            feature("b-low", Priority::Low, false),
            feature("a-high", Priority::High, false),
            feature("done", Priority::Critical, true),
            feature("b-high", Priority::High, false),
        ]);

        let ids: Vec<&str> = failing_by_priority(&list)
            .iter()
            .map(|f| f.id.as_str())
            .collect();
        assert_eq!(ids, vec!["a-high", "b-high", "b-low"]);
    }
}
