//! Prompt rendering for one session.

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use serde::Serialize;

use crate::core::feature::{Feature, FeatureList};

const SESSION_TEMPLATE: &str = include_str!("prompts/session.md");

/// Selected-feature context for template rendering.
#[derive(Debug, Clone, Serialize)]
pub struct PromptInputs {
    pub id: String,
    pub category: String,
    pub description: String,
    pub priority: String,
    pub steps: Vec<String>,
    pub passing: usize,
    pub total: usize,
}

impl PromptInputs {
    pub fn new(list: &FeatureList, feature: &Feature) -> Self {
        let passing = list.features.iter().filter(|f| f.passes).count();
        Self {
            id: feature.id.clone(),
            category: feature.category.clone(),
            description: feature.description.clone(),
            priority: feature.priority.as_str().to_string(),
            steps: feature.steps.clone(),
            passing,
            total: list.features.len(),
        }
    }
}

/// Render the session prompt for one feature.
pub fn render_session_prompt(inputs: &PromptInputs) -> Result<String> {
    let mut env = Environment::new();
    env.add_template("session", SESSION_TEMPLATE)
        .context("session template should be valid")?;
    let template = env.get_template("session").context("get session template")?;
    let rendered = template
        .render(context! {
            id => inputs.id,
            category => inputs.category,
            description => inputs.description.trim(),
            priority => inputs.priority,
            steps => inputs.steps,
            passing => inputs.passing,
            total => inputs.total,
        })
        .context("render session prompt")?;
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::feature::Priority;
    use crate::test_support::{feature, feature_list};

    #[test]
    fn prompt_names_the_feature_and_steps() {
        let list = feature_list(vec![
            feature("done", Priority::High, true),
            feature("auth-login", Priority::Critical, false),
        ]);
        let selected = list.feature("auth-login").expect("feature");

        let prompt =
            render_session_prompt(&PromptInputs::new(&list, selected)).expect("render");

        assert!(prompt.contains("Feature: auth-login"));
        assert!(prompt.contains("Priority: critical"));
        assert!(prompt.contains("1. auth-login step"));
        assert!(prompt.contains("Progress so far: 1/2"));
    }

    #[test]
    fn prompt_omits_steps_section_when_empty() {
        let mut list = feature_list(vec![feature("a", Priority::Low, false)]);
        list.features[0].steps.clear();
        let selected = list.feature("a").expect("feature");

        let prompt =
            render_session_prompt(&PromptInputs::new(&list, selected)).expect("render");
        assert!(!prompt.contains("Verification steps:"));
    }
}
