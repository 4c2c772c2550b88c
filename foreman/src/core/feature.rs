//! Shared types for the feature checklist.
//!
//! These types define the stable contract between selection, validation, and
//! storage. A [`Feature`] is immutable after creation except for its `passes`
//! flag; the store exposes no other mutation path.

use serde::{Deserialize, Serialize};

/// Scheduling priority. Lower rank is selected first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    /// Numeric selection rank: critical=0 .. low=3.
    pub fn rank(self) -> u8 {
        match self {
            Priority::Critical => 0,
            Priority::High => 1,
            Priority::Medium => 2,
            Priority::Low => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

/// One unit of work on the checklist.
///
/// Every field except `passes` is immutable for the lifetime of the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub id: String,
    pub category: String,
    pub description: String,
    pub priority: Priority,
    #[serde(default)]
    pub steps: Vec<String>,
    pub passes: bool,
}

/// Aggregate counts stored alongside the checklist.
///
/// Counts are advisory on read and recomputed from `features` on every save.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    pub project_name: Option<String>,
    pub total_features: usize,
    pub passing: usize,
    pub failing: usize,
    /// RFC 3339 timestamp of the last save.
    pub last_updated: Option<String>,
}

/// The checklist document.
///
/// `features` order is meaningful: selection breaks priority ties by original
/// position, so the vector must never be reordered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureList {
    pub features: Vec<Feature>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl FeatureList {
    /// Recompute `metadata` counts from `features`.
    ///
    /// Afterwards `passing + failing == features.len()` always holds.
    pub fn recompute_metadata(&mut self) {
        let passing = self.features.iter().filter(|f| f.passes).count();
        self.metadata.total_features = self.features.len();
        self.metadata.passing = passing;
        self.metadata.failing = self.features.len() - passing;
    }

    /// True when every feature passes. An empty checklist is complete.
    pub fn is_complete(&self) -> bool {
        self.features.iter().all(|f| f.passes)
    }

    pub fn feature(&self, id: &str) -> Option<&Feature> {
        self.features.iter().find(|f| f.id == id)
    }
}
