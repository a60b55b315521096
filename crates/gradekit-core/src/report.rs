//! Grading report types with JSON persistence.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::ScoringMode;
use crate::results::{TopicFailure, TopicResult};
use crate::statistics::AggregateStats;

/// A complete grading run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradingReport {
    /// Unique run identifier.
    pub id: Uuid,
    /// When the report was created.
    pub created_at: DateTime<Utc>,
    /// The topic set or answer key that was graded.
    pub set: SetSummary,
    pub mode: ScoringMode,
    /// Similarity backend used for the model mark.
    pub backend: String,
    /// Judgment model, in hybrid mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub judge_model: Option<String>,
    /// Per-topic results in grading order.
    pub results: Vec<TopicResult>,
    /// Topics that could not be scored.
    #[serde(default)]
    pub failures: Vec<TopicFailure>,
    pub aggregate: AggregateStats,
    /// Total wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

/// Summary of a topic set or answer key (without its contents).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetSummary {
    pub id: String,
    pub name: String,
    pub topic_count: usize,
}

impl GradingReport {
    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: GradingReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }

    /// Result for a topic id or question number.
    pub fn result(&self, id: &str) -> Option<&TopicResult> {
        self.results.iter().find(|r| r.id == id)
    }
}
