//! Scoring result types.

use serde::{Deserialize, Serialize};

use crate::model::ScoringMode;

/// The pretrained-model part of a score.
///
/// Built only by [`crate::scoring::ModelScorer`]; the fields are read-only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBundle {
    bi_encoder: f64,
    cross_encoder: f64,
    contradiction: f64,
    nli_adjusted: f64,
    composite: f64,
    unpenalized_mark: f64,
    length_penalty_applied: bool,
    mark: f64,
}

impl ScoreBundle {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        bi_encoder: f64,
        cross_encoder: f64,
        contradiction: f64,
        nli_adjusted: f64,
        composite: f64,
        unpenalized_mark: f64,
        length_penalty_applied: bool,
        mark: f64,
    ) -> Self {
        Self {
            bi_encoder,
            cross_encoder,
            contradiction,
            nli_adjusted,
            composite,
            unpenalized_mark,
            length_penalty_applied,
            mark,
        }
    }

    /// Bi-encoder cosine similarity.
    pub fn bi_encoder(&self) -> f64 {
        self.bi_encoder
    }

    /// Cross-encoder STS score.
    pub fn cross_encoder(&self) -> f64 {
        self.cross_encoder
    }

    /// NLI contradiction probability.
    pub fn contradiction(&self) -> f64 {
        self.contradiction
    }

    /// `1 - contradiction`.
    pub fn nli_adjusted(&self) -> f64 {
        self.nli_adjusted
    }

    /// Weighted blend of the three signals.
    pub fn composite(&self) -> f64 {
        self.composite
    }

    /// Mark before the length penalty.
    pub fn unpenalized_mark(&self) -> f64 {
        self.unpenalized_mark
    }

    pub fn length_penalty_applied(&self) -> bool {
        self.length_penalty_applied
    }

    /// The model mark, 0 or 10–100.
    pub fn mark(&self) -> f64 {
        self.mark
    }
}

/// The generative-AI judgment of an answer pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Judgment {
    /// Similarity score, 0–100.
    pub score: f64,
    pub explanation: String,
    pub missing_concepts: String,
    /// Raw response text.
    pub full_response: String,
    /// Parse or upstream error, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Judgment {
    /// The zero-score judgment recorded when the judgment call fails.
    pub fn failed(error: impl std::fmt::Display) -> Self {
        let message = error.to_string();
        Self {
            score: 0.0,
            explanation: format!("Error: {message}"),
            missing_concepts: "Evaluation failed".into(),
            full_response: "Error occurred".into(),
            error: Some(message),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Model bundle, optional judgment and the final score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HybridScore {
    pub bundle: ScoreBundle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub judgment: Option<Judgment>,
    /// Mean of mark and judgment score (hybrid) or the mark alone.
    pub final_score: f64,
}

impl HybridScore {
    /// Combine a bundle with an optional judgment.
    pub fn combine(bundle: ScoreBundle, judgment: Option<Judgment>) -> Self {
        let final_score = match &judgment {
            Some(j) => (bundle.mark() + j.score) / 2.0,
            None => bundle.mark(),
        };
        Self {
            bundle,
            judgment,
            final_score,
        }
    }

    pub fn mode(&self) -> ScoringMode {
        if self.judgment.is_some() {
            ScoringMode::Hybrid
        } else {
            ScoringMode::Model
        }
    }

    pub fn grade(&self) -> GradeBand {
        GradeBand::from_score(self.final_score)
    }
}

/// Coarse grade band of a final score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradeBand {
    /// 80 and above.
    Strong,
    /// 50 to 80.
    Partial,
    /// Below 50.
    Weak,
}

impl GradeBand {
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            GradeBand::Strong
        } else if score >= 50.0 {
            GradeBand::Partial
        } else {
            GradeBand::Weak
        }
    }
}

impl std::fmt::Display for GradeBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GradeBand::Strong => write!(f, "strong"),
            GradeBand::Partial => write!(f, "partial"),
            GradeBand::Weak => write!(f, "weak"),
        }
    }
}

/// Outcome of grading one topic or question.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    Scored(HybridScore),
    /// No answer on the sheet for this question; final score 0.
    Unanswered,
}

/// Result for a single topic (or answer-key question).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicResult {
    /// Topic id or question number.
    pub id: String,
    /// Display name.
    pub name: String,
    pub reference: String,
    pub candidate: String,
    pub outcome: Outcome,
    /// Time spent scoring, in milliseconds.
    pub duration_ms: u64,
}

impl TopicResult {
    pub fn score(&self) -> Option<&HybridScore> {
        match &self.outcome {
            Outcome::Scored(score) => Some(score),
            Outcome::Unanswered => None,
        }
    }

    pub fn mark(&self) -> f64 {
        self.score().map_or(0.0, |s| s.bundle.mark())
    }

    pub fn judgment_score(&self) -> Option<f64> {
        self.score()
            .and_then(|s| s.judgment.as_ref())
            .map(|j| j.score)
    }

    pub fn final_score(&self) -> f64 {
        self.score().map_or(0.0, |s| s.final_score)
    }

    pub fn grade(&self) -> GradeBand {
        GradeBand::from_score(self.final_score())
    }
}

/// A topic that could not be scored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicFailure {
    pub id: String,
    pub error: String,
}


#[cfg(test)]
mod tests {
    use super::fixtures::bundle;
    use super::*;

    #[test]
    fn failed_judgment_fields() {
        let j = Judgment::failed("network error: refused");
        assert_eq!(j.score, 0.0);
        assert_eq!(j.explanation, "Error: network error: refused");
        assert_eq!(j.missing_concepts, "Evaluation failed");
        assert_eq!(j.full_response, "Error occurred");
        assert!(j.is_failed());
    }

    #[test]
    fn final_score_is_mean_in_hybrid() {
        let judgment = Judgment {
            score: 60.0,
            explanation: String::new(),
            missing_concepts: String::new(),
            full_response: String::new(),
            error: None,
        };
        let hybrid = HybridScore::combine(bundle(80.0), Some(judgment));
        assert_eq!(hybrid.final_score, 70.0);
        assert_eq!(hybrid.mode(), ScoringMode::Hybrid);

        let model_only = HybridScore::combine(bundle(80.0), None);
        assert_eq!(model_only.final_score, 80.0);
        assert_eq!(model_only.mode(), ScoringMode::Model);
    }

    #[test]
    fn grade_bands() {
        assert_eq!(GradeBand::from_score(80.0), GradeBand::Strong);
        assert_eq!(GradeBand::from_score(79.9), GradeBand::Partial);
        assert_eq!(GradeBand::from_score(50.0), GradeBand::Partial);
        assert_eq!(GradeBand::from_score(0.0), GradeBand::Weak);
    }

    #[test]
    fn unanswered_scores_zero() {
        let result = TopicResult {
            id: "13".into(),
            name: "Question 13".into(),
            reference: "reference".into(),
            candidate: String::new(),
            outcome: Outcome::Unanswered,
            duration_ms: 0,
        };
        assert_eq!(result.final_score(), 0.0);
        assert_eq!(result.judgment_score(), None);
        assert_eq!(result.grade(), GradeBand::Weak);
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let json = serde_json::to_value(Outcome::Unanswered).unwrap();
        assert_eq!(json["status"], "unanswered");
    }
}
