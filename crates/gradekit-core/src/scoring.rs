//! Composite similarity, mark rescaling and the length penalty.

use std::sync::Arc;

use anyhow::{bail, ensure, Result};
use serde::{Deserialize, Serialize};

use crate::results::ScoreBundle;
use crate::traits::SimilarityBackend;

pub const BI_ENCODER_WEIGHT: f64 = 0.3;
pub const CROSS_ENCODER_WEIGHT: f64 = 0.5;
pub const NLI_WEIGHT: f64 = 0.2;
/// Composites below this score a mark of 0.
pub const MARK_THRESHOLD: f64 = 0.6;
pub const MIN_MARK: f64 = 10.0;
pub const MAX_MARK: f64 = 100.0;
/// Candidates shorter than this fraction of the reference are penalized.
pub const LENGTH_RATIO: f64 = 0.8;
pub const LENGTH_PENALTY: f64 = 0.85;

/// Weights and thresholds of the model mark.
///
/// `Default` holds the standard policy; the `[scoring]` config table may
/// override individual fields.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringPolicy {
    pub bi_encoder_weight: f64,
    pub cross_encoder_weight: f64,
    pub nli_weight: f64,
    pub mark_threshold: f64,
    pub min_mark: f64,
    pub max_mark: f64,
    pub length_ratio: f64,
    pub length_penalty: f64,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            bi_encoder_weight: BI_ENCODER_WEIGHT,
            cross_encoder_weight: CROSS_ENCODER_WEIGHT,
            nli_weight: NLI_WEIGHT,
            mark_threshold: MARK_THRESHOLD,
            min_mark: MIN_MARK,
            max_mark: MAX_MARK,
            length_ratio: LENGTH_RATIO,
            length_penalty: LENGTH_PENALTY,
        }
    }
}

impl ScoringPolicy {
    /// Check that the policy describes a usable mark scale.
    pub fn validate(&self) -> Result<()> {
        let weights = [self.bi_encoder_weight, self.cross_encoder_weight, self.nli_weight];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            bail!("scoring weights must be non-negative");
        }
        let sum: f64 = weights.iter().sum();
        if (sum - 1.0).abs() > 1e-6 {
            bail!("scoring weights must sum to 1.0, got {sum}");
        }
        if !(0.0..1.0).contains(&self.mark_threshold) {
            bail!("mark threshold must be in [0, 1), got {}", self.mark_threshold);
        }
        if self.min_mark < 0.0 || self.min_mark > self.max_mark {
            bail!("mark range {}..{} is invalid", self.min_mark, self.max_mark);
        }
        if !(0.0..=1.0).contains(&self.length_ratio) || !(0.0..=1.0).contains(&self.length_penalty) {
            bail!("length ratio and penalty must be in [0, 1]");
        }
        Ok(())
    }

    /// Weighted blend of the three signals.
    pub fn composite(&self, bi_encoder: f64, cross_encoder: f64, nli_adjusted: f64) -> f64 {
        self.bi_encoder_weight * bi_encoder
            + self.cross_encoder_weight * cross_encoder
            + self.nli_weight * nli_adjusted
    }

    /// Map a composite onto 0 or `min_mark..=max_mark`. NaN maps to 0.
    pub fn rescale_mark(&self, composite: f64) -> f64 {
        if composite.is_nan() || composite < self.mark_threshold {
            return 0.0;
        }
        let composite = composite.min(1.0);
        let span = self.max_mark - self.min_mark;
        (composite - self.mark_threshold) / (1.0 - self.mark_threshold) * span + self.min_mark
    }

    /// Returns the (possibly penalized) mark and whether the penalty applied.
    pub fn apply_length_penalty(&self, mark: f64, reference: &str, candidate: &str) -> (f64, bool) {
        let reference_tokens = token_count(reference) as f64;
        let candidate_tokens = token_count(candidate) as f64;
        if candidate_tokens < self.length_ratio * reference_tokens {
            (mark * self.length_penalty, true)
        } else {
            (mark, false)
        }
    }
}

/// Whitespace token count.
pub fn token_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Computes the model part of a score from a similarity backend.
#[derive(Clone)]
pub struct ModelScorer {
    backend: Arc<dyn SimilarityBackend>,
    policy: ScoringPolicy,
}

impl ModelScorer {
    pub fn new(backend: Arc<dyn SimilarityBackend>, policy: ScoringPolicy) -> Self {
        Self { backend, policy }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Score one answer pair. Backend inference errors are returned as-is.
    pub fn score(&self, reference: &str, candidate: &str) -> Result<ScoreBundle> {
        let bi_encoder = self.backend.bi_encoder_similarity(reference, candidate)?;
        let cross_encoder = self.backend.cross_encoder_similarity(reference, candidate)?;
        let contradiction = self.backend.contradiction_probability(reference, candidate)?;
        ensure!(
            bi_encoder.is_finite() && cross_encoder.is_finite() && contradiction.is_finite(),
            "{} backend produced a non-finite signal \
             (bi-encoder {bi_encoder}, cross-encoder {cross_encoder}, contradiction {contradiction})",
            self.backend.name()
        );
        let nli_adjusted = 1.0 - contradiction;

        let composite = self.policy.composite(bi_encoder, cross_encoder, nli_adjusted);
        let unpenalized = self.policy.rescale_mark(composite);
        let (mark, penalized) = self.policy.apply_length_penalty(unpenalized, reference, candidate);

        tracing::debug!(
            bi_encoder,
            cross_encoder,
            contradiction,
            composite,
            mark,
            "scored answer pair"
        );

        Ok(ScoreBundle::new(
            bi_encoder,
            cross_encoder,
            contradiction,
            nli_adjusted,
            composite,
            unpenalized,
            penalized,
            mark,
        ))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Backend returning fixed signals.
    pub struct FixedBackend {
        pub bi: f64,
        pub cross: f64,
        pub contradiction: f64,
    }

    impl SimilarityBackend for FixedBackend {
        fn name(&self) -> &str {
            "fixed"
        }
        fn bi_encoder_similarity(&self, _: &str, _: &str) -> Result<f64> {
            Ok(self.bi)
        }
        fn cross_encoder_similarity(&self, _: &str, _: &str) -> Result<f64> {
            Ok(self.cross)
        }
        fn contradiction_probability(&self, _: &str, _: &str) -> Result<f64> {
            Ok(self.contradiction)
        }
    }

    /// Backend whose inference always fails.
    pub struct BrokenBackend;

    impl SimilarityBackend for BrokenBackend {
        fn name(&self) -> &str {
            "broken"
        }
        fn bi_encoder_similarity(&self, _: &str, _: &str) -> Result<f64> {
            anyhow::bail!("tensor shape mismatch")
        }
        fn cross_encoder_similarity(&self, _: &str, _: &str) -> Result<f64> {
            anyhow::bail!("tensor shape mismatch")
        }
        fn contradiction_probability(&self, _: &str, _: &str) -> Result<f64> {
            anyhow::bail!("tensor shape mismatch")
        }
    }

    pub fn fixed(bi: f64, cross: f64, contradiction: f64) -> Arc<dyn SimilarityBackend> {
        Arc::new(FixedBackend {
            bi,
            cross,
            contradiction,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn default_policy_is_valid() {
        ScoringPolicy::default().validate().unwrap();
    }

    #[test]
    fn invalid_policies_are_rejected() {
        let policy = ScoringPolicy {
            nli_weight: 0.5,
            ..Default::default()
        };
        assert!(policy.validate().is_err());

        let policy = ScoringPolicy {
            mark_threshold: 1.0,
            ..Default::default()
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn composite_weights() {
        let policy = ScoringPolicy::default();
        assert!((policy.composite(1.0, 1.0, 1.0) - 1.0).abs() < EPS);
        assert!((policy.composite(1.0, 0.0, 0.0) - 0.3).abs() < EPS);
        assert!((policy.composite(0.0, 1.0, 0.0) - 0.5).abs() < EPS);
        assert!((policy.composite(0.0, 0.0, 1.0) - 0.2).abs() < EPS);
    }

    #[test]
    fn rescale_boundaries() {
        let policy = ScoringPolicy::default();
        assert_eq!(policy.rescale_mark(0.0), 0.0);
        assert_eq!(policy.rescale_mark(0.5999), 0.0);
        assert!((policy.rescale_mark(0.6) - 10.0).abs() < EPS);
        assert!((policy.rescale_mark(0.8) - 55.0).abs() < EPS);
        assert!((policy.rescale_mark(1.0) - 100.0).abs() < EPS);
        assert!((policy.rescale_mark(1.2) - 100.0).abs() < EPS);
        assert_eq!(policy.rescale_mark(f64::NAN), 0.0);
    }

    #[test]
    fn rescale_is_monotonic() {
        let policy = ScoringPolicy::default();
        let mut last = 0.0;
        for i in 0..=100 {
            let mark = policy.rescale_mark(i as f64 / 100.0);
            assert!(mark >= last, "mark dropped at composite {i}/100");
            assert!(mark == 0.0 || (10.0..=100.0).contains(&mark));
            last = mark;
        }
    }

    #[test]
    fn length_penalty_applies_to_short_candidates() {
        let policy = ScoringPolicy::default();
        let reference = "one two three four five six seven eight nine ten";
        let (mark, applied) = policy.apply_length_penalty(100.0, reference, "one two three");
        assert!(applied);
        assert!((mark - 85.0).abs() < EPS);

        let (mark, applied) =
            policy.apply_length_penalty(100.0, reference, "one two three four five six seven eight nine");
        assert!(!applied);
        assert_eq!(mark, 100.0);
    }

    #[test]
    fn scorer_identical_signals_score_full_mark() {
        let scorer = ModelScorer::new(fixed(1.0, 1.0, 0.0), ScoringPolicy::default());
        let bundle = scorer.score("same text here", "same text here").unwrap();
        assert!((bundle.composite() - 1.0).abs() < EPS);
        assert!((bundle.mark() - 100.0).abs() < EPS);
        assert!(!bundle.length_penalty_applied());
    }

    #[test]
    fn scorer_penalizes_and_keeps_unpenalized_mark() {
        let scorer = ModelScorer::new(fixed(1.0, 1.0, 0.0), ScoringPolicy::default());
        let bundle = scorer
            .score("a long reference answer with many words", "short")
            .unwrap();
        assert!(bundle.length_penalty_applied());
        assert!((bundle.unpenalized_mark() - 100.0).abs() < EPS);
        assert!((bundle.mark() - 85.0).abs() < EPS);
    }

    #[test]
    fn scorer_contradiction_lowers_composite() {
        let scorer = ModelScorer::new(fixed(0.7, 0.7, 1.0), ScoringPolicy::default());
        let bundle = scorer.score("x y", "x y").unwrap();
        assert!((bundle.nli_adjusted()).abs() < EPS);
        assert!((bundle.composite() - 0.56).abs() < EPS);
        assert_eq!(bundle.mark(), 0.0);
    }

    #[test]
    fn scorer_rejects_non_finite_signals() {
        let scorer = ModelScorer::new(fixed(f64::NAN, 0.9, 0.1), ScoringPolicy::default());
        let err = scorer.score("a b c", "a b c").unwrap_err();
        assert!(err.to_string().contains("non-finite"));

        let scorer = ModelScorer::new(fixed(0.9, 0.9, f64::INFINITY), ScoringPolicy::default());
        assert!(scorer.score("a b c", "a b c").is_err());
    }

    #[test]
    fn scorer_propagates_backend_errors() {
        let scorer = ModelScorer::new(Arc::new(BrokenBackend), ScoringPolicy::default());
        let err = scorer.score("a", "b").unwrap_err();
        assert!(err.to_string().contains("tensor"));
    }
}
