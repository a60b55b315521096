//! Aggregate statistics across graded topics.

use serde::{Deserialize, Serialize};

use crate::results::{GradeBand, TopicResult};

/// Aggregate statistics across all results of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateStats {
    /// Number of results (unanswered questions included).
    pub count: usize,
    /// Questions with no answer on the sheet.
    pub unanswered: usize,
    /// Mean model mark.
    pub mean_mark: f64,
    /// Mean judgment score, over results that have one.
    pub mean_judgment: Option<f64>,
    /// Mean final score.
    pub mean_final: f64,
    /// How many results length-penalized.
    pub length_penalized: usize,
    /// Judgments that failed or could not be parsed.
    pub failed_judgments: usize,
    pub bands: BandCounts,
}

/// Results per grade band.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandCounts {
    pub strong: usize,
    pub partial: usize,
    pub weak: usize,
}

impl AggregateStats {
    pub fn compute(results: &[TopicResult]) -> Self {
        if results.is_empty() {
            return Self::default();
        }

        let count = results.len();
        let mut stats = Self {
            count,
            ..Default::default()
        };
        let mut mark_sum = 0.0;
        let mut final_sum = 0.0;
        let mut judgment_scores = Vec::new();

        for r in results {
            mark_sum += r.mark();
            final_sum += r.final_score();
            match r.score() {
                Some(score) => {
                    if score.bundle.length_penalty_applied() {
                        stats.length_penalized += 1;
                    }
                    if let Some(j) = &score.judgment {
                        judgment_scores.push(j.score);
                        if j.error.is_some() {
                            stats.failed_judgments += 1;
                        }
                    }
                }
                None => stats.unanswered += 1,
            }
            match r.grade() {
                GradeBand::Strong => stats.bands.strong += 1,
                GradeBand::Partial => stats.bands.partial += 1,
                GradeBand::Weak => stats.bands.weak += 1,
            }
        }

        stats.mean_mark = mark_sum / count as f64;
        stats.mean_final = final_sum / count as f64;
        if !judgment_scores.is_empty() {
            stats.mean_judgment =
                Some(judgment_scores.iter().sum::<f64>() / judgment_scores.len() as f64);
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::fixtures::bundle;
    use crate::results::{HybridScore, Judgment, Outcome};

    fn scored(id: &str, mark: f64, judgment: Option<f64>) -> TopicResult {
        let judgment = judgment.map(|score| Judgment {
            score,
            explanation: String::new(),
            missing_concepts: String::new(),
            full_response: String::new(),
            error: None,
        });
        TopicResult {
            id: id.into(),
            name: id.into(),
            reference: String::new(),
            candidate: String::new(),
            outcome: Outcome::Scored(HybridScore::combine(bundle(mark), judgment)),
            duration_ms: 0,
        }
    }

    #[test]
    fn empty_results() {
        let stats = AggregateStats::compute(&[]);
        assert_eq!(stats.count, 0);
        assert_eq!(stats.mean_final, 0.0);
        assert!(stats.mean_judgment.is_none());
    }

    #[test]
    fn means_and_bands() {
        let results = vec![
            scored("a", 100.0, Some(80.0)),
            scored("b", 40.0, Some(60.0)),
            scored("c", 0.0, Some(0.0)),
        ];
        let stats = AggregateStats::compute(&results);
        assert_eq!(stats.count, 3);
        assert!((stats.mean_mark - 140.0 / 3.0).abs() < 1e-9);
        assert!((stats.mean_judgment.unwrap() - 140.0 / 3.0).abs() < 1e-9);
        assert!((stats.mean_final - 140.0 / 3.0).abs() < 1e-9);
        assert_eq!(
            stats.bands,
            BandCounts {
                strong: 1,
                partial: 1,
                weak: 1
            }
        );
    }

    #[test]
    fn unanswered_counts_as_zero() {
        let mut results = vec![scored("a", 90.0, None)];
        results.push(TopicResult {
            outcome: Outcome::Unanswered,
            ..scored("b", 0.0, None)
        });
        let stats = AggregateStats::compute(&results);
        assert_eq!(stats.unanswered, 1);
        assert_eq!(stats.mean_final, 45.0);
        assert!(stats.mean_judgment.is_none());
    }
}
