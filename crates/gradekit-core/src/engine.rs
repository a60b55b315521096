//! Hybrid scorer and batch grading engine.
//!
//! Topics are graded one at a time, in the order supplied. A topic whose
//! model inference fails is reported and counted; the batch carries on.

use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use uuid::Uuid;

use crate::judge::Judge;
use crate::model::{AnswerKey, AnswerSheet, ScoringMode, TopicSet};
use crate::normalize::normalize;
use crate::report::{GradingReport, SetSummary};
use crate::results::{HybridScore, Outcome, TopicFailure, TopicResult};
use crate::scoring::ModelScorer;
use crate::statistics::AggregateStats;

/// Model mark, plus the judgment when a judge is configured.
#[derive(Clone)]
pub struct HybridScorer {
    scorer: ModelScorer,
    judge: Option<Judge>,
}

impl HybridScorer {
    /// Model-only scoring.
    pub fn model_only(scorer: ModelScorer) -> Self {
        Self {
            scorer,
            judge: None,
        }
    }

    /// Mark and judgment averaged.
    pub fn hybrid(scorer: ModelScorer, judge: Judge) -> Self {
        Self {
            scorer,
            judge: Some(judge),
        }
    }

    pub fn mode(&self) -> ScoringMode {
        if self.judge.is_some() {
            ScoringMode::Hybrid
        } else {
            ScoringMode::Model
        }
    }

    pub fn backend_name(&self) -> &str {
        self.scorer.backend_name()
    }

    pub fn judge_model(&self) -> Option<&str> {
        self.judge.as_ref().map(Judge::model)
    }

    /// Score one pair. Only model inference errors are returned.
    pub async fn score(&self, reference: &str, candidate: &str) -> Result<HybridScore> {
        let bundle = self.scorer.score(reference, candidate)?;
        let judgment = match &self.judge {
            Some(judge) => Some(judge.evaluate(reference, candidate).await),
            None => None,
        };
        Ok(HybridScore::combine(bundle, judgment))
    }
}

/// Progress reporting trait.
pub trait ProgressReporter: Send + Sync {
    fn on_topic_start(&self, id: &str, index: usize, total: usize);
    fn on_topic_complete(&self, result: &TopicResult);
    fn on_topic_error(&self, id: &str, error: &str);
    fn on_set_complete(&self, total: usize, completed: usize, failed: usize, elapsed: Duration);
}

/// No-op progress reporter.
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn on_topic_start(&self, _: &str, _: usize, _: usize) {}
    fn on_topic_complete(&self, _: &TopicResult) {}
    fn on_topic_error(&self, _: &str, _: &str) {}
    fn on_set_complete(&self, _: usize, _: usize, _: usize, _: Duration) {}
}

/// One pair queued for grading.
struct Job {
    id: String,
    name: String,
    reference: String,
    candidate: Option<String>,
}

/// The batch grading engine.
pub struct EvalEngine {
    scorer: HybridScorer,
}

impl EvalEngine {
    pub fn new(scorer: HybridScorer) -> Self {
        Self { scorer }
    }

    pub fn scorer(&self) -> &HybridScorer {
        &self.scorer
    }

    /// Grade every topic of a set, or only `filter` when given.
    pub async fn run_topics(
        &self,
        set: &TopicSet,
        filter: Option<&str>,
        progress: &dyn ProgressReporter,
    ) -> Result<GradingReport> {
        let jobs: Vec<Job> = set
            .topics
            .iter()
            .filter(|t| filter.is_none_or(|id| t.id == id))
            .map(|t| Job {
                id: t.id.clone(),
                name: t.display_name(),
                reference: t.reference.clone(),
                candidate: Some(t.candidate.clone()),
            })
            .collect();

        if let Some(id) = filter {
            if jobs.is_empty() {
                bail!("topic '{id}' not found in set '{}'", set.id);
            }
        }

        let summary = SetSummary {
            id: set.id.clone(),
            name: set.name.clone(),
            topic_count: set.topics.len(),
        };
        Ok(self.run(summary, jobs, progress).await)
    }

    /// Grade a normalized answer sheet against an answer key.
    ///
    /// References are normalized the same way as the sheet. Questions missing
    /// from the sheet score 0 without any model call; an answer that normalized
    /// to an empty string is still scored.
    pub async fn grade_sheet(
        &self,
        key: &AnswerKey,
        sheet: &AnswerSheet,
        progress: &dyn ProgressReporter,
    ) -> GradingReport {
        let jobs = key
            .questions
            .iter()
            .map(|q| Job {
                id: q.number.clone(),
                name: format!("Question {}", q.number),
                reference: normalize(&q.reference),
                candidate: sheet.get(&q.number).map(str::to_string),
            })
            .collect();

        let summary = SetSummary {
            id: key.id.clone(),
            name: key.name.clone(),
            topic_count: key.questions.len(),
        };
        self.run(summary, jobs, progress).await
    }

    async fn run(
        &self,
        set: SetSummary,
        jobs: Vec<Job>,
        progress: &dyn ProgressReporter,
    ) -> GradingReport {
        let start = Instant::now();
        let total = jobs.len();
        let mut results = Vec::with_capacity(total);
        let mut failures = Vec::new();

        tracing::info!(set = %set.id, topics = total, mode = %self.scorer.mode(), "grading started");

        for (index, job) in jobs.into_iter().enumerate() {
            progress.on_topic_start(&job.id, index, total);
            let topic_start = Instant::now();

            let outcome = match &job.candidate {
                Some(candidate) => self
                    .scorer
                    .score(&job.reference, candidate)
                    .await
                    .map(Outcome::Scored),
                None => Ok(Outcome::Unanswered),
            };

            match outcome {
                Ok(outcome) => {
                    let result = TopicResult {
                        id: job.id,
                        name: job.name,
                        reference: job.reference,
                        candidate: job.candidate.unwrap_or_default(),
                        outcome,
                        duration_ms: topic_start.elapsed().as_millis() as u64,
                    };
                    progress.on_topic_complete(&result);
                    results.push(result);
                }
                Err(e) => {
                    tracing::error!("grading failed for {}: {e:#}", job.id);
                    progress.on_topic_error(&job.id, &format!("{e:#}"));
                    failures.push(TopicFailure {
                        id: job.id,
                        error: format!("{e:#}"),
                    });
                }
            }
        }

        let elapsed = start.elapsed();
        progress.on_set_complete(total, results.len(), failures.len(), elapsed);

        GradingReport {
            id: Uuid::new_v4(),
            created_at: chrono::Utc::now(),
            set,
            mode: self.scorer.mode(),
            backend: self.scorer.backend_name().to_string(),
            judge_model: self.scorer.judge_model().map(str::to_string),
            aggregate: AggregateStats::compute(&results),
            results,
            failures,
            duration_ms: elapsed.as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::Mutex;

    use super::*;
    use crate::judge::testing::ScriptedProvider;
    use crate::model::{Question, Topic};
    use crate::scoring::testing::{fixed, BrokenBackend};
    use crate::scoring::ScoringPolicy;
    use crate::traits::SimilarityBackend;

    fn scorer(backend: Arc<dyn SimilarityBackend>) -> ModelScorer {
        ModelScorer::new(backend, ScoringPolicy::default())
    }

    fn topic(id: &str, reference: &str, candidate: &str) -> Topic {
        Topic {
            id: id.into(),
            name: None,
            reference: reference.into(),
            candidate: candidate.into(),
        }
    }

    fn topic_set() -> TopicSet {
        TopicSet {
            id: "ml".into(),
            name: "Machine learning".into(),
            description: String::new(),
            topics: vec![
                topic("clustering", "group similar data point", "group similar data point"),
                topic("regression", "predict continuous value", "predict continuous value"),
            ],
        }
    }

    #[derive(Default)]
    struct RecordingReporter {
        events: Mutex<Vec<String>>,
    }

    impl ProgressReporter for RecordingReporter {
        fn on_topic_start(&self, id: &str, _: usize, _: usize) {
            self.events.lock().unwrap().push(format!("start:{id}"));
        }
        fn on_topic_complete(&self, result: &TopicResult) {
            self.events.lock().unwrap().push(format!("done:{}", result.id));
        }
        fn on_topic_error(&self, id: &str, _: &str) {
            self.events.lock().unwrap().push(format!("error:{id}"));
        }
        fn on_set_complete(&self, total: usize, completed: usize, failed: usize, _: Duration) {
            self.events
                .lock()
                .unwrap()
                .push(format!("set:{total}/{completed}/{failed}"));
        }
    }

    #[tokio::test]
    async fn model_only_final_equals_mark() {
        let engine = EvalEngine::new(HybridScorer::model_only(scorer(fixed(1.0, 1.0, 0.0))));
        let report = engine
            .run_topics(&topic_set(), None, &NoopReporter)
            .await
            .unwrap();

        assert_eq!(report.mode, ScoringMode::Model);
        assert_eq!(report.results.len(), 2);
        for r in &report.results {
            assert_eq!(r.final_score(), r.mark());
            assert!(r.judgment_score().is_none());
        }
    }

    #[tokio::test]
    async fn hybrid_averages_mark_and_judgment() {
        let provider = ScriptedProvider::replying("SCORE: 50\nEXPLANATION: half\nMISSING CONCEPTS: None");
        let judge = Judge::new(provider.clone(), "judge-model");
        let engine = EvalEngine::new(HybridScorer::hybrid(scorer(fixed(1.0, 1.0, 0.0)), judge));

        let report = engine
            .run_topics(&topic_set(), Some("clustering"), &NoopReporter)
            .await
            .unwrap();

        assert_eq!(report.results.len(), 1);
        let r = &report.results[0];
        assert!((r.final_score() - (r.mark() + 50.0) / 2.0).abs() < 1e-9);
        assert_eq!(report.judge_model.as_deref(), Some("judge-model"));
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn judgment_failure_scores_zero_but_completes() {
        let judge = Judge::new(ScriptedProvider::failing(), "judge-model");
        let engine = EvalEngine::new(HybridScorer::hybrid(scorer(fixed(1.0, 1.0, 0.0)), judge));
        let report = engine
            .run_topics(&topic_set(), None, &NoopReporter)
            .await
            .unwrap();

        assert!(report.failures.is_empty());
        assert_eq!(report.aggregate.failed_judgments, 2);
        assert_eq!(report.aggregate.mean_judgment, Some(0.0));
    }

    #[tokio::test]
    async fn inference_failures_are_counted_not_fatal() {
        let engine = EvalEngine::new(HybridScorer::model_only(scorer(Arc::new(BrokenBackend))));
        let reporter = RecordingReporter::default();
        let report = engine.run_topics(&topic_set(), None, &reporter).await.unwrap();

        assert!(report.results.is_empty());
        assert_eq!(report.failures.len(), 2);
        let events = reporter.events.lock().unwrap();
        assert_eq!(events.last().unwrap(), "set:2/0/2");
        assert!(events.contains(&"error:regression".to_string()));
    }

    #[tokio::test]
    async fn unknown_topic_filter_is_an_error() {
        let engine = EvalEngine::new(HybridScorer::model_only(scorer(fixed(1.0, 1.0, 0.0))));
        let err = engine
            .run_topics(&topic_set(), Some("pca"), &NoopReporter)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("pca"));
    }

    #[tokio::test]
    async fn sheet_grading_marks_unanswered_without_calls() {
        let provider = ScriptedProvider::replying("SCORE: 80");
        let judge = Judge::new(provider.clone(), "judge-model");
        let engine = EvalEngine::new(HybridScorer::hybrid(scorer(fixed(1.0, 1.0, 0.0)), judge));

        let key = AnswerKey {
            id: "midterm".into(),
            name: "Midterm".into(),
            description: String::new(),
            questions: vec![
                Question {
                    number: "13".into(),
                    reference: "Clustering groups similar data points.".into(),
                },
                Question {
                    number: "14".into(),
                    reference: "Regression predicts continuous values.".into(),
                },
            ],
        };
        let sheet: AnswerSheet = [("13", "clustering group similar data point")]
            .into_iter()
            .collect();

        let report = engine.grade_sheet(&key, &sheet, &NoopReporter).await;

        assert_eq!(report.results.len(), 2);
        let answered = report.result("13").unwrap();
        assert_eq!(answered.reference, "clustering group similar data point");
        assert!(answered.final_score() > 0.0);

        let unanswered = report.result("14").unwrap();
        assert!(matches!(unanswered.outcome, Outcome::Unanswered));
        assert_eq!(unanswered.final_score(), 0.0);
        assert_eq!(provider.call_count(), 1);
        assert_eq!(report.aggregate.unanswered, 1);
    }

    #[tokio::test]
    async fn stopword_only_answer_is_scored_not_unanswered() {
        let engine = EvalEngine::new(HybridScorer::model_only(scorer(fixed(0.2, 0.1, 0.9))));
        let key = AnswerKey {
            id: "quiz".into(),
            name: "Quiz".into(),
            description: String::new(),
            questions: vec![
                Question {
                    number: "1".into(),
                    reference: "Photosynthesis makes sugar from light.".into(),
                },
                Question {
                    number: "2".into(),
                    reference: "Mitochondria produce energy.".into(),
                },
            ],
        };
        let sheet: AnswerSheet = [("1", "")].into_iter().collect();

        let report = engine.grade_sheet(&key, &sheet, &NoopReporter).await;

        let blank = report.result("1").unwrap();
        assert!(matches!(blank.outcome, Outcome::Scored(_)));
        assert_eq!(blank.candidate, "");
        assert_eq!(blank.final_score(), 0.0);

        let missing = report.result("2").unwrap();
        assert!(matches!(missing.outcome, Outcome::Unanswered));
        assert_eq!(report.aggregate.unanswered, 1);
    }
}
