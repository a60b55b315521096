//! End-to-end pipeline tests with a mock provider and the lexical backend.
//!
//! These run image → text → segregation → normalization → hybrid scoring
//! without network access or model files.

use std::collections::HashMap;
use std::sync::Arc;

use gradekit_core::engine::{EvalEngine, HybridScorer, NoopReporter};
use gradekit_core::judge::Judge;
use gradekit_core::model::{AnswerKey, ModelPaths, Question, ScoringMode};
use gradekit_core::ocr::TextExtractor;
use gradekit_core::results::Outcome;
use gradekit_core::scoring::{ModelScorer, ScoringPolicy};
use gradekit_core::traits::LlmProvider;
use gradekit_models::load_backend;
use gradekit_providers::mock::MockProvider;

const SHEET_TEXT: &str = "Name: A. Student\n\
13) Clustering algorithms are used to group similar data points together.\n\
14 ) Regression predicts continuous values from the input variables.\n\
15() ";

fn answer_key() -> AnswerKey {
    let question = |number: &str, reference: &str| Question {
        number: number.into(),
        reference: reference.into(),
    };
    AnswerKey {
        id: "midterm".into(),
        name: "Midterm".into(),
        description: String::new(),
        questions: vec![
            question("13", "Clustering algorithms group similar data points together."),
            question("14", "Regression predicts continuous values based on input variables."),
            question("15", "Classification assigns inputs to categories."),
            question("16", "Support vector machines find a separating hyperplane."),
        ],
    }
}

fn stub_scorer() -> ModelScorer {
    let backend = load_backend(&ModelPaths {
        stub: true,
        ..ModelPaths::default()
    })
    .unwrap();
    ModelScorer::new(backend, ScoringPolicy::default())
}

fn sheet_image(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let path = dir.path().join("sheet.jpg");
    std::fs::write(&path, [0xFF, 0xD8, 0xFF, 0xE0]).unwrap();
    path
}

#[tokio::test]
async fn scan_and_grade_sheet_in_hybrid_mode() {
    let mut replies = HashMap::new();
    replies.insert("Extract the text".to_string(), SHEET_TEXT.to_string());
    replies.insert(
        "STUDENT ANSWER".to_string(),
        "SCORE: 80%\nEXPLANATION: Mostly right.\nMISSING CONCEPTS: None".to_string(),
    );
    let mock = Arc::new(MockProvider::new(replies));
    let provider: Arc<dyn LlmProvider> = mock.clone();

    let dir = tempfile::tempdir().unwrap();
    let extractor = TextExtractor::new(provider.clone(), "mock-model");
    let sheet = extractor.scan(&sheet_image(&dir)).await.unwrap();

    let numbers: Vec<&str> = sheet.answers.questions().collect();
    assert_eq!(numbers, ["13", "14", "15"]);
    assert_eq!(
        sheet.answers.get("13"),
        Some("clustering algorithm group similar data point")
    );
    assert_eq!(mock.last_request().unwrap().images.len(), 1);

    let engine = EvalEngine::new(HybridScorer::hybrid(
        stub_scorer(),
        Judge::new(provider, "mock-model"),
    ));
    let report = engine
        .grade_sheet(&answer_key(), &sheet.answers, &NoopReporter)
        .await;

    assert_eq!(report.mode, ScoringMode::Hybrid);
    assert_eq!(report.results.len(), 4);
    assert!(report.failures.is_empty());

    let q13 = report.result("13").unwrap();
    assert_eq!(q13.judgment_score(), Some(80.0));
    assert!((q13.final_score() - (q13.mark() + 80.0) / 2.0).abs() < 1e-9);

    // Question 15 has a marker but no text: still scored.
    let q15 = report.result("15").unwrap();
    assert!(matches!(q15.outcome, Outcome::Scored(_)));
    assert_eq!(q15.candidate, "");

    // Question 16 is missing from the sheet.
    let q16 = report.result("16").unwrap();
    assert!(matches!(q16.outcome, Outcome::Unanswered));
    assert_eq!(q16.final_score(), 0.0);

    // One OCR call and one judgment per question present on the sheet.
    assert_eq!(mock.call_count(), 4);
}

#[tokio::test]
async fn model_mode_final_score_is_the_mark() {
    let engine = EvalEngine::new(HybridScorer::model_only(stub_scorer()));

    let mut sheet = gradekit_core::model::AnswerSheet::new();
    sheet.insert("13", "clustering algorithm group similar data point together");
    sheet.insert("14", "regression predict continuous value");

    let report = engine
        .grade_sheet(&answer_key(), &sheet, &NoopReporter)
        .await;

    for result in &report.results {
        if let Some(score) = result.score() {
            assert!(score.judgment.is_none());
            assert_eq!(score.final_score, score.bundle.mark());
        }
    }
    assert_eq!(report.mode, ScoringMode::Model);
    assert!(report.judge_model.is_none());
}

#[tokio::test]
async fn judgment_failure_scores_zero_and_continues() {
    let provider: Arc<dyn LlmProvider> = Arc::new(MockProvider::failing("upstream unavailable"));
    let engine = EvalEngine::new(HybridScorer::hybrid(
        stub_scorer(),
        Judge::new(provider, "mock-model"),
    ));

    let mut sheet = gradekit_core::model::AnswerSheet::new();
    sheet.insert("13", "clustering group data");

    let report = engine
        .grade_sheet(&answer_key(), &sheet, &NoopReporter)
        .await;

    let q13 = report.result("13").unwrap();
    let judgment = q13.score().unwrap().judgment.as_ref().unwrap();
    assert_eq!(judgment.score, 0.0);
    assert!(judgment.explanation.starts_with("Error: "));
    assert_eq!(judgment.missing_concepts, "Evaluation failed");
    assert_eq!(report.aggregate.failed_judgments, 1);
}

#[tokio::test]
async fn unreadable_image_yields_nothing() {
    let provider: Arc<dyn LlmProvider> = Arc::new(MockProvider::with_fixed_response("13) a"));
    let extractor = TextExtractor::new(provider, "mock-model");

    let dir = tempfile::tempdir().unwrap();
    let gif = dir.path().join("sheet.gif");
    std::fs::write(&gif, b"GIF89a").unwrap();

    assert!(extractor.scan(&gif).await.is_none());
    assert!(extractor.scan(&dir.path().join("missing.png")).await.is_none());
}
