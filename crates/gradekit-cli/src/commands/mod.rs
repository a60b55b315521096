//! Subcommand implementations and the pieces they share.

pub mod evaluate;
pub mod init;
pub mod list_models;
pub mod scan;
pub mod score;
pub mod validate;

use std::time::Duration;

use anyhow::{Context, Result};
use comfy_table::{Cell, Color, Table};

use gradekit_core::engine::{HybridScorer, ProgressReporter};
use gradekit_core::judge::Judge;
use gradekit_core::model::ScoringMode;
use gradekit_core::report::GradingReport;
use gradekit_core::results::{GradeBand, TopicResult};
use gradekit_core::scoring::ModelScorer;
use gradekit_providers::GradekitConfig;

/// Build the scorer for `mode`. The judgment provider is resolved before the
/// models load so a missing key fails fast.
pub(crate) fn build_scorer(config: &GradekitConfig, mode: ScoringMode) -> Result<HybridScorer> {
    let judge = match mode {
        ScoringMode::Hybrid => {
            let (provider, model) = config.resolve_provider()?;
            Some(Judge::new(provider, model).with_temperature(config.temperature))
        }
        ScoringMode::Model => None,
    };

    let backend = gradekit_models::load_backend(&config.models)
        .context("failed to load similarity models")?;
    let scorer = ModelScorer::new(backend, config.scoring);

    Ok(match judge {
        Some(judge) => HybridScorer::hybrid(scorer, judge),
        None => HybridScorer::model_only(scorer),
    })
}

/// Console progress reporter.
pub(crate) struct ConsoleReporter;

impl ProgressReporter for ConsoleReporter {
    fn on_topic_start(&self, id: &str, index: usize, total: usize) {
        eprintln!("  [{}/{total}] Scoring: {id}", index + 1);
    }

    fn on_topic_complete(&self, result: &TopicResult) {
        match result.judgment_score() {
            Some(judgment) => eprintln!(
                "  Done: {} model {:.1} llm {:.1} final {:.1} ({}ms)",
                result.id,
                result.mark(),
                judgment,
                result.final_score(),
                result.duration_ms,
            ),
            None if result.score().is_none() => eprintln!("  Done: {} unanswered", result.id),
            None => eprintln!(
                "  Done: {} model {:.1} ({}ms)",
                result.id,
                result.mark(),
                result.duration_ms,
            ),
        }
    }

    fn on_topic_error(&self, id: &str, error: &str) {
        eprintln!("  ERROR: {id}: {error}");
    }

    fn on_set_complete(&self, total: usize, completed: usize, failed: usize, elapsed: Duration) {
        eprintln!(
            "\nComplete: {completed}/{total} scored, {failed} failed ({:.1}s)",
            elapsed.as_secs_f64()
        );
    }
}

fn band_color(band: GradeBand) -> Color {
    match band {
        GradeBand::Strong => Color::Green,
        GradeBand::Partial => Color::Yellow,
        GradeBand::Weak => Color::Red,
    }
}

fn fmt_opt(value: Option<f64>) -> String {
    value
        .map(|v| format!("{v:.1}"))
        .unwrap_or_else(|| "-".to_string())
}

/// Print the per-topic table and aggregate line of a report.
pub(crate) fn print_summary(report: &GradingReport) {
    let mut table = Table::new();
    table.set_header(vec!["Topic", "Model", "LLM", "Final", "Grade"]);

    for r in &report.results {
        let model = match r.score() {
            Some(s) if s.bundle.length_penalty_applied() => format!("{:.1}*", s.bundle.mark()),
            Some(s) => format!("{:.1}", s.bundle.mark()),
            None => "-".to_string(),
        };
        table.add_row(vec![
            Cell::new(&r.name),
            Cell::new(model),
            Cell::new(fmt_opt(r.judgment_score())),
            Cell::new(format!("{:.1}", r.final_score())),
            Cell::new(r.grade().to_string()).fg(band_color(r.grade())),
        ]);
    }

    println!("\n{table}");

    let agg = &report.aggregate;
    println!(
        "Mean model {:.1} | mean LLM {} | mean final {:.1} | strong {} / partial {} / weak {}",
        agg.mean_mark,
        fmt_opt(agg.mean_judgment),
        agg.mean_final,
        agg.bands.strong,
        agg.bands.partial,
        agg.bands.weak,
    );
    if agg.length_penalized > 0 {
        println!("* length penalty applied ({} answers)", agg.length_penalized);
    }
    if agg.failed_judgments > 0 {
        println!("{} judgment call(s) failed and scored 0", agg.failed_judgments);
    }
    for failure in &report.failures {
        println!("FAILED {}: {}", failure.id, failure.error);
    }
}
