//! The `gradekit score` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::Table;

use gradekit_core::model::ScoringMode;
use gradekit_providers::load_config_from;

use super::build_scorer;

pub async fn execute(
    reference: String,
    candidate: String,
    mode: ScoringMode,
    config_path: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    anyhow::ensure!(!reference.trim().is_empty(), "reference answer is empty");

    let config = load_config_from(config_path.as_deref())?;
    let scorer = build_scorer(&config, mode)?;
    let score = scorer.score(&reference, &candidate).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&score)?);
        return Ok(());
    }

    let bundle = &score.bundle;
    let mut table = Table::new();
    table.set_header(vec!["Signal", "Value"]);
    table.add_row(vec!["Bi-encoder similarity".to_string(), format!("{:.4}", bundle.bi_encoder())]);
    table.add_row(vec!["Cross-encoder similarity".to_string(), format!("{:.4}", bundle.cross_encoder())]);
    table.add_row(vec!["Contradiction probability".to_string(), format!("{:.4}", bundle.contradiction())]);
    table.add_row(vec!["Composite".to_string(), format!("{:.4}", bundle.composite())]);
    table.add_row(vec![
        "Model score".to_string(),
        if bundle.length_penalty_applied() {
            format!("{:.2} (length penalty, was {:.2})", bundle.mark(), bundle.unpenalized_mark())
        } else {
            format!("{:.2}", bundle.mark())
        },
    ]);
    if let Some(judgment) = &score.judgment {
        table.add_row(vec!["LLM score".to_string(), format!("{:.2}", judgment.score)]);
    }
    table.add_row(vec!["Final score".to_string(), format!("{:.2}", score.final_score)]);
    println!("{table}");

    if let Some(judgment) = &score.judgment {
        println!("\nExplanation: {}", judgment.explanation);
        println!("Missing concepts: {}", judgment.missing_concepts);
        if let Some(err) = &judgment.error {
            eprintln!("Warning: judgment incomplete: {err}");
        }
    }
    println!("Grade: {}", score.grade());

    Ok(())
}
