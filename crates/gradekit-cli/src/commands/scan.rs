//! The `gradekit scan` command.

use std::path::PathBuf;

use anyhow::Result;

use gradekit_core::engine::EvalEngine;
use gradekit_core::model::ScoringMode;
use gradekit_core::ocr::TextExtractor;
use gradekit_core::parser;
use gradekit_providers::load_config_from;

use super::{build_scorer, print_summary, ConsoleReporter};

pub async fn execute(
    images: Vec<PathBuf>,
    answer_key: Option<PathBuf>,
    mode: ScoringMode,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;

    // Text extraction always needs the hosted provider.
    let (provider, model) = config.resolve_provider()?;
    let extractor = TextExtractor::new(provider, model);

    let key = answer_key
        .as_deref()
        .map(parser::load_answer_key)
        .transpose()?;
    let engine = match &key {
        Some(_) => Some(EvalEngine::new(build_scorer(&config, mode)?)),
        None => None,
    };

    let mut read = 0;
    for image in &images {
        eprintln!("Scanning {}", image.display());
        let Some(sheet) = extractor.scan(image).await else {
            eprintln!("  Could not read text from {}", image.display());
            continue;
        };
        read += 1;
        tracing::debug!(
            image = %image.display(),
            answers = sheet.answers.len(),
            "answer sheet segregated"
        );

        println!("\n== {} ==", sheet.source.display());
        if sheet.answers.is_empty() {
            println!("No numbered answers found.");
        }
        for (number, answer) in sheet.answers.iter() {
            println!("{number}) {answer}");
        }

        if let (Some(key), Some(engine)) = (&key, &engine) {
            let report = engine
                .grade_sheet(key, &sheet.answers, &ConsoleReporter)
                .await;
            print_summary(&report);
        }
    }

    anyhow::ensure!(read > 0, "no answer sheet could be read");
    Ok(())
}
