//! The `gradekit evaluate` command.

use std::path::PathBuf;

use anyhow::Result;

use gradekit_core::engine::EvalEngine;
use gradekit_core::model::{ScoringMode, TopicSet};
use gradekit_core::parser::{self, SetFile};
use gradekit_providers::load_config_from;
use gradekit_report::write_html_report;

use super::{build_scorer, print_summary, ConsoleReporter};

pub async fn execute(
    topic_set_path: PathBuf,
    topic: Option<String>,
    mode: ScoringMode,
    output: Option<PathBuf>,
    format: String,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let formats: Vec<&str> = if format == "all" {
        vec!["json", "html"]
    } else {
        format.split(',').map(str::trim).collect()
    };
    for fmt in &formats {
        anyhow::ensure!(
            matches!(*fmt, "json" | "html"),
            "unknown format '{fmt}' (expected json, html or all)"
        );
    }

    let config = load_config_from(config_path.as_deref())?;
    let output = output.unwrap_or_else(|| config.output_dir.clone());

    let topic_sets: Vec<TopicSet> = if topic_set_path.is_dir() {
        parser::load_directory(&topic_set_path)?
            .into_iter()
            .filter_map(|file| match file {
                SetFile::Topics(set) => Some(set),
                SetFile::Key(_) => None,
            })
            .collect()
    } else {
        vec![parser::load_topic_set(&topic_set_path)?]
    };
    anyhow::ensure!(
        !topic_sets.is_empty(),
        "no topic sets found in {}",
        topic_set_path.display()
    );

    let engine = EvalEngine::new(build_scorer(&config, mode)?);
    let reporter = ConsoleReporter;

    for set in &topic_sets {
        eprintln!(
            "gradekit v{} - Grading {} topics from '{}' ({} mode, {} backend)",
            env!("CARGO_PKG_VERSION"),
            topic.as_ref().map_or(set.topics.len(), |_| 1),
            set.name,
            mode,
            engine.scorer().backend_name(),
        );
        eprintln!();

        let report = engine
            .run_topics(set, topic.as_deref(), &reporter)
            .await?;
        tracing::debug!(
            set = %set.id,
            graded = report.aggregate.count,
            "topic set graded"
        );

        print_summary(&report);

        std::fs::create_dir_all(&output)?;
        let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H%M%S");
        let stem = if topic_sets.len() > 1 {
            format!("report-{}-{timestamp}", set.id)
        } else {
            format!("report-{timestamp}")
        };

        for fmt in &formats {
            match *fmt {
                "json" => {
                    let path = output.join(format!("{stem}.json"));
                    report.save_json(&path)?;
                    eprintln!("Results saved to: {}", path.display());
                }
                _ => {
                    let path = output.join(format!("{stem}.html"));
                    write_html_report(&report, &path)?;
                    eprintln!("HTML report: {}", path.display());
                }
            }
        }
    }

    Ok(())
}
