//! HTML report generator.
//!
//! Produces a self-contained HTML file with all CSS/JS inlined.

use anyhow::Result;
use std::path::Path;

use gradekit_core::report::GradingReport;
use gradekit_core::results::{GradeBand, TopicResult};

/// Escape a string for safe HTML insertion.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

fn band_class(band: GradeBand) -> &'static str {
    match band {
        GradeBand::Strong => "strong",
        GradeBand::Partial => "partial",
        GradeBand::Weak => "weak",
    }
}

/// Generate an HTML report from a grading report.
pub fn generate_html(report: &GradingReport) -> String {
    let mut html = String::new();

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str(&format!(
        "<title>gradekit report: {}</title>\n",
        html_escape(&report.set.name)
    ));
    html.push_str("<style>\n");
    html.push_str(CSS);
    html.push_str("</style>\n");
    html.push_str("</head>\n<body>\n");

    // Header
    html.push_str("<header>\n");
    html.push_str("<h1>gradekit report</h1>\n");
    let judge = report
        .judge_model
        .as_deref()
        .map(|m| format!(" | judge: {}", html_escape(m)))
        .unwrap_or_default();
    html.push_str(&format!(
        "<p class=\"meta\">Set: <strong>{}</strong> | {} topics | mode: {} | backend: {}{} | {}</p>\n",
        html_escape(&report.set.name),
        report.set.topic_count,
        report.mode,
        html_escape(&report.backend),
        judge,
        report.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    html.push_str("</header>\n");

    // Summary dashboard
    let agg = &report.aggregate;
    html.push_str("<section class=\"dashboard\">\n");
    html.push_str("<h2>Summary</h2>\n");
    html.push_str("<table class=\"summary\">\n");
    html.push_str("<thead><tr><th>Graded</th><th>Unanswered</th><th>Failed</th><th>Mean mark</th><th>Mean LLM score</th><th>Mean final</th><th>Strong / Partial / Weak</th></tr></thead>\n");
    html.push_str("<tbody>\n");
    html.push_str(&format!(
        "<tr><td>{}</td><td>{}</td><td>{}</td><td>{:.1}</td><td>{}</td><td>{:.1}</td><td>{} / {} / {}</td></tr>\n",
        agg.count,
        agg.unanswered,
        report.failures.len(),
        agg.mean_mark,
        agg.mean_judgment
            .map(|s| format!("{s:.1}"))
            .unwrap_or_else(|| "-".to_string()),
        agg.mean_final,
        agg.bands.strong,
        agg.bands.partial,
        agg.bands.weak,
    ));
    html.push_str("</tbody></table>\n");

    if !report.results.is_empty() {
        html.push_str(&generate_score_chart(&report.results));
    }

    html.push_str("</section>\n");

    // Per-topic results
    html.push_str("<section class=\"results\">\n");
    html.push_str("<h2>Results</h2>\n");
    html.push_str("<table class=\"results-table\" id=\"results\">\n");
    html.push_str("<thead><tr><th onclick=\"sortTable(0)\">Topic</th><th onclick=\"sortTable(1)\">Model score</th><th onclick=\"sortTable(2)\">LLM score</th><th onclick=\"sortTable(3)\">Final</th><th>Explanation</th><th>Missing concepts</th></tr></thead>\n");
    html.push_str("<tbody>\n");

    for r in &report.results {
        let class = band_class(r.grade());
        let (explanation, missing) = match r.score().and_then(|s| s.judgment.as_ref()) {
            Some(j) => (html_escape(&j.explanation), html_escape(&j.missing_concepts)),
            None if r.score().is_none() => ("No answer given.".to_string(), "-".to_string()),
            None => ("-".to_string(), "-".to_string()),
        };
        let mark = match r.score() {
            Some(s) if s.bundle.length_penalty_applied() => {
                format!("{:.1} <span class=\"note\">(short)</span>", s.bundle.mark())
            }
            Some(s) => format!("{:.1}", s.bundle.mark()),
            None => "-".to_string(),
        };
        let judgment = r
            .judgment_score()
            .map(|s| format!("{s:.1}"))
            .unwrap_or_else(|| "-".to_string());

        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td class=\"{}\">{:.1}</td><td>{}</td><td>{}</td></tr>\n",
            html_escape(&r.name),
            mark,
            judgment,
            class,
            r.final_score(),
            explanation,
            missing
        ));
    }

    html.push_str("</tbody></table>\n");

    if !report.failures.is_empty() {
        html.push_str("<h3>Failures</h3>\n<ul class=\"failures\">\n");
        for failure in &report.failures {
            html.push_str(&format!(
                "<li><strong>{}</strong>: {}</li>\n",
                html_escape(&failure.id),
                html_escape(&failure.error)
            ));
        }
        html.push_str("</ul>\n");
    }
    html.push_str("</section>\n");

    // Raw JSON
    html.push_str("<section class=\"raw-data\">\n");
    html.push_str("<details>\n<summary>Raw JSON Data</summary>\n");
    html.push_str("<pre><code>");
    html.push_str(&html_escape(
        &serde_json::to_string_pretty(report).unwrap_or_default(),
    ));
    html.push_str("</code></pre>\n");
    html.push_str("</details>\n</section>\n");

    // JavaScript for sorting
    html.push_str("<script>\n");
    html.push_str(JS);
    html.push_str("</script>\n");

    html.push_str("</body>\n</html>");
    html
}

/// Write an HTML report to a file.
pub fn write_html_report(report: &GradingReport, path: &Path) -> Result<()> {
    let html = generate_html(report);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, html)?;
    Ok(())
}

const SERIES: [(&str, &str); 3] = [
    ("Model", "#3b82f6"),
    ("LLM", "#f59e0b"),
    ("Average", "#22c55e"),
];

/// Grouped vertical bars: model mark, LLM score and final score per topic.
fn generate_score_chart(results: &[TopicResult]) -> String {
    let bar_width = 18;
    let group_gap = 24;
    let chart_height = 200;
    let top = 30;
    let left = 40;
    let label_height = 60;

    let group_width = bar_width * SERIES.len() + group_gap;
    let width = left + results.len() * group_width + group_gap;
    let height = top + chart_height + label_height;

    let mut svg = format!(
        "<svg width=\"{width}\" height=\"{height}\" xmlns=\"http://www.w3.org/2000/svg\" class=\"chart\">\n"
    );

    // Legend
    for (i, (name, color)) in SERIES.iter().enumerate() {
        let x = left + i * 90;
        svg.push_str(&format!(
            "  <rect x=\"{x}\" y=\"4\" width=\"12\" height=\"12\" fill=\"{color}\"/>\n  <text x=\"{}\" y=\"14\" font-size=\"12\" fill=\"currentColor\">{name}</text>\n",
            x + 16
        ));
    }

    // Axis with 0 / 50 / 100 gridlines
    for tick in [0, 50, 100] {
        let y = top + chart_height - tick * chart_height / 100;
        svg.push_str(&format!(
            "  <line x1=\"{left}\" y1=\"{y}\" x2=\"{}\" y2=\"{y}\" stroke=\"currentColor\" stroke-opacity=\"0.2\"/>\n  <text x=\"{}\" y=\"{y}\" font-size=\"11\" fill=\"currentColor\" text-anchor=\"end\" dominant-baseline=\"middle\">{tick}</text>\n",
            width - group_gap / 2,
            left - 6
        ));
    }

    for (i, r) in results.iter().enumerate() {
        let group_x = left + group_gap + i * group_width;
        let values = [
            r.mark(),
            r.judgment_score().unwrap_or(0.0),
            r.final_score(),
        ];

        for (j, (value, (_, color))) in values.iter().zip(SERIES.iter()).enumerate() {
            let clamped = value.clamp(0.0, 100.0);
            let bar_height = (clamped * chart_height as f64 / 100.0) as usize;
            let x = group_x + j * bar_width;
            let y = top + chart_height - bar_height;
            svg.push_str(&format!(
                "  <rect x=\"{x}\" y=\"{y}\" width=\"{}\" height=\"{bar_height}\" fill=\"{color}\" rx=\"2\"><title>{value:.1}</title></rect>\n",
                bar_width - 2
            ));
        }

        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" font-size=\"12\" fill=\"currentColor\" text-anchor=\"middle\">{}</text>\n",
            group_x + bar_width * SERIES.len() / 2,
            top + chart_height + 18,
            html_escape(&r.name)
        ));
    }

    svg.push_str("</svg>\n");
    svg
}

const CSS: &str = r#"
:root { --bg: #fff; --fg: #1a1a1a; --border: #e5e7eb; --strong: #dcfce7; --partial: #fef9c3; --weak: #fde2e2; }
@media (prefers-color-scheme: dark) {
  :root { --bg: #111827; --fg: #f9fafb; --border: #374151; --strong: #064e3b; --partial: #713f12; --weak: #7f1d1d; }
}
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif; margin: 0; padding: 2rem; background: var(--bg); color: var(--fg); }
h1, h2 { margin-top: 2rem; }
.meta { color: #6b7280; }
.note { color: #6b7280; font-size: 0.8rem; }
table { border-collapse: collapse; width: 100%; margin: 1rem 0; }
th, td { border: 1px solid var(--border); padding: 0.5rem 1rem; text-align: left; vertical-align: top; }
th { background: var(--border); cursor: pointer; }
.strong { background: var(--strong); }
.partial { background: var(--partial); }
.weak { background: var(--weak); }
pre { overflow-x: auto; padding: 1rem; background: var(--border); border-radius: 8px; }
code { font-family: 'JetBrains Mono', 'Fira Code', monospace; font-size: 0.85rem; }
details { margin: 1rem 0; }
summary { cursor: pointer; font-weight: bold; }
svg { margin: 1rem 0; }
"#;

const JS: &str = r#"
function sortTable(col) {
  const table = document.getElementById('results');
  const tbody = table.querySelector('tbody');
  const rows = Array.from(tbody.querySelectorAll('tr'));
  const asc = table.dataset.sortCol == col && table.dataset.sortDir == 'asc' ? false : true;
  const key = (row) => {
    const text = row.cells[col].textContent;
    const num = parseFloat(text);
    return isNaN(num) ? text : num;
  };
  rows.sort((a, b) => {
    const va = key(a);
    const vb = key(b);
    if (typeof va === 'number' && typeof vb === 'number') {
      return asc ? va - vb : vb - va;
    }
    return asc ? String(va).localeCompare(String(vb)) : String(vb).localeCompare(String(va));
  });
  table.dataset.sortCol = col;
  table.dataset.sortDir = asc ? 'asc' : 'desc';
  rows.forEach(r => tbody.appendChild(r));
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use gradekit_core::model::ScoringMode;
    use gradekit_core::report::SetSummary;
    use gradekit_core::results::{HybridScore, Judgment, Outcome, ScoreBundle, TopicFailure};
    use gradekit_core::statistics::AggregateStats;

    fn bundle(mark: f64, short: bool) -> ScoreBundle {
        serde_json::from_value(serde_json::json!({
            "bi_encoder": 0.8,
            "cross_encoder": 0.75,
            "contradiction": 0.1,
            "nli_adjusted": 0.9,
            "composite": 0.8,
            "unpenalized_mark": mark,
            "length_penalty_applied": short,
            "mark": mark
        }))
        .unwrap()
    }

    fn make_test_report() -> GradingReport {
        let judgment = Judgment {
            score: 70.0,
            explanation: "Covers <grouping> but not distance".into(),
            missing_concepts: "distance metric".into(),
            full_response: "SCORE: 70".into(),
            error: None,
        };
        let results = vec![
            TopicResult {
                id: "clustering".into(),
                name: "Clustering".into(),
                reference: "group similar point".into(),
                candidate: "group point".into(),
                outcome: Outcome::Scored(HybridScore::combine(bundle(80.0, false), Some(judgment))),
                duration_ms: 12,
            },
            TopicResult {
                id: "pca".into(),
                name: "PCA".into(),
                reference: "reduce dimension".into(),
                candidate: "dimension".into(),
                outcome: Outcome::Scored(HybridScore::combine(
                    bundle(42.5, true),
                    Some(Judgment::failed("timeout")),
                )),
                duration_ms: 9,
            },
            TopicResult {
                id: "svm".into(),
                name: "SVM".into(),
                reference: "maximum margin".into(),
                candidate: String::new(),
                outcome: Outcome::Unanswered,
                duration_ms: 0,
            },
        ];
        GradingReport {
            id: uuid::Uuid::nil(),
            created_at: chrono::Utc::now(),
            set: SetSummary {
                id: "ml".into(),
                name: "Machine Learning".into(),
                topic_count: 4,
            },
            mode: ScoringMode::Hybrid,
            backend: "stub".into(),
            judge_model: Some("gemini-1.5-flash".into()),
            aggregate: AggregateStats::compute(&results),
            results,
            failures: vec![TopicFailure {
                id: "knn".into(),
                error: "tokenizer failed".into(),
            }],
            duration_ms: 1000,
        }
    }

    #[test]
    fn html_report_contains_required_elements() {
        let report = make_test_report();
        let html = generate_html(&report);

        assert!(html.contains("<html"));
        assert!(html.contains("</html>"));
        assert!(html.contains("Machine Learning"));
        assert!(html.contains("gemini-1.5-flash"));
        assert!(html.contains("Clustering"));
        assert!(html.contains("distance metric"));
        assert!(html.contains("No answer given."));
        assert!(html.contains("(short)"));
        assert!(html.contains("tokenizer failed"));
    }

    #[test]
    fn user_text_is_escaped() {
        let html = generate_html(&make_test_report());
        assert!(html.contains("Covers &lt;grouping&gt;"));
        assert!(!html.contains("<grouping>"));
    }

    #[test]
    fn chart_has_three_bars_per_topic() {
        let report = make_test_report();
        let svg = generate_score_chart(&report.results);
        let bars = svg.matches("<rect").count() - SERIES.len();
        assert_eq!(bars, report.results.len() * 3);
        assert!(svg.contains(">Average<"));
    }

    #[test]
    fn html_report_write_to_file() {
        let report = make_test_report();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/report.html");

        write_html_report(&report, &path).unwrap();
        assert!(path.exists());

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("<html"));
    }
}
