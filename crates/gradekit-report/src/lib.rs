//! gradekit-report: self-contained HTML reports for grading runs.

pub mod html;

pub use html::{generate_html, write_html_report};
