//! Splits extracted sheet text into question/answer pairs.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::AnswerSheet;

/// A 1–2 digit question number followed by `)` or `()`, e.g. `13)`, `13 )`, `13()`.
pub const QUESTION_MARKER_PATTERN: &str = r"(\d{1,2}\s*\)\s*|\d{1,2}\s*\(\))";

static QUESTION_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(QUESTION_MARKER_PATTERN).expect("question marker pattern is valid")
});

/// Split `text` into an [`AnswerSheet`] keyed by question number.
///
/// Text before the first marker is dropped. Text without markers yields an
/// empty sheet. A repeated question number overwrites the earlier answer.
pub fn segregate(text: &str) -> AnswerSheet {
    let markers: Vec<_> = QUESTION_MARKER.find_iter(text).collect();
    let mut sheet = AnswerSheet::new();

    for (i, marker) in markers.iter().enumerate() {
        let end = markers.get(i + 1).map_or(text.len(), |next| next.start());
        let answer = text[marker.end()..end].trim();
        sheet.insert(question_key(marker.as_str()), answer);
    }

    tracing::debug!(questions = sheet.len(), "segregated sheet text");
    sheet
}

fn question_key(marker: &str) -> String {
    marker
        .trim()
        .chars()
        .filter(|c| !matches!(c, '(' | ')' | ' '))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_simple_markers() {
        let sheet = segregate("13) alpha 14) beta");
        let pairs: Vec<_> = sheet.iter().collect();
        assert_eq!(pairs, vec![("13", "alpha"), ("14", "beta")]);
    }

    #[test]
    fn no_markers_yields_empty_sheet() {
        assert!(segregate("no markers here").is_empty());
        assert!(segregate("").is_empty());
    }

    #[test]
    fn tolerates_marker_variants() {
        let sheet = segregate("1 ) first\n2() second\n3)third");
        assert_eq!(sheet.get("1"), Some("first"));
        assert_eq!(sheet.get("2"), Some("second"));
        assert_eq!(sheet.get("3"), Some("third"));
    }

    #[test]
    fn drops_preamble_before_first_marker() {
        let sheet = segregate("Name: Jane Doe\n13) clustering groups data");
        assert_eq!(sheet.len(), 1);
        assert_eq!(sheet.get("13"), Some("clustering groups data"));
    }

    #[test]
    fn later_duplicate_overwrites_earlier() {
        let sheet = segregate("5) old answer 6) other 5) new answer");
        assert_eq!(sheet.len(), 2);
        assert_eq!(sheet.get("5"), Some("new answer"));
        assert_eq!(sheet.questions().collect::<Vec<_>>(), vec!["5", "6"]);
    }

    #[test]
    fn marker_with_empty_answer() {
        let sheet = segregate("7) 8) eight");
        assert_eq!(sheet.get("7"), Some(""));
        assert_eq!(sheet.get("8"), Some("eight"));
    }
}
