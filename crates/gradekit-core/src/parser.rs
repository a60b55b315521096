//! TOML topic set and answer key parser.
//!
//! Loads topic sets and answer keys from TOML files and directories, and
//! validates them.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::model::{AnswerKey, Question, Topic, TopicSet};

/// Intermediate TOML structure; a file holds either a topic set or an answer key.
#[derive(Debug, Deserialize)]
struct TomlSetFile {
    #[serde(default)]
    topic_set: Option<TomlHeader>,
    #[serde(default)]
    topics: Vec<TomlTopic>,
    #[serde(default)]
    answer_key: Option<TomlHeader>,
    #[serde(default)]
    questions: Vec<TomlQuestion>,
}

#[derive(Debug, Deserialize)]
struct TomlHeader {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct TomlTopic {
    id: String,
    #[serde(default)]
    name: Option<String>,
    reference: String,
    candidate: String,
}

#[derive(Debug, Deserialize)]
struct TomlQuestion {
    number: QuestionNumber,
    reference: String,
}

/// Question numbers may be written as `13` or `"13"`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum QuestionNumber {
    Int(u32),
    Text(String),
}

impl QuestionNumber {
    fn into_key(self) -> String {
        match self {
            QuestionNumber::Int(n) => n.to_string(),
            QuestionNumber::Text(s) => s.trim().to_string(),
        }
    }
}

/// A parsed set file.
#[derive(Debug, Clone)]
pub enum SetFile {
    Topics(TopicSet),
    Key(AnswerKey),
}

impl SetFile {
    pub fn id(&self) -> &str {
        match self {
            SetFile::Topics(set) => &set.id,
            SetFile::Key(key) => &key.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            SetFile::Topics(set) => &set.name,
            SetFile::Key(key) => &key.name,
        }
    }

    /// Number of topics or questions.
    pub fn len(&self) -> usize {
        match self {
            SetFile::Topics(set) => set.topics.len(),
            SetFile::Key(key) => key.questions.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn validate(&self) -> Vec<ValidationWarning> {
        match self {
            SetFile::Topics(set) => validate_topic_set(set),
            SetFile::Key(key) => validate_answer_key(key),
        }
    }
}

/// Parse a single TOML file.
pub fn parse_set_file(path: &Path) -> Result<SetFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read set file: {}", path.display()))?;

    parse_set_str(&content, path)
}

/// Parse a TOML string (useful for testing).
pub fn parse_set_str(content: &str, source_path: &Path) -> Result<SetFile> {
    let parsed: TomlSetFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    match (parsed.topic_set, parsed.answer_key) {
        (Some(header), None) => Ok(SetFile::Topics(TopicSet {
            id: header.id,
            name: header.name,
            description: header.description,
            topics: parsed
                .topics
                .into_iter()
                .map(|t| Topic {
                    id: t.id,
                    name: t.name,
                    reference: t.reference,
                    candidate: t.candidate,
                })
                .collect(),
        })),
        (None, Some(header)) => Ok(SetFile::Key(AnswerKey {
            id: header.id,
            name: header.name,
            description: header.description,
            questions: parsed
                .questions
                .into_iter()
                .map(|q| Question {
                    number: q.number.into_key(),
                    reference: q.reference,
                })
                .collect(),
        })),
        (Some(_), Some(_)) => bail!(
            "{}: a file holds either [topic_set] or [answer_key], not both",
            source_path.display()
        ),
        (None, None) => bail!(
            "{}: missing [topic_set] or [answer_key] table",
            source_path.display()
        ),
    }
}

/// Load a topic set file.
pub fn load_topic_set(path: &Path) -> Result<TopicSet> {
    match parse_set_file(path)? {
        SetFile::Topics(set) => Ok(set),
        SetFile::Key(_) => bail!("{} is an answer key, not a topic set", path.display()),
    }
}

/// Load an answer key file.
pub fn load_answer_key(path: &Path) -> Result<AnswerKey> {
    match parse_set_file(path)? {
        SetFile::Key(key) => Ok(key),
        SetFile::Topics(_) => bail!("{} is a topic set, not an answer key", path.display()),
    }
}

/// Recursively load all `.toml` set files from a directory.
pub fn load_directory(dir: &Path) -> Result<Vec<SetFile>> {
    let mut sets = Vec::new();

    if !dir.is_dir() {
        bail!("not a directory: {}", dir.display());
    }

    let mut entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.path());

    for entry in entries {
        let path = entry.path();

        if path.is_dir() {
            sets.extend(load_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse_set_file(&path) {
                Ok(set) => sets.push(set),
                Err(e) => {
                    tracing::warn!("skipping {}: {:#}", path.display(), e);
                }
            }
        }
    }

    Ok(sets)
}

/// A warning from set validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The topic id or question number (if applicable).
    pub item_id: Option<String>,
    /// Warning message.
    pub message: String,
}

impl ValidationWarning {
    fn item(id: &str, message: impl Into<String>) -> Self {
        Self {
            item_id: Some(id.to_string()),
            message: message.into(),
        }
    }
}

/// Validate a topic set for common issues.
pub fn validate_topic_set(set: &TopicSet) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    if set.topics.is_empty() {
        warnings.push(ValidationWarning {
            item_id: None,
            message: "topic set has no topics".into(),
        });
    }

    let mut seen = HashSet::new();
    for topic in &set.topics {
        if !seen.insert(&topic.id) {
            warnings.push(ValidationWarning::item(
                &topic.id,
                format!("duplicate topic ID: {}", topic.id),
            ));
        }
        if topic.reference.trim().is_empty() {
            warnings.push(ValidationWarning::item(&topic.id, "reference answer is empty"));
        }
        if topic.candidate.trim().is_empty() {
            warnings.push(ValidationWarning::item(&topic.id, "candidate answer is empty"));
        }
    }

    warnings
}

/// Validate an answer key for common issues.
pub fn validate_answer_key(key: &AnswerKey) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    if key.questions.is_empty() {
        warnings.push(ValidationWarning {
            item_id: None,
            message: "answer key has no questions".into(),
        });
    }

    let mut seen = HashSet::new();
    for q in &key.questions {
        if !seen.insert(&q.number) {
            warnings.push(ValidationWarning::item(
                &q.number,
                format!("duplicate question number: {}", q.number),
            ));
        }
        // Sheet markers carry at most two digits.
        let is_marker_number =
            (1..=2).contains(&q.number.len()) && q.number.chars().all(|c| c.is_ascii_digit());
        if !is_marker_number {
            warnings.push(ValidationWarning::item(
                &q.number,
                "question number must be 1-2 digits to match sheet markers",
            ));
        }
        if q.reference.trim().is_empty() {
            warnings.push(ValidationWarning::item(&q.number, "reference answer is empty"));
        }
    }

    warnings
}
