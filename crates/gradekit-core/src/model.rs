//! Core data model types for gradekit.
//!
//! These are the fundamental types the whole system uses to represent answer
//! sheets, topic sets, answer keys and the scoring mode.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Question-number → answer text, in the order the questions were first seen.
///
/// Inserting an existing question number overwrites its answer in place, so
/// the key set and order stay stable when answers are rewritten.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerSheet {
    entries: Vec<(String, String)>,
}

impl AnswerSheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an answer, returning the previous answer for that question.
    pub fn insert(&mut self, question: impl Into<String>, answer: impl Into<String>) -> Option<String> {
        let question = question.into();
        let answer = answer.into();
        match self.entries.iter_mut().find(|(q, _)| *q == question) {
            Some((_, existing)) => Some(std::mem::replace(existing, answer)),
            None => {
                self.entries.push((question, answer));
                None
            }
        }
    }

    /// Answer for a question number.
    pub fn get(&self, question: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(q, _)| q == question)
            .map(|(_, a)| a.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate `(question, answer)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(q, a)| (q.as_str(), a.as_str()))
    }

    /// Question numbers in insertion order.
    pub fn questions(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(q, _)| q.as_str())
    }

    /// Replace every answer with `f(answer)`, keeping keys and order.
    pub fn map_answers<F>(&mut self, mut f: F)
    where
        F: FnMut(&str) -> String,
    {
        for (_, answer) in &mut self.entries {
            *answer = f(answer);
        }
    }
}

impl<Q: Into<String>, A: Into<String>> FromIterator<(Q, A)> for AnswerSheet {
    fn from_iter<I: IntoIterator<Item = (Q, A)>>(iter: I) -> Self {
        let mut sheet = AnswerSheet::new();
        for (q, a) in iter {
            sheet.insert(q, a);
        }
        sheet
    }
}

impl Serialize for AnswerSheet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (q, a) in &self.entries {
            map.serialize_entry(q, a)?;
        }
        map.end()
    }
}

/// A reference answer paired with a student answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    /// Unique identifier within the set.
    pub id: String,
    /// Human-readable name (defaults to the id).
    #[serde(default)]
    pub name: Option<String>,
    /// The expected answer.
    pub reference: String,
    /// The answer being graded.
    pub candidate: String,
}

impl Topic {
    /// Display name, falling back to the capitalized id.
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => capitalize(&self.id),
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// A collection of topics evaluated together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicSet {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub topics: Vec<Topic>,
}

/// A reference answer for one question number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    /// Question number as it appears on the sheet (e.g. "13").
    pub number: String,
    /// The expected answer.
    pub reference: String,
}

/// Reference answers keyed by question number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerKey {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub questions: Vec<Question>,
}

/// Whether the external judgment takes part in the final score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringMode {
    /// Pretrained-model mark only.
    Model,
    /// Mean of the model mark and the generative-AI judgment.
    Hybrid,
}

impl fmt::Display for ScoringMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoringMode::Model => write!(f, "model"),
            ScoringMode::Hybrid => write!(f, "hybrid"),
        }
    }
}

impl FromStr for ScoringMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "model" | "model-only" => Ok(ScoringMode::Model),
            "hybrid" => Ok(ScoringMode::Hybrid),
            other => Err(format!("unknown scoring mode: {other}")),
        }
    }
}

/// Where the pretrained models live on disk.
///
/// Each path is a directory holding `config.json`, `model.safetensors` and
/// `tokenizer.json`. With `stub = true` the lexical stand-ins are used instead.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelPaths {
    #[serde(default)]
    pub encoder: Option<PathBuf>,
    #[serde(default)]
    pub cross_encoder: Option<PathBuf>,
    #[serde(default)]
    pub nli: Option<PathBuf>,
    #[serde(default)]
    pub stub: bool,
}
