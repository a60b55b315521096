//! Deterministic lexical stand-ins for the pretrained models.
//!
//! Used when no model files are configured (`stub = true`), so the whole
//! pipeline runs in tests and demos. Identical texts score as identical;
//! the values are not comparable to real model output.

use std::collections::{HashMap, HashSet};

use gradekit_core::traits::SimilarityBackend;

const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had",
    "do", "does", "did", "will", "would", "could", "should", "may", "might", "must", "can",
    "used", "to", "of", "in", "for", "on", "with", "at", "by", "from", "as", "into", "and", "but",
    "if", "or", "this", "that", "these", "those", "it", "its",
];

const NEGATIONS: &[&str] = &["not", "no", "never", "none", "without", "cannot", "nothing", "nor"];

fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

fn content_words(text: &str) -> HashSet<String> {
    words(text)
        .into_iter()
        .filter(|w| !STOP_WORDS.contains(&w.as_str()) && !NEGATIONS.contains(&w.as_str()))
        .collect()
}

fn is_negated(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("n't") || words(text).iter().any(|w| NEGATIONS.contains(&w.as_str()))
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Lexical similarity backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct LexicalBackend;

impl LexicalBackend {
    /// Cosine of term-frequency vectors.
    pub fn term_cosine(reference: &str, candidate: &str) -> f64 {
        let counts = |text: &str| {
            let mut map: HashMap<String, f64> = HashMap::new();
            for w in words(text) {
                *map.entry(w).or_default() += 1.0;
            }
            map
        };
        let a = counts(reference);
        let b = counts(candidate);
        let dot: f64 = a.iter().filter_map(|(w, x)| b.get(w).map(|y| x * y)).sum();
        let norm = |m: &HashMap<String, f64>| m.values().map(|v| v * v).sum::<f64>().sqrt();
        let (na, nb) = (norm(&a), norm(&b));
        if na == 0.0 || nb == 0.0 {
            return 0.0;
        }
        dot / (na * nb)
    }

    /// Recall/Jaccard blend squashed through a sigmoid, in [0, 1].
    pub fn overlap_score(reference: &str, candidate: &str) -> f64 {
        let reference_words = content_words(reference);
        let candidate_words = content_words(candidate);

        if reference_words.is_empty() {
            let len_ratio = reference.len().min(candidate.len()) as f64
                / reference.len().max(candidate.len()).max(1) as f64;
            return len_ratio * 0.3;
        }

        let matches = reference_words.intersection(&candidate_words).count();
        let recall = matches as f64 / reference_words.len() as f64;
        let base = 0.6 * recall + 0.4 * jaccard(&reference_words, &candidate_words);

        (1.0 / (1.0 + (-8.0 * (base - 0.5)).exp())).clamp(0.0, 1.0)
    }

    /// Higher for disjoint content and for negation present on one side only.
    pub fn contradiction_score(reference: &str, candidate: &str) -> f64 {
        let overlap = jaccard(&content_words(reference), &content_words(candidate));
        let mut score = 0.5 * (1.0 - overlap);
        if is_negated(reference) != is_negated(candidate) {
            score += 0.4;
        }
        score.clamp(0.0, 1.0)
    }
}

impl SimilarityBackend for LexicalBackend {
    fn name(&self) -> &str {
        "stub"
    }

    fn bi_encoder_similarity(&self, reference: &str, candidate: &str) -> anyhow::Result<f64> {
        Ok(Self::term_cosine(reference, candidate))
    }

    fn cross_encoder_similarity(&self, reference: &str, candidate: &str) -> anyhow::Result<f64> {
        Ok(Self::overlap_score(reference, candidate))
    }

    fn contradiction_probability(&self, reference: &str, candidate: &str) -> anyhow::Result<f64> {
        Ok(Self::contradiction_score(reference, candidate))
    }
}
