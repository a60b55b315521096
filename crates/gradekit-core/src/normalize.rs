//! Answer text normalization.
//!
//! Tokenizes, drops stopwords and punctuation, lemmatizes what is left and
//! rejoins it with single spaces. The lemmatizer is rule based: an irregular
//! form table first, then plural and verb suffix rules.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::model::AnswerSheet;

static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\p{L}\p{N}]+(?:['’]\p{L}+)?|[^\s\p{L}\p{N}]").expect("token pattern is valid")
});

const STOPWORDS: &[&str] = &[
    "a", "about", "above", "across", "after", "afterwards", "again", "against", "all", "almost",
    "alone", "along", "already", "also", "although", "always", "am", "among", "amongst", "amount",
    "an", "and", "another", "any", "anyhow", "anyone", "anything", "anyway", "anywhere", "are",
    "around", "as", "at", "back", "be", "became", "because", "become", "becomes", "becoming",
    "been", "before", "beforehand", "behind", "being", "below", "beside", "besides", "between",
    "beyond", "both", "bottom", "but", "by", "ca", "call", "can", "cannot", "could", "did", "do",
    "does", "doing", "done", "down", "due", "during", "each", "eight", "either", "eleven", "else",
    "elsewhere", "empty", "enough", "even", "ever", "every", "everyone", "everything",
    "everywhere", "except", "few", "fifteen", "fifty", "first", "five", "for", "former",
    "formerly", "forty", "four", "from", "front", "full", "further", "get", "give", "go", "had",
    "has", "have", "he", "hence", "her", "here", "hereafter", "hereby", "herein", "hereupon",
    "hers", "herself", "him", "himself", "his", "how", "however", "hundred", "i", "if", "in",
    "indeed", "into", "is", "it", "its", "itself", "just", "keep", "last", "latter", "latterly",
    "least", "less", "made", "make", "many", "may", "me", "meanwhile", "might", "mine", "more",
    "moreover", "most", "mostly", "move", "much", "must", "my", "myself", "name", "namely",
    "neither", "never", "nevertheless", "next", "nine", "no", "nobody", "none", "noone", "nor",
    "not", "nothing", "now", "nowhere", "of", "off", "often", "on", "once", "one", "only", "onto",
    "or", "other", "others", "otherwise", "our", "ours", "ourselves", "out", "over", "own",
    "part", "per", "perhaps", "please", "put", "quite", "rather", "re", "really", "regarding",
    "same", "say", "see", "seem", "seemed", "seeming", "seems", "serious", "several", "she",
    "should", "show", "side", "since", "six", "sixty", "so", "some", "somehow", "someone",
    "something", "sometime", "sometimes", "somewhere", "still", "such", "take", "ten", "than",
    "that", "the", "their", "them", "themselves", "then", "thence", "there", "thereafter",
    "thereby", "therefore", "therein", "thereupon", "these", "they", "third", "this", "those",
    "though", "three", "through", "throughout", "thru", "thus", "to", "together", "too", "top",
    "toward", "towards", "twelve", "twenty", "two", "under", "unless", "until", "up", "upon",
    "us", "used", "using", "various", "very", "via", "was", "we", "well", "were", "what",
    "whatever", "when", "whence", "whenever", "where", "whereafter", "whereas", "whereby",
    "wherein", "whereupon", "wherever", "whether", "which", "while", "whither", "who", "whoever",
    "whole", "whom", "whose", "why", "will", "with", "within", "without", "would", "yet", "you",
    "your", "yours", "yourself", "yourselves", "'d", "'ll", "'m", "'re", "'s", "'ve", "n't",
];

static STOPWORD_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| STOPWORDS.iter().copied().collect());

const IRREGULAR: &[(&str, &str)] = &[
    ("children", "child"),
    ("men", "man"),
    ("women", "woman"),
    ("people", "person"),
    ("mice", "mouse"),
    ("feet", "foot"),
    ("teeth", "tooth"),
    ("geese", "goose"),
    ("criteria", "criterion"),
    ("phenomena", "phenomenon"),
    ("analyses", "analysis"),
    ("hypotheses", "hypothesis"),
    ("theses", "thesis"),
    ("bases", "basis"),
    ("axes", "axis"),
    ("indices", "index"),
    ("matrices", "matrix"),
    ("vertices", "vertex"),
    ("data", "data"),
    ("went", "go"),
    ("gone", "go"),
    ("took", "take"),
    ("taken", "take"),
    ("found", "find"),
    ("ran", "run"),
    ("wrote", "write"),
    ("written", "write"),
    ("built", "build"),
    ("led", "lead"),
    ("lost", "lose"),
    ("gave", "give"),
    ("given", "give"),
    ("got", "get"),
    ("gotten", "get"),
    ("knew", "know"),
    ("known", "know"),
    ("thought", "think"),
    ("brought", "bring"),
    ("bought", "buy"),
    ("taught", "teach"),
    ("sought", "seek"),
    ("held", "hold"),
    ("kept", "keep"),
    ("left", "leave"),
    ("meant", "mean"),
    ("sent", "send"),
    ("spent", "spend"),
    ("told", "tell"),
    ("sold", "sell"),
    ("chose", "choose"),
    ("chosen", "choose"),
    ("drew", "draw"),
    ("drawn", "draw"),
    ("grew", "grow"),
    ("grown", "grow"),
    ("began", "begin"),
    ("begun", "begin"),
    ("fell", "fall"),
    ("fallen", "fall"),
    ("saw", "see"),
    ("seen", "see"),
    ("wo", "will"),
    ("better", "good"),
    ("best", "good"),
    ("worse", "bad"),
    ("worst", "bad"),
];

static IRREGULAR_MAP: LazyLock<HashMap<&'static str, &'static str>> =
    LazyLock::new(|| IRREGULAR.iter().copied().collect());

/// Words that look inflected but are already base forms.
const PROTECTED: &[&str] = &[
    "analysis", "basis", "axis", "bus", "gas", "lens", "series", "species", "news", "physics",
    "mathematics", "statistics", "economics", "thing", "string", "nothing", "something",
    "everything", "anything", "during", "morning", "evening", "learning", "training",
    "clustering", "engineering", "programming", "computing", "processing", "modeling",
    "modelling", "meaning", "understanding", "reasoning", "setting", "ceiling", "building",
    "bias", "class", "process", "success", "always", "perhaps",
];

static PROTECTED_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| PROTECTED.iter().copied().collect());

/// Normalize one answer: lowercase, drop stopwords and punctuation, lemmatize.
///
/// Empty or all-stopword text yields `""`.
pub fn normalize(text: &str) -> String {
    tokenize(text)
        .into_iter()
        .filter(|token| !is_punctuation(token) && !STOPWORD_SET.contains(token.as_str()))
        .map(|token| lemmatize(&token))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalize every answer of a sheet, keeping question numbers and order.
pub fn normalize_sheet(sheet: &AnswerSheet) -> AnswerSheet {
    let mut normalized = sheet.clone();
    normalized.map_answers(normalize);
    normalized
}

/// Lowercased word, clitic and punctuation tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for m in TOKEN.find_iter(text) {
        let token = m.as_str().to_lowercase().replace('’', "'");
        match split_clitic(&token) {
            Some((stem, clitic)) => {
                if !stem.is_empty() {
                    tokens.push(stem.to_string());
                }
                tokens.push(clitic.to_string());
            }
            None => tokens.push(token),
        }
    }
    tokens
}

fn split_clitic(token: &str) -> Option<(&str, &str)> {
    if token.ends_with("n't") && token.len() > 3 {
        let at = token.len() - 3;
        return Some((&token[..at], &token[at..]));
    }
    token.find('\'').map(|at| (&token[..at], &token[at..]))
}

fn is_punctuation(token: &str) -> bool {
    !token.chars().any(char::is_alphanumeric)
}

/// Reduce a lowercase word to its dictionary base form.
pub fn lemmatize(word: &str) -> String {
    if let Some(base) = IRREGULAR_MAP.get(word) {
        return (*base).to_string();
    }
    if PROTECTED_SET.contains(word)
        || word.len() <= 3
        || !word.chars().all(|c| c.is_ascii_alphabetic())
    {
        return word.to_string();
    }

    let len = word.len();
    if len > 4 && word.ends_with("ies") {
        return format!("{}y", &word[..len - 3]);
    }
    if word.ends_with("sses") {
        return word[..len - 2].to_string();
    }
    if ["ches", "shes", "xes", "zzes"].iter().any(|s| word.ends_with(s)) {
        return word[..len - 2].to_string();
    }
    if word.ends_with('s') {
        if ["ss", "us", "is", "ous"].iter().any(|s| word.ends_with(s)) {
            return word.to_string();
        }
        return word[..len - 1].to_string();
    }
    if word.ends_with("ied") {
        return format!("{}y", &word[..len - 3]);
    }
    if len > 4 && word.ends_with("eed") {
        return word[..len - 1].to_string();
    }
    if len > 4 && word.ends_with("ed") {
        let stem = &word[..len - 2];
        if has_vowel(stem) {
            return fix_stem(stem);
        }
    }
    if len > 5 && word.ends_with("ing") {
        let stem = &word[..len - 3];
        if has_vowel(stem) {
            return fix_stem(stem);
        }
    }
    word.to_string()
}

fn is_vowel(c: u8) -> bool {
    matches!(c, b'a' | b'e' | b'i' | b'o' | b'u')
}

fn has_vowel(s: &str) -> bool {
    s.bytes().any(|c| is_vowel(c) || c == b'y')
}

/// Undo consonant doubling or restore a silent `e` after a stripped suffix.
fn fix_stem(stem: &str) -> String {
    let b = stem.as_bytes();
    let n = b.len();
    if n >= 2 && b[n - 1] == b[n - 2] && !is_vowel(b[n - 1]) && !matches!(b[n - 1], b'l' | b's' | b'z') {
        return stem[..n - 1].to_string();
    }
    if needs_silent_e(stem) {
        return format!("{stem}e");
    }
    stem.to_string()
}

fn needs_silent_e(stem: &str) -> bool {
    let b = stem.as_bytes();
    let n = b.len();
    let consonant_at = |i: usize| !is_vowel(b[i]);

    if n >= 3 && (stem.ends_with("at") || stem.ends_with("ut")) && consonant_at(n - 3) {
        return true;
    }
    if stem.ends_with("creat") {
        return true;
    }
    const ENDINGS: &[&str] = &[
        "bl", "iz", "yz", "v", "uc", "nc", "rg", "dg", "rc", "ur", "ir", "eas", "aus", "rs", "ns",
        "ps",
    ];
    if ENDINGS.iter().any(|e| stem.ends_with(e)) {
        return true;
    }
    if n >= 2 && b[n - 1] == b'l' && matches!(b[n - 2], b'b' | b'c' | b'd' | b'f' | b'g' | b'k' | b'p' | b't' | b'z') {
        return true;
    }
    match n {
        3 => consonant_at(0) && is_vowel(b[1]) && consonant_at(2) && !matches!(b[2], b'w' | b'x' | b'y'),
        2 => is_vowel(b[0]) && consonant_at(1),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_sentence() {
        assert_eq!(
            normalize("The clustering algorithms are used to group data points."),
            "clustering algorithm group data point"
        );
        assert_eq!(
            normalize("Regression predicts continuous values based on input variables!"),
            "regression predict continuous value base input variable"
        );
    }

    #[test]
    fn all_stopwords_normalize_to_empty() {
        assert_eq!(normalize("It is what it is."), "");
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("?!  ..."), "");
    }

    #[test]
    fn splits_clitics() {
        assert_eq!(tokenize("Don't stop"), vec!["do", "n't", "stop"]);
        assert_eq!(tokenize("model’s output"), vec!["model", "'s", "output"]);
        assert_eq!(normalize("The model's output isn't wrong"), "model output wrong");
    }

    #[test]
    fn lemmatizer_rules() {
        assert_eq!(lemmatize("studies"), "study");
        assert_eq!(lemmatize("classes"), "class");
        assert_eq!(lemmatize("matches"), "match");
        assert_eq!(lemmatize("running"), "run");
        assert_eq!(lemmatize("creating"), "create");
        assert_eq!(lemmatize("making"), "make");
        assert_eq!(lemmatize("stopped"), "stop");
        assert_eq!(lemmatize("called"), "call");
        assert_eq!(lemmatize("agreed"), "agree");
        assert_eq!(lemmatize("continuous"), "continuous");
        assert_eq!(lemmatize("criteria"), "criterion");
    }

    #[test]
    fn protected_words_are_kept() {
        assert_eq!(lemmatize("clustering"), "clustering");
        assert_eq!(lemmatize("analysis"), "analysis");
        assert_eq!(lemmatize("species"), "species");
        assert_eq!(lemmatize("svm"), "svm");
        assert_eq!(lemmatize("k-means"), "k-means");
    }

    #[test]
    fn normalize_sheet_keeps_order() {
        let sheet: AnswerSheet = [("14", "It is."), ("13", "Groups of points")]
            .into_iter()
            .collect();
        let normalized = normalize_sheet(&sheet);
        let pairs: Vec<_> = normalized.iter().collect();
        assert_eq!(pairs, vec![("14", ""), ("13", "group point")]);
    }
}
