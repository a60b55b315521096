//! The `gradekit init` command.

use std::path::Path;

use anyhow::Result;

const FILES: [(&str, &str); 3] = [
    ("gradekit.toml", SAMPLE_CONFIG),
    ("topic-sets/example.toml", EXAMPLE_TOPIC_SET),
    ("answer-keys/example.toml", EXAMPLE_ANSWER_KEY),
];

pub fn execute() -> Result<()> {
    for (path, content) in FILES {
        let path = Path::new(path);
        if path.exists() {
            println!("{} already exists, skipping.", path.display());
            continue;
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        println!("Created {}", path.display());
    }

    println!("\nNext steps:");
    println!("  1. Edit gradekit.toml with your API key and model directories");
    println!("  2. Run: gradekit validate --file topic-sets/example.toml");
    println!("  3. Run: gradekit evaluate --topic-set topic-sets/example.toml --format all");
    println!("  4. Run: gradekit scan --image sheet.jpg --answer-key answer-keys/example.toml");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# gradekit configuration

default_provider = "gemini"
default_model = "gemini-1.5-flash"
temperature = 0.0
output_dir = "./gradekit-results"

[providers.gemini]
type = "gemini"
api_key = "${GEMINI_API_KEY}"

[providers.openai]
type = "openai"
api_key = "${OPENAI_API_KEY}"

[providers.anthropic]
type = "anthropic"
api_key = "${ANTHROPIC_API_KEY}"

[providers.ollama]
type = "ollama"
base_url = "http://localhost:11434"

# Directories holding config.json, model.safetensors and tokenizer.json.
# BERT and RoBERTa checkpoints are supported.
# Set stub = true to use the lexical stand-ins instead.
[models]
encoder = "models/all-MiniLM-L6-v2"
cross_encoder = "models/stsb-roberta-base"
nli = "models/nli-roberta-base"
stub = false

[scoring]
bi_encoder_weight = 0.3
cross_encoder_weight = 0.5
nli_weight = 0.2
mark_threshold = 0.6
min_mark = 10.0
max_mark = 100.0
length_ratio = 0.8
length_penalty = 0.85
"#;

const EXAMPLE_TOPIC_SET: &str = r#"[topic_set]
id = "ml-basics"
name = "Machine Learning Basics"
description = "Short answers on core machine learning ideas"

[[topics]]
id = "clustering"
reference = "clustering algorithm use unsupervised learning group similar data point together base certain criteria"
candidate = "clustering algorithm be use for unsupervised grouping to classify unrelated data base random criteria"

[[topics]]
id = "regression"
reference = "regression type supervised learning use predict continuous value base input variable"
candidate = "regression be use to classify continuous output base input noise and randomness"

[[topics]]
id = "classification"
reference = "classification type supervised learning output category class"
candidate = "classification be form of supervised learning where the output be unpredictable event"

[[topics]]
id = "svm"
name = "SVM"
reference = "support vector machine (svm) use classification task find hyperplane best separate data class"
candidate = "support vector machine (svm) be use for regression task by find the optimal surface to confuse the data into mix class"

[[topics]]
id = "pca"
name = "PCA"
reference = "principal component analysis (pca) technique use dimensionality reduction machine learning"
candidate = "principal component analysis (pca) be technique for data generation in machine learning , not dimensionality reduction"

[[topics]]
id = "feature-engineering"
name = "Feature engineering"
reference = "feature engineering involve create new"
candidate = "feature engineering involve delete new variable without meaningful impact on prediction"
"#;

const EXAMPLE_ANSWER_KEY: &str = r#"[answer_key]
id = "ml-midterm"
name = "Machine Learning Midterm"

[[questions]]
number = 13
reference = "Clustering algorithms use unsupervised learning to group similar data points together based on certain criteria."

[[questions]]
number = 14
reference = "Regression is a type of supervised learning used to predict continuous values based on input variables."

[[questions]]
number = 15
reference = "Classification is a type of supervised learning where the output is a category or class."

[[questions]]
number = 16
reference = "Support vector machines are used for classification tasks and find the hyperplane that best separates the data classes."

[[questions]]
number = 17
reference = "Principal component analysis is a technique used for dimensionality reduction in machine learning."

[[questions]]
number = 18
reference = "Feature engineering involves creating new features from raw data."
"#;
