//! BERT-family networks: a mean-pooled sentence encoder and a sequence
//! classifier with either a linear or a RoBERTa-style head.
//!
//! The transformer body is chosen from `model_type` in `config.json`. BERT
//! checkpoints run on candle's `bert` model; RoBERTa checkpoints run on
//! `xlm_roberta`, which offsets position ids past the padding index.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use candle_core::{DType, Device, IndexOp, Tensor};
use candle_nn::{Linear, Module, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use candle_transformers::models::xlm_roberta::{Config as RobertaConfig, XLMRobertaModel};
use serde::Deserialize;

use crate::error::ModelError;
use crate::tokenizer::EncodedInput;

/// The parts of `config.json` candle's `Config` does not carry.
#[derive(Debug, Default, Deserialize)]
pub struct LabelConfig {
    #[serde(default)]
    pub id2label: BTreeMap<String, String>,
}

impl LabelConfig {
    /// Index of the first label matching `name` case-insensitively.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.id2label
            .iter()
            .find(|(_, label)| label.eq_ignore_ascii_case(name))
            .and_then(|(id, _)| id.parse().ok())
    }

    pub fn num_labels(&self) -> usize {
        self.id2label.len()
    }
}

/// Check a model directory holds the files candle needs.
pub fn validate_model_dir(model_dir: &Path) -> Result<(), ModelError> {
    if !model_dir.exists() {
        return Err(ModelError::ModelNotFound {
            path: model_dir.to_path_buf(),
        });
    }
    for file in ["config.json", "model.safetensors"] {
        if !model_dir.join(file).exists() {
            return Err(ModelError::ModelLoadFailed {
                reason: format!("missing {file} in {}", model_dir.display()),
            });
        }
    }
    Ok(())
}

/// Transformer families the loader can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Architecture {
    Bert,
    Roberta,
}

impl Architecture {
    /// Map a `model_type` value; checkpoints without one are treated as BERT.
    pub fn from_model_type(model_type: Option<&str>) -> Result<Self, ModelError> {
        match model_type {
            None | Some("bert") => Ok(Architecture::Bert),
            Some("roberta" | "xlm-roberta") => Ok(Architecture::Roberta),
            Some(other) => Err(ModelError::InvalidConfig {
                reason: format!(
                    "unsupported model_type '{other}' (supported: bert, roberta, xlm-roberta)"
                ),
            }),
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            Architecture::Bert => "bert",
            Architecture::Roberta => "roberta",
        }
    }
}

/// Everything read from `config.json`.
pub struct ModelConfig {
    pub architecture: Architecture,
    pub hidden_size: usize,
    pub labels: LabelConfig,
    raw: serde_json::Value,
}

impl ModelConfig {
    pub fn parse(content: &str) -> Result<Self, ModelError> {
        let raw: serde_json::Value = serde_json::from_str(content).map_err(|e| ModelError::InvalidConfig {
            reason: format!("failed to parse config.json: {e}"),
        })?;
        let architecture = Architecture::from_model_type(raw.get("model_type").and_then(|v| v.as_str()))?;
        let hidden_size = raw
            .get("hidden_size")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| ModelError::InvalidConfig {
                reason: "config.json has no hidden_size".into(),
            })? as usize;
        let labels: LabelConfig = serde_json::from_value(raw.clone()).map_err(|e| ModelError::InvalidConfig {
            reason: format!("failed to parse labels in config.json: {e}"),
        })?;
        Ok(Self {
            architecture,
            hidden_size,
            labels,
            raw,
        })
    }

    pub fn load(model_dir: &Path) -> Result<Self, ModelError> {
        Self::parse(&std::fs::read_to_string(model_dir.join("config.json"))?)
    }

    fn bert(&self) -> Result<BertConfig, ModelError> {
        serde_json::from_value(self.raw.clone()).map_err(|e| ModelError::InvalidConfig {
            reason: format!("invalid BERT config: {e}"),
        })
    }

    fn roberta(&self) -> Result<RobertaConfig, ModelError> {
        let mut raw = self.raw.clone();
        if let Some(map) = raw.as_object_mut() {
            map.entry("position_embedding_type")
                .or_insert_with(|| "absolute".into());
        }
        serde_json::from_value(raw).map_err(|e| ModelError::InvalidConfig {
            reason: format!("invalid RoBERTa config: {e}"),
        })
    }
}

fn var_builder(model_dir: &Path, device: &Device) -> Result<VarBuilder<'static>, ModelError> {
    let weights = model_dir.join("model.safetensors");
    // SAFETY: the weights file is not modified while the model is loaded.
    let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights], DType::F32, device)? };
    Ok(vb)
}

/// The transformer body, returning per-token hidden states.
enum Body {
    Bert(BertModel),
    Roberta(XLMRobertaModel),
}

impl Body {
    /// Load under the architecture's prefix when the checkpoint has one
    /// (task models), else from the root (bare encoders).
    fn load(vb: &VarBuilder, config: &ModelConfig) -> Result<Self, ModelError> {
        let prefix = config.architecture.prefix();
        let vb = if vb.contains_tensor(&format!("{prefix}.embeddings.word_embeddings.weight")) {
            vb.pp(prefix)
        } else {
            vb.clone()
        };
        let body = match config.architecture {
            Architecture::Bert => Body::Bert(BertModel::load(vb, &config.bert()?)?),
            Architecture::Roberta => Body::Roberta(XLMRobertaModel::new(&config.roberta()?, vb)?),
        };
        Ok(body)
    }

    fn forward(&self, input: &EncodedInput) -> Result<Tensor, ModelError> {
        let hidden = match self {
            Body::Bert(bert) => bert.forward(
                &input.input_ids,
                &input.token_type_ids,
                Some(&input.attention_mask),
            )?,
            Body::Roberta(roberta) => {
                // RoBERTa has a single token type.
                let token_type_ids = input.token_type_ids.zeros_like()?;
                roberta.forward(
                    &input.input_ids,
                    &input.attention_mask,
                    &token_type_ids,
                    None,
                    None,
                    None,
                )?
            }
        };
        Ok(hidden)
    }
}

/// Mean-pooled, L2-normalized sentence embeddings.
#[derive(Clone)]
pub struct BertEncoder(Arc<Body>);

impl BertEncoder {
    pub fn load(model_dir: &Path, device: &Device) -> Result<Self, ModelError> {
        validate_model_dir(model_dir)?;
        let config = ModelConfig::load(model_dir)?;
        let vb = var_builder(model_dir, device)?;
        Ok(Self(Arc::new(Body::load(&vb, &config)?)))
    }

    pub fn embed(&self, input: &EncodedInput) -> Result<Vec<f32>, ModelError> {
        let hidden = self.0.forward(input)?;
        let mask = input.attention_mask.to_dtype(DType::F32)?.unsqueeze(2)?;
        let summed = hidden.broadcast_mul(&mask)?.sum(1)?;
        let counts = mask.sum(1)?;
        let mean = summed.broadcast_div(&counts)?;
        let norm = (mean.sqr()?.sum_keepdim(1)?.sqrt()? + 1e-12)?;
        Ok(mean.broadcast_div(&norm)?.squeeze(0)?.to_vec1::<f32>()?)
    }
}

enum ClassifierHead {
    /// `classifier` is a single linear layer (BERT checkpoints).
    Linear(Linear),
    /// `classifier.dense` + tanh + `classifier.out_proj` (RoBERTa checkpoints).
    Roberta { dense: Linear, out_proj: Linear },
}

impl ClassifierHead {
    fn load(vb: VarBuilder, hidden_size: usize, num_labels: usize) -> Result<Self, ModelError> {
        if vb.contains_tensor("out_proj.weight") {
            Ok(ClassifierHead::Roberta {
                dense: candle_nn::linear(hidden_size, hidden_size, vb.pp("dense"))?,
                out_proj: candle_nn::linear(hidden_size, num_labels, vb.pp("out_proj"))?,
            })
        } else {
            Ok(ClassifierHead::Linear(candle_nn::linear(hidden_size, num_labels, vb)?))
        }
    }

    fn forward(&self, cls: &Tensor) -> candle_core::Result<Tensor> {
        match self {
            ClassifierHead::Linear(linear) => linear.forward(cls),
            ClassifierHead::Roberta { dense, out_proj } => out_proj.forward(&dense.forward(cls)?.tanh()?),
        }
    }
}

struct BertClassifierInner {
    body: Body,
    head: ClassifierHead,
    labels: LabelConfig,
    num_labels: usize,
}

/// Sequence-pair classifier reading the `[CLS]` state.
#[derive(Clone)]
pub struct BertClassifier(Arc<BertClassifierInner>);

impl BertClassifier {
    /// Load a classifier; the label count comes from `id2label` (1 if absent).
    pub fn load(model_dir: &Path, device: &Device) -> Result<Self, ModelError> {
        validate_model_dir(model_dir)?;
        let config = ModelConfig::load(model_dir)?;
        let num_labels = config.labels.num_labels().max(1);
        let vb = var_builder(model_dir, device)?;
        let body = Body::load(&vb, &config)?;
        let head = ClassifierHead::load(vb.pp("classifier"), config.hidden_size, num_labels)?;
        Ok(Self(Arc::new(BertClassifierInner {
            body,
            head,
            labels: config.labels,
            num_labels,
        })))
    }

    pub fn num_labels(&self) -> usize {
        self.0.num_labels
    }

    pub fn labels(&self) -> &LabelConfig {
        &self.0.labels
    }

    /// Raw logits for one encoded pair.
    pub fn logits(&self, input: &EncodedInput) -> Result<Vec<f32>, ModelError> {
        let output = self.0.body.forward(input)?;
        let cls = output.i((.., 0, ..))?;
        let logits = self.0.head.forward(&cls)?;
        Ok(logits.flatten_all()?.to_vec1::<f32>()?)
    }
}

/// Cosine similarity; zero vectors give 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum();
    let norm_a: f64 = a.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Numerically stable softmax.
pub fn softmax(logits: &[f32]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f64> = logits.iter().map(|l| f64::from(l - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_lookup() {
        let labels: LabelConfig = serde_json::from_str(
            r#"{"id2label": {"0": "contradiction", "1": "entailment", "2": "neutral"}}"#,
        )
        .unwrap();
        assert_eq!(labels.num_labels(), 3);
        assert_eq!(labels.index_of("CONTRADICTION"), Some(0));
        assert_eq!(labels.index_of("neutral"), Some(2));
        assert_eq!(labels.index_of("other"), None);
    }

    #[test]
    fn missing_labels_default_empty() {
        let labels: LabelConfig = serde_json::from_str(r#"{"hidden_size": 384}"#).unwrap();
        assert_eq!(labels.num_labels(), 0);
    }

    #[test]
    fn architecture_from_model_type() {
        assert_eq!(Architecture::from_model_type(None).unwrap(), Architecture::Bert);
        assert_eq!(Architecture::from_model_type(Some("bert")).unwrap(), Architecture::Bert);
        assert_eq!(
            Architecture::from_model_type(Some("roberta")).unwrap(),
            Architecture::Roberta
        );
        assert_eq!(
            Architecture::from_model_type(Some("xlm-roberta")).unwrap(),
            Architecture::Roberta
        );
    }

    #[test]
    fn deberta_is_rejected() {
        let err = ModelConfig::parse(r#"{"model_type": "deberta-v2", "hidden_size": 768}"#)
            .err()
            .unwrap();
        assert!(matches!(err, ModelError::InvalidConfig { .. }));
        assert!(err.to_string().contains("deberta-v2"));
    }

    #[test]
    fn roberta_config_gets_absolute_positions() {
        let config = ModelConfig::parse(
            r#"{
                "model_type": "roberta",
                "hidden_size": 768,
                "layer_norm_eps": 1e-5,
                "attention_probs_dropout_prob": 0.1,
                "hidden_dropout_prob": 0.1,
                "num_attention_heads": 12,
                "intermediate_size": 3072,
                "hidden_act": "gelu",
                "num_hidden_layers": 12,
                "vocab_size": 50265,
                "max_position_embeddings": 514,
                "type_vocab_size": 1,
                "pad_token_id": 1,
                "id2label": {"0": "LABEL_0"}
            }"#,
        )
        .unwrap();
        assert_eq!(config.architecture, Architecture::Roberta);
        assert_eq!(config.hidden_size, 768);
        assert_eq!(config.labels.num_labels(), 1);
        assert!(config.roberta().is_ok());
    }

    #[test]
    fn validate_dir_reports_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            validate_model_dir(&dir.path().join("absent")),
            Err(ModelError::ModelNotFound { .. })
        ));

        std::fs::write(dir.path().join("config.json"), "{}").unwrap();
        let err = validate_model_dir(dir.path()).unwrap_err();
        assert!(err.to_string().contains("model.safetensors"));
    }

    #[test]
    fn math_helpers() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-9);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-9);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-12);

        let probs = softmax(&[1.0, 1.0, 1.0]);
        assert!(probs.iter().all(|p| (p - 1.0 / 3.0).abs() < 1e-9));
        let probs = softmax(&[10.0, 0.0, 0.0]);
        assert!(probs[0] > 0.99);
        assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }
}
