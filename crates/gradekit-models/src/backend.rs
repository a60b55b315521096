//! The candle-backed similarity backend.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use candle_core::Device;
use tokenizers::Tokenizer;

use gradekit_core::model::ModelPaths;
use gradekit_core::traits::SimilarityBackend;

use crate::bert::{cosine_similarity, sigmoid, softmax, BertClassifier, BertEncoder};
use crate::device::select_device;
use crate::error::ModelError;
use crate::stub::LexicalBackend;
use crate::tokenizer::{encode_pair, encode_text, load_tokenizer};

/// Load the backend described by `paths`: the lexical stub when `stub` is
/// set, otherwise all three pretrained models.
pub fn load_backend(paths: &ModelPaths) -> Result<Arc<dyn SimilarityBackend>, ModelError> {
    if paths.stub {
        tracing::info!("using lexical stub similarity backend");
        return Ok(Arc::new(LexicalBackend));
    }
    Ok(Arc::new(PretrainedModels::load(paths)?))
}

fn required<'a>(path: &'a Option<PathBuf>, what: &str, env: &str) -> Result<&'a Path, ModelError> {
    path.as_deref().ok_or_else(|| ModelError::InvalidConfig {
        reason: format!("no {what} model configured (set [models] in gradekit.toml or {env})"),
    })
}

/// Bi-encoder, STS cross-encoder and NLI cross-encoder, loaded once and
/// shared read-only.
pub struct PretrainedModels {
    device: Device,
    encoder: BertEncoder,
    encoder_tokenizer: Tokenizer,
    sts: BertClassifier,
    sts_tokenizer: Tokenizer,
    nli: BertClassifier,
    nli_tokenizer: Tokenizer,
    contradiction_index: usize,
}

impl std::fmt::Debug for PretrainedModels {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PretrainedModels")
            .field("device", &format!("{:?}", self.device))
            .field("contradiction_index", &self.contradiction_index)
            .finish()
    }
}

impl PretrainedModels {
    pub fn load(paths: &ModelPaths) -> Result<Self, ModelError> {
        let encoder_dir = required(&paths.encoder, "encoder", "GRADEKIT_ENCODER_PATH")?;
        let sts_dir = required(&paths.cross_encoder, "cross-encoder", "GRADEKIT_CROSS_ENCODER_PATH")?;
        let nli_dir = required(&paths.nli, "NLI", "GRADEKIT_NLI_PATH")?;

        let device = select_device();

        tracing::info!(path = %encoder_dir.display(), "loading bi-encoder");
        let encoder = BertEncoder::load(encoder_dir, &device)?;
        let encoder_tokenizer = load_tokenizer(encoder_dir)?;

        tracing::info!(path = %sts_dir.display(), "loading STS cross-encoder");
        let sts = BertClassifier::load(sts_dir, &device)?;
        if sts.num_labels() != 1 {
            return Err(ModelError::InvalidConfig {
                reason: format!("STS cross-encoder must have 1 output label, found {}", sts.num_labels()),
            });
        }
        let sts_tokenizer = load_tokenizer(sts_dir)?;

        tracing::info!(path = %nli_dir.display(), "loading NLI cross-encoder");
        let nli = BertClassifier::load(nli_dir, &device)?;
        if nli.num_labels() != 3 {
            return Err(ModelError::InvalidConfig {
                reason: format!("NLI model must have 3 labels, found {}", nli.num_labels()),
            });
        }
        let contradiction_index =
            nli.labels()
                .index_of("contradiction")
                .ok_or_else(|| ModelError::InvalidConfig {
                    reason: "NLI model config has no 'contradiction' label".into(),
                })?;
        let nli_tokenizer = load_tokenizer(nli_dir)?;

        tracing::info!(contradiction_index, "pretrained models loaded");

        Ok(Self {
            device,
            encoder,
            encoder_tokenizer,
            sts,
            sts_tokenizer,
            nli,
            nli_tokenizer,
            contradiction_index,
        })
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, ModelError> {
        let input = encode_text(&self.encoder_tokenizer, text, &self.device)?;
        self.encoder.embed(&input)
    }
}

impl SimilarityBackend for PretrainedModels {
    fn name(&self) -> &str {
        "candle"
    }

    fn bi_encoder_similarity(&self, reference: &str, candidate: &str) -> anyhow::Result<f64> {
        let a = self.embed(reference)?;
        let b = self.embed(candidate)?;
        Ok(cosine_similarity(&a, &b))
    }

    fn cross_encoder_similarity(&self, reference: &str, candidate: &str) -> anyhow::Result<f64> {
        let input = encode_pair(&self.sts_tokenizer, reference, candidate, &self.device)?;
        let logits = self.sts.logits(&input)?;
        let logit = logits.first().copied().ok_or_else(|| ModelError::InferenceFailed {
            reason: "cross-encoder returned no logits".into(),
        })?;
        Ok(sigmoid(f64::from(logit)))
    }

    fn contradiction_probability(&self, reference: &str, candidate: &str) -> anyhow::Result<f64> {
        let input = encode_pair(&self.nli_tokenizer, reference, candidate, &self.device)?;
        let probs = softmax(&self.nli.logits(&input)?);
        let p = probs.get(self.contradiction_index).copied().ok_or_else(|| {
            ModelError::InferenceFailed {
                reason: format!("NLI returned {} probabilities", probs.len()),
            }
        })?;
        Ok(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_backend_is_selected() {
        let paths = ModelPaths {
            stub: true,
            ..Default::default()
        };
        let backend = load_backend(&paths).unwrap();
        assert_eq!(backend.name(), "stub");
        let same = backend.bi_encoder_similarity("group data", "group data").unwrap();
        assert!((same - 1.0).abs() < 1e-9);
    }

    #[test]
    fn missing_paths_are_config_errors() {
        let Err(err) = load_backend(&ModelPaths::default()) else {
            panic!("expected a configuration error");
        };
        assert!(matches!(err, ModelError::InvalidConfig { .. }));
        assert!(err.to_string().contains("GRADEKIT_ENCODER_PATH"));
    }

    #[test]
    fn missing_model_dir_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ModelPaths {
            encoder: Some(dir.path().join("encoder")),
            cross_encoder: Some(dir.path().join("sts")),
            nli: Some(dir.path().join("nli")),
            stub: false,
        };
        let err = PretrainedModels::load(&paths).unwrap_err();
        assert!(matches!(err, ModelError::ModelNotFound { .. }));
    }
}
