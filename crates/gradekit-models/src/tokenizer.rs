//! Tokenizer loading and tensor encoding.

use std::path::Path;

use candle_core::{Device, Tensor};
use tokenizers::{Encoding, Tokenizer, TruncationParams};

use crate::error::ModelError;

/// Longest input the BERT-family models accept.
pub const MAX_SEQ_LEN: usize = 512;

/// Load `tokenizer.json` from a model directory with truncation enabled.
pub fn load_tokenizer(model_dir: &Path) -> Result<Tokenizer, ModelError> {
    let path = model_dir.join("tokenizer.json");
    if !path.exists() {
        return Err(ModelError::ModelLoadFailed {
            reason: format!("missing tokenizer.json in {}", model_dir.display()),
        });
    }

    let mut tokenizer = Tokenizer::from_file(&path).map_err(|e| ModelError::ModelLoadFailed {
        reason: format!("failed to load tokenizer {}: {e}", path.display()),
    })?;
    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length: MAX_SEQ_LEN,
            ..Default::default()
        }))
        .map_err(|e| ModelError::ModelLoadFailed {
            reason: format!("failed to configure truncation: {e}"),
        })?;
    tokenizer.with_padding(None);
    Ok(tokenizer)
}

/// Token ids, type ids and attention mask of one input, batch size 1.
pub struct EncodedInput {
    pub input_ids: Tensor,
    pub token_type_ids: Tensor,
    pub attention_mask: Tensor,
}

impl EncodedInput {
    fn from_encoding(encoding: &Encoding, device: &Device) -> Result<Self, ModelError> {
        let tensor = |data: &[u32]| -> Result<Tensor, ModelError> {
            Ok(Tensor::new(data, device)?.unsqueeze(0)?)
        };
        Ok(Self {
            input_ids: tensor(encoding.get_ids())?,
            token_type_ids: tensor(encoding.get_type_ids())?,
            attention_mask: tensor(encoding.get_attention_mask())?,
        })
    }
}

/// Encode a single text.
pub fn encode_text(tokenizer: &Tokenizer, text: &str, device: &Device) -> Result<EncodedInput, ModelError> {
    let encoding = tokenizer
        .encode(text, true)
        .map_err(|e| ModelError::TokenizationFailed {
            reason: e.to_string(),
        })?;
    EncodedInput::from_encoding(&encoding, device)
}

/// Encode a text pair jointly, as cross-encoders expect.
pub fn encode_pair(
    tokenizer: &Tokenizer,
    first: &str,
    second: &str,
    device: &Device,
) -> Result<EncodedInput, ModelError> {
    let encoding = tokenizer
        .encode((first, second), true)
        .map_err(|e| ModelError::TokenizationFailed {
            reason: e.to_string(),
        })?;
    EncodedInput::from_encoding(&encoding, device)
}
