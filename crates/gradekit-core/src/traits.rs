//! Core trait definitions for LLM providers and similarity models.
//!
//! `LlmProvider` is implemented by the `gradekit-providers` crate and
//! `SimilarityBackend` by `gradekit-models`.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// LLM Provider trait
// ---------------------------------------------------------------------------

/// Trait for hosted generative-AI backends (judgment and OCR).
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Human-readable provider name (e.g. "gemini").
    fn name(&self) -> &str;

    /// Generate a text response for a prompt, optionally with images.
    async fn generate(&self, request: &GenerateRequest) -> anyhow::Result<GenerateResponse>;

    /// List well-known models for this provider.
    fn available_models(&self) -> Vec<ModelInfo>;
}

/// Request to generate text from an LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// Model identifier (e.g. "gemini-1.5-flash").
    pub model: String,
    /// The main prompt.
    pub prompt: String,
    /// Optional system prompt.
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Images sent alongside the prompt (vision models only).
    #[serde(default)]
    pub images: Vec<ImageInput>,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f64,
}

impl GenerateRequest {
    /// A text-only request with default limits.
    pub fn text(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            system_prompt: None,
            images: Vec::new(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: 0.0,
        }
    }
}

/// Default output budget for judgment and OCR calls.
pub const DEFAULT_MAX_TOKENS: u32 = 2048;

/// Response from an LLM generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    /// The raw response text.
    pub content: String,
    /// Model that actually generated the response.
    pub model: String,
    /// Token usage.
    pub token_usage: TokenUsage,
    /// Latency in milliseconds.
    pub latency_ms: u64,
}

/// Token accounting reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// An in-memory image attached to a request.
#[derive(Clone, Serialize, Deserialize)]
pub struct ImageInput {
    /// MIME type, e.g. "image/png".
    pub mime_type: String,
    /// Raw image bytes.
    #[serde(skip)]
    pub data: Vec<u8>,
}

impl std::fmt::Debug for ImageInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageInput")
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl ImageInput {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    /// Standard base64 encoding of the image bytes.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.data)
    }

    /// `data:` URL form used by OpenAI-compatible vision APIs.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }
}

/// Information about an available model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model identifier.
    pub id: String,
    /// Human-readable model name.
    pub name: String,
    /// Provider name.
    pub provider: String,
    /// Maximum context window size in tokens.
    pub max_context: u32,
    /// Whether the model accepts images (needed for answer-sheet scanning).
    pub vision: bool,
}

// ---------------------------------------------------------------------------
// Similarity backend trait
// ---------------------------------------------------------------------------

/// The three pretrained-model signals the scorer blends.
///
/// Implementations are loaded once and shared read-only across calls.
pub trait SimilarityBackend: Send + Sync {
    /// Human-readable backend name (e.g. "candle" or "stub").
    fn name(&self) -> &str;

    /// `1 - cosine_distance` between independently encoded texts.
    fn bi_encoder_similarity(&self, reference: &str, candidate: &str) -> anyhow::Result<f64>;

    /// Semantic-textual-similarity score of the jointly encoded pair.
    fn cross_encoder_similarity(&self, reference: &str, candidate: &str) -> anyhow::Result<f64>;

    /// Softmax probability that `candidate` contradicts `reference`.
    fn contradiction_probability(&self, reference: &str, candidate: &str) -> anyhow::Result<f64>;
}
