//! gradekit-providers: hosted generative-AI providers.
//!
//! Implements the `LlmProvider` trait for Gemini, OpenAI-compatible APIs,
//! Anthropic and Ollama, and loads the gradekit configuration that selects
//! between them.

pub mod anthropic;
pub mod config;
pub mod gemini;
mod http;
pub mod mock;
pub mod ollama;
pub mod openai;

pub use config::{
    create_provider, load_config_from, ConfigError, GradekitConfig, ProviderConfig,
};
pub use gradekit_core::error::ProviderError;
