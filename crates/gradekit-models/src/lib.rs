//! gradekit-models: pretrained similarity models on candle.
//!
//! Provides the bi-encoder, the STS cross-encoder and the NLI cross-encoder
//! behind [`gradekit_core::traits::SimilarityBackend`], plus a lexical stub
//! backend for running without model files.

pub mod backend;
pub mod bert;
pub mod device;
pub mod error;
pub mod stub;
pub mod tokenizer;

pub use backend::{load_backend, PretrainedModels};
pub use error::ModelError;
pub use stub::LexicalBackend;
