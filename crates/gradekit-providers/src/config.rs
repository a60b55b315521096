//! Configuration loading and provider factory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use gradekit_core::model::ModelPaths;
use gradekit_core::scoring::ScoringPolicy;
use gradekit_core::traits::LlmProvider;

use crate::anthropic::AnthropicProvider;
use crate::gemini::GeminiProvider;
use crate::ollama::OllamaProvider;
use crate::openai::OpenAiProvider;

/// Fatal configuration problems.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("no API key configured for provider '{provider}' (set GRADEKIT_API_KEY or add it to gradekit.toml)")]
    MissingApiKey { provider: String },

    #[error("no model name configured (set GRADEKIT_MODEL or default_model)")]
    MissingModel,

    #[error("unknown provider '{0}' (expected gemini, openai, anthropic or ollama)")]
    UnknownProvider(String),

    #[error("invalid scoring policy: {0}")]
    InvalidScoring(String),
}

/// Configuration for a single LLM provider.
///
/// Note: Custom Debug impl masks API keys to prevent accidental exposure in logs.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderConfig {
    Gemini {
        #[serde(default)]
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
    },
    OpenAI {
        #[serde(default)]
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
        #[serde(default)]
        org_id: Option<String>,
    },
    Anthropic {
        #[serde(default)]
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
    },
    Ollama {
        #[serde(default = "default_ollama_url")]
        base_url: String,
    },
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderConfig::Gemini {
                api_key: _,
                base_url,
            } => f
                .debug_struct("Gemini")
                .field("api_key", &"***")
                .field("base_url", base_url)
                .finish(),
            ProviderConfig::OpenAI {
                api_key: _,
                base_url,
                org_id,
            } => f
                .debug_struct("OpenAI")
                .field("api_key", &"***")
                .field("base_url", base_url)
                .field("org_id", org_id)
                .finish(),
            ProviderConfig::Anthropic {
                api_key: _,
                base_url,
            } => f
                .debug_struct("Anthropic")
                .field("api_key", &"***")
                .field("base_url", base_url)
                .finish(),
            ProviderConfig::Ollama { base_url } => f
                .debug_struct("Ollama")
                .field("base_url", base_url)
                .finish(),
        }
    }
}

impl ProviderConfig {
    /// An unconfigured entry for a known provider kind.
    pub fn empty(kind: &str) -> Result<Self, ConfigError> {
        match kind {
            "gemini" => Ok(ProviderConfig::Gemini {
                api_key: String::new(),
                base_url: None,
            }),
            "openai" => Ok(ProviderConfig::OpenAI {
                api_key: String::new(),
                base_url: None,
                org_id: None,
            }),
            "anthropic" => Ok(ProviderConfig::Anthropic {
                api_key: String::new(),
                base_url: None,
            }),
            "ollama" => Ok(ProviderConfig::Ollama {
                base_url: default_ollama_url(),
            }),
            other => Err(ConfigError::UnknownProvider(other.to_string())),
        }
    }

    /// The API key, for providers that need one.
    pub fn api_key(&self) -> Option<&str> {
        match self {
            ProviderConfig::Gemini { api_key, .. }
            | ProviderConfig::OpenAI { api_key, .. }
            | ProviderConfig::Anthropic { api_key, .. } => Some(api_key),
            ProviderConfig::Ollama { .. } => None,
        }
    }

    fn set_api_key(&mut self, key: String) {
        match self {
            ProviderConfig::Gemini { api_key, .. }
            | ProviderConfig::OpenAI { api_key, .. }
            | ProviderConfig::Anthropic { api_key, .. } => *api_key = key,
            ProviderConfig::Ollama { .. } => {}
        }
    }
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

/// Top-level gradekit configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradekitConfig {
    /// Provider configurations keyed by name.
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    /// Provider used for OCR and judgment.
    #[serde(default = "default_provider")]
    pub default_provider: String,
    /// Model used for OCR and judgment.
    #[serde(default = "default_model")]
    pub default_model: String,
    /// Judgment temperature (0.0 for repeatable grades).
    #[serde(default)]
    pub temperature: f64,
    /// Local similarity model directories.
    #[serde(default)]
    pub models: ModelPaths,
    /// Scoring policy overrides.
    #[serde(default)]
    pub scoring: ScoringPolicy,
    /// Output directory for reports.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_provider() -> String {
    "gemini".to_string()
}
fn default_model() -> String {
    "gemini-1.5-flash".to_string()
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("./gradekit-results")
}

impl Default for GradekitConfig {
    fn default() -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider(),
            default_model: default_model(),
            temperature: 0.0,
            models: ModelPaths::default(),
            scoring: ScoringPolicy::default(),
            output_dir: default_output_dir(),
        }
    }
}

impl GradekitConfig {
    /// Apply `GRADEKIT_*` overrides read through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(provider) = lookup("GRADEKIT_PROVIDER").filter(|p| !p.is_empty()) {
            self.default_provider = provider;
        }
        if let Some(model) = lookup("GRADEKIT_MODEL").filter(|m| !m.is_empty()) {
            self.default_model = model;
        }
        if let Some(key) = lookup("GRADEKIT_API_KEY").filter(|k| !k.is_empty()) {
            let name = self.default_provider.clone();
            if !self.providers.contains_key(&name) {
                self.providers
                    .insert(name.clone(), ProviderConfig::empty(&name)?);
            }
            if let Some(provider) = self.providers.get_mut(&name) {
                provider.set_api_key(key);
            }
        }
        if let Some(path) = lookup("GRADEKIT_ENCODER_PATH") {
            self.models.encoder = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup("GRADEKIT_CROSS_ENCODER_PATH") {
            self.models.cross_encoder = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup("GRADEKIT_NLI_PATH") {
            self.models.nli = Some(PathBuf::from(path));
        }
        if let Some(flag) = lookup("GRADEKIT_STUB_MODELS") {
            self.models.stub = matches!(flag.trim(), "1" | "true" | "yes");
        }
        Ok(())
    }

    /// Build the configured default provider and model for OCR or judgment.
    ///
    /// Fails when the provider needs an API key and none is set.
    pub fn resolve_provider(&self) -> Result<(Arc<dyn LlmProvider>, String), ConfigError> {
        let name = self.default_provider.as_str();
        let config = match self.providers.get(name) {
            Some(config) => config.clone(),
            None => ProviderConfig::empty(name)?,
        };
        if config.api_key().is_some_and(|k| k.trim().is_empty()) {
            return Err(ConfigError::MissingApiKey {
                provider: name.to_string(),
            });
        }
        if self.default_model.trim().is_empty() {
            return Err(ConfigError::MissingModel);
        }
        let provider = create_provider(name, &config)
            .map_err(|e| ConfigError::UnknownProvider(format!("{name}: {e}")))?;
        Ok((Arc::from(provider), self.default_model.clone()))
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

/// Resolve env vars in a provider config.
fn resolve_provider_config(config: &ProviderConfig) -> ProviderConfig {
    let resolve_opt = |v: &Option<String>| v.as_ref().map(|s| resolve_env_vars(s));
    match config {
        ProviderConfig::Gemini { api_key, base_url } => ProviderConfig::Gemini {
            api_key: resolve_env_vars(api_key),
            base_url: resolve_opt(base_url),
        },
        ProviderConfig::OpenAI {
            api_key,
            base_url,
            org_id,
        } => ProviderConfig::OpenAI {
            api_key: resolve_env_vars(api_key),
            base_url: resolve_opt(base_url),
            org_id: resolve_opt(org_id),
        },
        ProviderConfig::Anthropic { api_key, base_url } => ProviderConfig::Anthropic {
            api_key: resolve_env_vars(api_key),
            base_url: resolve_opt(base_url),
        },
        ProviderConfig::Ollama { base_url } => ProviderConfig::Ollama {
            base_url: resolve_env_vars(base_url),
        },
    }
}

/// Load config from an explicit path, or search the default locations.
///
/// Search order without a path:
/// 1. `gradekit.toml` in the current directory
/// 2. `~/.config/gradekit/config.toml`
///
/// `GRADEKIT_*` environment variables override the file.
pub fn load_config_from(path: Option<&Path>) -> Result<GradekitConfig, ConfigError> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => return Err(ConfigError::NotFound(p.to_path_buf())),
        None => {
            let local = PathBuf::from("gradekit.toml");
            if local.exists() {
                Some(local)
            } else {
                dirs_path()
                    .map(|home| home.join("config.toml"))
                    .filter(|global| global.exists())
            }
        }
    };

    let mut config = match config_path {
        Some(path) => parse_config_file(&path)?,
        None => GradekitConfig::default(),
    };

    config.apply_env_overrides(|name| std::env::var(name).ok())?;

    config.providers = config
        .providers
        .iter()
        .map(|(k, v)| (k.clone(), resolve_provider_config(v)))
        .collect();

    config
        .scoring
        .validate()
        .map_err(|e| ConfigError::InvalidScoring(e.to_string()))?;

    tracing::debug!(
        provider = %config.default_provider,
        model = %config.default_model,
        stub_models = config.models.stub,
        "configuration loaded"
    );

    Ok(config)
}

fn parse_config_file(path: &Path) -> Result<GradekitConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str::<GradekitConfig>(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("gradekit"))
}

/// Create a provider instance from its configuration.
pub fn create_provider(name: &str, config: &ProviderConfig) -> anyhow::Result<Box<dyn LlmProvider>> {
    tracing::debug!(name, ?config, "creating provider");
    match config {
        ProviderConfig::Gemini { api_key, base_url } => {
            Ok(Box::new(GeminiProvider::new(api_key, base_url.clone())?))
        }
        ProviderConfig::Anthropic { api_key, base_url } => {
            Ok(Box::new(AnthropicProvider::new(api_key, base_url.clone())?))
        }
        ProviderConfig::OpenAI {
            api_key,
            base_url,
            org_id,
        } => Ok(Box::new(OpenAiProvider::new(
            api_key,
            base_url.clone(),
            org_id.clone(),
        )?)),
        ProviderConfig::Ollama { base_url } => Ok(Box::new(OllamaProvider::new(base_url)?)),
    }
}
