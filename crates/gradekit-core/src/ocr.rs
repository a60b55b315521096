//! Text extraction from scanned answer sheets via a vision model.
//!
//! Every failure (unreadable file, unsupported type, provider error, empty
//! reply) is logged and turned into `None`; a scan never aborts a batch.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::Serialize;

use crate::model::AnswerSheet;
use crate::normalize::normalize_sheet;
use crate::segregate::segregate;
use crate::traits::{GenerateRequest, ImageInput, LlmProvider};

/// Instruction sent alongside every sheet image.
pub const OCR_PROMPT: &str =
    "Extract the text in the image verbatim and correct any spelling mistakes if needed.";

/// MIME type for a supported image extension.
pub fn mime_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// Read an image file into memory.
pub fn load_image(path: &Path) -> Result<ImageInput> {
    let Some(mime_type) = mime_type_for(path) else {
        bail!(
            "unsupported image type: {} (expected png, jpg, jpeg or webp)",
            path.display()
        );
    };
    let data =
        std::fs::read(path).with_context(|| format!("failed to read image {}", path.display()))?;
    if data.is_empty() {
        bail!("image file is empty: {}", path.display());
    }
    Ok(ImageInput::new(mime_type, data))
}

/// Unwrap a reply that the model fenced in a markdown block.
///
/// Returns the contents of the first fenced block, or the trimmed reply when
/// there is none. An unclosed block keeps whatever was accumulated.
pub fn strip_markdown_fences(reply: &str) -> String {
    let mut in_block = false;
    let mut block = String::new();

    for line in reply.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("```") {
            if in_block {
                return block.trim().to_string();
            }
            in_block = true;
            continue;
        }
        if in_block {
            if !block.is_empty() {
                block.push('\n');
            }
            block.push_str(line);
        }
    }

    if in_block && !block.trim().is_empty() {
        return block.trim().to_string();
    }
    reply.trim().to_string()
}

/// A scanned sheet: raw text and the normalized answers found in it.
#[derive(Debug, Clone, Serialize)]
pub struct ScannedSheet {
    pub source: PathBuf,
    pub raw_text: String,
    pub answers: AnswerSheet,
}

/// Sends sheet images to a vision-capable provider.
#[derive(Clone)]
pub struct TextExtractor {
    provider: Arc<dyn LlmProvider>,
    model: String,
}

impl TextExtractor {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    /// Extract text from an in-memory image.
    pub async fn extract_text(&self, image: &ImageInput) -> Option<String> {
        let request = GenerateRequest {
            images: vec![image.clone()],
            ..GenerateRequest::text(&self.model, OCR_PROMPT)
        };

        match self.provider.generate(&request).await {
            Ok(response) => {
                let text = strip_markdown_fences(&response.content);
                if text.is_empty() {
                    tracing::warn!(provider = self.provider.name(), "vision model returned no text");
                    None
                } else {
                    tracing::debug!(chars = text.len(), "extracted sheet text");
                    Some(text)
                }
            }
            Err(e) => {
                tracing::warn!(provider = self.provider.name(), "text extraction failed: {e:#}");
                None
            }
        }
    }

    /// Load an image file and extract its text.
    pub async fn process_image(&self, path: &Path) -> Option<String> {
        match load_image(path) {
            Ok(image) => self.extract_text(&image).await,
            Err(e) => {
                tracing::warn!("{e:#}");
                None
            }
        }
    }

    /// Extract, segregate and normalize one sheet.
    pub async fn scan(&self, path: &Path) -> Option<ScannedSheet> {
        let raw_text = self.process_image(path).await?;
        let answers = normalize_sheet(&segregate(&raw_text));
        tracing::info!(
            source = %path.display(),
            answers = answers.len(),
            "scanned answer sheet"
        );
        Some(ScannedSheet {
            source: path.to_path_buf(),
            raw_text,
            answers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judge::testing::ScriptedProvider;

    #[test]
    fn mime_types() {
        assert_eq!(mime_type_for(Path::new("a.PNG")), Some("image/png"));
        assert_eq!(mime_type_for(Path::new("a.jpeg")), Some("image/jpeg"));
        assert_eq!(mime_type_for(Path::new("a.webp")), Some("image/webp"));
        assert_eq!(mime_type_for(Path::new("a.gif")), None);
        assert_eq!(mime_type_for(Path::new("noext")), None);
    }

    #[test]
    fn load_image_rejects_unsupported_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let gif = dir.path().join("sheet.gif");
        std::fs::write(&gif, b"GIF89a").unwrap();
        assert!(load_image(&gif).is_err());
        assert!(load_image(&dir.path().join("missing.png")).is_err());

        let png = dir.path().join("sheet.png");
        std::fs::write(&png, b"\x89PNG").unwrap();
        let image = load_image(&png).unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.data.len(), 4);
    }

    #[test]
    fn strips_fences() {
        assert_eq!(strip_markdown_fences("```\n13) a\n14) b\n```"), "13) a\n14) b");
        assert_eq!(strip_markdown_fences("```text\n13) a\n"), "13) a");
        assert_eq!(strip_markdown_fences("  13) plain  "), "13) plain");
    }

    #[tokio::test]
    async fn scan_segregates_and_normalizes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheet.jpg");
        std::fs::write(&path, b"fake jpeg").unwrap();

        let provider = ScriptedProvider::replying(
            "13) Clustering groups similar points.\n14) Regression predicts values.",
        );
        let extractor = TextExtractor::new(provider.clone(), "vision");
        let sheet = extractor.scan(&path).await.unwrap();

        assert_eq!(sheet.answers.get("13"), Some("clustering group similar point"));
        assert_eq!(sheet.answers.get("14"), Some("regression predict value"));
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn failures_yield_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheet.png");
        std::fs::write(&path, b"fake").unwrap();

        let failing = TextExtractor::new(ScriptedProvider::failing(), "vision");
        assert!(failing.process_image(&path).await.is_none());

        let empty = TextExtractor::new(ScriptedProvider::replying("   "), "vision");
        assert!(empty.process_image(&path).await.is_none());

        let unsupported = TextExtractor::new(ScriptedProvider::replying("text"), "vision");
        assert!(unsupported
            .process_image(&dir.path().join("sheet.bmp"))
            .await
            .is_none());
    }
}
