//! Lyrics generation through a hosted language model.
//!
//! - [`TextGenerator`]: provider boundary (catalog + completion)
//! - [`select_model`]: override, then catalog preference, then fallback
//! - [`TextClient`]: a generator bound to the selected model

pub mod gemini;

use crate::config::LlmConfig;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

pub use gemini::GeminiClient;

#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn provider(&self) -> &str;

    /// Model names exposed by the provider.
    async fn list_models(&self) -> Result<Vec<String>>;

    async fn generate(&self, model: &str, prompt: &str) -> Result<String>;
}

/// How a model name is chosen.
#[derive(Debug, Clone)]
pub struct ModelSelection {
    pub model: Option<String>,
    pub fast_marker: String,
    pub general_marker: String,
    pub fallback: String,
}

impl From<&LlmConfig> for ModelSelection {
    fn from(cfg: &LlmConfig) -> Self {
        Self {
            model: cfg.model.clone(),
            fast_marker: cfg.fast_marker.clone(),
            general_marker: cfg.general_marker.clone(),
            fallback: cfg.fallback_model.clone(),
        }
    }
}

/// Catalog preference: any fast-tier name, else any general-tier name, else the fallback.
pub fn pick_model(names: &[String], sel: &ModelSelection) -> String {
    names
        .iter()
        .find(|n| n.contains(&sel.fast_marker))
        .or_else(|| names.iter().find(|n| n.contains(&sel.general_marker)))
        .cloned()
        .unwrap_or_else(|| sel.fallback.clone())
}

pub async fn select_model(generator: &dyn TextGenerator, sel: &ModelSelection) -> String {
    if let Some(model) = &sel.model {
        return model.clone();
    }
    match generator.list_models().await {
        Ok(names) => {
            let model = pick_model(&names, sel);
            tracing::debug!(candidates = names.len(), %model, "selected model from catalog");
            model
        }
        Err(e) => {
            tracing::warn!(error = %e, fallback = %sel.fallback, "model listing failed; using fallback");
            sel.fallback.clone()
        }
    }
}

/// A generator bound to one model.
#[derive(Clone)]
pub struct TextClient {
    generator: Arc<dyn TextGenerator>,
    model: String,
}

impl TextClient {
    pub async fn connect(generator: Arc<dyn TextGenerator>, sel: &ModelSelection) -> Self {
        let model = select_model(generator.as_ref(), sel).await;
        Self { generator, model }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider(&self) -> &str {
        self.generator.provider()
    }

    pub async fn generate(&self, prompt: &str) -> Result<String> {
        self.generator.generate(&self.model, prompt).await
    }
}
