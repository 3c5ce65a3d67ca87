//! Google Generative Language API client
//!
//! API Documentation: https://ai.google.dev/api/rest

use super::TextGenerator;
use crate::error::{Error, Result};
use crate::http::describe_failure;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelList {
    #[serde(default)]
    models: Vec<ModelEntry>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    name: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(base_url: &str, api_key: String, timeout: Duration) -> Result<Self> {
        let client = crate::http::client(timeout, None)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn model_path(model: &str) -> String {
        if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{model}")
        }
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    fn provider(&self) -> &str {
        "gemini"
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = format!("{}/v1beta/models?pageSize=1000", self.base_url);
            if let Some(token) = &page_token {
                url.push_str(&format!("&pageToken={}", urlencoding::encode(token)));
            }

            let response = self
                .client
                .get(&url)
                .header("x-goog-api-key", &self.api_key)
                .send()
                .await
                .map_err(|e| Error::ProviderList(e.to_string()))?;

            if !response.status().is_success() {
                return Err(Error::ProviderList(describe_failure(response).await));
            }

            let page: ModelList = response
                .json()
                .await
                .map_err(|e| Error::ProviderList(format!("parse model list: {e}")))?;
            names.extend(page.models.into_iter().map(|m| m.name));

            match page.next_page_token {
                Some(t) if !t.is_empty() => page_token = Some(t),
                _ => break,
            }
        }

        Ok(names)
    }

    async fn generate(&self, model: &str, prompt: &str) -> Result<String> {
        let url = format!(
            "{}/v1beta/{}:generateContent",
            self.base_url,
            Self::model_path(model)
        );
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::ProviderCall(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::ProviderCall(describe_failure(response).await));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::ProviderCall(format!("parse response: {e}")))?;

        let text = parsed
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .filter_map(|p| p.text)
            .collect::<String>();

        if text.trim().is_empty() {
            return Err(Error::ProviderCall(format!("{model} returned no text")));
        }
        Ok(text)
    }
}
