//! Replicate predictions API
//!
//! API Documentation: https://replicate.com/docs/reference/http

use super::{AudioBackend, AudioRef, AudioRequest, PollResponse};
use crate::config::ReplicateConfig;
use crate::error::{Error, Result};
use crate::http::describe_failure;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const NAME: &str = "replicate";

#[derive(Debug, Deserialize)]
struct Prediction {
    id: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    output: serde_json::Value,
    error: Option<serde_json::Value>,
}

impl Prediction {
    /// `output` is a URL for MusicGen, a list of URLs for some other models.
    fn audio_url(&self) -> Option<String> {
        match &self.output {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Array(items) => {
                items.iter().find_map(|v| v.as_str().map(str::to_string))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReplicateClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    version: String,
    model_version: String,
    duration_secs: u32,
}

impl ReplicateClient {
    pub fn new(cfg: &ReplicateConfig, token: String) -> Result<Self> {
        let http = crate::http::client(Duration::from_secs(30), None)?;
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            token,
            version: cfg.version.clone(),
            model_version: cfg.model_version.clone(),
            duration_secs: cfg.duration_secs,
        })
    }
}

fn map_prediction(p: Prediction) -> PollResponse {
    match p.status.as_str() {
        "succeeded" => match p.audio_url() {
            Some(url) => PollResponse::complete(AudioRef::Url(url)),
            None => PollResponse::pending(),
        },
        "failed" | "canceled" => {
            let detail = match p.error {
                Some(serde_json::Value::String(s)) => s,
                Some(v) if !v.is_null() => v.to_string(),
                _ => format!("prediction {} {}", p.id, p.status),
            };
            PollResponse::error(detail)
        }
        _ => PollResponse::pending(),
    }
}

#[async_trait]
impl AudioBackend for ReplicateClient {
    fn name(&self) -> &str {
        NAME
    }

    async fn submit(&self, request: &AudioRequest) -> Result<String> {
        let body = json!({
            "version": self.version,
            "input": {
                "prompt": request.prompt,
                "model_version": self.model_version,
                "duration": self.duration_secs,
                "output_format": "mp3",
            }
        });

        let response = self
            .http
            .post(format!("{}/v1/predictions", self.base_url))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::submission(NAME, e))?;
        if !response.status().is_success() {
            return Err(Error::submission(NAME, describe_failure(response).await));
        }

        let prediction: Prediction = response
            .json()
            .await
            .map_err(|e| Error::submission(NAME, format!("parse prediction: {e}")))?;
        Ok(prediction.id)
    }

    async fn poll(&self, job_id: &str) -> Result<PollResponse> {
        let response = self
            .http
            .get(format!(
                "{}/v1/predictions/{}",
                self.base_url,
                urlencoding::encode(job_id)
            ))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| Error::poll(NAME, e))?;
        if !response.status().is_success() {
            return Err(Error::poll(NAME, describe_failure(response).await));
        }

        let prediction: Prediction = response
            .json()
            .await
            .map_err(|e| Error::poll(NAME, format!("parse prediction: {e}")))?;
        Ok(map_prediction(prediction))
    }
}
