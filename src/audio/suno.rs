//! Suno through a self-hosted `suno-api` gateway.
//!
//! The gateway is unofficial and authenticates with the browser session
//! cookie. Each submission creates two clips; the first one is tracked.

use super::{AudioBackend, AudioRef, AudioRequest, PollResponse};
use crate::config::SunoConfig;
use crate::error::{Error, Result};
use crate::http::describe_failure;
use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, COOKIE, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const NAME: &str = "suno";

#[derive(Debug, Deserialize)]
struct Clip {
    id: String,
    #[serde(default)]
    status: String,
    audio_url: Option<String>,
    error_message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SunoClient {
    http: reqwest::Client,
    base_url: String,
    make_instrumental: bool,
}

impl SunoClient {
    pub fn new(cfg: &SunoConfig, cookie: String) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let cookie = HeaderValue::from_str(&cookie)
            .map_err(|e| Error::Config(format!("SUNO_COOKIE is not a valid header value: {e}")))?;
        headers.insert(COOKIE, cookie);

        let http = crate::http::client(Duration::from_secs(60), Some(headers))?;

        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            make_instrumental: cfg.make_instrumental,
        })
    }
}

/// Only `complete` and `error` are terminal; `streaming` already carries a
/// partial audio URL but the clip is not finished.
fn map_clip(clip: Clip) -> PollResponse {
    match clip.status.as_str() {
        "complete" => match clip.audio_url {
            Some(url) => PollResponse::complete(AudioRef::Url(url)),
            None => PollResponse::pending(),
        },
        "error" => PollResponse::error(
            clip.error_message
                .unwrap_or_else(|| format!("clip {} failed", clip.id)),
        ),
        _ => PollResponse::pending(),
    }
}

#[async_trait]
impl AudioBackend for SunoClient {
    fn name(&self) -> &str {
        NAME
    }

    async fn submit(&self, request: &AudioRequest) -> Result<String> {
        // Custom mode sings the given lyrics in the given style; plain mode writes its own.
        let (url, body) = match &request.lyrics {
            Some(lyrics) => (
                format!("{}/api/custom_generate", self.base_url),
                json!({
                    "prompt": lyrics,
                    "tags": request.prompt,
                    "title": request.title.clone().unwrap_or_default(),
                    "make_instrumental": self.make_instrumental,
                    "wait_audio": false,
                }),
            ),
            None => (
                format!("{}/api/generate", self.base_url),
                json!({
                    "prompt": request.prompt,
                    "make_instrumental": self.make_instrumental,
                    "wait_audio": false,
                }),
            ),
        };

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::submission(NAME, e))?;
        if !response.status().is_success() {
            return Err(Error::submission(NAME, describe_failure(response).await));
        }

        let clips: Vec<Clip> = response
            .json()
            .await
            .map_err(|e| Error::submission(NAME, format!("parse response: {e}")))?;
        clips
            .into_iter()
            .next()
            .map(|c| c.id)
            .ok_or_else(|| Error::submission(NAME, "gateway returned no clips"))
    }

    async fn poll(&self, job_id: &str) -> Result<PollResponse> {
        let url = format!("{}/api/get?ids={}", self.base_url, urlencoding::encode(job_id));

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::poll(NAME, e))?;
        if !response.status().is_success() {
            return Err(Error::poll(NAME, describe_failure(response).await));
        }

        let clips: Vec<Clip> = response
            .json()
            .await
            .map_err(|e| Error::poll(NAME, format!("parse response: {e}")))?;
        let clip = clips
            .into_iter()
            .find(|c| c.id == job_id)
            .ok_or_else(|| Error::poll(NAME, format!("clip {job_id} not in response")))?;
        Ok(map_clip(clip))
    }
}
