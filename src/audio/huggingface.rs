//! Hugging Face serverless inference.
//!
//! The endpoint is synchronous and answers with raw audio bytes, or `503`
//! while the model is still loading. To fit the job protocol, `submit`
//! only records the request under a derived id and every `poll` makes
//! the inference call: `503` reads as pending, audio bytes as complete.

use super::{AudioBackend, AudioRef, AudioRequest, PollResponse};
use crate::config::HuggingFaceConfig;
use crate::error::{Error, Result};
use crate::http::describe_failure;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;
use sha1::{Digest, Sha1};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

const NAME: &str = "huggingface";

pub struct HuggingFaceClient {
    http: reqwest::Client,
    endpoint: String,
    token: Option<String>,
    pending: Mutex<HashMap<String, String>>,
    counter: AtomicU64,
}

impl HuggingFaceClient {
    pub fn new(cfg: &HuggingFaceConfig, token: Option<String>, timeout: Duration) -> Result<Self> {
        let http = crate::http::client(timeout, None)?;
        Ok(Self {
            http,
            endpoint: format!("{}/models/{}", cfg.base_url.trim_end_matches('/'), cfg.model),
            token,
            pending: Mutex::new(HashMap::new()),
            counter: AtomicU64::new(0),
        })
    }

    fn job_id(&self, prompt: &str) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        let mut hasher = Sha1::new();
        hasher.update(self.endpoint.as_bytes());
        hasher.update(n.to_le_bytes());
        hasher.update(prompt.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn prompt_for(&self, job_id: &str) -> Option<String> {
        self.pending
            .lock()
            .ok()
            .and_then(|m| m.get(job_id).cloned())
    }

    fn forget(&self, job_id: &str) {
        if let Ok(mut m) = self.pending.lock() {
            m.remove(job_id);
        }
    }
}

#[async_trait]
impl AudioBackend for HuggingFaceClient {
    fn name(&self) -> &str {
        NAME
    }

    async fn submit(&self, request: &AudioRequest) -> Result<String> {
        if request.prompt.trim().is_empty() {
            return Err(Error::submission(NAME, "empty prompt"));
        }
        let id = self.job_id(&request.prompt);
        self.pending
            .lock()
            .map_err(|_| Error::submission(NAME, "job table poisoned"))?
            .insert(id.clone(), request.prompt.clone());
        Ok(id)
    }

    async fn poll(&self, job_id: &str) -> Result<PollResponse> {
        let Some(prompt) = self.prompt_for(job_id) else {
            return Ok(PollResponse::error(format!("unknown job {job_id}")));
        };

        let mut rb = self.http.post(&self.endpoint).json(&json!({ "inputs": prompt }));
        if let Some(token) = &self.token {
            rb = rb.bearer_auth(token);
        }
        let response = rb.send().await.map_err(|e| Error::poll(NAME, e))?;

        match response.status() {
            StatusCode::SERVICE_UNAVAILABLE => {
                tracing::debug!(job = job_id, "model still loading");
                Ok(PollResponse::pending())
            }
            s if s.is_success() => {
                let bytes = response.bytes().await.map_err(|e| Error::poll(NAME, e))?;
                self.forget(job_id);
                Ok(PollResponse::complete(AudioRef::Bytes(bytes.to_vec())))
            }
            s if s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS => {
                Err(Error::poll(NAME, describe_failure(response).await))
            }
            _ => {
                self.forget(job_id);
                Ok(PollResponse::error(describe_failure(response).await))
            }
        }
    }

    fn release(&self, job_id: &str) {
        self.forget(job_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::JobStatus;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, token: Option<&str>) -> HuggingFaceClient {
        let cfg = HuggingFaceConfig {
            base_url: server.uri(),
            model: "facebook/musicgen-small".into(),
            ..HuggingFaceConfig::default()
        };
        HuggingFaceClient::new(&cfg, token.map(str::to_string), Duration::from_secs(5)).unwrap()
    }

    fn request(prompt: &str) -> AudioRequest {
        AudioRequest {
            prompt: prompt.into(),
            ..AudioRequest::default()
        }
    }

    #[tokio::test]
    async fn test_submit_makes_no_request_and_ids_differ() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let c = client(&server, None);
        let a = c.submit(&request("lofi")).await.unwrap();
        let b = c.submit(&request("lofi")).await.unwrap();
        assert_eq!(a.len(), 40);
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_loading_then_audio() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/facebook/musicgen-small"))
            .and(header("authorization", "Bearer hf_x"))
            .and(body_json(json!({ "inputs": "Rock, Slow tempo" })))
            .respond_with(ResponseTemplate::new(503).set_body_json(json!({
                "error": "Model facebook/musicgen-small is currently loading",
                "estimated_time": 20.0
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/models/facebook/musicgen-small"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "audio/flac")
                    .set_body_bytes(vec![0x66, 0x4c, 0x61, 0x43]),
            )
            .mount(&server)
            .await;

        let c = client(&server, Some("hf_x"));
        let id = c.submit(&request("Rock, Slow tempo")).await.unwrap();
        assert_eq!(c.poll(&id).await.unwrap().status, JobStatus::Pending);
        assert_eq!(
            c.poll(&id).await.unwrap(),
            PollResponse::complete(AudioRef::Bytes(vec![0x66, 0x4c, 0x61, 0x43]))
        );
        // Finished jobs are forgotten.
        assert_eq!(c.poll(&id).await.unwrap().status, JobStatus::Error);
    }

    #[tokio::test]
    async fn test_client_error_is_job_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "Input is too long"
            })))
            .mount(&server)
            .await;

        let c = client(&server, None);
        let id = c.submit(&request("x")).await.unwrap();
        let resp = c.poll(&id).await.unwrap();
        assert_eq!(resp.status, JobStatus::Error);
        assert!(resp.detail.unwrap().contains("Input is too long"));
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let c = client(&server, None);
        let id = c.submit(&request("x")).await.unwrap();
        assert!(matches!(c.poll(&id).await, Err(Error::Poll { .. })));
    }

    #[tokio::test]
    async fn test_released_job_is_forgotten() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let c = client(&server, None);
        let id = c.submit(&request("lofi")).await.unwrap();
        assert_eq!(c.poll(&id).await.unwrap().status, JobStatus::Pending);
        c.release(&id);
        let resp = c.poll(&id).await.unwrap();
        assert_eq!(resp.status, JobStatus::Error);
        assert!(resp.detail.unwrap().contains("unknown job"));
    }

    #[tokio::test]
    async fn test_slow_inference_hits_request_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(vec![1, 2, 3])
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let cfg = HuggingFaceConfig {
            base_url: server.uri(),
            ..HuggingFaceConfig::default()
        };
        let c = HuggingFaceClient::new(&cfg, None, Duration::from_millis(200)).unwrap();
        let id = c.submit(&request("lofi")).await.unwrap();
        assert!(matches!(c.poll(&id).await, Err(Error::Poll { .. })));
    }

    #[tokio::test]
    async fn test_empty_prompt_rejected() {
        let server = MockServer::start().await;
        let c = client(&server, None);
        assert!(matches!(
            c.submit(&request("  ")).await,
            Err(Error::Submission { .. })
        ));
    }
}
