//! Job-based audio generation.
//!
//! Every backend is an asynchronous job API: `submit` returns an id,
//! `poll` performs one status check. [`wait_for_completion`] drives the
//! poll loop until the job reaches a terminal state:
//!
//! ```text
//! SUBMITTED -> POLLING -> DONE       (status=complete and audio present)
//!                      -> FAILED     (status=error, or too many failed checks)
//!                      -> TIMED_OUT  (elapsed >= timeout)
//! ```

pub mod chain;
pub mod cookies;
pub mod huggingface;
pub mod replicate;
pub mod suno;

use crate::config::{AudioConfig, BackendKind, defaults};
use crate::config::secrets::CredentialResolver;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;

pub use chain::AudioChain;

/// Job state as reported by the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Complete,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioRef {
    Url(String),
    Bytes(Vec<u8>),
}

impl AudioRef {
    pub fn is_empty(&self) -> bool {
        match self {
            AudioRef::Url(u) => u.trim().is_empty(),
            AudioRef::Bytes(b) => b.is_empty(),
        }
    }
}

/// Result of one status check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollResponse {
    pub status: JobStatus,
    pub audio: Option<AudioRef>,
    /// Remote error text, when the service gives one.
    pub detail: Option<String>,
}

impl PollResponse {
    pub fn pending() -> Self {
        Self {
            status: JobStatus::Pending,
            audio: None,
            detail: None,
        }
    }

    pub fn complete(audio: AudioRef) -> Self {
        Self {
            status: JobStatus::Complete,
            audio: Some(audio),
            detail: None,
        }
    }

    pub fn error(detail: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Error,
            audio: None,
            detail: Some(detail.into()),
        }
    }
}

/// What the audio backends are asked to produce.
#[derive(Debug, Clone, Default)]
pub struct AudioRequest {
    /// Free-text style description.
    pub prompt: String,
    /// Full lyrics, for backends that sing them.
    pub lyrics: Option<String>,
    pub title: Option<String>,
}

#[async_trait]
pub trait AudioBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Start a job and return its id.
    async fn submit(&self, request: &AudioRequest) -> Result<String>;

    /// One status check. `Err` means the check itself failed, not the job.
    async fn poll(&self, job_id: &str) -> Result<PollResponse>;

    /// Called once the poll loop has stopped watching `job_id`.
    fn release(&self, _job_id: &str) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
    /// Failed status checks in a row before giving up; 0 retries until the timeout.
    pub max_consecutive_errors: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(defaults::POLL_INTERVAL_SECS),
            timeout: Duration::from_secs(defaults::POLL_TIMEOUT_SECS),
            max_consecutive_errors: defaults::MAX_CONSECUTIVE_POLL_ERRORS,
        }
    }
}

/// A submitted job, overwritten by each poll.
#[derive(Debug)]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    pub audio: Option<AudioRef>,
    pub detail: Option<String>,
    started: Instant,
}

impl Job {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: JobStatus::Pending,
            audio: None,
            detail: None,
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn apply(&mut self, resp: PollResponse) {
        self.status = resp.status;
        self.audio = resp.audio;
        self.detail = resp.detail;
    }

    /// Audio, once the job is complete with a usable reference.
    fn finished_audio(&self) -> Option<&AudioRef> {
        match (&self.status, &self.audio) {
            (JobStatus::Complete, Some(a)) if !a.is_empty() => Some(a),
            _ => None,
        }
    }
}

/// Terminal state of the poll loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Done {
        audio: AudioRef,
        elapsed: Duration,
        polls: u32,
    },
    Failed {
        reason: String,
        elapsed: Duration,
        polls: u32,
    },
    TimedOut {
        elapsed: Duration,
        polls: u32,
    },
}

impl JobOutcome {
    pub fn polls(&self) -> u32 {
        match self {
            JobOutcome::Done { polls, .. }
            | JobOutcome::Failed { polls, .. }
            | JobOutcome::TimedOut { polls, .. } => *polls,
        }
    }
}

/// Poll until DONE, FAILED or TIMED_OUT. A status check still running
/// when the budget runs out is abandoned and the job is TIMED_OUT.
pub async fn wait_for_completion(
    backend: &dyn AudioBackend,
    job_id: &str,
    policy: &PollPolicy,
) -> JobOutcome {
    let outcome = poll_until_terminal(backend, job_id, policy).await;
    backend.release(job_id);
    outcome
}

async fn poll_until_terminal(
    backend: &dyn AudioBackend,
    job_id: &str,
    policy: &PollPolicy,
) -> JobOutcome {
    let mut job = Job::new(job_id);
    let mut polls = 0u32;
    let mut failed_checks = 0u32;

    loop {
        if polls > 0 && job.elapsed() >= policy.timeout {
            tracing::info!(backend = backend.name(), job = %job.id, polls, "job timed out");
            return JobOutcome::TimedOut {
                elapsed: job.elapsed(),
                polls,
            };
        }

        polls += 1;
        let budget = policy.timeout.saturating_sub(job.elapsed());
        let checked = match tokio::time::timeout(budget, backend.poll(&job.id)).await {
            Ok(checked) => checked,
            Err(_) => {
                tracing::info!(backend = backend.name(), job = %job.id, polls, "status check outlived the timeout");
                return JobOutcome::TimedOut {
                    elapsed: job.elapsed(),
                    polls,
                };
            }
        };
        match checked {
            Ok(resp) => {
                failed_checks = 0;
                job.apply(resp);
                if let Some(audio) = job.finished_audio() {
                    return JobOutcome::Done {
                        audio: audio.clone(),
                        elapsed: job.elapsed(),
                        polls,
                    };
                }
                if job.status == JobStatus::Error {
                    let reason = job
                        .detail
                        .take()
                        .unwrap_or_else(|| "remote job reported an error".to_string());
                    return JobOutcome::Failed {
                        reason,
                        elapsed: job.elapsed(),
                        polls,
                    };
                }
                tracing::debug!(backend = backend.name(), job = %job.id, polls, "job pending");
            }
            Err(e) => {
                failed_checks += 1;
                tracing::warn!(backend = backend.name(), job = %job.id, error = %e, failed_checks, "status check failed");
                if policy.max_consecutive_errors > 0 && failed_checks >= policy.max_consecutive_errors {
                    return JobOutcome::Failed {
                        reason: e.to_string(),
                        elapsed: job.elapsed(),
                        polls,
                    };
                }
            }
        }

        let remaining = policy.timeout.saturating_sub(job.elapsed());
        tokio::time::sleep(policy.interval.min(remaining)).await;
    }
}

/// Backends named in `audio.backends`, in order. `None` when audio is off.
///
/// Credentials are resolved here, so a missing one stops the run before any request.
pub fn build_chain(cfg: &AudioConfig, creds: &CredentialResolver) -> Result<Option<AudioChain>> {
    if cfg.backends.is_empty() {
        return Ok(None);
    }

    let mut backends: Vec<Box<dyn AudioBackend>> = Vec::with_capacity(cfg.backends.len());
    for kind in &cfg.backends {
        let backend: Box<dyn AudioBackend> = match kind {
            BackendKind::Suno => {
                let cookie = match creds.resolve(defaults::SUNO_COOKIE) {
                    Some(c) => c,
                    None => match &cfg.suno.cookies {
                        Some(path) => cookies::load_netscape_cookies(path, Some("suno"))
                            .map_err(|e| Error::Config(format!("{e:#}")))?
                            .cookie_header,
                        None => {
                            return Err(Error::MissingCredential(defaults::SUNO_COOKIE.to_string()));
                        }
                    },
                };
                Box::new(suno::SunoClient::new(&cfg.suno, cookie)?)
            }
            BackendKind::Replicate => {
                let token = creds.require(defaults::REPLICATE_API_TOKEN)?;
                Box::new(replicate::ReplicateClient::new(&cfg.replicate, token)?)
            }
            BackendKind::Huggingface => {
                let token = creds.resolve(defaults::HF_TOKEN);
                Box::new(huggingface::HuggingFaceClient::new(
                    &cfg.huggingface,
                    token,
                    cfg.huggingface_request_timeout(),
                )?)
            }
        };
        backends.push(backend);
    }

    Ok(Some(AudioChain::new(backends)))
}
