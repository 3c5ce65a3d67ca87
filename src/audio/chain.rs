use super::{AudioBackend, AudioRequest, JobOutcome, PollPolicy, wait_for_completion};
use crate::error::{Error, Result};

/// Interchangeable backends tried in order until one accepts a job.
pub struct AudioChain {
    backends: Vec<Box<dyn AudioBackend>>,
}

/// A job accepted by one backend of the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submitted {
    pub backend: usize,
    pub job_id: String,
}

impl AudioChain {
    pub fn new(backends: Vec<Box<dyn AudioBackend>>) -> Self {
        Self { backends }
    }

    pub fn names(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    pub fn backend(&self, index: usize) -> Option<&dyn AudioBackend> {
        self.backends.get(index).map(|b| b.as_ref())
    }

    /// First backend that accepts wins. If all reject, their messages are combined.
    pub async fn submit(&self, request: &AudioRequest) -> Result<Submitted> {
        let mut rejections = Vec::new();

        for (index, backend) in self.backends.iter().enumerate() {
            match backend.submit(request).await {
                Ok(job_id) => {
                    tracing::info!(backend = backend.name(), job = %job_id, "audio job submitted");
                    return Ok(Submitted {
                        backend: index,
                        job_id,
                    });
                }
                Err(e) => {
                    tracing::warn!(backend = backend.name(), error = %e, "submission failed; trying next backend");
                    rejections.push(e.to_string());
                }
            }
        }

        if rejections.is_empty() {
            return Err(Error::submission("audio", "no audio backend configured"));
        }
        Err(Error::submission("audio", rejections.join("; ")))
    }

    /// Submit, then poll the accepting backend to a terminal state.
    pub async fn generate(
        &self,
        request: &AudioRequest,
        policy: &PollPolicy,
    ) -> Result<(String, JobOutcome)> {
        let submitted = self.submit(request).await?;
        let backend = &self.backends[submitted.backend];
        let outcome = wait_for_completion(backend.as_ref(), &submitted.job_id, policy).await;
        tracing::info!(backend = backend.name(), polls = outcome.polls(), "audio job finished");
        Ok((backend.name().to_string(), outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{ScriptedBackend, Step};
    use super::super::{AudioRef, PollResponse};
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn request() -> AudioRequest {
        AudioRequest {
            prompt: "Rock, Female vocals, Slow tempo".into(),
            lyrics: None,
            title: Some("Rainy Night".into()),
        }
    }

    #[tokio::test]
    async fn test_falls_back_to_second_backend() {
        let first = Arc::new(ScriptedBackend::rejecting("suno", "cookie expired"));
        let second = Arc::new(ScriptedBackend::new("replicate", Vec::new()));
        let chain = AudioChain::new(vec![
            Box::new(first.clone()),
            Box::new(second.clone()),
        ]);

        let submitted = chain.submit(&request()).await.unwrap();
        assert_eq!(submitted.backend, 1);
        assert_eq!(submitted.job_id, "replicate-job-1");
        assert_eq!(first.submissions.lock().unwrap().len(), 1);
        assert_eq!(second.submissions.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_first_accepting_backend_stops_the_search() {
        let first = Arc::new(ScriptedBackend::new("suno", Vec::new()));
        let second = Arc::new(ScriptedBackend::new("replicate", Vec::new()));
        let chain = AudioChain::new(vec![
            Box::new(first.clone()),
            Box::new(second.clone()),
        ]);

        let submitted = chain.submit(&request()).await.unwrap();
        assert_eq!(submitted.backend, 0);
        assert!(second.submissions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_all_rejections_are_reported() {
        let chain = AudioChain::new(vec![
            Box::new(ScriptedBackend::rejecting("suno", "cookie expired")),
            Box::new(ScriptedBackend::rejecting("replicate", "insufficient credit")),
        ]);
        match chain.submit(&request()).await {
            Err(Error::Submission { message, .. }) => {
                assert!(message.contains("cookie expired"));
                assert!(message.contains("insufficient credit"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_chain_rejects() {
        let chain = AudioChain::new(Vec::new());
        assert!(matches!(
            chain.submit(&request()).await,
            Err(Error::Submission { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_generate_polls_the_accepting_backend() {
        let first = Arc::new(ScriptedBackend::rejecting("suno", "down"));
        let second = Arc::new(ScriptedBackend::new(
            "replicate",
            vec![Step::Reply(PollResponse::complete(AudioRef::Url(
                "https://replicate.delivery/out.mp3".into(),
            )))],
        ));
        let chain = AudioChain::new(vec![
            Box::new(first.clone()),
            Box::new(second.clone()),
        ]);
        let policy = PollPolicy {
            interval: Duration::from_secs(2),
            timeout: Duration::from_secs(30),
            max_consecutive_errors: 3,
        };

        let (name, outcome) = chain.generate(&request(), &policy).await.unwrap();
        assert_eq!(name, "replicate");
        assert!(matches!(outcome, JobOutcome::Done { polls: 1, .. }));
        assert_eq!(first.poll_count(), 0);
        assert_eq!(second.poll_count(), 1);
    }

    #[test]
    fn test_backend_by_index() {
        let chain = AudioChain::new(vec![
            Box::new(ScriptedBackend::new("suno", Vec::new())),
            Box::new(ScriptedBackend::new("huggingface", Vec::new())),
        ]);
        assert_eq!(chain.backend(1).map(|b| b.name()), Some("huggingface"));
        assert!(chain.backend(2).is_none());
    }
}
