use super::GenerationRequest;
use crate::audio::{AudioChain, AudioRef, AudioRequest, JobOutcome, PollPolicy};
use crate::error::Result;
use crate::llm::TextClient;
use std::time::Duration;

/// How the audio half of a run ended. Lyrics survive every variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioResult {
    /// No backend configured, or audio turned off for this run.
    Skipped,
    Done {
        backend: String,
        audio: AudioRef,
        elapsed: Duration,
    },
    Failed {
        backend: String,
        reason: String,
    },
    /// Not ready within the timeout; the job may still finish remotely.
    TimedOut {
        backend: String,
        elapsed: Duration,
    },
    SubmissionFailed(String),
}

#[derive(Debug, Clone)]
pub struct SongReport {
    pub model: String,
    pub lyrics: String,
    pub audio: AudioResult,
}

pub struct Composer {
    text: TextClient,
    audio: Option<AudioChain>,
    policy: PollPolicy,
    language: String,
}

impl Composer {
    pub fn new(
        text: TextClient,
        audio: Option<AudioChain>,
        policy: PollPolicy,
        language: impl Into<String>,
    ) -> Self {
        Self {
            text,
            audio,
            policy,
            language: language.into(),
        }
    }

    /// Lyrics first; a lyrics failure is the only error. Audio problems are
    /// reported in [`SongReport::audio`].
    pub async fn compose(&self, request: &GenerationRequest) -> Result<SongReport> {
        tracing::info!(model = self.text.model(), topic = request.topic(), "generating lyrics");
        let lyrics = self
            .text
            .generate(&request.lyrics_prompt(&self.language))
            .await?;

        let audio = match &self.audio {
            Some(chain) => self.render_audio(chain, request, &lyrics).await,
            None => AudioResult::Skipped,
        };

        Ok(SongReport {
            model: self.text.model().to_string(),
            lyrics,
            audio,
        })
    }

    async fn render_audio(
        &self,
        chain: &AudioChain,
        request: &GenerationRequest,
        lyrics: &str,
    ) -> AudioResult {
        let audio_request = AudioRequest {
            prompt: request.audio_prompt(),
            lyrics: Some(lyrics.to_string()),
            title: request.title().map(str::to_string),
        };

        match chain.generate(&audio_request, &self.policy).await {
            Ok((backend, JobOutcome::Done { audio, elapsed, .. })) => AudioResult::Done {
                backend,
                audio,
                elapsed,
            },
            Ok((backend, JobOutcome::Failed { reason, .. })) => {
                AudioResult::Failed { backend, reason }
            }
            Ok((backend, JobOutcome::TimedOut { elapsed, .. })) => {
                AudioResult::TimedOut { backend, elapsed }
            }
            Err(e) => AudioResult::SubmissionFailed(e.to_string()),
        }
    }
}
