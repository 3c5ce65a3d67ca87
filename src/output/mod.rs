//! Rendering and saving a finished run.

use crate::audio::AudioRef;
use crate::song::{AudioResult, GenerationRequest, SongReport};
use anyhow::Context;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

#[derive(Debug, Default)]
pub struct SavedFiles {
    pub lyrics: Option<PathBuf>,
    pub audio: Option<PathBuf>,
}

/// One-line, user-facing description of the audio half.
pub fn audio_summary(result: &AudioResult) -> String {
    match result {
        AudioResult::Skipped => "Audio: not requested.".to_string(),
        AudioResult::Done {
            backend,
            audio: AudioRef::Url(url),
            elapsed,
        } => format!("Audio ready from {backend} after {}s: {url}", elapsed.as_secs()),
        AudioResult::Done {
            backend,
            audio: AudioRef::Bytes(bytes),
            elapsed,
        } => format!(
            "Audio ready from {backend} after {}s ({} bytes).",
            elapsed.as_secs(),
            bytes.len()
        ),
        AudioResult::Failed { backend, reason } => {
            format!("Audio generation failed on {backend}: {reason}")
        }
        AudioResult::TimedOut { backend, elapsed } => format!(
            "Audio not ready yet: {backend} was still working after {}s. Try `songsmith poll` later.",
            elapsed.as_secs()
        ),
        AudioResult::SubmissionFailed(reason) => format!("Audio could not be started: {reason}"),
    }
}

/// Lyrics block, audio line and hand-off link, ready for stdout.
pub fn render(report: &SongReport, handoff_url: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!("Model: {}\n\n", report.model));
    out.push_str(report.lyrics.trim_end());
    out.push_str("\n\n");
    out.push_str(&audio_summary(&report.audio));
    out.push('\n');
    if !handoff_url.is_empty() {
        out.push_str(&format!(
            "Paste the lyrics into a music studio to produce it by hand: {handoff_url}\n"
        ));
    }
    out
}

/// `mp3` unless the URL or the leading bytes say otherwise.
fn audio_extension(audio: &AudioRef) -> &'static str {
    match audio {
        AudioRef::Url(url) => {
            let path = url.split(['?', '#']).next().unwrap_or(url);
            match path.rsplit('.').next().map(str::to_ascii_lowercase).as_deref() {
                Some("wav") => "wav",
                Some("flac") => "flac",
                Some("ogg") => "ogg",
                Some("m4a") => "m4a",
                _ => "mp3",
            }
        }
        AudioRef::Bytes(b) if b.starts_with(b"fLaC") => "flac",
        AudioRef::Bytes(b) if b.starts_with(b"RIFF") => "wav",
        AudioRef::Bytes(b) if b.starts_with(b"OggS") => "ogg",
        AudioRef::Bytes(_) => "mp3",
    }
}

fn stem(request: &GenerationRequest) -> String {
    let ts = OffsetDateTime::now_utc().unix_timestamp();
    format!("{}-{ts}", request.slug())
}

/// Write lyrics, and audio when there is some, into `dir`.
///
/// URL audio is downloaded; a failed download keeps the lyrics file.
pub async fn save(
    report: &SongReport,
    request: &GenerationRequest,
    dir: &Path,
    http: &reqwest::Client,
) -> anyhow::Result<SavedFiles> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("create dir {}", dir.display()))?;

    let stem = stem(request);
    let mut saved = SavedFiles::default();

    let lyrics_path = dir.join(format!("{stem}.txt"));
    tokio::fs::write(&lyrics_path, report.lyrics.as_bytes())
        .await
        .with_context(|| format!("write {}", lyrics_path.display()))?;
    saved.lyrics = Some(lyrics_path);

    if let AudioResult::Done { audio, .. } = &report.audio {
        let audio_path = dir.join(format!("{stem}.{}", audio_extension(audio)));
        let bytes = match audio {
            AudioRef::Bytes(b) => Some(b.clone()),
            AudioRef::Url(url) => match download(http, url).await {
                Ok(b) => Some(b),
                Err(e) => {
                    tracing::warn!(%url, error = %format!("{e:#}"), "audio download failed");
                    None
                }
            },
        };
        if let Some(bytes) = bytes {
            tokio::fs::write(&audio_path, bytes)
                .await
                .with_context(|| format!("write {}", audio_path.display()))?;
            saved.audio = Some(audio_path);
        }
    }

    Ok(saved)
}

async fn download(http: &reqwest::Client, url: &str) -> anyhow::Result<Vec<u8>> {
    let bytes = http
        .get(url)
        .send()
        .await
        .context("send audio download request")?
        .error_for_status()
        .context("audio download http status")?
        .bytes()
        .await
        .context("read audio body")?;
    Ok(bytes.to_vec())
}
