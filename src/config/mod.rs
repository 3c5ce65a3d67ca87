use crate::audio::PollPolicy;
use crate::error::Error;
use anyhow::Context;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod defaults;
pub mod secrets;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub audio: AudioConfig,
    pub song: SongConfig,
    pub credentials: CredentialsConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    /// Pin a model name and skip catalog-based selection.
    pub model: Option<String>,
    /// Preferred substring when picking from the model catalog.
    pub fast_marker: String,
    /// Second-choice substring.
    pub general_marker: String,
    /// Used when the catalog has neither, or cannot be listed.
    pub fallback_model: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Suno,
    Replicate,
    Huggingface,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Suno => "suno",
            BackendKind::Replicate => "replicate",
            BackendKind::Huggingface => "huggingface",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Backends to try, in fallback order. Empty disables audio generation.
    pub backends: Vec<BackendKind>,
    pub poll_interval_secs: u64,
    pub timeout_secs: u64,
    /// Consecutive failed status checks tolerated before giving up (0 = until timeout).
    pub max_consecutive_errors: u32,
    pub suno: SunoConfig,
    pub replicate: ReplicateConfig,
    pub huggingface: HuggingFaceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SunoConfig {
    /// Base URL of a suno-api compatible gateway.
    pub base_url: String,
    /// Netscape cookie file; used when no `SUNO_COOKIE` credential is set.
    pub cookies: Option<PathBuf>,
    pub make_instrumental: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicateConfig {
    pub base_url: String,
    /// Model version hash passed as `version` in prediction requests.
    pub version: String,
    pub model_version: String,
    pub duration_secs: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HuggingFaceConfig {
    pub base_url: String,
    pub model: String,
    /// Limit for one inference call; never more than `audio.timeout_secs`.
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SongConfig {
    /// Language line appended to the lyrics prompt.
    pub language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Managed secret store. Defaults to `secrets.toml` beside the config file.
    pub secrets_file: Option<PathBuf>,
    /// Local fallback read after the process environment.
    pub dotenv_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Where lyrics and audio are written. Nothing is saved when unset.
    pub dir: Option<PathBuf>,
    /// Link printed after the lyrics for manual music creation.
    pub handoff_url: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::GEMINI_BASE_URL.to_string(),
            model: None,
            fast_marker: defaults::FAST_MARKER.to_string(),
            general_marker: defaults::GENERAL_MARKER.to_string(),
            fallback_model: defaults::FALLBACK_MODEL.to_string(),
            request_timeout_secs: 60,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            backends: Vec::new(),
            poll_interval_secs: defaults::POLL_INTERVAL_SECS,
            timeout_secs: defaults::POLL_TIMEOUT_SECS,
            max_consecutive_errors: defaults::MAX_CONSECUTIVE_POLL_ERRORS,
            suno: SunoConfig::default(),
            replicate: ReplicateConfig::default(),
            huggingface: HuggingFaceConfig::default(),
        }
    }
}

impl Default for SunoConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::SUNO_BASE_URL.to_string(),
            cookies: None,
            make_instrumental: false,
        }
    }
}

impl Default for ReplicateConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::REPLICATE_BASE_URL.to_string(),
            version: defaults::REPLICATE_MUSICGEN_VERSION.to_string(),
            model_version: "stereo-large".to_string(),
            duration_secs: 30,
        }
    }
}

impl Default for HuggingFaceConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::HF_BASE_URL.to_string(),
            model: defaults::HF_MODEL.to_string(),
            request_timeout_secs: defaults::HF_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Default for SongConfig {
    fn default() -> Self {
        Self {
            language: "English (Lyrics), English (Style Tags).".to_string(),
        }
    }
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            secrets_file: None,
            dotenv_file: PathBuf::from(".env"),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: None,
            handoff_url: defaults::HANDOFF_URL.to_string(),
        }
    }
}

impl AudioConfig {
    pub fn poll_policy(&self) -> crate::error::Result<PollPolicy> {
        if self.poll_interval_secs == 0 {
            return Err(Error::Config("audio.poll_interval_secs must be at least 1".into()));
        }
        if self.timeout_secs < self.poll_interval_secs {
            return Err(Error::Config(format!(
                "audio.timeout_secs ({}) is shorter than audio.poll_interval_secs ({})",
                self.timeout_secs, self.poll_interval_secs
            )));
        }
        Ok(PollPolicy {
            interval: Duration::from_secs(self.poll_interval_secs),
            timeout: Duration::from_secs(self.timeout_secs),
            max_consecutive_errors: self.max_consecutive_errors,
        })
    }

    /// Per-call limit for the Hugging Face inference request, capped by the job budget.
    pub fn huggingface_request_timeout(&self) -> Duration {
        let secs = self.huggingface.request_timeout_secs.min(self.timeout_secs).max(1);
        Duration::from_secs(secs)
    }
}

impl CredentialsConfig {
    /// Secret store location: explicit path, else `secrets.toml` next to the config file.
    pub fn secrets_path(&self, config_path: &Path) -> PathBuf {
        match &self.secrets_file {
            Some(p) => p.clone(),
            None => config_path
                .parent()
                .map(|d| d.join("secrets.toml"))
                .unwrap_or_else(|| PathBuf::from("secrets.toml")),
        }
    }
}

pub fn save(cfg: &Config, override_path: Option<&Path>) -> anyhow::Result<()> {
    let path = match override_path {
        Some(p) => p.to_path_buf(),
        None => default_config_path()?,
    };
    write_config(cfg, &path)
}

fn write_config(cfg: &Config, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create dir {}", parent.display()))?;
    }
    let raw = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(path, raw).with_context(|| format!("write {}", path.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o600));
    }
    Ok(())
}

pub fn default_config_path() -> anyhow::Result<PathBuf> {
    let proj = ProjectDirs::from("dev", "songsmith", "songsmith")
        .context("ProjectDirs unavailable")?;
    Ok(proj.config_dir().join("config.toml"))
}

pub fn load(override_path: Option<&Path>) -> anyhow::Result<Config> {
    let path = match override_path {
        Some(p) => p.to_path_buf(),
        None => default_config_path()?,
    };

    if !path.exists() {
        let cfg = defaults::defaults();
        write_config(&cfg, &path).context("write default config")?;
        return Ok(cfg);
    }

    let raw = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let cfg = toml::from_str::<Config>(&raw).with_context(|| format!("parse {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let cfg = load(Some(&path)).unwrap();
        assert!(path.exists());
        assert!(cfg.audio.backends.is_empty());
        assert_eq!(cfg.llm.fast_marker, "flash");

        // Reloading the written file yields the same values.
        let again = load(Some(&path)).unwrap();
        assert_eq!(again.audio.timeout_secs, cfg.audio.timeout_secs);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[audio]
backends = ["replicate", "suno"]
poll_interval_secs = 2

[llm]
model = "models/gemini-1.5-flash"
"#,
        )
        .unwrap();

        let cfg = load(Some(&path)).unwrap();
        assert_eq!(cfg.audio.backends, vec![BackendKind::Replicate, BackendKind::Suno]);
        assert_eq!(cfg.audio.poll_interval_secs, 2);
        assert_eq!(cfg.audio.timeout_secs, defaults::POLL_TIMEOUT_SECS);
        assert_eq!(cfg.llm.model.as_deref(), Some("models/gemini-1.5-flash"));
        assert_eq!(cfg.llm.fallback_model, defaults::FALLBACK_MODEL);
    }

    #[test]
    fn test_save_round_trips_backends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut cfg = Config::default();
        cfg.audio.backends = vec![BackendKind::Huggingface];
        save(&cfg, Some(&path)).unwrap();

        let loaded = load(Some(&path)).unwrap();
        assert_eq!(loaded.audio.backends, vec![BackendKind::Huggingface]);
    }

    #[test]
    fn test_poll_policy_validation() {
        let mut audio = AudioConfig::default();
        let policy = audio.poll_policy().unwrap();
        assert_eq!(policy.interval, Duration::from_secs(3));
        assert_eq!(policy.timeout, Duration::from_secs(180));

        audio.poll_interval_secs = 0;
        assert!(matches!(audio.poll_policy(), Err(Error::Config(_))));

        audio.poll_interval_secs = 10;
        audio.timeout_secs = 5;
        assert!(matches!(audio.poll_policy(), Err(Error::Config(_))));
    }

    #[test]
    fn test_huggingface_timeout_never_exceeds_job_budget() {
        let mut audio = AudioConfig::default();
        assert_eq!(audio.huggingface_request_timeout(), Duration::from_secs(120));

        audio.huggingface.request_timeout_secs = 300;
        assert_eq!(audio.huggingface_request_timeout(), Duration::from_secs(180));

        audio.timeout_secs = 60;
        assert_eq!(audio.huggingface_request_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_secrets_path_defaults_next_to_config() {
        let creds = CredentialsConfig::default();
        let p = creds.secrets_path(Path::new("/etc/songsmith/config.toml"));
        assert_eq!(p, PathBuf::from("/etc/songsmith/secrets.toml"));

        let creds = CredentialsConfig {
            secrets_file: Some(PathBuf::from("/run/secrets/songsmith.toml")),
            ..CredentialsConfig::default()
        };
        assert_eq!(
            creds.secrets_path(Path::new("/etc/songsmith/config.toml")),
            PathBuf::from("/run/secrets/songsmith.toml")
        );
    }
}
