use super::Config;

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const FAST_MARKER: &str = "flash";
pub const GENERAL_MARKER: &str = "pro";
pub const FALLBACK_MODEL: &str = "models/gemini-pro";

// Observed in practice: 2-3s between checks, 120-180s overall.
pub const POLL_INTERVAL_SECS: u64 = 3;
pub const POLL_TIMEOUT_SECS: u64 = 180;
pub const MAX_CONSECUTIVE_POLL_ERRORS: u32 = 5;

pub const SUNO_BASE_URL: &str = "http://localhost:3000";
pub const REPLICATE_BASE_URL: &str = "https://api.replicate.com";
pub const REPLICATE_MUSICGEN_VERSION: &str =
    "671ac645ce5e552cc63a54a2bbff63fcf798043055d2dac5fc9e36a837eedcfb";
pub const HF_BASE_URL: &str = "https://api-inference.huggingface.co";
pub const HF_MODEL: &str = "facebook/musicgen-small";
pub const HF_REQUEST_TIMEOUT_SECS: u64 = 120;

pub const HANDOFF_URL: &str = "https://suno.com/create";

pub const GEMINI_API_KEY: &str = "GEMINI_API_KEY";
pub const SUNO_COOKIE: &str = "SUNO_COOKIE";
pub const REPLICATE_API_TOKEN: &str = "REPLICATE_API_TOKEN";
pub const HF_TOKEN: &str = "HF_TOKEN";

/// Config written on first run.
pub fn defaults() -> Config {
    Config::default()
}
