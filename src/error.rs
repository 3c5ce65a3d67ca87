use thiserror::Error;

/// Failures surfaced by the lyric and audio clients.
///
/// Timeouts and remote job errors are not here: they are terminal
/// outcomes of the poll loop (`audio::JobOutcome`), not failed calls.
#[derive(Error, Debug)]
pub enum Error {
    #[error("missing credential {0} (checked secrets file, environment and .env)")]
    MissingCredential(String),

    #[error("model listing failed: {0}")]
    ProviderList(String),

    #[error("text generation failed: {0}")]
    ProviderCall(String),

    #[error("{backend}: submission rejected: {message}")]
    Submission { backend: String, message: String },

    #[error("{backend}: status check failed: {message}")]
    Poll { backend: String, message: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("config: {0}")]
    Config(String),
}

impl Error {
    pub fn submission(backend: &str, message: impl ToString) -> Self {
        Error::Submission {
            backend: backend.to_string(),
            message: message.to_string(),
        }
    }

    pub fn poll(backend: &str, message: impl ToString) -> Self {
        Error::Poll {
            backend: backend.to_string(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_backend() {
        let err = Error::submission("suno", "402 Payment Required");
        assert_eq!(err.to_string(), "suno: submission rejected: 402 Payment Required");

        let err = Error::poll("replicate", "connection reset");
        assert!(err.to_string().starts_with("replicate: status check failed"));
    }

    #[test]
    fn test_missing_credential_names_key() {
        let err = Error::MissingCredential("GEMINI_API_KEY".into());
        assert!(err.to_string().contains("GEMINI_API_KEY"));
    }
}
