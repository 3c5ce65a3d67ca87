use crate::error::{Error, Result};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use std::time::Duration;

const AGENT: &str = concat!("songsmith/", env!("CARGO_PKG_VERSION"));

pub fn client(timeout: Duration, headers: Option<HeaderMap>) -> Result<reqwest::Client> {
    let mut headers = headers.unwrap_or_default();
    headers
        .entry(USER_AGENT)
        .or_insert(HeaderValue::from_static(AGENT));

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()
        .map_err(|e| Error::Config(format!("build http client: {e}")))
}

/// `"<status>: <message>"`, preferring the API's own error message.
pub async fn describe_failure(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .or_else(|| v.get("detail"))
                .or_else(|| v.get("error"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.chars().take(200).collect());
    if message.is_empty() {
        status.to_string()
    } else {
        format!("{status}: {message}")
    }
}
