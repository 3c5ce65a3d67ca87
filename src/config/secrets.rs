//! Credential lookup.
//!
//! A credential is looked up by name in the managed secret store first
//! (`secrets.toml`), then in the process environment, then in a local
//! `.env` file. Absence is not an error here; callers that cannot run
//! without a value use [`CredentialResolver::require`].

use crate::error::{Error, Result};
use anyhow::Context;
use std::collections::HashMap;
use std::path::Path;

pub trait CredentialSource: Send + Sync {
    fn label(&self) -> &str;
    fn lookup(&self, name: &str) -> Option<String>;
}

/// Flat `KEY = "value"` table, Streamlit `secrets.toml` style.
#[derive(Debug, Default)]
pub struct SecretsFile {
    values: HashMap<String, String>,
}

impl SecretsFile {
    /// A missing file is an empty store; a malformed one is an error.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw =
            std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let table: toml::Table =
            toml::from_str(&raw).with_context(|| format!("parse {}", path.display()))?;

        // Non-string entries (nested sections, numbers) are not credentials.
        let values = table
            .into_iter()
            .filter_map(|(k, v)| match v {
                toml::Value::String(s) => Some((k, s)),
                _ => None,
            })
            .collect();
        Ok(Self { values })
    }
}

impl CredentialSource for SecretsFile {
    fn label(&self) -> &str {
        "secrets file"
    }

    fn lookup(&self, name: &str) -> Option<String> {
        self.values.get(name).cloned()
    }
}

#[derive(Debug, Default)]
pub struct EnvSource;

impl CredentialSource for EnvSource {
    fn label(&self) -> &str {
        "environment"
    }

    fn lookup(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// `.env` values, read without touching the process environment.
#[derive(Debug, Default)]
pub struct DotenvFile {
    values: HashMap<String, String>,
}

impl DotenvFile {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let mut values = HashMap::new();
        let iter =
            dotenvy::from_path_iter(path).with_context(|| format!("open {}", path.display()))?;
        for item in iter {
            let (k, v) = item.with_context(|| format!("parse {}", path.display()))?;
            values.insert(k, v);
        }
        Ok(Self { values })
    }
}

impl CredentialSource for DotenvFile {
    fn label(&self) -> &str {
        ".env"
    }

    fn lookup(&self, name: &str) -> Option<String> {
        self.values.get(name).cloned()
    }
}

/// Fixed values, for wiring tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct StaticSource(pub HashMap<String, String>);

#[cfg(test)]
impl StaticSource {
    pub fn with(pairs: &[(&str, &str)]) -> Self {
        Self(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

#[cfg(test)]
impl CredentialSource for StaticSource {
    fn label(&self) -> &str {
        "static"
    }

    fn lookup(&self, name: &str) -> Option<String> {
        self.0.get(name).cloned()
    }
}

pub struct CredentialResolver {
    sources: Vec<Box<dyn CredentialSource>>,
}

impl CredentialResolver {
    pub fn new(sources: Vec<Box<dyn CredentialSource>>) -> Self {
        Self { sources }
    }

    /// Secret store, then environment, then `.env`.
    pub fn standard(secrets_path: &Path, dotenv_path: &Path) -> anyhow::Result<Self> {
        Ok(Self::new(vec![
            Box::new(SecretsFile::load(secrets_path)?),
            Box::new(EnvSource),
            Box::new(DotenvFile::load(dotenv_path)?),
        ]))
    }

    pub fn resolve(&self, name: &str) -> Option<String> {
        for source in &self.sources {
            if let Some(v) = source.lookup(name) {
                let v = v.trim();
                if !v.is_empty() {
                    tracing::debug!(credential = name, source = source.label(), "resolved credential");
                    return Some(v.to_string());
                }
            }
        }
        None
    }

    pub fn require(&self, name: &str) -> Result<String> {
        self.resolve(name)
            .ok_or_else(|| Error::MissingCredential(name.to_string()))
    }
}
