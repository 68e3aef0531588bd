mod env;
mod types;

#[cfg(test)]
mod tests;

pub use types::*;

use std::path::Path;

use anyhow::Context;

use crate::secret::Secret;

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Read API keys from `MEDASSIST_*_API_KEY` variables.
    pub fn resolve_secrets(&mut self) {
        let read = |key: &str| {
            std::env::var(key)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(Secret::new)
        };
        self.secrets = ResolvedSecrets {
            gemini_api_key: read("MEDASSIST_GEMINI_API_KEY"),
            openai_api_key: read("MEDASSIST_OPENAI_API_KEY"),
            pinecone_api_key: read("MEDASSIST_PINECONE_API_KEY"),
            qdrant_api_key: read("MEDASSIST_QDRANT_API_KEY"),
        };
    }
}
