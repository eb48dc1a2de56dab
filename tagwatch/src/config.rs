//! Watcher configuration
//!
//! Every external input lives here as one immutable value handed to the
//! components at construction: bot credentials, API bases, file paths, and
//! the image-to-service map. Nothing reads the environment after startup.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::PathBuf;

/// Watcher configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Bot API token
    pub bot_token: String,

    /// Chat the notices and approvals go to
    pub chat_id: String,

    /// Bot API base URL, without the token segment
    pub bot_api_base: String,

    /// Container registry base URL
    pub registry_base: String,

    /// Deployment manifest path
    pub compose_path: PathBuf,

    /// Feed cursor file path
    pub offset_path: PathBuf,

    /// Path to the image-to-service map (JSON object: repository -> service)
    pub service_map_path: PathBuf,
}

impl Config {
    /// Bot API base with the token segment appended.
    pub fn bot_url(&self) -> String {
        format!(
            "{}/bot{}",
            self.bot_api_base.trim_end_matches('/'),
            self.bot_token
        )
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.bot_token.is_empty() {
            anyhow::bail!("bot_token cannot be empty");
        }

        if self.chat_id.is_empty() {
            anyhow::bail!("chat_id cannot be empty");
        }

        for (name, url) in [
            ("bot_api_base", &self.bot_api_base),
            ("registry_base", &self.registry_base),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("{} must start with http:// or https://", name);
            }
        }

        Ok(())
    }

    /// Loads the image-to-service map.
    ///
    /// The map is deliberately external data rather than a table in code:
    /// a JSON object keyed by the repository string as written in the
    /// manifest, valued by the manifest service name.
    pub fn load_service_map(&self) -> Result<HashMap<String, String>> {
        let raw = std::fs::read_to_string(&self.service_map_path).with_context(|| {
            format!(
                "Failed to read service map {}",
                self.service_map_path.display()
            )
        })?;

        serde_json::from_str(&raw).with_context(|| {
            format!(
                "Service map {} is not a JSON object of repository -> service name",
                self.service_map_path.display()
            )
        })
    }
}
