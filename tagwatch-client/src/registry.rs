//! Container registry tag listing

use crate::error::Result;
use crate::handle_response;
use reqwest::Client;
use serde::Deserialize;
use tagwatch_core::image::ImageReference;
use tracing::debug;

/// How many tags to request per listing. The watcher never paginates; the
/// most recent page is enough to find a compatible candidate.
const PAGE_SIZE: u32 = 100;

/// HTTP client for the registry's repository/tags API
#[derive(Debug, Clone)]
pub struct RegistryClient {
    /// Base URL of the registry (e.g., "https://registry.hub.docker.com")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    results: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

impl RegistryClient {
    /// Create a new registry client
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    /// Get the base URL of the registry
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Lists up to one page of tags for the image's repository.
    ///
    /// When an `arch` filter is given, only tag names containing it as a
    /// substring are kept.
    pub async fn list_tags(
        &self,
        image: &ImageReference,
        arch: Option<&str>,
    ) -> Result<Vec<String>> {
        let url = format!(
            "{}/v2/repositories/{}/{}/tags?page_size={}",
            self.base_url, image.namespace, image.repository, PAGE_SIZE
        );

        debug!("Fetching tags from {}", url);

        let response = self.client.get(&url).send().await?;
        let body: TagsResponse = handle_response(response).await?;

        let tags: Vec<String> = body
            .results
            .into_iter()
            .map(|entry| entry.name)
            .filter(|name| arch.is_none_or(|a| name.contains(a)))
            .collect();

        debug!(
            "Registry returned {} tag(s) for {}/{}",
            tags.len(),
            image.namespace,
            image.repository
        );

        Ok(tags)
    }
}
