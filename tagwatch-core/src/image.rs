//! Container image references

use serde::{Deserialize, Serialize};
use std::fmt;

/// Namespace assumed when a reference carries no `/` separator.
pub const DEFAULT_NAMESPACE: &str = "library";

/// Tag assumed when a reference carries no `:` separator.
pub const DEFAULT_TAG: &str = "latest";

/// A parsed `repository[:tag]` image reference, as written in a deployment
/// manifest.
///
/// Immutable once parsed. An update never mutates a field here; it replaces
/// the whole `image` string in the manifest instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageReference {
    pub namespace: String,
    pub repository: String,
    pub tag: String,
}

impl ImageReference {
    /// Parses a manifest-style reference like `nginx`, `nginx:1.25` or
    /// `grafana/grafana:10.1.0`.
    ///
    /// A missing namespace defaults to `library`, a missing tag to `latest`.
    pub fn parse(reference: &str) -> Self {
        let (repo_part, tag) = match reference.split_once(':') {
            Some((repo, tag)) => (repo, tag.to_string()),
            None => (reference, DEFAULT_TAG.to_string()),
        };

        let (namespace, repository) = match repo_part.split_once('/') {
            Some((namespace, repository)) => (namespace.to_string(), repository.to_string()),
            None => (DEFAULT_NAMESPACE.to_string(), repo_part.to_string()),
        };

        Self {
            namespace,
            repository,
            tag,
        }
    }

    /// The repository string in the form the manifest used, without the
    /// injected default namespace. This is the form carried in callback
    /// payloads and looked up in the image-to-service map.
    pub fn repository_path(&self) -> String {
        if self.namespace == DEFAULT_NAMESPACE {
            self.repository.clone()
        } else {
            format!("{}/{}", self.namespace, self.repository)
        }
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository_path(), self.tag)
    }
}
