//! Compose manifest access and mutation
//!
//! Reads the deployed services out of the compose file and, on approval,
//! rewrites a single service's image reference. The rewrite goes through a
//! temporary file in the same directory followed by an atomic rename, so an
//! interrupted run leaves the previous manifest intact. Key order of the
//! original document is preserved.

use serde_yaml::Value;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use tagwatch_core::image::ImageReference;
use thiserror::Error;
use tracing::info;

/// Errors raised by manifest access and mutation
#[derive(Debug, Error)]
pub enum ComposeError {
    /// Reading or replacing the manifest file failed
    #[error("failed to read or write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The manifest is not valid YAML; nothing was written
    #[error("manifest is not valid YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// The repository has no entry in the image-to-service map
    #[error("no service mapped for repository {0}")]
    UnknownService(String),

    /// The mapped service is absent from the manifest's `services` mapping
    #[error("service {0} not present in manifest")]
    ServiceNotFound(String),
}

/// One `services` entry that names an image.
#[derive(Debug, Clone)]
pub struct DeployedService {
    pub name: String,
    pub image: ImageReference,
}

/// Lists the manifest services that carry an `image` field.
///
/// Entries without one (build-only services, extensions) are skipped, as is
/// anything that is not a mapping.
pub fn deployed_services(path: &Path) -> Result<Vec<DeployedService>, ComposeError> {
    let doc = load(path)?;
    let mut services = Vec::new();

    if let Some(Value::Mapping(entries)) = doc.get("services") {
        for (name, body) in entries {
            let (Some(name), Some(body)) = (name.as_str(), body.as_mapping()) else {
                continue;
            };
            if let Some(image) = body.get("image").and_then(Value::as_str) {
                services.push(DeployedService {
                    name: name.to_string(),
                    image: ImageReference::parse(image),
                });
            }
        }
    }

    Ok(services)
}

/// Rewrites the image of the service mapped to `repository` to
/// `repository:version`.
///
/// Nothing touches the file until every step up to the field assignment has
/// succeeded, and the final write replaces the manifest atomically. Returns
/// the resolved service name.
pub fn apply(
    path: &Path,
    service_map: &HashMap<String, String>,
    repository: &str,
    version: &str,
) -> Result<String, ComposeError> {
    let service_name = service_map
        .get(repository)
        .ok_or_else(|| ComposeError::UnknownService(repository.to_string()))?;

    let mut doc = load(path)?;

    let service = doc
        .get_mut("services")
        .and_then(Value::as_mapping_mut)
        .and_then(|services| services.get_mut(service_name.as_str()))
        .and_then(Value::as_mapping_mut)
        .ok_or_else(|| ComposeError::ServiceNotFound(service_name.clone()))?;

    let full_image = format!("{repository}:{version}");
    service.insert(Value::from("image"), Value::from(full_image.clone()));

    write_atomic(path, &doc)?;

    info!("Service {} now references {}", service_name, full_image);
    Ok(service_name.clone())
}

fn load(path: &Path) -> Result<Value, ComposeError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ComposeError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(serde_yaml::from_str(&raw)?)
}

/// Serializes the document to a temp file next to the target, fsyncs, and
/// renames it over the manifest.
fn write_atomic(path: &Path, doc: &Value) -> Result<(), ComposeError> {
    let serialized = serde_yaml::to_string(doc)?;
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    let dir = dir.unwrap_or_else(|| Path::new("."));

    let io_err = |source: std::io::Error| ComposeError::Io {
        path: path.display().to_string(),
        source,
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(serialized.as_bytes()).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;

    Ok(())
}
