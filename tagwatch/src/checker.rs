//! Update detector
//!
//! One pass over the deployed services: fetch candidate tags for each image,
//! keep the ones matching the deployed tag's format, and notify the operator
//! when a newer candidate exists. Registry failures count as "no data" for
//! that image; the pass continues.

use anyhow::{Context, Result};
use tagwatch_client::{BotClient, RegistryClient};
use tagwatch_core::image::ImageReference;
use tagwatch_core::pattern;
use tracing::{debug, info, warn};

use crate::compose;
use crate::config::Config;

/// Runs the detect-and-notify pass over the manifest's services.
pub struct UpdateChecker {
    config: Config,
    registry: RegistryClient,
    bot: BotClient,
}

impl UpdateChecker {
    pub fn new(config: Config) -> Self {
        let registry = RegistryClient::new(config.registry_base.clone());
        let bot = BotClient::new(config.bot_url());
        Self {
            config,
            registry,
            bot,
        }
    }

    /// Checks every deployed service once. Returns the number of update
    /// notices sent.
    pub async fn run_once(&self) -> Result<usize> {
        let services = compose::deployed_services(&self.config.compose_path)
            .context("Failed to read deployed services from manifest")?;

        info!("Checking {} service(s) for image updates", services.len());

        let mut notified = 0;
        for service in services {
            let image = &service.image;

            // The arch filter is derived per image from the deployed tag's
            // dash prefix (e.g. "arm64-1.2.3"), never carried across
            // iterations.
            let arch = arch_prefix(&image.tag);

            let tags = match self.registry.list_tags(image, arch).await {
                Ok(tags) => tags,
                Err(e) => {
                    warn!("Tag fetch failed for {}: {}", image.repository_path(), e);
                    continue;
                }
            };

            let Some(candidate) = pattern::select_candidate(&image.tag, &tags) else {
                debug!("{} is up to date ({})", service.name, image.tag);
                continue;
            };

            info!(
                "Update available for {}: {} -> {}",
                service.name, image.tag, candidate
            );

            let text = notice_text(&service.name, image, &candidate);
            if let Err(e) = self
                .bot
                .send_update_notice(
                    &self.config.chat_id,
                    &text,
                    &image.repository_path(),
                    &candidate,
                )
                .await
            {
                warn!("Failed to send update notice for {}: {}", service.name, e);
                continue;
            }

            notified += 1;
        }

        Ok(notified)
    }
}

/// The arch filter embedded in a deployed tag, if any: the part before the
/// first `-`, as in `arm64-1.2.3`.
fn arch_prefix(tag: &str) -> Option<&str> {
    tag.split_once('-').map(|(arch, _)| arch)
}

fn notice_text(service: &str, image: &ImageReference, candidate: &str) -> String {
    format!(
        "🔹 {service}: {image}\n  ⚠️ Update available: {current} → {candidate}\n",
        current = image.tag,
    )
}
