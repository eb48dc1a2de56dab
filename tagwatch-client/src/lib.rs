//! Tagwatch HTTP Clients
//!
//! Thin, typed clients for the two external APIs the watcher talks to:
//!
//! - [`RegistryClient`]: container-registry tag listing
//! - [`BotClient`]: chat-bot messaging, update feed, and callback
//!   acknowledgment
//!
//! Both follow the same shape: a base URL plus a shared `reqwest::Client`,
//! with responses checked for status and deserialized into typed DTOs.
//!
//! # Example
//!
//! ```no_run
//! use tagwatch_client::RegistryClient;
//! use tagwatch_core::image::ImageReference;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tagwatch_client::ClientError> {
//!     let registry = RegistryClient::new("https://registry.hub.docker.com");
//!     let image = ImageReference::parse("nginx:1.25.3");
//!
//!     let tags = registry.list_tags(&image, None).await?;
//!     println!("{} tag(s) fetched", tags.len());
//!     Ok(())
//! }
//! ```

pub mod bot;
pub mod error;
pub mod registry;

pub use bot::{BotClient, CallbackQuery, FeedUnit, User};
pub use error::{ClientError, Result};
pub use registry::RegistryClient;

use serde::de::DeserializeOwned;

/// Checks the status code and deserializes the JSON body, or maps the
/// failure into a [`ClientError`].
pub(crate) async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();

    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(ClientError::api_error(status.as_u16(), error_text));
    }

    response
        .json()
        .await
        .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
}

/// Checks the status code for calls whose body we do not need.
pub(crate) async fn handle_empty_response(response: reqwest::Response) -> Result<()> {
    let status = response.status();

    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(ClientError::api_error(status.as_u16(), error_text));
    }

    Ok(())
}
