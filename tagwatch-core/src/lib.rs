//! Tagwatch Core
//!
//! Domain types and pure logic for the image update watcher.
//!
//! This crate contains:
//! - Image references: parsed `repository[:tag]` strings
//! - Tag-format matching: structural compatibility and candidate selection
//! - Callback actions: decoding the approve/reject button payloads

pub mod callback;
pub mod image;
pub mod pattern;
