//! Durable feed cursor
//!
//! A single integer in a plain-text file: the highest fully processed feed
//! unit id, plus one. The loop persists it before running a unit's side
//! effect, so a redelivered unit is never acted on twice. The write goes
//! through a same-directory temp file and rename; a torn cursor file would
//! otherwise reset the loop to the start of the feed.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Persistent store for the feed cursor
#[derive(Debug, Clone)]
pub struct OffsetStore {
    path: PathBuf,
}

impl OffsetStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Reads the persisted cursor. An absent file means no cursor yet
    /// (first run): the feed is fetched unfiltered.
    pub fn load(&self) -> Result<Option<i64>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read offset file {}", self.path.display())
                });
            }
        };

        let value = raw.trim().parse::<i64>().with_context(|| {
            format!(
                "Offset file {} does not contain an integer",
                self.path.display()
            )
        })?;

        Ok(Some(value))
    }

    /// Persists the cursor.
    pub fn advance(&self, next: i64) -> Result<()> {
        let dir = self.path.parent().filter(|p| !p.as_os_str().is_empty());
        let dir = dir.unwrap_or_else(|| Path::new("."));

        let context = || format!("Failed to persist offset file {}", self.path.display());

        let mut tmp = tempfile::NamedTempFile::new_in(dir).with_context(context)?;
        write!(tmp, "{next}").with_context(context)?;
        tmp.as_file().sync_all().with_context(context)?;
        tmp.persist(&self.path)
            .map_err(|e| e.error)
            .with_context(context)?;

        Ok(())
    }
}
