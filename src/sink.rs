use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::json;
use tracing::info;

use crate::models::{Listing, RunMetadata};

/// Writes a finished run as pretty-printed JSON. The orchestrator knows
/// nothing about this format; it only hands over listings plus metadata.
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub async fn persist(&self, metadata: &RunMetadata, listings: &[Listing]) -> Result<()> {
        let payload = json!({
            "metadata": metadata,
            "listings": listings,
        });
        let serialized =
            serde_json::to_string_pretty(&payload).context("Failed to serialize scrape results")?;
        tokio::fs::write(&self.path, serialized)
            .await
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        info!(path = %self.path.display(), count = metadata.count, "saved scrape results");
        Ok(())
    }
}
