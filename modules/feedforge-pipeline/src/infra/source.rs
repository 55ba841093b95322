// File-backed acquisition: a crawler drops a JSON array of raw items and
// the pipeline picks it up from there.

use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::info;

use feedforge_common::RawItem;

use crate::traits::ContentSource;

pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ContentSource for JsonFileSource {
    async fn acquire(&self) -> Result<Vec<RawItem>> {
        let body = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("reading {}", self.path.display()))?;
        let items: Vec<RawItem> = serde_json::from_str(&body)
            .with_context(|| format!("parsing {}", self.path.display()))?;
        info!(path = %self.path.display(), items = items.len(), "loaded raw items");
        Ok(items)
    }
}
