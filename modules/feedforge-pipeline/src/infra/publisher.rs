// Digest presentation: one JSON document per run, written to a local
// directory. Downstream rendering consumes these files read-only.

use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use feedforge_common::{ContentItem, Narrative};

use crate::traits::Publisher;

pub struct FilePublisher {
    dir: PathBuf,
}

#[derive(Serialize)]
struct Digest<'a> {
    generated_at: DateTime<Utc>,
    items: Vec<DigestItem<'a>>,
    narratives: &'a [Narrative],
}

#[derive(Serialize)]
struct DigestItem<'a> {
    title: Option<&'a str>,
    snippet: Option<&'a str>,
    tags: &'a [String],
    source_url: &'a str,
    source_name: &'a str,
}

impl FilePublisher {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl Publisher for FilePublisher {
    async fn publish(&self, items: &[ContentItem], narratives: &[Narrative]) -> Result<()> {
        let generated_at = Utc::now();
        let digest = Digest {
            generated_at,
            items: items
                .iter()
                .map(|it| DigestItem {
                    title: it.title.as_deref(),
                    snippet: it.publish_snippet.as_deref(),
                    tags: it.tags.as_deref().unwrap_or_default(),
                    source_url: &it.source_url,
                    source_name: &it.source_name,
                })
                .collect(),
            narratives,
        };

        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("creating {}", self.dir.display()))?;
        let path = self
            .dir
            .join(format!("digest-{}.json", generated_at.format("%Y%m%dT%H%M%S")));
        let body = serde_json::to_string_pretty(&digest)?;
        tokio::fs::write(&path, body)
            .await
            .with_context(|| format!("writing {}", path.display()))?;

        info!(
            path = %path.display(),
            items = items.len(),
            narratives = narratives.len(),
            "digest written"
        );
        Ok(())
    }
}
