// Trait abstractions for the orchestrator's collaborators.
//
// All I/O sits behind these four seams: acquisition, AI generation,
// durable storage, and presentation. The core is constructed against the
// traits, which keeps `cargo test` free of networks and databases.

use anyhow::Result;
use async_trait::async_trait;

use feedforge_common::{ContentItem, Narrative, RawItem};

// ---------------------------------------------------------------------------
// ContentSource — acquisition collaborator
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Raw items for this run. No dedup or ordering guarantees.
    async fn acquire(&self) -> Result<Vec<RawItem>>;
}

// ---------------------------------------------------------------------------
// AiService — completion/embedding collaborator
// ---------------------------------------------------------------------------

#[async_trait]
pub trait AiService: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Batch embedding; result order matches input order.
    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;
}

// ---------------------------------------------------------------------------
// ItemStore — storage collaborator
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Items persisted within the last `days` days — the history window
    /// snapshot for novelty and cross-history dedup.
    async fn recent_items(&self, days: i64) -> Result<Vec<ContentItem>>;

    /// Upsert a batch of items. Called once per run, after the publish
    /// stage's batch has fully settled.
    async fn persist_items(&self, items: &[ContentItem]) -> Result<()>;

    async fn persist_narrative(&self, narrative: &Narrative) -> Result<()>;

    /// Drop items older than the retention window. Returns rows removed.
    async fn prune(&self, days: i64) -> Result<u64>;
}

// ---------------------------------------------------------------------------
// Publisher — presentation collaborator (read-only consumer)
// ---------------------------------------------------------------------------

#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, items: &[ContentItem], narratives: &[Narrative]) -> Result<()>;
}
