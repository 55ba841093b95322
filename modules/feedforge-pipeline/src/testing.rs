// Test doubles for the digest pipeline.
//
// Four mocks matching the four trait boundaries:
// - MockSource (ContentSource) — canned raw items
// - MockAi (AiService) — routes on the prompt's instruction line,
//   deterministic hash-based embeddings with per-text overrides
// - MockStore (ItemStore) — in-memory history + recorded writes
// - MockPublisher (Publisher) — records what was published
//
// Plus helpers for building items at each lifecycle stage.

use std::collections::{HashMap, VecDeque};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;

use feedforge_common::{ContentItem, Narrative, RawItem, ValidationVerdict};

use crate::traits::{AiService, ContentSource, ItemStore, Publisher};

/// Standard embedding dimension for generated test vectors.
pub const TEST_EMBEDDING_DIM: usize = 64;

// ---------------------------------------------------------------------------
// Item builders
// ---------------------------------------------------------------------------

pub fn raw_item(text: &str, source: &str) -> RawItem {
    RawItem {
        source_url: format!("https://{source}.example/{}", text.replace(' ', "-")),
        raw_text: text.to_string(),
        source_name: source.to_string(),
        published_at: None,
    }
}

/// An item as it looks after the enrich stage: cleaned, titled, tagged,
/// embedded, but not yet summarized.
pub fn enriched_item(title: &str, source: &str, embedding: Vec<f32>) -> ContentItem {
    let mut item = ContentItem::from_raw(raw_item(title, source));
    item.cleaned_text = Some(item.raw_text.clone());
    item.title = Some(title.to_string());
    item.tags = Some(vec!["general".to_string()]);
    item.embedding = Some(embedding);
    item
}

/// A fully complete item, ready for validation and publishing.
pub fn complete_item(
    title: &str,
    source: &str,
    embedding: Vec<f32>,
    tags: Vec<&str>,
) -> ContentItem {
    let mut item = enriched_item(title, source, embedding);
    item.tags = Some(tags.into_iter().map(String::from).collect());
    item.summary = Some(format!("Summary of {title}"));
    item.publish_snippet = Some(format!("Snippet for {title}"));
    item
}

// ---------------------------------------------------------------------------
// MockSource
// ---------------------------------------------------------------------------

/// Canned acquisition results.
pub struct MockSource {
    items: Vec<RawItem>,
}

impl MockSource {
    pub fn new(items: Vec<RawItem>) -> Self {
        Self { items }
    }
}

#[async_trait]
impl ContentSource for MockSource {
    async fn acquire(&self) -> Result<Vec<RawItem>> {
        Ok(self.items.clone())
    }
}

// ---------------------------------------------------------------------------
// MockAi
// ---------------------------------------------------------------------------

/// Routes each completion on the fixed instruction line its prompt opens
/// with. Verdict responses pop from a queue so a test can script the
/// validator pass by pass; an empty queue means "everything is valid".
/// Embeddings are hash-derived from the input text unless overridden, so
/// identical texts collide and distinct texts land far apart.
pub struct MockAi {
    title: Option<String>,
    tags: String,
    summary: String,
    snippet: String,
    narrative: String,
    verdicts: Mutex<VecDeque<String>>,
    embeddings: HashMap<String, Vec<f32>>,
    fail_completions: bool,
    fail_embeddings: bool,
    prompts: Mutex<Vec<String>>,
}

impl MockAi {
    pub fn new() -> Self {
        Self {
            title: None,
            tags: "llm, inference, rust".to_string(),
            summary: "A generated summary.".to_string(),
            snippet: "A generated snippet.".to_string(),
            narrative: "A generated narrative.".to_string(),
            verdicts: Mutex::new(VecDeque::new()),
            embeddings: HashMap::new(),
            fail_completions: false,
            fail_embeddings: false,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Fix the headline response. Without this, headlines echo the start
    /// of the prompted content so distinct items stay distinguishable.
    pub fn with_title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn with_tags(mut self, tags: &str) -> Self {
        self.tags = tags.to_string();
        self
    }

    pub fn with_narrative(mut self, narrative: &str) -> Self {
        self.narrative = narrative.to_string();
        self
    }

    /// Queue a verdict for the next validation call. Serialized here so
    /// the parser path is exercised end to end.
    pub fn push_verdict(self, verdict: &ValidationVerdict) -> Self {
        self.push_raw_verdict(&serde_json::to_string(verdict).unwrap())
    }

    /// Queue a raw verdict payload, malformed ones included.
    pub fn push_raw_verdict(self, raw: &str) -> Self {
        self.verdicts.lock().unwrap().push_back(raw.to_string());
        self
    }

    pub fn on_embedding(mut self, text: &str, embedding: Vec<f32>) -> Self {
        self.embeddings.insert(text.to_string(), embedding);
        self
    }

    pub fn failing_completions(mut self) -> Self {
        self.fail_completions = true;
        self
    }

    pub fn failing_embeddings(mut self) -> Self {
        self.fail_embeddings = true;
        self
    }

    /// Every prompt seen, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    fn embedding_for(&self, text: &str) -> Vec<f32> {
        self.embeddings
            .get(text)
            .cloned()
            .unwrap_or_else(|| hashed_embedding(text))
    }
}

impl Default for MockAi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AiService for MockAi {
    async fn complete(&self, prompt: &str) -> Result<String> {
        if self.fail_completions {
            bail!("MockAi: completions configured to fail");
        }
        self.prompts.lock().unwrap().push(prompt.to_string());

        if prompt.starts_with("Write a concise") {
            Ok(self
                .title
                .clone()
                .unwrap_or_else(|| derived_title(prompt)))
        } else if prompt.starts_with("List 3-6") {
            Ok(self.tags.clone())
        } else if prompt.starts_with("Summarize the following") {
            Ok(self.summary.clone())
        } else if prompt.starts_with("Write a two-sentence") {
            Ok(self.snippet.clone())
        } else if prompt.starts_with("Write a single analysis") {
            Ok(self.narrative.clone())
        } else if prompt.starts_with("Check the generated") {
            let queued = self.verdicts.lock().unwrap().pop_front();
            Ok(queued.unwrap_or_else(|| {
                serde_json::to_string(&ValidationVerdict::all_valid()).unwrap()
            }))
        } else {
            bail!("MockAi: unrecognized prompt: {prompt}");
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.fail_embeddings {
            bail!("MockAi: embeddings configured to fail");
        }
        Ok(self.embedding_for(text))
    }

    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if self.fail_embeddings {
            bail!("MockAi: embeddings configured to fail");
        }
        Ok(texts.iter().map(|t| self.embedding_for(t)).collect())
    }
}

/// First few words of the prompted content, standing in for a headline.
fn derived_title(prompt: &str) -> String {
    let body = prompt.split_once("\n\n").map(|(_, b)| b).unwrap_or(prompt);
    body.split_whitespace().take(5).collect::<Vec<_>>().join(" ")
}

/// Deterministic pseudo-random unit-free vector seeded from the text.
fn hashed_embedding(text: &str) -> Vec<f32> {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    let mut seed = hasher.finish() | 1;
    (0..TEST_EMBEDDING_DIM)
        .map(|_| {
            seed = seed
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((seed >> 33) as f32 / (1u64 << 30) as f32) - 1.0
        })
        .collect()
}

// ---------------------------------------------------------------------------
// MockStore
// ---------------------------------------------------------------------------

/// In-memory store: a fixed history window plus recorded writes.
pub struct MockStore {
    history: Vec<ContentItem>,
    prune_count: u64,
    persisted: Mutex<Vec<ContentItem>>,
    narratives: Mutex<Vec<Narrative>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self {
            history: Vec::new(),
            prune_count: 0,
            persisted: Mutex::new(Vec::new()),
            narratives: Mutex::new(Vec::new()),
        }
    }

    pub fn with_history(mut self, items: Vec<ContentItem>) -> Self {
        self.history = items;
        self
    }

    pub fn with_prune_count(mut self, count: u64) -> Self {
        self.prune_count = count;
        self
    }

    pub fn persisted_items(&self) -> Vec<ContentItem> {
        self.persisted.lock().unwrap().clone()
    }

    pub fn persisted_narratives(&self) -> Vec<Narrative> {
        self.narratives.lock().unwrap().clone()
    }
}

impl Default for MockStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ItemStore for MockStore {
    async fn recent_items(&self, _days: i64) -> Result<Vec<ContentItem>> {
        Ok(self.history.clone())
    }

    async fn persist_items(&self, items: &[ContentItem]) -> Result<()> {
        self.persisted.lock().unwrap().extend_from_slice(items);
        Ok(())
    }

    async fn persist_narrative(&self, narrative: &Narrative) -> Result<()> {
        self.narratives.lock().unwrap().push(narrative.clone());
        Ok(())
    }

    async fn prune(&self, _days: i64) -> Result<u64> {
        Ok(self.prune_count)
    }
}

// ---------------------------------------------------------------------------
// MockPublisher
// ---------------------------------------------------------------------------

/// Records each publish call's payload.
pub struct MockPublisher {
    published: Mutex<Vec<(Vec<ContentItem>, Vec<Narrative>)>>,
}

impl MockPublisher {
    pub fn new() -> Self {
        Self {
            published: Mutex::new(Vec::new()),
        }
    }

    pub fn published(&self) -> Vec<(Vec<ContentItem>, Vec<Narrative>)> {
        self.published.lock().unwrap().clone()
    }
}

impl Default for MockPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Publisher for MockPublisher {
    async fn publish(&self, items: &[ContentItem], narratives: &[Narrative]) -> Result<()> {
        self.published
            .lock()
            .unwrap()
            .push((items.to_vec(), narratives.to_vec()));
        Ok(())
    }
}
