use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Pipeline stages ---

/// Stages of the digest pipeline, in execution order. The derived `Ord`
/// follows pipeline order, which is what the redo-target invariant checks
/// against (a redo target must not name a later stage).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Acquire,
    Enrich,
    Summarize,
    Validate,
    Filter,
    GroupSynthesize,
    Publish,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Acquire => write!(f, "acquire"),
            Stage::Enrich => write!(f, "enrich"),
            Stage::Summarize => write!(f, "summarize"),
            Stage::Validate => write!(f, "validate"),
            Stage::Filter => write!(f, "filter"),
            Stage::GroupSynthesize => write!(f, "group_synthesize"),
            Stage::Publish => write!(f, "publish"),
        }
    }
}

// --- Source priority ---

/// Static source ranking used for duplicate tie-breaks. Lower is better:
/// a GitHub release note beats the arXiv paper that mirrors it, and both
/// beat a repost on X.
pub fn source_priority(source_name: &str) -> u8 {
    match source_name.to_lowercase().as_str() {
        "github" => 0,
        "arxiv" => 1,
        "x" | "twitter" => 2,
        _ => 3,
    }
}

// --- Content items ---

/// Raw unit of content as handed over by the acquisition collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawItem {
    pub source_url: String,
    pub raw_text: String,
    pub source_name: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// Why an item was marked excluded from the surviving batch. Items are
/// never deleted mid-run, only flagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    NotNovel,
    DuplicateInBatch,
    DuplicateOfHistory,
    Incomplete,
}

impl std::fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExclusionReason::NotNovel => write!(f, "not_novel"),
            ExclusionReason::DuplicateInBatch => write!(f, "duplicate_in_batch"),
            ExclusionReason::DuplicateOfHistory => write!(f, "duplicate_of_history"),
            ExclusionReason::Incomplete => write!(f, "incomplete"),
        }
    }
}

/// One crawled unit of content, mutated in place by each enrichment stage.
///
/// Nullable fields double as work queues: a `None` title means "needs
/// generation", and the validator exploits this by clearing fields it
/// wants regenerated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: Uuid,
    pub source_url: String,
    pub source_name: String,
    pub title: Option<String>,
    pub raw_text: String,
    pub cleaned_text: Option<String>,
    pub tags: Option<Vec<String>>,
    /// Fixed-length embedding vector. Invariant: set only after
    /// `cleaned_text` is set.
    pub embedding: Option<Vec<f32>>,
    pub summary: Option<String>,
    pub publish_snippet: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub ingested_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excluded: Option<ExclusionReason>,
    /// Last validator verdict, attached when an item exhausts its redo
    /// budget and is forwarded anyway.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_verdict: Option<ValidationVerdict>,
}

impl ContentItem {
    pub fn from_raw(raw: RawItem) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_url: raw.source_url,
            source_name: raw.source_name,
            title: None,
            raw_text: raw.raw_text,
            cleaned_text: None,
            tags: None,
            embedding: None,
            summary: None,
            publish_snippet: None,
            published_at: raw.published_at,
            ingested_at: Utc::now(),
            excluded: None,
            last_verdict: None,
        }
    }

    /// An item is complete once every generated field is populated.
    pub fn is_complete(&self) -> bool {
        self.title.is_some()
            && self.tags.is_some()
            && self.summary.is_some()
            && self.publish_snippet.is_some()
    }

    pub fn priority(&self) -> u8 {
        source_priority(&self.source_name)
    }

    pub fn is_surviving(&self) -> bool {
        self.excluded.is_none()
    }
}

// --- Batch ---

/// The unit of work for one orchestrator run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub session_count: u32,
    pub items: Vec<ContentItem>,
    pub narratives: Vec<Narrative>,
    /// Stage to re-enter after validation, or `None` to proceed forward.
    /// Must name a stage no later than the current one.
    pub redo_target: Option<Stage>,
}

impl Batch {
    pub fn new(session_count: u32) -> Self {
        Self {
            session_count,
            items: Vec::new(),
            narratives: Vec::new(),
            redo_target: None,
        }
    }

    /// Items not marked excluded.
    pub fn surviving(&self) -> impl Iterator<Item = &ContentItem> {
        self.items.iter().filter(|i| i.is_surviving())
    }
}

// --- History window ---

/// Immutable per-run snapshot of recently persisted items, consumed by the
/// novelty and cross-history duplicate checks. Owned by the storage
/// collaborator; the core never writes through it.
#[derive(Debug, Clone, Default)]
pub struct HistoryWindow {
    pub items: Vec<ContentItem>,
}

impl HistoryWindow {
    pub fn new(items: Vec<ContentItem>) -> Self {
        Self { items }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// History items that carry an embedding (older rows may predate
    /// enrichment and are skipped, not errored).
    pub fn usable(&self) -> impl Iterator<Item = &ContentItem> {
        self.items.iter().filter(|i| i.embedding.is_some())
    }
}

// --- Validation ---

/// Per-item validation verdict: four named flags plus issue strings keyed
/// by the same four names ("title", "tags", "summary", "snippet").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub title_valid: bool,
    pub tags_valid: bool,
    pub summary_valid: bool,
    pub snippet_valid: bool,
    #[serde(default)]
    pub issues: BTreeMap<String, String>,
}

impl ValidationVerdict {
    pub fn all_valid() -> Self {
        Self {
            title_valid: true,
            tags_valid: true,
            summary_valid: true,
            snippet_valid: true,
            issues: BTreeMap::new(),
        }
    }

    /// Conservative fallback when the external verdict cannot be parsed:
    /// every flag false, so forward progress is blocked rather than
    /// unvalidated content accepted.
    pub fn parse_failure() -> Self {
        let issue = "failed to validate due to parsing error".to_string();
        Self {
            title_valid: false,
            tags_valid: false,
            summary_valid: false,
            snippet_valid: false,
            issues: ["title", "tags", "summary", "snippet"]
                .into_iter()
                .map(|k| (k.to_string(), issue.clone()))
                .collect(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.title_valid && self.tags_valid && self.summary_valid && self.snippet_valid
    }
}

// --- Topic groups & narratives ---

/// Relationship metadata computed per synthesis group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupRelationships {
    /// Tags appearing in more than one member.
    pub shared_tags: Vec<String>,
    /// Title pairs sharing a methodological keyword.
    pub methodological_links: Vec<(String, String)>,
    /// Member titles ordered by publication date, oldest first. Items
    /// without a date are left out of the ordering.
    pub chronology: Vec<String>,
}

/// A cluster of related items eligible for synthesis. Created by the
/// grouper, consumed by the synthesis stage, then discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicGroup {
    pub dominant_tag: String,
    pub member_ids: Vec<Uuid>,
    pub relationships: GroupRelationships,
}

/// A synthesized cross-item narrative, persisted by the storage
/// collaborator and consumed by the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Narrative {
    pub id: Uuid,
    pub tag: String,
    pub body: String,
    pub member_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}
