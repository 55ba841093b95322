//! Pipeline orchestrator — a directed state machine over the batch.
//!
//! acquire → enrich → summarize → validate → {enrich | summarize | filter}
//! → group_synthesize → publish. Validate is the only branching state; its
//! outgoing edge follows the validator's redo target, bounded per item so
//! the run always terminates. Storage writes happen only after the owning
//! stage has completed for the whole batch.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use futures::future;
use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use feedforge_common::{
    Batch, ContentItem, ExclusionReason, HistoryWindow, Narrative, PipelineConfig, PipelineError,
    Stage,
};

use crate::dedup::{DuplicateResolver, RemovalReason};
use crate::grouper::{ClusteringResult, RelationshipGrouper};
use crate::novelty::NoveltyEvaluator;
use crate::prompts;
use crate::stats::RunStats;
use crate::traits::{AiService, ContentSource, ItemStore, Publisher};
use crate::validator::{self, ContentValidator};

pub struct Orchestrator {
    source: Arc<dyn ContentSource>,
    ai: Arc<dyn AiService>,
    store: Arc<dyn ItemStore>,
    publisher: Arc<dyn Publisher>,
    config: PipelineConfig,
    novelty: NoveltyEvaluator,
    resolver: DuplicateResolver,
    grouper: RelationshipGrouper,
    validator: ContentValidator,
}

impl Orchestrator {
    pub fn new(
        source: Arc<dyn ContentSource>,
        ai: Arc<dyn AiService>,
        store: Arc<dyn ItemStore>,
        publisher: Arc<dyn Publisher>,
        config: PipelineConfig,
    ) -> Self {
        let novelty = NoveltyEvaluator::new(config.novelty_threshold);
        let resolver = DuplicateResolver::new(config.duplicate_threshold);
        let grouper = RelationshipGrouper::new(config.group_threshold, config.min_tag_count);
        let validator = ContentValidator::new(ai.clone());
        Self {
            source,
            ai,
            store,
            publisher,
            config,
            novelty,
            resolver,
            grouper,
            validator,
        }
    }

    /// Run the pipeline to completion for one session. A stage-level
    /// failure aborts the run before any of that stage's writes land.
    pub async fn run(&self, session_count: u32) -> Result<RunStats, PipelineError> {
        let mut stats = RunStats::default();
        let mut batch = Batch::new(session_count);
        let mut redo_counts: HashMap<Uuid, u32> = HashMap::new();

        // One immutable history snapshot per run.
        let history = HistoryWindow::new(
            self.store
                .recent_items(self.config.novelty_days)
                .await
                .context("loading history window")?,
        );
        info!(
            session = session_count,
            history = history.items.len(),
            "pipeline run starting"
        );

        let mut stage = Stage::Acquire;
        loop {
            match stage {
                Stage::Acquire => {
                    self.acquire(&mut batch, &mut stats)
                        .await
                        .map_err(|e| PipelineError::aborted(Stage::Acquire, e))?;
                    stage = Stage::Enrich;
                }
                Stage::Enrich => {
                    self.enrich(&mut batch, &mut stats)
                        .await
                        .map_err(|e| PipelineError::aborted(Stage::Enrich, e))?;
                    stage = Stage::Summarize;
                }
                Stage::Summarize => {
                    self.summarize(&mut batch, &history, &mut stats)
                        .await
                        .map_err(|e| PipelineError::aborted(Stage::Summarize, e))?;
                    stage = Stage::Validate;
                }
                Stage::Validate => {
                    self.validate(&mut batch, &mut redo_counts, &mut stats)
                        .await
                        .map_err(|e| PipelineError::aborted(Stage::Validate, e))?;
                    stage = match batch.redo_target.take() {
                        Some(target) => {
                            debug_assert!(target <= Stage::Validate);
                            info!(target = %target, "validator re-routing batch");
                            target
                        }
                        None => Stage::Filter,
                    };
                }
                Stage::Filter => {
                    self.filter(&mut batch, &history, &mut stats)
                        .map_err(|e| PipelineError::aborted(Stage::Filter, e))?;
                    stage = if batch.session_count % self.config.synthesize_interval == 0 {
                        Stage::GroupSynthesize
                    } else {
                        info!(
                            session = batch.session_count,
                            interval = self.config.synthesize_interval,
                            "skipping synthesis this session"
                        );
                        Stage::Publish
                    };
                }
                Stage::GroupSynthesize => {
                    self.group_synthesize(&mut batch, &mut stats)
                        .await
                        .map_err(|e| PipelineError::aborted(Stage::GroupSynthesize, e))?;
                    stage = Stage::Publish;
                }
                Stage::Publish => {
                    self.publish(&batch, &mut stats)
                        .await
                        .map_err(|e| PipelineError::aborted(Stage::Publish, e))?;
                    break;
                }
            }
        }

        Ok(stats)
    }

    // -----------------------------------------------------------------------
    // Stages
    // -----------------------------------------------------------------------

    async fn acquire(&self, batch: &mut Batch, stats: &mut RunStats) -> Result<()> {
        let raw = self.source.acquire().await?;
        batch.items = raw.into_iter().map(ContentItem::from_raw).collect();
        stats.items_acquired = batch.items.len() as u32;
        info!(items = batch.items.len(), "batch acquired");
        Ok(())
    }

    /// Clean text, generate missing titles/tags, embed. All-or-nothing:
    /// an AI failure fails the whole batch rather than advancing a
    /// partially enriched one.
    async fn enrich(&self, batch: &mut Batch, stats: &mut RunStats) -> Result<()> {
        for item in batch.items.iter_mut().filter(|i| i.is_surviving()) {
            if item.cleaned_text.is_none() {
                match clean_text(&item.raw_text) {
                    Some(cleaned) => item.cleaned_text = Some(cleaned),
                    None => {
                        // Junk input is an item problem, not a stage
                        // problem: exclude it and keep the batch moving.
                        warn!(item = %item.id, url = %item.source_url, "cleaning produced an empty string, excluding item");
                        item.excluded = Some(ExclusionReason::Incomplete);
                        stats.incomplete_excluded += 1;
                    }
                }
            }
        }

        // Per-item generation is independent; join it, but the batch does
        // not advance until every future settled.
        let jobs: Vec<_> = batch
            .items
            .iter()
            .enumerate()
            .filter(|(_, it)| {
                it.is_surviving() && (it.title.is_none() || it.tags.is_none())
            })
            .map(|(i, item)| {
                let ai = self.ai.clone();
                let text = item.cleaned_text.clone().unwrap_or_default();
                let need_title = item.title.is_none();
                let need_tags = item.tags.is_none();
                async move {
                    let title = if need_title {
                        Some(ai.complete(&prompts::title_prompt(&text)).await?)
                    } else {
                        None
                    };
                    let tags = if need_tags {
                        Some(parse_tags(&ai.complete(&prompts::tags_prompt(&text)).await?))
                    } else {
                        None
                    };
                    anyhow::Ok((i, title, tags))
                }
            })
            .collect();

        let generated = future::try_join_all(jobs).await?;
        stats.items_enriched += generated.len() as u32;
        for (i, title, tags) in generated {
            if let Some(title) = title {
                batch.items[i].title = Some(title.trim().to_string());
            }
            if let Some(tags) = tags {
                batch.items[i].tags = Some(tags);
            }
        }

        // Batch-embed whatever still lacks a vector (1 API call, not N).
        let pending: Vec<usize> = batch
            .items
            .iter()
            .enumerate()
            .filter(|(_, it)| it.is_surviving() && it.embedding.is_none())
            .map(|(i, _)| i)
            .collect();
        if !pending.is_empty() {
            let texts: Vec<String> = pending
                .iter()
                .map(|&i| batch.items[i].title.clone().unwrap_or_default())
                .collect();
            let embeddings = self.ai.embed_batch(texts).await?;
            if embeddings.len() != pending.len() {
                bail!(
                    "embedding batch size mismatch: asked {}, got {}",
                    pending.len(),
                    embeddings.len()
                );
            }
            for (&i, embedding) in pending.iter().zip(embeddings) {
                batch.items[i].embedding = Some(embedding);
            }
        }

        info!(items = batch.surviving().count(), "enrichment complete");
        Ok(())
    }

    /// Novelty-gate against the history window, then generate summaries
    /// and snippets for the novel items.
    async fn summarize(
        &self,
        batch: &mut Batch,
        history: &HistoryWindow,
        stats: &mut RunStats,
    ) -> Result<()> {
        for item in batch.items.iter_mut().filter(|i| i.is_surviving()) {
            if item.summary.is_some() && item.publish_snippet.is_some() {
                continue;
            }
            if item.embedding.is_none() {
                item.excluded = Some(ExclusionReason::Incomplete);
                continue;
            }
            if !self.novelty.is_novel(item, history)? {
                item.excluded = Some(ExclusionReason::NotNovel);
                stats.items_not_novel += 1;
            }
        }

        let jobs: Vec<_> = batch
            .items
            .iter()
            .enumerate()
            .filter(|(_, it)| {
                it.is_surviving() && (it.summary.is_none() || it.publish_snippet.is_none())
            })
            .map(|(i, item)| {
                let ai = self.ai.clone();
                let text = item.cleaned_text.clone().unwrap_or_default();
                let tags = item.tags.as_deref().unwrap_or_default().join(", ");
                let need_summary = item.summary.is_none();
                let need_snippet = item.publish_snippet.is_none();
                async move {
                    let summary = if need_summary {
                        Some(ai.complete(&prompts::summary_prompt(&text)).await?)
                    } else {
                        None
                    };
                    let snippet = if need_snippet {
                        Some(ai.complete(&prompts::snippet_prompt(&tags, &text)).await?)
                    } else {
                        None
                    };
                    anyhow::Ok((i, summary, snippet))
                }
            })
            .collect();

        let generated = future::try_join_all(jobs).await?;
        stats.items_summarized += generated.len() as u32;
        for (i, summary, snippet) in generated {
            if let Some(summary) = summary {
                batch.items[i].summary = Some(summary);
            }
            if let Some(snippet) = snippet {
                batch.items[i].publish_snippet = Some(snippet);
            }
        }
        Ok(())
    }

    /// Judge every complete item, clear flagged fields, and pick the
    /// earliest redo target. Items that exhaust their redo budget are
    /// forwarded with the verdict attached, never dropped.
    async fn validate(
        &self,
        batch: &mut Batch,
        redo_counts: &mut HashMap<Uuid, u32>,
        stats: &mut RunStats,
    ) -> Result<()> {
        let mut earliest: Option<Stage> = None;

        for item in batch.items.iter_mut().filter(|i| i.is_surviving()) {
            if !item.is_complete() {
                continue;
            }
            let verdict = self.validator.validate(item).await?;
            match validator::redo_target(&verdict) {
                None => {
                    item.last_verdict = None;
                }
                Some(target) => {
                    let count = redo_counts.entry(item.id).or_insert(0);
                    if *count < self.config.max_redo_cycles {
                        *count += 1;
                        match target {
                            Stage::Enrich => stats.redo_enrich += 1,
                            _ => stats.redo_summarize += 1,
                        }
                        validator::clear_flagged_fields(item, &verdict);
                        earliest = match earliest {
                            Some(e) => Some(e.min(target)),
                            None => Some(target),
                        };
                    } else {
                        stats.forced_forward += 1;
                        warn!(
                            item = %item.id,
                            issues = ?verdict.issues,
                            "validation retries exhausted, forwarding item"
                        );
                        item.last_verdict = Some(verdict);
                    }
                }
            }
        }

        batch.redo_target = earliest;
        Ok(())
    }

    /// Exclude incomplete items, then run both dedup passes over the
    /// survivors. Removal only marks; nothing leaves the batch.
    fn filter(
        &self,
        batch: &mut Batch,
        history: &HistoryWindow,
        stats: &mut RunStats,
    ) -> Result<()> {
        for item in batch.items.iter_mut().filter(|i| i.is_surviving()) {
            if !item.is_complete() {
                item.excluded = Some(ExclusionReason::Incomplete);
                stats.incomplete_excluded += 1;
            }
        }

        let survivor_indices: Vec<usize> = batch
            .items
            .iter()
            .enumerate()
            .filter(|(_, it)| it.is_surviving())
            .map(|(i, _)| i)
            .collect();
        let survivors: Vec<ContentItem> = survivor_indices
            .iter()
            .map(|&i| batch.items[i].clone())
            .collect();

        let outcome = self.resolver.resolve(&survivors, history)?;
        for (idx, reason) in &outcome.removals {
            let batch_idx = survivor_indices[*idx];
            match reason {
                RemovalReason::IntraBatch { .. } => {
                    batch.items[batch_idx].excluded = Some(ExclusionReason::DuplicateInBatch);
                    stats.duplicates_intra_batch += 1;
                }
                RemovalReason::History { .. } => {
                    batch.items[batch_idx].excluded = Some(ExclusionReason::DuplicateOfHistory);
                    stats.duplicates_cross_history += 1;
                }
            }
        }
        info!(
            removed = outcome.removed_count(),
            surviving = batch.surviving().count(),
            "dedup complete"
        );
        Ok(())
    }

    /// Cluster survivors and synthesize a narrative per eligible group.
    /// Narratives are persisted only after the whole batch generated.
    async fn group_synthesize(&self, batch: &mut Batch, stats: &mut RunStats) -> Result<()> {
        let items: Vec<ContentItem> = batch
            .surviving()
            .filter(|i| i.is_complete() && i.embedding.is_some())
            .cloned()
            .collect();

        let clusters = match self.grouper.group(&items)? {
            ClusteringResult::Empty => {
                info!("no items to group");
                return Ok(());
            }
            ClusteringResult::Clusters(clusters) => clusters,
        };
        stats.groups_formed = clusters.len() as u32;

        let groups = self.grouper.synthesis_groups(&items, &clusters);
        let mut narratives = Vec::new();
        for group in &groups {
            let content: String = items
                .iter()
                .filter(|it| group.member_ids.contains(&it.id))
                .map(|it| {
                    format!(
                        "Title: {}\nSummary: {}\nTags: {}\nSource: {}",
                        it.title.as_deref().unwrap_or(""),
                        it.summary.as_deref().unwrap_or(""),
                        it.tags.as_deref().unwrap_or_default().join(", "),
                        it.source_name,
                    )
                })
                .collect::<Vec<_>>()
                .join("\n\n");

            let body = self
                .ai
                .complete(&prompts::synthesize_prompt(group, &content))
                .await?;
            narratives.push(Narrative {
                id: Uuid::new_v4(),
                tag: group.dominant_tag.clone(),
                body,
                member_ids: group.member_ids.clone(),
                created_at: Utc::now(),
            });
        }

        for narrative in &narratives {
            self.store.persist_narrative(narrative).await?;
        }
        stats.narratives_synthesized = narratives.len() as u32;
        info!(
            groups = groups.len(),
            narratives = narratives.len(),
            "synthesis complete"
        );
        batch.narratives = narratives;
        Ok(())
    }

    /// Persist surviving items, prune the retention window, hand the
    /// result to the presentation collaborator.
    async fn publish(&self, batch: &Batch, stats: &mut RunStats) -> Result<()> {
        let survivors: Vec<ContentItem> = batch.surviving().cloned().collect();
        self.store.persist_items(&survivors).await?;
        stats.items_pruned = self.store.prune(self.config.retention_days).await?;
        self.publisher
            .publish(&survivors, &batch.narratives)
            .await?;
        stats.items_published = survivors.len() as u32;
        info!(published = survivors.len(), "batch published");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Text helpers
// ---------------------------------------------------------------------------

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static SPECIAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s.,!?-]").unwrap());
static PUNCT_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+([.,!?-])").unwrap());

/// Normalize raw crawl text: collapse whitespace, strip everything but
/// word characters and basic punctuation, tighten space before
/// punctuation. `None` when nothing survives cleaning.
fn clean_text(text: &str) -> Option<String> {
    let collapsed = WHITESPACE.replace_all(text, " ");
    let stripped = SPECIAL.replace_all(&collapsed, "");
    let tightened = PUNCT_SPACE.replace_all(&stripped, "$1");
    let cleaned = tightened.trim().to_string();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_normalizes_whitespace_and_symbols() {
        let cleaned = clean_text("Big   news :\n\trelease *v2* shipped !").unwrap();
        assert_eq!(cleaned, "Big news release v2 shipped!");
    }

    #[test]
    fn clean_text_rejects_empty_result() {
        assert!(clean_text("   ***   ").is_none());
    }

    #[test]
    fn parse_tags_splits_and_trims() {
        assert_eq!(
            parse_tags(" llm , inference,, rust "),
            vec!["llm".to_string(), "inference".to_string(), "rust".to_string()]
        );
    }
}
