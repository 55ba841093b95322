//! Novelty check against the recent history window.

use feedforge_common::{ContentItem, HistoryWindow, PipelineError};
use tracing::debug;

use crate::similarity::max_similarity;

pub struct NoveltyEvaluator {
    threshold: f64,
}

impl NoveltyEvaluator {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Is this item sufficiently dissimilar from everything in the window?
    ///
    /// Total over the whole item domain: an item without an embedding is
    /// never novel (not yet enriched) and this returns `Ok(false)` rather
    /// than erroring — callers that require enrichment filter first.
    /// An empty window, or one with no usable embeddings, means no
    /// contradicting evidence exists and the item is novel by definition.
    pub fn is_novel(
        &self,
        item: &ContentItem,
        history: &HistoryWindow,
    ) -> Result<bool, PipelineError> {
        let Some(embedding) = item.embedding.as_deref() else {
            return Ok(false);
        };

        let candidates: Vec<&[f32]> = history
            .usable()
            .filter_map(|h| h.embedding.as_deref())
            .collect();
        if candidates.is_empty() {
            return Ok(true);
        }

        match max_similarity(embedding, candidates)? {
            Some((_, max_sim)) => {
                debug!(item = %item.id, max_sim, threshold = self.threshold, "novelty check");
                Ok(max_sim < self.threshold)
            }
            None => Ok(true),
        }
    }
}
