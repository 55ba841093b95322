//! Near-duplicate removal, within the batch and against history.
//!
//! Two passes compose: intra-batch (duplicate groups over the current
//! batch) then cross-history (survivors vs. the recent window). Removal
//! only flags batch indices; history is never mutated, and zero removals
//! is a normal outcome.

use std::collections::BTreeMap;

use feedforge_common::{ContentItem, HistoryWindow, PipelineError};
use uuid::Uuid;

use crate::similarity::cosine_similarity;

/// Why a batch index was flagged for removal.
#[derive(Debug, Clone, PartialEq)]
pub enum RemovalReason {
    /// Lost an intra-batch priority tie-break to `kept`.
    IntraBatch { kept: Uuid, similarity: f64 },
    /// Near-duplicate of already-persisted content.
    History { matched: Uuid, similarity: f64 },
}

#[derive(Debug, Default)]
pub struct DedupOutcome {
    /// Flagged indices into the input slice, with reasons.
    pub removals: Vec<(usize, RemovalReason)>,
}

impl DedupOutcome {
    pub fn removed_count(&self) -> usize {
        self.removals.len()
    }

    pub fn is_removed(&self, index: usize) -> bool {
        self.removals.iter().any(|(i, _)| *i == index)
    }
}

pub struct DuplicateResolver {
    threshold: f64,
}

impl DuplicateResolver {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Flag near-duplicates in `items`. Items without embeddings are left
    /// alone (not comparable, not removable here).
    ///
    /// Intra-batch: above-threshold pairs chain items into duplicate
    /// groups (transitive closure, so a~b and b~c land a, b, c in one
    /// group even when a and c are not directly similar). Per group the
    /// best-priority member survives, ties to the earliest batch
    /// position; everyone else is flagged against it.
    ///
    /// Cross-history: a survivor is flagged when it matches a history item
    /// and its own priority is worse than or equal to the history item's.
    /// Existing published content wins ties.
    pub fn resolve(
        &self,
        items: &[ContentItem],
        history: &HistoryWindow,
    ) -> Result<DedupOutcome, PipelineError> {
        let mut flagged: Vec<Option<RemovalReason>> = vec![None; items.len()];

        // Pass 1: intra-batch duplicate groups via union-find.
        let mut parent: Vec<usize> = (0..items.len()).collect();
        // Strongest link each index has to its group, for the report.
        let mut link_sim = vec![0.0f64; items.len()];
        for i in 0..items.len() {
            let Some(emb_i) = items[i].embedding.as_deref() else {
                continue;
            };
            for j in (i + 1)..items.len() {
                let Some(emb_j) = items[j].embedding.as_deref() else {
                    continue;
                };
                let sim = cosine_similarity(emb_i, emb_j)?;
                if sim > self.threshold {
                    union(&mut parent, i, j);
                    link_sim[i] = link_sim[i].max(sim);
                    link_sim[j] = link_sim[j].max(sim);
                }
            }
        }

        let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for i in 0..items.len() {
            groups.entry(find(&mut parent, i)).or_default().push(i);
        }
        for members in groups.values() {
            if members.len() < 2 {
                continue;
            }
            let Some(best) = members
                .iter()
                .copied()
                .min_by_key(|&i| (items[i].priority(), i))
            else {
                continue;
            };
            for &i in members {
                if i != best {
                    flagged[i] = Some(RemovalReason::IntraBatch {
                        kept: items[best].id,
                        similarity: link_sim[i],
                    });
                }
            }
        }

        // Pass 2: cross-history for surviving items.
        for (i, item) in items.iter().enumerate() {
            if flagged[i].is_some() {
                continue;
            }
            let Some(embedding) = item.embedding.as_deref() else {
                continue;
            };
            for hist in history.usable() {
                let Some(hist_embedding) = hist.embedding.as_deref() else {
                    continue;
                };
                let sim = cosine_similarity(embedding, hist_embedding)?;
                // `>=` removes on priority ties as well: already-published
                // content is favored over equally-ranked fresh duplicates.
                if sim > self.threshold && item.priority() >= hist.priority() {
                    flagged[i] = Some(RemovalReason::History {
                        matched: hist.id,
                        similarity: sim,
                    });
                    break;
                }
            }
        }

        Ok(DedupOutcome {
            removals: flagged
                .into_iter()
                .enumerate()
                .filter_map(|(i, r)| r.map(|reason| (i, reason)))
                .collect(),
        })
    }
}

fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

fn union(parent: &mut [usize], a: usize, b: usize) {
    let ra = find(parent, a);
    let rb = find(parent, b);
    if ra != rb {
        parent[rb.max(ra)] = rb.min(ra);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::enriched_item;

    fn resolver() -> DuplicateResolver {
        DuplicateResolver::new(0.85)
    }

    #[test]
    fn priority_tiebreak_keeps_github_over_arxiv() {
        // Two items at similarity ~0.9, one unrelated.
        let github = enriched_item("Release notes", "github", vec![1.0, 0.30]);
        let arxiv = enriched_item("The paper", "arxiv", vec![1.0, 0.0]);
        let other = enriched_item("Unrelated", "blog", vec![0.0, 1.0]);
        let items = vec![github, arxiv, other];

        let outcome = resolver()
            .resolve(&items, &HistoryWindow::default())
            .unwrap();

        assert_eq!(outcome.removed_count(), 1);
        assert!(outcome.is_removed(1), "arXiv item should lose the tie-break");
        assert!(!outcome.is_removed(0));
        assert!(!outcome.is_removed(2));
    }

    #[test]
    fn equal_priority_removes_second_in_batch_order() {
        let a = enriched_item("first", "arxiv", vec![1.0, 0.0]);
        let b = enriched_item("second", "arxiv", vec![1.0, 0.05]);
        let items = vec![a, b];

        let outcome = resolver()
            .resolve(&items, &HistoryWindow::default())
            .unwrap();

        assert_eq!(outcome.removed_count(), 1);
        assert!(outcome.is_removed(1));
    }

    #[test]
    fn duplicate_chain_collapses_to_one_survivor() {
        // Vectors at 0, 30 and 60 degrees: b links a and c transitively
        // even though a and c are not directly similar. The whole chain
        // is one duplicate group and only its best member survives.
        let a = enriched_item("a", "github", vec![1.0, 0.0]);
        let b = enriched_item("b", "arxiv", vec![0.866, 0.5]);
        let c = enriched_item("c", "arxiv", vec![0.5, 0.866]);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.5, 0.866]).unwrap() < 0.85);
        let items = vec![a, b, c];

        let outcome = resolver()
            .resolve(&items, &HistoryWindow::default())
            .unwrap();

        assert_eq!(outcome.removed_count(), 2);
        assert!(!outcome.is_removed(0));
        for (idx, reason) in &outcome.removals {
            assert!(
                matches!(reason, RemovalReason::IntraBatch { kept, .. } if *kept == items[0].id),
                "index {idx} should defer to the github item"
            );
        }
    }

    #[test]
    fn history_duplicate_removes_equal_priority_item() {
        let fresh = enriched_item("fresh", "arxiv", vec![1.0, 0.0]);
        let hist = enriched_item("published", "arxiv", vec![1.0, 0.01]);
        let history = HistoryWindow::new(vec![hist]);

        let outcome = resolver().resolve(&[fresh], &history).unwrap();

        assert_eq!(outcome.removed_count(), 1);
        assert!(matches!(
            outcome.removals[0].1,
            RemovalReason::History { .. }
        ));
    }

    #[test]
    fn strictly_better_priority_survives_history_duplicate() {
        let fresh = enriched_item("fresh", "github", vec![1.0, 0.0]);
        let hist = enriched_item("published", "arxiv", vec![1.0, 0.01]);
        let history = HistoryWindow::new(vec![hist]);

        let outcome = resolver().resolve(&[fresh], &history).unwrap();

        assert_eq!(outcome.removed_count(), 0);
    }

    #[test]
    fn resolver_is_idempotent_on_its_own_output() {
        let items = vec![
            enriched_item("a", "github", vec![1.0, 0.1]),
            enriched_item("b", "arxiv", vec![1.0, 0.15]),
            enriched_item("c", "x", vec![0.0, 1.0]),
            enriched_item("d", "blog", vec![0.05, 1.0]),
        ];
        let history = HistoryWindow::default();

        let first = resolver().resolve(&items, &history).unwrap();
        let survivors: Vec<ContentItem> = items
            .iter()
            .enumerate()
            .filter(|(i, _)| !first.is_removed(*i))
            .map(|(_, it)| it.clone())
            .collect();

        let second = resolver().resolve(&survivors, &history).unwrap();
        assert_eq!(second.removed_count(), 0);
    }

    #[test]
    fn zero_removal_is_a_normal_outcome() {
        let items = vec![
            enriched_item("a", "github", vec![1.0, 0.0]),
            enriched_item("b", "arxiv", vec![0.0, 1.0]),
        ];
        let outcome = resolver()
            .resolve(&items, &HistoryWindow::default())
            .unwrap();
        assert_eq!(outcome.removed_count(), 0);
    }

    #[test]
    fn items_without_embeddings_are_skipped() {
        let mut bare = enriched_item("bare", "arxiv", vec![]);
        bare.embedding = None;
        let other = enriched_item("other", "arxiv", vec![1.0, 0.0]);
        let outcome = resolver()
            .resolve(&[bare, other], &HistoryWindow::default())
            .unwrap();
        assert_eq!(outcome.removed_count(), 0);
    }
}
