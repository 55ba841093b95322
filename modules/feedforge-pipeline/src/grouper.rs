//! Topic grouping for synthesis.
//!
//! Single-pass greedy clustering over batch order: deterministic and
//! cheap, not globally optimal. The output is a partition — every input
//! index lands in exactly one cluster, singletons included. Synthesis
//! eligibility is decided separately on top of the partition.

use feedforge_common::{ContentItem, GroupRelationships, PipelineError, TopicGroup};

/// Keywords that mark two titles as methodologically connected.
const METHOD_KEYWORDS: [&str; 6] = [
    "method",
    "approach",
    "technique",
    "algorithm",
    "model",
    "framework",
];

/// Outcome of a clustering pass. "Not enough data" is a variant, not an
/// error.
#[derive(Debug, Clone, PartialEq)]
pub enum ClusteringResult {
    Empty,
    /// A partition of input indices. Order follows batch order of each
    /// cluster's seed item.
    Clusters(Vec<Vec<usize>>),
}

pub struct RelationshipGrouper {
    group_threshold: f64,
    min_tag_count: usize,
}

impl RelationshipGrouper {
    pub fn new(group_threshold: f64, min_tag_count: usize) -> Self {
        Self {
            group_threshold,
            min_tag_count,
        }
    }

    /// Partition `items` into similarity clusters. Every item must carry
    /// an embedding; the caller pre-filters and a missing one is a caller
    /// bug surfaced as `NotEnriched`.
    pub fn group(&self, items: &[ContentItem]) -> Result<ClusteringResult, PipelineError> {
        if items.is_empty() {
            return Ok(ClusteringResult::Empty);
        }
        for item in items {
            if item.embedding.is_none() {
                return Err(PipelineError::NotEnriched(item.id));
            }
        }

        let mut assigned = vec![false; items.len()];
        let mut clusters: Vec<Vec<usize>> = Vec::new();

        for i in 0..items.len() {
            if assigned[i] {
                continue;
            }
            let seed = items[i].embedding.as_deref().unwrap_or_default();
            let mut cluster = Vec::new();
            for (j, candidate) in items.iter().enumerate() {
                if assigned[j] {
                    continue;
                }
                let emb = candidate.embedding.as_deref().unwrap_or_default();
                let sim = crate::similarity::cosine_similarity(seed, emb)?;
                if sim >= self.group_threshold {
                    cluster.push(j);
                    assigned[j] = true;
                }
            }
            clusters.push(cluster);
        }

        Ok(ClusteringResult::Clusters(clusters))
    }

    /// Reduce a partition to the groups worth synthesizing: size ≥ 2 and a
    /// dominant tag occurring in more than `min_tag_count` members.
    pub fn synthesis_groups(
        &self,
        items: &[ContentItem],
        clusters: &[Vec<usize>],
    ) -> Vec<TopicGroup> {
        clusters
            .iter()
            .filter(|c| c.len() >= 2)
            .filter_map(|cluster| {
                let (tag, count) = dominant_tag(items, cluster)?;
                if count <= self.min_tag_count {
                    return None;
                }
                Some(TopicGroup {
                    dominant_tag: tag,
                    member_ids: cluster.iter().map(|&i| items[i].id).collect(),
                    relationships: relationships(items, cluster),
                })
            })
            .collect()
    }
}

/// The tag with the highest occurrence count across cluster members.
/// Ties break to the first-encountered tag in iteration order.
pub fn dominant_tag(items: &[ContentItem], cluster: &[usize]) -> Option<(String, usize)> {
    // Vec instead of HashMap keeps first-encounter order for tie-breaks.
    let mut counts: Vec<(String, usize)> = Vec::new();
    for &i in cluster {
        for tag in items[i].tags.iter().flatten() {
            match counts.iter_mut().find(|(t, _)| t == tag) {
                Some((_, n)) => *n += 1,
                None => counts.push((tag.clone(), 1)),
            }
        }
    }
    let mut best: Option<(String, usize)> = None;
    for (tag, n) in counts {
        if best.as_ref().map_or(true, |(_, b)| n > *b) {
            best = Some((tag, n));
        }
    }
    best
}

/// Relationship metadata for one cluster: shared tags, naive
/// methodological title links, and a chronological title ordering.
pub fn relationships(items: &[ContentItem], cluster: &[usize]) -> GroupRelationships {
    // Tags appearing in more than one member.
    let mut counts: Vec<(String, usize)> = Vec::new();
    for &i in cluster {
        for tag in items[i].tags.iter().flatten() {
            match counts.iter_mut().find(|(t, _)| t == tag) {
                Some((_, n)) => *n += 1,
                None => counts.push((tag.clone(), 1)),
            }
        }
    }
    let shared_tags = counts
        .into_iter()
        .filter(|(_, n)| *n > 1)
        .map(|(t, _)| t)
        .collect();

    // Title pairs sharing a methodological keyword.
    let titles: Vec<&str> = cluster
        .iter()
        .filter_map(|&i| items[i].title.as_deref())
        .collect();
    let mut methodological_links = Vec::new();
    for (a, t1) in titles.iter().enumerate() {
        for t2 in titles.iter().skip(a + 1) {
            let l1 = t1.to_lowercase();
            let l2 = t2.to_lowercase();
            if METHOD_KEYWORDS
                .iter()
                .any(|k| l1.contains(k) && l2.contains(k))
            {
                methodological_links.push((t1.to_string(), t2.to_string()));
            }
        }
    }

    // Chronological ordering; undated items are left out, not errored.
    let mut dated: Vec<(chrono::DateTime<chrono::Utc>, String)> = cluster
        .iter()
        .filter_map(|&i| {
            let item = &items[i];
            match (&item.published_at, &item.title) {
                (Some(date), Some(title)) => Some((*date, title.clone())),
                _ => None,
            }
        })
        .collect();
    dated.sort_by_key(|(date, _)| *date);
    let chronology = dated.into_iter().map(|(_, title)| title).collect();

    GroupRelationships {
        shared_tags,
        methodological_links,
        chronology,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{complete_item, enriched_item};
    use chrono::{TimeZone, Utc};
    use std::collections::HashSet;

    fn grouper() -> RelationshipGrouper {
        RelationshipGrouper::new(0.7, 3)
    }

    #[test]
    fn empty_input_is_the_empty_variant() {
        assert_eq!(grouper().group(&[]).unwrap(), ClusteringResult::Empty);
    }

    #[test]
    fn missing_embedding_is_a_caller_bug() {
        let mut it = enriched_item("a", "arxiv", vec![1.0]);
        it.embedding = None;
        let err = grouper().group(std::slice::from_ref(&it)).unwrap_err();
        assert!(matches!(err, PipelineError::NotEnriched(id) if id == it.id));
    }

    #[test]
    fn clustering_is_a_partition() {
        let items = vec![
            enriched_item("a", "arxiv", vec![1.0, 0.0]),
            enriched_item("b", "arxiv", vec![0.95, 0.1]),
            enriched_item("c", "arxiv", vec![0.0, 1.0]),
            enriched_item("d", "arxiv", vec![0.1, 0.9]),
            enriched_item("e", "arxiv", vec![-1.0, 0.3]),
        ];
        let ClusteringResult::Clusters(clusters) = grouper().group(&items).unwrap() else {
            panic!("expected clusters");
        };

        let mut seen = HashSet::new();
        for cluster in &clusters {
            for &i in cluster {
                assert!(seen.insert(i), "index {i} appears in two clusters");
            }
        }
        assert_eq!(seen.len(), items.len(), "every item appears exactly once");
    }

    #[test]
    fn dissimilar_items_form_singletons() {
        let items = vec![
            enriched_item("a", "arxiv", vec![1.0, 0.0]),
            enriched_item("b", "arxiv", vec![0.0, 1.0]),
        ];
        let ClusteringResult::Clusters(clusters) = grouper().group(&items).unwrap() else {
            panic!("expected clusters");
        };
        assert_eq!(clusters.len(), 2);
        assert!(clusters.iter().all(|c| c.len() == 1));
        // Singletons never reach synthesis.
        assert!(grouper().synthesis_groups(&items, &clusters).is_empty());
    }

    #[test]
    fn synthesis_requires_dominant_tag_above_minimum() {
        // Four similar items, all tagged "llm": count 4 > 3 passes the gate.
        let items: Vec<_> = (0..4)
            .map(|i| {
                complete_item(
                    &format!("title {i}"),
                    "arxiv",
                    vec![1.0, 0.01 * i as f32],
                    vec!["llm"],
                )
            })
            .collect();
        let ClusteringResult::Clusters(clusters) = grouper().group(&items).unwrap() else {
            panic!("expected clusters");
        };
        assert_eq!(clusters.len(), 1);

        let groups = grouper().synthesis_groups(&items, &clusters);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].dominant_tag, "llm");
        assert_eq!(groups[0].member_ids.len(), 4);

        // Three occurrences is not strictly more than the minimum.
        let fewer = &items[..3];
        let ClusteringResult::Clusters(clusters) = grouper().group(fewer).unwrap() else {
            panic!("expected clusters");
        };
        assert!(grouper().synthesis_groups(fewer, &clusters).is_empty());
    }

    #[test]
    fn dominant_tag_ties_break_to_first_encountered() {
        let items = vec![
            complete_item("a", "arxiv", vec![1.0, 0.0], vec!["agents", "rust"]),
            complete_item("b", "arxiv", vec![1.0, 0.0], vec!["rust", "agents"]),
        ];
        let (tag, count) = dominant_tag(&items, &[0, 1]).unwrap();
        assert_eq!(tag, "agents");
        assert_eq!(count, 2);
    }

    #[test]
    fn relationships_capture_shared_tags_and_method_links() {
        let mut a = complete_item(
            "A new training method for transformers",
            "arxiv",
            vec![1.0, 0.0],
            vec!["training", "transformers"],
        );
        let mut b = complete_item(
            "Scaling laws as a method of prediction",
            "arxiv",
            vec![1.0, 0.0],
            vec!["training", "scaling"],
        );
        let c = complete_item(
            "Weekly roundup",
            "blog",
            vec![1.0, 0.0],
            vec!["news"],
        );
        a.published_at = Some(Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap());
        b.published_at = Some(Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap());
        // c stays undated and must be absent from the chronology.

        let items = vec![a, b, c];
        let rel = relationships(&items, &[0, 1, 2]);

        assert_eq!(rel.shared_tags, vec!["training".to_string()]);
        assert_eq!(rel.methodological_links.len(), 1);
        assert_eq!(
            rel.chronology,
            vec![
                "Scaling laws as a method of prediction".to_string(),
                "A new training method for transformers".to_string(),
            ]
        );
    }

    #[test]
    fn untitled_members_do_not_break_relationships() {
        let mut bare = enriched_item("ignored", "arxiv", vec![1.0, 0.0]);
        bare.title = None;
        bare.tags = None;
        let rel = relationships(std::slice::from_ref(&bare), &[0]);
        assert!(rel.shared_tags.is_empty());
        assert!(rel.methodological_links.is_empty());
        assert!(rel.chronology.is_empty());
    }
}
