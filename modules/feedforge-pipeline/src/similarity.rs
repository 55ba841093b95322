//! Pairwise cosine similarity over embedding vectors.
//!
//! Pure functions, no side effects. Everything downstream (novelty, dedup,
//! grouping) funnels through these two entry points.

use feedforge_common::PipelineError;

/// Cosine similarity of two equal-length embedding vectors, in [-1, 1].
/// A zero-norm vector compares as 0.0 to everything.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64, PipelineError> {
    if a.len() != b.len() {
        return Err(PipelineError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }
    Ok((dot / (norm_a * norm_b)) as f64)
}

/// Maximum similarity between `embedding` and each candidate, with the
/// index achieving it. Ties break to the first candidate. Returns `None`
/// for an empty candidate set.
pub fn max_similarity<'a, I>(
    embedding: &[f32],
    candidates: I,
) -> Result<Option<(usize, f64)>, PipelineError>
where
    I: IntoIterator<Item = &'a [f32]>,
{
    let mut best: Option<(usize, f64)> = None;
    for (i, candidate) in candidates.into_iter().enumerate() {
        let sim = cosine_similarity(embedding, candidate)?;
        if best.map_or(true, |(_, b)| sim > b) {
            best = Some((i, sim));
        }
    }
    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    #[test]
    fn self_similarity_is_one() {
        let v = vec![0.3, -1.2, 4.5, 0.0];
        let sim = cosine_similarity(&v, &v).unwrap();
        assert!((sim - 1.0).abs() < EPS);
    }

    #[test]
    fn similarity_is_symmetric() {
        let a = vec![1.0, 2.0, 3.0];
        let b = vec![-0.5, 0.25, 2.0];
        let ab = cosine_similarity(&a, &b).unwrap();
        let ba = cosine_similarity(&b, &a).unwrap();
        assert!((ab - ba).abs() < EPS);
    }

    #[test]
    fn opposite_vectors_hit_negative_one() {
        let a = vec![1.0, 1.0];
        let b = vec![-1.0, -1.0];
        let sim = cosine_similarity(&a, &b).unwrap();
        assert!((sim + 1.0).abs() < EPS);
    }

    #[test]
    fn dimension_mismatch_is_an_error() {
        let err = cosine_similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::DimensionMismatch { left: 2, right: 3 }
        ));
    }

    #[test]
    fn zero_vector_compares_as_zero() {
        let sim = cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]).unwrap();
        assert_eq!(sim, 0.0);
    }

    #[test]
    fn max_similarity_ties_break_to_first() {
        let target = vec![1.0, 0.0];
        let candidates: Vec<Vec<f32>> = vec![
            vec![2.0, 0.0], // sim 1.0
            vec![3.0, 0.0], // sim 1.0, same direction
            vec![0.0, 1.0], // sim 0.0
        ];
        let (idx, sim) = max_similarity(&target, candidates.iter().map(|c| c.as_slice()))
            .unwrap()
            .unwrap();
        assert_eq!(idx, 0);
        assert!((sim - 1.0).abs() < EPS);
    }

    #[test]
    fn max_similarity_empty_candidates() {
        let result = max_similarity(&[1.0, 0.0], std::iter::empty()).unwrap();
        assert!(result.is_none());
    }
}
