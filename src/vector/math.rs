use std::cmp::Ordering;

use ndarray::ArrayView1;

use super::{IndexError, ScoredEntry};

pub fn cosine_similarity(query: &[f32], candidate: &[f32]) -> Result<f32, IndexError> {
    if query.len() != candidate.len() {
        return Err(IndexError::DimensionMismatch {
            expected: candidate.len(),
            actual: query.len(),
        });
    }
    if query.is_empty() {
        return Ok(0.0);
    }

    let query = ArrayView1::from(query);
    let candidate = ArrayView1::from(candidate);
    let dot = query.dot(&candidate);
    let denom = query.dot(&query).sqrt() * candidate.dot(&candidate).sqrt();
    if denom <= f32::EPSILON {
        return Ok(0.0);
    }

    Ok((dot / denom).clamp(-1.0, 1.0))
}

/// Sorts by descending score; equal scores keep insertion order (`seq`).
pub fn rank_by_score(hits: &mut [ScoredEntry]) {
    hits.sort_by(|left, right| {
        right
            .score
            .partial_cmp(&left.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| left.payload.seq.cmp(&right.payload.seq))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::EntryPayload;
    use uuid::Uuid;

    fn approx_eq(left: f32, right: f32) -> bool {
        (left - right).abs() < 1e-5
    }

    fn hit(score: f32, seq: u64) -> ScoredEntry {
        ScoredEntry {
            score,
            payload: EntryPayload {
                text: format!("chunk {seq}"),
                corpus_id: Uuid::nil(),
                seq,
                source: "test".to_string(),
                page: None,
                offset: 0,
                embedding_model: "m".to_string(),
            },
        }
    }

    #[test]
    fn cosine_is_one_for_identical_vectors() {
        let vec = vec![1.0, 2.0, 3.0, 4.0];
        let score = cosine_similarity(&vec, &vec).expect("cosine should work");
        assert!(approx_eq(score, 1.0));
    }

    #[test]
    fn cosine_is_zero_for_orthogonal_vectors() {
        let score = cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).unwrap();
        assert!(approx_eq(score, 0.0));
    }

    #[test]
    fn cosine_rejects_length_mismatch() {
        let err = cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]).unwrap_err();
        assert!(matches!(
            err,
            IndexError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn zero_vector_scores_zero() {
        assert!(approx_eq(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).unwrap(), 0.0));
    }

    #[test]
    fn ranking_breaks_ties_by_insertion_order() {
        let mut hits = vec![hit(0.5, 3), hit(0.9, 2), hit(0.5, 1)];
        rank_by_score(&mut hits);
        let seqs: Vec<u64> = hits.iter().map(|h| h.payload.seq).collect();
        assert_eq!(seqs, vec![2, 1, 3]);
    }
}
