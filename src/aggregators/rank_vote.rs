//! Rank-vote aggregation for federated rank learning (FRL)
//!
//! Participants never send weights. Each one ranks the positions of every
//! score layer by ascending score; the server turns every ranking into
//! per-position votes, sums them, and sorts positions by total vote. The
//! resulting consensus ranking decides which position receives which of the
//! layer's initial score values, so the set of score values never changes.

use ndarray::{Array1, Array2, ArrayView1};

use crate::error::SiegeError;
use crate::math::argsort;

/// Add one ranking's positional votes to `votes`.
///
/// A ranking lists positions from least to most important; position `p`
/// receives the index at which it appears. The inverse is taken with a
/// stable argsort so a malformed ranking still yields in-range votes.
pub fn add_positional_votes(ranking: &[u32], votes: &mut [u64]) -> Result<(), SiegeError> {
    if ranking.len() != votes.len() {
        return Err(SiegeError::DimensionMismatch {
            expected: votes.len(),
            actual: ranking.len(),
        });
    }
    for (position, rank_index) in argsort(ranking).into_iter().enumerate() {
        votes[position] += rank_index as u64;
    }
    Ok(())
}

/// Consensus ranking of one layer: positions in ascending order of total vote,
/// ties broken by position.
pub fn consensus_ranking(votes: &[u64]) -> Vec<usize> {
    argsort(votes)
}

/// Positional majority vote over every score layer.
///
/// # Arguments
///
/// * `layers` - Per score layer, one submitted ranking per row
///
/// # Returns
///
/// One consensus ranking per layer.
pub fn rank_vote(layers: &[Array2<u32>]) -> Result<Vec<Vec<usize>>, SiegeError> {
    let n_updates = layers.first().map_or(0, |l| l.nrows());
    if n_updates == 0 {
        return Err(SiegeError::EmptyUpdates);
    }

    layers
        .iter()
        .map(|layer| {
            if layer.nrows() != n_updates {
                return Err(SiegeError::DimensionMismatch {
                    expected: n_updates,
                    actual: layer.nrows(),
                });
            }
            let mut votes = vec![0u64; layer.ncols()];
            let mut ranking = vec![0u32; layer.ncols()];
            for row in layer.rows() {
                for (dst, &src) in ranking.iter_mut().zip(row.iter()) {
                    *dst = src;
                }
                add_positional_votes(&ranking, &mut votes)?;
            }
            Ok(consensus_ranking(&votes))
        })
        .collect()
}

/// New scores for a layer: `scores[consensus[j]] = initial_sorted[j]`.
pub fn substitute_scores(
    consensus: &[usize],
    initial_sorted: ArrayView1<'_, f32>,
) -> Result<Array1<f32>, SiegeError> {
    if consensus.len() != initial_sorted.len() {
        return Err(SiegeError::DimensionMismatch {
            expected: initial_sorted.len(),
            actual: consensus.len(),
        });
    }
    let mut scores = Array1::zeros(consensus.len());
    for (&position, &value) in consensus.iter().zip(initial_sorted.iter()) {
        if position >= scores.len() {
            return Err(SiegeError::DimensionMismatch {
                expected: scores.len(),
                actual: position + 1,
            });
        }
        scores[position] = value;
    }
    Ok(scores)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_votes_are_inverse_permutation() {
        let mut votes = vec![0u64; 4];
        add_positional_votes(&[2, 0, 3, 1], &mut votes).unwrap();
        assert_eq!(votes, vec![1, 3, 0, 2]);
    }

    #[test]
    fn test_votes_length_mismatch() {
        let mut votes = vec![0u64; 2];
        assert!(add_positional_votes(&[0, 1, 2], &mut votes).is_err());
    }

    #[test]
    fn test_malformed_ranking_stays_in_range() {
        let mut votes = vec![0u64; 3];
        add_positional_votes(&[9, 9, 9], &mut votes).unwrap();
        assert_eq!(votes, vec![0, 1, 2]);
    }

    #[test]
    fn test_unanimous_vote_returns_the_ranking() {
        let layer = array![[3u32, 1, 0, 2], [3, 1, 0, 2], [3, 1, 0, 2]];
        let consensus = rank_vote(&[layer]).unwrap();
        assert_eq!(consensus, vec![vec![3, 1, 0, 2]]);
    }

    #[test]
    fn test_majority_wins() {
        // two participants rank position 0 highest, one ranks it lowest
        let layer = array![[1u32, 2, 0], [1, 2, 0], [0, 1, 2]];
        let consensus = rank_vote(&[layer]).unwrap();
        // votes: pos0 = 2+2+0 = 4, pos1 = 0+0+1 = 1, pos2 = 1+1+2 = 4
        assert_eq!(consensus[0], vec![1, 0, 2]);
    }

    #[test]
    fn test_empty_batch() {
        let layer = Array2::<u32>::zeros((0, 3));
        assert!(matches!(rank_vote(&[layer]), Err(SiegeError::EmptyUpdates)));
        assert!(matches!(rank_vote(&[]), Err(SiegeError::EmptyUpdates)));
    }

    #[test]
    fn test_substitute_scores() {
        let initial = array![0.1f32, 0.2, 0.3];
        let scores = substitute_scores(&[2, 0, 1], initial.view()).unwrap();
        assert_eq!(scores, array![0.2f32, 0.3, 0.1]);
        assert!(substitute_scores(&[0, 1], initial.view()).is_err());
    }
}
