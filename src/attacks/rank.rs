//! Rank-permutation attacks against positional voting.
//!
//! The malicious participants pool their positional votes into one signal,
//! take its consensus ranking (what they would agree on if honest), and
//! submit a fixed rearrangement of it. Every transform only moves entries,
//! so the output is a permutation whenever the input is.

use serde::{Deserialize, Serialize};

use crate::math::argsort;
use crate::update::RankUpdate;

/// Parameter-free rearrangement of a ranking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankTransform {
    /// Most important first
    Reverse,
    /// Rotate left by half the length: `[mid..] ++ [..mid]`
    CircularRotation,
    /// Second half, then the first half reversed
    ReverseFirstHalfRotation,
    /// Second half, first quarter, then the second quarter reversed
    SplitFirstHalfRotation,
}

impl RankTransform {
    /// Every transform, in declaration order.
    pub const ALL: [RankTransform; 4] = [
        RankTransform::Reverse,
        RankTransform::CircularRotation,
        RankTransform::ReverseFirstHalfRotation,
        RankTransform::SplitFirstHalfRotation,
    ];

    /// Stable name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            RankTransform::Reverse => "reverse",
            RankTransform::CircularRotation => "circular_rotation",
            RankTransform::ReverseFirstHalfRotation => "reverse_first_half_rotation",
            RankTransform::SplitFirstHalfRotation => "split_first_half_rotation",
        }
    }

    /// Rearrange `ranking`.
    pub fn apply<T: Copy>(&self, ranking: &[T]) -> Vec<T> {
        let mid = ranking.len() / 2;
        let (first, second) = ranking.split_at(mid);
        let mut out = Vec::with_capacity(ranking.len());
        match self {
            RankTransform::Reverse => out.extend(ranking.iter().rev()),
            RankTransform::CircularRotation => {
                out.extend_from_slice(second);
                out.extend_from_slice(first);
            }
            RankTransform::ReverseFirstHalfRotation => {
                out.extend_from_slice(second);
                out.extend(first.iter().rev());
            }
            RankTransform::SplitFirstHalfRotation => {
                let (quarter, rest) = first.split_at(first.len() / 2);
                out.extend_from_slice(second);
                out.extend_from_slice(quarter);
                out.extend(rest.iter().rev());
            }
        }
        out
    }
}

/// Consensus of the malicious side: positions by ascending summed vote.
pub fn malicious_consensus(signal: &[u64]) -> Vec<usize> {
    argsort(signal)
}

/// Crafted ranking for every score layer.
///
/// # Arguments
///
/// * `signal` - Summed positional votes of the reference participants, one
///   vector per score layer
/// * `transform` - Rearrangement applied to each layer's consensus
pub fn craft(signal: &[Vec<u64>], transform: RankTransform) -> RankUpdate {
    let layers = signal
        .iter()
        .map(|votes| {
            transform
                .apply(&malicious_consensus(votes))
                .into_iter()
                .map(|p| p as u32)
                .collect()
        })
        .collect();
    RankUpdate::new(layers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::is_permutation;

    #[test]
    fn test_transforms_on_eight() {
        let r: Vec<u32> = (0..8).collect();
        assert_eq!(RankTransform::Reverse.apply(&r), vec![7, 6, 5, 4, 3, 2, 1, 0]);
        assert_eq!(
            RankTransform::CircularRotation.apply(&r),
            vec![4, 5, 6, 7, 0, 1, 2, 3]
        );
        assert_eq!(
            RankTransform::ReverseFirstHalfRotation.apply(&r),
            vec![4, 5, 6, 7, 3, 2, 1, 0]
        );
        assert_eq!(
            RankTransform::SplitFirstHalfRotation.apply(&r),
            vec![4, 5, 6, 7, 0, 1, 3, 2]
        );
    }

    #[test]
    fn test_odd_lengths() {
        let r: Vec<u32> = (0..5).collect();
        // mid = 2, first = [0, 1], second = [2, 3, 4]
        assert_eq!(
            RankTransform::CircularRotation.apply(&r),
            vec![2, 3, 4, 0, 1]
        );
        assert_eq!(
            RankTransform::SplitFirstHalfRotation.apply(&r),
            vec![2, 3, 4, 0, 1]
        );
        assert_eq!(
            RankTransform::ReverseFirstHalfRotation.apply(&r),
            vec![2, 3, 4, 1, 0]
        );
    }

    #[test]
    fn test_tiny_inputs() {
        for t in RankTransform::ALL {
            assert!(t.apply::<u32>(&[]).is_empty());
            assert_eq!(t.apply(&[0u32]), vec![0]);
            assert!(is_permutation(&t.apply(&[1u32, 0])));
        }
    }

    #[test]
    fn test_craft_reverses_consensus() {
        // votes: position 2 least important, position 0 most
        let signal = vec![vec![9u64, 4, 1]];
        let update = craft(&signal, RankTransform::Reverse);
        assert_eq!(update.layers(), &[vec![0u32, 1, 2]]);
        assert_eq!(malicious_consensus(&signal[0]), vec![2, 1, 0]);
    }
}
