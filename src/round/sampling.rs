//! Participant pool and per-round selection.
//!
//! Participant ids `0..M` are malicious for the whole run. A round draws
//! `R` ids uniformly without replacement and redraws until the draw has a
//! strict honest majority.

use rand::seq::index;
use rand::Rng;
use tracing::debug;

use crate::error::SiegeError;
use crate::verification::{honest_majority, honest_majority_possible};

/// Fixed population with a malicious prefix.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParticipantPool {
    population: usize,
    malicious: usize,
}

impl ParticipantPool {
    /// Pool of `population` participants, the first `malicious` of them malicious.
    pub fn new(population: usize, malicious: usize) -> Result<Self, SiegeError> {
        if malicious > population {
            return Err(SiegeError::InvalidConfig(format!(
                "{} malicious participants exceed population {}",
                malicious, population
            )));
        }
        Ok(Self {
            population,
            malicious,
        })
    }

    /// Total participants.
    pub fn population(&self) -> usize {
        self.population
    }

    /// Size of the malicious prefix.
    pub fn malicious_count(&self) -> usize {
        self.malicious
    }

    /// Whether `participant` is malicious.
    pub fn is_malicious(&self, participant: usize) -> bool {
        participant < self.malicious
    }

    /// Draw a round with a strict honest majority.
    ///
    /// Gives up with [`SiegeError::ResampleExhausted`] after `max_attempts`
    /// draws, or immediately when no such draw exists.
    pub fn select<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        round_size: usize,
        max_attempts: usize,
    ) -> Result<RoundSelection, SiegeError> {
        let exhausted = SiegeError::ResampleExhausted {
            attempts: max_attempts,
            round_size,
            malicious: self.malicious,
        };
        if round_size > self.population
            || !honest_majority_possible(self.population, self.malicious, round_size)
        {
            return Err(exhausted);
        }

        for attempt in 1..=max_attempts {
            let participants = index::sample(rng, self.population, round_size).into_vec();
            let malicious = participants.iter().filter(|&&p| self.is_malicious(p)).count();
            if honest_majority(round_size, malicious) {
                if attempt > 1 {
                    debug!(attempt, malicious, "Resampled round selection");
                }
                return Ok(RoundSelection {
                    participants,
                    malicious_below: self.malicious,
                });
            }
        }
        Err(exhausted)
    }

    /// `min(M, count)` distinct malicious ids that build the attack reference.
    pub fn draw_crafters<R: Rng + ?Sized>(&self, rng: &mut R, count: usize) -> Vec<usize> {
        let amount = count.min(self.malicious);
        if amount == 0 {
            return Vec::new();
        }
        index::sample(rng, self.malicious, amount).into_vec()
    }
}

/// Participants of one round in slot order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundSelection {
    participants: Vec<usize>,
    malicious_below: usize,
}

impl RoundSelection {
    /// Participant id per slot.
    pub fn participants(&self) -> &[usize] {
        &self.participants
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    /// Whether the round is empty.
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Whether the participant in `slot` is malicious.
    pub fn is_malicious_slot(&self, slot: usize) -> bool {
        self.participants
            .get(slot)
            .is_some_and(|&p| p < self.malicious_below)
    }

    /// `(slot, participant)` of every malicious member.
    pub fn malicious(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.slots().filter(|&(_, p)| p < self.malicious_below)
    }

    /// `(slot, participant)` of every honest member.
    pub fn honest(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.slots().filter(|&(_, p)| p >= self.malicious_below)
    }

    /// Malicious members in the round.
    pub fn malicious_count(&self) -> usize {
        self.malicious().count()
    }

    /// Honest members in the round.
    pub fn honest_count(&self) -> usize {
        self.len() - self.malicious_count()
    }

    fn slots(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.participants.iter().copied().enumerate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_selection_has_honest_majority() {
        let pool = ParticipantPool::new(100, 40).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..200 {
            let selection = pool.select(&mut rng, 10, 10_000).unwrap();
            assert_eq!(selection.len(), 10);
            assert!(selection.honest_count() > selection.malicious_count());

            let mut ids = selection.participants().to_vec();
            ids.sort_unstable();
            ids.dedup();
            assert_eq!(ids.len(), 10);
            assert!(ids.iter().all(|&p| p < 100));
        }
    }

    #[test]
    fn test_slots_partition() {
        let pool = ParticipantPool::new(20, 5).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let selection = pool.select(&mut rng, 8, 100).unwrap();
        let malicious: Vec<usize> = selection.malicious().map(|(s, _)| s).collect();
        for slot in 0..selection.len() {
            assert_eq!(selection.is_malicious_slot(slot), malicious.contains(&slot));
        }
        assert_eq!(
            selection.malicious().count() + selection.honest().count(),
            selection.len()
        );
        assert!(!selection.is_malicious_slot(99));
    }

    #[test]
    fn test_impossible_majority_is_exhausted() {
        let pool = ParticipantPool::new(10, 6).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        assert!(matches!(
            pool.select(&mut rng, 10, 5),
            Err(SiegeError::ResampleExhausted { attempts: 5, .. })
        ));
    }

    #[test]
    fn test_draw_crafters() {
        let pool = ParticipantPool::new(50, 4).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let crafters = pool.draw_crafters(&mut rng, 10);
        assert_eq!(crafters.len(), 4);
        assert!(crafters.iter().all(|&p| pool.is_malicious(p)));

        let honest_only = ParticipantPool::new(50, 0).unwrap();
        assert!(honest_only.draw_crafters(&mut rng, 5).is_empty());
    }

    #[test]
    fn test_pool_rejects_oversized_prefix() {
        assert!(ParticipantPool::new(3, 4).is_err());
    }
}
