//! Counting conditions behind each defence's guarantee.
//!
//! Rules check these before aggregating and warn when a configuration is
//! outside the regime where the guarantee holds. Round sampling uses the
//! honest-majority checks to decide whether a draw is acceptable.

/// Multi-Krum tolerates `f` corrupted submissions out of `n` when
/// `n >= 2f + 3`.
pub fn krum_condition_met(n: usize, f: usize) -> bool {
    n >= f.saturating_mul(2).saturating_add(3)
}

/// Trimming `k` values from each side of `n` leaves something to average.
pub fn trim_condition_met(n: usize, k: usize) -> bool {
    n > k.saturating_mul(2)
}

/// Strict honest majority in a round of `round_size` with `malicious` members.
pub fn honest_majority(round_size: usize, malicious: usize) -> bool {
    malicious.saturating_mul(2) < round_size
}

/// Whether some draw of `round_size` participants from a pool of `population`,
/// `malicious` of them corrupted, has an honest majority.
pub fn honest_majority_possible(population: usize, malicious: usize, round_size: usize) -> bool {
    if round_size > population {
        return false;
    }
    let honest = population.saturating_sub(malicious);
    // a draw must contain at least this many corrupted participants
    let unavoidable = round_size.saturating_sub(honest);
    honest_majority(round_size, unavoidable)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_krum_bound() {
        let boundary: Vec<usize> = (0..5).map(|f| 2 * f + 3).collect();
        for (f, &n) in boundary.iter().enumerate() {
            assert!(krum_condition_met(n, f));
            assert!(!krum_condition_met(n - 1, f));
        }
        assert!(krum_condition_met(10, 3));
        assert!(!krum_condition_met(10, 4));
    }

    #[test]
    fn test_trim_bound() {
        assert!(trim_condition_met(3, 1));
        assert!(!trim_condition_met(2, 1));
        assert!(trim_condition_met(1, 0));
        assert!(!trim_condition_met(0, 0));
        assert!(!trim_condition_met(10, 5));
    }

    #[test]
    fn test_huge_bounds_do_not_wrap() {
        assert!(!krum_condition_met(usize::MAX, usize::MAX));
        assert!(!krum_condition_met(5, usize::MAX / 2 + 1));
        assert!(!trim_condition_met(usize::MAX, usize::MAX));
        assert!(!trim_condition_met(3, usize::MAX / 2 + 1));
        assert!(!honest_majority(usize::MAX, usize::MAX));
    }

    #[test]
    fn test_honest_majority() {
        assert!(honest_majority(10, 4));
        assert!(!honest_majority(10, 5)); // tie
        assert!(honest_majority(5, 2));
        assert!(honest_majority(1, 0));
        assert!(!honest_majority(1, 1));
    }

    #[test]
    fn test_honest_majority_possible() {
        assert!(honest_majority_possible(100, 10, 10));
        assert!(!honest_majority_possible(100, 95, 10)); // at least 5 corrupted in 10
        assert!(honest_majority_possible(100, 94, 10));
        assert!(!honest_majority_possible(10, 6, 10));
        assert!(honest_majority_possible(10, 4, 10));
        assert!(!honest_majority_possible(5, 0, 6)); // round larger than pool
    }
}
