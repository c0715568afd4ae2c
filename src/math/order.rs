//! Stable argsorts and permutation utilities used by the rank form.

use std::cmp::Ordering;

/// Total order on `f32` with every NaN above `+inf`, whatever its sign bit.
///
/// `f32::total_cmp` alone puts negative NaN below `-inf`.
pub fn nan_last_cmp(a: &f32, b: &f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (false, false) => a.total_cmp(b),
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
    }
}

/// Indices that sort `values` ascending. Ties keep index order; NaN sorts last.
pub fn argsort_f32(values: &[f32]) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..values.len()).collect();
    idx.sort_by(|&a, &b| nan_last_cmp(&values[a], &values[b]));
    idx
}

/// Indices that sort `values` ascending. Ties keep index order.
pub fn argsort<T: Ord>(values: &[T]) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..values.len()).collect();
    idx.sort_by(|&a, &b| values[a].cmp(&values[b]));
    idx
}

/// Whether `perm` contains every index of `0..perm.len()` exactly once.
pub fn is_permutation<T>(perm: &[T]) -> bool
where
    T: Copy + TryInto<usize>,
{
    let mut seen = vec![false; perm.len()];
    for &p in perm {
        match p.try_into() {
            Ok(i) if i < seen.len() && !seen[i] => seen[i] = true,
            _ => return false,
        }
    }
    true
}
