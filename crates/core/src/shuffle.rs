//! Permutation generation for question and option ordering.

use rand::Rng;

/// Produces a uniformly random permutation of `[0, n)`.
///
/// In-place Fisher–Yates over the index vector, O(n); every permutation of
/// `n` elements is equally likely.
pub fn permutation<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..n).collect();
    for i in (1..indices.len()).rev() {
        let j = rng.random_range(0..=i);
        indices.swap(i, j);
    }
    indices
}

/// The identity permutation of `[0, n)`.
#[must_use]
pub fn identity(n: usize) -> Vec<usize> {
    (0..n).collect()
}

/// Returns true when `values` is a bijection over `[0, values.len())`.
#[must_use]
pub fn is_permutation(values: &[usize]) -> bool {
    let mut seen = vec![false; values.len()];
    for &value in values {
        if value >= seen.len() || seen[value] {
            return false;
        }
        seen[value] = true;
    }
    true
}
