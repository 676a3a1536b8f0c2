//! Stratified train/test split

use crate::error::{AdaptError, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;

/// Row positions of the two partitions, each in ascending order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Seeded split that preserves class proportions
#[derive(Debug, Clone, Copy)]
pub struct StratifiedSplit {
    pub test_size: f64,
    pub random_state: u64,
}

impl StratifiedSplit {
    pub fn new(test_size: f64, random_state: u64) -> Self {
        Self { test_size, random_state }
    }

    /// Split rows by class code.
    ///
    /// The test partition holds `ceil(test_size * n)` rows, shared across
    /// classes in proportion to their size. Every class keeps at least one row
    /// on each side, so classes with a single member are rejected.
    pub fn split(&self, y: &[usize]) -> Result<SplitIndices> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(AdaptError::Training(format!(
                "test size must be in (0, 1), got {}",
                self.test_size
            )));
        }

        let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (i, &label) in y.iter().enumerate() {
            by_class.entry(label).or_default().push(i);
        }

        if let Some((class, indices)) = by_class.iter().find(|(_, idx)| idx.len() < 2) {
            return Err(AdaptError::Training(format!(
                "class {class} has {} member(s); stratified split needs at least 2",
                indices.len()
            )));
        }

        let n = y.len();
        let n_test = ((n as f64 * self.test_size).ceil() as usize).clamp(1, n.saturating_sub(1).max(1));
        let counts: Vec<usize> = by_class.values().map(Vec::len).collect();
        let shares = allocate_test_rows(&counts, n_test);

        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let mut train = Vec::with_capacity(n);
        let mut test = Vec::with_capacity(n_test);

        for (mut indices, share) in by_class.into_values().zip(shares) {
            indices.shuffle(&mut rng);
            test.extend_from_slice(&indices[..share]);
            train.extend_from_slice(&indices[share..]);
        }

        if train.is_empty() || test.is_empty() {
            return Err(AdaptError::Training(
                "stratified split resulted in an empty partition".into(),
            ));
        }

        train.sort_unstable();
        test.sort_unstable();
        Ok(SplitIndices { train, test })
    }
}

/// Share `n_test` rows across classes of the given sizes by largest
/// remainder, ties to the lower class. Each share lies in `1..count`; the
/// total equals `n_test` whenever that bound allows it.
fn allocate_test_rows(counts: &[usize], n_test: usize) -> Vec<usize> {
    let n: usize = counts.iter().sum();
    let ideal: Vec<f64> = counts
        .iter()
        .map(|&c| n_test as f64 * c as f64 / n as f64)
        .collect();
    let mut shares: Vec<usize> = ideal.iter().map(|v| v.floor() as usize).collect();

    let mut order: Vec<usize> = (0..counts.len()).collect();
    order.sort_by(|&a, &b| (ideal[b] - ideal[b].floor()).total_cmp(&(ideal[a] - ideal[a].floor())));
    let missing = n_test.saturating_sub(shares.iter().sum());
    for &k in order.iter().take(missing) {
        shares[k] += 1;
    }

    for (share, &count) in shares.iter_mut().zip(counts) {
        *share = (*share).clamp(1, count - 1);
    }

    // Clamping can move the total; walk it back one row at a time, taking
    // from or giving to the class furthest from its ideal share.
    loop {
        let total: usize = shares.iter().sum();
        if total == n_test {
            break;
        }
        let over = total > n_test;
        let pick = (0..counts.len())
            .filter(|&k| if over { shares[k] > 1 } else { shares[k] + 1 < counts[k] })
            .max_by(|&a, &b| {
                let gap = |k: usize| {
                    let d = shares[k] as f64 - ideal[k];
                    if over { d } else { -d }
                };
                gap(a).total_cmp(&gap(b)).then(b.cmp(&a))
            });
        match pick {
            Some(k) if over => shares[k] -= 1,
            Some(k) => shares[k] += 1,
            None => break,
        }
    }
    shares
}
