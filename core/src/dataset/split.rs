//! Seeded train/test partitioning.

use crate::dataset::table::LabeledData;
use crate::error::{Error, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::debug;

/// Train and test partitions of one dataset
#[derive(Debug, Clone)]
pub struct Split {
    pub train: LabeledData,
    pub test: LabeledData,
}

/// Shuffle rows with `seed` and hold out `ceil(n * test_size)` of them.
///
/// The same seed always yields the same partition.
pub fn train_test_split(data: &LabeledData, test_size: f64, seed: u64) -> Result<Split> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(Error::InvalidSplit(format!(
            "test_size must be between 0 and 1, got {}",
            test_size
        )));
    }

    let n_samples = data.len();
    let n_test = (n_samples as f64 * test_size).ceil() as usize;
    let n_train = n_samples.saturating_sub(n_test);
    if n_test == 0 || n_train == 0 {
        return Err(Error::InvalidSplit(format!(
            "test_size={} with {} samples leaves an empty partition",
            test_size, n_samples
        )));
    }

    let mut positions: Vec<usize> = (0..n_samples).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    positions.shuffle(&mut rng);

    let (test_positions, train_positions) = positions.split_at(n_test);
    debug!(
        "Split {} samples into {} train / {} test (seed {})",
        n_samples, n_train, n_test, seed
    );

    Ok(Split {
        train: data.subset(train_positions),
        test: data.subset(test_positions),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array2};
    use std::collections::HashSet;

    fn data(n: usize) -> LabeledData {
        LabeledData {
            features: Array2::from_shape_fn((n, 2), |(i, j)| (i * 10 + j) as f64),
            targets: Array1::from_iter((0..n).map(|i| (i % 2) as u32)),
            feature_names: vec!["a".to_string(), "b".to_string()],
            class_labels: vec!["0".to_string(), "1".to_string()],
            row_ids: (0..n).collect(),
        }
    }

    #[test]
    fn test_sizes_round_test_up() {
        let split = train_test_split(&data(150), 0.2, 42).unwrap();
        assert_eq!(split.test.len(), 30);
        assert_eq!(split.train.len(), 120);

        let split = train_test_split(&data(11), 0.2, 42).unwrap();
        assert_eq!(split.test.len(), 3);
        assert_eq!(split.train.len(), 8);
    }

    #[test]
    fn test_partitions_are_disjoint_and_complete() {
        let split = train_test_split(&data(50), 0.3, 7).unwrap();
        let train: HashSet<usize> = split.train.row_ids.iter().copied().collect();
        let test: HashSet<usize> = split.test.row_ids.iter().copied().collect();

        assert!(train.is_disjoint(&test));
        assert_eq!(train.len() + test.len(), 50);

        // Features travel with their row
        for (pos, row) in split.test.row_ids.iter().enumerate() {
            assert_eq!(split.test.features[[pos, 0]], (*row * 10) as f64);
        }
    }

    #[test]
    fn test_same_seed_same_split() {
        let a = train_test_split(&data(40), 0.25, 42).unwrap();
        let b = train_test_split(&data(40), 0.25, 42).unwrap();
        let c = train_test_split(&data(40), 0.25, 43).unwrap();

        assert_eq!(a.test.row_ids, b.test.row_ids);
        assert_ne!(a.test.row_ids, c.test.row_ids);
    }

    #[test]
    fn test_invalid_sizes() {
        assert!(train_test_split(&data(10), 0.0, 1).is_err());
        assert!(train_test_split(&data(10), 1.0, 1).is_err());
        assert!(train_test_split(&data(1), 0.5, 1).is_err());
    }
}
