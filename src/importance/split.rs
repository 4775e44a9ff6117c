//! Seeded train/test split

use rand::seq::SliceRandom;
use rand::SeedableRng as _;
use rand_pcg::Pcg32;

use crate::error::AnalysisError;

/// Row indices of one train/test split
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Shuffle `0..n_rows` with `seed` and hold out `ceil(n_rows * test_fraction)`
/// rows for testing. The same inputs always give the same split.
pub fn train_test_split(
    n_rows: usize,
    test_fraction: f64,
    seed: u64,
) -> Result<Split, AnalysisError> {
    let n_test = (n_rows as f64 * test_fraction).ceil() as usize;
    let n_train = n_rows.saturating_sub(n_test);
    if n_test == 0 || n_train == 0 {
        return Err(AnalysisError::InsufficientData {
            required: 2,
            available: n_rows,
        });
    }

    let mut indices: Vec<usize> = (0..n_rows).collect();
    let mut rng = Pcg32::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let train = indices.split_off(n_test);
    Ok(Split {
        train,
        test: indices,
    })
}
