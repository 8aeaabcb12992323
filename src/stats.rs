//! Statistical reduction of repeated-trial measurements.
//!
//! A benchmark run yields one row of timings per trial; trials at the same
//! position are reduced to a single value by dropping z-score outliers and
//! averaging the remainder.

use anyhow::{bail, Context, Result};

/// Additive guard applied to both the deviation and the spread so a
/// zero-variance sample set yields finite z-scores instead of NaN.
pub const Z_EPSILON: f64 = 1e-7;

/// Drop samples whose epsilon-guarded z-score reaches `threshold`, then
/// return the mean of what is left.
///
/// Uniform input puts every sample at z = 1, so any threshold above 1
/// retains the whole set and returns the constant value exactly. The
/// retained set can only empty out for `threshold <= 1`; that is reported
/// as an error rather than a NaN mean.
pub fn filter_and_mean(samples: &[f64], threshold: f64) -> Result<f64> {
    if samples.is_empty() {
        bail!("cannot reduce an empty sample set");
    }
    let mean = samples.iter().sum::<f64>() / samples.len() as f64;
    let variance =
        samples.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / samples.len() as f64;
    let spread = variance.sqrt() + Z_EPSILON;

    let retained: Vec<f64> = samples
        .iter()
        .copied()
        .filter(|x| ((x - mean + Z_EPSILON) / spread).abs() < threshold)
        .collect();
    if retained.is_empty() {
        bail!(
            "outlier filter with threshold {} rejected all {} samples",
            threshold,
            samples.len()
        );
    }
    Ok(retained.iter().sum::<f64>() / retained.len() as f64)
}

/// Repeated-trial measurements for one mode: one row per trial, one column
/// per position. Row length is validated at construction, so every column
/// access sees a rectangular matrix.
#[derive(Debug, Clone)]
pub struct MeasurementMatrix {
    rows: Vec<Vec<f64>>,
    positions: usize,
}

impl MeasurementMatrix {
    /// Build a matrix from trial rows, rejecting empty or ragged input.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let Some(first) = rows.first() else {
            bail!("measurement matrix needs at least one trial row");
        };
        let positions = first.len();
        if positions == 0 {
            bail!("measurement matrix needs at least one position per row");
        }
        for (trial, row) in rows.iter().enumerate() {
            if row.len() != positions {
                bail!(
                    "trial {} produced {} samples but trial 0 produced {}",
                    trial,
                    row.len(),
                    positions
                );
            }
        }
        Ok(Self { rows, positions })
    }

    pub fn trials(&self) -> usize {
        self.rows.len()
    }

    pub fn positions(&self) -> usize {
        self.positions
    }

    fn column(&self, position: usize) -> Vec<f64> {
        self.rows.iter().map(|row| row[position]).collect()
    }

    /// Reduce each column independently with [`filter_and_mean`]. The
    /// output has one value per position, in position order.
    pub fn aggregate(&self, threshold: f64) -> Result<Vec<f64>> {
        (0..self.positions)
            .map(|position| {
                filter_and_mean(&self.column(position), threshold)
                    .with_context(|| format!("position {position}"))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_sequence_returns_its_value_exactly() {
        let result = filter_and_mean(&[3.0, 3.0, 3.0, 3.0], 2.0).unwrap();
        assert_eq!(result, 3.0);
    }

    #[test]
    fn single_sample_is_returned_unchanged() {
        let result = filter_and_mean(&[42.5], 2.0).unwrap();
        assert_eq!(result, 42.5);
        // Idempotence: reducing the output again is a fixed point.
        assert_eq!(filter_and_mean(&[result], 2.0).unwrap(), result);
    }

    #[test]
    fn result_is_always_finite_for_finite_input() {
        for samples in [
            vec![0.0],
            vec![0.0, 0.0],
            vec![1.0, 2.0, 3.0, 4.0, 5.0],
            vec![1e12, 1e-12, 5.0, -7.5, 1e12],
        ] {
            let result = filter_and_mean(&samples, 2.0).unwrap();
            assert!(result.is_finite(), "non-finite result for {samples:?}");
        }
    }

    #[test]
    fn extreme_outlier_is_dropped() {
        // z for the 1000 sample is ~2.45 here, past the threshold; the six
        // near-11 samples are all around z = 0.4 and survive.
        let samples = [10.0, 11.0, 12.0, 11.0, 10.0, 12.0, 1000.0];
        let result = filter_and_mean(&samples, 2.0).unwrap();
        assert_eq!(result, 11.0);
    }

    #[test]
    fn four_samples_cannot_exceed_the_z_bound() {
        // With population sigma, one outlier among n samples is capped at
        // z = sqrt(n - 1); at n = 4 that is ~1.73, below threshold 2, so
        // nothing is filtered and the plain mean comes back.
        let result = filter_and_mean(&[10.0, 11.0, 12.0, 1000.0], 2.0).unwrap();
        assert_eq!(result, 258.25);
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(filter_and_mean(&[], 2.0).is_err());
    }

    #[test]
    fn threshold_that_rejects_everything_is_an_error() {
        // Uniform input puts every sample at z = 1; a threshold at or
        // below that empties the retained set.
        let err = filter_and_mean(&[4.0, 4.0, 4.0], 0.5).unwrap_err();
        assert!(err.to_string().contains("rejected all 3 samples"));
    }

    #[test]
    fn matrix_rejects_ragged_rows() {
        let err = MeasurementMatrix::from_rows(vec![vec![1.0, 2.0], vec![1.0, 2.0, 3.0]])
            .unwrap_err();
        assert!(err.to_string().contains("trial 1"));
    }

    #[test]
    fn matrix_rejects_empty_input() {
        assert!(MeasurementMatrix::from_rows(vec![]).is_err());
        assert!(MeasurementMatrix::from_rows(vec![vec![]]).is_err());
    }

    #[test]
    fn aggregate_preserves_column_count_and_order() {
        let matrix = MeasurementMatrix::from_rows(vec![
            vec![1.0, 100.0, 7.0],
            vec![2.0, 200.0, 7.0],
            vec![3.0, 300.0, 7.0],
        ])
        .unwrap();
        let result = matrix.aggregate(2.0).unwrap();
        assert_eq!(result.len(), 3);
        assert_eq!(result, vec![2.0, 200.0, 7.0]);
    }

    #[test]
    fn aggregate_columns_are_independent() {
        let left = MeasurementMatrix::from_rows(vec![vec![5.0, 1.0], vec![7.0, 2.0]]).unwrap();
        let right = MeasurementMatrix::from_rows(vec![vec![5.0, 90.0], vec![7.0, 80.0]]).unwrap();
        let a = left.aggregate(2.0).unwrap();
        let b = right.aggregate(2.0).unwrap();
        assert_eq!(a[0], b[0]);
    }

    #[test]
    fn single_trial_matrix_passes_through() {
        let matrix = MeasurementMatrix::from_rows(vec![vec![5.0, 6.0, 7.0]]).unwrap();
        assert_eq!(matrix.trials(), 1);
        assert_eq!(matrix.aggregate(2.0).unwrap(), vec![5.0, 6.0, 7.0]);
    }

    #[test]
    fn outlier_column_and_clean_column_reduce_together() {
        let matrix = MeasurementMatrix::from_rows(vec![
            vec![10.0, 20.0],
            vec![11.0, 21.0],
            vec![12.0, 22.0],
            vec![11.0, 20.0],
            vec![10.0, 21.0],
            vec![12.0, 22.0],
            vec![1000.0, 20.0],
        ])
        .unwrap();
        let result = matrix.aggregate(2.0).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[0], 11.0);
        assert!((result[1] - 146.0 / 7.0).abs() < 1e-12);
    }

    #[test]
    fn aggregate_error_names_the_position() {
        let matrix =
            MeasurementMatrix::from_rows(vec![vec![1.0, 4.0], vec![1.0, 4.0]]).unwrap();
        let err = matrix.aggregate(0.5).unwrap_err();
        assert!(format!("{err:#}").contains("position 0"));
    }
}
