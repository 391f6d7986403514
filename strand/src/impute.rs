//! Zero-value imputation and low-coverage trace filtering
//!
//! In tracing data a zero distance means "not measured", not a true
//! zero. Traces with too few measured pairs are dropped, and the
//! remaining zeros are replaced by each pair's mean over its measured
//! (strictly positive) entries.

use crate::common::*;

/// Outcome of the imputation/filtering pass
pub struct ImputedMatrix {
    /// pairs × retained traces, zeros replaced by row statistics
    pub matrix: Mat,
    /// column indices of retained traces (into the original matrix)
    pub retained: Vec<usize>,
    /// column indices of dropped traces
    pub dropped: Vec<usize>,
    /// per-pair mean over strictly-positive entries of the original matrix
    pub row_nonzero_mean: DVec,
}

/// Count strictly-positive entries per column
pub fn column_coverage(mat: &Mat) -> Vec<usize> {
    mat.column_iter()
        .map(|col| col.iter().filter(|&&x| x > 0.0).count())
        .collect()
}

/// Mean over strictly-positive entries per row; 0 when a row has none
pub fn row_nonzero_means(mat: &Mat) -> DVec {
    DVec::from_iterator(
        mat.nrows(),
        mat.row_iter().map(|row| {
            let mut sum = 0.0f32;
            let mut count = 0usize;
            for &x in row.iter() {
                if x > 0.0 {
                    sum += x;
                    count += 1;
                }
            }
            if count > 0 {
                sum / count as f32
            } else {
                0.0
            }
        }),
    )
}

/// Drop traces with coverage `<= min_traces`, then replace every zero
/// entry with its row's non-zero mean (computed on the original,
/// unfiltered matrix).
///
/// Rows with no measured entry keep their zeros; that is expected for
/// fully-unmeasured pairs. Dropping every trace is a configuration
/// error and fails fast.
pub fn impute_zero_distances(mat: &Mat, min_traces: usize) -> anyhow::Result<ImputedMatrix> {
    let coverage = column_coverage(mat);

    let (retained, dropped): (Vec<usize>, Vec<usize>) =
        (0..mat.ncols()).partition(|&j| coverage[j] > min_traces);

    if retained.is_empty() {
        anyhow::bail!(
            "min_traces = {} drops all {} traces; lower the threshold",
            min_traces,
            mat.ncols()
        );
    }

    info!(
        "retained {} traces, dropped {} with coverage <= {}",
        retained.len(),
        dropped.len(),
        min_traces
    );

    // row statistics come from the original matrix, not the filtered one
    let row_nonzero_mean = row_nonzero_means(mat);

    let mut matrix = mat.select_columns(retained.iter());
    for i in 0..matrix.nrows() {
        let mu = row_nonzero_mean[i];
        if mu <= 0.0 {
            continue;
        }
        for j in 0..matrix.ncols() {
            if matrix[(i, j)] == 0.0 {
                matrix[(i, j)] = mu;
            }
        }
    }

    Ok(ImputedMatrix {
        matrix,
        retained,
        dropped,
        row_nonzero_mean,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coverage_counts_positive_entries() {
        let mat = Mat::from_row_slice(2, 3, &[0.0, 2.0, 4.0, 1.0, 0.0, 1.0]);
        assert_eq!(column_coverage(&mat), vec![1, 1, 2]);
    }

    #[test]
    fn row_means_ignore_zeros() {
        let mat = Mat::from_row_slice(3, 3, &[0.0, 2.0, 4.0, 1.0, 0.0, 1.0, 0.0, 0.0, 0.0]);
        let mu = row_nonzero_means(&mat);
        assert_eq!(mu[0], 3.0);
        assert_eq!(mu[1], 1.0);
        assert_eq!(mu[2], 0.0);
    }

    #[test]
    fn impute_fills_zeros_with_row_means() {
        let mat = Mat::from_row_slice(2, 3, &[0.0, 2.0, 4.0, 1.0, 0.0, 1.0]);
        let out = impute_zero_distances(&mat, 0).unwrap();

        assert!(out.dropped.is_empty());
        assert_eq!(out.retained, vec![0, 1, 2]);

        // row 0 non-zero mean = 3, row 1 non-zero mean = 1
        let expected = Mat::from_row_slice(2, 3, &[3.0, 2.0, 4.0, 1.0, 1.0, 1.0]);
        assert_eq!(out.matrix, expected);
    }

    #[test]
    fn coverage_threshold_is_strict() {
        // middle column has no positive entries: 0 > 0 is false, so dropped
        let mat = Mat::from_row_slice(2, 3, &[1.0, 0.0, 4.0, 2.0, 0.0, 1.0]);
        let out = impute_zero_distances(&mat, 0).unwrap();

        assert_eq!(out.dropped, vec![1]);
        assert_eq!(out.retained, vec![0, 2]);
        assert_eq!(out.matrix.ncols(), 2);
    }

    #[test]
    fn row_statistic_uses_unfiltered_matrix() {
        // column 1 will be dropped (coverage 1 <= 1), but its entry still
        // contributes to the row-0 mean
        let mat = Mat::from_row_slice(2, 3, &[0.0, 6.0, 2.0, 1.0, 0.0, 3.0]);
        let out = impute_zero_distances(&mat, 1).unwrap();

        assert_eq!(out.dropped, vec![1]);
        // row 0: positives {6, 2} -> mean 4; the remaining zero becomes 4
        assert_eq!(out.matrix[(0, 0)], 4.0);
    }

    #[test]
    fn fully_unmeasured_row_keeps_zeros() {
        let mat = Mat::from_row_slice(2, 2, &[0.0, 0.0, 1.0, 2.0]);
        let out = impute_zero_distances(&mat, 0).unwrap();

        assert_eq!(out.matrix[(0, 0)], 0.0);
        assert_eq!(out.matrix[(0, 1)], 0.0);
        assert_eq!(out.row_nonzero_mean[0], 0.0);
    }

    #[test]
    fn imputation_is_idempotent() {
        let mat = Mat::from_row_slice(2, 3, &[0.0, 2.0, 4.0, 1.0, 0.0, 1.0]);
        let once = impute_zero_distances(&mat, 0).unwrap();
        let twice = impute_zero_distances(&once.matrix, 0).unwrap();

        assert_eq!(once.matrix, twice.matrix);
        assert!(twice.dropped.is_empty());
    }

    #[test]
    fn dropping_all_traces_is_fatal() {
        let mat = Mat::from_row_slice(2, 2, &[1.0, 1.0, 0.0, 1.0]);
        assert!(impute_zero_distances(&mat, 10).is_err());
    }
}
