use crate::common::*;

use trace_util::traits::MatOps;

/// Scale each column to the median column total, take `log1p`, then
/// z-score each column. This keeps traces with different measurement
/// depths comparable before PCA.
pub fn normalize_distances(mat: &Mat) -> Mat {
    let mut xx = median_total_normalize(mat);
    xx.apply(|x| *x = x.ln_1p());
    xx.scale_columns_inplace();
    xx
}

/// Rescale columns so every column total matches the median total.
/// Columns with zero total are left untouched.
pub fn median_total_normalize(mat: &Mat) -> Mat {
    let totals: Vec<f32> = mat.column_iter().map(|col| col.sum()).collect();

    let mut sorted = totals.clone();
    sorted.sort_by(|a, b| a.partial_cmp(b).expect("no NaN totals"));
    let median = if sorted.is_empty() {
        0.0
    } else {
        sorted[sorted.len() / 2]
    };

    let mut ret = mat.clone();
    if median <= 0.0 {
        return ret;
    }

    for (j, mut col) in ret.column_iter_mut().enumerate() {
        if totals[j] > 0.0 {
            col *= median / totals[j];
        }
    }
    ret
}
