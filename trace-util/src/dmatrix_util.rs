use crate::traits::{MatOps, SampleOps};
use nalgebra::DMatrix;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal, Uniform};
use rayon::prelude::*;

impl MatOps for DMatrix<f32> {
    type Mat = Self;
    type Scalar = f32;

    /// `Y[,j] = X[,j] / max(1, norm(X[,j]))`
    fn normalize_columns_inplace(&mut self) {
        for mut x_j in self.column_iter_mut() {
            let denom = x_j.norm().max(1.0);
            x_j /= denom;
        }
    }

    fn normalize_columns(&self) -> Self::Mat {
        let mut ret = self.clone();
        ret.normalize_columns_inplace();
        ret
    }

    /// Column-wise z-score; columns with zero variance are only centred
    fn scale_columns_inplace(&mut self) {
        let nrows = self.nrows().max(1) as f32;
        for mut x_j in self.column_iter_mut() {
            let mu = x_j.sum() / nrows;
            let sig = (x_j.iter().map(|&x| (x - mu) * (x - mu)).sum::<f32>() / nrows).sqrt();
            if sig > 0.0 {
                x_j.apply(|x| *x = (*x - mu) / sig);
            } else {
                x_j.apply(|x| *x -= mu);
            }
        }
    }

    fn scale_columns(&self) -> Self::Mat {
        let mut ret = self.clone();
        ret.scale_columns_inplace();
        ret
    }

    fn centre_columns_inplace(&mut self) {
        let nrows = self.nrows().max(1) as f32;
        for mut x_j in self.column_iter_mut() {
            let mu = x_j.sum() / nrows;
            x_j.apply(|x| *x -= mu);
        }
    }

    fn centre_columns(&self) -> Self::Mat {
        let mut ret = self.clone();
        ret.centre_columns_inplace();
        ret
    }
}

impl SampleOps for DMatrix<f32> {
    type Mat = Self;
    type Scalar = f32;

    fn runif(dd: usize, nn: usize) -> Self::Mat {
        let runif = Uniform::new(0_f32, 1_f32).expect("invalid uniform range");

        let rvec = (0..(dd * nn))
            .into_par_iter()
            .map_init(rand::rng, |rng, _| rng.sample(runif))
            .collect();

        DMatrix::<f32>::from_vec(dd, nn, rvec)
    }

    fn rnorm(dd: usize, nn: usize) -> Self::Mat {
        let rvec = (0..(dd * nn))
            .into_par_iter()
            .map_init(rand::rng, |rng, _| StandardNormal.sample(rng))
            .collect();

        DMatrix::<f32>::from_vec(dd, nn, rvec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_columns_zero_mean_unit_sd() {
        let mut xx = DMatrix::<f32>::runif(100, 5);
        xx.scale_columns_inplace();

        for j in 0..xx.ncols() {
            let col = xx.column(j);
            let mu = col.sum() / 100.0;
            let sig2 = col.iter().map(|&x| (x - mu) * (x - mu)).sum::<f32>() / 100.0;
            approx::assert_abs_diff_eq!(mu, 0.0, epsilon = 1e-5);
            approx::assert_abs_diff_eq!(sig2, 1.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn scale_columns_constant_column() {
        let mut xx = DMatrix::<f32>::from_element(10, 2, 3.0);
        xx.scale_columns_inplace();
        assert!(xx.iter().all(|&x| x == 0.0));
    }
}
