use crate::traits::SampleOps;
use nalgebra::{DMatrix, DVector};

type Mat = DMatrix<f32>;
type Vec = DVector<f32>;

pub trait RSVD {
    /// Truncated SVD by randomized subspace iteration.
    /// Returns `(U, D, V)` with at most `rank` components.
    fn rsvd(&self, rank: usize) -> anyhow::Result<(Mat, Vec, Mat)>;
}

impl RSVD for Mat {
    fn rsvd(&self, rank: usize) -> anyhow::Result<(Mat, Vec, Mat)> {
        RandomizedSvd::new(rank, DEFAULT_SUBSPACE_ITER).compute(self)
    }
}

const DEFAULT_SUBSPACE_ITER: usize = 5;
const OVERSAMPLE: usize = 5;

/// Randomized SVD, Alg 4.4 of Halko et al. (2009)
pub struct RandomizedSvd {
    max_rank: usize,
    iter: usize,
}

impl RandomizedSvd {
    pub fn new(max_rank: usize, iter: usize) -> Self {
        Self { max_rank, iter }
    }

    pub fn compute(&self, xx: &Mat) -> anyhow::Result<(Mat, Vec, Mat)> {
        let nr = xx.nrows();
        let nc = xx.ncols();

        let mut rank = nr.min(nc);
        let mut oversample = 0;

        if self.max_rank > 0 && rank > self.max_rank {
            rank = self.max_rank;
            oversample = OVERSAMPLE;
        }

        anyhow::ensure!(rank > 0, "must be at least rank = 1");

        let qq = self.subspace(xx, rank + oversample);
        let rank = rank.min(qq.ncols());
        let qq = qq.columns(0, rank).into_owned();

        // project down and run a small deterministic SVD
        let bb = qq.transpose() * xx;
        let svd = bb.svd(true, true);

        if let (Some(svd_u), Some(svd_vt)) = (svd.u, svd.v_t) {
            let u_vectors = qq * svd_u.columns(0, rank).into_owned();
            let v_vectors = svd_vt.transpose().columns(0, rank).into_owned();
            let singular_values = svd.singular_values.rows(0, rank).into_owned();
            Ok((u_vectors, singular_values, v_vectors))
        } else {
            anyhow::bail!("SVD failed");
        }
    }

    /// Find an orthonormal matrix whose range approximates the range of `xx`,
    /// stabilized by LU-style normalization between power iterations
    fn subspace(&self, xx: &Mat, rank_and_oversample: usize) -> Mat {
        let nr = xx.nrows();
        let nc = xx.ncols();

        let mut ll = Mat::zeros(nr, rank_and_oversample);
        let mut qq = Mat::runif(nc, rank_and_oversample);

        for _ in 0..self.iter {
            let lu1 = xx * &qq;
            ll.fill(0.);
            ll.fill_with_identity();
            ll.view_mut((0, 0), (nr, rank_and_oversample))
                .lower_triangle()
                .copy_from(&lu1);

            let lu2 = xx.transpose() * &ll;
            qq.fill(0.);
            qq.fill_with_identity();
            qq.view_mut((0, 0), (nc, rank_and_oversample))
                .lower_triangle()
                .copy_from(&lu2);
        }

        let qr = (xx * &qq).qr();
        let kk = rank_and_oversample.min(qr.q().ncols());
        qr.q().columns(0, kk).into_owned()
    }
}
