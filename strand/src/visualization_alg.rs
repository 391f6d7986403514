use crate::common::*;

/// t-SNE on a precomputed distance matrix (van der Maaten & Hinton, 2008)
pub struct TSne {
    perplexity: f32,
    learning_rate: f32,
    momentum: f32,
    n_iter: usize,
    early_exaggeration: f32,
    early_exaggeration_iter: usize,
}

impl Default for TSne {
    fn default() -> Self {
        Self {
            perplexity: 30.0,
            learning_rate: 200.0,
            momentum: 0.8,
            n_iter: 1000,
            early_exaggeration: 4.0,
            early_exaggeration_iter: 250,
        }
    }
}

impl TSne {
    pub fn perplexity(mut self, p: f32) -> Self {
        self.perplexity = p;
        self
    }

    pub fn n_iter(mut self, n: usize) -> Self {
        self.n_iter = n;
        self
    }

    /// Run t-SNE on an n x n distance matrix (row-major), with optional
    /// initial coordinates. Returns a flattened n x 2 embedding.
    pub fn fit(&self, distances: &[f32], n: usize, init: Option<&[f32]>) -> anyhow::Result<Vec<f32>> {
        anyhow::ensure!(
            distances.len() == n * n,
            "distance matrix has {} entries, expected {}",
            distances.len(),
            n * n
        );

        let p = self.compute_joint_probabilities(distances, n);

        let mut y: Vec<f32> = match init {
            Some(coords) => {
                anyhow::ensure!(
                    coords.len() == n * 2,
                    "initial coordinates have {} entries, expected {}",
                    coords.len(),
                    n * 2
                );
                coords.to_vec()
            }
            None => {
                use rand::Rng;
                let mut rng = rand::rng();
                (0..n * 2).map(|_| rng.random::<f32>() * 0.01).collect()
            }
        };

        let mut velocity = vec![0.0f32; n * 2];
        let mut grad = vec![0.0f32; n * 2];
        let mut q_unnorm = vec![0.0f32; n * n];

        for iter in 0..self.n_iter {
            let p_mult = if iter < self.early_exaggeration_iter {
                self.early_exaggeration
            } else {
                1.0
            };

            // Student-t kernel: q*_ij = 1 / (1 + ||y_i - y_j||^2)
            let mut q_sum = 0.0f32;
            for i in 0..n {
                for j in (i + 1)..n {
                    let dx = y[2 * i] - y[2 * j];
                    let dy = y[2 * i + 1] - y[2 * j + 1];
                    let q = 1.0 / (1.0 + dx * dx + dy * dy);
                    q_unnorm[i * n + j] = q;
                    q_unnorm[j * n + i] = q;
                    q_sum += 2.0 * q;
                }
            }
            let q_sum = q_sum.max(1e-12);

            // dC/dy_i = 4 sum_j (p_ij - q_ij) q*_ij (y_i - y_j)
            grad.fill(0.0);
            for i in 0..n {
                for j in 0..n {
                    if i == j {
                        continue;
                    }
                    let q_star = q_unnorm[i * n + j];
                    let q_ij = (q_star / q_sum).max(1e-12);
                    let coeff = 4.0 * (p_mult * p[i * n + j] - q_ij) * q_star;
                    grad[2 * i] += coeff * (y[2 * i] - y[2 * j]);
                    grad[2 * i + 1] += coeff * (y[2 * i + 1] - y[2 * j + 1]);
                }
            }

            for k in 0..n * 2 {
                velocity[k] = self.momentum * velocity[k] - self.learning_rate * grad[k];
                y[k] += velocity[k];
            }
        }

        Ok(y)
    }

    /// Joint probabilities P from the distance matrix via per-point
    /// perplexity calibration.
    fn compute_joint_probabilities(&self, distances: &[f32], n: usize) -> Vec<f32> {
        let target_entropy = self.perplexity.ln();
        let mut p = vec![0.0f32; n * n];

        for i in 0..n {
            let sigma = self.binary_search_sigma(i, distances, n, target_entropy, 1e-10, 1e4);

            let mut row_sum = 0.0f32;
            for j in 0..n {
                if i != j {
                    let d = distances[i * n + j];
                    let val = (-d * d / (2.0 * sigma * sigma)).exp();
                    p[i * n + j] = val;
                    row_sum += val;
                }
            }
            if row_sum > 1e-10 {
                for j in 0..n {
                    p[i * n + j] /= row_sum;
                }
            }
        }

        // symmetrize: P_ij = (P_j|i + P_i|j) / 2n
        let mut p_sym = vec![0.0f32; n * n];
        for i in 0..n {
            for j in 0..n {
                p_sym[i * n + j] = (p[i * n + j] + p[j * n + i]) / (2.0 * n as f32);
            }
        }

        let min_p = 1e-12f32;
        for v in &mut p_sym {
            *v = v.max(min_p);
        }

        p_sym
    }

    /// Binary search for sigma matching the target entropy
    fn binary_search_sigma(
        &self,
        i: usize,
        distances: &[f32],
        n: usize,
        target: f32,
        mut lo: f32,
        mut hi: f32,
    ) -> f32 {
        for _ in 0..50 {
            let mid = (lo + hi) / 2.0;
            let entropy = self.compute_entropy(i, distances, n, mid);
            if entropy > target {
                hi = mid;
            } else {
                lo = mid;
            }
        }
        (lo + hi) / 2.0
    }

    fn compute_entropy(&self, i: usize, distances: &[f32], n: usize, sigma: f32) -> f32 {
        let mut probs = vec![0.0f32; n];
        let mut sum = 0.0f32;

        for j in 0..n {
            if i != j {
                let d = distances[i * n + j];
                probs[j] = (-d * d / (2.0 * sigma * sigma)).exp();
                sum += probs[j];
            }
        }

        if sum < 1e-10 {
            return 0.0;
        }

        let mut entropy = 0.0f32;
        for j in 0..n {
            if i != j && probs[j] > 0.0 {
                let p = probs[j] / sum;
                entropy -= p * p.ln();
            }
        }
        entropy
    }
}

/// Cosine similarity between columns of a matrix
pub fn compute_cosine_similarity(x_dn: &Mat) -> Mat {
    let n = x_dn.ncols();

    let mut x_norm = x_dn.clone();
    for j in 0..n {
        let norm = x_norm.column(j).norm();
        if norm > 1e-10 {
            x_norm.column_mut(j).scale_mut(1.0 / norm);
        }
    }

    x_norm.transpose() * &x_norm
}

/// Angular distance from cosine similarity
pub fn similarity_to_distance(sim: &[f32]) -> Vec<f32> {
    sim.iter()
        .map(|&s| (2.0 * (1.0 - s.clamp(-1.0, 1.0))).sqrt())
        .collect()
}

/// Add small self-loops so no node has zero degree
pub fn regularize_similarity(similarity: &Mat, eps: f32) -> Mat {
    let n = similarity.nrows();
    let mut sim_reg = similarity.clone();
    for i in 0..n {
        sim_reg[(i, i)] += eps;
    }
    sim_reg
}

/// Spectral embedding from a similarity matrix.
///
/// Uses the symmetric normalized Laplacian L_sym = I - D^{-1/2} S D^{-1/2}
/// and returns the k non-trivial eigenvectors weighted by 1/λ.
pub fn spectral_embed(similarity: &Mat, num_eigen: usize) -> anyhow::Result<Mat> {
    let n = similarity.nrows();
    anyhow::ensure!(n > 2, "need at least 3 samples for a spectral embedding, got {}", n);
    let k = num_eigen.clamp(2, n - 1);

    let degree: DVec = DVec::from_iterator(n, similarity.row_iter().map(|r| r.sum()));
    let d_inv_sqrt = Mat::from_diagonal(&degree.map(|d| 1.0 / d.max(1e-10).sqrt()));
    let laplacian = Mat::identity(n, n) - &d_inv_sqrt * similarity * &d_inv_sqrt;

    let eig = laplacian.symmetric_eigen();
    let idx = argsort(&eig.eigenvalues, true);
    let mut emb = Mat::zeros(n, k);
    for (j, &i) in idx[1..=k].iter().enumerate() {
        let w = 1.0 / eig.eigenvalues[i].max(1e-10);
        emb.column_mut(j)
            .copy_from(&(w * eig.eigenvectors.column(i)));
    }

    Ok(emb)
}

/// Reduce a k-dimensional embedding to 2-D via PCA
pub fn reduce_to_2d(emb: &Mat) -> Mat {
    use trace_util::traits::MatOps;

    let n = emb.nrows();
    if emb.ncols() == 2 {
        return emb.clone();
    }

    let mut centered = emb.clone();
    centered.centre_columns_inplace();
    let pca = (centered.transpose() * &centered).symmetric_eigen();
    let idx = argsort(&pca.eigenvalues, false);

    let mut coords = Mat::zeros(n, 2);
    coords
        .column_mut(0)
        .copy_from(&(&centered * pca.eigenvectors.column(idx[0])));
    coords
        .column_mut(1)
        .copy_from(&(&centered * pca.eigenvectors.column(idx[1])));
    coords
}

fn argsort(vals: &DVec, asc: bool) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..vals.len()).collect();
    idx.sort_by(|&a, &b| {
        let c = vals[a].partial_cmp(&vals[b]).expect("NaN eigenvalue");
        if asc {
            c
        } else {
            c.reverse()
        }
    });
    idx
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_distances(n: usize) -> Vec<f32> {
        (0..n * n)
            .map(|idx| {
                let i = idx / n;
                let j = idx % n;
                (i as f32 - j as f32).abs()
            })
            .collect()
    }

    #[test]
    fn tsne_small() {
        let n = 5;
        let tsne = TSne::default().perplexity(2.0).n_iter(100);
        let result = tsne.fit(&line_distances(n), n, None).unwrap();
        assert_eq!(result.len(), n * 2);
        assert!(result.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn tsne_separates_two_groups() {
        // 0..3 tight, 4..7 tight, groups far apart
        let n = 8;
        let distances: Vec<f32> = (0..n * n)
            .map(|idx| {
                let i = idx / n;
                let j = idx % n;
                if i == j {
                    0.0
                } else if (i < 4) == (j < 4) {
                    1.0
                } else {
                    20.0
                }
            })
            .collect();

        let tsne = TSne::default().perplexity(2.0).n_iter(300);
        let y = tsne.fit(&distances, n, None).unwrap();

        let dist = |a: usize, b: usize| -> f32 {
            let dx = y[2 * a] - y[2 * b];
            let dy = y[2 * a + 1] - y[2 * b + 1];
            (dx * dx + dy * dy).sqrt()
        };

        // within-group distances should be smaller than across-group
        let within = dist(0, 1) + dist(4, 5);
        let across = dist(0, 4) + dist(1, 5);
        assert!(within < across, "within {} vs across {}", within, across);
    }

    #[test]
    fn tsne_rejects_bad_shapes() {
        let tsne = TSne::default();
        assert!(tsne.fit(&[0.0; 5], 3, None).is_err());
        assert!(tsne.fit(&[0.0; 9], 3, Some(&[0.0; 4])).is_err());
    }

    #[test]
    fn cosine_similarity_diagonal_is_one() {
        let x = Mat::from_row_slice(2, 3, &[1.0, 0.0, 2.0, 0.0, 3.0, 2.0]);
        let sim = compute_cosine_similarity(&x);

        for i in 0..3 {
            approx::assert_abs_diff_eq!(sim[(i, i)], 1.0, epsilon = 1e-5);
        }
        approx::assert_abs_diff_eq!(sim[(0, 1)], 0.0, epsilon = 1e-5);
    }

    #[test]
    fn spectral_embed_needs_three_samples() {
        // a 2-trace latent is a valid clustering output, so this must
        // surface as an error rather than a panic
        let sim = regularize_similarity(&Mat::from_element(2, 2, 1.0), 0.01);
        assert!(spectral_embed(&sim, 10).is_err());

        let one = Mat::from_element(1, 1, 1.0);
        assert!(spectral_embed(&one, 2).is_err());
    }

    #[test]
    fn spectral_embed_separates_blocks() {
        // block-diagonal similarity: two groups of 3
        let n = 6;
        let mut sim = Mat::zeros(n, n);
        for i in 0..n {
            for j in 0..n {
                if (i < 3) == (j < 3) {
                    sim[(i, j)] = 1.0;
                }
            }
        }
        let sim = regularize_similarity(&sim, 0.01);

        let emb = spectral_embed(&sim, 2).unwrap();
        assert_eq!(emb.nrows(), n);
        assert_eq!(emb.ncols(), 2);

        let coords = reduce_to_2d(&emb);
        assert_eq!(coords.ncols(), 2);
    }
}
