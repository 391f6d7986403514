//! Reload a snapshot and compute a 2-D embedding of the traces

use crate::common::*;
use crate::snapshot::*;
use crate::visualization_alg::*;

use trace_util::traits::IoOps;

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq)]
#[clap(rename_all = "lowercase")]
pub enum EmbeddingMethod {
    /// t-SNE on pairwise latent distances
    #[default]
    Tsne,
    /// Normalized-Laplacian spectral embedding of the cosine
    /// similarity graph
    Spectral,
}

#[derive(Args, Debug)]
pub struct VisualizeArgs {
    /// snapshot written by the `cluster` command
    #[arg(long, short = 's', required = true)]
    pub snapshot: Box<str>,

    #[arg(long, short = 'M', default_value = "tsne")]
    pub method: EmbeddingMethod,

    /// t-SNE perplexity
    #[arg(long, default_value_t = 30.0)]
    pub perplexity: f32,

    /// t-SNE gradient descent iterations
    #[arg(long, default_value_t = 1000)]
    pub n_iter: usize,

    /// number of eigenvectors for the spectral embedding
    #[arg(long, default_value_t = 10)]
    pub num_eigen: usize,

    /// output file prefix; writes `{out}.coords.parquet`
    #[arg(long, short = 'o', required = true)]
    pub out: Box<str>,

    #[arg(long, short = 'v')]
    pub verbose: bool,
}

pub fn fit_visualize(args: &VisualizeArgs) -> anyhow::Result<()> {
    setup_logging(args.verbose);

    let snapshot = AnalysisSnapshot::load(&args.snapshot)?;
    let n = snapshot.latent.nrows();
    info!(
        "loaded snapshot: {} traces x {} components, {} resolution(s)",
        n,
        snapshot.latent.ncols(),
        snapshot.resolutions.len()
    );

    let coords = match args.method {
        EmbeddingMethod::Tsne => {
            info!(
                "t-SNE: perplexity {}, {} iterations",
                args.perplexity, args.n_iter
            );
            let distances = pairwise_euclidean(&snapshot.latent);
            let flat = TSne::default()
                .perplexity(args.perplexity)
                .n_iter(args.n_iter)
                .fit(&distances, n, None)?;
            Mat::from_row_slice(n, 2, &flat)
        }
        EmbeddingMethod::Spectral => {
            info!("spectral embedding: {} eigenvectors", args.num_eigen);
            let similarity = compute_cosine_similarity(&snapshot.latent.transpose());
            let similarity = regularize_similarity(&similarity, 0.01);
            let emb = spectral_embed(&similarity, args.num_eigen)?;
            reduce_to_2d(&emb)
        }
    };

    // join coordinates with the per-resolution cluster labels
    let mut table = Mat::zeros(n, 2 + snapshot.resolutions.len());
    table.column_mut(0).copy_from(&coords.column(0));
    table.column_mut(1).copy_from(&coords.column(1));
    for (k, labels) in snapshot.labels.iter().enumerate() {
        for (i, &label) in labels.iter().enumerate() {
            table[(i, 2 + k)] = label as f32;
        }
    }

    let mut column_names: Vec<Box<str>> = vec!["x".into(), "y".into()];
    column_names.extend(
        snapshot
            .resolutions
            .iter()
            .map(|res| format!("leiden_{}", res).into_boxed_str()),
    );

    let coords_file = format!("{}.coords.parquet", args.out);
    table.to_parquet(Some(&snapshot.samples), Some(&column_names), &coords_file)?;
    info!("wrote embedding coordinates to {}", coords_file);

    Ok(())
}

/// Row-major n x n Euclidean distance matrix between matrix rows
pub fn pairwise_euclidean(x_nk: &Mat) -> Vec<f32> {
    let n = x_nk.nrows();
    let mut distances = vec![0.0f32; n * n];
    for i in 0..n {
        for j in (i + 1)..n {
            let d = (x_nk.row(i) - x_nk.row(j)).norm();
            distances[i * n + j] = d;
            distances[j * n + i] = d;
        }
    }
    distances
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairwise_euclidean_symmetric_zero_diagonal() {
        let x = Mat::from_row_slice(3, 2, &[0.0, 0.0, 3.0, 4.0, 0.0, 1.0]);
        let d = pairwise_euclidean(&x);

        assert_eq!(d[0], 0.0);
        assert_eq!(d[4], 0.0);
        approx::assert_abs_diff_eq!(d[1], 5.0, epsilon = 1e-5);
        assert_eq!(d[1], d[3]);
        approx::assert_abs_diff_eq!(d[2], 1.0, epsilon = 1e-5);
    }

    #[test]
    fn visualize_writes_coords() {
        let dir = tempfile::tempdir().unwrap();
        let snap_path = dir.path().join("snap.json.gz");
        let snap_path = snap_path.to_str().unwrap();

        // two tight groups in latent space
        let mut latent = Mat::zeros(8, 3);
        for i in 0..8 {
            let offset = if i < 4 { 0.0 } else { 20.0 };
            latent[(i, 0)] = offset + 0.1 * i as f32;
            latent[(i, 1)] = offset;
            latent[(i, 2)] = 0.5;
        }

        let snapshot = AnalysisSnapshot {
            samples: (0..8)
                .map(|j| format!("trace_{}", j).into_boxed_str())
                .collect(),
            age: None,
            batch: None,
            dropped_samples: vec![],
            latent,
            resolutions: vec![1.0],
            labels: vec![vec![0, 0, 0, 0, 1, 1, 1, 1]],
        };
        snapshot.save(snap_path).unwrap();

        let out = dir.path().join("viz");
        let out = out.to_str().unwrap();

        let args = VisualizeArgs {
            snapshot: snap_path.into(),
            method: EmbeddingMethod::Spectral,
            perplexity: 5.0,
            n_iter: 100,
            num_eigen: 3,
            out: out.into(),
            verbose: false,
        };

        fit_visualize(&args).unwrap();

        let coords_file = format!("{}.coords.parquet", out);
        let loaded = Mat::from_parquet(&coords_file).unwrap();
        assert_eq!(loaded.mat.nrows(), 8);
        assert_eq!(loaded.mat.ncols(), 3);
        assert_eq!(loaded.cols[0].as_ref(), "x");
        assert_eq!(loaded.cols[2].as_ref(), "leiden_1");
        // cluster column survives the round trip
        assert_eq!(loaded.mat[(7, 2)], 1.0);
    }
}
