//! Full pipeline: impute, normalize, PCA, Leiden at several resolutions

use crate::cluster::*;
use crate::common::*;
use crate::impute::*;
use crate::normalize::*;
use crate::snapshot::*;
use crate::strand_input::*;

use std::io::Write;
use trace_util::common_io::open_buf_writer;
use trace_util::dmatrix_rsvd::RSVD;
use trace_util::traits::IoOps;

#[derive(Args, Debug)]
pub struct ClusterArgs {
    #[command(flatten)]
    pub input: TraceInputArgs,

    /// drop traces with `coverage <= min_traces` measured pairs
    #[arg(long, short = 'm', default_value_t = 0)]
    pub min_traces: usize,

    /// number of nearest neighbours for the trace graph
    #[arg(long, short = 'k', default_value_t = DEFAULT_KNN)]
    pub knn: usize,

    /// number of principal components
    #[arg(long, default_value_t = DEFAULT_NUM_PCS)]
    pub num_pcs: usize,

    /// comma-separated list of Leiden resolutions
    #[arg(long, short = 'r', value_delimiter = ',', default_value = "0.5,1.0,2.0")]
    pub resolutions: Vec<f64>,

    /// random seed for community detection
    #[arg(long)]
    pub seed: Option<u64>,

    /// output file prefix; writes `{out}.clusters.tsv.gz`,
    /// `{out}.projection.parquet` and `{out}.snapshot.json.gz`
    #[arg(long, short = 'o', required = true)]
    pub out: Box<str>,

    /// verbose output with cluster statistics
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

pub fn fit_cluster(args: &ClusterArgs) -> anyhow::Result<()> {
    setup_logging(args.verbose);
    anyhow::ensure!(!args.resolutions.is_empty(), "no resolutions given");

    let data = read_trace_data(&args.input)?;
    let imputed = impute_zero_distances(&data.distances, args.min_traces)?;

    // join metadata to the retained traces
    let samples: Vec<Box<str>> = imputed
        .retained
        .iter()
        .map(|&j| data.samples[j].clone())
        .collect();
    let dropped_samples: Vec<Box<str>> = imputed
        .dropped
        .iter()
        .map(|&j| data.samples[j].clone())
        .collect();
    let age = data
        .age
        .as_ref()
        .map(|age| imputed.retained.iter().map(|&j| age[j]).collect::<Vec<_>>());
    let batch = data.batch.as_ref().map(|batch| {
        imputed
            .retained
            .iter()
            .map(|&j| batch[j].clone())
            .collect::<Vec<_>>()
    });

    let latent = pca_latent(&imputed.matrix, args.num_pcs)?;
    info!(
        "PCA latent: {} traces x {} components",
        latent.nrows(),
        latent.ncols()
    );

    let engine = LeidenEngine::from_latent(&latent, args.knn, args.seed)?;
    let results = engine.sweep(&args.resolutions);

    if args.verbose {
        for (res, result) in results.iter() {
            eprintln!();
            eprintln!("resolution {:.4}", res);
            eprintln!("{}", result.histogram_ascii(50, 20));
        }
        eprintln!();
    }

    let clusters_file = format!("{}.clusters.tsv.gz", args.out);
    write_cluster_table(
        &samples,
        age.as_deref(),
        batch.as_deref(),
        &results,
        &clusters_file,
    )?;
    info!("wrote cluster table to {}", clusters_file);

    let projection_file = format!("{}.projection.parquet", args.out);
    let pc_names: Vec<Box<str>> = (0..latent.ncols())
        .map(|k| format!("pc_{}", k + 1).into_boxed_str())
        .collect();
    latent.to_parquet(Some(&samples), Some(&pc_names), &projection_file)?;
    info!("wrote PCA projection to {}", projection_file);

    let snapshot = AnalysisSnapshot {
        samples,
        age,
        batch,
        dropped_samples,
        latent,
        resolutions: args.resolutions.clone(),
        labels: results.into_iter().map(|(_, r)| r.labels).collect(),
    };
    snapshot.save(&format!("{}.snapshot.json.gz", args.out))?;

    Ok(())
}

/// Normalize the imputed pair × trace matrix and project traces onto
/// the leading principal components: latent = V * diag(S).
pub fn pca_latent(imputed: &Mat, num_pcs: usize) -> anyhow::Result<Mat> {
    let normalized = normalize_distances(imputed);

    let rank = num_pcs
        .min(normalized.nrows().saturating_sub(1))
        .min(normalized.ncols().saturating_sub(1))
        .max(1);

    let (_, dd, vv) = normalized.rsvd(rank)?;
    Ok(vv * Mat::from_diagonal(&dd))
}

fn write_cluster_table(
    samples: &[Box<str>],
    age: Option<&[f32]>,
    batch: Option<&[Box<str>]>,
    results: &[(f64, ClusterResult)],
    file_path: &str,
) -> anyhow::Result<()> {
    let mut buf = open_buf_writer(file_path)?;

    write!(buf, "sample\tage\tbatch")?;
    for (res, _) in results {
        write!(buf, "\tleiden_{}", res)?;
    }
    writeln!(buf)?;

    for (i, sample) in samples.iter().enumerate() {
        write!(buf, "{}", sample)?;
        match age {
            Some(age) => write!(buf, "\t{}", age[i])?,
            None => write!(buf, "\tNA")?,
        }
        match batch {
            Some(batch) => write!(buf, "\t{}", batch[i])?,
            None => write!(buf, "\tNA")?,
        }
        for (_, result) in results {
            write!(buf, "\t{}", result.labels[i])?;
        }
        writeln!(buf)?;
    }
    buf.flush()?;
    Ok(())
}
