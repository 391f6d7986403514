use crate::common::*;

use anyhow::ensure;
use trace_util::common_io::{extension, read_lines};
use trace_util::traits::IoOps;

/// Everything the pipeline needs, read and validated up front
pub struct TraceData {
    /// pair identifiers, one per matrix row
    pub pairs: Vec<Box<str>>,
    /// sample/trace identifiers, one per matrix column
    pub samples: Vec<Box<str>>,
    /// pairwise distances, pairs × samples
    pub distances: Mat,
    pub age: Option<Vec<f32>>,
    pub batch: Option<Vec<Box<str>>>,
}

#[derive(Args, Debug, Clone)]
pub struct TraceInputArgs {
    /// pairwise distance matrix file: `.tsv`, `.csv` (optionally
    /// gzipped) or `.parquet`, rows = pairs, columns = traces
    #[arg(long, short = 'd', value_name = "FILE")]
    pub distance_file: String,

    /// pair identifiers, one per line, matching the matrix rows
    #[arg(long, short = 'p', value_name = "FILE")]
    pub pair_file: String,

    /// trace identifiers, one per line; synthesized when not given
    #[arg(long, short = 's', value_name = "FILE")]
    pub sample_file: Option<String>,

    /// numeric age per trace, one per line
    #[arg(long, value_name = "FILE")]
    pub age_file: Option<String>,

    /// batch label per trace, one per line
    #[arg(long, value_name = "FILE")]
    pub batch_file: Option<String>,
}

/// Read the distance matrix and all metadata, failing fast on any
/// dimension mismatch before the analysis starts.
pub fn read_trace_data(args: &TraceInputArgs) -> anyhow::Result<TraceData> {
    let distances = read_distance_matrix(&args.distance_file)?;
    info!(
        "distance matrix: {} pairs x {} traces",
        distances.nrows(),
        distances.ncols()
    );

    let pairs = read_lines(&args.pair_file)?;
    ensure!(
        pairs.len() == distances.nrows(),
        "{} pair names but {} matrix rows",
        pairs.len(),
        distances.nrows()
    );

    let samples = match args.sample_file.as_deref() {
        Some(file) => {
            let samples = read_lines(file)?;
            ensure!(
                samples.len() == distances.ncols(),
                "{} sample names but {} matrix columns",
                samples.len(),
                distances.ncols()
            );
            samples
        }
        None => (0..distances.ncols())
            .map(|j| format!("trace_{}", j).into_boxed_str())
            .collect(),
    };

    let age = match args.age_file.as_deref() {
        Some(file) => {
            let values = read_lines(file)?
                .iter()
                .map(|x| {
                    x.trim()
                        .parse::<f32>()
                        .map_err(|_| anyhow::anyhow!("invalid age value: {}", x))
                })
                .collect::<anyhow::Result<Vec<_>>>()?;
            ensure!(
                values.len() == distances.ncols(),
                "{} age values but {} matrix columns",
                values.len(),
                distances.ncols()
            );
            Some(values)
        }
        None => None,
    };

    let batch = match args.batch_file.as_deref() {
        Some(file) => {
            let labels = read_lines(file)?;
            ensure!(
                labels.len() == distances.ncols(),
                "{} batch labels but {} matrix columns",
                labels.len(),
                distances.ncols()
            );
            Some(labels)
        }
        None => None,
    };

    Ok(TraceData {
        pairs,
        samples,
        distances,
        age,
        batch,
    })
}

/// Read a matrix by file extension: parquet or delimited text.
/// Gzipped text is handled transparently downstream.
pub fn read_distance_matrix(file: &str) -> anyhow::Result<Mat> {
    match extension(file)?.as_ref() {
        "parquet" => Ok(Mat::from_parquet(file)?.mat),
        _ => Mat::read_file_delim(file, &['\t', ','], None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(dir: &tempfile::TempDir, name: &str, content: &str) -> String {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, "{}", content).unwrap();
        path.to_str().unwrap().to_string()
    }

    #[test]
    fn reads_matrix_with_synthesized_sample_names() {
        let dir = tempfile::tempdir().unwrap();
        let mat = write_temp(&dir, "dist.tsv", "0\t2\t4\n1\t0\t1\n");
        let pairs = write_temp(&dir, "pairs.txt", "p0:p1\np0:p2\n");

        let args = TraceInputArgs {
            distance_file: mat,
            pair_file: pairs,
            sample_file: None,
            age_file: None,
            batch_file: None,
        };

        let data = read_trace_data(&args).unwrap();
        assert_eq!(data.distances.nrows(), 2);
        assert_eq!(data.distances.ncols(), 3);
        assert_eq!(data.samples[0].as_ref(), "trace_0");
        assert_eq!(data.samples[2].as_ref(), "trace_2");
        assert_eq!(data.distances[(0, 2)], 4.0);
    }

    #[test]
    fn pair_count_mismatch_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mat = write_temp(&dir, "dist.tsv", "0\t2\t4\n1\t0\t1\n");
        let pairs = write_temp(&dir, "pairs.txt", "p0:p1\n");

        let args = TraceInputArgs {
            distance_file: mat,
            pair_file: pairs,
            sample_file: None,
            age_file: None,
            batch_file: None,
        };

        assert!(read_trace_data(&args).is_err());
    }

    #[test]
    fn age_length_checked_against_columns() {
        let dir = tempfile::tempdir().unwrap();
        let mat = write_temp(&dir, "dist.tsv", "0\t2\t4\n1\t0\t1\n");
        let pairs = write_temp(&dir, "pairs.txt", "p0:p1\np0:p2\n");
        let age = write_temp(&dir, "age.txt", "1.0\n2.0\n");

        let args = TraceInputArgs {
            distance_file: mat,
            pair_file: pairs,
            sample_file: None,
            age_file: Some(age),
            batch_file: None,
        };

        assert!(read_trace_data(&args).is_err());
    }

    #[test]
    fn reads_metadata_when_lengths_match() {
        let dir = tempfile::tempdir().unwrap();
        let mat = write_temp(&dir, "dist.csv", "0,2,4\n1,0,1\n");
        let pairs = write_temp(&dir, "pairs.txt", "p0:p1\np0:p2\n");
        let samples = write_temp(&dir, "samples.txt", "a\nb\nc\n");
        let age = write_temp(&dir, "age.txt", "30\n40\n50\n");
        let batch = write_temp(&dir, "batch.txt", "b1\nb1\nb2\n");

        let args = TraceInputArgs {
            distance_file: mat,
            pair_file: pairs,
            sample_file: Some(samples),
            age_file: Some(age),
            batch_file: Some(batch),
        };

        let data = read_trace_data(&args).unwrap();
        assert_eq!(data.samples[1].as_ref(), "b");
        assert_eq!(data.age.as_ref().unwrap()[2], 50.0);
        assert_eq!(data.batch.as_ref().unwrap()[2].as_ref(), "b2");
    }
}
