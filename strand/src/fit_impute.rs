//! Run the zero-value imputation and coverage filter on its own

use crate::common::*;
use crate::impute::*;
use crate::strand_input::*;

use std::io::Write;
use trace_util::common_io::{open_buf_writer, write_lines};

#[derive(Args, Debug)]
pub struct ImputeArgs {
    #[command(flatten)]
    pub input: TraceInputArgs,

    /// drop traces with `coverage <= min_traces` measured pairs
    #[arg(long, short = 'm', default_value_t = 0)]
    pub min_traces: usize,

    /// output file prefix; writes `{out}.imputed.tsv.gz` and
    /// `{out}.dropped.txt`
    #[arg(long, short = 'o', required = true)]
    pub out: Box<str>,

    #[arg(long, short = 'v')]
    pub verbose: bool,
}

pub fn fit_impute(args: &ImputeArgs) -> anyhow::Result<()> {
    setup_logging(args.verbose);

    let data = read_trace_data(&args.input)?;
    let imputed = impute_zero_distances(&data.distances, args.min_traces)?;

    let retained_names: Vec<Box<str>> = imputed
        .retained
        .iter()
        .map(|&j| data.samples[j].clone())
        .collect();

    let dropped_names: Vec<Box<str>> = imputed
        .dropped
        .iter()
        .map(|&j| data.samples[j].clone())
        .collect();

    let imputed_file = format!("{}.imputed.tsv.gz", args.out);
    write_named_matrix(&imputed.matrix, &data.pairs, &retained_names, &imputed_file)?;
    info!("wrote imputed matrix to {}", imputed_file);

    let dropped_file = format!("{}.dropped.txt", args.out);
    write_lines(&dropped_names, &dropped_file)?;
    info!(
        "wrote {} dropped trace name(s) to {}",
        dropped_names.len(),
        dropped_file
    );

    Ok(())
}

/// Tab-delimited matrix with a header of column names and row names in
/// the first column
pub fn write_named_matrix(
    mat: &Mat,
    row_names: &[Box<str>],
    column_names: &[Box<str>],
    file_path: &str,
) -> anyhow::Result<()> {
    anyhow::ensure!(
        row_names.len() == mat.nrows(),
        "{} row names but {} rows",
        row_names.len(),
        mat.nrows()
    );
    anyhow::ensure!(
        column_names.len() == mat.ncols(),
        "{} column names but {} columns",
        column_names.len(),
        mat.ncols()
    );

    let mut buf = open_buf_writer(file_path)?;

    write!(buf, "pair")?;
    for name in column_names {
        write!(buf, "\t{}", name)?;
    }
    writeln!(buf)?;

    for (i, name) in row_names.iter().enumerate() {
        write!(buf, "{}", name)?;
        for j in 0..mat.ncols() {
            write!(buf, "\t{}", mat[(i, j)])?;
        }
        writeln!(buf)?;
    }
    buf.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use trace_util::common_io::read_lines;

    #[test]
    fn impute_command_writes_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let write = |name: &str, content: &str| -> String {
            let path = dir.path().join(name);
            std::fs::write(&path, content).unwrap();
            path.to_str().unwrap().to_string()
        };

        // middle trace has no measured pair and is dropped
        let mat = write("dist.tsv", "0\t0\t4\n1\t0\t1\n");
        let pairs = write("pairs.txt", "p0:p1\np0:p2\n");
        let samples = write("samples.txt", "t0\nt1\nt2\n");
        let out = dir.path().join("result");
        let out = out.to_str().unwrap();

        let args = ImputeArgs {
            input: TraceInputArgs {
                distance_file: mat,
                pair_file: pairs,
                sample_file: Some(samples),
                age_file: None,
                batch_file: None,
            },
            min_traces: 0,
            out: out.into(),
            verbose: false,
        };

        fit_impute(&args).unwrap();

        let dropped = read_lines(&format!("{}.dropped.txt", out)).unwrap();
        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].as_ref(), "t1");

        let lines = read_lines(&format!("{}.imputed.tsv.gz", out)).unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].as_ref(), "pair\tt0\tt2");
        // row 0: non-zero mean 4 fills the leading zero
        assert_eq!(lines[1].as_ref(), "p0:p1\t4\t4");
        assert_eq!(lines[2].as_ref(), "p0:p2\t1\t1");
    }
}
