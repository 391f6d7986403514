use crate::common_io::{Delimiter, MatWithNames};

/// Normalize or scale columns
pub trait MatOps {
    type Mat;
    type Scalar;

    fn normalize_columns_inplace(&mut self);
    fn normalize_columns(&self) -> Self::Mat;
    fn scale_columns_inplace(&mut self);
    fn scale_columns(&self) -> Self::Mat;
    fn centre_columns_inplace(&mut self);
    fn centre_columns(&self) -> Self::Mat;
}

/// Operations to sample random matrices
pub trait SampleOps {
    type Mat;
    type Scalar;

    /// Sample a matrix from a uniform distribution `U(0,1)`
    fn runif(dd: usize, nn: usize) -> Self::Mat;

    /// Sample a matrix from a normal distribution `N(0,1)`
    fn rnorm(dd: usize, nn: usize) -> Self::Mat;
}

/// Read and write matrices from and to files
pub trait IoOps: Sized {
    type Scalar;

    fn read_file_delim(
        file: &str,
        delim: impl Into<Delimiter>,
        skip: Option<usize>,
    ) -> anyhow::Result<Self>;

    fn from_tsv(tsv_file: &str, skip: Option<usize>) -> anyhow::Result<Self> {
        Self::read_file_delim(tsv_file, "\t", skip)
    }

    /// Read a matrix along with row and column names
    ///
    /// * `delim` - set of delimiter characters
    /// * `hdr_line` - location of a header line with column names
    /// * `row_name_index` - which column carries the row names
    fn read_data(
        file: &str,
        delim: impl Into<Delimiter>,
        hdr_line: Option<usize>,
        row_name_index: Option<usize>,
    ) -> anyhow::Result<MatWithNames<Self>>;

    fn write_file_delim(&self, file: &str, delim: &str) -> anyhow::Result<()>;

    fn to_tsv(&self, tsv_file: &str) -> anyhow::Result<()> {
        self.write_file_delim(tsv_file, "\t")
    }

    fn to_csv(&self, csv_file: &str) -> anyhow::Result<()> {
        self.write_file_delim(csv_file, ",")
    }

    /// Write a matrix to parquet with optional row and column names
    fn to_parquet(
        &self,
        row_names: Option<&[Box<str>]>,
        column_names: Option<&[Box<str>]>,
        file_path: &str,
    ) -> anyhow::Result<()>;

    /// Read back a matrix written by `to_parquet`
    fn from_parquet(file_path: &str) -> anyhow::Result<MatWithNames<Self>>;
}
