use crate::common_io::{
    read_lines_of_types, read_lines_of_words_delim, write_lines, Delimiter, MatWithNames,
};
use crate::parquet_io::*;
use crate::traits::IoOps;
use nalgebra::DMatrix;
use num_traits::{FromPrimitive, ToPrimitive};

use std::fmt::{Debug, Display};
use std::str::FromStr;

impl<T> IoOps for DMatrix<T>
where
    T: PartialOrd
        + FromPrimitive
        + ToPrimitive
        + nalgebra::Scalar
        + Send
        + FromStr
        + Display
        + Copy,
    <T as FromStr>::Err: Debug,
{
    type Scalar = T;

    fn read_file_delim(
        file_path: &str,
        delim: impl Into<Delimiter>,
        skip: Option<usize>,
    ) -> anyhow::Result<Self> {
        let hdr_line = match skip {
            Some(skip) => skip as i64,
            None => -1, // no skipping
        };

        let data = read_lines_of_types::<T>(file_path, delim, hdr_line)?.lines;

        if data.is_empty() {
            return Err(anyhow::anyhow!("No data in file"));
        }

        let ncols = data[0].len();
        let nrows = data.len();
        let data = data.into_iter().flatten().collect::<Vec<_>>();

        Ok(DMatrix::<T>::from_row_iterator(nrows, ncols, data))
    }

    fn read_data(
        file_path: &str,
        delim: impl Into<Delimiter>,
        hdr_line: Option<usize>,
        row_name_index: Option<usize>,
    ) -> anyhow::Result<MatWithNames<Self>> {
        let hdr = hdr_line.map(|x| x as i64).unwrap_or(-1);
        let out = read_lines_of_words_delim(file_path, delim, hdr)?;

        if out.lines.is_empty() {
            return Err(anyhow::anyhow!("No data in file"));
        }

        let name_idx = row_name_index.unwrap_or(0);
        let width = out.lines[0].len();
        if name_idx >= width {
            return Err(anyhow::anyhow!(
                "row name column {} out of bounds (width {})",
                name_idx,
                width
            ));
        }

        let nrows = out.lines.len();
        let ncols = width - 1;

        let mut rows = Vec::with_capacity(nrows);
        let mut data: Vec<T> = Vec::with_capacity(nrows * ncols);

        for (i, words) in out.lines.iter().enumerate() {
            if words.len() != width {
                return Err(anyhow::anyhow!(
                    "ragged line {}: {} fields, expected {}",
                    i,
                    words.len(),
                    width
                ));
            }
            for (j, w) in words.iter().enumerate() {
                if j == name_idx {
                    rows.push(w.clone());
                } else {
                    data.push(
                        w.parse::<T>()
                            .map_err(|e| anyhow::anyhow!("parse error at line {}: {:?}", i, e))?,
                    );
                }
            }
        }

        let cols: Vec<Box<str>> = if out.header.len() == width {
            out.header
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != name_idx)
                .map(|(_, x)| x.clone())
                .collect()
        } else if out.header.len() == ncols {
            out.header.clone()
        } else {
            (0..ncols).map(|x| x.to_string().into_boxed_str()).collect()
        };

        Ok(MatWithNames {
            rows,
            cols,
            mat: DMatrix::<T>::from_row_iterator(nrows, ncols, data),
        })
    }

    fn write_file_delim(&self, file_path: &str, delim: &str) -> anyhow::Result<()> {
        // keep the row order; par_bridge would scramble it
        let lines = self
            .row_iter()
            .map(|row| {
                row.iter()
                    .map(|x| format!("{}", *x))
                    .collect::<Vec<String>>()
                    .join(delim)
                    .into_boxed_str()
            })
            .collect::<Vec<_>>();

        write_lines(&lines, file_path)?;
        Ok(())
    }

    fn to_parquet(
        &self,
        row_names: Option<&[Box<str>]>,
        column_names: Option<&[Box<str>]>,
        file_path: &str,
    ) -> anyhow::Result<()> {
        let (nrows, ncols) = (self.nrows(), self.ncols());

        let writer = ParquetWriter::new(file_path, (nrows, ncols), (row_names, column_names))?;

        if writer.row_names_vec().len() != nrows {
            return Err(anyhow::anyhow!("row names don't match"));
        }

        let mut file_writer = writer.open()?;
        let mut row_group_writer = file_writer.next_row_group()?;
        parquet_add_bytearray(&mut row_group_writer, writer.row_names_vec())?;

        for j in 0..ncols {
            let column: Vec<f64> = self
                .column(j)
                .iter()
                .map(|x| x.to_f64().unwrap_or(f64::NAN))
                .collect();
            parquet_add_numeric_column(&mut row_group_writer, &column)?;
        }

        row_group_writer.close()?;
        file_writer.close()?;
        Ok(())
    }

    fn from_parquet(file_path: &str) -> anyhow::Result<MatWithNames<Self>> {
        let parquet = ParquetReader::new(file_path, Some(0))?;

        let data: Vec<T> = parquet
            .row_major_data
            .into_iter()
            .map(|x| {
                T::from_f64(x).ok_or_else(|| anyhow::anyhow!("failed to convert value {}", x))
            })
            .collect::<anyhow::Result<_>>()?;

        let nrows = parquet.row_names.len();
        let ncols = parquet.column_names.len();

        Ok(MatWithNames {
            rows: parquet.row_names,
            cols: parquet.column_names,
            mat: DMatrix::<T>::from_row_iterator(nrows, ncols, data),
        })
    }
}
