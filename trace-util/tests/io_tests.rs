use trace_util::common_io::create_temp_dir_file;
use trace_util::traits::{IoOps, SampleOps};

#[test]
fn dmatrix_io_test() -> anyhow::Result<()> {
    let xx = nalgebra::DMatrix::<f32>::runif(50, 50);

    let tsv_file = create_temp_dir_file("txt.gz")?;
    let tsv_file = tsv_file.to_str().unwrap();
    xx.to_tsv(tsv_file)?;

    let yy = nalgebra::DMatrix::<f32>::read_file_delim(tsv_file, "\t", None)?;

    approx::assert_abs_diff_eq!(xx, yy);

    Ok(())
}

#[test]
fn dmatrix_parquet_test() -> anyhow::Result<()> {
    let xx = nalgebra::DMatrix::<f32>::runif(20, 5);

    let row_names: Vec<Box<str>> = (0..20)
        .map(|i| format!("pair_{}", i).into_boxed_str())
        .collect();
    let col_names: Vec<Box<str>> = (0..5)
        .map(|j| format!("trace_{}", j).into_boxed_str())
        .collect();

    let parquet_file = create_temp_dir_file(".parquet")?;
    let parquet_file = parquet_file.to_str().unwrap();
    xx.to_parquet(Some(&row_names), Some(&col_names), parquet_file)?;

    let yy = nalgebra::DMatrix::<f32>::from_parquet(parquet_file)?;

    assert_eq!(yy.rows, row_names);
    assert_eq!(yy.cols, col_names);
    approx::assert_abs_diff_eq!(xx, yy.mat, epsilon = 1e-6);

    Ok(())
}

#[test]
fn dmatrix_malformed_value_is_an_error() -> anyhow::Result<()> {
    use trace_util::common_io::write_lines;

    let lines: Vec<Box<str>> = vec!["0\t2\t4".into(), "1\tabc\t1".into()];

    let tsv_file = create_temp_dir_file(".tsv")?;
    let tsv_file = tsv_file.to_str().unwrap();
    write_lines(&lines, tsv_file)?;

    let out = nalgebra::DMatrix::<f32>::read_file_delim(tsv_file, "\t", None);
    assert!(out.is_err());

    let message = format!("{}", out.unwrap_err());
    assert!(message.contains("abc"), "error should name the bad token");

    Ok(())
}

#[test]
fn dmatrix_read_data_with_names_test() -> anyhow::Result<()> {
    use trace_util::common_io::write_lines;

    let lines: Vec<Box<str>> = vec![
        "pair\tt0\tt1\tt2".into(),
        "p0\t0\t2\t4".into(),
        "p1\t1\t0\t1".into(),
    ];

    let tsv_file = create_temp_dir_file(".tsv")?;
    let tsv_file = tsv_file.to_str().unwrap();
    write_lines(&lines, tsv_file)?;

    let out = nalgebra::DMatrix::<f32>::read_data(tsv_file, "\t", Some(0), Some(0))?;

    assert_eq!(out.rows, vec!["p0".into(), "p1".into()]);
    assert_eq!(out.cols, vec!["t0".into(), "t1".into(), "t2".into()]);
    assert_eq!(out.mat.nrows(), 2);
    assert_eq!(out.mat.ncols(), 3);
    assert_eq!(out.mat[(0, 2)], 4.0);
    assert_eq!(out.mat[(1, 1)], 0.0);

    Ok(())
}
