#![allow(dead_code)]

pub use log::info;

pub use clap::{Args, Parser, Subcommand, ValueEnum};

pub type Mat = nalgebra::DMatrix<f32>;
pub type DVec = nalgebra::DVector<f32>;

pub const DEFAULT_KNN: usize = 15;
pub const DEFAULT_NUM_PCS: usize = 50;

/// Turn on `info`-level logging when `--verbose` is set
pub fn setup_logging(verbose: bool) {
    if verbose && std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    let _ = env_logger::try_init();
}
