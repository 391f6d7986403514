use crate::common::*;

use serde::{Deserialize, Serialize};
use std::io::Write;
use trace_util::common_io::{open_buf_reader, open_buf_writer};

/// Everything `visualize` needs to pick up where `cluster` left off
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AnalysisSnapshot {
    /// retained sample/trace names, in latent row order
    pub samples: Vec<Box<str>>,
    pub age: Option<Vec<f32>>,
    pub batch: Option<Vec<Box<str>>>,
    /// names of traces removed by the coverage filter
    pub dropped_samples: Vec<Box<str>>,
    /// PCA latent representation, samples × components
    pub latent: Mat,
    /// resolutions in sweep order
    pub resolutions: Vec<f64>,
    /// cluster labels per resolution, parallel to `resolutions`
    pub labels: Vec<Vec<usize>>,
}

impl AnalysisSnapshot {
    /// Write as (possibly gzipped) JSON
    pub fn save(&self, file_path: &str) -> anyhow::Result<()> {
        let mut writer = open_buf_writer(file_path)?;
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        info!("saved snapshot to {}", file_path);
        Ok(())
    }

    pub fn load(file_path: &str) -> anyhow::Result<Self> {
        let reader = open_buf_reader(file_path)?;
        let snapshot: Self = serde_json::from_reader(reader)?;
        anyhow::ensure!(
            snapshot.samples.len() == snapshot.latent.nrows(),
            "{} sample names but {} latent rows",
            snapshot.samples.len(),
            snapshot.latent.nrows()
        );
        anyhow::ensure!(
            snapshot.labels.len() == snapshot.resolutions.len(),
            "{} label sets but {} resolutions",
            snapshot.labels.len(),
            snapshot.resolutions.len()
        );
        Ok(snapshot)
    }
}
