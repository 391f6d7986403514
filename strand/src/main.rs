mod cluster;
mod common;
mod fit_cluster;
mod fit_impute;
mod fit_visualize;
mod impute;
mod normalize;
mod snapshot;
mod strand_input;
mod visualization_alg;

use common::*;
use fit_cluster::*;
use fit_impute::*;
use fit_visualize::*;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "STRAND",
    long_about = "Structural TRacing ANalysis of chromatin Distances\n\
		  Cluster chromosome traces from a pairwise-distance matrix:\n\
		  impute unmeasured distances, filter low-coverage traces,\n\
		  and run graph-based community detection."
)]
struct Cli {
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Impute unmeasured distances and filter low-coverage traces",
        long_about = "Zero entries mean \"not measured\": drop traces with too few\n\
		      measured pairs, then replace remaining zeros with each\n\
		      pair's mean over its measured distances.\n"
    )]
    Impute(ImputeArgs),

    #[command(
        about = "Cluster traces by Leiden community detection",
        long_about = "Full pipeline in four stages:\n\
		      (1) Impute unmeasured distances and filter low-coverage traces\n\
		      (2) Normalize and project traces onto principal components\n\
		      (3) Build a kNN graph with adaptive kernel weights\n\
		      (4) Run Leiden community detection at each resolution.\n"
    )]
    Cluster(ClusterArgs),

    #[command(
        about = "Compute a 2-D embedding from a clustering snapshot",
        long_about = "Reload the snapshot written by `cluster` and embed the traces\n\
		      in 2-D by t-SNE or spectral embedding, joining the\n\
		      coordinates with the cluster labels.\n"
    )]
    Visualize(VisualizeArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.commands {
        Commands::Impute(args) => {
            fit_impute(args)?;
        }
        Commands::Cluster(args) => {
            fit_cluster(args)?;
        }
        Commands::Visualize(args) => {
            fit_visualize(args)?;
        }
    }

    info!("Done");
    Ok(())
}
