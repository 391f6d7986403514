//! Graph-based community detection over a latent representation
//!
//! The kNN graph and the Leiden network are built once; the resolution
//! sweep reuses them, so adding resolutions costs only the Leiden
//! iterations themselves.

use crate::common::*;

use leiden::clustering::SimpleClustering;
use leiden::leiden::Leiden;
use leiden::network::Graph;
use leiden::{Clustering, Network};
use trace_util::knn_graph::{KnnGraph, KnnGraphArgs};
use trace_util::traits::MatOps;

/// Clustering result at one resolution
#[derive(Debug, Clone)]
pub struct ClusterResult {
    /// Cluster assignment per sample
    pub labels: Vec<usize>,
    /// Number of clusters
    pub n_clusters: usize,
}

impl ClusterResult {
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut counts = vec![0; self.n_clusters];
        for &label in &self.labels {
            if label < self.n_clusters {
                counts[label] += 1;
            }
        }
        counts
    }

    /// Cluster size histogram as ASCII, up to `max_show` largest
    /// clusters sorted by size (descending).
    pub fn histogram_ascii(&self, max_width: usize, max_show: usize) -> String {
        let sizes = self.cluster_sizes();

        let mut ranked: Vec<(usize, usize)> = sizes
            .iter()
            .enumerate()
            .filter(|(_, &s)| s > 0)
            .map(|(id, &s)| (id, s))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));

        let n_total = ranked.len();
        let n_show = max_show.min(n_total);
        let max_size = ranked.first().map(|&(_, s)| s).unwrap_or(1);

        let mut lines = Vec::new();
        lines.push(format!(
            "Cluster assignments ({} traces, {} clusters):",
            self.labels.len(),
            n_total
        ));
        lines.push(String::new());

        for &(cluster_id, size) in ranked.iter().take(n_show) {
            let pct = 100.0 * size as f64 / self.labels.len() as f64;
            let bar_len = ((size as f64 / max_size as f64) * max_width as f64) as usize;
            let bar = "█".repeat(bar_len.max(1));

            lines.push(format!(
                "  Cluster {:3}  {:>6} traces ({:>5.1}%)  {}",
                cluster_id, size, pct, bar
            ));
        }

        if n_total > n_show {
            let hidden: usize = ranked[n_show..].iter().map(|&(_, s)| s).sum();
            lines.push(format!(
                "  ... and {} more clusters ({} traces, {:.1}%)",
                n_total - n_show,
                hidden,
                100.0 * hidden as f64 / self.labels.len() as f64
            ));
        }

        lines.join("\n")
    }
}

/// A kNN graph converted to a Leiden network, reusable across resolutions
pub struct LeidenEngine {
    network: Network,
    n_nodes: usize,
    total_edge_weight: f64,
    seed: Option<usize>,
}

impl LeidenEngine {
    /// Build the network from a latent representation (samples × features).
    ///
    /// Columns are z-scored before the kNN search so no single feature
    /// dominates the Euclidean metric.
    pub fn from_latent(latent: &Mat, knn: usize, seed: Option<u64>) -> anyhow::Result<Self> {
        let n = latent.nrows();
        if n < 2 {
            anyhow::bail!("need at least 2 samples for community detection");
        }

        let mut latent_z = latent.clone();
        latent_z.scale_columns_inplace();

        info!("building kNN graph (k={}) for {} samples ...", knn, n);
        let graph = KnnGraph::from_rows(
            &latent_z,
            KnnGraphArgs {
                knn,
                block_size: 1000,
                reciprocal: false,
            },
        )?;

        info!(
            "kNN graph: {} nodes, {} edges, {} connected component(s)",
            graph.num_nodes(),
            graph.num_edges(),
            count_components(&graph)
        );

        // Modularity quality increment: Δ = w_jl - γ · k_j · K_l / (2m)
        // The Leiden crate uses CPM form: Δ = w_jl - node_w · cluster_w · res
        // Setting node weights = degree and res = γ/(2m) gives modularity.
        let weights = graph.fuzzy_kernel_weights();

        let mut node_degree = vec![0.0f32; n];
        let mut total_edge_weight = 0.0f64;
        for (&(i, j), &w) in graph.edges.iter().zip(weights.iter()) {
            node_degree[i] += w;
            node_degree[j] += w;
            total_edge_weight += w as f64;
        }

        let mut leiden_graph = Graph::with_capacity(n, graph.num_edges());
        for &degree in node_degree.iter() {
            leiden_graph.add_node(degree);
        }
        for (&(i, j), &w) in graph.edges.iter().zip(weights.iter()) {
            leiden_graph.add_edge((i as u32).into(), (j as u32).into(), w);
        }

        Ok(Self {
            network: Network::new_from_graph(leiden_graph),
            n_nodes: n,
            total_edge_weight,
            seed: seed.map(|s| s as usize),
        })
    }

    /// Run Leiden at one modularity resolution.
    pub fn cluster(&self, resolution: f64) -> ClusterResult {
        // modularity γ → CPM resolution = γ / (2m)
        let scaled = resolution / (2.0 * self.total_edge_weight);
        info!(
            "Leiden at resolution {:.4} (scaled {:.6e}) ...",
            resolution, scaled
        );

        let mut leiden = Leiden::new(scaled, 0.01, self.seed);
        let mut clustering = SimpleClustering::init_different_clusters(self.n_nodes);

        let max_outer = 10;
        for iter in 0..max_outer {
            let updated = leiden.iterate(&self.network, &mut clustering);
            info!(
                "  iteration {}: {} clusters{}",
                iter + 1,
                clustering.num_clusters(),
                if !updated { " (converged)" } else { "" }
            );
            if !updated {
                break;
            }
        }

        let labels: Vec<usize> = (0..self.n_nodes).map(|i| clustering.get(i)).collect();
        ClusterResult {
            labels,
            n_clusters: clustering.num_clusters(),
        }
    }

    /// Run the sweep over every configured resolution on the shared network.
    pub fn sweep(&self, resolutions: &[f64]) -> Vec<(f64, ClusterResult)> {
        resolutions
            .iter()
            .map(|&res| {
                let result = self.cluster(res);
                info!(
                    "resolution {:.4}: {} clusters",
                    res, result.n_clusters
                );
                (res, result)
            })
            .collect()
    }
}

/// Count connected components in the kNN graph using DFS.
fn count_components(graph: &KnnGraph) -> usize {
    let n = graph.num_nodes();
    let mut visited = vec![false; n];
    let mut n_components = 0;

    for start in 0..n {
        if visited[start] {
            continue;
        }
        n_components += 1;
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            if visited[node] {
                continue;
            }
            visited[node] = true;
            for &neighbor in graph.neighbors(node) {
                if !visited[neighbor] {
                    stack.push(neighbor);
                }
            }
        }
    }

    n_components
}
