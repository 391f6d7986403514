use crate::knn_match::ColumnDict;

use dashmap::DashMap;
use indicatif::ParallelProgressIterator;
use log::info;
use nalgebra::DMatrix;
use nalgebra_sparse::{CooMatrix, CscMatrix};
use rayon::prelude::*;

const DEFAULT_BLOCK_SIZE: usize = 1000;

/// Symmetric kNN backbone over a set of points
pub struct KnnGraph {
    /// Symmetric CSC adjacency matrix (n_nodes x n_nodes)
    pub adjacency: CscMatrix<f32>,
    /// Sorted edge list (i < j), deduplicated
    pub edges: Vec<(usize, usize)>,
    /// Edge distances, parallel to `edges`
    pub distances: Vec<f32>,
    /// Number of nodes
    pub n_nodes: usize,
}

pub struct KnnGraphArgs {
    pub knn: usize,
    pub block_size: usize,
    /// If true, keep only reciprocal edges (i→j AND j→i).
    /// If false, keep union edges (i→j OR j→i), using min distance.
    pub reciprocal: bool,
}

impl Default for KnnGraphArgs {
    fn default() -> Self {
        Self {
            knn: 15,
            block_size: DEFAULT_BLOCK_SIZE,
            reciprocal: false,
        }
    }
}

impl KnnGraph {
    /// Build a kNN graph from column vectors.
    ///
    /// * `points` - transposed coordinate matrix (d x n), one point per column
    pub fn from_columns(points: &DMatrix<f32>, args: KnnGraphArgs) -> anyhow::Result<KnnGraph> {
        let nn = points.ncols();
        let points_vec = points.column_iter().collect::<Vec<_>>();
        let names = (0..nn).collect::<Vec<_>>();

        let dict = ColumnDict::from_dvector_views(points_vec, names);
        Self::build_from_dict(dict, nn, &args)
    }

    /// Build a kNN graph from row vectors (samples × features).
    pub fn from_rows(data: &DMatrix<f32>, args: KnnGraphArgs) -> anyhow::Result<KnnGraph> {
        let transposed = data.transpose();
        Self::from_columns(&transposed, args)
    }

    fn build_from_dict(
        dict: ColumnDict<usize>,
        nn: usize,
        args: &KnnGraphArgs,
    ) -> anyhow::Result<KnnGraph> {
        let nquery = (args.knn + 1).min(nn).max(2);

        let jobs = create_jobs(nn, args.block_size);
        let njobs = jobs.len() as u64;

        // step 1: directed kNN search, one block of nodes per job
        let triplets: DashMap<(usize, usize), f32> = DashMap::new();

        jobs.into_par_iter().progress_count(njobs).try_for_each(
            |(lb, ub)| -> anyhow::Result<()> {
                for i in lb..ub {
                    let (indices, distances) = dict.search_others(&i, nquery)?;
                    for (j, d_ij) in indices.into_iter().zip(distances) {
                        triplets.insert((i, j), d_ij);
                    }
                }
                Ok(())
            },
        )?;

        info!("{} triplets by kNN matching", triplets.len());

        if triplets.is_empty() {
            return Err(anyhow::anyhow!("empty triplets"));
        }

        // step 2: symmetrize directed hits into canonical (i < j) edges
        let mut edges: Vec<((usize, usize), f32)> = triplets
            .par_iter()
            .filter_map(|entry| {
                let &(i, j) = entry.key();
                let d_ij = *entry.value();
                let reverse = triplets.get(&(j, i)).map(|e| *e.value());
                match (args.reciprocal, reverse) {
                    // intersection: both directions must exist
                    (true, Some(_)) if i < j => Some(((i, j), d_ij)),
                    (true, _) => None,
                    // union: either direction, min distance, emitted once
                    (false, Some(d_ji)) if i < j => Some(((i, j), d_ij.min(d_ji))),
                    (false, Some(_)) => None,
                    (false, None) => Some(((i.min(j), i.max(j)), d_ij)),
                }
            })
            .collect();

        edges.par_sort_by_key(|&(ij, _)| ij);
        edges.dedup_by_key(|&mut (ij, _)| ij);

        info!(
            "{} edges after {} matching",
            edges.len(),
            if args.reciprocal {
                "reciprocal"
            } else {
                "union"
            }
        );

        // step 3: sparse network backbone
        let mut coo = CooMatrix::new(nn, nn);
        for &((i, j), v) in edges.iter() {
            coo.push(i, j, v);
            coo.push(j, i, v);
        }

        let adjacency = CscMatrix::from(&coo);

        let (edge_pairs, distances): (Vec<_>, Vec<_>) = edges.into_iter().unzip();

        Ok(KnnGraph {
            adjacency,
            edges: edge_pairs,
            distances,
            n_nodes: nn,
        })
    }

    /// Get neighbors of a node from the CSC adjacency matrix
    pub fn neighbors(&self, node: usize) -> &[usize] {
        let offsets = self.adjacency.col_offsets();
        let start = offsets[node];
        let end = offsets[node + 1];
        &self.adjacency.row_indices()[start..end]
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn num_nodes(&self) -> usize {
        self.n_nodes
    }

    /// Adaptive-bandwidth kernel weights with local connectivity.
    ///
    /// Per-node sigma calibration so every node keeps the same effective
    /// number of neighbours, with rho subtraction and fuzzy-union
    /// symmetrization (McInnes et al. 2018):
    ///
    /// 1. rho_i = distance to nearest neighbour
    /// 2. sigma_i via binary search: sum_j exp(-(d_ij - rho_i)/sigma_i) = log2(k)
    /// 3. Directed weight: w(i→j) = exp(-(d_ij - rho_i) / sigma_i)
    /// 4. Symmetrize: w_sym = w(i→j) + w(j→i) - w(i→j) * w(j→i)
    ///
    /// Returns weights parallel to `self.edges`, all in (0, 1].
    pub fn fuzzy_kernel_weights(&self) -> Vec<f32> {
        if self.distances.is_empty() {
            return Vec::new();
        }

        let offsets = self.adjacency.col_offsets();
        let row_indices = self.adjacency.row_indices();
        let values = self.adjacency.values();

        let mut rho = vec![0.0f32; self.n_nodes];
        let mut sigma = vec![1.0f32; self.n_nodes];

        for i in 0..self.n_nodes {
            let dists = &values[offsets[i]..offsets[i + 1]];
            if dists.is_empty() {
                continue;
            }

            rho[i] = dists.iter().cloned().fold(f32::INFINITY, f32::min);

            let target = (dists.len() as f32).log2();
            sigma[i] = smooth_knn_sigma(dists, rho[i], target);
        }

        let directed = |from: usize, to: usize| -> f32 {
            for idx in offsets[from]..offsets[from + 1] {
                if row_indices[idx] == to {
                    return directed_membership_weight(values[idx], rho[from], sigma[from]);
                }
            }
            0.0
        };

        self.edges
            .iter()
            .map(|&(i, j)| {
                let w_ij = directed(i, j);
                let w_ji = directed(j, i);
                // fuzzy union: P(at least one edge) = P(A) + P(B) - P(A)*P(B)
                w_ij + w_ji - w_ij * w_ji
            })
            .collect()
    }
}

/// Binary search for per-node sigma (smooth kNN distance).
///
/// Finds sigma such that: sum_j exp(-max(0, d_j - rho) / sigma) = target
fn smooth_knn_sigma(dists: &[f32], rho: f32, target: f32) -> f32 {
    const TOLERANCE: f32 = 1e-5;
    const MAX_ITER: usize = 64;

    let mean_dist: f32 = dists.iter().sum::<f32>() / dists.len().max(1) as f32;
    let min_sigma = 1e-3 * mean_dist;

    let mut lo = 0.0f32;
    let mut hi = f32::INFINITY;
    let mut mid = 1.0f32;

    for _ in 0..MAX_ITER {
        let psum: f32 = dists
            .iter()
            .map(|&d| {
                let gap = d - rho;
                if gap > 0.0 {
                    (-gap / mid).exp()
                } else {
                    1.0
                }
            })
            .sum();

        if (psum - target).abs() < TOLERANCE {
            break;
        }

        if psum > target {
            hi = mid;
            mid = (lo + hi) / 2.0;
        } else {
            lo = mid;
            if hi.is_infinite() {
                mid *= 2.0;
            } else {
                mid = (lo + hi) / 2.0;
            }
        }
    }

    mid.max(min_sigma)
}

fn directed_membership_weight(d: f32, rho: f32, sigma: f32) -> f32 {
    if d.is_infinite() || sigma <= 0.0 {
        return 0.0;
    }
    let gap = d - rho;
    if gap <= 0.0 {
        1.0
    } else {
        (-gap / sigma).exp()
    }
}

fn create_jobs(ntot: usize, block_size: usize) -> Vec<(usize, usize)> {
    let block_size = if block_size == 0 {
        DEFAULT_BLOCK_SIZE
    } else {
        block_size
    };
    let nblock = ntot.div_ceil(block_size);
    (0..nblock)
        .map(|block| {
            let lb = block * block_size;
            let ub = ((block + 1) * block_size).min(ntot);
            (lb, ub)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two tight clusters of 5 points each in 2D, well separated
    fn two_cluster_matrix() -> DMatrix<f32> {
        DMatrix::from_row_slice(
            10,
            2,
            &[
                0.0, 0.0, //
                0.1, 0.0, //
                0.0, 0.1, //
                0.1, 0.1, //
                0.05, 0.05, //
                10.0, 10.0, //
                10.1, 10.0, //
                10.0, 10.1, //
                10.1, 10.1, //
                10.05, 10.05, //
            ],
        )
    }

    fn args(knn: usize, reciprocal: bool) -> KnnGraphArgs {
        KnnGraphArgs {
            knn,
            block_size: 100,
            reciprocal,
        }
    }

    #[test]
    fn from_rows_basic() {
        let data = two_cluster_matrix();
        let graph = KnnGraph::from_rows(&data, args(4, true)).unwrap();

        assert_eq!(graph.num_nodes(), 10);
        assert!(graph.num_edges() > 0);
        assert_eq!(graph.edges.len(), graph.distances.len());

        for &(i, j) in &graph.edges {
            assert!(i < j, "edge ({}, {}) not canonical", i, j);
        }

        for &d in &graph.distances {
            assert!(d >= 0.0);
        }
    }

    #[test]
    fn two_clusters_no_cross_edges() {
        let data = two_cluster_matrix();
        let graph = KnnGraph::from_rows(&data, args(4, true)).unwrap();

        // well-separated clusters should not be bridged at k=4
        for &(i, j) in &graph.edges {
            let same_cluster = (i < 5 && j < 5) || (i >= 5 && j >= 5);
            assert!(same_cluster, "cross-cluster edge ({}, {})", i, j);
        }
    }

    #[test]
    fn neighbors_symmetric() {
        let data = two_cluster_matrix();
        let graph = KnnGraph::from_rows(&data, args(3, true)).unwrap();

        for node in 0..graph.num_nodes() {
            for &neighbor in graph.neighbors(node) {
                assert!(
                    graph.neighbors(neighbor).contains(&node),
                    "node {} has neighbor {} but not vice versa",
                    node,
                    neighbor
                );
            }
        }
    }

    #[test]
    fn adjacency_dimensions() {
        let data = two_cluster_matrix();
        let graph = KnnGraph::from_rows(&data, args(3, true)).unwrap();

        assert_eq!(graph.adjacency.nrows(), 10);
        assert_eq!(graph.adjacency.ncols(), 10);
    }

    #[test]
    fn fuzzy_kernel_weights_in_unit_interval() {
        let data = two_cluster_matrix();
        let graph = KnnGraph::from_rows(&data, args(4, false)).unwrap();

        let weights = graph.fuzzy_kernel_weights();
        assert_eq!(weights.len(), graph.num_edges());

        for &w in &weights {
            assert!(w > 0.0, "weight {} should be > 0", w);
            assert!(w <= 1.0, "weight {} should be <= 1", w);
        }

        // local sigma adapts, so no edge should be numerically dead
        let min_w = weights.iter().cloned().fold(f32::INFINITY, f32::min);
        assert!(min_w > 0.01, "min fuzzy weight {} is too small", min_w);
    }

    #[test]
    fn smooth_knn_sigma_hits_target() {
        let dists = [0.1, 0.2, 0.3, 0.5, 1.0];
        let rho = 0.1;
        let target = (5.0f32).log2();

        let sigma = super::smooth_knn_sigma(&dists, rho, target);
        assert!(sigma > 0.0);

        let psum: f32 = dists
            .iter()
            .map(|&d| {
                let gap = d - rho;
                if gap > 0.0 {
                    (-gap / sigma).exp()
                } else {
                    1.0
                }
            })
            .sum();

        assert!(
            (psum - target).abs() < 0.1,
            "psum {:.3} should be close to target {:.3}",
            psum,
            target
        );
    }

    #[test]
    fn create_jobs_blocks() {
        let jobs = create_jobs(10, 3);
        assert_eq!(jobs, vec![(0, 3), (3, 6), (6, 9), (9, 10)]);

        let jobs = create_jobs(1, 100);
        assert_eq!(jobs, vec![(0, 1)]);

        // block_size=0 falls back to the default
        let jobs = create_jobs(5, 0);
        assert_eq!(jobs, vec![(0, 5)]);
    }
}
