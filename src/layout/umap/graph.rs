//! Neighbor graphs, local distance scaling and the fuzzy simplicial set.

use std::collections::BTreeMap;

use hnsw_rs::prelude::*;
use ndarray::ArrayView2;

/// Above this many rows the neighbor graph comes from an HNSW index.
const EXACT_SEARCH_LIMIT: usize = 4096;
const SMOOTH_K_TOLERANCE: f64 = 1e-5;
const SMOOTH_K_ITERATIONS: usize = 64;
const MIN_K_DIST_SCALE: f64 = 1e-3;

/// Nearest neighbors of every row, self excluded, ascending by distance.
pub(super) struct KnnGraph {
    pub(super) k: usize,
    pub(super) indices: Vec<usize>,
    pub(super) distances: Vec<f32>,
}

impl KnnGraph {
    pub(super) fn rows(&self) -> usize {
        self.indices.len() / self.k.max(1)
    }

    pub(super) fn row(&self, i: usize) -> (&[usize], &[f32]) {
        let range = i * self.k..(i + 1) * self.k;
        (&self.indices[range.clone()], &self.distances[range])
    }

    pub(super) fn mean_distance(&self) -> f32 {
        if self.distances.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.distances.iter().map(|&d| d as f64).sum();
        (sum / self.distances.len() as f64) as f32
    }
}

/// One directed edge of the fuzzy simplicial set.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(super) struct Edge {
    pub(super) head: usize,
    pub(super) tail: usize,
    pub(super) weight: f32,
}

/// Find the `k` nearest other rows of every row.
pub(super) fn knn_graph(data: ArrayView2<f32>, k: usize) -> Result<KnnGraph, String> {
    let rows = data.nrows();
    if k == 0 || k >= rows {
        return Err(format!("Cannot find {k} neighbors among {rows} rows"));
    }
    let flat: Vec<f32> = data.iter().copied().collect();
    let dim = data.ncols();
    if rows <= EXACT_SEARCH_LIMIT {
        Ok(exact_graph(&flat, dim, k))
    } else {
        Ok(approximate_graph(&flat, dim, k))
    }
}

/// Exact `k` nearest rows of `train` to `query`, ties broken by index.
pub(super) fn nearest_rows(train: &[f32], dim: usize, query: &[f32], k: usize) -> Vec<(usize, f32)> {
    let mut scored: Vec<(usize, f32)> = train
        .chunks_exact(dim)
        .enumerate()
        .map(|(idx, row)| (idx, euclidean(row, query)))
        .collect();
    sort_neighbors(&mut scored);
    scored.truncate(k);
    scored
}

fn exact_graph(flat: &[f32], dim: usize, k: usize) -> KnnGraph {
    let rows = flat.len() / dim.max(1);
    let mut indices = Vec::with_capacity(rows * k);
    let mut distances = Vec::with_capacity(rows * k);
    for (i, row) in flat.chunks_exact(dim).enumerate() {
        for (idx, dist) in exact_row(flat, dim, row, i, k) {
            indices.push(idx);
            distances.push(dist);
        }
    }
    KnnGraph {
        k,
        indices,
        distances,
    }
}

fn exact_row(flat: &[f32], dim: usize, row: &[f32], self_idx: usize, k: usize) -> Vec<(usize, f32)> {
    let mut scored: Vec<(usize, f32)> = flat
        .chunks_exact(dim)
        .enumerate()
        .filter(|(idx, _)| *idx != self_idx)
        .map(|(idx, other)| (idx, euclidean(row, other)))
        .collect();
    sort_neighbors(&mut scored);
    scored.truncate(k);
    scored
}

fn approximate_graph(flat: &[f32], dim: usize, k: usize) -> KnnGraph {
    let rows = flat.len() / dim.max(1);
    let hnsw = Hnsw::new(16, rows.max(1024), 16, 200, DistL2 {});
    for (idx, row) in flat.chunks_exact(dim).enumerate() {
        hnsw.insert((row, idx));
    }
    let ef_search = (2 * k).max(64);
    let mut indices = Vec::with_capacity(rows * k);
    let mut distances = Vec::with_capacity(rows * k);
    let mut fallbacks = 0usize;
    for (i, row) in flat.chunks_exact(dim).enumerate() {
        let mut found: Vec<(usize, f32)> = hnsw
            .search(row, k + 1, ef_search)
            .into_iter()
            .filter(|neighbour| neighbour.d_id != i)
            .map(|neighbour| (neighbour.d_id, neighbour.distance))
            .collect();
        if found.len() < k {
            fallbacks += 1;
            found = exact_row(flat, dim, row, i, k);
        }
        sort_neighbors(&mut found);
        found.truncate(k);
        for (idx, dist) in found {
            indices.push(idx);
            distances.push(dist);
        }
    }
    if fallbacks > 0 {
        tracing::debug!("HNSW returned too few neighbors for {fallbacks} rows; used exact search");
    }
    KnnGraph {
        k,
        indices,
        distances,
    }
}

fn sort_neighbors(neighbors: &mut [(usize, f32)]) {
    neighbors.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
}

pub(super) fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = (x - y) as f64;
            d * d
        })
        .sum::<f64>()
        .sqrt() as f32
}

/// Local scale of one row: distance to the nearest neighbor and bandwidth.
#[derive(Clone, Copy, Debug)]
pub(super) struct LocalScale {
    pub(super) rho: f32,
    pub(super) sigma: f32,
}

/// Binary-search the bandwidth so memberships of `distances` sum to `target`.
///
/// With `local_connectivity` the nearest non-zero distance is subtracted first,
/// so every point is fully connected to at least one neighbor.
pub(super) fn smooth_knn_dist(
    distances: &[f32],
    target: f64,
    local_connectivity: bool,
    fallback_mean: f32,
) -> LocalScale {
    let rho = if local_connectivity {
        distances.iter().copied().find(|d| *d > 0.0).unwrap_or(0.0)
    } else {
        0.0
    } as f64;

    let mut lo = 0.0_f64;
    let mut hi = f64::INFINITY;
    let mut mid = 1.0_f64;
    for _ in 0..SMOOTH_K_ITERATIONS {
        let psum: f64 = distances
            .iter()
            .map(|&d| {
                let shifted = d as f64 - rho;
                if shifted > 0.0 { (-shifted / mid).exp() } else { 1.0 }
            })
            .sum();
        if (psum - target).abs() < SMOOTH_K_TOLERANCE {
            break;
        }
        if psum > target {
            hi = mid;
            mid = (lo + hi) / 2.0;
        } else {
            lo = mid;
            mid = if hi.is_infinite() { mid * 2.0 } else { (lo + hi) / 2.0 };
        }
    }

    let floor = if rho > 0.0 {
        let row_mean = distances.iter().map(|&d| d as f64).sum::<f64>() / distances.len().max(1) as f64;
        MIN_K_DIST_SCALE * row_mean
    } else {
        MIN_K_DIST_SCALE * fallback_mean as f64
    };
    LocalScale {
        rho: rho as f32,
        sigma: mid.max(floor) as f32,
    }
}

/// Membership strength of a neighbor at `distance` for a row with `scale`.
pub(super) fn membership(distance: f32, scale: LocalScale) -> f32 {
    let shifted = distance - scale.rho;
    if shifted <= 0.0 || scale.sigma <= 0.0 {
        1.0
    } else {
        (-shifted / scale.sigma).exp()
    }
}

/// Build the symmetric fuzzy graph `A + A^T - A * A^T` from the kNN graph.
///
/// Edges are returned in both directions, ordered by `(head, tail)`.
pub(super) fn fuzzy_simplicial_set(graph: &KnnGraph, target: f64) -> Vec<Edge> {
    let global_mean = graph.mean_distance();
    let mut directed: BTreeMap<(usize, usize), f32> = BTreeMap::new();
    for i in 0..graph.rows() {
        let (indices, distances) = graph.row(i);
        let scale = smooth_knn_dist(distances, target, true, global_mean);
        for (&j, &d) in indices.iter().zip(distances) {
            if j != i {
                directed.insert((i, j), membership(d, scale));
            }
        }
    }
    let mut symmetric: BTreeMap<(usize, usize), f32> = BTreeMap::new();
    for (&(i, j), &w) in &directed {
        let back = directed.get(&(j, i)).copied().unwrap_or(0.0);
        let combined = w + back - w * back;
        symmetric.insert((i, j), combined);
        symmetric.insert((j, i), combined);
    }
    symmetric
        .into_iter()
        .filter(|(_, weight)| *weight > 0.0)
        .map(|((head, tail), weight)| Edge { head, tail, weight })
        .collect()
}
