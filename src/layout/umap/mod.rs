//! Uniform Manifold Approximation and Projection, fit once per corpus.
//!
//! Fitting builds a k-nearest-neighbor graph, turns it into a symmetric fuzzy
//! graph and optimizes a low-dimensional embedding with negative-sampling SGD.
//! The fitted model keeps its training rows so new vectors can be placed
//! against the frozen embedding.

mod curve;
mod graph;
mod optimize;

use ndarray::{Array2, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::LayoutError;
use graph::Edge;
use optimize::{SgdSettings, Tails};

const LARGE_DATASET_ROWS: usize = 10_000;
const INIT_RANGE: f32 = 10.0;

/// Reducer hyperparameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UmapParams {
    /// Output dimensionality, 2 or 3.
    pub n_components: usize,
    /// Requested neighborhood size, counting the point itself.
    pub n_neighbors: usize,
    pub min_dist: f32,
    pub spread: f32,
    pub learning_rate: f32,
    pub negative_sample_rate: usize,
    /// Training epochs; chosen from the corpus size when unset.
    pub n_epochs: Option<usize>,
    pub seed: u64,
}

impl Default for UmapParams {
    fn default() -> Self {
        Self {
            n_components: 2,
            n_neighbors: 15,
            min_dist: 0.1,
            spread: 1.0,
            learning_rate: 1.0,
            negative_sample_rate: 5,
            n_epochs: None,
            seed: 42,
        }
    }
}

impl UmapParams {
    pub fn validate(&self) -> Result<(), LayoutError> {
        if !(2..=3).contains(&self.n_components) {
            return Err(LayoutError::InvalidComponents(self.n_components));
        }
        if !(self.spread.is_finite() && self.spread > 0.0) {
            return Err(LayoutError::Config(format!(
                "spread must be positive, got {}",
                self.spread
            )));
        }
        if !(self.min_dist.is_finite() && self.min_dist >= 0.0 && self.min_dist <= self.spread) {
            return Err(LayoutError::Config(format!(
                "min_dist must lie in [0, spread], got {}",
                self.min_dist
            )));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(LayoutError::Config(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        Ok(())
    }

    fn fit_epochs(&self, rows: usize) -> usize {
        self.n_epochs.unwrap_or(if rows <= LARGE_DATASET_ROWS { 500 } else { 200 })
    }

    fn transform_epochs(&self, rows: usize) -> usize {
        match self.n_epochs {
            Some(epochs) => (epochs / 3).max(1),
            None if rows <= LARGE_DATASET_ROWS => 100,
            None => 30,
        }
    }
}

/// Neighborhood size actually used for `rows` samples: `max(2, min(requested, rows - 1))`.
pub fn effective_neighbors(requested: usize, rows: usize) -> usize {
    requested.min(rows.saturating_sub(1)).max(2)
}

/// A fitted reducer able to place new vectors next to its training data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UmapModel {
    params: UmapParams,
    n_neighbors: usize,
    a: f32,
    b: f32,
    mean_knn_distance: f32,
    input_dim: usize,
    training: Vec<f32>,
    embedding: Vec<f32>,
}

impl UmapModel {
    /// Fit on the rows of `data`, returning the embedding and the model.
    pub fn fit(data: ArrayView2<f32>, params: &UmapParams) -> Result<(Array2<f32>, Self), LayoutError> {
        params.validate()?;
        let rows = data.nrows();
        let dim = data.ncols();
        if rows < 2 {
            return Err(LayoutError::Reduce(format!(
                "Need at least 2 rows to fit, got {rows}"
            )));
        }
        if dim == 0 {
            return Err(LayoutError::Reduce("Input rows have no features".to_string()));
        }
        if data.iter().any(|v| !v.is_finite()) {
            return Err(LayoutError::Reduce("Input contains non-finite values".to_string()));
        }

        let n_neighbors = effective_neighbors(params.n_neighbors, rows);
        let target = (n_neighbors as f64).log2();
        let knn = graph::knn_graph(data, n_neighbors - 1).map_err(LayoutError::Reduce)?;
        let mean_knn_distance = knn.mean_distance();
        let mut edges = graph::fuzzy_simplicial_set(&knn, target);
        let n_epochs = params.fit_epochs(rows);
        optimize::prune_edges(&mut edges, n_epochs);
        let (a, b) = curve::find_ab_params(params.spread, params.min_dist);
        tracing::debug!(
            rows,
            dim,
            n_neighbors,
            edges = edges.len(),
            n_epochs,
            a,
            b,
            "Fitting UMAP"
        );

        let mut rng = StdRng::seed_from_u64(params.seed);
        let mut embedding: Vec<f32> = (0..rows * params.n_components)
            .map(|_| rng.random_range(-INIT_RANGE..INIT_RANGE))
            .collect();
        let settings = SgdSettings {
            a,
            b,
            initial_alpha: params.learning_rate,
            negative_sample_rate: params.negative_sample_rate,
            n_epochs,
        };
        optimize::optimize_layout(
            &mut embedding,
            Tails::Shared,
            params.n_components,
            &edges,
            settings,
            &mut rng,
        );
        if embedding.iter().any(|v| !v.is_finite()) {
            return Err(LayoutError::Reduce("Optimization diverged".to_string()));
        }

        let model = Self {
            params: params.clone(),
            n_neighbors,
            a,
            b,
            mean_knn_distance,
            input_dim: dim,
            training: data.iter().copied().collect(),
            embedding: embedding.clone(),
        };
        let coords = Array2::from_shape_vec((rows, params.n_components), embedding)
            .map_err(|err| LayoutError::Reduce(format!("Embedding shape: {err}")))?;
        Ok((coords, model))
    }

    /// Place one (already normalized) vector against the frozen training embedding.
    ///
    /// Repeated calls with the same vector return the same coordinate.
    pub fn transform(&self, row: &[f32]) -> Result<Vec<f32>, LayoutError> {
        if row.len() != self.input_dim {
            return Err(LayoutError::Reduce(format!(
                "Feature dimension mismatch: model expects {}, got {}",
                self.input_dim,
                row.len()
            )));
        }
        if row.iter().any(|v| !v.is_finite()) {
            return Err(LayoutError::Reduce("Input contains non-finite values".to_string()));
        }
        let dim = self.n_components();
        let rows = self.n_training();
        let k = self.n_neighbors.min(rows);
        let neighbors = graph::nearest_rows(&self.training, self.input_dim, row, k);
        let distances: Vec<f32> = neighbors.iter().map(|(_, d)| *d).collect();
        let scale = graph::smooth_knn_dist(
            &distances,
            (k as f64).log2(),
            false,
            self.mean_knn_distance,
        );
        let raw: Vec<f32> = distances.iter().map(|&d| graph::membership(d, scale)).collect();
        let total: f32 = raw.iter().sum();
        let mut edges: Vec<Edge> = neighbors
            .iter()
            .zip(&raw)
            .map(|(&(idx, _), &w)| Edge {
                head: 0,
                tail: idx,
                weight: if total > 0.0 { w / total } else { 1.0 / k as f32 },
            })
            .collect();

        let mut head = vec![0.0_f32; dim];
        for edge in &edges {
            let target = &self.embedding[edge.tail * dim..(edge.tail + 1) * dim];
            for (slot, value) in head.iter_mut().zip(target) {
                *slot += edge.weight * value;
            }
        }

        let n_epochs = self.params.transform_epochs(rows);
        optimize::prune_edges(&mut edges, n_epochs);
        let settings = SgdSettings {
            a: self.a,
            b: self.b,
            initial_alpha: self.params.learning_rate / 4.0,
            negative_sample_rate: self.params.negative_sample_rate,
            n_epochs,
        };
        let mut rng = StdRng::seed_from_u64(self.params.seed);
        optimize::optimize_layout(
            &mut head,
            Tails::Fixed(&self.embedding),
            dim,
            &edges,
            settings,
            &mut rng,
        );
        if head.iter().any(|v| !v.is_finite()) {
            return Err(LayoutError::Reduce("Transform diverged".to_string()));
        }
        Ok(head)
    }

    pub fn params(&self) -> &UmapParams {
        &self.params
    }

    pub fn n_components(&self) -> usize {
        self.params.n_components
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    pub fn n_training(&self) -> usize {
        self.training.len() / self.input_dim.max(1)
    }

    /// Check that a deserialized model is internally consistent.
    pub(crate) fn validate(&self) -> Result<(), String> {
        if !(2..=3).contains(&self.params.n_components) {
            return Err(format!("n_components {} is not 2 or 3", self.params.n_components));
        }
        if self.input_dim == 0 || self.training.len() % self.input_dim != 0 {
            return Err(format!(
                "training data of {} values does not split into rows of {}",
                self.training.len(),
                self.input_dim
            ));
        }
        let rows = self.n_training();
        if rows < 2 {
            return Err(format!("model holds {rows} training rows"));
        }
        if self.embedding.len() != rows * self.params.n_components {
            return Err(format!(
                "embedding has {} values, expected {}",
                self.embedding.len(),
                rows * self.params.n_components
            ));
        }
        if self.n_neighbors < 2 {
            return Err(format!("n_neighbors {} is below 2", self.n_neighbors));
        }
        if !(self.a.is_finite() && self.b.is_finite() && self.a > 0.0 && self.b > 0.0) {
            return Err("curve parameters must be finite and positive".to_string());
        }
        if self
            .training
            .iter()
            .chain(&self.embedding)
            .any(|v| !v.is_finite())
        {
            return Err("model contains non-finite values".to_string());
        }
        Ok(())
    }
}
