//! Epoch-sampled stochastic gradient descent over the fuzzy graph edges.

use rand::Rng;
use rand::rngs::StdRng;

use super::graph::Edge;

const GRADIENT_CLIP: f32 = 4.0;
const REPULSION_EPSILON: f32 = 0.001;
const MAX_COMPONENTS: usize = 3;

/// Knobs shared by fit and transform optimization.
#[derive(Clone, Copy, Debug)]
pub(super) struct SgdSettings {
    pub(super) a: f32,
    pub(super) b: f32,
    pub(super) initial_alpha: f32,
    pub(super) negative_sample_rate: usize,
    pub(super) n_epochs: usize,
}

/// Where the tail of every edge lives.
#[derive(Clone, Copy)]
pub(super) enum Tails<'a> {
    /// Edges connect points of the embedding being optimized; both ends move.
    Shared,
    /// Edges point into a fixed reference embedding; only heads move.
    Fixed(&'a [f32]),
}

/// Drop edges too weak to be sampled even once within `n_epochs`.
pub(super) fn prune_edges(edges: &mut Vec<Edge>, n_epochs: usize) {
    let max_weight = edges.iter().map(|e| e.weight).fold(0.0_f32, f32::max);
    if max_weight <= 0.0 {
        edges.clear();
        return;
    }
    let threshold = max_weight / n_epochs.max(1) as f32;
    edges.retain(|edge| edge.weight >= threshold);
}

/// Run negative-sampling SGD over `edges`, updating `head` in place.
pub(super) fn optimize_layout(
    head: &mut [f32],
    tails: Tails<'_>,
    dim: usize,
    edges: &[Edge],
    settings: SgdSettings,
    rng: &mut StdRng,
) {
    if edges.is_empty() || settings.n_epochs == 0 || dim == 0 || dim > MAX_COMPONENTS {
        return;
    }
    let n_tail = match tails {
        Tails::Shared => head.len() / dim,
        Tails::Fixed(fixed) => fixed.len() / dim,
    };
    if n_tail == 0 {
        return;
    }
    let max_weight = edges.iter().map(|e| e.weight).fold(0.0_f32, f32::max);
    let epochs_per_sample: Vec<f64> = edges
        .iter()
        .map(|edge| (max_weight / edge.weight) as f64)
        .collect();
    let neg_rate = settings.negative_sample_rate.max(1) as f64;
    let epochs_per_negative: Vec<f64> = epochs_per_sample.iter().map(|e| e / neg_rate).collect();
    let mut next_sample = epochs_per_sample.clone();
    let mut next_negative = epochs_per_negative.clone();

    let (a, b) = (settings.a, settings.b);
    for epoch in 0..settings.n_epochs {
        let epoch_f = epoch as f64;
        let alpha = settings.initial_alpha * (1.0 - epoch as f32 / settings.n_epochs as f32);
        for (e, edge) in edges.iter().enumerate() {
            if next_sample[e] > epoch_f {
                continue;
            }
            let j = edge.head;
            let k = edge.tail;
            let mut current = read(head, j, dim);
            let mut other = match tails {
                Tails::Shared => read(head, k, dim),
                Tails::Fixed(fixed) => read(fixed, k, dim),
            };

            let dist_sq = squared_distance(&current, &other, dim);
            let attract = if dist_sq > 0.0 {
                -2.0 * a * b * dist_sq.powf(b - 1.0) / (a * dist_sq.powf(b) + 1.0)
            } else {
                0.0
            };
            for d in 0..dim {
                let grad = clip(attract * (current[d] - other[d]));
                current[d] += grad * alpha;
                if matches!(tails, Tails::Shared) {
                    other[d] -= grad * alpha;
                }
            }
            write(head, j, dim, &current);
            if matches!(tails, Tails::Shared) {
                write(head, k, dim, &other);
            }
            next_sample[e] += epochs_per_sample[e];

            let n_negative = ((epoch_f - next_negative[e]) / epochs_per_negative[e]).max(0.0) as usize;
            for _ in 0..n_negative {
                let sample = rng.random_range(0..n_tail);
                let negative = match tails {
                    Tails::Shared if sample == j => current,
                    Tails::Shared => read(head, sample, dim),
                    Tails::Fixed(fixed) => read(fixed, sample, dim),
                };
                let dist_sq = squared_distance(&current, &negative, dim);
                let repel = if dist_sq > 0.0 {
                    2.0 * b / ((REPULSION_EPSILON + dist_sq) * (a * dist_sq.powf(b) + 1.0))
                } else if matches!(tails, Tails::Shared) && sample == j {
                    continue;
                } else {
                    0.0
                };
                for d in 0..dim {
                    let grad = if repel > 0.0 {
                        clip(repel * (current[d] - negative[d]))
                    } else {
                        0.0
                    };
                    current[d] += grad * alpha;
                }
            }
            write(head, j, dim, &current);
            next_negative[e] += n_negative as f64 * epochs_per_negative[e];
        }
    }
}

fn read(buffer: &[f32], index: usize, dim: usize) -> [f32; MAX_COMPONENTS] {
    let mut out = [0.0; MAX_COMPONENTS];
    out[..dim].copy_from_slice(&buffer[index * dim..(index + 1) * dim]);
    out
}

fn write(buffer: &mut [f32], index: usize, dim: usize, value: &[f32; MAX_COMPONENTS]) {
    buffer[index * dim..(index + 1) * dim].copy_from_slice(&value[..dim]);
}

fn squared_distance(a: &[f32; MAX_COMPONENTS], b: &[f32; MAX_COMPONENTS], dim: usize) -> f32 {
    (0..dim).map(|d| (a[d] - b[d]) * (a[d] - b[d])).sum()
}

fn clip(value: f32) -> f32 {
    value.clamp(-GRADIENT_CLIP, GRADIENT_CLIP)
}
