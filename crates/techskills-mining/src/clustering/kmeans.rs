//! Seeded k-means with k-means++ initialization.

use crate::error::MiningError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use tracing::debug;

/// A fitted partition of the input points.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansFit {
    /// Cluster of each input point, in input order.
    pub labels: Vec<usize>,
    pub centroids: Vec<Vec<f64>>,
    /// Sum of squared distances from each point to its centroid.
    pub inertia: f64,
    /// Lloyd iterations run by the winning restart.
    pub iterations: usize,
}

impl KMeansFit {
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.centroids.len()];
        for &label in &self.labels {
            sizes[label] += 1;
        }
        sizes
    }
}

/// k-means estimator.
///
/// Each restart `r` draws from `StdRng::seed_from_u64(seed + r)`, so a
/// fixed seed reproduces the same partition.
#[derive(Debug, Clone)]
pub struct KMeans {
    k: usize,
    seed: u64,
    max_iterations: usize,
    restarts: usize,
}

impl KMeans {
    pub fn new(k: usize, seed: u64) -> Self {
        Self {
            k,
            seed,
            max_iterations: 300,
            restarts: 10,
        }
    }

    #[must_use]
    pub fn max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = iterations.max(1);
        self
    }

    #[must_use]
    pub fn restarts(mut self, restarts: usize) -> Self {
        self.restarts = restarts.max(1);
        self
    }

    /// Fit every restart and keep the one with the lowest inertia.
    ///
    /// # Errors
    ///
    /// Returns [`MiningError::InsufficientData`] when there are fewer points than clusters.
    pub fn fit(&self, points: &[Vec<f64>]) -> Result<KMeansFit, MiningError> {
        if self.k == 0 || points.len() < self.k {
            return Err(MiningError::insufficient(format!(
                "{} rows cannot form {} clusters",
                points.len(),
                self.k
            )));
        }

        let mut best: Option<KMeansFit> = None;
        for restart in 0..self.restarts {
            let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(restart as u64));
            let fit = self.fit_once(points, &mut rng);
            debug!(
                "k-means k={} restart {}: inertia {:.4} after {} iterations",
                self.k, restart, fit.inertia, fit.iterations
            );
            if best.as_ref().is_none_or(|b| fit.inertia < b.inertia) {
                best = Some(fit);
            }
        }

        best.ok_or_else(|| MiningError::InvalidConfig("k-means needs at least one restart".into()))
    }

    fn fit_once(&self, points: &[Vec<f64>], rng: &mut StdRng) -> KMeansFit {
        let mut centroids = init_plus_plus(points, self.k, rng);
        let mut labels = vec![usize::MAX; points.len()];
        let mut iterations = 0;

        for iteration in 1..=self.max_iterations {
            iterations = iteration;
            if !assign(points, &centroids, &mut labels) {
                break;
            }
            centroids = update_centroids(points, &labels, &centroids);
        }

        // Labels must describe the final centroids even when the cap was hit.
        assign(points, &centroids, &mut labels);
        let inertia = points
            .iter()
            .zip(&labels)
            .map(|(point, &label)| squared_distance(point, &centroids[label]))
            .sum();

        KMeansFit {
            labels,
            centroids,
            inertia,
            iterations,
        }
    }
}

pub(crate) fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

fn nearest(point: &[f64], centroids: &[Vec<f64>]) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (idx, centroid) in centroids.iter().enumerate() {
        let distance = squared_distance(point, centroid);
        if distance < best_distance {
            best = idx;
            best_distance = distance;
        }
    }
    best
}

/// Reassign every point; returns whether any label changed.
fn assign(points: &[Vec<f64>], centroids: &[Vec<f64>], labels: &mut [usize]) -> bool {
    let mut changed = false;
    for (point, label) in points.iter().zip(labels.iter_mut()) {
        let cluster = nearest(point, centroids);
        if *label != cluster {
            *label = cluster;
            changed = true;
        }
    }
    changed
}

/// k-means++: each next centroid is drawn with probability proportional to
/// its squared distance from the closest centroid chosen so far.
fn init_plus_plus(points: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let n = points.len();
    let mut centroids = vec![points[rng.gen_range(0..n)].clone()];
    let mut distances: Vec<f64> = points
        .iter()
        .map(|p| squared_distance(p, &centroids[0]))
        .collect();

    while centroids.len() < k {
        let total: f64 = distances.iter().sum();
        let next = if total > 0.0 {
            let target = rng.gen_range(0.0..total);
            let mut cumulative = 0.0;
            distances
                .iter()
                .position(|d| {
                    cumulative += d;
                    cumulative > target
                })
                .unwrap_or(n - 1)
        } else {
            rng.gen_range(0..n)
        };

        let centroid = points[next].clone();
        for (distance, point) in distances.iter_mut().zip(points) {
            *distance = distance.min(squared_distance(point, &centroid));
        }
        centroids.push(centroid);
    }
    centroids
}

/// Mean of each cluster's members. An empty cluster is reseeded with the
/// point farthest from its own centroid.
fn update_centroids(
    points: &[Vec<f64>],
    labels: &[usize],
    previous: &[Vec<f64>],
) -> Vec<Vec<f64>> {
    let k = previous.len();
    let dim = points.first().map_or(0, Vec::len);
    let mut sums = vec![vec![0.0; dim]; k];
    let mut counts = vec![0usize; k];

    for (point, &label) in points.iter().zip(labels) {
        counts[label] += 1;
        for (sum, value) in sums[label].iter_mut().zip(point) {
            *sum += value;
        }
    }

    let mut centroids: Vec<Vec<f64>> = sums
        .into_iter()
        .zip(&counts)
        .zip(previous)
        .map(|((sum, &count), old)| {
            if count == 0 {
                old.clone()
            } else {
                sum.into_iter().map(|s| s / count as f64).collect()
            }
        })
        .collect();

    let mut used = HashSet::new();
    for cluster in (0..k).filter(|&c| counts[c] == 0) {
        let farthest = points
            .iter()
            .enumerate()
            .filter(|(idx, _)| !used.contains(idx))
            .map(|(idx, point)| (idx, squared_distance(point, &centroids[labels[idx]])))
            .max_by(|a, b| a.1.total_cmp(&b.1).then(b.0.cmp(&a.0)));
        if let Some((idx, _)) = farthest {
            used.insert(idx);
            centroids[cluster] = points[idx].clone();
        }
    }

    centroids
}

/// Mean silhouette coefficient over all points.
///
/// Points alone in their cluster score 0. Returns `None` when fewer than two
/// clusters are populated.
pub fn silhouette_score(points: &[Vec<f64>], labels: &[usize], k: usize) -> Option<f64> {
    let mut counts = vec![0usize; k];
    for &label in labels {
        counts[label] += 1;
    }
    if counts.iter().filter(|&&c| c > 0).count() < 2 {
        return None;
    }

    let total: f64 = points
        .iter()
        .zip(labels)
        .map(|(point, &own)| {
            let mut sums = vec![0.0; k];
            for (other, &label) in points.iter().zip(labels) {
                sums[label] += squared_distance(point, other).sqrt();
            }
            if counts[own] <= 1 {
                return 0.0;
            }
            let a = sums[own] / (counts[own] - 1) as f64;
            let b = (0..k)
                .filter(|&c| c != own && counts[c] > 0)
                .map(|c| sums[c] / counts[c] as f64)
                .fold(f64::INFINITY, f64::min);
            let scale = a.max(b);
            if scale > 0.0 { (b - a) / scale } else { 0.0 }
        })
        .sum();

    Some(total / points.len() as f64)
}
