//! K-means clustering.
//!
//! Partitions rows into k clusters by alternating two steps (Lloyd):
//!
//! 1. **Assign**: each row goes to its nearest centroid under the chosen
//!    metric (ties go to the lower centroid index).
//! 2. **Update**: each centroid becomes the mean of its rows.
//!
//! Iteration stops when an assignment pass changes nothing, or after
//! `max_iter` passes. Hitting the limit is not an error: the last
//! assignment is returned with `converged = false`.
//!
//! With a non-Euclidean metric the mean update no longer minimizes the
//! objective exactly, so convergence is driven by assignment stability
//! rather than a centroid-shift tolerance.
//!
//! ## K-means++ Initialization
//!
//! 1. Choose the first centroid uniformly at random.
//! 2. Choose each next centroid with probability proportional to D(x)²
//!    (squared distance to the nearest existing centroid).
//!
//! All randomness comes from `StdRng::seed_from_u64(seed)`, so equal seeds
//! give equal partitions.
//!
//! ## Empty clusters
//!
//! A centroid that loses all its rows is moved onto the row farthest from
//! its current centroid.

use std::sync::atomic::AtomicBool;

use ndarray::{Array2, ArrayView1, ArrayView2};
use rand::prelude::*;
use tracing::{debug, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::set::ClusterSet;
use super::traits::{Clustered, Clustering, Warning};
use crate::cancel::{checkpoint, phase};
use crate::distance::DistanceMetric;
use crate::error::{Error, Result};
use crate::matrix::ensure_finite;

/// K-means clustering algorithm.
#[derive(Debug, Clone)]
pub struct Kmeans {
    /// Number of clusters.
    k: usize,
    /// Maximum iterations.
    max_iter: usize,
    /// Random seed.
    seed: u64,
    /// Assignment metric.
    metric: DistanceMetric,
}

/// Result of a k-means run.
#[derive(Debug, Clone)]
pub struct KmeansOutcome {
    /// The flat partition (empty clusters omitted).
    pub clusters: ClusterSet,
    /// Centroid index per row.
    pub labels: Vec<usize>,
    /// Final centroids, one row per cluster (`k` rows).
    pub centroids: Array2<f64>,
    /// Iterations run.
    pub iterations: usize,
    /// Whether assignments stabilized before the iteration limit.
    pub converged: bool,
}

impl Kmeans {
    /// Create a new K-means clusterer.
    pub fn new(k: usize) -> Self {
        Self {
            k,
            max_iter: 300,
            seed: 0,
            metric: DistanceMetric::Euclidean,
        }
    }

    /// Set maximum iterations.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set random seed for reproducibility.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the assignment metric.
    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Run k-means over the rows of `data`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidK`] if `k` is 0 or exceeds the row count.
    /// - [`Error::DegenerateInput`] for non-finite values or no columns.
    /// - [`Error::Cancelled`] if `cancel` is set at the top of an iteration.
    pub fn run(&self, data: ArrayView2<'_, f64>, cancel: Option<&AtomicBool>) -> Result<KmeansOutcome> {
        let n = data.nrows();
        if self.k == 0 || self.k > n {
            return Err(Error::InvalidK {
                k: self.k as i64,
                n_items: n,
            });
        }
        ensure_finite(data, None)?;
        debug!(rows = n, k = self.k, metric = %self.metric, "running k-means");

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut centroids = self.init_centroids(data, &mut rng);
        let mut labels = self.assign(data, &centroids);
        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.max_iter {
            checkpoint(cancel, phase::KMEANS_ITERATION)?;
            iterations += 1;

            centroids = self.update(data, &labels, &centroids);
            let next = self.assign(data, &centroids);
            if next == labels {
                converged = true;
                break;
            }
            labels = next;
        }

        if !converged {
            warn!(iterations, "k-means stopped before assignments stabilized");
        }
        Ok(KmeansOutcome {
            clusters: ClusterSet::from_labels(&labels),
            labels,
            centroids,
            iterations,
            converged,
        })
    }

    /// Initialize centroids using k-means++ algorithm.
    fn init_centroids(&self, data: ArrayView2<'_, f64>, rng: &mut StdRng) -> Array2<f64> {
        let n = data.nrows();
        let mut centroids = Array2::zeros((self.k, data.ncols()));

        // First centroid: random point
        let first = rng.random_range(0..n);
        centroids.row_mut(0).assign(&data.row(first));

        let mut nearest: Vec<f64> = (0..n)
            .map(|j| self.metric.pair(data.row(j), centroids.row(0)).powi(2))
            .collect();

        for i in 1..self.k {
            let total: f64 = nearest.iter().sum();
            let selected = if total > 0.0 {
                let threshold = rng.random::<f64>() * total;
                let mut cumsum = 0.0;
                let mut selected = n - 1;
                for (j, &d) in nearest.iter().enumerate() {
                    cumsum += d;
                    if d > 0.0 && cumsum >= threshold {
                        selected = j;
                        break;
                    }
                }
                selected
            } else {
                // Fewer distinct rows than k.
                rng.random_range(0..n)
            };
            centroids.row_mut(i).assign(&data.row(selected));

            for (j, d) in nearest.iter_mut().enumerate() {
                let to_new = self.metric.pair(data.row(j), centroids.row(i)).powi(2);
                *d = d.min(to_new);
            }
        }

        centroids
    }

    fn nearest_centroid(&self, point: ArrayView1<'_, f64>, centroids: &Array2<f64>) -> (usize, f64) {
        let mut best_cluster = 0;
        let mut best_dist = f64::INFINITY;
        for (k, centroid) in centroids.rows().into_iter().enumerate() {
            let dist = self.metric.pair(point, centroid);
            if dist < best_dist {
                best_dist = dist;
                best_cluster = k;
            }
        }
        (best_cluster, best_dist)
    }

    /// Assignment step - parallel when feature enabled.
    #[cfg(feature = "parallel")]
    fn assign(&self, data: ArrayView2<'_, f64>, centroids: &Array2<f64>) -> Vec<usize> {
        (0..data.nrows())
            .into_par_iter()
            .map(|i| self.nearest_centroid(data.row(i), centroids).0)
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn assign(&self, data: ArrayView2<'_, f64>, centroids: &Array2<f64>) -> Vec<usize> {
        (0..data.nrows())
            .map(|i| self.nearest_centroid(data.row(i), centroids).0)
            .collect()
    }

    /// Update step: means of assigned rows, empty clusters moved to the
    /// farthest rows.
    fn update(&self, data: ArrayView2<'_, f64>, labels: &[usize], previous: &Array2<f64>) -> Array2<f64> {
        let (n, d) = data.dim();
        let mut centroids = Array2::zeros((self.k, d));
        let mut counts = vec![0usize; self.k];

        for (i, &k) in labels.iter().enumerate() {
            let mut row = centroids.row_mut(k);
            row += &data.row(i);
            counts[k] += 1;
        }

        let mut taken = vec![false; n];
        for k in 0..self.k {
            if counts[k] > 0 {
                centroids.row_mut(k).mapv_inplace(|v| v / counts[k] as f64);
                continue;
            }
            // Farthest row from its own previous centroid, first on ties.
            let mut far = None;
            let mut far_dist = f64::NEG_INFINITY;
            for i in (0..n).filter(|&i| !taken[i]) {
                let dist = self.metric.pair(data.row(i), previous.row(labels[i]));
                if dist > far_dist {
                    far_dist = dist;
                    far = Some(i);
                }
            }
            if let Some(i) = far {
                taken[i] = true;
                debug!(cluster = k, row = i, "re-seeding empty cluster");
                centroids.row_mut(k).assign(&data.row(i));
            } else {
                centroids.row_mut(k).assign(&previous.row(k));
            }
        }
        centroids
    }
}

impl Clustering for Kmeans {
    fn fit(&self, data: ArrayView2<'_, f64>, cancel: Option<&AtomicBool>) -> Result<Clustered> {
        let outcome = self.run(data, cancel)?;
        let mut clustered = Clustered::flat(outcome.clusters);
        if !outcome.converged {
            clustered.warnings.push(Warning::NotConverged {
                iterations: outcome.iterations,
            });
        }
        Ok(clustered)
    }
}

/// Run seeded k-means over the rows of `data`.
pub fn kmeans(
    data: ArrayView2<'_, f64>,
    k: usize,
    metric: DistanceMetric,
    max_iterations: usize,
    seed: u64,
) -> Result<KmeansOutcome> {
    Kmeans::new(k)
        .with_metric(metric)
        .with_max_iter(max_iterations)
        .with_seed(seed)
        .run(data, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use std::sync::atomic::Ordering;

    fn four_points() -> Array2<f64> {
        array![[0.0, 0.0], [0.1, 0.1], [10.0, 10.0], [10.1, 10.1]]
    }

    #[test]
    fn test_kmeans_basic() {
        let labels = Kmeans::new(2).with_seed(42).fit_predict(four_points().view()).unwrap();

        // Points 0,1 should be in same cluster, points 2,3 in another
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[2], labels[3]);
        assert_ne!(labels[0], labels[2]);
    }

    #[test]
    fn test_kmeans_two_triples() {
        let data = array![
            [0.0, 0.0],
            [0.0, 1.0],
            [1.0, 0.0],
            [10.0, 10.0],
            [10.0, 11.0],
            [11.0, 10.0],
        ];
        let out = kmeans(data.view(), 2, DistanceMetric::Euclidean, 300, 0).unwrap();
        assert!(out.converged);
        assert_eq!(out.clusters, ClusterSet::from_labels(&[0, 0, 0, 1, 1, 1]));
    }

    #[test]
    fn test_kmeans_all_points_assigned() {
        // Property: every point must be assigned to exactly one cluster
        let data = Array2::from_shape_fn((50, 2), |(i, j)| {
            if j == 0 {
                i as f64 * 0.1
            } else {
                (i % 5) as f64
            }
        });

        let out = Kmeans::new(5).with_seed(123).run(data.view(), None).unwrap();

        assert_eq!(out.labels.len(), 50);
        for &label in &out.labels {
            assert!(label < 5, "label {} out of range", label);
        }
        assert_eq!(out.clusters.n_items(), 50);
    }

    #[test]
    fn test_kmeans_k_equals_n() {
        // Edge case: k = n (each point its own cluster)
        let data = array![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]];
        let out = Kmeans::new(3).with_seed(42).run(data.view(), None).unwrap();
        assert_eq!(out.clusters.len(), 3);
    }

    #[test]
    fn test_kmeans_deterministic_with_seed() {
        let data = Array2::from_shape_fn((30, 3), |(i, j)| ((i * 7 + j * 13) % 11) as f64);
        for metric in [DistanceMetric::Euclidean, DistanceMetric::Cityblock, DistanceMetric::Cosine] {
            let a = kmeans(data.view(), 4, metric, 300, 9).unwrap();
            let b = kmeans(data.view(), 4, metric, 300, 9).unwrap();
            assert_eq!(a.labels, b.labels, "{metric}: same seed should give same result");
            assert_eq!(a.centroids, b.centroids);
        }
    }

    #[test]
    fn test_kmeans_scaling_invariant() {
        // Metamorphic: uniform scaling shouldn't change cluster assignments
        let data = four_points();
        let scaled = data.mapv(|x| x * 100.0);

        let a = Kmeans::new(2).with_seed(42).run(data.view(), None).unwrap();
        let b = Kmeans::new(2).with_seed(42).run(scaled.view(), None).unwrap();
        assert_eq!(a.clusters, b.clusters);
    }

    #[test]
    fn test_kmeans_iteration_limit_reports_not_converged() {
        let data = Array2::from_shape_fn((40, 2), |(i, j)| ((i * 31 + j * 17) % 23) as f64);
        let out = Kmeans::new(6).with_seed(1).with_max_iter(1).run(data.view(), None).unwrap();
        assert_eq!(out.iterations, 1);
        assert!(!out.converged);
        assert_eq!(out.centroids.dim(), (6, 2));
        let fitted = Kmeans::new(6)
            .with_seed(1)
            .with_max_iter(1)
            .fit(data.view(), None)
            .unwrap();
        assert_eq!(fitted.warnings, vec![Warning::NotConverged { iterations: 1 }]);
    }

    #[test]
    fn test_kmeans_invalid_k() {
        let data = array![[0.0, 0.0], [1.0, 1.0]];
        assert_eq!(
            Kmeans::new(5).run(data.view(), None).unwrap_err(),
            Error::InvalidK { k: 5, n_items: 2 }
        );
        assert!(matches!(
            Kmeans::new(0).run(data.view(), None),
            Err(Error::InvalidK { k: 0, .. })
        ));
    }

    #[test]
    fn test_kmeans_rejects_nan() {
        let data = array![[0.0, f64::NAN], [1.0, 1.0]];
        assert!(matches!(
            Kmeans::new(1).run(data.view(), None),
            Err(Error::DegenerateInput { .. })
        ));
    }

    #[test]
    fn test_kmeans_duplicate_rows() {
        let data = array![[1.0, 1.0], [1.0, 1.0], [1.0, 1.0]];
        let out = Kmeans::new(2).run(data.view(), None).unwrap();
        assert_eq!(out.clusters.n_items(), 3);
        assert!(out.converged);
    }

    #[test]
    fn test_kmeans_cancelled() {
        let flag = AtomicBool::new(true);
        let err = Kmeans::new(2).run(four_points().view(), Some(&flag)).unwrap_err();
        assert_eq!(err, Error::Cancelled { phase: "kmeans iteration" });
        flag.store(false, Ordering::Relaxed);
        assert!(Kmeans::new(2).run(four_points().view(), Some(&flag)).is_ok());
    }
}
