//! Clustering quality metrics.
//!
//! Internal measures: they need only the partition and the pairwise
//! distances it was built from, no ground truth.
//!
//! | Metric | Range | Best | Properties |
//! |--------|-------|------|------------|
//! | [`silhouette`] | [-1, 1] | 1 | Cohesion vs. separation, any metric |
//!
//! # References
//!
//! - Rousseeuw (1987). "Silhouettes: a graphical aid to the interpretation
//!   and validation of cluster analysis"

use crate::cluster::ClusterSet;
use crate::distance::DistanceMatrix;

/// Mean silhouette coefficient of a partition.
///
/// For item i with mean intra-cluster distance a(i) and smallest mean
/// distance to another cluster b(i):
///
/// ```text
/// s(i) = (b(i) - a(i)) / max(a(i), b(i))
/// ```
///
/// Items in singleton clusters score 0. Returns `None` unless
/// `2 <= clusters <= n - 1`, where the score is undefined.
///
/// # Example
///
/// ```rust
/// use kecluster::cluster::ClusterSet;
/// use kecluster::distance::{compute_distances, DistanceMetric};
/// use kecluster::metrics::silhouette;
/// use ndarray::array;
///
/// let data = array![[0.0], [0.1], [5.0], [5.1]];
/// let dm = compute_distances(data.view(), DistanceMetric::Euclidean).unwrap();
/// let s = silhouette(&dm, &ClusterSet::from_labels(&[0, 0, 1, 1])).unwrap();
/// assert!(s > 0.9);
/// ```
pub fn silhouette(distances: &DistanceMatrix, clusters: &ClusterSet) -> Option<f64> {
    let n = clusters.n_items();
    if distances.n() != n || clusters.len() < 2 || clusters.len() >= n {
        return None;
    }
    let labels = clusters.labels();
    let sizes = clusters.sizes();

    let mut total = 0.0;
    let mut sums = vec![0.0; clusters.len()];
    for i in 0..n {
        sums.iter_mut().for_each(|s| *s = 0.0);
        for j in 0..n {
            if i != j {
                sums[labels[j]] += distances.get(i, j);
            }
        }
        let own = labels[i];
        if sizes[own] == 1 {
            continue;
        }
        let a = sums[own] / (sizes[own] - 1) as f64;
        let b = sums
            .iter()
            .zip(&sizes)
            .enumerate()
            .filter(|&(c, _)| c != own)
            .map(|(_, (s, &size))| s / size as f64)
            .fold(f64::INFINITY, f64::min);
        let denom = a.max(b);
        if denom > 0.0 {
            total += (b - a) / denom;
        }
    }
    Some(total / n as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::{compute_distances, DistanceMetric};
    use approx::assert_relative_eq;
    use ndarray::array;

    fn line() -> DistanceMatrix {
        let data = array![[0.0], [1.0], [10.0], [11.0]];
        compute_distances(data.view(), DistanceMetric::Euclidean).unwrap()
    }

    #[test]
    fn test_silhouette_matches_hand_computation() {
        let dm = line();
        let s = silhouette(&dm, &ClusterSet::from_labels(&[0, 0, 1, 1])).unwrap();
        // Item 0: a = 1, b = (10 + 11) / 2 = 10.5
        // Item 1: a = 1, b = (9 + 10) / 2 = 9.5
        // Items 2, 3 mirror items 1, 0.
        let expected = 2.0 * ((9.5 / 10.5) + (8.5 / 9.5)) / 4.0;
        assert_relative_eq!(s, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_silhouette_bad_partition_is_negative() {
        let dm = line();
        let s = silhouette(&dm, &ClusterSet::from_labels(&[0, 1, 0, 1])).unwrap();
        assert!(s < 0.0);
    }

    #[test]
    fn test_silhouette_undefined_cases() {
        let dm = line();
        assert_eq!(silhouette(&dm, &ClusterSet::from_labels(&[0, 0, 0, 0])), None);
        assert_eq!(silhouette(&dm, &ClusterSet::from_labels(&[0, 1, 2, 3])), None);
        assert_eq!(silhouette(&dm, &ClusterSet::from_labels(&[0, 1])), None);
    }

    #[test]
    fn test_singletons_score_zero() {
        let dm = line();
        let s = silhouette(&dm, &ClusterSet::from_labels(&[0, 0, 1, 2])).unwrap();
        // Only items 0 and 1 contribute.
        let s0 = (10.0 - 1.0) / 10.0;
        let s1 = (9.0 - 1.0) / 9.0;
        assert_relative_eq!(s, (s0 + s1) / 4.0, epsilon = 1e-12);
    }
}
