//! Clustering traits.

use std::fmt;
use std::sync::atomic::AtomicBool;

use ndarray::ArrayView2;

use super::dendrogram::Dendrogram;
use super::set::ClusterSet;
use crate::distance::DistanceMatrix;
use crate::error::Result;

/// Non-fatal condition attached to a clustering result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Warning {
    /// k-means hit its iteration limit before assignments stabilized.
    NotConverged {
        /// Iterations run.
        iterations: usize,
    },
    /// `maxclust` could not produce exactly the requested count.
    InexactClusterCount {
        /// Requested number of clusters.
        requested: usize,
        /// Number of clusters produced.
        achieved: usize,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::NotConverged { iterations } => write!(
                f,
                "k-means did not converge within {iterations} iterations"
            ),
            Warning::InexactClusterCount {
                requested,
                achieved,
            } => write!(
                f,
                "requested {requested} clusters, achieved {achieved}"
            ),
        }
    }
}

/// Everything a clustering run produced.
#[derive(Debug, Clone)]
pub struct Clustered {
    /// The flat partition.
    pub clusters: ClusterSet,
    /// Merge history, for hierarchical methods.
    pub dendrogram: Option<Dendrogram>,
    /// Pairwise distances, when the method computed them.
    pub distances: Option<DistanceMatrix>,
    /// Non-fatal conditions.
    pub warnings: Vec<Warning>,
}

impl Clustered {
    /// Result with no side products.
    pub fn flat(clusters: ClusterSet) -> Self {
        Self {
            clusters,
            dendrogram: None,
            distances: None,
            warnings: Vec::new(),
        }
    }
}

/// Trait for clustering algorithms over the rows of a matrix.
pub trait Clustering {
    /// Fit the model to `data` (one item per row).
    ///
    /// `cancel` is checked between phases; a set flag yields
    /// [`Error::Cancelled`](crate::Error::Cancelled).
    fn fit(&self, data: ArrayView2<'_, f64>, cancel: Option<&AtomicBool>) -> Result<Clustered>;

    /// Fit and return one contiguous label per row.
    fn fit_predict(&self, data: ArrayView2<'_, f64>) -> Result<Vec<usize>> {
        Ok(self.fit(data, None)?.clusters.labels())
    }
}
