//! Hierarchical (agglomerative) clustering.
//!
//! Bottom-up clustering that builds a **dendrogram** by iteratively
//! merging the closest clusters, then cuts it into flat clusters. Unlike
//! K-means you don't need to specify k in advance: the criterion and
//! threshold decide where the tree is cut.
//!
//! ## Ward's Method: Variance Minimization
//!
//! Ward linkage minimizes the increase in total within-cluster variance
//! when merging clusters A and B:
//!
//! ```text
//! Δ(A,B) = (nₐ × nᵦ)/(nₐ + nᵦ) × ||μₐ - μᵦ||²
//! ```
//!
//! Where nₐ, nᵦ are cluster sizes and μₐ, μᵦ are centroids. It is the
//! default method, which is why the default metric is `euclidean`.
//!
//! ## Relative thresholds
//!
//! A distance threshold can be given as a fraction of the tree's tallest
//! merge ([`Threshold::RateOfMaxHeight`]), which makes the same rate
//! meaningful across metrics with very different scales.

use std::sync::atomic::AtomicBool;

use ndarray::ArrayView2;
use tracing::debug;

use super::dendrogram::Dendrogram;
use super::fcluster::{cut_tree_with_depth, FlatClusterCriterion};
use super::linkage::{build_linkage, check_compatible, LinkageMethod};
use super::traits::{Clustered, Clustering};
use crate::cancel::{checkpoint, phase};
use crate::distance::{compute_distances, DistanceMatrix, DistanceMetric};
use crate::error::Result;

/// How the cut threshold is expressed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Threshold {
    /// Used as-is.
    Absolute(f64),
    /// Under the `distance` criterion, multiplied by the maximum merge
    /// height; used as-is under the other criteria.
    RateOfMaxHeight(f64),
}

/// Hierarchical (agglomerative) clustering.
#[derive(Debug, Clone)]
pub struct HierarchicalClustering {
    metric: DistanceMetric,
    linkage: LinkageMethod,
    criterion: FlatClusterCriterion,
    threshold: Threshold,
    depth: usize,
}

impl HierarchicalClustering {
    /// Create a new hierarchical clusterer: Euclidean distances, Ward
    /// linkage, `distance` criterion.
    pub fn new(threshold: Threshold) -> Self {
        Self {
            metric: DistanceMetric::Euclidean,
            linkage: LinkageMethod::Ward,
            criterion: FlatClusterCriterion::Distance,
            threshold,
            depth: 2,
        }
    }

    /// Set the distance metric.
    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Set linkage method.
    pub fn with_linkage(mut self, linkage: LinkageMethod) -> Self {
        self.linkage = linkage;
        self
    }

    /// Set the flat-cluster criterion.
    pub fn with_criterion(mut self, criterion: FlatClusterCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Set the inconsistency depth.
    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    /// Fail early when the metric/method pair or the threshold is unusable.
    pub fn validate(&self) -> Result<()> {
        check_compatible(self.linkage, self.metric)?;
        let raw = match self.threshold {
            Threshold::Absolute(t) | Threshold::RateOfMaxHeight(t) => t,
        };
        self.criterion.validate_threshold(raw)
    }

    /// Distances and dendrogram, without cutting.
    pub fn fit_dendrogram(
        &self,
        data: ArrayView2<'_, f64>,
        cancel: Option<&AtomicBool>,
    ) -> Result<(DistanceMatrix, Dendrogram)> {
        check_compatible(self.linkage, self.metric)?;
        let distances = compute_distances(data, self.metric)?;
        checkpoint(cancel, phase::DISTANCE)?;
        let dendro = build_linkage(&distances, self.linkage)?;
        checkpoint(cancel, phase::LINKAGE)?;
        Ok((distances, dendro))
    }

    /// The threshold handed to the cut for this dendrogram.
    pub fn resolve_threshold(&self, dendro: &Dendrogram) -> f64 {
        match (self.threshold, self.criterion) {
            (Threshold::RateOfMaxHeight(rate), FlatClusterCriterion::Distance) => {
                // Identical rows give a zero-height tree; keep the cut positive.
                (rate * dendro.max_height()).max(f64::MIN_POSITIVE)
            }
            (Threshold::Absolute(t), _) | (Threshold::RateOfMaxHeight(t), _) => t,
        }
    }
}

impl Clustering for HierarchicalClustering {
    fn fit(&self, data: ArrayView2<'_, f64>, cancel: Option<&AtomicBool>) -> Result<Clustered> {
        self.validate()?;
        let (distances, dendro) = self.fit_dendrogram(data, cancel)?;
        let threshold = self.resolve_threshold(&dendro);
        debug!(
            criterion = %self.criterion,
            threshold,
            max_height = dendro.max_height(),
            "cutting dendrogram"
        );
        let cut = cut_tree_with_depth(&dendro, self.criterion, threshold, self.depth)?;
        Ok(Clustered {
            clusters: cut.clusters,
            dendrogram: Some(dendro),
            distances: Some(distances),
            warnings: cut.warning.into_iter().collect(),
        })
    }
}
