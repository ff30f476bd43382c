//! Clustering of matrix rows.
//!
//! Two families are provided, both producing a hard [`ClusterSet`]:
//!
//! ### Hierarchical (Agglomerative) Clustering
//!
//! Pairwise distances feed a linkage method, which builds a
//! [`Dendrogram`]; a flat-cluster criterion then cuts the tree.
//!
//! ```text
//! rows ──distance──▶ DistanceMatrix ──linkage──▶ Dendrogram ──cut──▶ ClusterSet
//! ```
//!
//! ### K-means
//!
//! Assign each row to the nearest centroid, then move centroids to the mean
//! of their rows. Repeat until assignments stop changing.
//!
//! ```text
//! J = Σ_k Σ_{x ∈ C_k} d(x, μ_k)
//! ```
//!
//! **When to use**: You know k in advance and the clusters are roughly
//! spherical under the chosen metric.
//!
//! ## Usage
//!
//! ```rust
//! use kecluster::cluster::{Clustering, FlatClusterCriterion, HierarchicalClustering, Kmeans, Threshold};
//! use ndarray::array;
//!
//! let data = array![
//!     [0.0, 0.0],
//!     [0.1, 0.1],
//!     [10.0, 10.0],
//!     [10.1, 10.1],
//! ];
//!
//! let labels = Kmeans::new(2).fit_predict(data.view()).unwrap();
//! assert_eq!(labels[0], labels[1]);
//! assert_ne!(labels[0], labels[2]);
//!
//! let tree = HierarchicalClustering::new(Threshold::Absolute(2.0))
//!     .with_criterion(FlatClusterCriterion::Maxclust)
//!     .fit(data.view(), None)
//!     .unwrap();
//! assert_eq!(tree.clusters.len(), 2);
//! ```

mod dendrogram;
mod fcluster;
mod hierarchical;
mod kmeans;
mod linkage;
mod set;
mod traits;

pub use dendrogram::{Dendrogram, Inconsistency, Merge};
pub use fcluster::{cut_tree, cut_tree_with_depth, CutOutcome, FlatClusterCriterion};
pub use hierarchical::{HierarchicalClustering, Threshold};
pub use kmeans::{kmeans, Kmeans, KmeansOutcome};
pub use linkage::{build_linkage, check_compatible, LinkageMethod};
pub use set::ClusterSet;
pub use traits::{Clustered, Clustering, Warning};
