//! # kecluster
//!
//! Validated clustering and PCA over labeled expression matrices.
//!
//! Requests name a source matrix, a workspace and algorithm parameters. The
//! [`Dispatcher`] validates them, runs the engines, and hands results to the
//! [`Assembler`](assemble::Assembler), which persists artifacts and files a
//! report through caller-supplied collaborators ([`services`]).
//!
//! ```text
//! Request ─▶ validate ─▶ distance ─▶ linkage ─▶ cut ─┐
//!                     ├▶ k-means ─────────────────────┼▶ assemble ─▶ Response
//!                     └▶ PCA ─────────────────────────┘
//! ```
//!
//! The engines are usable on their own:
//!
//! ```rust
//! use kecluster::cluster::{build_linkage, cut_tree, FlatClusterCriterion, LinkageMethod};
//! use kecluster::distance::{compute_distances, DistanceMetric};
//! use ndarray::array;
//!
//! let data = array![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [10.0, 10.0], [10.0, 11.0], [11.0, 10.0]];
//! let distances = compute_distances(data.view(), DistanceMetric::Euclidean).unwrap();
//! let tree = build_linkage(&distances, LinkageMethod::Ward).unwrap();
//! let cut = cut_tree(&tree, FlatClusterCriterion::Maxclust, 2.0).unwrap();
//! assert_eq!(cut.clusters.sizes(), vec![3, 3]);
//! ```
//!
//! ## Features
//!
//! - `parallel` (default): rayon data-parallelism in the distance engine
//!   and the k-means assignment step. Results are identical either way.

pub mod assemble;
pub mod cancel;
pub mod choice;
pub mod cluster;
pub mod config;
pub mod dispatch;
pub mod distance;
/// Error types used across `kecluster`.
pub mod error;
pub mod matrix;
pub mod metrics;
pub mod naming;
pub mod pca;
pub mod request;
pub mod services;

pub use crate::cluster::{
    build_linkage, cut_tree, kmeans, ClusterSet, Dendrogram, FlatClusterCriterion, LinkageMethod,
};
pub use crate::config::EngineConfig;
pub use crate::dispatch::Dispatcher;
pub use crate::distance::{compute_distances, DistanceMatrix, DistanceMetric};
pub use crate::matrix::LabeledMatrix;
pub use crate::pca::{compute_pca, PcaResult, PcaScaling};
pub use crate::request::{Request, Response};
pub use crate::services::{InMemoryWorkspace, MatrixSource, ObjectRef, ObjectStore, ReportService};

pub use error::{Error, Result};
