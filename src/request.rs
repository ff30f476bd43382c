//! Wire-level request and response types.
//!
//! Request structs mirror the JSON parameter objects callers send. Every
//! field is optional at this layer: required-ness, defaults and closed-set
//! validation belong to the dispatcher, so a missing field surfaces as
//! `MissingField` rather than a serde error. Keys the structs do not know are
//! kept in `additional_properties` and otherwise ignored.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::services::ObjectRef;

/// Parameters of `run_hierarchical_cluster`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HierClusterParams {
    /// Source matrix reference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matrix_ref: Option<String>,
    /// Workspace receiving the outputs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_name: Option<String>,
    /// Explicit name for the cluster set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_set_name: Option<String>,
    /// Row cut threshold (a fraction of the tallest merge under `distance`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_dist_cutoff_rate: Option<f64>,
    /// When set, columns are clustered too, with this threshold.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub col_dist_cutoff_rate: Option<f64>,
    /// Distance metric wire name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dist_metric: Option<String>,
    /// Linkage method wire name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linkage_method: Option<String>,
    /// Flat-cluster criterion wire name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fcluster_criterion: Option<String>,
    /// Unrecognized keys.
    #[serde(flatten)]
    pub additional_properties: BTreeMap<String, Value>,
}

/// Parameters of `run_kmeans_cluster`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KmeansClusterParams {
    /// Source matrix reference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matrix_ref: Option<String>,
    /// Workspace receiving the outputs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_name: Option<String>,
    /// Explicit name for the cluster set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_set_name: Option<String>,
    /// Number of clusters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub k_num: Option<i64>,
    /// Distance metric wire name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dist_metric: Option<String>,
    /// Unrecognized keys.
    #[serde(flatten)]
    pub additional_properties: BTreeMap<String, Value>,
}

/// Parameters of `run_pca`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PcaParams {
    /// Source matrix reference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_set_ref: Option<String>,
    /// Workspace receiving the outputs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_name: Option<String>,
    /// Explicit name for the projection matrix.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pca_matrix_name: Option<String>,
    /// Components to keep (default 2).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n_components: Option<i64>,
    /// Unrecognized keys.
    #[serde(flatten)]
    pub additional_properties: BTreeMap<String, Value>,
}

/// Parameters of `run_expression_matrix_cluster`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmClusterParams {
    /// Source matrix reference.
    #[serde(alias = "expression_matrix_ref", skip_serializing_if = "Option::is_none")]
    pub matrix_ref: Option<String>,
    /// Workspace receiving the outputs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_name: Option<String>,
    /// Suffix appended to `<matrix>_feature` / `<matrix>_condition`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature_set_suffix: Option<String>,
    /// Cut threshold, applied to both axes as-is.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dist_threshold: Option<f64>,
    /// Distance metric wire name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dist_metric: Option<String>,
    /// Linkage method wire name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linkage_method: Option<String>,
    /// Flat-cluster criterion wire name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fcluster_criterion: Option<String>,
    /// Unrecognized keys.
    #[serde(flatten)]
    pub additional_properties: BTreeMap<String, Value>,
}

/// Output of the single-matrix clustering operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterOutput {
    /// One reference per persisted cluster set.
    pub cluster_set_refs: Vec<ObjectRef>,
    /// Report object name.
    pub report_name: String,
    /// Report object reference.
    pub report_ref: ObjectRef,
    /// Non-fatal conditions (convergence, inexact cluster counts).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Output of `run_expression_matrix_cluster`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmClusterOutput {
    /// Feature set first, condition set second.
    pub feature_set_set_refs: Vec<ObjectRef>,
    /// Report object name.
    pub report_name: String,
    /// Report object reference.
    pub report_ref: ObjectRef,
    /// Non-fatal conditions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Output of `run_pca`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PcaOutput {
    /// Reference of the persisted projection matrix.
    pub pca_ref: ObjectRef,
    /// Report object name.
    pub report_name: String,
    /// Report object reference.
    pub report_ref: ObjectRef,
}

/// A typed request.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Hierarchical clustering of rows (and optionally columns).
    HierarchicalCluster(HierClusterParams),
    /// K-means clustering of rows.
    KmeansCluster(KmeansClusterParams),
    /// Principal component analysis.
    Pca(PcaParams),
    /// Hierarchical clustering of both axes of an expression matrix.
    ExpressionMatrixCluster(EmClusterParams),
}

/// Method names accepted by [`Request::from_json`].
pub const METHODS: &[&str] = &[
    "run_hierarchical_cluster",
    "run_kmeans_cluster",
    "run_pca",
    "run_expression_matrix_cluster",
];

impl Request {
    /// Method name of this request.
    pub fn method(&self) -> &'static str {
        match self {
            Request::HierarchicalCluster(_) => METHODS[0],
            Request::KmeansCluster(_) => METHODS[1],
            Request::Pca(_) => METHODS[2],
            Request::ExpressionMatrixCluster(_) => METHODS[3],
        }
    }

    /// Build a typed request from a method name and its JSON parameters.
    pub fn from_json(method: &str, params: Value) -> Result<Self> {
        fn parse<T: serde::de::DeserializeOwned>(method: &str, params: Value) -> Result<T> {
            serde_json::from_value(params).map_err(|e| Error::MalformedRequest {
                method: method.to_string(),
                message: e.to_string(),
            })
        }
        let request = match method {
            "run_hierarchical_cluster" => Request::HierarchicalCluster(parse(method, params)?),
            "run_kmeans_cluster" => Request::KmeansCluster(parse(method, params)?),
            "run_pca" => Request::Pca(parse(method, params)?),
            "run_expression_matrix_cluster" => {
                Request::ExpressionMatrixCluster(parse(method, params)?)
            }
            other => {
                return Err(Error::InvalidOption {
                    field: "method",
                    value: other.to_string(),
                    allowed: METHODS,
                })
            }
        };
        Ok(request)
    }

    /// Keys the typed parameters did not recognize.
    pub fn additional_properties(&self) -> &BTreeMap<String, Value> {
        match self {
            Request::HierarchicalCluster(p) => &p.additional_properties,
            Request::KmeansCluster(p) => &p.additional_properties,
            Request::Pca(p) => &p.additional_properties,
            Request::ExpressionMatrixCluster(p) => &p.additional_properties,
        }
    }
}

/// A typed response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    /// From hierarchical or k-means clustering.
    Cluster(ClusterOutput),
    /// From expression-matrix clustering.
    ExpressionMatrixCluster(EmClusterOutput),
    /// From PCA.
    Pca(PcaOutput),
}
