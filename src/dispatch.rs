//! Request validation and dispatch.
//!
//! Each request goes through three stages:
//!
//! 1. **Validate** the raw parameters: required fields, defaults, closed
//!    enum sets, metric/method compatibility. No collaborator is called
//!    until this succeeds.
//! 2. **Execute** the engines on the resolved matrix.
//! 3. **Assemble** outputs through the store and report collaborators.
//!
//! Engine and collaborator errors are forwarded unchanged; nothing is
//! retried.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::assemble::{Assembler, AxisClusters};
use crate::choice::parse_or;
use crate::cluster::{
    check_compatible, Clustered, Clustering, FlatClusterCriterion, HierarchicalClustering, Kmeans,
    LinkageMethod, Threshold,
};
use crate::config::EngineConfig;
use crate::distance::{compute_distances, DistanceMetric};
use crate::error::{Error, Result};
use crate::matrix::ensure_finite;
use crate::metrics::silhouette;
use crate::naming::NamingPolicy;
use crate::pca::Pca;
use crate::request::{
    ClusterOutput, EmClusterOutput, EmClusterParams, HierClusterParams, KmeansClusterParams,
    PcaOutput, PcaParams, Request, Response,
};
use crate::services::{InMemoryWorkspace, MatrixSource, ObjectStore, ReportService, ResolvedMatrix};

/// Axis tags for two-axis outputs.
const FEATURE: &str = "feature";
const CONDITION: &str = "condition";

/// Routes validated requests to the engines and assembles their outputs.
pub struct Dispatcher {
    source: Arc<dyn MatrixSource>,
    store: Arc<dyn ObjectStore>,
    reports: Arc<dyn ReportService>,
    config: EngineConfig,
}

/// Validated hierarchical-clustering parameters.
#[derive(Debug, Clone)]
struct TreePlan {
    metric: DistanceMetric,
    linkage: LinkageMethod,
    criterion: FlatClusterCriterion,
}

impl TreePlan {
    fn parse(
        dist_metric: Option<&str>,
        linkage_method: Option<&str>,
        fcluster_criterion: Option<&str>,
    ) -> Result<Self> {
        let plan = Self {
            metric: parse_metric(dist_metric)?,
            linkage: parse_or(non_empty(linkage_method), LinkageMethod::Ward)?,
            criterion: parse_or(non_empty(fcluster_criterion), FlatClusterCriterion::Distance)?,
        };
        check_compatible(plan.linkage, plan.metric)?;
        Ok(plan)
    }

    fn clusterer(&self, threshold: Threshold, depth: usize) -> HierarchicalClustering {
        HierarchicalClustering::new(threshold)
            .with_metric(self.metric)
            .with_linkage(self.linkage)
            .with_criterion(self.criterion)
            .with_depth(depth)
    }

    fn describe(&self, threshold: &str) -> String {
        format!(
            "hierarchical: metric={}, linkage={}, criterion={}, {threshold}",
            self.metric, self.linkage, self.criterion
        )
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn required_str<'a>(field: &'static str, value: Option<&'a str>) -> Result<&'a str> {
    non_empty(value).ok_or(Error::MissingField { field })
}

fn required<T: Copy>(field: &'static str, value: Option<T>) -> Result<T> {
    value.ok_or(Error::MissingField { field })
}

/// Metrics report their own error kind rather than a generic option error.
fn parse_metric(raw: Option<&str>) -> Result<DistanceMetric> {
    match non_empty(raw) {
        None => Ok(DistanceMetric::Euclidean),
        Some(name) => name.parse(),
    }
}

impl Dispatcher {
    /// Dispatcher over explicit collaborators.
    pub fn new(
        source: Arc<dyn MatrixSource>,
        store: Arc<dyn ObjectStore>,
        reports: Arc<dyn ReportService>,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            source,
            store,
            reports,
            config,
        })
    }

    /// Dispatcher whose collaborators are all `workspace`.
    pub fn in_memory(workspace: Arc<InMemoryWorkspace>, config: EngineConfig) -> Result<Self> {
        Self::new(workspace.clone(), workspace.clone(), workspace, config)
    }

    /// Active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Handle a typed request.
    pub fn dispatch(&self, request: Request) -> Result<Response> {
        self.dispatch_with_cancel(request, None)
    }

    /// Handle a typed request, checking `cancel` between phases.
    #[instrument(skip_all, fields(method = request.method()))]
    pub fn dispatch_with_cancel(&self, request: Request, cancel: Option<&AtomicBool>) -> Result<Response> {
        let extra = request.additional_properties();
        if !extra.is_empty() {
            debug!(keys = ?extra.keys().collect::<Vec<_>>(), "ignoring unknown parameters");
        }
        info!("request started");
        let response = match &request {
            Request::HierarchicalCluster(p) => {
                Response::Cluster(self.run_hierarchical_cluster(p, cancel)?)
            }
            Request::KmeansCluster(p) => Response::Cluster(self.run_kmeans_cluster(p, cancel)?),
            Request::Pca(p) => Response::Pca(self.run_pca(p, cancel)?),
            Request::ExpressionMatrixCluster(p) => {
                Response::ExpressionMatrixCluster(self.run_expression_matrix_cluster(p, cancel)?)
            }
        };
        info!("request finished");
        Ok(response)
    }

    /// JSON in, JSON out.
    pub fn handle_json(&self, method: &str, params: Value) -> Result<Value> {
        let request = Request::from_json(method, params)?;
        let response = self.dispatch(request)?;
        serde_json::to_value(response).map_err(|e| Error::ComputationAnomaly {
            detail: format!("response serialization failed: {e}"),
        })
    }

    /// Resolve a matrix and reject missing values, naming the first bad row.
    fn resolve(&self, reference: &str) -> Result<ResolvedMatrix> {
        let source = self.source.resolve(reference)?;
        debug!(
            name = %source.name,
            rows = source.matrix.nrows(),
            cols = source.matrix.ncols(),
            "resolved matrix"
        );
        ensure_finite(source.matrix.values(), Some(source.matrix.row_ids()))?;
        Ok(source)
    }

    fn assembler(&self) -> Assembler<'_> {
        Assembler::new(self.store.as_ref(), self.reports.as_ref(), &self.config)
    }

    fn silhouette_of(&self, clustered: &Clustered) -> Option<f64> {
        let distances = clustered.distances.as_ref()?;
        if distances.n() > self.config.silhouette_max_items {
            return None;
        }
        silhouette(distances, &clustered.clusters)
    }

    /// Hierarchical clustering of rows, and of columns when
    /// `col_dist_cutoff_rate` is set.
    pub fn run_hierarchical_cluster(
        &self,
        params: &HierClusterParams,
        cancel: Option<&AtomicBool>,
    ) -> Result<ClusterOutput> {
        let matrix_ref = required_str("matrix_ref", params.matrix_ref.as_deref())?;
        let workspace = required_str("workspace_name", params.workspace_name.as_deref())?;
        let row_rate = required("row_dist_cutoff_rate", params.row_dist_cutoff_rate)?;
        let plan = TreePlan::parse(
            params.dist_metric.as_deref(),
            params.linkage_method.as_deref(),
            params.fcluster_criterion.as_deref(),
        )?;
        plan.criterion.validate_threshold(row_rate)?;
        if let Some(col_rate) = params.col_dist_cutoff_rate {
            plan.criterion.validate_threshold(col_rate)?;
        }
        let naming = NamingPolicy::explicit_or(
            params.cluster_set_name.as_deref(),
            &self.config.default_cluster_suffix,
        );

        let source = self.resolve(matrix_ref)?;
        let depth = self.config.inconsistency_depth;
        let rows = plan
            .clusterer(Threshold::RateOfMaxHeight(row_rate), depth)
            .fit(source.matrix.values(), cancel)?;

        let columns = match params.col_dist_cutoff_rate {
            Some(col_rate) => Some(
                plan.clusterer(Threshold::RateOfMaxHeight(col_rate), depth)
                    .fit(source.matrix.transposed().values(), cancel)?,
            ),
            None => None,
        };

        let row_tag = columns.as_ref().map(|_| FEATURE);
        let mut axes = vec![AxisClusters {
            tag: row_tag,
            ids: source.matrix.row_ids(),
            clustered: &rows,
            silhouette: self.silhouette_of(&rows),
        }];
        if let Some(cols) = &columns {
            axes.push(AxisClusters {
                tag: Some(CONDITION),
                ids: source.matrix.col_ids(),
                clustered: cols,
                silhouette: self.silhouette_of(cols),
            });
        }

        let assembled = self.assembler().assemble_clusters(
            workspace,
            matrix_ref,
            &source,
            &naming,
            &plan.describe(&format!("row_dist_cutoff_rate={row_rate}")),
            &axes,
        )?;
        Ok(ClusterOutput {
            cluster_set_refs: assembled.refs,
            report_name: assembled.report.name,
            report_ref: assembled.report.reference,
            warnings: assembled.warnings,
        })
    }

    /// K-means clustering of rows.
    pub fn run_kmeans_cluster(
        &self,
        params: &KmeansClusterParams,
        cancel: Option<&AtomicBool>,
    ) -> Result<ClusterOutput> {
        let matrix_ref = required_str("matrix_ref", params.matrix_ref.as_deref())?;
        let workspace = required_str("workspace_name", params.workspace_name.as_deref())?;
        let k = required("k_num", params.k_num)?;
        let metric = parse_metric(params.dist_metric.as_deref())?;
        let naming = NamingPolicy::explicit_or(
            params.cluster_set_name.as_deref(),
            &self.config.default_cluster_suffix,
        );

        let source = self.resolve(matrix_ref)?;
        let n = source.matrix.nrows();
        if k < 1 || k as u64 > n as u64 {
            return Err(Error::InvalidK { k, n_items: n });
        }
        let clustered = Kmeans::new(k as usize)
            .with_metric(metric)
            .with_max_iter(self.config.kmeans_max_iter)
            .with_seed(self.config.kmeans_seed)
            .fit(source.matrix.values(), cancel)?;

        let silhouette = if n <= self.config.silhouette_max_items {
            let distances = compute_distances(source.matrix.values(), metric)?;
            silhouette(&distances, &clustered.clusters)
        } else {
            None
        };

        let assembled = self.assembler().assemble_clusters(
            workspace,
            matrix_ref,
            &source,
            &naming,
            &format!("kmeans: k={k}, metric={metric}, seed={}", self.config.kmeans_seed),
            &[AxisClusters {
                tag: None,
                ids: source.matrix.row_ids(),
                clustered: &clustered,
                silhouette,
            }],
        )?;
        Ok(ClusterOutput {
            cluster_set_refs: assembled.refs,
            report_name: assembled.report.name,
            report_ref: assembled.report.reference,
            warnings: assembled.warnings,
        })
    }

    /// Principal component analysis of rows.
    pub fn run_pca(&self, params: &PcaParams, cancel: Option<&AtomicBool>) -> Result<PcaOutput> {
        let matrix_ref = required_str("cluster_set_ref", params.cluster_set_ref.as_deref())?;
        let workspace = required_str("workspace_name", params.workspace_name.as_deref())?;
        let requested = params.n_components.unwrap_or(2);
        let naming = NamingPolicy::explicit_or(
            params.pca_matrix_name.as_deref(),
            &self.config.default_pca_suffix,
        );

        let source = self.resolve(matrix_ref)?;
        let max = source.matrix.nrows().min(source.matrix.ncols());
        if requested < 1 || requested as u64 > max as u64 {
            return Err(Error::InvalidComponents { requested, max });
        }
        let result = Pca::new(requested as usize)
            .with_scaling(self.config.pca_scaling)
            .fit(source.matrix.values(), cancel)?;

        let (pca_ref, report) =
            self.assembler()
                .assemble_pca(workspace, matrix_ref, &source, &naming, &result)?;
        Ok(PcaOutput {
            pca_ref,
            report_name: report.name,
            report_ref: report.reference,
        })
    }

    /// Hierarchical clustering of both axes of an expression matrix.
    pub fn run_expression_matrix_cluster(
        &self,
        params: &EmClusterParams,
        cancel: Option<&AtomicBool>,
    ) -> Result<EmClusterOutput> {
        let matrix_ref = required_str("matrix_ref", params.matrix_ref.as_deref())?;
        let workspace = required_str("workspace_name", params.workspace_name.as_deref())?;
        let suffix = params
            .feature_set_suffix
            .as_deref()
            .ok_or(Error::MissingField {
                field: "feature_set_suffix",
            })?;
        let threshold = required("dist_threshold", params.dist_threshold)?;
        let plan = TreePlan::parse(
            params.dist_metric.as_deref(),
            params.linkage_method.as_deref(),
            params.fcluster_criterion.as_deref(),
        )?;
        plan.criterion.validate_threshold(threshold)?;
        let naming = NamingPolicy::Suffix(suffix.to_string());

        let source = self.resolve(matrix_ref)?;
        let depth = self.config.inconsistency_depth;
        let clusterer = plan.clusterer(Threshold::Absolute(threshold), depth);
        let features = clusterer.fit(source.matrix.values(), cancel)?;
        let transposed = source.matrix.transposed();
        let conditions = clusterer.fit(transposed.values(), cancel)?;

        let assembled = self.assembler().assemble_clusters(
            workspace,
            matrix_ref,
            &source,
            &naming,
            &plan.describe(&format!("dist_threshold={threshold}")),
            &[
                AxisClusters {
                    tag: Some(FEATURE),
                    ids: source.matrix.row_ids(),
                    clustered: &features,
                    silhouette: self.silhouette_of(&features),
                },
                AxisClusters {
                    tag: Some(CONDITION),
                    ids: source.matrix.col_ids(),
                    clustered: &conditions,
                    silhouette: self.silhouette_of(&conditions),
                },
            ],
        )?;
        Ok(EmClusterOutput {
            feature_set_set_refs: assembled.refs,
            report_name: assembled.report.name,
            report_ref: assembled.report.reference,
            warnings: assembled.warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::choice::Choice;

    #[test]
    fn test_tree_plan_defaults() {
        let plan = TreePlan::parse(None, None, None).unwrap();
        assert_eq!(plan.metric, DistanceMetric::Euclidean);
        assert_eq!(plan.linkage, LinkageMethod::Ward);
        assert_eq!(plan.criterion, FlatClusterCriterion::Distance);
        assert_eq!(plan.linkage.as_wire(), "ward");
    }

    #[test]
    fn test_tree_plan_rejects_incompatible_pair() {
        let err = TreePlan::parse(Some("cityblock"), Some("centroid"), None).unwrap_err();
        assert!(matches!(err, Error::IncompatibleLinkage { method: "centroid", .. }));
        assert!(TreePlan::parse(Some("cityblock"), Some("average"), Some("maxclust")).is_ok());
    }

    #[test]
    fn test_empty_strings_count_as_missing() {
        assert_eq!(
            required_str("workspace_name", Some("")),
            Err(Error::MissingField {
                field: "workspace_name"
            })
        );
        assert_eq!(parse_metric(Some("")).unwrap(), DistanceMetric::Euclidean);
    }

    #[test]
    fn test_unknown_metric_is_invalid_metric() {
        assert_eq!(
            parse_metric(Some("bogus")),
            Err(Error::InvalidMetric {
                field: "dist_metric",
                name: "bogus".into(),
                allowed: DistanceMetric::ALLOWED,
            })
        );
    }
}
