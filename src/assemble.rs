//! Result assembly.
//!
//! Turns engine results into persisted artifacts and a report: derives every
//! output name from one [`NamingPolicy`], saves each artifact in order,
//! writes the summary text, and files the report listing what was created.

use std::fmt::Write as _;

use tracing::{debug, info};

use crate::cluster::{Clustered, Dendrogram};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::matrix::LabeledMatrix;
use crate::naming::{cluster_name, NamingPolicy};
use crate::pca::PcaResult;
use crate::services::{
    Artifact, ClusterSetArtifact, CreatedObject, FloatMatrixArtifact, NamedCluster, ObjectRef,
    ObjectStore, ReportInfo, ReportRequest, ReportService, ResolvedMatrix,
};

/// Dendrograms with this many merges or more are not summarised.
const DENDROGRAM_SUMMARY_LIMIT: usize = 1500;
/// Above this many merges only the top of the tree is listed.
const DENDROGRAM_FULL_LISTING: usize = 24;

/// Clusters of one axis of a source matrix.
#[derive(Debug)]
pub struct AxisClusters<'a> {
    /// `feature` / `condition`, or `None` for single-output requests.
    pub tag: Option<&'static str>,
    /// Identifiers of the clustered items.
    pub ids: &'a [String],
    /// Engine result.
    pub clustered: &'a Clustered,
    /// Mean silhouette, when computed.
    pub silhouette: Option<f64>,
}

/// Persisted cluster sets plus report.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledClusters {
    /// One reference per axis, in axis order.
    pub refs: Vec<ObjectRef>,
    /// The filed report.
    pub report: ReportInfo,
    /// Warnings from every axis.
    pub warnings: Vec<String>,
}

/// Builds outputs through the store and report collaborators.
pub struct Assembler<'a> {
    store: &'a dyn ObjectStore,
    reports: &'a dyn ReportService,
    config: &'a EngineConfig,
}

impl<'a> Assembler<'a> {
    /// Assemble through `store` and `reports`.
    pub fn new(store: &'a dyn ObjectStore, reports: &'a dyn ReportService, config: &'a EngineConfig) -> Self {
        Self {
            store,
            reports,
            config,
        }
    }

    /// Persist one cluster set per axis and file the report.
    pub fn assemble_clusters(
        &self,
        workspace: &str,
        source_ref: &str,
        source: &ResolvedMatrix,
        naming: &NamingPolicy,
        method: &str,
        axes: &[AxisClusters<'_>],
    ) -> Result<AssembledClusters> {
        let mut refs = Vec::with_capacity(axes.len());
        let mut created = Vec::with_capacity(axes.len());
        let mut warnings = Vec::new();
        let mut summary = String::new();

        for axis in axes {
            let set_name = naming.resolve(&source.name, axis.tag);
            let clusters = &axis.clustered.clusters;
            let named: Vec<NamedCluster> = clusters
                .named(axis.ids)
                .into_iter()
                .enumerate()
                .map(|(i, members)| NamedCluster {
                    name: cluster_name(&set_name, i),
                    members: members.into_iter().map(str::to_string).collect(),
                })
                .collect();

            let artifact = Artifact::ClusterSet(ClusterSetArtifact {
                description: match axis.tag {
                    Some(tag) => format!("{tag} clusters of {}", source.name),
                    None => format!("clusters of {}", source.name),
                },
                source_ref: source_ref.to_string(),
                axis: axis.tag.map(str::to_string),
                method: method.to_string(),
                clusters: named,
            });
            let reference = self.store.create(workspace, &set_name, &artifact)?;
            debug!(name = %set_name, %reference, clusters = clusters.len(), "saved cluster set");

            for warning in &axis.clustered.warnings {
                warnings.push(match axis.tag {
                    Some(tag) => format!("{tag}: {warning}"),
                    None => warning.to_string(),
                });
            }
            summary.push_str(&self.cluster_summary(&set_name, axis));
            created.push(CreatedObject {
                reference: reference.clone(),
                description: artifact.kind().to_string(),
            });
            refs.push(reference);
        }

        for warning in &warnings {
            let _ = writeln!(summary, "Warning: {warning}");
        }
        let report = self.file_report(workspace, summary, created)?;
        Ok(AssembledClusters {
            refs,
            report,
            warnings,
        })
    }

    /// Persist the projection matrix and file the report.
    pub fn assemble_pca(
        &self,
        workspace: &str,
        source_ref: &str,
        source: &ResolvedMatrix,
        naming: &NamingPolicy,
        result: &PcaResult,
    ) -> Result<(ObjectRef, ReportInfo)> {
        let name = naming.resolve(&source.name, None);
        let component_ids: Vec<String> = result
            .components
            .iter()
            .map(|c| format!("principal_component_{}", c.index))
            .collect();

        let data = LabeledMatrix::new(
            source.matrix.row_ids().to_vec(),
            component_ids.clone(),
            result.projection_matrix(),
        )?;
        let loadings = LabeledMatrix::new(
            source.matrix.col_ids().to_vec(),
            component_ids,
            ndarray::Array2::from_shape_fn(
                (source.matrix.ncols(), result.components.len()),
                |(j, k)| result.components[k].loadings[j],
            ),
        )?;
        let artifact = Artifact::FloatMatrix(FloatMatrixArtifact {
            description: format!("PCA of {}", source.name),
            source_ref: source_ref.to_string(),
            data,
            explained_variance: result.explained_variance(),
            loadings,
        });
        let reference = self.store.create(workspace, &name, &artifact)?;

        let mut summary = format!(
            "PCA matrix {name}: {} rows x {} components ({:?} scaling)\n",
            source.matrix.nrows(),
            result.components.len(),
            result.scaling,
        );
        for c in &result.components {
            let _ = writeln!(
                summary,
                "  principal_component_{}: eigenvalue {:.6}, explained variance {:.2}%",
                c.index,
                c.eigenvalue,
                100.0 * c.explained_variance_ratio
            );
        }
        let created = vec![CreatedObject {
            reference: reference.clone(),
            description: artifact.kind().to_string(),
        }];
        let report = self.file_report(workspace, summary, created)?;
        Ok((reference, report))
    }

    fn cluster_summary(&self, set_name: &str, axis: &AxisClusters<'_>) -> String {
        let clusters = &axis.clustered.clusters;
        let mut out = format!(
            "Cluster set {set_name}: {} clusters over {} items\n",
            clusters.len(),
            clusters.n_items()
        );
        let sizes: Vec<String> = clusters.sizes().iter().map(usize::to_string).collect();
        let _ = writeln!(out, "  sizes: {}", sizes.join(", "));
        if let Some(s) = axis.silhouette {
            let _ = writeln!(out, "  silhouette: {s:.4}");
        }
        if let Some(dendro) = &axis.clustered.dendrogram {
            out.push_str(&self.dendrogram_summary(dendro));
        }
        out
    }

    fn dendrogram_summary(&self, dendro: &Dendrogram) -> String {
        let merges = dendro.n_merges();
        if merges >= DENDROGRAM_SUMMARY_LIMIT {
            return format!("  dendrogram: {merges} merges, too large to summarise\n");
        }
        let (label, shown) = if merges > DENDROGRAM_FULL_LISTING {
            let p = self.config.dendrogram_summary_merges;
            (format!("last {} of {merges} merge heights", p.min(merges)), dendro.last_merges(p))
        } else {
            (format!("{merges} merge heights"), dendro.last_merges(merges))
        };
        let heights: Vec<String> = shown.iter().map(|m| format!("{:.4}", m.height)).collect();
        format!("  dendrogram {label}: {}\n", heights.join(", "))
    }

    fn file_report(&self, workspace: &str, summary: String, created: Vec<CreatedObject>) -> Result<ReportInfo> {
        let request = ReportRequest {
            summary,
            objects_created: created,
        };
        let report = self.reports.create_report(workspace, &request)?;
        if report.name.is_empty() {
            return Err(Error::Collaborator {
                service: "report service",
                message: "report created without a name".to_string(),
            });
        }
        info!(report = %report.name, objects = request.objects_created.len(), "report filed");
        Ok(report)
    }
}
