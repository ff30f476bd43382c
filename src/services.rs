//! Collaborator interfaces.
//!
//! The core never stores objects or renders reports itself. It resolves
//! source matrices, persists artifacts, and files reports through the three
//! traits below. [`InMemoryWorkspace`] implements all of them for tests and
//! for embedders that keep results in process.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::matrix::LabeledMatrix;

/// Opaque reference returned by the object store. Never parsed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectRef(String);

impl ObjectRef {
    /// Wrap a store-issued reference.
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// The reference string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A source matrix and its object name.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMatrix {
    /// Object name, used to derive output names.
    pub name: String,
    /// The data.
    pub matrix: LabeledMatrix,
}

/// One named cluster of item identifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedCluster {
    /// `<set_name>_<i>`, 1-based.
    pub name: String,
    /// Item identifiers, ascending by row position.
    pub members: Vec<String>,
}

/// A persisted cluster set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSetArtifact {
    /// Human-readable description.
    pub description: String,
    /// Reference of the clustered matrix.
    pub source_ref: String,
    /// `feature` / `condition` for per-axis outputs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub axis: Option<String>,
    /// Algorithm and parameters used.
    pub method: String,
    /// The clusters.
    pub clusters: Vec<NamedCluster>,
}

/// A persisted numeric matrix (PCA projections).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloatMatrixArtifact {
    /// Human-readable description.
    pub description: String,
    /// Reference of the source matrix.
    pub source_ref: String,
    /// Source rows × components.
    pub data: LabeledMatrix,
    /// Fraction of variance explained by each column of `data`.
    pub explained_variance: Vec<f64>,
    /// Source columns × components.
    pub loadings: LabeledMatrix,
}

/// Anything the core asks the store to persist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Artifact {
    /// A set of flat clusters.
    ClusterSet(ClusterSetArtifact),
    /// A float matrix.
    FloatMatrix(FloatMatrixArtifact),
}

impl Artifact {
    /// Short type label shown in reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Artifact::ClusterSet(_) => "Cluster Set",
            Artifact::FloatMatrix(_) => "PCA Matrix",
        }
    }
}

/// An object listed in a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedObject {
    /// Store reference.
    pub reference: ObjectRef,
    /// Short description.
    pub description: String,
}

/// Report content handed to the report service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRequest {
    /// Plain-text summary.
    pub summary: String,
    /// Objects created by the request, in creation order.
    pub objects_created: Vec<CreatedObject>,
}

/// Identity of a filed report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportInfo {
    /// Report object name.
    pub name: String,
    /// Report object reference.
    pub reference: ObjectRef,
}

/// Resolves matrix references.
pub trait MatrixSource: Send + Sync {
    /// Fetch the matrix behind `reference`.
    fn resolve(&self, reference: &str) -> Result<ResolvedMatrix>;
}

/// Persists artifacts.
pub trait ObjectStore: Send + Sync {
    /// Save `artifact` as `name` in `workspace`.
    fn create(&self, workspace: &str, name: &str, artifact: &Artifact) -> Result<ObjectRef>;
}

/// Files reports.
pub trait ReportService: Send + Sync {
    /// Create a report in `workspace`.
    fn create_report(&self, workspace: &str, report: &ReportRequest) -> Result<ReportInfo>;
}

/// A stored artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    /// Workspace it was saved in.
    pub workspace: String,
    /// Object name.
    pub name: String,
    /// Reference issued for it.
    pub reference: ObjectRef,
    /// The content.
    pub artifact: Artifact,
}

#[derive(Debug, Default)]
struct Inner {
    matrices: BTreeMap<String, ResolvedMatrix>,
    objects: Vec<StoredObject>,
    reports: Vec<(ReportInfo, ReportRequest)>,
    failure: Option<String>,
}

/// Process-local workspace implementing every collaborator trait.
///
/// References have the form `<workspace>/<object number>/1`; reports are
/// numbered from the same counter.
#[derive(Debug, Default)]
pub struct InMemoryWorkspace {
    inner: Mutex<Inner>,
}

impl InMemoryWorkspace {
    /// Empty workspace.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self, service: &'static str) -> Result<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| Error::Collaborator {
            service,
            message: "workspace lock poisoned".to_string(),
        })
    }

    /// Register a matrix under `reference`.
    pub fn insert_matrix(&self, reference: &str, name: &str, matrix: LabeledMatrix) -> Result<()> {
        self.lock("matrix source")?.matrices.insert(
            reference.to_string(),
            ResolvedMatrix {
                name: name.to_string(),
                matrix,
            },
        );
        Ok(())
    }

    /// Make every subsequent store and report call fail with `message`.
    pub fn fail_writes(&self, message: Option<&str>) -> Result<()> {
        self.lock("object store")?.failure = message.map(str::to_string);
        Ok(())
    }

    /// Everything stored so far, in creation order.
    pub fn objects(&self) -> Result<Vec<StoredObject>> {
        Ok(self.lock("object store")?.objects.clone())
    }

    /// Stored artifact behind `reference`.
    pub fn object(&self, reference: &ObjectRef) -> Result<Option<StoredObject>> {
        Ok(self
            .lock("object store")?
            .objects
            .iter()
            .find(|o| &o.reference == reference)
            .cloned())
    }

    /// Reports filed so far.
    pub fn reports(&self) -> Result<Vec<(ReportInfo, ReportRequest)>> {
        Ok(self.lock("report service")?.reports.clone())
    }
}

impl Inner {
    fn next_ref(&self, workspace: &str) -> ObjectRef {
        let n = self.objects.len() + self.reports.len() + 1;
        ObjectRef::new(format!("{workspace}/{n}/1"))
    }

    fn check_failure(&self, service: &'static str) -> Result<()> {
        match &self.failure {
            Some(message) => Err(Error::Collaborator {
                service,
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl MatrixSource for InMemoryWorkspace {
    fn resolve(&self, reference: &str) -> Result<ResolvedMatrix> {
        self.lock("matrix source")?
            .matrices
            .get(reference)
            .cloned()
            .ok_or_else(|| Error::Collaborator {
                service: "matrix source",
                message: format!("no matrix at reference {reference}"),
            })
    }
}

impl ObjectStore for InMemoryWorkspace {
    fn create(&self, workspace: &str, name: &str, artifact: &Artifact) -> Result<ObjectRef> {
        let mut inner = self.lock("object store")?;
        inner.check_failure("object store")?;
        let reference = inner.next_ref(workspace);
        inner.objects.push(StoredObject {
            workspace: workspace.to_string(),
            name: name.to_string(),
            reference: reference.clone(),
            artifact: artifact.clone(),
        });
        Ok(reference)
    }
}

impl ReportService for InMemoryWorkspace {
    fn create_report(&self, workspace: &str, report: &ReportRequest) -> Result<ReportInfo> {
        let mut inner = self.lock("report service")?;
        inner.check_failure("report service")?;
        let reference = inner.next_ref(workspace);
        let info = ReportInfo {
            name: format!("report_{}", inner.reports.len() + 1),
            reference,
        };
        inner.reports.push((info.clone(), report.clone()));
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny() -> LabeledMatrix {
        LabeledMatrix::from_unlabeled(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap()
    }

    #[test]
    fn test_resolve_registered_matrix() {
        let ws = InMemoryWorkspace::new();
        ws.insert_matrix("1/1/1", "expr", tiny()).unwrap();
        let resolved = ws.resolve("1/1/1").unwrap();
        assert_eq!(resolved.name, "expr");
        assert!(matches!(
            ws.resolve("9/9/9"),
            Err(Error::Collaborator { service: "matrix source", .. })
        ));
    }

    #[test]
    fn test_references_are_unique_and_ordered() {
        let ws = InMemoryWorkspace::new();
        let artifact = Artifact::ClusterSet(ClusterSetArtifact {
            description: "d".into(),
            source_ref: "1/1/1".into(),
            axis: None,
            method: "kmeans".into(),
            clusters: vec![],
        });
        let a = ws.create("ws", "a", &artifact).unwrap();
        let b = ws.create("ws", "b", &artifact).unwrap();
        let report = ws
            .create_report(
                "ws",
                &ReportRequest {
                    summary: String::new(),
                    objects_created: vec![],
                },
            )
            .unwrap();
        assert_eq!(a.as_str(), "ws/1/1");
        assert_eq!(b.as_str(), "ws/2/1");
        assert_eq!(report.reference.as_str(), "ws/3/1");
        assert_eq!(ws.object(&b).unwrap().unwrap().name, "b");
    }

    #[test]
    fn test_injected_failure() {
        let ws = InMemoryWorkspace::new();
        ws.fail_writes(Some("quota exceeded")).unwrap();
        let artifact = Artifact::ClusterSet(ClusterSetArtifact {
            description: "d".into(),
            source_ref: "r".into(),
            axis: None,
            method: "m".into(),
            clusters: vec![],
        });
        assert_eq!(
            ws.create("ws", "x", &artifact).unwrap_err(),
            Error::Collaborator {
                service: "object store",
                message: "quota exceeded".into()
            }
        );
    }

    #[test]
    fn test_artifact_serializes_with_type_tag() {
        let artifact = Artifact::ClusterSet(ClusterSetArtifact {
            description: "d".into(),
            source_ref: "r".into(),
            axis: Some("feature".into()),
            method: "m".into(),
            clusters: vec![NamedCluster {
                name: "s_1".into(),
                members: vec!["g1".into()],
            }],
        });
        let value = serde_json::to_value(&artifact).unwrap();
        assert_eq!(value["type"], "cluster_set");
        assert_eq!(value["clusters"][0]["name"], "s_1");
    }
}
