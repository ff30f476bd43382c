//! Flat clusters from a dendrogram.
//!
//! A cut turns the merge tree into a hard partition. The criterion decides
//! what the numeric threshold means:
//!
//! - `distance`: no cluster contains a merge higher than the threshold.
//! - `inconsistent`: no cluster contains a merge whose inconsistency
//!   coefficient exceeds the threshold.
//! - `maxclust`: the threshold is a cluster count; the cut is raised through
//!   the merge heights until at most that many clusters remain.

use std::fmt;

use tracing::warn;

use super::dendrogram::Dendrogram;
use super::set::ClusterSet;
use super::traits::Warning;
use crate::choice::Choice;
use crate::error::{Error, Result};

/// How a threshold is interpreted when cutting a dendrogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlatClusterCriterion {
    /// Threshold on inconsistency coefficients.
    Inconsistent,
    /// Threshold on merge heights.
    Distance,
    /// Threshold is the maximum number of clusters.
    Maxclust,
}

const CRITERION_NAMES: &[&str] = &["inconsistent", "distance", "maxclust"];

impl FlatClusterCriterion {
    const ALL: [FlatClusterCriterion; 3] = [
        FlatClusterCriterion::Inconsistent,
        FlatClusterCriterion::Distance,
        FlatClusterCriterion::Maxclust,
    ];

    /// Reject thresholds that have no meaning under this criterion.
    pub fn validate_threshold(self, threshold: f64) -> Result<()> {
        let ok = match self {
            FlatClusterCriterion::Maxclust => threshold.is_finite() && threshold >= 1.0,
            _ => threshold.is_finite() && threshold > 0.0,
        };
        if ok {
            Ok(())
        } else {
            Err(Error::InvalidThreshold {
                criterion: self.as_wire(),
                threshold,
            })
        }
    }
}

impl Choice for FlatClusterCriterion {
    const FIELD: &'static str = "fcluster_criterion";
    const ALLOWED: &'static [&'static str] = CRITERION_NAMES;

    fn from_wire(value: &str) -> Option<Self> {
        CRITERION_NAMES
            .iter()
            .position(|name| *name == value)
            .map(|i| Self::ALL[i])
    }

    fn as_wire(self) -> &'static str {
        match self {
            FlatClusterCriterion::Inconsistent => "inconsistent",
            FlatClusterCriterion::Distance => "distance",
            FlatClusterCriterion::Maxclust => "maxclust",
        }
    }
}

impl fmt::Display for FlatClusterCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// Result of cutting a dendrogram.
#[derive(Debug, Clone, PartialEq)]
pub struct CutOutcome {
    /// The flat partition.
    pub clusters: ClusterSet,
    /// Set when `maxclust` could not hit the requested count.
    pub warning: Option<Warning>,
}

/// Cut with the default inconsistency depth of 2.
pub fn cut_tree(
    dendrogram: &Dendrogram,
    criterion: FlatClusterCriterion,
    threshold: f64,
) -> Result<CutOutcome> {
    cut_tree_with_depth(dendrogram, criterion, threshold, 2)
}

/// Cut a dendrogram into flat clusters.
///
/// `depth` is only used by [`FlatClusterCriterion::Inconsistent`].
///
/// # Errors
///
/// [`Error::InvalidThreshold`] when `threshold` is not finite, is `<= 0` for
/// `distance`/`inconsistent`, or is `< 1` for `maxclust`.
pub fn cut_tree_with_depth(
    dendrogram: &Dendrogram,
    criterion: FlatClusterCriterion,
    threshold: f64,
    depth: usize,
) -> Result<CutOutcome> {
    criterion.validate_threshold(threshold)?;

    let (labels, warning) = match criterion {
        FlatClusterCriterion::Distance => (dendrogram.cut_at_distance(threshold), None),
        FlatClusterCriterion::Inconsistent => {
            let coefficients: Vec<f64> = dendrogram
                .inconsistency(depth)
                .iter()
                .map(|s| s.coefficient)
                .collect();
            (dendrogram.cut_by(&coefficients, threshold), None)
        }
        FlatClusterCriterion::Maxclust => {
            // Truncation matches integer conversion of the wire threshold.
            let requested = threshold as usize;
            let (labels, achieved) = dendrogram.cut_to_k(requested);
            let warning = (achieved != requested).then(|| {
                warn!(requested, achieved, "maxclust count not exactly achievable");
                Warning::InexactClusterCount {
                    requested,
                    achieved,
                }
            });
            (labels, warning)
        }
    };

    Ok(CutOutcome {
        clusters: ClusterSet::from_labels(&labels),
        warning,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::choice::parse_or;
    use crate::cluster::{build_linkage, LinkageMethod};
    use crate::distance::{compute_distances, DistanceMetric};
    use ndarray::array;

    fn six_points() -> Dendrogram {
        let data = array![
            [0.0, 0.0],
            [0.0, 1.0],
            [1.0, 0.0],
            [10.0, 10.0],
            [10.0, 11.0],
            [11.0, 10.0],
        ];
        let dm = compute_distances(data.view(), DistanceMetric::Euclidean).unwrap();
        build_linkage(&dm, LinkageMethod::Ward).unwrap()
    }

    #[test]
    fn test_maxclust_two_triples() {
        let out = cut_tree(&six_points(), FlatClusterCriterion::Maxclust, 2.0).unwrap();
        assert_eq!(out.clusters, ClusterSet::from_labels(&[0, 0, 0, 1, 1, 1]));
        assert_eq!(out.warning, None);
        let named: Vec<Vec<usize>> = out.clusters.iter().map(<[usize]>::to_vec).collect();
        assert_eq!(named, vec![vec![0, 1, 2], vec![3, 4, 5]]);
    }

    #[test]
    fn test_maxclust_truncates_threshold() {
        let out = cut_tree(&six_points(), FlatClusterCriterion::Maxclust, 2.9).unwrap();
        assert_eq!(out.clusters.len(), 2);
    }

    #[test]
    fn test_maxclust_beyond_items_warns() {
        let out = cut_tree(&six_points(), FlatClusterCriterion::Maxclust, 9.0).unwrap();
        assert_eq!(out.clusters.len(), 6);
        assert_eq!(
            out.warning,
            Some(Warning::InexactClusterCount {
                requested: 9,
                achieved: 6
            })
        );
        assert_eq!(
            out.warning.map(|w| w.to_string()).as_deref(),
            Some("requested 9 clusters, achieved 6")
        );
    }

    #[test]
    fn test_distance_cut() {
        let dendro = six_points();
        let all = cut_tree(&dendro, FlatClusterCriterion::Distance, dendro.max_height()).unwrap();
        assert_eq!(all.clusters.len(), 1);
        let split = cut_tree(&dendro, FlatClusterCriterion::Distance, 5.0).unwrap();
        assert_eq!(split.clusters.len(), 2);
        let singletons = cut_tree(&dendro, FlatClusterCriterion::Distance, 0.5).unwrap();
        assert_eq!(singletons.clusters.len(), 6);
    }

    #[test]
    fn test_inconsistent_cut_is_partition() {
        // Root coefficient is 2/sqrt(3); the triples' top merges sit at
        // 1/sqrt(2), so 0.8 separates exactly the two triples.
        let out = cut_tree(&six_points(), FlatClusterCriterion::Inconsistent, 0.8).unwrap();
        assert_eq!(out.clusters, ClusterSet::from_labels(&[0, 0, 0, 1, 1, 1]));
        let one = cut_tree(&six_points(), FlatClusterCriterion::Inconsistent, 1.2).unwrap();
        assert_eq!(one.clusters.len(), 1);
    }

    #[test]
    fn test_invalid_thresholds() {
        let dendro = six_points();
        for (criterion, bad) in [
            (FlatClusterCriterion::Distance, 0.0),
            (FlatClusterCriterion::Distance, -1.0),
            (FlatClusterCriterion::Inconsistent, f64::NAN),
            (FlatClusterCriterion::Maxclust, 0.5),
            (FlatClusterCriterion::Maxclust, f64::INFINITY),
        ] {
            assert!(matches!(
                cut_tree(&dendro, criterion, bad),
                Err(Error::InvalidThreshold { .. })
            ));
        }
    }

    #[test]
    fn test_parse_criterion() {
        assert_eq!(
            parse_or(Some("maxclust"), FlatClusterCriterion::Distance).unwrap(),
            FlatClusterCriterion::Maxclust
        );
        assert_eq!(
            parse_or(None, FlatClusterCriterion::Distance).unwrap(),
            FlatClusterCriterion::Distance
        );
        assert!(parse_or(Some("bogus"), FlatClusterCriterion::Distance).is_err());
    }
}
