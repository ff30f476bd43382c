//! Engine configuration.
//!
//! Knobs that are not part of the request wire contract: iteration limits,
//! seeds, naming defaults and report limits. Every field has a default, so a
//! partial JSON document is a valid configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::pca::PcaScaling;

/// Configuration shared by all requests handled by a dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum Lloyd iterations per k-means run.
    pub kmeans_max_iter: usize,
    /// Seed for k-means++ initialization.
    pub kmeans_seed: u64,
    /// Number of link levels used for inconsistency coefficients.
    pub inconsistency_depth: usize,
    /// Structure matrix decomposed by PCA.
    pub pca_scaling: PcaScaling,
    /// Suffix for cluster sets when the request names none.
    pub default_cluster_suffix: String,
    /// Suffix for PCA matrices when the request names none.
    pub default_pca_suffix: String,
    /// Skip the silhouette score above this many items (O(n²) cost).
    pub silhouette_max_items: usize,
    /// Number of final merges listed in dendrogram summaries.
    pub dendrogram_summary_merges: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kmeans_max_iter: 300,
            kmeans_seed: 0,
            inconsistency_depth: 2,
            pca_scaling: PcaScaling::Covariance,
            default_cluster_suffix: "_clusters".to_string(),
            default_pca_suffix: "_pca".to_string(),
            silhouette_max_items: 2000,
            dendrogram_summary_merges: 12,
        }
    }
}

impl EngineConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| Error::InvalidParameter {
            name: "config",
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check ranges that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.kmeans_max_iter == 0 {
            return Err(Error::InvalidParameter {
                name: "kmeans_max_iter",
                message: "must be at least 1".to_string(),
            });
        }
        if self.inconsistency_depth == 0 {
            return Err(Error::InvalidParameter {
                name: "inconsistency_depth",
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Set maximum k-means iterations.
    pub fn with_kmeans_max_iter(mut self, max_iter: usize) -> Self {
        self.kmeans_max_iter = max_iter;
        self
    }

    /// Set the k-means seed.
    pub fn with_kmeans_seed(mut self, seed: u64) -> Self {
        self.kmeans_seed = seed;
        self
    }

    /// Set the inconsistency depth.
    pub fn with_inconsistency_depth(mut self, depth: usize) -> Self {
        self.inconsistency_depth = depth;
        self
    }

    /// Set PCA scaling.
    pub fn with_pca_scaling(mut self, scaling: PcaScaling) -> Self {
        self.pca_scaling = scaling;
        self
    }

    /// Set the silhouette item limit.
    pub fn with_silhouette_max_items(mut self, limit: usize) -> Self {
        self.silhouette_max_items = limit;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = EngineConfig::from_json_str(r#"{"kmeans_seed": 7, "pca_scaling": "correlation"}"#)
            .unwrap();
        assert_eq!(config.kmeans_seed, 7);
        assert_eq!(config.pca_scaling, PcaScaling::Correlation);
        assert_eq!(config.kmeans_max_iter, 300);
        assert_eq!(config.default_cluster_suffix, "_clusters");
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let err = EngineConfig::from_json_str(r#"{"kmeans_max_iter": 0}"#).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidParameter {
                name: "kmeans_max_iter",
                ..
            }
        ));
    }

    #[test]
    fn test_builder() {
        let config = EngineConfig::default()
            .with_kmeans_seed(3)
            .with_inconsistency_depth(4);
        assert_eq!(config.kmeans_seed, 3);
        assert_eq!(config.inconsistency_depth, 4);
        assert!(config.validate().is_ok());
    }
}
