use thiserror::Error;

/// Result alias for `kecluster`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the engines, the dispatcher and the collaborators.
///
/// Every variant is a deterministic function of the request; nothing here is
/// worth retrying without changing the input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A required request field was absent.
    #[error("\"{field}\" parameter is required, but missing")]
    MissingField {
        /// Wire name of the field.
        field: &'static str,
    },

    /// An enumerated field carried a value outside its closed set.
    #[error("invalid value [{value}] for \"{field}\"; allowed: {}", allowed.join(", "))]
    InvalidOption {
        /// Wire name of the field.
        field: &'static str,
        /// Value as received.
        value: String,
        /// The closed set of accepted values.
        allowed: &'static [&'static str],
    },

    /// Distance metric name outside the supported set.
    #[error("unknown distance metric [{name}] for \"{field}\"; allowed: {}", allowed.join(", "))]
    InvalidMetric {
        /// Wire name of the field.
        field: &'static str,
        /// Name as received.
        name: String,
        /// Every supported metric name.
        allowed: &'static [&'static str],
    },

    /// Threshold not valid for the flat-cluster criterion.
    #[error("invalid threshold {threshold} for criterion '{criterion}'")]
    InvalidThreshold {
        /// Criterion wire name.
        criterion: &'static str,
        /// Offending threshold.
        threshold: f64,
    },

    /// Invalid number of k-means clusters.
    #[error("cannot form {k} clusters from {n_items} items")]
    InvalidK {
        /// Requested k.
        k: i64,
        /// Number of rows available.
        n_items: usize,
    },

    /// Invalid number of principal components.
    #[error("n_components must be within 1..={max}, got {requested}")]
    InvalidComponents {
        /// Requested component count.
        requested: i64,
        /// min(rows, cols) of the input.
        max: usize,
    },

    /// Invalid parameter value.
    #[error("invalid parameter '{name}': {message}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Error message.
        message: String,
    },

    /// Request payload could not be decoded into the typed parameters.
    #[error("malformed {method} request: {message}")]
    MalformedRequest {
        /// Method the payload was addressed to.
        method: String,
        /// Decoder message.
        message: String,
    },

    /// Too few rows, empty input or non-finite values.
    #[error("degenerate input: {reason}")]
    DegenerateInput {
        /// What is wrong with the input.
        reason: String,
    },

    /// Linkage method requires Euclidean distances.
    #[error("linkage method '{method}' requires euclidean distances, got '{metric}'")]
    IncompatibleLinkage {
        /// Linkage wire name.
        method: &'static str,
        /// Metric wire name.
        metric: &'static str,
    },

    /// Internal consistency failure in a computed structure.
    #[error("computation anomaly: {detail}")]
    ComputationAnomaly {
        /// Description of the inconsistency.
        detail: String,
    },

    /// Matrix dimension mismatch.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Expected dimension.
        expected: usize,
        /// Found dimension.
        found: usize,
    },

    /// Computation abandoned at a cancellation checkpoint.
    #[error("cancelled during {phase}")]
    Cancelled {
        /// Phase that observed the cancel flag.
        phase: &'static str,
    },

    /// An external collaborator (matrix source, store, report) failed.
    #[error("{service} failed: {message}")]
    Collaborator {
        /// Collaborator name.
        service: &'static str,
        /// Message as reported by the collaborator.
        message: String,
    },
}

impl Error {
    /// True for errors caused by a bad, missing or out-of-set parameter.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::MissingField { .. }
                | Error::InvalidOption { .. }
                | Error::InvalidMetric { .. }
                | Error::InvalidThreshold { .. }
                | Error::InvalidK { .. }
                | Error::InvalidComponents { .. }
                | Error::InvalidParameter { .. }
                | Error::MalformedRequest { .. }
        )
    }

    pub(crate) fn degenerate(reason: impl Into<String>) -> Self {
        Error::DegenerateInput {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_message() {
        let err = Error::MissingField {
            field: "matrix_ref",
        };
        assert_eq!(
            err.to_string(),
            "\"matrix_ref\" parameter is required, but missing"
        );
        assert!(err.is_validation());
    }

    #[test]
    fn test_invalid_option_lists_allowed_set() {
        let err = Error::InvalidOption {
            field: "fcluster_criterion",
            value: "nope".into(),
            allowed: &["inconsistent", "distance", "maxclust"],
        };
        let msg = err.to_string();
        assert!(msg.contains("[nope]"));
        assert!(msg.contains("inconsistent, distance, maxclust"));
    }

    #[test]
    fn test_invalid_metric_names_field_and_allowed_set() {
        let err = Error::InvalidMetric {
            field: "dist_metric",
            name: "bogus".into(),
            allowed: &["euclidean", "cityblock"],
        };
        assert_eq!(
            err.to_string(),
            "unknown distance metric [bogus] for \"dist_metric\"; allowed: euclidean, cityblock"
        );
        assert!(err.is_validation());
    }

    #[test]
    fn test_engine_errors_are_not_validation() {
        assert!(!Error::degenerate("x").is_validation());
        assert!(!Error::Cancelled { phase: "linkage" }.is_validation());
    }
}
