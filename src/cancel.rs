//! Cooperative cancellation.
//!
//! Long computations check an optional flag between major phases (after the
//! distance matrix, after linkage, once per k-means iteration). Setting the
//! flag from another thread makes the running request return
//! [`Error::Cancelled`] at the next checkpoint.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::error::{Error, Result};

/// Phase names reported in [`Error::Cancelled`].
pub mod phase {
    /// After the distance matrix has been computed.
    pub const DISTANCE: &str = "distance";
    /// After the dendrogram has been built.
    pub const LINKAGE: &str = "linkage";
    /// At the top of a k-means iteration.
    pub const KMEANS_ITERATION: &str = "kmeans iteration";
    /// Before the PCA eigendecomposition.
    pub const PCA: &str = "pca";
}

/// Return `Err(Cancelled)` if `cancel` is set.
pub fn checkpoint(cancel: Option<&AtomicBool>, phase: &'static str) -> Result<()> {
    match cancel {
        Some(flag) if flag.load(Ordering::Relaxed) => {
            debug!(phase, "cancellation observed");
            Err(Error::Cancelled { phase })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkpoint() {
        assert!(checkpoint(None, phase::DISTANCE).is_ok());
        let flag = AtomicBool::new(false);
        assert!(checkpoint(Some(&flag), phase::DISTANCE).is_ok());
        flag.store(true, Ordering::Relaxed);
        assert_eq!(
            checkpoint(Some(&flag), phase::LINKAGE),
            Err(Error::Cancelled { phase: "linkage" })
        );
    }
}
