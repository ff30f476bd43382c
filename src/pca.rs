//! Principal component analysis.
//!
//! Rows are observations, columns are variables. Columns are centred (and,
//! under [`PcaScaling::Correlation`], scaled to unit variance), the
//! resulting covariance matrix is decomposed with `faer`'s self-adjoint
//! eigensolver, and components are reported by descending eigenvalue.
//!
//! ```text
//! C = Xcᵀ Xc / (n - 1)      C vₖ = λₖ vₖ      projectionsₖ = Xc vₖ
//! ```
//!
//! Eigenvectors are only defined up to sign. Each loading vector is flipped
//! so that its largest-magnitude entry (the first one, on ties) is
//! positive, which makes repeated runs and different platforms agree.

use std::sync::atomic::AtomicBool;

use faer::{Mat, Side};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cancel::{checkpoint, phase};
use crate::distance::non_negative;
use crate::error::{Error, Result};
use crate::matrix::ensure_finite;

/// Structure matrix decomposed by PCA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PcaScaling {
    /// Covariance of the centred columns.
    #[default]
    Covariance,
    /// Correlation: centred columns scaled to unit variance.
    Correlation,
}

/// One principal component.
#[derive(Debug, Clone, PartialEq)]
pub struct PrincipalComponent {
    /// 1-based component number.
    pub index: usize,
    /// Variance along the component.
    pub eigenvalue: f64,
    /// Fraction of total variance explained.
    pub explained_variance_ratio: f64,
    /// Unit-length weights over the input columns.
    pub loadings: Array1<f64>,
    /// Score of each input row.
    pub projections: Array1<f64>,
}

/// Result of a PCA run.
#[derive(Debug, Clone, PartialEq)]
pub struct PcaResult {
    /// Components by descending eigenvalue.
    pub components: Vec<PrincipalComponent>,
    /// Column means removed before decomposition.
    pub means: Array1<f64>,
    /// Sum of all eigenvalues.
    pub total_variance: f64,
    /// Scaling that was applied.
    pub scaling: PcaScaling,
}

impl PcaResult {
    /// Rows × components matrix of projections.
    pub fn projection_matrix(&self) -> Array2<f64> {
        let n = self.components.first().map_or(0, |c| c.projections.len());
        Array2::from_shape_fn((n, self.components.len()), |(i, k)| {
            self.components[k].projections[i]
        })
    }

    /// Explained-variance fractions in component order.
    pub fn explained_variance(&self) -> Vec<f64> {
        self.components
            .iter()
            .map(|c| c.explained_variance_ratio)
            .collect()
    }
}

/// PCA configuration.
#[derive(Debug, Clone)]
pub struct Pca {
    n_components: usize,
    scaling: PcaScaling,
}

impl Pca {
    /// Keep `n_components` components of the covariance structure.
    pub fn new(n_components: usize) -> Self {
        Self {
            n_components,
            scaling: PcaScaling::Covariance,
        }
    }

    /// Set the structure matrix.
    pub fn with_scaling(mut self, scaling: PcaScaling) -> Self {
        self.scaling = scaling;
        self
    }

    /// Decompose the rows of `data`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidComponents`] unless `1 <= n_components <= min(rows, cols)`.
    /// - [`Error::DegenerateInput`] for fewer than 2 rows, non-finite values,
    ///   zero total variance, or (under correlation scaling) a constant column.
    /// - [`Error::ComputationAnomaly`] if the eigensolver fails.
    pub fn fit(&self, data: ArrayView2<'_, f64>, cancel: Option<&AtomicBool>) -> Result<PcaResult> {
        let (n, p) = data.dim();
        let max = n.min(p);
        if self.n_components < 1 || self.n_components > max {
            return Err(Error::InvalidComponents {
                requested: self.n_components as i64,
                max,
            });
        }
        if n < 2 {
            return Err(Error::degenerate(format!(
                "need at least 2 rows for PCA, got {n}"
            )));
        }
        ensure_finite(data, None)?;

        let means = data
            .mean_axis(Axis(0))
            .ok_or_else(|| Error::degenerate("matrix has no rows"))?;
        let mut centred = data.to_owned() - &means;

        if self.scaling == PcaScaling::Correlation {
            for (j, mut column) in centred.axis_iter_mut(Axis(1)).enumerate() {
                let sd = (column.iter().map(|v| v * v).sum::<f64>() / (n - 1) as f64).sqrt();
                if sd == 0.0 {
                    return Err(Error::degenerate(format!(
                        "column {j} is constant; correlation is undefined"
                    )));
                }
                column.mapv_inplace(|v| v / sd);
            }
        }

        let scale = 1.0 / (n - 1) as f64;
        let cov = Mat::<f64>::from_fn(p, p, |a, b| {
            let ca = centred.column(a);
            let cb = centred.column(b);
            ca.dot(&cb) * scale
        });
        let total_variance: f64 = (0..p).map(|j| cov[(j, j)]).sum();
        if total_variance <= 0.0 {
            return Err(Error::degenerate("matrix has zero total variance"));
        }

        checkpoint(cancel, phase::PCA)?;
        debug!(rows = n, cols = p, k = self.n_components, scaling = ?self.scaling, "eigendecomposition");
        let evd = cov
            .self_adjoint_eigen(Side::Lower)
            .map_err(|e| Error::ComputationAnomaly {
                detail: format!("eigendecomposition failed: {e:?}"),
            })?;
        let eigenvalues = evd.S().column_vector();
        let vectors = evd.U();

        let mut components = Vec::with_capacity(self.n_components);
        // faer returns eigenvalues in ascending order.
        for (rank, col) in (0..p).rev().take(self.n_components).enumerate() {
            let eigenvalue = non_negative(eigenvalues[col]);
            let mut loadings = Array1::from_shape_fn(p, |r| vectors[(r, col)]);
            canonicalize_sign(&mut loadings);
            let projections = centred.dot(&loadings);
            components.push(PrincipalComponent {
                index: rank + 1,
                eigenvalue,
                explained_variance_ratio: eigenvalue / total_variance,
                loadings,
                projections,
            });
        }

        Ok(PcaResult {
            components,
            means,
            total_variance,
            scaling: self.scaling,
        })
    }
}

/// Flip `v` so its largest-magnitude entry (first on ties) is positive.
fn canonicalize_sign(v: &mut Array1<f64>) {
    let mut pivot = 0.0f64;
    for &x in v.iter() {
        if x.abs() > pivot.abs() {
            pivot = x;
        }
    }
    if pivot < 0.0 {
        v.mapv_inplace(|x| -x);
    }
}

/// Covariance PCA keeping `n_components` components.
pub fn compute_pca(data: ArrayView2<'_, f64>, n_components: usize) -> Result<PcaResult> {
    Pca::new(n_components).fit(data, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn elongated() -> Array2<f64> {
        // Spread mostly along (1, 1), a little along (1, -1).
        array![
            [-3.0, -2.8],
            [-1.0, -1.3],
            [0.0, 0.2],
            [1.0, 0.9],
            [3.0, 3.1],
            [2.0, 1.7],
        ]
    }

    #[test]
    fn test_components_descend_and_sum_to_one() {
        let result = compute_pca(elongated().view(), 2).unwrap();
        assert_eq!(result.components.len(), 2);
        assert_eq!(result.components[0].index, 1);
        assert_eq!(result.components[1].index, 2);
        assert!(result.components[0].eigenvalue >= result.components[1].eigenvalue);
        let ratios = result.explained_variance();
        assert_relative_eq!(ratios.iter().sum::<f64>(), 1.0, epsilon = 1e-10);
        assert!(ratios[0] > 0.95);
    }

    #[test]
    fn test_first_loading_is_diagonal_and_positive() {
        let result = compute_pca(elongated().view(), 1).unwrap();
        let v = &result.components[0].loadings;
        assert_relative_eq!(v.dot(v), 1.0, epsilon = 1e-10);
        assert!(v[0] > 0.6 && v[1] > 0.6);
    }

    #[test]
    fn test_sign_is_stable_under_row_permutation() {
        let data = elongated();
        let mut reversed = data.clone();
        reversed.invert_axis(Axis(0));
        let a = compute_pca(data.view(), 2).unwrap();
        let b = compute_pca(reversed.view(), 2).unwrap();
        for (ca, cb) in a.components.iter().zip(&b.components) {
            for (x, y) in ca.loadings.iter().zip(cb.loadings.iter()) {
                assert_relative_eq!(x, y, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_projections_are_centred_scores() {
        let data = elongated();
        let result = compute_pca(data.view(), 2).unwrap();
        let scores = result.projection_matrix();
        assert_eq!(scores.dim(), (6, 2));
        for k in 0..2 {
            assert_relative_eq!(scores.column(k).sum(), 0.0, epsilon = 1e-10);
            let var = scores.column(k).mapv(|x| x * x).sum() / 5.0;
            assert_relative_eq!(var, result.components[k].eigenvalue, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_correlation_scaling_is_unit_trace() {
        let data = array![[1.0, 100.0], [2.0, 300.0], [3.0, 200.0], [4.0, 500.0]];
        let result = Pca::new(2)
            .with_scaling(PcaScaling::Correlation)
            .fit(data.view(), None)
            .unwrap();
        assert_relative_eq!(result.total_variance, 2.0, epsilon = 1e-10);
    }

    #[test]
    fn test_invalid_component_counts() {
        let data = elongated();
        assert_eq!(
            compute_pca(data.view(), 0).unwrap_err(),
            Error::InvalidComponents { requested: 0, max: 2 }
        );
        assert!(matches!(
            compute_pca(data.view(), 3),
            Err(Error::InvalidComponents { requested: 3, max: 2 })
        ));
    }

    #[test]
    fn test_zero_variance_is_degenerate() {
        let data = array![[1.0, 2.0], [1.0, 2.0], [1.0, 2.0]];
        assert!(matches!(
            compute_pca(data.view(), 1),
            Err(Error::DegenerateInput { .. })
        ));
    }

    #[test]
    fn test_pca_scaling_serde() {
        let s: PcaScaling = serde_json::from_str("\"correlation\"").unwrap();
        assert_eq!(s, PcaScaling::Correlation);
        assert_eq!(serde_json::to_string(&PcaScaling::Covariance).unwrap(), "\"covariance\"");
    }
}
