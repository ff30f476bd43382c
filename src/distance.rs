//! Pairwise distances between matrix rows.
//!
//! The metric set and the numeric definitions follow SciPy's `pdist`, which
//! is the vocabulary callers of this crate already speak:
//!
//! | Family | Metrics |
//! |--------|---------|
//! | Minkowski-like | `euclidean`, `sqeuclidean`, `cityblock`, `chebyshev` |
//! | Ratio | `braycurtis`, `canberra` |
//! | Angular | `cosine`, `correlation` |
//! | Elementwise | `hamming`, `jaccard` |
//! | Boolean | `dice`, `kulsinski`, `matching`, `rogerstanimoto`, `russellrao`, `sokalmichener`, `sokalsneath`, `yule` |
//!
//! Boolean metrics treat any non-zero value as `true`.
//!
//! Ratios that SciPy leaves undefined (0/0) resolve to 0 here, and a
//! zero-norm vector under `cosine` / `correlation` sits at distance 0 from
//! another zero-norm vector and at distance 1 from everything else. The
//! output therefore never contains NaN.

use std::fmt;
use std::str::FromStr;

use ndarray::{Array2, ArrayView1, ArrayView2};
use tracing::debug;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::choice::Choice;
use crate::error::{Error, Result};
use crate::matrix::ensure_finite;

/// Distance metric for pairwise dissimilarities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DistanceMetric {
    /// `sum|u-v| / sum|u+v|`
    BrayCurtis,
    /// `sum |u-v| / (|u|+|v|)`
    Canberra,
    /// `max |u-v|`
    Chebyshev,
    /// `sum |u-v|` (Manhattan).
    Cityblock,
    /// One minus Pearson correlation.
    Correlation,
    /// One minus cosine similarity.
    Cosine,
    /// Boolean Dice dissimilarity.
    Dice,
    /// L2 distance.
    Euclidean,
    /// Fraction of differing components.
    Hamming,
    /// Fraction of differing components among those non-zero in either vector.
    Jaccard,
    /// Boolean Kulsinski dissimilarity.
    Kulsinski,
    /// Boolean matching (Hamming on booleans).
    Matching,
    /// Boolean Rogers–Tanimoto dissimilarity.
    RogersTanimoto,
    /// Boolean Russell–Rao dissimilarity.
    RussellRao,
    /// Boolean Sokal–Michener dissimilarity.
    SokalMichener,
    /// Boolean Sokal–Sneath dissimilarity.
    SokalSneath,
    /// Squared L2 distance.
    SqEuclidean,
    /// Boolean Yule dissimilarity.
    Yule,
}

const METRIC_NAMES: &[&str] = &[
    "braycurtis",
    "canberra",
    "chebyshev",
    "cityblock",
    "correlation",
    "cosine",
    "dice",
    "euclidean",
    "hamming",
    "jaccard",
    "kulsinski",
    "matching",
    "rogerstanimoto",
    "russellrao",
    "sokalmichener",
    "sokalsneath",
    "sqeuclidean",
    "yule",
];

impl DistanceMetric {
    /// Every supported metric, in wire-name order.
    pub const ALL: [DistanceMetric; 18] = [
        DistanceMetric::BrayCurtis,
        DistanceMetric::Canberra,
        DistanceMetric::Chebyshev,
        DistanceMetric::Cityblock,
        DistanceMetric::Correlation,
        DistanceMetric::Cosine,
        DistanceMetric::Dice,
        DistanceMetric::Euclidean,
        DistanceMetric::Hamming,
        DistanceMetric::Jaccard,
        DistanceMetric::Kulsinski,
        DistanceMetric::Matching,
        DistanceMetric::RogersTanimoto,
        DistanceMetric::RussellRao,
        DistanceMetric::SokalMichener,
        DistanceMetric::SokalSneath,
        DistanceMetric::SqEuclidean,
        DistanceMetric::Yule,
    ];

    /// Whether distances under this metric are Euclidean distances.
    ///
    /// Centroid, median and Ward linkage are only defined for these.
    pub fn is_euclidean(self) -> bool {
        matches!(self, DistanceMetric::Euclidean)
    }

    /// Whether the metric binarizes its inputs.
    pub fn is_boolean(self) -> bool {
        matches!(
            self,
            DistanceMetric::Dice
                | DistanceMetric::Kulsinski
                | DistanceMetric::Matching
                | DistanceMetric::RogersTanimoto
                | DistanceMetric::RussellRao
                | DistanceMetric::SokalMichener
                | DistanceMetric::SokalSneath
                | DistanceMetric::Yule
        )
    }

    /// Distance between two equal-length vectors.
    ///
    /// Always finite and non-negative for finite input.
    pub fn pair(self, u: ArrayView1<'_, f64>, v: ArrayView1<'_, f64>) -> f64 {
        debug_assert_eq!(u.len(), v.len());
        let d = if self.is_boolean() {
            self.boolean(BoolCounts::of(u, v))
        } else {
            self.numeric(u, v)
        };
        non_negative(d)
    }

    fn numeric(self, u: ArrayView1<'_, f64>, v: ArrayView1<'_, f64>) -> f64 {
        let pairs = || u.iter().zip(v.iter()).map(|(a, b)| (*a, *b));
        match self {
            DistanceMetric::Euclidean => pairs().map(|(a, b)| (a - b) * (a - b)).sum::<f64>().sqrt(),
            DistanceMetric::SqEuclidean => pairs().map(|(a, b)| (a - b) * (a - b)).sum(),
            DistanceMetric::Cityblock => pairs().map(|(a, b)| (a - b).abs()).sum(),
            DistanceMetric::Chebyshev => pairs().map(|(a, b)| (a - b).abs()).fold(0.0, f64::max),
            DistanceMetric::BrayCurtis => {
                let (num, den) = pairs().fold((0.0, 0.0), |(n, d), (a, b)| {
                    (n + (a - b).abs(), d + (a + b).abs())
                });
                ratio(num, den)
            }
            DistanceMetric::Canberra => pairs()
                .map(|(a, b)| ratio((a - b).abs(), a.abs() + b.abs()))
                .sum(),
            DistanceMetric::Cosine => {
                let (dot, nu, nv) = pairs().fold((0.0, 0.0, 0.0), |(d, x, y), (a, b)| {
                    (d + a * b, x + a * a, y + b * b)
                });
                angular(dot, nu, nv)
            }
            DistanceMetric::Correlation => {
                let n = u.len() as f64;
                let mu = u.sum() / n;
                let mv = v.sum() / n;
                let (dot, nu, nv) = pairs().fold((0.0, 0.0, 0.0), |(d, x, y), (a, b)| {
                    let (a, b) = (a - mu, b - mv);
                    (d + a * b, x + a * a, y + b * b)
                });
                angular(dot, nu, nv)
            }
            DistanceMetric::Hamming => {
                let differing = pairs().filter(|(a, b)| a != b).count();
                differing as f64 / u.len() as f64
            }
            DistanceMetric::Jaccard => {
                let (num, den) = pairs().fold((0usize, 0usize), |(n, d), (a, b)| {
                    let nonzero = a != 0.0 || b != 0.0;
                    (n + usize::from(nonzero && a != b), d + usize::from(nonzero))
                });
                ratio(num as f64, den as f64)
            }
            _ => unreachable!("boolean metrics are handled by BoolCounts"),
        }
    }

    fn boolean(self, c: BoolCounts) -> f64 {
        let n = c.n as f64;
        let (tt, tf, ft, ff) = (c.tt as f64, c.tf as f64, c.ft as f64, c.ff as f64);
        let r = 2.0 * (tf + ft);
        match self {
            DistanceMetric::Dice => ratio(tf + ft, 2.0 * tt + tf + ft),
            DistanceMetric::Kulsinski => ratio(tf + ft - tt + n, tf + ft + n),
            DistanceMetric::Matching => ratio(tf + ft, n),
            DistanceMetric::RogersTanimoto | DistanceMetric::SokalMichener => ratio(r, tt + ff + r),
            DistanceMetric::RussellRao => ratio(n - tt, n),
            DistanceMetric::SokalSneath => ratio(r, tt + r),
            DistanceMetric::Yule => ratio(2.0 * tf * ft, tt * ff + tf * ft),
            _ => unreachable!("numeric metrics are handled elementwise"),
        }
    }
}

impl Choice for DistanceMetric {
    const FIELD: &'static str = "dist_metric";
    const ALLOWED: &'static [&'static str] = METRIC_NAMES;

    fn from_wire(value: &str) -> Option<Self> {
        METRIC_NAMES
            .iter()
            .position(|name| *name == value)
            .map(|i| Self::ALL[i])
    }

    fn as_wire(self) -> &'static str {
        let i = Self::ALL
            .iter()
            .position(|m| *m == self)
            .unwrap_or_default();
        METRIC_NAMES[i]
    }
}

impl FromStr for DistanceMetric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_wire(s).ok_or_else(|| Error::InvalidMetric {
            field: Self::FIELD,
            name: s.to_string(),
            allowed: Self::ALLOWED,
        })
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// Contingency counts of two binarized vectors.
#[derive(Debug, Clone, Copy, Default)]
struct BoolCounts {
    tt: usize,
    tf: usize,
    ft: usize,
    ff: usize,
    n: usize,
}

impl BoolCounts {
    fn of(u: ArrayView1<'_, f64>, v: ArrayView1<'_, f64>) -> Self {
        let mut c = BoolCounts::default();
        for (a, b) in u.iter().zip(v.iter()) {
            match (*a != 0.0, *b != 0.0) {
                (true, true) => c.tt += 1,
                (true, false) => c.tf += 1,
                (false, true) => c.ft += 1,
                (false, false) => c.ff += 1,
            }
            c.n += 1;
        }
        c
    }
}

#[inline]
fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

#[inline]
fn angular(dot: f64, norm_u_sq: f64, norm_v_sq: f64) -> f64 {
    match (norm_u_sq == 0.0, norm_v_sq == 0.0) {
        (true, true) => 0.0,
        (true, false) | (false, true) => 1.0,
        (false, false) => 1.0 - dot / (norm_u_sq.sqrt() * norm_v_sq.sqrt()),
    }
}

/// Clamp roundoff below zero (including `-0.0`) to `0.0`.
#[inline]
pub(crate) fn non_negative(d: f64) -> f64 {
    if d <= 0.0 {
        0.0
    } else {
        d
    }
}

/// Square symmetric distance matrix, tagged with the metric that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    metric: DistanceMetric,
    values: Array2<f64>,
}

impl DistanceMatrix {
    /// Wrap a precomputed square matrix.
    ///
    /// The matrix must be square, symmetric, zero on the diagonal and
    /// non-negative; `metric` records how it was produced.
    pub fn from_square(values: Array2<f64>, metric: DistanceMetric) -> Result<Self> {
        let n = values.nrows();
        if values.ncols() != n {
            return Err(Error::DimensionMismatch {
                expected: n,
                found: values.ncols(),
            });
        }
        for i in 0..n {
            if values[[i, i]] != 0.0 {
                return Err(Error::InvalidParameter {
                    name: "distances",
                    message: format!("diagonal entry {i} is not zero"),
                });
            }
            for j in (i + 1)..n {
                let (a, b) = (values[[i, j]], values[[j, i]]);
                if !a.is_finite() || a < 0.0 || a != b {
                    return Err(Error::InvalidParameter {
                        name: "distances",
                        message: format!("entry ({i}, {j}) is not a symmetric non-negative value"),
                    });
                }
            }
        }
        Ok(Self { metric, values })
    }

    /// Number of items.
    pub fn n(&self) -> usize {
        self.values.nrows()
    }

    /// Metric the distances were computed under.
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Distance between items `i` and `j`.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[[i, j]]
    }

    /// The full square matrix.
    pub fn as_array(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    /// Upper triangle, row-major (`n choose 2` entries).
    pub fn condensed(&self) -> Vec<f64> {
        let n = self.n();
        let mut out = Vec::with_capacity(n * n.saturating_sub(1) / 2);
        for i in 0..n {
            for j in (i + 1)..n {
                out.push(self.values[[i, j]]);
            }
        }
        out
    }
}

/// Compute all pairwise distances between the rows of `data`.
///
/// Fails with [`Error::DegenerateInput`] for fewer than two rows, no
/// columns, or any non-finite value.
pub fn compute_distances(data: ArrayView2<'_, f64>, metric: DistanceMetric) -> Result<DistanceMatrix> {
    let n = data.nrows();
    if n < 2 {
        return Err(Error::degenerate(format!(
            "need at least 2 rows to compute distances, got {n}"
        )));
    }
    ensure_finite(data, None)?;
    debug!(rows = n, cols = data.ncols(), %metric, "computing pairwise distances");

    let upper = upper_triangle(data, metric);
    let mut values = Array2::zeros((n, n));
    for (i, row) in upper.into_iter().enumerate() {
        for (offset, d) in row.into_iter().enumerate() {
            let j = i + 1 + offset;
            values[[i, j]] = d;
            values[[j, i]] = d;
        }
    }

    Ok(DistanceMatrix { metric, values })
}

// Each entry is computed independently with a fixed summation order, so the
// parallel and sequential paths produce bit-identical matrices.
#[cfg(feature = "parallel")]
fn upper_triangle(data: ArrayView2<'_, f64>, metric: DistanceMetric) -> Vec<Vec<f64>> {
    let n = data.nrows();
    (0..n)
        .into_par_iter()
        .map(|i| {
            ((i + 1)..n)
                .map(|j| metric.pair(data.row(i), data.row(j)))
                .collect()
        })
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn upper_triangle(data: ArrayView2<'_, f64>, metric: DistanceMetric) -> Vec<Vec<f64>> {
    let n = data.nrows();
    (0..n)
        .map(|i| {
            ((i + 1)..n)
                .map(|j| metric.pair(data.row(i), data.row(j)))
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;
    use proptest::prelude::*;

    fn d(metric: DistanceMetric, u: &[f64], v: &[f64]) -> f64 {
        metric.pair(ArrayView1::from(u), ArrayView1::from(v))
    }

    #[test]
    fn test_numeric_metrics_match_reference_values() {
        let u = [1.0, 0.0, 2.0];
        let v = [0.0, 1.0, 4.0];
        assert_relative_eq!(d(DistanceMetric::Euclidean, &u, &v), 6.0f64.sqrt());
        assert_relative_eq!(d(DistanceMetric::SqEuclidean, &u, &v), 6.0);
        assert_relative_eq!(d(DistanceMetric::Cityblock, &u, &v), 4.0);
        assert_relative_eq!(d(DistanceMetric::Chebyshev, &u, &v), 2.0);
        assert_relative_eq!(d(DistanceMetric::BrayCurtis, &u, &v), 4.0 / 8.0);
        // 1/1 + 1/1 + 2/6
        assert_relative_eq!(d(DistanceMetric::Canberra, &u, &v), 2.0 + 1.0 / 3.0);
        assert_relative_eq!(
            d(DistanceMetric::Cosine, &u, &v),
            1.0 - 8.0 / (5.0f64.sqrt() * 17.0f64.sqrt())
        );
        assert_relative_eq!(d(DistanceMetric::Hamming, &u, &v), 1.0);
        assert_relative_eq!(d(DistanceMetric::Jaccard, &u, &v), 1.0);
    }

    #[test]
    fn test_correlation_of_affine_copy_is_zero() {
        let u = [1.0, 2.0, 3.0, 4.0];
        let v = [3.0, 5.0, 7.0, 9.0];
        assert!(d(DistanceMetric::Correlation, &u, &v) < 1e-12);
        let w = [4.0, 3.0, 2.0, 1.0];
        assert_relative_eq!(d(DistanceMetric::Correlation, &u, &w), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_boolean_metrics_match_reference_values() {
        // tt = 1, tf = 1, ft = 1, ff = 1, n = 4
        let u = [1.0, 1.0, 0.0, 0.0];
        let v = [1.0, 0.0, 2.0, 0.0];
        assert_relative_eq!(d(DistanceMetric::Dice, &u, &v), 2.0 / 4.0);
        assert_relative_eq!(d(DistanceMetric::Kulsinski, &u, &v), 5.0 / 6.0);
        assert_relative_eq!(d(DistanceMetric::Matching, &u, &v), 0.5);
        assert_relative_eq!(d(DistanceMetric::RogersTanimoto, &u, &v), 4.0 / 6.0);
        assert_relative_eq!(d(DistanceMetric::SokalMichener, &u, &v), 4.0 / 6.0);
        assert_relative_eq!(d(DistanceMetric::RussellRao, &u, &v), 3.0 / 4.0);
        assert_relative_eq!(d(DistanceMetric::SokalSneath, &u, &v), 4.0 / 5.0);
        assert_relative_eq!(d(DistanceMetric::Yule, &u, &v), 2.0 / 2.0);
    }

    #[test]
    fn test_zero_vectors_are_defined() {
        let z = [0.0, 0.0];
        let x = [1.0, 2.0];
        for metric in DistanceMetric::ALL {
            let same = d(metric, &z, &z);
            assert!(same.is_finite() && same >= 0.0, "{metric}: {same}");
            assert!(d(metric, &z, &x).is_finite(), "{metric}");
        }
        assert_eq!(d(DistanceMetric::Cosine, &z, &x), 1.0);
        assert_eq!(d(DistanceMetric::BrayCurtis, &z, &z), 0.0);
    }

    #[test]
    fn test_from_str_rejects_unknown_metric() {
        let err = "bogus".parse::<DistanceMetric>().unwrap_err();
        assert_eq!(
            err,
            Error::InvalidMetric {
                field: "dist_metric",
                name: "bogus".into(),
                allowed: METRIC_NAMES,
            }
        );
        assert_eq!("yule".parse::<DistanceMetric>().unwrap(), DistanceMetric::Yule);
    }

    #[test]
    fn test_compute_distances_requires_two_rows() {
        let data = array![[1.0, 2.0]];
        let err = compute_distances(data.view(), DistanceMetric::Euclidean).unwrap_err();
        assert!(matches!(err, Error::DegenerateInput { .. }));
    }

    #[test]
    fn test_compute_distances_rejects_nan() {
        let data = array![[1.0, 2.0], [f64::NAN, 0.0]];
        let err = compute_distances(data.view(), DistanceMetric::Cityblock).unwrap_err();
        assert!(matches!(err, Error::DegenerateInput { .. }));
    }

    #[test]
    fn test_condensed_matches_square() {
        let data = array![[0.0, 0.0], [3.0, 4.0], [6.0, 8.0]];
        let dm = compute_distances(data.view(), DistanceMetric::Euclidean).unwrap();
        assert_eq!(dm.condensed(), vec![5.0, 10.0, 5.0]);
        assert_eq!(dm.metric(), DistanceMetric::Euclidean);
    }

    #[test]
    fn test_from_square_validates_symmetry() {
        let bad = array![[0.0, 1.0], [2.0, 0.0]];
        assert!(DistanceMatrix::from_square(bad, DistanceMetric::Euclidean).is_err());
        let good = array![[0.0, 1.0], [1.0, 0.0]];
        assert!(DistanceMatrix::from_square(good, DistanceMetric::Euclidean).is_ok());
    }

    fn small_matrix() -> impl Strategy<Value = Vec<Vec<f64>>> {
        (2usize..8, 1usize..5).prop_flat_map(|(n, d)| {
            proptest::collection::vec(proptest::collection::vec(-5i32..5, d), n)
                .prop_map(|rows| {
                    rows.into_iter()
                        .map(|r| r.into_iter().map(|x| x as f64 * 0.5).collect())
                        .collect()
                })
        })
    }

    proptest! {
        #[test]
        fn distances_are_symmetric_zero_diagonal_non_negative(
            rows in small_matrix(),
            metric_idx in 0usize..18,
        ) {
            let metric = DistanceMetric::ALL[metric_idx];
            let n = rows.len();
            let d = rows[0].len();
            let flat: Vec<f64> = rows.into_iter().flatten().collect();
            let data = Array2::from_shape_vec((n, d), flat).unwrap();
            let dm = compute_distances(data.view(), metric).unwrap();
            for i in 0..n {
                prop_assert_eq!(dm.get(i, i), 0.0);
                for j in 0..n {
                    prop_assert!(dm.get(i, j) >= 0.0);
                    prop_assert!(dm.get(i, j).is_finite());
                    prop_assert_eq!(dm.get(i, j), dm.get(j, i));
                }
            }
        }
    }
}
