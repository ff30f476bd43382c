//! Agglomerative linkage over a precomputed distance matrix.
//!
//! Bottom-up: start with every item as its own cluster and repeatedly merge
//! the closest pair. The linkage method defines "distance between clusters"
//! through the Lance–Williams recurrence, which updates `d(k, i ∪ j)` from
//! `d(k, i)`, `d(k, j)` and `d(i, j)`:
//!
//! | Linkage | Update | Effect |
//! |---------|--------|--------|
//! | Single | `min(d_ki, d_kj)` | Chaining; elongated clusters |
//! | Complete | `max(d_ki, d_kj)` | Compact, spherical clusters |
//! | Average | size-weighted mean | Balanced compromise (UPGMA) |
//! | Weighted | plain mean | WPGMA |
//! | Centroid | distance between centroids | Can invert |
//! | Median | distance between midpoints | Can invert |
//! | Ward | Δ variance | Minimizes within-cluster variance |
//!
//! Centroid, median and Ward are geometric: they are only meaningful for
//! Euclidean input and run on squared distances internally, reporting the
//! square root as the merge height (the SciPy convention).
//!
//! ## Determinism
//!
//! Each active cluster lives in the slot of its smallest original row, and
//! candidate pairs are ordered by `(distance, lower slot, upper slot)`. Equal
//! distances therefore always merge the pair with the lowest original row
//! indices first, and identical input gives an identical dendrogram.
//!
//! ## Cost
//!
//! Every row keeps its nearest active neighbour; after a merge only rows
//! whose neighbour disappeared are rescanned. Memory is one `n × n` matrix.

use std::cmp::Ordering;
use std::fmt;

use tracing::debug;

use super::dendrogram::Dendrogram;
use crate::choice::Choice;
use crate::distance::{non_negative, DistanceMatrix, DistanceMetric};
use crate::error::{Error, Result};

/// Linkage method for hierarchical clustering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkageMethod {
    /// Single linkage: minimum distance between clusters.
    Single,
    /// Complete linkage: maximum distance between clusters.
    Complete,
    /// Average linkage: mean distance between clusters (UPGMA).
    Average,
    /// Weighted linkage: mean of the two merged clusters' distances (WPGMA).
    Weighted,
    /// Distance between cluster centroids.
    Centroid,
    /// Distance between cluster midpoints (WPGMC).
    Median,
    /// Ward's method: minimize within-cluster variance.
    Ward,
}

const LINKAGE_NAMES: &[&str] = &[
    "single", "complete", "average", "weighted", "centroid", "median", "ward",
];

impl LinkageMethod {
    /// Every method, in wire-name order.
    pub const ALL: [LinkageMethod; 7] = [
        LinkageMethod::Single,
        LinkageMethod::Complete,
        LinkageMethod::Average,
        LinkageMethod::Weighted,
        LinkageMethod::Centroid,
        LinkageMethod::Median,
        LinkageMethod::Ward,
    ];

    /// Whether the method is only defined for Euclidean distances.
    pub fn requires_euclidean(self) -> bool {
        matches!(
            self,
            LinkageMethod::Centroid | LinkageMethod::Median | LinkageMethod::Ward
        )
    }

    /// Lance–Williams update of `d(k, i ∪ j)`.
    #[inline]
    fn update(self, d_ki: f64, d_kj: f64, d_ij: f64, n_i: f64, n_j: f64, n_k: f64) -> f64 {
        match self {
            LinkageMethod::Single => d_ki.min(d_kj),
            LinkageMethod::Complete => d_ki.max(d_kj),
            LinkageMethod::Average => (n_i * d_ki + n_j * d_kj) / (n_i + n_j),
            LinkageMethod::Weighted => 0.5 * (d_ki + d_kj),
            LinkageMethod::Centroid => {
                let n = n_i + n_j;
                (n_i * d_ki + n_j * d_kj) / n - n_i * n_j * d_ij / (n * n)
            }
            LinkageMethod::Median => 0.5 * (d_ki + d_kj) - 0.25 * d_ij,
            LinkageMethod::Ward => {
                ((n_i + n_k) * d_ki + (n_j + n_k) * d_kj - n_k * d_ij) / (n_i + n_j + n_k)
            }
        }
    }
}

impl Choice for LinkageMethod {
    const FIELD: &'static str = "linkage_method";
    const ALLOWED: &'static [&'static str] = LINKAGE_NAMES;

    fn from_wire(value: &str) -> Option<Self> {
        LINKAGE_NAMES
            .iter()
            .position(|name| *name == value)
            .map(|i| Self::ALL[i])
    }

    fn as_wire(self) -> &'static str {
        let i = Self::ALL
            .iter()
            .position(|m| *m == self)
            .unwrap_or_default();
        LINKAGE_NAMES[i]
    }
}

impl fmt::Display for LinkageMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// Fail with [`Error::IncompatibleLinkage`] when `method` needs Euclidean
/// distances and `metric` does not produce them.
pub fn check_compatible(method: LinkageMethod, metric: DistanceMetric) -> Result<()> {
    if method.requires_euclidean() && !metric.is_euclidean() {
        return Err(Error::IncompatibleLinkage {
            method: method.as_wire(),
            metric: metric.as_wire(),
        });
    }
    Ok(())
}

/// Candidate merge ordered by `(distance, lower slot, upper slot)`.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    dist: f64,
    lo: usize,
    hi: usize,
}

impl Candidate {
    fn new(dist: f64, a: usize, b: usize) -> Self {
        Self {
            dist,
            lo: a.min(b),
            hi: a.max(b),
        }
    }

    fn cmp(&self, other: &Self) -> Ordering {
        self.dist
            .total_cmp(&other.dist)
            .then(self.lo.cmp(&other.lo))
            .then(self.hi.cmp(&other.hi))
    }
}

struct State {
    n: usize,
    d: Vec<f64>,
    active: Vec<bool>,
    nn: Vec<usize>,
    nn_dist: Vec<f64>,
}

impl State {
    #[inline]
    fn at(&self, i: usize, j: usize) -> f64 {
        self.d[i * self.n + j]
    }

    #[inline]
    fn set(&mut self, i: usize, j: usize, v: f64) {
        self.d[i * self.n + j] = v;
        self.d[j * self.n + i] = v;
    }

    fn rescan(&mut self, i: usize) {
        let mut best: Option<Candidate> = None;
        for j in 0..self.n {
            if j == i || !self.active[j] {
                continue;
            }
            let c = Candidate::new(self.at(i, j), i, j);
            if best.map_or(true, |b| c.cmp(&b) == Ordering::Less) {
                best = Some(c);
            }
        }
        if let Some(b) = best {
            self.nn[i] = if b.lo == i { b.hi } else { b.lo };
            self.nn_dist[i] = b.dist;
        }
    }

    fn nearest(&self, i: usize) -> Candidate {
        Candidate::new(self.nn_dist[i], i, self.nn[i])
    }
}

/// Build a dendrogram from pairwise distances.
///
/// # Errors
///
/// - [`Error::DegenerateInput`] for fewer than 2 items.
/// - [`Error::IncompatibleLinkage`] for centroid/median/Ward on distances
///   that were not computed under the Euclidean metric.
/// - [`Error::ComputationAnomaly`] when merge heights decrease (possible for
///   centroid and median linkage).
pub fn build_linkage(distances: &DistanceMatrix, method: LinkageMethod) -> Result<Dendrogram> {
    let n = distances.n();
    if n < 2 {
        return Err(Error::degenerate(format!(
            "need at least 2 items for linkage, got {n}"
        )));
    }
    check_compatible(method, distances.metric())?;
    debug!(items = n, %method, "building linkage");

    let squared = method.requires_euclidean();
    let mut d = Vec::with_capacity(n * n);
    for v in distances.as_array().iter() {
        d.push(if squared { v * v } else { *v });
    }

    let mut state = State {
        n,
        d,
        active: vec![true; n],
        nn: vec![0; n],
        nn_dist: vec![f64::INFINITY; n],
    };
    for i in 0..n {
        state.rescan(i);
    }

    let mut size = vec![1usize; n];
    // SciPy cluster id currently held by each slot.
    let mut label: Vec<usize> = (0..n).collect();
    let mut dendro = Dendrogram::new(n);

    for step in 0..(n - 1) {
        let mut best: Option<Candidate> = None;
        for i in (0..n).filter(|&i| state.active[i]) {
            let c = state.nearest(i);
            if best.map_or(true, |b| c.cmp(&b) == Ordering::Less) {
                best = Some(c);
            }
        }
        let Candidate { dist: d_ij, lo, hi } = best.ok_or_else(|| Error::ComputationAnomaly {
            detail: format!("no active pair at merge step {step}"),
        })?;

        let (n_i, n_j) = (size[lo] as f64, size[hi] as f64);
        for k in 0..n {
            if !state.active[k] || k == lo || k == hi {
                continue;
            }
            let updated = method.update(
                state.at(k, lo),
                state.at(k, hi),
                d_ij,
                n_i,
                n_j,
                size[k] as f64,
            );
            state.set(k, lo, non_negative(updated));
        }
        state.active[hi] = false;
        size[lo] += size[hi];

        let height = if squared { non_negative(d_ij).sqrt() } else { d_ij };
        let (a, b) = (label[lo].min(label[hi]), label[lo].max(label[hi]));
        dendro.add_merge(a, b, height, size[lo]);
        label[lo] = n + step;

        if step + 2 < n {
            state.rescan(lo);
            for k in 0..n {
                if !state.active[k] || k == lo {
                    continue;
                }
                if state.nn[k] == lo || state.nn[k] == hi {
                    state.rescan(k);
                } else {
                    let c = Candidate::new(state.at(k, lo), k, lo);
                    if c.cmp(&state.nearest(k)) == Ordering::Less {
                        state.nn[k] = lo;
                        state.nn_dist[k] = c.dist;
                    }
                }
            }
        }
    }

    dendro.check_monotonic()?;
    Ok(dendro)
}
