//! Dendrogram produced by agglomerative clustering.
//!
//! A dendrogram records the merge history of `n` leaves using SciPy's
//! labeling: leaves are `0..n`, and merge `i` creates cluster `n + i`.
//!
//! ```text
//!         6 (height=1.0)
//!        / \
//!       4   5 (height=0.7)
//!      / \ / \
//!     0  1 2  3 (leaves)
//! ```
//!
//! Flat clusters come from cutting the tree top-down: a subtree stays whole
//! when a per-merge criterion (its height, or its inconsistency
//! coefficient) is within the threshold everywhere inside it.

use crate::error::{Error, Result};

/// A dendrogram representing hierarchical cluster merges.
#[derive(Debug, Clone, PartialEq)]
pub struct Dendrogram {
    /// Merge history, in merge order.
    merges: Vec<Merge>,
    /// Number of original items.
    n_items: usize,
}

/// A single merge operation in the dendrogram.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Merge {
    /// Smaller id of the two merged clusters.
    pub cluster_a: usize,
    /// Larger id of the two merged clusters.
    pub cluster_b: usize,
    /// Dissimilarity at which the merge occurred.
    pub height: f64,
    /// Number of leaves in the resulting cluster.
    pub size: usize,
}

/// Inconsistency statistics of one merge (SciPy `inconsistent` row).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Inconsistency {
    /// Mean height of the links considered.
    pub mean: f64,
    /// Sample standard deviation of those heights.
    pub std: f64,
    /// Number of links considered.
    pub count: usize,
    /// `(height - mean) / std`, or 0 when `std` is 0.
    pub coefficient: f64,
}

/// Relative slack allowed before a height decrease counts as an inversion.
const MONOTONE_TOLERANCE: f64 = 1e-12;

impl Dendrogram {
    /// Create an empty dendrogram for `n_items` leaves.
    pub fn new(n_items: usize) -> Self {
        Self {
            merges: Vec::with_capacity(n_items.saturating_sub(1)),
            n_items,
        }
    }

    /// Record a merge operation.
    pub fn add_merge(&mut self, cluster_a: usize, cluster_b: usize, height: f64, size: usize) {
        self.merges.push(Merge {
            cluster_a,
            cluster_b,
            height,
            size,
        });
    }

    /// Number of original items.
    pub fn n_items(&self) -> usize {
        self.n_items
    }

    /// Number of merges recorded.
    pub fn n_merges(&self) -> usize {
        self.merges.len()
    }

    /// Iterate over merges.
    pub fn merges(&self) -> impl Iterator<Item = &Merge> {
        self.merges.iter()
    }

    /// Merge heights in merge order.
    pub fn heights(&self) -> Vec<f64> {
        self.merges.iter().map(|m| m.height).collect()
    }

    /// Height of the final merge, or 0 for a tree without merges.
    pub fn max_height(&self) -> f64 {
        self.merges.iter().map(|m| m.height).fold(0.0, f64::max)
    }

    /// The last `p` merges (the top of the tree), in merge order.
    pub fn last_merges(&self, p: usize) -> &[Merge] {
        let start = self.merges.len().saturating_sub(p);
        &self.merges[start..]
    }

    /// Verify the tree is complete and heights never decrease.
    pub fn check_monotonic(&self) -> Result<()> {
        if self.merges.len() + 1 != self.n_items {
            return Err(Error::ComputationAnomaly {
                detail: format!(
                    "dendrogram over {} items has {} merges",
                    self.n_items,
                    self.merges.len()
                ),
            });
        }
        for (step, pair) in self.merges.windows(2).enumerate() {
            let (prev, next) = (pair[0].height, pair[1].height);
            if next < prev - MONOTONE_TOLERANCE * prev.abs().max(1.0) {
                return Err(Error::ComputationAnomaly {
                    detail: format!(
                        "non-monotonic merge heights: step {} at {next} follows {prev}",
                        step + 1
                    ),
                });
            }
        }
        Ok(())
    }

    /// Inconsistency statistics for every merge, looking `depth` link
    /// levels down (the merge itself is level 1).
    pub fn inconsistency(&self, depth: usize) -> Vec<Inconsistency> {
        let n = self.n_items;
        let mut out = Vec::with_capacity(self.merges.len());
        for (i, merge) in self.merges.iter().enumerate() {
            let mut heights = Vec::new();
            let mut frontier = vec![i];
            for _level in 0..depth.max(1) {
                let mut next = Vec::new();
                for &m in &frontier {
                    let link = &self.merges[m];
                    heights.push(link.height);
                    for child in [link.cluster_a, link.cluster_b] {
                        if child >= n {
                            next.push(child - n);
                        }
                    }
                }
                if next.is_empty() {
                    break;
                }
                frontier = next;
            }

            let count = heights.len();
            let mean = heights.iter().sum::<f64>() / count as f64;
            let std = if count > 1 {
                let ss: f64 = heights.iter().map(|h| (h - mean) * (h - mean)).sum();
                (ss / (count - 1) as f64).sqrt()
            } else {
                0.0
            };
            let coefficient = if std > 0.0 {
                (merge.height - mean) / std
            } else {
                0.0
            };
            out.push(Inconsistency {
                mean,
                std,
                count,
                coefficient,
            });
        }
        out
    }

    /// For each merge, the maximum of `values` over the merge and every merge
    /// below it.
    fn subtree_max(&self, values: &[f64]) -> Vec<f64> {
        let n = self.n_items;
        let mut out: Vec<f64> = Vec::with_capacity(self.merges.len());
        for (i, merge) in self.merges.iter().enumerate() {
            let mut m = values[i];
            // Children always precede their parent in merge order.
            for child in [merge.cluster_a, merge.cluster_b] {
                if child >= n {
                    m = m.max(out[child - n]);
                }
            }
            out.push(m);
        }
        out
    }

    /// Cut top-down: a subtree becomes one flat cluster when the maximum of
    /// `values` inside it is `<= threshold`. Returns one label per item.
    pub fn cut_by(&self, values: &[f64], threshold: f64) -> Vec<usize> {
        let n = self.n_items;
        let mut labels = vec![0usize; n];
        if self.merges.is_empty() {
            return (0..n).collect();
        }
        let crit = self.subtree_max(values);

        let mut next_label = 0;
        let root = n + self.merges.len() - 1;
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if node < n {
                labels[node] = next_label;
                next_label += 1;
                continue;
            }
            let m = node - n;
            if crit[m] <= threshold {
                for leaf in self.leaves(node) {
                    labels[leaf] = next_label;
                }
                next_label += 1;
            } else {
                let merge = &self.merges[m];
                stack.push(merge.cluster_b);
                stack.push(merge.cluster_a);
            }
        }
        labels
    }

    /// Leaves under `node`.
    pub fn leaves(&self, node: usize) -> Vec<usize> {
        let n = self.n_items;
        let mut out = Vec::new();
        let mut stack = vec![node];
        while let Some(c) = stack.pop() {
            if c < n {
                out.push(c);
            } else {
                let merge = &self.merges[c - n];
                stack.push(merge.cluster_b);
                stack.push(merge.cluster_a);
            }
        }
        out
    }

    /// Get cluster assignments at a given distance threshold.
    ///
    /// All merges with height > threshold are "cut", producing separate
    /// clusters.
    pub fn cut_at_distance(&self, threshold: f64) -> Vec<usize> {
        self.cut_by(&self.heights(), threshold)
    }

    /// Cut so that at most `k` clusters remain, using the lowest height that
    /// achieves it.
    ///
    /// Returns the labels and the achieved cluster count. When tied heights
    /// make exactly `k` impossible, the count closest to `k` wins, with ties
    /// going to the smaller count.
    pub fn cut_to_k(&self, k: usize) -> (Vec<usize>, usize) {
        let n = self.n_items;
        let crit = self.subtree_max(&self.heights());
        let mut sorted = crit.clone();
        sorted.sort_by(|a, b| a.total_cmp(b));

        // Candidate cuts: below every merge (n clusters), then at each
        // distinct height h, which joins every merge with crit <= h.
        let mut prev: (Option<f64>, usize) = (None, n);
        let mut chosen = prev;
        if n > k {
            let mut idx = 0;
            while idx < sorted.len() {
                let h = sorted[idx];
                while idx < sorted.len() && sorted[idx] <= h {
                    idx += 1;
                }
                let count = n - idx;
                if count <= k {
                    chosen = if count == k || k - count <= prev.1 - k {
                        (Some(h), count)
                    } else {
                        prev
                    };
                    break;
                }
                prev = (Some(h), count);
                chosen = prev;
            }
        }

        let labels = match chosen.0 {
            Some(h) => self.cut_by(&crit, h),
            None => (0..n).collect(),
        };
        (labels, chosen.1)
    }
}
