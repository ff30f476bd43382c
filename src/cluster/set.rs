//! Hard partitions of items into flat clusters.

/// An ordered hard partition of `n_items` items.
///
/// Clusters are ordered by their smallest member, and members within a
/// cluster are ascending, so two equal partitions always compare equal
/// regardless of how the algorithm numbered its labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterSet {
    clusters: Vec<Vec<usize>>,
    n_items: usize,
}

impl ClusterSet {
    /// Build from one label per item (labels need not be contiguous).
    pub fn from_labels(labels: &[usize]) -> Self {
        let mut slot_of_label: std::collections::HashMap<usize, usize> =
            std::collections::HashMap::new();
        let mut clusters: Vec<Vec<usize>> = Vec::new();
        for (item, &label) in labels.iter().enumerate() {
            let slot = *slot_of_label.entry(label).or_insert_with(|| {
                clusters.push(Vec::new());
                clusters.len() - 1
            });
            clusters[slot].push(item);
        }
        Self {
            clusters,
            n_items: labels.len(),
        }
    }

    /// Contiguous label per item: `labels()[i]` is the position of the
    /// cluster containing item `i`.
    pub fn labels(&self) -> Vec<usize> {
        let mut labels = vec![0; self.n_items];
        for (c, members) in self.clusters.iter().enumerate() {
            for &item in members {
                labels[item] = c;
            }
        }
        labels
    }

    /// Number of clusters.
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    /// True when there are no items at all.
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Number of partitioned items.
    pub fn n_items(&self) -> usize {
        self.n_items
    }

    /// Members of cluster `c`.
    pub fn get(&self, c: usize) -> Option<&[usize]> {
        self.clusters.get(c).map(Vec::as_slice)
    }

    /// Iterate over clusters in order.
    pub fn iter(&self) -> impl Iterator<Item = &[usize]> {
        self.clusters.iter().map(Vec::as_slice)
    }

    /// Cluster sizes in order.
    pub fn sizes(&self) -> Vec<usize> {
        self.clusters.iter().map(Vec::len).collect()
    }

    /// Map member indices to identifiers.
    pub fn named<'a>(&self, ids: &'a [String]) -> Vec<Vec<&'a str>> {
        self.clusters
            .iter()
            .map(|members| members.iter().map(|&i| ids[i].as_str()).collect())
            .collect()
    }
}
