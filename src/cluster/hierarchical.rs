//! Hierarchical (agglomerative) clustering over a precomputed distance matrix.
//!
//! Bottom-up clustering that builds a **dendrogram** by iteratively merging
//! the closest clusters, then cuts it to k groups.
//!
//! # Linkage Methods
//!
//! | Linkage | Formula | Effect |
//! |---------|---------|--------|
//! | Single | min(d(a,b)) for a∈A, b∈B | Chaining; elongated clusters |
//! | Complete | max(d(a,b)) | Compact, spherical clusters |
//! | Average | mean(d(a,b)) | Balanced compromise |
//! | Ward | Δ variance | Minimizes within-cluster variance |
//!
//! Average linkage is the default: the upstream "distances" are
//! `1 − similarity` values derived from consensus kernels, and average
//! linkage is the conventional choice for agreement matrices.

use crate::error::{Error, Result};
use kodama::{linkage as kodama_linkage, Method as KodamaMethod};
use ndarray::ArrayView2;

/// Linkage method for hierarchical clustering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Linkage {
    /// Single linkage: minimum distance between clusters.
    Single,
    /// Complete linkage: maximum distance between clusters.
    Complete,
    /// Average linkage: mean distance between clusters.
    Average,
    /// Ward's method: minimize within-cluster variance.
    Ward,
}

/// Hierarchical (agglomerative) clustering.
#[derive(Debug, Clone)]
pub struct HierarchicalClustering {
    /// Number of clusters to produce.
    n_clusters: usize,
    /// Linkage method.
    linkage: Linkage,
}

impl HierarchicalClustering {
    /// Create a new hierarchical clusterer with average linkage.
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            linkage: Linkage::Average,
        }
    }

    /// Set linkage method.
    pub fn with_linkage(mut self, linkage: Linkage) -> Self {
        self.linkage = linkage;
        self
    }

    /// Build the full dendrogram from a square distance matrix.
    pub fn fit_dendrogram(&self, dist: ArrayView2<'_, f64>) -> Result<Dendrogram> {
        let n = dist.nrows();
        if n == 0 {
            return Err(Error::EmptyInput);
        }
        if dist.ncols() != n {
            return Err(Error::ShapeMismatch {
                expected: format!("{n}x{n} distance matrix"),
                actual: format!("{}x{}", n, dist.ncols()),
            });
        }

        // Condensed dissimilarity matrix (upper triangle, row-major).
        // Length is N-choose-2.
        let mut condensed = Vec::with_capacity((n * (n - 1)) / 2);
        for row in 0..n.saturating_sub(1) {
            for col in (row + 1)..n {
                condensed.push(dist[[row, col]]);
            }
        }

        let method = match self.linkage {
            Linkage::Single => KodamaMethod::Single,
            Linkage::Complete => KodamaMethod::Complete,
            Linkage::Average => KodamaMethod::Average,
            Linkage::Ward => KodamaMethod::Ward,
        };

        // Run hierarchical clustering using kodama (BurntSushi).
        //
        // kodama's dendrogram uses SciPy/MATLAB-style cluster labels:
        // - leaves: 0..n-1
        // - each merge i creates cluster id n+i
        let dend = kodama_linkage(&mut condensed, n, method);

        let mut dendro = Dendrogram::new(n);
        for step in dend.steps() {
            dendro.add_merge(step.cluster1, step.cluster2, step.dissimilarity, step.size);
        }

        Ok(dendro)
    }

    /// Cluster a square distance matrix into `n_clusters` groups.
    pub fn fit(&self, dist: ArrayView2<'_, f64>) -> Result<Vec<usize>> {
        let dendro = self.fit_dendrogram(dist)?;
        Ok(dendro.cut_to_k(self.n_clusters))
    }

    /// Number of clusters this instance produces.
    pub fn n_clusters(&self) -> usize {
        self.n_clusters
    }
}

/// A dendrogram representing hierarchical cluster merges.
///
/// Each merge combines two clusters into one, recording which clusters were
/// merged, the dissimilarity at which they merged, and the resulting size.
#[derive(Debug, Clone)]
pub struct Dendrogram {
    /// Merge history: (cluster_a, cluster_b, distance, new_size)
    merges: Vec<Merge>,
    /// Number of original items.
    n_items: usize,
}

/// A single merge operation in the dendrogram.
#[derive(Debug, Clone, Copy)]
pub struct Merge {
    /// First cluster being merged (SciPy-style id).
    pub cluster_a: usize,
    /// Second cluster being merged (SciPy-style id).
    pub cluster_b: usize,
    /// Dissimilarity at which the merge occurred.
    pub distance: f64,
    /// Size of the resulting cluster.
    pub size: usize,
}

impl Dendrogram {
    /// Create a new dendrogram for n items.
    pub fn new(n_items: usize) -> Self {
        Self {
            merges: Vec::with_capacity(n_items.saturating_sub(1)),
            n_items,
        }
    }

    /// Record a merge operation.
    pub fn add_merge(&mut self, cluster_a: usize, cluster_b: usize, distance: f64, size: usize) {
        self.merges.push(Merge {
            cluster_a,
            cluster_b,
            distance,
            size,
        });
    }

    /// Cluster assignments after applying the first `n_items - k` merges.
    ///
    /// Merges are replayed in order through a union-find over the SciPy-style
    /// ids (merge i creates id `n_items + i`), then labels are renumbered to
    /// consecutive integers by first occurrence.
    pub fn cut_to_k(&self, k: usize) -> Vec<usize> {
        let n = self.n_items;
        if k == 0 || k >= n {
            return (0..n).collect();
        }

        let applied = (n - k).min(self.merges.len());
        let mut parent: Vec<usize> = (0..(n + applied)).collect();

        fn find(parent: &mut [usize], mut x: usize) -> usize {
            while parent[x] != x {
                parent[x] = parent[parent[x]];
                x = parent[x];
            }
            x
        }

        for (i, merge) in self.merges.iter().take(applied).enumerate() {
            let new_id = n + i;
            let ra = find(&mut parent, merge.cluster_a);
            let rb = find(&mut parent, merge.cluster_b);
            parent[ra] = new_id;
            parent[rb] = new_id;
        }

        // Renumber roots to consecutive labels in order of first occurrence.
        let mut relabel: Vec<Option<usize>> = vec![None; n + applied];
        let mut next = 0;
        let mut labels = Vec::with_capacity(n);
        for item in 0..n {
            let root = find(&mut parent, item);
            let label = *relabel[root].get_or_insert_with(|| {
                let l = next;
                next += 1;
                l
            });
            labels.push(label);
        }
        labels
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn distance_matrix(points: &[(f64, f64)]) -> Array2<f64> {
        let n = points.len();
        Array2::from_shape_fn((n, n), |(i, j)| {
            let dx = points[i].0 - points[j].0;
            let dy = points[i].1 - points[j].1;
            (dx * dx + dy * dy).sqrt()
        })
    }

    #[test]
    fn test_hierarchical_basic() {
        let dist = distance_matrix(&[(0.0, 0.0), (0.1, 0.1), (10.0, 10.0), (10.1, 10.1)]);

        let hc = HierarchicalClustering::new(2);
        let labels = hc.fit(dist.view()).unwrap();

        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[2], labels[3]);
        assert_ne!(labels[0], labels[2]);
    }

    #[test]
    fn test_dendrogram_merge_count() {
        let dist = distance_matrix(&[(0.0, 0.0), (1.0, 0.0), (10.0, 0.0)]);

        let hc = HierarchicalClustering::new(2);
        let dendro = hc.fit_dendrogram(dist.view()).unwrap();

        assert_eq!(dendro.n_items(), 3);
        assert_eq!(dendro.n_merges(), 2);
    }

    #[test]
    fn test_cut_to_k_extremes() {
        let dist = distance_matrix(&[(0.0, 0.0), (1.0, 0.0), (10.0, 0.0), (11.0, 0.0)]);
        let dendro = HierarchicalClustering::new(1)
            .fit_dendrogram(dist.view())
            .unwrap();

        // k >= n: every item its own cluster
        assert_eq!(dendro.cut_to_k(4), vec![0, 1, 2, 3]);

        // k == 1: everything together
        let all = dendro.cut_to_k(1);
        assert!(all.iter().all(|&l| l == all[0]));
    }

    #[test]
    fn test_rectangular_matrix_rejected() {
        let dist = Array2::<f64>::zeros((3, 4));
        let result = HierarchicalClustering::new(2).fit(dist.view());
        assert!(matches!(result, Err(Error::ShapeMismatch { .. })));
    }
}
