//! Kernel k-means.
//!
//! Lloyd's algorithm in the feature space induced by a kernel. Centroids
//! are never materialized; the squared distance from observation i to the
//! centroid of cluster C comes straight from the Gram matrix:
//!
//! ```text
//! d²(i, C) = K[i,i] − (2/|C|) Σⱼ∈C K[i,j] + (1/|C|²) Σⱼ,ₗ∈C K[j,l]
//! ```
//!
//! (Dhillon, Guan & Kulis 2004.) With a PSD kernel the objective decreases
//! monotonically, so the loop converges just like ordinary k-means.

use crate::error::{Error, Result};
use ndarray::ArrayView2;
use rand::prelude::*;

use super::check_symmetric;

/// Hard kernel k-means on a positive semi-definite kernel matrix.
#[derive(Debug, Clone)]
pub struct KernelKmeans {
    /// Number of clusters.
    k: usize,
    /// Maximum iterations.
    max_iter: usize,
    /// Random seed.
    seed: Option<u64>,
}

impl KernelKmeans {
    /// Create a new kernel k-means clusterer.
    pub fn new(k: usize) -> Self {
        Self {
            k,
            max_iter: 100,
            seed: None,
        }
    }

    /// Set maximum iterations.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set random seed for reproducibility.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Number of clusters this instance produces.
    pub fn n_clusters(&self) -> usize {
        self.k
    }

    /// Cluster the rows of `kernel` into `k` groups.
    pub fn fit(&self, kernel: ArrayView2<'_, f64>) -> Result<Vec<usize>> {
        check_symmetric(kernel, 1e-8)?;
        let n = kernel.nrows();

        if self.k == 0 || self.k > n {
            return Err(Error::InvalidClusterCount {
                requested: self.k,
                n_items: n,
            });
        }

        let mut rng: Box<dyn RngCore> = match self.seed {
            Some(s) => Box::new(StdRng::seed_from_u64(s)),
            None => Box::new(rand::rng()),
        };

        // Shuffled round-robin init: every cluster starts nonempty.
        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(&mut rng);
        let mut labels = vec![0usize; n];
        for (pos, &i) in order.iter().enumerate() {
            labels[i] = pos % self.k;
        }

        let mut distances = vec![0.0f64; n];

        for _iter in 0..self.max_iter {
            // Per-cluster statistics.
            let mut members: Vec<Vec<usize>> = vec![Vec::new(); self.k];
            for (i, &c) in labels.iter().enumerate() {
                members[c].push(i);
            }

            // (1/|C|²) Σⱼ,ₗ∈C K[j,l] per cluster.
            let mut pair_term = vec![0.0f64; self.k];
            for c in 0..self.k {
                let size = members[c].len();
                if size == 0 {
                    continue;
                }
                let mut s = 0.0;
                for &j in &members[c] {
                    for &l in &members[c] {
                        s += kernel[[j, l]];
                    }
                }
                pair_term[c] = s / (size * size) as f64;
            }

            // Assignment: ties keep the lowest cluster index.
            let mut new_labels = vec![0usize; n];
            for i in 0..n {
                let mut best_cluster = labels[i];
                let mut best_dist = f64::MAX;

                for c in 0..self.k {
                    let size = members[c].len();
                    if size == 0 {
                        continue;
                    }
                    let cross: f64 = members[c].iter().map(|&j| kernel[[i, j]]).sum();
                    let dist = kernel[[i, i]] - 2.0 * cross / size as f64 + pair_term[c];
                    if dist < best_dist {
                        best_dist = dist;
                        best_cluster = c;
                    }
                }

                new_labels[i] = best_cluster;
                distances[i] = best_dist;
            }

            // Empty-cluster repair: move the worst-fitting observation into
            // each empty cluster.
            let mut counts = vec![0usize; self.k];
            for &c in &new_labels {
                counts[c] += 1;
            }
            for c in 0..self.k {
                if counts[c] > 0 {
                    continue;
                }
                if let Some(worst) = (0..n)
                    .filter(|&i| counts[new_labels[i]] > 1)
                    .max_by(|&a, &b| {
                        distances[a]
                            .partial_cmp(&distances[b])
                            .unwrap_or(std::cmp::Ordering::Equal)
                    })
                {
                    counts[new_labels[worst]] -= 1;
                    new_labels[worst] = c;
                    counts[c] = 1;
                }
            }

            if new_labels == labels {
                break;
            }
            labels = new_labels;
        }

        Ok(labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    /// Block similarity: 1 within groups, 0 across, PSD.
    fn block_kernel(sizes: &[usize]) -> Array2<f64> {
        let n: usize = sizes.iter().sum();
        let mut group = Vec::with_capacity(n);
        for (g, &s) in sizes.iter().enumerate() {
            group.extend(std::iter::repeat(g).take(s));
        }
        Array2::from_shape_fn((n, n), |(i, j)| if group[i] == group[j] { 1.0 } else { 0.0 })
    }

    #[test]
    fn test_kkmeans_separates_blocks() {
        let kernel = block_kernel(&[4, 4]);
        let labels = KernelKmeans::new(2).with_seed(42).fit(kernel.view()).unwrap();

        assert!(labels[..4].iter().all(|&l| l == labels[0]));
        assert!(labels[4..].iter().all(|&l| l == labels[4]));
        assert_ne!(labels[0], labels[4]);
    }

    #[test]
    fn test_kkmeans_three_blocks() {
        let kernel = block_kernel(&[3, 3, 3]);
        let labels = KernelKmeans::new(3).with_seed(7).fit(kernel.view()).unwrap();

        let unique: std::collections::HashSet<_> = labels.iter().collect();
        assert_eq!(unique.len(), 3);
        for g in 0..3 {
            let base = labels[g * 3];
            assert!(labels[g * 3..(g + 1) * 3].iter().all(|&l| l == base));
        }
    }

    #[test]
    fn test_kkmeans_deterministic_with_seed() {
        let kernel = block_kernel(&[5, 3]);
        let a = KernelKmeans::new(2).with_seed(1).fit(kernel.view()).unwrap();
        let b = KernelKmeans::new(2).with_seed(1).fit(kernel.view()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_kkmeans_k_larger_than_n_error() {
        let kernel = block_kernel(&[2]);
        let result = KernelKmeans::new(5).fit(kernel.view());
        assert!(matches!(result, Err(Error::InvalidClusterCount { .. })));
    }
}
