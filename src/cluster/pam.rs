//! Partitioning around medoids (PAM).
//!
//! K-medoids clustering in the Kaufman & Rousseeuw formulation: cluster
//! centers are actual observations (medoids), and the objective is the sum
//! of distances from each observation to its nearest medoid. Unlike k-means
//! this only needs pairwise distances, which makes it usable directly on
//! the `1 − similarity` matrices derived from consensus kernels.
//!
//! Two phases:
//!
//! - **BUILD**: greedily pick k medoids, each new medoid the one that
//!   lowers the total cost most.
//! - **SWAP**: repeatedly exchange a medoid with a non-medoid while any
//!   exchange lowers the total cost.
//!
//! Both phases are deterministic, so PAM needs no seed.

use crate::error::{Error, Result};
use ndarray::ArrayView2;

/// Partitioning-around-medoids clustering on a precomputed distance matrix.
#[derive(Debug, Clone)]
pub struct Pam {
    /// Number of medoids.
    k: usize,
    /// Maximum SWAP passes.
    max_iter: usize,
}

impl Pam {
    /// Create a new PAM clusterer.
    pub fn new(k: usize) -> Self {
        Self { k, max_iter: 100 }
    }

    /// Set the maximum number of SWAP passes.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Number of clusters this instance produces.
    pub fn n_clusters(&self) -> usize {
        self.k
    }

    /// Cluster a square distance matrix into `k` groups.
    pub fn fit(&self, dist: ArrayView2<'_, f64>) -> Result<Vec<usize>> {
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
        if self.k > n {
            return Err(Error::InvalidClusterCount {
                requested: self.k,
                n_items: n,
            });
        }

        let mut medoids = self.build(&dist, n);

        // SWAP: first-improvement passes until no exchange helps.
        let mut cost = Self::total_cost(&dist, &medoids);
        for _pass in 0..self.max_iter {
            let mut improved = false;

            for m_idx in 0..medoids.len() {
                let mut best_swap: Option<(usize, f64)> = None;

                for candidate in 0..n {
                    if medoids.contains(&candidate) {
                        continue;
                    }
                    let old = medoids[m_idx];
                    medoids[m_idx] = candidate;
                    let new_cost = Self::total_cost(&dist, &medoids);
                    medoids[m_idx] = old;

                    if new_cost < cost - 1e-12
                        && best_swap.map_or(true, |(_, c)| new_cost < c)
                    {
                        best_swap = Some((candidate, new_cost));
                    }
                }

                if let Some((candidate, new_cost)) = best_swap {
                    medoids[m_idx] = candidate;
                    cost = new_cost;
                    improved = true;
                }
            }

            if !improved {
                break;
            }
        }

        Ok(Self::assign(&dist, &medoids))
    }

    /// BUILD phase: greedy medoid selection.
    fn build(&self, dist: &ArrayView2<'_, f64>, n: usize) -> Vec<usize> {
        let mut medoids = Vec::with_capacity(self.k);

        // First medoid: the observation with the smallest total distance.
        let first = (0..n)
            .min_by(|&a, &b| {
                let da: f64 = (0..n).map(|j| dist[[a, j]]).sum();
                let db: f64 = (0..n).map(|j| dist[[b, j]]).sum();
                da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(0);
        medoids.push(first);

        while medoids.len() < self.k {
            let mut best = None;
            let mut best_cost = f64::MAX;

            for candidate in 0..n {
                if medoids.contains(&candidate) {
                    continue;
                }
                medoids.push(candidate);
                let c = Self::total_cost(dist, &medoids);
                medoids.pop();

                if c < best_cost {
                    best_cost = c;
                    best = Some(candidate);
                }
            }

            match best {
                Some(candidate) => medoids.push(candidate),
                None => break,
            }
        }

        medoids
    }

    /// Sum of distances from each observation to its nearest medoid.
    fn total_cost(dist: &ArrayView2<'_, f64>, medoids: &[usize]) -> f64 {
        let n = dist.nrows();
        (0..n)
            .map(|i| {
                medoids
                    .iter()
                    .map(|&m| dist[[i, m]])
                    .fold(f64::MAX, f64::min)
            })
            .sum()
    }

    /// Label each observation by its nearest medoid (ties to the lower
    /// medoid index).
    fn assign(dist: &ArrayView2<'_, f64>, medoids: &[usize]) -> Vec<usize> {
        let n = dist.nrows();
        (0..n)
            .map(|i| {
                let mut best = 0;
                let mut best_dist = f64::MAX;
                for (c, &m) in medoids.iter().enumerate() {
                    if dist[[i, m]] < best_dist {
                        best_dist = dist[[i, m]];
                        best = c;
                    }
                }
                best
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn distance_matrix(points: &[f64]) -> Array2<f64> {
        let n = points.len();
        Array2::from_shape_fn((n, n), |(i, j)| (points[i] - points[j]).abs())
    }

    #[test]
    fn test_pam_basic() {
        let dist = distance_matrix(&[0.0, 0.1, 0.2, 10.0, 10.1, 10.2]);

        let labels = Pam::new(2).fit(dist.view()).unwrap();

        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[1], labels[2]);
        assert_eq!(labels[3], labels[4]);
        assert_eq!(labels[4], labels[5]);
        assert_ne!(labels[0], labels[3]);
    }

    #[test]
    fn test_pam_deterministic() {
        // Property: PAM has no randomness, repeated runs agree exactly.
        let dist = distance_matrix(&[0.0, 1.0, 2.0, 7.0, 8.0, 9.0, 20.0]);

        let a = Pam::new(3).fit(dist.view()).unwrap();
        let b = Pam::new(3).fit(dist.view()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_pam_k_equals_n() {
        let dist = distance_matrix(&[0.0, 5.0, 10.0]);
        let labels = Pam::new(3).fit(dist.view()).unwrap();

        let unique: std::collections::HashSet<_> = labels.iter().collect();
        assert_eq!(unique.len(), 3);
    }

    #[test]
    fn test_pam_k_larger_than_n_error() {
        let dist = distance_matrix(&[0.0, 1.0]);
        let result = Pam::new(3).fit(dist.view());
        assert!(matches!(result, Err(Error::InvalidClusterCount { .. })));
    }
}
