//! Consensus clustering via resampling.
//!
//! Repeatedly clusters random subsets of the observations and records how
//! often each pair lands in the same cluster (Monti et al. 2003). The
//! agreement frequencies form an N×N **consensus matrix**:
//!
//! ```text
//! C[i,j] = #(runs where i,j co-clustered) / #(runs where i,j co-sampled)
//! ```
//!
//! Entries lie in [0,1], the diagonal is 1 and the matrix is symmetric by
//! construction. A crisp block structure signals a stable clustering at the
//! chosen k; washed-out entries signal an unstable one. Downstream the
//! consensus matrix is repaired into a positive semi-definite kernel
//! ([`crate::kernel::spectral_shift`]) and treated as a similarity.
//!
//! # Base partitioners
//!
//! Each resampled run delegates to one of three partitioners, selected per
//! view by [`ConsensusMethod`]: k-means on the raw subsample, or average
//! linkage / PAM on subsample distances ([`ViewDistance`]).

use crate::cluster::{HierarchicalClustering, Kmeans, Pam};
use crate::error::{Error, Result};
use ndarray::{Array2, ArrayView2, Axis};
use rand::prelude::*;
use std::str::FromStr;

/// Base partitioner used inside the resampling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsensusMethod {
    /// K-means on the raw subsampled observations.
    KMeans,
    /// Average-linkage hierarchical clustering on subsample distances.
    Hclust,
    /// Partitioning around medoids on subsample distances.
    Pam,
}

impl FromStr for ConsensusMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "kmeans" => Ok(ConsensusMethod::KMeans),
            "hclust" => Ok(ConsensusMethod::Hclust),
            "pam" => Ok(ConsensusMethod::Pam),
            other => Err(Error::InvalidParameter {
                name: "consensus_method",
                message: format!("unknown method '{other}' (expected kmeans, hclust or pam)"),
            }),
        }
    }
}

/// Distance between observations of a view, for the distance-based
/// partitioners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewDistance {
    /// Euclidean distance between rows.
    Euclidean,
    /// One minus the Pearson correlation between rows.
    Pearson,
}

impl FromStr for ViewDistance {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "euclidean" => Ok(ViewDistance::Euclidean),
            "pearson" => Ok(ViewDistance::Pearson),
            other => Err(Error::InvalidParameter {
                name: "view_distance",
                message: format!("unknown distance '{other}' (expected euclidean or pearson)"),
            }),
        }
    }
}

/// Pairwise distances between the rows of a view.
pub fn pairwise_distance(view: ArrayView2<'_, f64>, distance: ViewDistance) -> Array2<f64> {
    let n = view.nrows();
    let mut out = Array2::zeros((n, n));
    for i in 0..n {
        for j in (i + 1)..n {
            let d = match distance {
                ViewDistance::Euclidean => view
                    .row(i)
                    .iter()
                    .zip(view.row(j).iter())
                    .map(|(a, b)| (a - b).powi(2))
                    .sum::<f64>()
                    .sqrt(),
                ViewDistance::Pearson => 1.0 - pearson(view.row(i), view.row(j)),
            };
            out[[i, j]] = d;
            out[[j, i]] = d;
        }
    }
    out
}

/// Pearson correlation between two rows; 0 when either row is constant.
fn pearson(a: ndarray::ArrayView1<'_, f64>, b: ndarray::ArrayView1<'_, f64>) -> f64 {
    let n = a.len() as f64;
    let mean_a = a.sum() / n;
    let mean_b = b.sum() / n;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    if var_a <= 0.0 || var_b <= 0.0 {
        return 0.0;
    }
    cov / (var_a.sqrt() * var_b.sqrt())
}

/// Resampling-based consensus matrix builder for one view.
#[derive(Debug, Clone)]
pub struct ConsensusClustering {
    /// Number of resampled clustering runs.
    resamples: usize,
    /// Fraction of observations drawn (without replacement) per run.
    subsample: f64,
    /// Base partitioner.
    method: ConsensusMethod,
    /// Distance for the distance-based partitioners.
    distance: ViewDistance,
    /// Random seed.
    seed: Option<u64>,
}

impl ConsensusClustering {
    /// Create a builder with k-means resampling, 100 runs, 80% subsamples.
    pub fn new() -> Self {
        Self {
            resamples: 100,
            subsample: 0.8,
            method: ConsensusMethod::KMeans,
            distance: ViewDistance::Euclidean,
            seed: None,
        }
    }

    /// Set the number of resampled runs.
    pub fn with_resamples(mut self, resamples: usize) -> Self {
        self.resamples = resamples;
        self
    }

    /// Set the subsample fraction in (0, 1].
    pub fn with_subsample(mut self, subsample: f64) -> Self {
        self.subsample = subsample;
        self
    }

    /// Set the base partitioner.
    pub fn with_method(mut self, method: ConsensusMethod) -> Self {
        self.method = method;
        self
    }

    /// Set the row distance used by the distance-based partitioners.
    pub fn with_distance(mut self, distance: ViewDistance) -> Self {
        self.distance = distance;
        self
    }

    /// Set random seed for reproducibility.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Build the consensus matrix of `view` at cluster count `k`.
    pub fn run(&self, view: ArrayView2<'_, f64>, k: usize) -> Result<Array2<f64>> {
        let n = view.nrows();
        if n == 0 {
            return Err(Error::EmptyInput);
        }
        if self.resamples == 0 {
            return Err(Error::InvalidParameter {
                name: "resamples",
                message: "at least one resampled run is required".to_string(),
            });
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err(Error::InvalidParameter {
                name: "subsample",
                message: format!("fraction {} outside (0, 1]", self.subsample),
            });
        }

        let sub_n = ((self.subsample * n as f64).ceil() as usize).min(n);
        if k > sub_n {
            return Err(Error::InvalidClusterCount {
                requested: k,
                n_items: sub_n,
            });
        }

        let mut rng: Box<dyn RngCore> = match self.seed {
            Some(s) => Box::new(StdRng::seed_from_u64(s)),
            None => Box::new(rand::rng()),
        };

        let mut co_clustered = Array2::<f64>::zeros((n, n));
        let mut co_sampled = Array2::<f64>::zeros((n, n));

        for b in 0..self.resamples {
            let indices = rand::seq::index::sample(&mut rng, n, sub_n).into_vec();
            let subview = view.select(Axis(0), &indices);

            let labels = match self.method {
                ConsensusMethod::KMeans => {
                    let km = match self.seed {
                        Some(s) => Kmeans::new(k).with_seed(s.wrapping_add(b as u64)),
                        None => Kmeans::new(k),
                    };
                    km.fit(subview.view())?
                }
                ConsensusMethod::Hclust => {
                    let dist = pairwise_distance(subview.view(), self.distance);
                    HierarchicalClustering::new(k).fit(dist.view())?
                }
                ConsensusMethod::Pam => {
                    let dist = pairwise_distance(subview.view(), self.distance);
                    Pam::new(k).fit(dist.view())?
                }
            };

            for (a, &ia) in indices.iter().enumerate() {
                for (c, &ic) in indices.iter().enumerate().skip(a + 1) {
                    co_sampled[[ia, ic]] += 1.0;
                    co_sampled[[ic, ia]] += 1.0;
                    if labels[a] == labels[c] {
                        co_clustered[[ia, ic]] += 1.0;
                        co_clustered[[ic, ia]] += 1.0;
                    }
                }
            }
        }

        let mut consensus = Array2::<f64>::zeros((n, n));
        for i in 0..n {
            consensus[[i, i]] = 1.0;
            for j in (i + 1)..n {
                let v = if co_sampled[[i, j]] > 0.0 {
                    co_clustered[[i, j]] / co_sampled[[i, j]]
                } else {
                    0.0
                };
                consensus[[i, j]] = v;
                consensus[[j, i]] = v;
            }
        }

        Ok(consensus)
    }
}

impl Default for ConsensusClustering {
    fn default() -> Self {
        Self::new()
    }
}
