//! Localized multiple kernel k-means.
//!
//! Fuses M kernels over the same N observations while *jointly* learning
//! per-observation kernel weights (Gönen & Margolin 2014). The combined
//! kernel is a rank-one weighted sum:
//!
//! ```text
//! K_Θ[i,j] = Σₘ Θ[i,m] · Θ[j,m] · Kₘ[i,j]
//! ```
//!
//! so the same kernel can dominate one observation's similarities and be
//! ignored for another: that is the "localized" part, and the reason the
//! weight matrix Θ is N×M rather than a single length-M vector.
//!
//! # Alternating optimization
//!
//! With H ∈ R^{N×k} an orthonormal relaxation of the cluster indicator
//! matrix, the objective is
//!
//! ```text
//! J(Θ, H) = tr(K_Θ) − tr(Hᵀ K_Θ H)
//!         = Σₘ θₘᵀ (Kₘ ∘ (I − H Hᵀ)) θₘ
//! ```
//!
//! minimized subject to each row of Θ lying on the probability simplex.
//! The two blocks alternate:
//!
//! 1. **H-step**: k eigenvectors of K_Θ with the largest eigenvalues
//!    (kernel PCA relaxation).
//! 2. **Θ-step**: the simplex-constrained quadratic subproblem, solved by
//!    projected gradient with the Euclidean simplex projection of Duchi
//!    et al. (2008) and a step size from the ∞-norm Lipschitz bound.
//!
//! After convergence the rows of H are normalized to unit length and
//! clustered with ordinary k-means (Ng–Jordan–Weiss finish); a handful of
//! deterministic restarts keeps an unlucky k-means++ draw from spoiling
//! the assignment on small inputs.

use crate::cluster::Kmeans;
use crate::error::{Error, Result};
use ndarray::{Array2, ArrayView2, Axis};

use super::{check_symmetric, self_adjoint_eigenpairs};

/// Result of a localized multiple kernel k-means run.
#[derive(Debug, Clone)]
pub struct LocalizedFit {
    /// Cluster label per observation, in `[0, k)`.
    pub labels: Vec<usize>,
    /// N×M weight matrix Θ; rows are nonnegative and sum to one.
    pub weights: Array2<f64>,
}

/// Localized multiple kernel k-means.
#[derive(Debug, Clone)]
pub struct LocalizedKernelKmeans {
    /// Number of clusters.
    k: usize,
    /// Maximum alternating iterations.
    max_iter: usize,
    /// Projected-gradient steps per Θ-step.
    descent_steps: usize,
    /// Convergence tolerance on the objective.
    tol: f64,
    /// Random seed for the finishing k-means.
    seed: Option<u64>,
}

impl LocalizedKernelKmeans {
    /// Create a new fusion optimizer.
    pub fn new(k: usize) -> Self {
        Self {
            k,
            max_iter: 100,
            descent_steps: 30,
            tol: 1e-6,
            seed: None,
        }
    }

    /// Set the maximum number of alternating iterations.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set the number of projected-gradient steps per Θ-step.
    pub fn with_descent_steps(mut self, steps: usize) -> Self {
        self.descent_steps = steps;
        self
    }

    /// Set convergence tolerance on the objective.
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
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

    /// Jointly cluster and weight the given kernels.
    pub fn fit(&self, kernels: &[Array2<f64>]) -> Result<LocalizedFit> {
        if kernels.is_empty() {
            return Err(Error::EmptyInput);
        }
        let n = kernels[0].nrows();
        for kernel in kernels {
            check_symmetric(kernel.view(), 1e-8)?;
            if kernel.nrows() != n {
                return Err(Error::DimensionMismatch {
                    expected: n,
                    found: kernel.nrows(),
                });
            }
        }
        if self.k == 0 || self.k > n {
            return Err(Error::InvalidClusterCount {
                requested: self.k,
                n_items: n,
            });
        }

        let m_views = kernels.len();
        let mut theta = Array2::from_elem((n, m_views), 1.0 / m_views as f64);
        let mut h = Array2::<f64>::zeros((n, self.k));
        let mut prev_obj = f64::MAX;

        for _iter in 0..self.max_iter.max(1) {
            let ktheta = combine(kernels, &theta);

            // H-step: k leading eigenvectors of the combined kernel.
            h = leading_eigenvectors(ktheta.view(), self.k)?;

            // Objective: tr(K_Θ) − tr(Hᵀ K_Θ H).
            let trace: f64 = ktheta.diag().sum();
            let hkh = h.t().dot(&ktheta).dot(&h);
            let obj = trace - hkh.diag().sum();

            if (prev_obj - obj).abs() < self.tol {
                break;
            }
            prev_obj = obj;

            // Θ-step: projected gradient on Σₘ θₘᵀ Gₘ θₘ with
            // Gₘ = Kₘ ∘ (I − H Hᵀ) and rows of Θ on the simplex.
            let mask: Array2<f64> = Array2::eye(n) - h.dot(&h.t());
            let quadratics: Vec<Array2<f64>> = kernels.iter().map(|k_m| k_m * &mask).collect();

            let mut lipschitz = 0.0f64;
            for g in &quadratics {
                for row in g.axis_iter(Axis(0)) {
                    lipschitz = lipschitz.max(row.iter().map(|v| v.abs()).sum());
                }
            }
            let step = 1.0 / (2.0 * lipschitz + 1e-12);

            for _ in 0..self.descent_steps {
                let mut gradient = Array2::<f64>::zeros((n, m_views));
                for (m_idx, g) in quadratics.iter().enumerate() {
                    let col = g.dot(&theta.column(m_idx));
                    for i in 0..n {
                        gradient[[i, m_idx]] = 2.0 * col[i];
                    }
                }

                theta = &theta - &(gradient * step);
                for mut row in theta.axis_iter_mut(Axis(0)) {
                    project_to_simplex(row.as_slice_mut().expect("theta rows are contiguous"));
                }
            }
        }

        // Finish: k-means on the row-normalized embedding, best of a few
        // deterministic restarts by WCSS.
        let mut embedding = h;
        for mut row in embedding.axis_iter_mut(Axis(0)) {
            let norm = row.iter().map(|v| v * v).sum::<f64>().sqrt();
            if norm > 0.0 {
                row.mapv_inplace(|v| v / norm);
            }
        }

        let base_seed = self.seed.unwrap_or(42);
        let mut best: Option<(f64, Vec<usize>)> = None;

        for t in 0..4u64 {
            let labels = Kmeans::new(self.k)
                .with_seed(base_seed.wrapping_add(t))
                .fit(embedding.view())?;
            let score = wcss(embedding.view(), &labels, self.k);

            match &mut best {
                None => best = Some((score, labels)),
                Some((best_score, best_labels)) => {
                    if score < *best_score {
                        *best_score = score;
                        *best_labels = labels;
                    }
                }
            }
        }

        let (_, labels) = best.expect("k <= n implies at least one k-means run");

        Ok(LocalizedFit {
            labels,
            weights: theta,
        })
    }
}

/// The weighted combined kernel: `Σₘ Θ[i,m]·Θ[j,m]·Kₘ[i,j]`.
///
/// Symmetric whenever every input kernel is.
pub fn combine(kernels: &[Array2<f64>], weights: &Array2<f64>) -> Array2<f64> {
    let n = weights.nrows();
    Array2::from_shape_fn((n, n), |(i, j)| {
        kernels
            .iter()
            .enumerate()
            .map(|(m, k_m)| weights[[i, m]] * weights[[j, m]] * k_m[[i, j]])
            .sum()
    })
}

/// The k eigenvectors with the largest eigenvalues, as columns.
fn leading_eigenvectors(mat: ArrayView2<'_, f64>, k: usize) -> Result<Array2<f64>> {
    let n = mat.nrows();
    let (eigenvalues, eigenvectors) = self_adjoint_eigenpairs(mat)?;

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        eigenvalues[b]
            .partial_cmp(&eigenvalues[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut h = Array2::zeros((n, k));
    for (col, &idx) in order.iter().take(k).enumerate() {
        for i in 0..n {
            h[[i, col]] = eigenvectors[[i, idx]];
        }
    }
    Ok(h)
}

/// Euclidean projection onto the probability simplex (Duchi et al. 2008).
fn project_to_simplex(v: &mut [f64]) {
    let mut sorted = v.to_vec();
    sorted.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));

    let mut cumulative = 0.0;
    let mut threshold = 0.0;
    for (j, &u) in sorted.iter().enumerate() {
        cumulative += u;
        let t = (cumulative - 1.0) / (j + 1) as f64;
        if u - t > 0.0 {
            threshold = t;
        }
    }

    for x in v.iter_mut() {
        *x = (*x - threshold).max(0.0);
    }
}

/// Within-cluster sum of squares for a labeling of `data` rows.
fn wcss(data: ArrayView2<'_, f64>, labels: &[usize], k: usize) -> f64 {
    let n = data.nrows();
    let d = data.ncols();

    let mut centroids = Array2::<f64>::zeros((k, d));
    let mut counts = vec![0usize; k];
    for i in 0..n {
        let c = labels[i];
        counts[c] += 1;
        for j in 0..d {
            centroids[[c, j]] += data[[i, j]];
        }
    }
    for c in 0..k {
        if counts[c] > 0 {
            for j in 0..d {
                centroids[[c, j]] /= counts[c] as f64;
            }
        }
    }

    let mut total = 0.0;
    for i in 0..n {
        let c = labels[i];
        for j in 0..d {
            let diff = data[[i, j]] - centroids[[c, j]];
            total += diff * diff;
        }
    }
    total
}
