//! Multi-view integration pipeline.
//!
//! Ties the crate together: M views describing the same N observations go
//! in, one joint clustering comes out.
//!
//! ```text
//! views ──▶ validate ──▶ per-view consensus + repair ──▶ localized fusion ──▶ Integration
//!                         (search k per view if unset)    (search global k if unset)
//! ```
//!
//! Each view is summarized into a consensus matrix ([`crate::consensus`]),
//! repaired into a kernel ([`crate::kernel::spectral_shift`]), and the
//! resulting kernel array is fused by localized multiple kernel k-means
//! ([`crate::kernel::LocalizedKernelKmeans`]). Whenever a cluster count is
//! not supplied, candidates in `[2, max]` are scored with the silhouette
//! and the best count wins ([`crate::validity::ModelSelector`]), ties going
//! to the smallest count.
//!
//! The pipeline runs each stage to completion before the next starts and
//! aborts on the first failure; there is no partial output. Stages report
//! progress through an optional [`Monitor`].
//!
//! # Example
//!
//! ```no_run
//! use ndarray::Array2;
//! use plait::Integrator;
//!
//! let expression = Array2::<f64>::zeros((40, 120));
//! let methylation = Array2::<f64>::zeros((40, 30));
//!
//! let result = Integrator::new()
//!     .with_view_max_k(5)
//!     .with_global_max_k(5)
//!     .with_resamples(250)
//!     .with_seed(42)
//!     .run(&[expression, methylation])?;
//!
//! println!("fused clusters: {:?}", result.global_k);
//! # Ok::<(), plait::Error>(())
//! ```

use crate::consensus::{ConsensusClustering, ConsensusMethod, ViewDistance};
use crate::cluster::{HierarchicalClustering, Pam};
use crate::error::{Error, Result};
use crate::kernel::{combine, spectral_shift, KernelKmeans, LocalizedFit, LocalizedKernelKmeans};
use crate::monitor::{Monitor, Stage};
use crate::validity::{similarity_to_distance, ModelSelector, Selection};
use ndarray::{Array2, Axis};
use std::collections::BTreeMap;
use std::str::FromStr;

/// How candidate labelings are derived from a repaired kernel during the
/// per-view search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelMethod {
    /// Kernel k-means on the repaired kernel.
    KernelKMeans,
    /// Average-linkage hierarchical clustering on `1 − kernel` distances.
    Hclust,
    /// Partitioning around medoids on the same distances.
    Pam,
}

impl FromStr for KernelMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "kkmeans" => Ok(KernelMethod::KernelKMeans),
            "hclust" => Ok(KernelMethod::Hclust),
            "pam" => Ok(KernelMethod::Pam),
            other => Err(Error::InvalidParameter {
                name: "kernel_method",
                message: format!("unknown method '{other}' (expected kkmeans, hclust or pam)"),
            }),
        }
    }
}

/// Output of an integration run.
#[derive(Debug, Clone)]
pub struct Integration {
    /// Repaired consensus kernel per view, each N×N.
    pub kernels: Vec<Array2<f64>>,
    /// N×M weight matrix: row i says how much each view contributes to
    /// observation i's fused similarities. Entries are nonnegative.
    pub weights: Array2<f64>,
    /// The weighted combined kernel, N×N symmetric.
    pub fused_kernel: Array2<f64>,
    /// Joint cluster label per observation, in `[0, k)`.
    pub labels: Vec<usize>,
    /// Cluster count chosen per view; present only when the per-view
    /// search ran.
    pub best_k: Option<Vec<usize>>,
    /// Fused cluster count chosen by the search; present only when the
    /// global search ran.
    pub global_k: Option<usize>,
}

/// Configurable multi-view integration pipeline.
#[derive(Debug, Clone)]
pub struct Integrator {
    /// Per-view cluster counts (length 1 broadcast or M); None → search.
    view_k: Option<Vec<usize>>,
    /// Upper bound of the per-view search.
    view_max_k: usize,
    /// Fused cluster count; None → search.
    global_k: Option<usize>,
    /// Upper bound of the fused search.
    global_max_k: usize,
    /// Resampled runs per consensus matrix.
    resamples: usize,
    /// Iteration budget of the fusion optimizer.
    fusion_iters: usize,
    /// Z-score each view's columns before consensus clustering.
    scale: bool,
    /// Candidate-labeling strategy for the per-view search.
    kernel_method: KernelMethod,
    /// Base partitioner per view (length 1 broadcast or M).
    consensus_methods: Vec<ConsensusMethod>,
    /// Row distance per view (length 1 broadcast or M).
    distances: Vec<ViewDistance>,
    /// Extra validation indices.
    widest_gap: bool,
    dunn: bool,
    dunn2: bool,
    /// Random seed.
    seed: Option<u64>,
}

impl Integrator {
    /// Create a pipeline with defaults: searched cluster counts up to 6,
    /// 100 resamples, 100 fusion iterations, k-means consensus, kernel
    /// k-means candidate labelings.
    pub fn new() -> Self {
        Self {
            view_k: None,
            view_max_k: 6,
            global_k: None,
            global_max_k: 6,
            resamples: 100,
            fusion_iters: 100,
            scale: false,
            kernel_method: KernelMethod::KernelKMeans,
            consensus_methods: vec![ConsensusMethod::KMeans],
            distances: vec![ViewDistance::Euclidean],
            widest_gap: false,
            dunn: false,
            dunn2: false,
            seed: None,
        }
    }

    /// Fix the per-view cluster counts (length 1 to broadcast, or one per
    /// view). Disables the per-view search.
    pub fn with_view_k(mut self, view_k: Vec<usize>) -> Self {
        self.view_k = Some(view_k);
        self
    }

    /// Set the upper bound of the per-view search (inclusive).
    pub fn with_view_max_k(mut self, max_k: usize) -> Self {
        self.view_max_k = max_k;
        self
    }

    /// Fix the fused cluster count. Disables the global search.
    pub fn with_global_k(mut self, global_k: usize) -> Self {
        self.global_k = Some(global_k);
        self
    }

    /// Set the upper bound of the fused search (inclusive).
    pub fn with_global_max_k(mut self, max_k: usize) -> Self {
        self.global_max_k = max_k;
        self
    }

    /// Set the number of resampled runs per consensus matrix.
    pub fn with_resamples(mut self, resamples: usize) -> Self {
        self.resamples = resamples;
        self
    }

    /// Set the iteration budget of the fusion optimizer.
    pub fn with_fusion_iters(mut self, iters: usize) -> Self {
        self.fusion_iters = iters;
        self
    }

    /// Z-score each view's columns before consensus clustering.
    pub fn with_scaling(mut self, scale: bool) -> Self {
        self.scale = scale;
        self
    }

    /// Set the candidate-labeling strategy for the per-view search.
    pub fn with_kernel_method(mut self, method: KernelMethod) -> Self {
        self.kernel_method = method;
        self
    }

    /// Set the consensus base partitioners (length 1 to broadcast, or one
    /// per view).
    pub fn with_consensus_methods(mut self, methods: Vec<ConsensusMethod>) -> Self {
        self.consensus_methods = methods;
        self
    }

    /// Set the row distances (length 1 to broadcast, or one per view).
    pub fn with_consensus_distances(mut self, distances: Vec<ViewDistance>) -> Self {
        self.distances = distances;
        self
    }

    /// Also compute the widest within-cluster gap during selection.
    pub fn with_widest_gap(mut self, on: bool) -> Self {
        self.widest_gap = on;
        self
    }

    /// Also compute the Dunn index during selection.
    pub fn with_dunn(mut self, on: bool) -> Self {
        self.dunn = on;
        self
    }

    /// Also compute the averaged Dunn variant during selection.
    pub fn with_dunn2(mut self, on: bool) -> Self {
        self.dunn2 = on;
        self
    }

    /// Set random seed for reproducibility.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Run the pipeline without progress reporting.
    pub fn run(&self, views: &[Array2<f64>]) -> Result<Integration> {
        self.run_with(views, &())
    }

    /// Run the pipeline, reporting checkpoints to `monitor`.
    pub fn run_with(&self, views: &[Array2<f64>], monitor: &dyn Monitor) -> Result<Integration> {
        // ---- Validation: fail before any clustering work happens. ----
        if views.is_empty() {
            return Err(Error::EmptyInput);
        }
        let n = views[0].nrows();
        if n == 0 {
            return Err(Error::EmptyInput);
        }
        for view in views {
            if view.nrows() != n {
                return Err(Error::DimensionMismatch {
                    expected: n,
                    found: view.nrows(),
                });
            }
        }

        let m = views.len();
        let methods = broadcast(&self.consensus_methods, m, "consensus_methods")?;
        let distances = self.normalize_distances(&methods, m)?;
        let view_ks = match &self.view_k {
            None => None,
            Some(ks) => {
                let ks = broadcast(ks, m, "view_k")?;
                for &k in &ks {
                    check_cluster_count(k, n)?;
                }
                Some(ks)
            }
        };
        if let Some(k) = self.global_k {
            check_cluster_count(k, n)?;
        }

        // ---- View stage: one repaired kernel per view. ----
        let prepared: Vec<Array2<f64>> = if self.scale {
            views.iter().map(zscore_columns).collect()
        } else {
            views.to_vec()
        };

        let mut kernels = Vec::with_capacity(m);
        let mut chosen = Vec::with_capacity(m);

        for (idx, view) in prepared.iter().enumerate() {
            let mut consensus = ConsensusClustering::new()
                .with_resamples(self.resamples)
                .with_method(methods[idx])
                .with_distance(distances[idx]);
            if let Some(s) = self.seed {
                consensus = consensus.with_seed(s.wrapping_add(idx as u64));
            }

            let (k, kernel) = match &view_ks {
                Some(ks) => {
                    let matrix = consensus.run(view.view(), ks[idx])?;
                    (ks[idx], spectral_shift(&matrix)?)
                }
                None => self.search_view(view, idx, &consensus, monitor)?,
            };

            monitor.view_built(idx, k, &kernel);
            chosen.push(k);
            kernels.push(kernel);
        }

        let best_k = view_ks.is_none().then_some(chosen);

        // ---- Fusion stage. ----
        let (fit, fused_kernel, global_k) = match self.global_k {
            Some(k) => {
                let (fit, fused) = self.fuse_at(&kernels, k)?;
                monitor.fusion_done(k, &fused);
                (fit, fused, None)
            }
            None => {
                let (k, fit, fused) = self.search_fusion(&kernels, monitor)?;
                monitor.fusion_done(k, &fused);
                (fit, fused, Some(k))
            }
        };

        Ok(Integration {
            kernels,
            weights: fit.weights,
            fused_kernel,
            labels: fit.labels,
            best_k,
            global_k,
        })
    }

    /// Unknown-k path for one view: score candidates in `[2, view_max_k]`
    /// and keep the winner's kernel.
    fn search_view(
        &self,
        view: &Array2<f64>,
        idx: usize,
        consensus: &ConsensusClustering,
        monitor: &dyn Monitor,
    ) -> Result<(usize, Array2<f64>)> {
        if self.view_max_k < 2 {
            return Err(Error::EmptyCandidateSet);
        }
        if self.view_max_k == 2 {
            log::warn!("view {idx}: only one legal candidate count, resolving to k = 2");
            let matrix = consensus.run(view.view(), 2)?;
            return Ok((2, spectral_shift(&matrix)?));
        }

        let mut candidates: BTreeMap<usize, (Array2<f64>, Vec<usize>)> = BTreeMap::new();
        for k in 2..=self.view_max_k {
            let matrix = consensus.run(view.view(), k)?;
            let kernel = spectral_shift(&matrix)?;
            let labels = self.derive_labels(&kernel, k, idx)?;
            candidates.insert(k, (kernel, labels));
        }

        let selection = self.selector().select(
            candidates
                .iter()
                .map(|(&k, (kernel, labels))| (k, kernel, labels.as_slice())),
        )?;
        emit_scores(monitor, Stage::View(idx), &selection);

        let best = selection.best_k();
        let (kernel, _) = candidates
            .remove(&best)
            .expect("selection only ranks supplied candidates");
        Ok((best, kernel))
    }

    /// Candidate labeling for a repaired kernel at count `k`.
    fn derive_labels(&self, kernel: &Array2<f64>, k: usize, idx: usize) -> Result<Vec<usize>> {
        match self.kernel_method {
            KernelMethod::KernelKMeans => {
                let mut kk = KernelKmeans::new(k);
                if let Some(s) = self.seed {
                    kk = kk.with_seed(s.wrapping_add((idx * 131 + k) as u64));
                }
                kk.fit(kernel.view())
            }
            KernelMethod::Hclust => {
                let dist = similarity_to_distance(kernel);
                HierarchicalClustering::new(k).fit(dist.view())
            }
            KernelMethod::Pam => {
                let dist = similarity_to_distance(kernel);
                Pam::new(k).fit(dist.view())
            }
        }
    }

    /// Fuse the kernel array at a fixed cluster count.
    fn fuse_at(&self, kernels: &[Array2<f64>], k: usize) -> Result<(LocalizedFit, Array2<f64>)> {
        let mut lmk = LocalizedKernelKmeans::new(k).with_max_iter(self.fusion_iters);
        if let Some(s) = self.seed {
            lmk = lmk.with_seed(s.wrapping_add(0x1000 + k as u64));
        }
        let fit = lmk.fit(kernels)?;
        let fused = combine(kernels, &fit.weights);
        Ok((fit, fused))
    }

    /// Unknown-k path for the fusion: score candidates in
    /// `[2, global_max_k]` and keep the winner's artifacts.
    fn search_fusion(
        &self,
        kernels: &[Array2<f64>],
        monitor: &dyn Monitor,
    ) -> Result<(usize, LocalizedFit, Array2<f64>)> {
        if self.global_max_k < 2 {
            return Err(Error::EmptyCandidateSet);
        }
        if self.global_max_k == 2 {
            log::warn!("fusion: only one legal candidate count, resolving to k = 2");
            let (fit, fused) = self.fuse_at(kernels, 2)?;
            return Ok((2, fit, fused));
        }

        let mut candidates: BTreeMap<usize, (LocalizedFit, Array2<f64>)> = BTreeMap::new();
        for k in 2..=self.global_max_k {
            let (fit, fused) = self.fuse_at(kernels, k)?;
            candidates.insert(k, (fit, fused));
        }

        let selection = self.selector().select(
            candidates
                .iter()
                .map(|(&k, (fit, fused))| (k, fused, fit.labels.as_slice())),
        )?;
        emit_scores(monitor, Stage::Fusion, &selection);

        let best = selection.best_k();
        let (fit, fused) = candidates
            .remove(&best)
            .expect("selection only ranks supplied candidates");
        Ok((best, fit, fused))
    }

    /// Distance vector normalization, including the mixed-method rule: a
    /// single distance broadcasts, otherwise one per view is required.
    fn normalize_distances(
        &self,
        methods: &[ConsensusMethod],
        m: usize,
    ) -> Result<Vec<ViewDistance>> {
        if self.distances.len() == 1 {
            return Ok(vec![self.distances[0]; m]);
        }
        if self.distances.len() == m {
            return Ok(self.distances.clone());
        }

        let uniform_hclust = methods.iter().all(|&mm| mm == ConsensusMethod::Hclust);
        let message = if !uniform_hclust {
            format!(
                "got {} distances for {m} views; with mixed clustering methods supply one distance per view",
                self.distances.len()
            )
        } else {
            format!("got {} distances for {m} views", self.distances.len())
        };
        Err(Error::InvalidParameter {
            name: "consensus_distances",
            message,
        })
    }

    fn selector(&self) -> ModelSelector {
        ModelSelector::new()
            .with_widest_gap(self.widest_gap)
            .with_dunn(self.dunn)
            .with_dunn2(self.dunn2)
    }
}

impl Default for Integrator {
    fn default() -> Self {
        Self::new()
    }
}

/// Broadcast a length-1 vector to M entries; pass length-M through.
fn broadcast<T: Clone>(values: &[T], m: usize, name: &'static str) -> Result<Vec<T>> {
    match values.len() {
        1 => Ok(vec![values[0].clone(); m]),
        len if len == m => Ok(values.to_vec()),
        len => Err(Error::InvalidParameter {
            name,
            message: format!("expected 1 or {m} entries, got {len}"),
        }),
    }
}

fn check_cluster_count(k: usize, n: usize) -> Result<()> {
    if k < 2 {
        return Err(Error::InvalidParameter {
            name: "cluster_count",
            message: format!("cluster count {k} below the minimum of 2"),
        });
    }
    if k > n {
        return Err(Error::InvalidClusterCount {
            requested: k,
            n_items: n,
        });
    }
    Ok(())
}

/// Z-score each column; near-constant columns are left centered only.
fn zscore_columns(view: &Array2<f64>) -> Array2<f64> {
    let mut out = view.clone();
    let n = out.nrows() as f64;
    for mut col in out.axis_iter_mut(Axis(1)) {
        let mean = col.sum() / n;
        col.mapv_inplace(|v| v - mean);
        let sd = (col.iter().map(|v| v * v).sum::<f64>() / (n - 1.0).max(1.0)).sqrt();
        if sd.abs() >= 1e-9 {
            col.mapv_inplace(|v| v / sd);
        }
    }
    out
}

fn emit_scores(monitor: &dyn Monitor, stage: Stage, selection: &Selection) {
    for (&k, scores) in &selection.scores {
        monitor.candidate_scored(stage, k, scores.silhouette);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_broadcast() {
        assert_eq!(broadcast(&[5], 3, "x").unwrap(), vec![5, 5, 5]);
        assert_eq!(broadcast(&[1, 2, 3], 3, "x").unwrap(), vec![1, 2, 3]);
        assert!(matches!(
            broadcast(&[1, 2], 3, "x"),
            Err(Error::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_kernel_method_parse() {
        assert_eq!("kkmeans".parse::<KernelMethod>().unwrap(), KernelMethod::KernelKMeans);
        assert_eq!("hclust".parse::<KernelMethod>().unwrap(), KernelMethod::Hclust);
        assert_eq!("pam".parse::<KernelMethod>().unwrap(), KernelMethod::Pam);
        assert!(matches!(
            "spectral".parse::<KernelMethod>(),
            Err(Error::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_zscore_columns() {
        let view = array![[1.0, 5.0], [2.0, 5.0], [3.0, 5.0]];
        let scaled = zscore_columns(&view);

        // First column: mean 0, unit variance.
        let mean: f64 = scaled.column(0).sum() / 3.0;
        assert!(mean.abs() < 1e-12);
        let var: f64 = scaled.column(0).iter().map(|v| v * v).sum::<f64>() / 2.0;
        assert!((var - 1.0).abs() < 1e-12);

        // Constant column: centered, not blown up.
        assert!(scaled.column(1).iter().all(|v| v.abs() < 1e-12));
    }

    #[test]
    fn test_cluster_count_bounds() {
        assert!(check_cluster_count(2, 10).is_ok());
        assert!(matches!(
            check_cluster_count(1, 10),
            Err(Error::InvalidParameter { .. })
        ));
        assert!(matches!(
            check_cluster_count(11, 10),
            Err(Error::InvalidClusterCount { .. })
        ));
    }

    #[test]
    fn test_mixed_method_distance_rule() {
        let integrator = Integrator::new()
            .with_consensus_methods(vec![ConsensusMethod::Hclust, ConsensusMethod::KMeans])
            .with_consensus_distances(vec![ViewDistance::Euclidean, ViewDistance::Pearson]);
        // Two distances for two views: fine.
        assert!(integrator
            .normalize_distances(
                &[ConsensusMethod::Hclust, ConsensusMethod::KMeans],
                2
            )
            .is_ok());

        // Two distances for three mixed-method views: rejected.
        let result = integrator.normalize_distances(
            &[
                ConsensusMethod::Hclust,
                ConsensusMethod::KMeans,
                ConsensusMethod::KMeans,
            ],
            3,
        );
        assert!(matches!(result, Err(Error::InvalidParameter { .. })));
    }
}
