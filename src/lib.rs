//! # plait
//!
//! Multi-view integrative clustering: M heterogeneous datasets (views)
//! describing the same N observations are each summarized into a consensus
//! kernel, and the kernels are fused into a single joint clustering with
//! per-observation view weights.
//!
//! The pipeline ([`Integrator`]) runs in two stages:
//!
//! 1. **Per view**: resampled consensus clustering ([`ConsensusClustering`])
//!    turns the view into an N×N co-clustering frequency matrix, which a
//!    spectral shift ([`spectral_shift`]) repairs into a positive
//!    semi-definite kernel.
//! 2. **Fusion**: localized multiple kernel k-means
//!    ([`LocalizedKernelKmeans`]) jointly clusters the kernels and learns an
//!    N×M weight matrix, so each observation can lean on the views that
//!    describe it best.
//!
//! Both stages can search their cluster count over a bounded range, scored
//! by silhouette ([`ModelSelector`]); ties go to the smallest count.
//!
//! ```no_run
//! use ndarray::Array2;
//! use plait::Integrator;
//!
//! let views: Vec<Array2<f64>> = load_views();
//!
//! let result = Integrator::new()
//!     .with_view_max_k(6)
//!     .with_global_max_k(6)
//!     .with_seed(42)
//!     .run(&views)?;
//!
//! println!("chosen counts per view: {:?}", result.best_k);
//! println!("fused count: {:?}", result.global_k);
//! println!("labels: {:?}", result.labels);
//! # fn load_views() -> Vec<Array2<f64>> { vec![] }
//! # Ok::<(), plait::Error>(())
//! ```

pub mod cluster;
pub mod consensus;
/// Error types used across `plait`.
pub mod error;
pub mod integrate;
pub mod kernel;
pub mod monitor;
pub mod validity;

#[cfg(test)]
mod integrate_tests;

pub use cluster::{Dendrogram, HierarchicalClustering, Kmeans, Linkage, Pam};
pub use consensus::{pairwise_distance, ConsensusClustering, ConsensusMethod, ViewDistance};
pub use error::{Error, Result};
pub use integrate::{Integration, Integrator, KernelMethod};
pub use kernel::{combine, spectral_shift, KernelKmeans, LocalizedFit, LocalizedKernelKmeans};
pub use monitor::{Monitor, Stage};
pub use validity::{
    dunn, dunn2, silhouette, similarity_to_distance, widest_gap, ModelSelector, Selection,
    ValidationScores,
};
