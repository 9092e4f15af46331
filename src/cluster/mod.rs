//! Single-view clustering primitives.
//!
//! These are the partitioners the consensus builder resamples over and the
//! fusion optimizer finishes with: Lloyd's k-means on raw observations,
//! agglomerative clustering over a precomputed distance matrix, and
//! partitioning around medoids (PAM) over the same.
//!
//! All three produce a flat `Vec<usize>` assignment with labels in `[0, k)`.
//! The distance-based pair (`HierarchicalClustering`, `Pam`) deliberately
//! takes a square distance matrix rather than points: upstream the
//! "observations" are rows of a similarity kernel, and the distances are
//! derived from it (see [`crate::validity::similarity_to_distance`]).

mod hierarchical;
mod kmeans;
mod pam;

pub use hierarchical::{Dendrogram, HierarchicalClustering, Linkage};
pub use kmeans::Kmeans;
pub use pam::Pam;
