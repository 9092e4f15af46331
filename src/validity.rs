//! Internal cluster-validity indices and model selection.
//!
//! Choosing the number of clusters is done by scoring each candidate
//! labeling against the similarity matrix that produced it, without any
//! ground truth.
//!
//! | Index | Range | Best | Notes |
//! |-------|-------|------|-------|
//! | [`silhouette`] | [-1, 1] | 1 | Primary; drives every selection |
//! | [`dunn`] | [0, ∞) | large | min separation / max diameter |
//! | [`dunn2`] | [0, ∞) | large | averaged variant |
//! | [`widest_gap`] | [0, ∞) | small | largest within-cluster MST edge |
//!
//! Only the silhouette (Rousseeuw 1987) ranks candidates; the others are
//! diagnostics computed on demand and carried along in the
//! [`Selection`]. When several candidate counts achieve the same
//! silhouette, the smallest count wins.
//!
//! Distances are derived from a similarity matrix as `d = 1 − s/s_max`,
//! which stays in [0, 1] even after a diagonal shift has pushed the
//! similarity scale above one.

use crate::error::{Error, Result};
use ndarray::{Array2, ArrayView2};
use std::collections::BTreeMap;

/// Validation indices for one candidate cluster count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidationScores {
    /// Mean silhouette width.
    pub silhouette: f64,
    /// Largest within-cluster gap, when requested.
    pub widest_gap: Option<f64>,
    /// Dunn index, when requested.
    pub dunn: Option<f64>,
    /// Averaged Dunn variant, when requested.
    pub dunn2: Option<f64>,
}

/// Ranked outcome of a model-selection pass.
#[derive(Debug, Clone)]
pub struct Selection {
    /// Candidate counts, best first; ties resolve to the smallest count.
    pub ranked: Vec<usize>,
    /// Scores per candidate count.
    pub scores: BTreeMap<usize, ValidationScores>,
}

impl Selection {
    /// The chosen cluster count.
    pub fn best_k(&self) -> usize {
        self.ranked[0]
    }
}

/// Scores candidate labelings and ranks their cluster counts.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelSelector {
    widest_gap: bool,
    dunn: bool,
    dunn2: bool,
}

impl ModelSelector {
    /// Selector computing only the silhouette.
    pub fn new() -> Self {
        Self::default()
    }

    /// Also compute the widest within-cluster gap.
    pub fn with_widest_gap(mut self, on: bool) -> Self {
        self.widest_gap = on;
        self
    }

    /// Also compute the Dunn index.
    pub fn with_dunn(mut self, on: bool) -> Self {
        self.dunn = on;
        self
    }

    /// Also compute the averaged Dunn variant.
    pub fn with_dunn2(mut self, on: bool) -> Self {
        self.dunn2 = on;
        self
    }

    /// Rank candidate counts by silhouette, best first.
    ///
    /// Each candidate is `(count, similarity matrix, labels)`. Exact score
    /// ties resolve to the smaller count regardless of input order. Fails
    /// with [`Error::EmptyCandidateSet`] when no candidates are supplied.
    pub fn select<'a, I>(&self, candidates: I) -> Result<Selection>
    where
        I: IntoIterator<Item = (usize, &'a Array2<f64>, &'a [usize])>,
    {
        let mut scores = BTreeMap::new();

        for (k, similarity, labels) in candidates {
            let dist = similarity_to_distance(similarity);
            let entry = ValidationScores {
                silhouette: silhouette(dist.view(), labels),
                widest_gap: self.widest_gap.then(|| widest_gap(dist.view(), labels)),
                dunn: self.dunn.then(|| dunn(dist.view(), labels)),
                dunn2: self.dunn2.then(|| dunn2(dist.view(), labels)),
            };
            scores.insert(k, entry);
        }

        if scores.is_empty() {
            return Err(Error::EmptyCandidateSet);
        }

        let mut ranked: Vec<usize> = scores.keys().copied().collect();
        ranked.sort_by(|&a, &b| {
            scores[&b]
                .silhouette
                .partial_cmp(&scores[&a].silhouette)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(&b))
        });

        Ok(Selection { ranked, scores })
    }
}

/// Turn a similarity matrix into a distance matrix: `d = 1 − s/s_max`,
/// symmetric, zero diagonal.
pub fn similarity_to_distance(similarity: &Array2<f64>) -> Array2<f64> {
    let n = similarity.nrows();
    let max = similarity.iter().cloned().fold(0.0_f64, f64::max);
    if max <= 0.0 {
        return Array2::zeros((n, n));
    }
    Array2::from_shape_fn((n, n), |(i, j)| {
        if i == j {
            0.0
        } else {
            1.0 - similarity[[i, j]] / max
        }
    })
}

/// Mean silhouette width of a labeling under a distance matrix.
///
/// For each observation, `a` is the mean distance to its own cluster and
/// `b` the smallest mean distance to another cluster; the silhouette is
/// `(b − a) / max(a, b)` (0 for singletons and when both terms vanish).
/// Returns 0 when fewer than two clusters are populated.
pub fn silhouette(dist: ArrayView2<'_, f64>, labels: &[usize]) -> f64 {
    let n = labels.len();
    if n == 0 {
        return 0.0;
    }
    let k = labels.iter().copied().max().unwrap_or(0) + 1;

    let mut counts = vec![0usize; k];
    for &l in labels {
        counts[l] += 1;
    }
    if counts.iter().filter(|&&c| c > 0).count() < 2 {
        return 0.0;
    }

    let mut total = 0.0;
    for i in 0..n {
        let own = labels[i];
        if counts[own] <= 1 {
            continue; // singleton: s(i) = 0
        }

        // Mean distance to every cluster in one pass.
        let mut sums = vec![0.0f64; k];
        for j in 0..n {
            if j != i {
                sums[labels[j]] += dist[[i, j]];
            }
        }

        let a = sums[own] / (counts[own] - 1) as f64;
        let mut b = f64::MAX;
        for c in 0..k {
            if c != own && counts[c] > 0 {
                b = b.min(sums[c] / counts[c] as f64);
            }
        }

        let denom = a.max(b);
        if denom > 0.0 {
            total += (b - a) / denom;
        }
    }

    total / n as f64
}

/// Dunn index: smallest between-cluster distance over largest cluster
/// diameter. Infinite when every cluster has zero diameter.
pub fn dunn(dist: ArrayView2<'_, f64>, labels: &[usize]) -> f64 {
    let n = labels.len();
    let mut min_between = f64::MAX;
    let mut max_diameter = 0.0f64;

    for i in 0..n {
        for j in (i + 1)..n {
            if labels[i] == labels[j] {
                max_diameter = max_diameter.max(dist[[i, j]]);
            } else {
                min_between = min_between.min(dist[[i, j]]);
            }
        }
    }

    if min_between == f64::MAX {
        return 0.0;
    }
    if max_diameter <= 0.0 {
        return f64::INFINITY;
    }
    min_between / max_diameter
}

/// Averaged Dunn variant: smallest mean between-cluster distance over
/// largest mean within-cluster distance.
pub fn dunn2(dist: ArrayView2<'_, f64>, labels: &[usize]) -> f64 {
    let n = labels.len();
    let k = labels.iter().copied().max().unwrap_or(0) + 1;

    // Pairwise sums and counts per (cluster, cluster).
    let mut sums = vec![vec![0.0f64; k]; k];
    let mut counts = vec![vec![0usize; k]; k];
    for i in 0..n {
        for j in (i + 1)..n {
            let (a, b) = (labels[i], labels[j]);
            sums[a][b] += dist[[i, j]];
            counts[a][b] += 1;
            if a != b {
                sums[b][a] += dist[[i, j]];
                counts[b][a] += 1;
            }
        }
    }

    let mut min_between = f64::MAX;
    let mut max_within = 0.0f64;
    for a in 0..k {
        for b in 0..k {
            if counts[a][b] == 0 {
                continue;
            }
            let mean = sums[a][b] / counts[a][b] as f64;
            if a == b {
                max_within = max_within.max(mean);
            } else {
                min_between = min_between.min(mean);
            }
        }
    }

    if min_between == f64::MAX {
        return 0.0;
    }
    if max_within <= 0.0 {
        return f64::INFINITY;
    }
    min_between / max_within
}

/// Largest within-cluster gap: the maximum over clusters of the longest
/// edge in the cluster's minimum spanning tree.
pub fn widest_gap(dist: ArrayView2<'_, f64>, labels: &[usize]) -> f64 {
    let n = labels.len();
    let k = labels.iter().copied().max().unwrap_or(0) + 1;
    let mut widest = 0.0f64;

    for c in 0..k {
        let members: Vec<usize> = (0..n).filter(|&i| labels[i] == c).collect();
        if members.len() < 2 {
            continue;
        }

        // Prim's MST over the cluster, tracking the longest edge used.
        let mut in_tree = vec![false; members.len()];
        let mut best = vec![f64::MAX; members.len()];
        in_tree[0] = true;
        for (idx, &m) in members.iter().enumerate().skip(1) {
            best[idx] = dist[[members[0], m]];
        }

        for _ in 1..members.len() {
            let next = (0..members.len())
                .filter(|&i| !in_tree[i])
                .min_by(|&a, &b| {
                    best[a]
                        .partial_cmp(&best[b])
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .expect("unvisited member exists");

            widest = widest.max(best[next]);
            in_tree[next] = true;
            for (idx, &m) in members.iter().enumerate() {
                if !in_tree[idx] {
                    best[idx] = best[idx].min(dist[[members[next], m]]);
                }
            }
        }
    }

    widest
}
