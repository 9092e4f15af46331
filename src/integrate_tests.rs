#[cfg(test)]
mod tests {
    use crate::kernel::self_adjoint_eigenpairs;
    use crate::monitor::{Monitor, Stage};
    use crate::{Error, Integrator, KernelMethod};
    use ndarray::Array2;
    use rand::prelude::*;
    use std::cell::Cell;

    /// 10 observations in two well-separated groups of 5, with a small
    /// deterministic jitter so views are not degenerate copies.
    fn two_group_view(seed: u64) -> Array2<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut view = Array2::zeros((10, 3));
        for i in 0..10 {
            let center = if i < 5 { 0.0 } else { 10.0 };
            for j in 0..3 {
                view[[i, j]] = center + rng.random::<f64>() * 0.2;
            }
        }
        view
    }

    fn assert_two_groups(labels: &[usize]) {
        assert_eq!(labels.len(), 10);
        assert!(
            labels[..5].iter().all(|&l| l == labels[0]),
            "first group split: {labels:?}"
        );
        assert!(
            labels[5..].iter().all(|&l| l == labels[5]),
            "second group split: {labels:?}"
        );
        assert_ne!(labels[0], labels[5], "groups merged: {labels:?}");
    }

    fn min_eigenvalue(m: &Array2<f64>) -> f64 {
        let (evs, _) = self_adjoint_eigenpairs(m.view()).unwrap();
        evs.into_iter().fold(f64::MAX, f64::min)
    }

    #[derive(Default)]
    struct Recording {
        candidates: Cell<usize>,
        views: Cell<usize>,
        fusions: Cell<usize>,
    }

    impl Monitor for Recording {
        fn candidate_scored(&self, _stage: Stage, _k: usize, _score: f64) {
            self.candidates.set(self.candidates.get() + 1);
        }

        fn view_built(&self, _view: usize, _k: usize, _kernel: &Array2<f64>) {
            self.views.set(self.views.get() + 1);
        }

        fn fusion_done(&self, _k: usize, _fused: &Array2<f64>) {
            self.fusions.set(self.fusions.get() + 1);
        }
    }

    #[test]
    fn test_explicit_counts_recover_groups() {
        // Both cluster counts fixed: no search, kernels and fused output
        // carry the planted two-group structure.
        let views = vec![two_group_view(1), two_group_view(2)];

        let result = Integrator::new()
            .with_view_k(vec![2])
            .with_global_k(2)
            .with_resamples(30)
            .with_seed(42)
            .run(&views)
            .unwrap();

        assert_two_groups(&result.labels);

        // Counts were supplied, so no search results are reported.
        assert_eq!(result.best_k, None);
        assert_eq!(result.global_k, None);

        // Weight rows: one nonnegative entry per view.
        assert_eq!(result.weights.nrows(), 10);
        assert_eq!(result.weights.ncols(), 2);
        assert!(result.weights.iter().all(|&w| w >= 0.0));

        // Fused kernel: 10x10 and symmetric.
        assert_eq!(result.fused_kernel.nrows(), 10);
        assert_eq!(result.fused_kernel.ncols(), 10);
        for i in 0..10 {
            for j in 0..10 {
                assert!(
                    (result.fused_kernel[[i, j]] - result.fused_kernel[[j, i]]).abs() < 1e-9
                );
            }
        }

        // Every repaired kernel is positive semi-definite.
        assert_eq!(result.kernels.len(), 2);
        for kernel in &result.kernels {
            assert!(min_eigenvalue(kernel) >= -1e-9);
        }
    }

    #[test]
    fn test_search_resolves_true_counts() {
        // Counts unset, searches bounded at 3: the planted structure has 2
        // groups, so both searches must land on 2.
        let views = vec![two_group_view(1), two_group_view(2)];

        let result = Integrator::new()
            .with_view_max_k(3)
            .with_global_max_k(3)
            .with_resamples(30)
            .with_seed(7)
            .run(&views)
            .unwrap();

        assert_eq!(result.best_k, Some(vec![2, 2]));
        assert_eq!(result.global_k, Some(2));
        assert_two_groups(&result.labels);
    }

    #[test]
    fn test_row_count_mismatch_fails_before_clustering() {
        let views = vec![
            two_group_view(1),
            two_group_view(2),
            two_group_view(3).slice_move(ndarray::s![..9, ..]),
        ];

        let recording = Recording::default();
        let result = Integrator::new()
            .with_resamples(30)
            .with_seed(5)
            .run_with(&views, &recording);

        assert_eq!(
            result.unwrap_err(),
            Error::DimensionMismatch {
                expected: 10,
                found: 9
            }
        );
        // Nothing was clustered: no view or candidate events fired.
        assert_eq!(recording.views.get(), 0);
        assert_eq!(recording.candidates.get(), 0);
    }

    #[test]
    fn test_unknown_strategy_tag_rejected() {
        // Strategy names normalize to a closed set of variants; anything
        // else dies at parse time, before a pipeline can be configured.
        let err = "ward-cut".parse::<KernelMethod>().unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidParameter {
                name: "kernel_method",
                ..
            }
        ));
    }

    #[test]
    fn test_misconfigured_method_vector_fails_before_clustering() {
        let views = vec![two_group_view(1), two_group_view(2), two_group_view(3)];

        let recording = Recording::default();
        let result = Integrator::new()
            .with_consensus_methods(vec![
                crate::ConsensusMethod::KMeans,
                crate::ConsensusMethod::Pam,
            ])
            .run_with(&views, &recording);

        assert!(matches!(result, Err(Error::InvalidParameter { .. })));
        assert_eq!(recording.views.get(), 0);
    }

    #[test]
    fn test_max_count_two_skips_search() {
        // A bound of exactly 2 leaves one legal count: it is taken directly
        // and the candidate loop never runs.
        let views = vec![two_group_view(1), two_group_view(2)];

        let recording = Recording::default();
        let result = Integrator::new()
            .with_view_max_k(2)
            .with_global_max_k(2)
            .with_resamples(30)
            .with_seed(11)
            .run_with(&views, &recording)
            .unwrap();

        assert_eq!(result.best_k, Some(vec![2, 2]));
        assert_eq!(result.global_k, Some(2));
        assert_eq!(recording.candidates.get(), 0);
        assert_eq!(recording.views.get(), 2);
        assert_eq!(recording.fusions.get(), 1);
    }

    #[test]
    fn test_max_count_below_two_is_empty_candidate_set() {
        let views = vec![two_group_view(1)];
        let result = Integrator::new()
            .with_view_max_k(1)
            .with_resamples(10)
            .run(&views);
        assert_eq!(result.unwrap_err(), Error::EmptyCandidateSet);
    }

    #[test]
    fn test_search_reports_candidate_scores() {
        let views = vec![two_group_view(1), two_group_view(2)];

        let recording = Recording::default();
        Integrator::new()
            .with_view_max_k(3)
            .with_global_max_k(3)
            .with_resamples(30)
            .with_seed(7)
            .run_with(&views, &recording)
            .unwrap();

        // Two candidates per view plus two fusion candidates.
        assert_eq!(recording.candidates.get(), 6);
        assert_eq!(recording.views.get(), 2);
        assert_eq!(recording.fusions.get(), 1);
    }

    #[test]
    fn test_distance_based_strategies_agree() {
        // The three candidate-labeling strategies see the same block-like
        // kernels and should all recover the planted counts.
        let views = vec![two_group_view(1), two_group_view(2)];

        for method in [KernelMethod::Hclust, KernelMethod::Pam] {
            let result = Integrator::new()
                .with_view_max_k(3)
                .with_global_k(2)
                .with_kernel_method(method)
                .with_resamples(30)
                .with_seed(13)
                .run(&views)
                .unwrap();

            assert_eq!(result.best_k, Some(vec![2, 2]), "method {method:?}");
            assert_two_groups(&result.labels);
        }
    }

    #[test]
    fn test_scaling_keeps_structure() {
        // Column z-scoring rescales features but not the group structure.
        let views = vec![two_group_view(1), two_group_view(2)];

        let result = Integrator::new()
            .with_view_k(vec![2])
            .with_global_k(2)
            .with_scaling(true)
            .with_resamples(30)
            .with_seed(42)
            .run(&views)
            .unwrap();

        assert_two_groups(&result.labels);
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let views = vec![two_group_view(1), two_group_view(2)];
        let build = || {
            Integrator::new()
                .with_view_max_k(3)
                .with_global_max_k(3)
                .with_resamples(20)
                .with_seed(99)
                .run(&views)
                .unwrap()
        };

        let a = build();
        let b = build();
        assert_eq!(a.labels, b.labels);
        assert_eq!(a.best_k, b.best_k);
        assert_eq!(a.global_k, b.global_k);
        assert_eq!(a.weights, b.weights);
    }
}
