//! Progress observation hooks.
//!
//! The pipeline in [`crate::integrate`] can run for a long time (consensus
//! resampling, repeated kernel fusion). Callers that want progress feedback
//! or diagnostic rendering implement [`Monitor`] and pass it to
//! [`Integrator::run_with`](crate::Integrator::run_with); the pipeline calls
//! it at well-defined checkpoints and never depends on it for correctness.
//! The kernel handed to each checkpoint is the one the stage just produced,
//! so a monitor can render it (heatmaps and the like live outside this
//! crate).
//!
//! The unit type is the no-op monitor, so `run()` is just
//! `run_with(views, &())`.

use ndarray::Array2;

/// Which stage of the pipeline an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Building the consensus kernel for view `i`.
    View(usize),
    /// Fusing the per-view kernels.
    Fusion,
}

/// Observer for pipeline checkpoints.
///
/// All methods default to no-ops; implement only the ones you care about.
pub trait Monitor {
    /// A candidate cluster count was scored during a search.
    fn candidate_scored(&self, _stage: Stage, _k: usize, _score: f64) {}

    /// The repaired consensus kernel for a view is ready.
    fn view_built(&self, _view: usize, _k: usize, _kernel: &Array2<f64>) {}

    /// The fused clustering is ready.
    fn fusion_done(&self, _k: usize, _fused: &Array2<f64>) {}
}

impl Monitor for () {}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter(std::cell::Cell<usize>);

    impl Monitor for Counter {
        fn candidate_scored(&self, _stage: Stage, _k: usize, _score: f64) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn test_default_methods_are_noops() {
        let m = ();
        let kernel = Array2::<f64>::eye(2);
        m.candidate_scored(Stage::Fusion, 2, 0.5);
        m.view_built(0, 2, &kernel);
        m.fusion_done(2, &kernel);
    }

    #[test]
    fn test_custom_monitor_receives_events() {
        let c = Counter(std::cell::Cell::new(0));
        c.candidate_scored(Stage::View(0), 2, 1.0);
        c.candidate_scored(Stage::View(0), 3, 0.5);
        assert_eq!(c.0.get(), 2);
    }
}
