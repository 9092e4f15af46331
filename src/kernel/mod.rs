//! Kernel construction, repair and fusion.
//!
//! Consensus matrices are similarities but not necessarily valid kernels:
//! resampling noise can push eigenvalues slightly negative. This module
//! repairs them ([`spectral_shift`]), clusters a single kernel
//! ([`KernelKmeans`]) and fuses several kernels with per-observation
//! weights ([`LocalizedKernelKmeans`]).

mod kkmeans;
mod lmkkmeans;
mod shift;

pub use kkmeans::KernelKmeans;
pub use lmkkmeans::{combine, LocalizedFit, LocalizedKernelKmeans};
pub use shift::spectral_shift;

use crate::error::{Error, Result};
use faer::{Mat, Side};
use ndarray::{Array2, ArrayView2};

/// Eigendecomposition of a symmetric matrix.
///
/// Returns `(eigenvalues, eigenvectors)` with eigenvectors as columns, in
/// the solver's order (callers sort as needed). The `faer` self-adjoint
/// path reads only the lower triangle, so a symmetry check must already
/// have happened.
pub(crate) fn self_adjoint_eigenpairs(mat: ArrayView2<'_, f64>) -> Result<(Vec<f64>, Array2<f64>)> {
    let n = mat.nrows();
    let m = Mat::from_fn(n, n, |i, j| mat[[i, j]]);

    let eig = m
        .as_ref()
        .self_adjoint_eigen(Side::Lower)
        .map_err(|e| Error::Other(format!("eigendecomposition failed: {e:?}")))?;

    let diag = eig.S();
    let mut eigenvalues = Vec::with_capacity(n);
    for idx in 0..diag.dim() {
        eigenvalues.push(diag[idx]);
    }

    let u = eig.U();
    let eigenvectors = Array2::from_shape_fn((n, n), |(i, j)| u[(i, j)]);

    Ok((eigenvalues, eigenvectors))
}

/// Precondition shared by every kernel consumer: square and symmetric.
pub(crate) fn check_symmetric(mat: ArrayView2<'_, f64>, tol: f64) -> Result<()> {
    let n = mat.nrows();
    if n == 0 {
        return Err(Error::EmptyInput);
    }
    if mat.ncols() != n {
        return Err(Error::ShapeMismatch {
            expected: format!("{n}x{n} square matrix"),
            actual: format!("{}x{}", n, mat.ncols()),
        });
    }
    for i in 0..n {
        for j in (i + 1)..n {
            if (mat[[i, j]] - mat[[j, i]]).abs() > tol {
                return Err(Error::ShapeMismatch {
                    expected: "symmetric matrix".to_string(),
                    actual: format!(
                        "entry ({i},{j})={} differs from ({j},{i})={}",
                        mat[[i, j]],
                        mat[[j, i]]
                    ),
                });
            }
        }
    }
    Ok(())
}
