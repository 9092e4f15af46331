//! Spectral shift: repair a similarity matrix into a valid kernel.
//!
//! A Gram (kernel) matrix must be positive semi-definite. Consensus
//! matrices usually are close to PSD but can carry small negative
//! eigenvalues from resampling noise. The repair adds the magnitude of the
//! most negative eigenvalue to the diagonal:
//!
//! ```text
//! K' = K + |λ_min| · I     (when λ_min < 0)
//! ```
//!
//! This leaves the eigenvectors untouched, shifts every eigenvalue up by
//! the same constant, and preserves all off-diagonal structure. A matrix
//! that is already PSD is returned unchanged, which makes the operation
//! idempotent.

use super::{check_symmetric, self_adjoint_eigenpairs};
use crate::error::Result;
use ndarray::Array2;

/// Relative tolerance below which an eigenvalue counts as nonnegative.
const PSD_TOL: f64 = 1e-9;

/// Shift the spectrum of a symmetric matrix so it is positive semi-definite.
///
/// Fails with a shape error when the input is not square or not symmetric.
pub fn spectral_shift(matrix: &Array2<f64>) -> Result<Array2<f64>> {
    check_symmetric(matrix.view(), 1e-8)?;

    let (eigenvalues, _) = self_adjoint_eigenpairs(matrix.view())?;

    let min_ev = eigenvalues.iter().cloned().fold(f64::MAX, f64::min);
    let scale = eigenvalues
        .iter()
        .map(|v| v.abs())
        .fold(0.0_f64, f64::max)
        .max(1.0);

    if min_ev >= -PSD_TOL * scale {
        return Ok(matrix.clone());
    }

    let n = matrix.nrows();
    let mut shifted = matrix.clone();
    for i in 0..n {
        shifted[[i, i]] += -min_ev;
    }
    Ok(shifted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use ndarray::array;

    fn min_eigenvalue(m: &Array2<f64>) -> f64 {
        let (evs, _) = self_adjoint_eigenpairs(m.view()).unwrap();
        evs.into_iter().fold(f64::MAX, f64::min)
    }

    #[test]
    fn test_psd_input_unchanged() {
        // Identity is PSD: the shift must be a no-op, bit for bit.
        let eye = Array2::<f64>::eye(4);
        let out = spectral_shift(&eye).unwrap();
        assert_eq!(out, eye);
    }

    #[test]
    fn test_indefinite_matrix_repaired() {
        // Symmetric with a negative eigenvalue (eigenvalues 3 and -1).
        let m = array![[1.0, 2.0], [2.0, 1.0]];
        let out = spectral_shift(&m).unwrap();

        assert!(min_eigenvalue(&out) >= -1e-9);
        // Off-diagonal structure preserved.
        assert!((out[[0, 1]] - 2.0).abs() < 1e-12);
        assert!((out[[1, 0]] - 2.0).abs() < 1e-12);
        // Diagonal raised by |λ_min| = 1.
        assert!((out[[0, 0]] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_idempotent() {
        // Once repaired, a second shift is a no-op.
        let m = array![[1.0, 2.0], [2.0, 1.0]];
        let once = spectral_shift(&m).unwrap();
        let twice = spectral_shift(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_rectangular_rejected() {
        let m = Array2::<f64>::zeros((2, 3));
        assert!(matches!(
            spectral_shift(&m),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_asymmetric_rejected() {
        let m = array![[1.0, 0.5], [0.0, 1.0]];
        assert!(matches!(
            spectral_shift(&m),
            Err(Error::ShapeMismatch { .. })
        ));
    }
}
