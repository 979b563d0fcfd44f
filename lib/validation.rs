//! Checks on the physical invariants of density matrices and population
//! vectors.
//!
//! These are never enforced during integration. The engines log a warning when
//! a tolerance is exceeded and expose the same checks on their solutions.

use ndarray as nd;
use ndarray_linalg::{ self as la, EigValsh };
use num_complex::Complex64 as C64;
use crate::error::{ InvariantError, Result };

/// Real part of `Tr(rho)`.
pub fn trace<S>(rho: &nd::ArrayBase<S, nd::Ix2>) -> f64
where S: nd::Data<Elem = C64>
{
    rho.diag().iter().map(|r| r.re).sum()
}

/// Purity `Tr(rho^2)`.
pub fn purity<S>(rho: &nd::ArrayBase<S, nd::Ix2>) -> f64
where S: nd::Data<Elem = C64>
{
    // Tr(rho rho) = sum_ij rho_ij rho_ji
    rho.indexed_iter()
        .map(|((i, j), r)| (*r * rho[[j, i]]).re)
        .sum()
}

/// Maximum element of `|rho - rho^dag|`.
pub fn hermiticity_error<S>(rho: &nd::ArrayBase<S, nd::Ix2>) -> f64
where S: nd::Data<Elem = C64>
{
    rho.indexed_iter()
        .map(|((i, j), r)| (*r - rho[[j, i]].conj()).norm())
        .fold(0.0, f64::max)
}

/// Smallest eigenvalue of the Hermitian part of `rho`.
pub fn min_eigenvalue<S>(rho: &nd::ArrayBase<S, nd::Ix2>) -> Result<f64>
where S: nd::Data<Elem = C64>
{
    let herm: nd::Array2<C64>
        = (rho.to_owned() + rho.t().mapv(|r| r.conj())) * C64::from(0.5);
    let evals = herm.eigvalsh(la::UPLO::Lower)?;
    Ok(evals.iter().copied().fold(f64::INFINITY, f64::min))
}

/// Summary of the invariant quantities of a single density matrix.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DensityReport {
    pub trace: f64,
    pub purity: f64,
    pub hermiticity_error: f64,
    pub min_eigenvalue: f64,
}

impl DensityReport {
    pub fn new<S>(rho: &nd::ArrayBase<S, nd::Ix2>) -> Result<Self>
    where S: nd::Data<Elem = C64>
    {
        Ok(Self {
            trace: trace(rho),
            purity: purity(rho),
            hermiticity_error: hermiticity_error(rho),
            min_eigenvalue: min_eigenvalue(rho)?,
        })
    }

    /// Compare against a reference trace, reporting the first violation.
    ///
    /// `index` labels the time index in the returned error.
    pub fn check(&self, index: usize, trace0: f64, tol: f64)
        -> std::result::Result<(), InvariantError>
    {
        let drift = (self.trace - trace0).abs();
        if drift > tol {
            return Err(InvariantError::TraceDrift { index, drift, tol });
        }
        if self.hermiticity_error > tol {
            return Err(InvariantError::NonHermitian {
                index, err: self.hermiticity_error, tol });
        }
        if self.min_eigenvalue < -tol {
            return Err(InvariantError::NegativeEigenvalue {
                index, min: self.min_eigenvalue, tol });
        }
        Ok(())
    }
}

/// Check a series of density matrices (time along the last axis) against the
/// trace of the first.
pub fn check_density_series(rho: &nd::Array3<C64>, tol: f64) -> Result<()> {
    let mut trace0: Option<f64> = None;
    for (k, rho_k) in rho.axis_iter(nd::Axis(2)).enumerate() {
        let report = DensityReport::new(&rho_k)?;
        let tr0 = *trace0.get_or_insert(report.trace);
        report.check(k, tr0, tol)?;
    }
    Ok(())
}

/// Maximum deviation of the column sums of `N` (time along the last axis)
/// from the first column sum, and the index where it occurs.
pub fn population_drift(N: &nd::Array2<f64>) -> (usize, f64) {
    let sums = N.sum_axis(nd::Axis(0));
    let total0 = sums.first().copied().unwrap_or(0.0);
    sums.iter().enumerate()
        .map(|(k, s)| (k, (s - total0).abs()))
        .fold((0, 0.0), |acc, x| if x.1 > acc.1 { x } else { acc })
}

/// Fail if total population drifts by more than `tol`.
pub fn check_populations(N: &nd::Array2<f64>, tol: f64)
    -> std::result::Result<(), InvariantError>
{
    let (index, drift) = population_drift(N);
    (drift <= tol)
        .then_some(())
        .ok_or(InvariantError::PopulationDrift { index, drift, tol })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn pure_plus() -> nd::Array2<C64> {
        nd::Array2::from_elem((2, 2), C64::from(0.5))
    }

    #[test]
    fn pure_state_report() {
        let rho = pure_plus();
        let report = DensityReport::new(&rho).unwrap();
        assert_abs_diff_eq!(report.trace, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(report.purity, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(report.hermiticity_error, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(report.min_eigenvalue, 0.0, epsilon = 1e-12);
        assert!(report.check(0, 1.0, 1e-9).is_ok());
    }

    #[test]
    fn detects_violations() {
        let mut rho = pure_plus();
        rho[[0, 1]] = C64::new(0.5, 0.1);
        assert_abs_diff_eq!(hermiticity_error(&rho), 0.2, epsilon = 1e-12);
        let report = DensityReport::new(&rho).unwrap();
        assert!(matches!(
            report.check(3, 1.0, 1e-6),
            Err(InvariantError::NonHermitian { index: 3, .. }),
        ));

        let neg = nd::Array2::from_diag(&nd::array![C64::from(1.2), C64::from(-0.2)]);
        let report = DensityReport::new(&neg).unwrap();
        assert!(matches!(
            report.check(0, 1.0, 1e-6),
            Err(InvariantError::NegativeEigenvalue { .. }),
        ));
        assert!(matches!(
            report.check(0, 0.5, 1e-6),
            Err(InvariantError::TraceDrift { .. }),
        ));
    }

    #[test]
    fn population_checks() {
        let N = nd::array![[1.0, 0.5, 0.2], [0.0, 0.5, 0.9]];
        let (index, drift) = population_drift(&N);
        assert_eq!(index, 2);
        assert_abs_diff_eq!(drift, 0.1, epsilon = 1e-12);
        assert!(check_populations(&N, 0.2).is_ok());
        assert!(check_populations(&N, 0.01).is_err());
    }

    #[test]
    fn series_check() {
        let mut series: nd::Array3<C64> = nd::Array3::zeros((2, 2, 3));
        for k in 0..3 {
            series.slice_mut(nd::s![.., .., k]).assign(&pure_plus());
        }
        assert!(check_density_series(&series, 1e-9).is_ok());
        series[[0, 0, 2]] = C64::from(0.7);
        assert!(check_density_series(&series, 1e-9).is_err());
    }
}
