//! Superoperators of the optical Bloch equations.
//!
//! Superoperators act on row-major flattened density matrices, so that
//! `vec(A rho B) = (A (x) B^T) vec(rho)`.

use ndarray::{ self as nd, linalg::kron };
use num_complex::Complex64 as C64;
use crate::hamiltonian::Hamiltonian;

// `A rho + sign * rho A`
fn product_sum<S>(A: &nd::Array2<C64>, rho: &nd::ArrayBase<S, nd::Ix2>, sign: f64)
    -> nd::Array2<C64>
where S: nd::Data<Elem = C64>
{
    let mut out = A.dot(rho);
    out.scaled_add(C64::from(sign), &rho.dot(A));
    out
}

/// `[H, rho]`, the coherent part of the evolution up to a factor `-i`.
pub fn commutator<S>(H: &nd::Array2<C64>, rho: &nd::ArrayBase<S, nd::Ix2>)
    -> nd::Array2<C64>
where S: nd::Data<Elem = C64>
{
    product_sum(H, rho, -1.0)
}

fn dagger(A: &nd::Array2<C64>) -> nd::Array2<C64> {
    A.t().mapv(|a| a.conj())
}

/// Collapse operators `C_q = sqrt(Gamma) sum_{g, e} d_q[g, e] |g><e|` over the
/// full basis, ordered `q = -1, 0, +1`.
pub fn collapse_operators(ham: &Hamiltonian) -> [nd::Array2<C64>; 3] {
    let ng = ham.n_ground();
    let n = ham.dim();
    let amp = ham.linewidth().sqrt();
    ham.dipole().components().clone()
        .map(|dq| {
            let mut C: nd::Array2<C64> = nd::Array2::zeros((n, n));
            for ((g, e), d) in dq.indexed_iter() {
                C[[g, ng + e]] = C64::from(amp * d);
            }
            C
        })
}

/// Dissipator `D[C](rho) = C rho C^dag - 1/2 {C^dag C, rho}` summed over all
/// collapse operators, applied directly to a matrix.
pub fn dissipator<S>(ops: &[nd::Array2<C64>], rho: &nd::ArrayBase<S, nd::Ix2>)
    -> nd::Array2<C64>
where S: nd::Data<Elem = C64>
{
    ops.iter()
        .fold(nd::Array2::zeros(rho.raw_dim()), |acc, C| {
            let Cd = dagger(C);
            let CdC = Cd.dot(C);
            acc + C.dot(rho).dot(&Cd) - product_sum(&CdC, rho, 1.0) * 0.5
        })
}

/// Superoperator form of [`dissipator`]:
/// `sum_C (C (x) C^* - 1/2 C^dag C (x) I - 1/2 I (x) (C^dag C)^T)`.
pub fn decay_superoperator(ops: &[nd::Array2<C64>], n: usize)
    -> nd::Array2<C64>
{
    let eye: nd::Array2<C64> = nd::Array2::eye(n);
    ops.iter()
        .fold(nd::Array2::zeros((n * n, n * n)), |acc, C| {
            let CdC = dagger(C).dot(C);
            acc
                + kron(C, &C.mapv(|c| c.conj()))
                - kron(&CdC, &eye) * 0.5
                - kron(&eye, &CdC.t()) * 0.5
        })
}

/// Superoperator form of `rho -> -i [H, rho]`.
pub fn coherent_superoperator(H: &nd::Array2<C64>) -> nd::Array2<C64> {
    let n = H.nrows();
    let eye: nd::Array2<C64> = nd::Array2::eye(n);
    (kron(H, &eye) - kron(&eye, &H.t())) * (-C64::i())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use crate::structure::Manifold;

    fn vec(A: &nd::Array2<C64>) -> nd::Array1<C64> { A.iter().copied().collect() }

    fn test_rho(n: usize) -> nd::Array2<C64> {
        let A = nd::Array2::from_shape_fn((n, n), |(i, j)| {
            C64::new((i + 2 * j) as f64 * 0.1, (i as f64 - j as f64) * 0.07)
        });
        let rho = A.dot(&dagger(&A));
        let tr: C64 = rho.diag().sum();
        rho / tr
    }

    fn hyperfine(fg: f64, fe: f64) -> Hamiltonian {
        Hamiltonian::bare_hyperfine(
            Manifold::new(fg).unwrap(),
            Manifold::new(fe).unwrap(),
        ).unwrap()
    }

    #[test]
    fn superoperator_matches_matrix_form() {
        let ham = hyperfine(1.0, 2.0);
        let n = ham.dim();
        let ops = collapse_operators(&ham);
        let D = decay_superoperator(&ops, n);
        let rho = test_rho(n);
        let direct = vec(&dissipator(&ops, &rho));
        let via_super = D.dot(&vec(&rho));
        for (a, b) in direct.iter().zip(&via_super) {
            assert_abs_diff_eq!((a - b).norm(), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn decay_rates() {
        let ham = hyperfine(0.0, 1.0);
        let n = ham.dim();
        let ops = collapse_operators(&ham);
        // start with all population in excited m = 0 plus an e-g coherence
        let mut rho: nd::Array2<C64> = nd::Array2::zeros((n, n));
        rho[[2, 2]] = C64::from(1.0);
        rho[[0, 2]] = C64::from(0.3);
        rho[[2, 0]] = C64::from(0.3);
        rho[[1, 3]] = C64::from(0.2);
        rho[[3, 1]] = C64::from(0.2);
        let drho = dissipator(&ops, &rho);
        assert_abs_diff_eq!(drho[[2, 2]].re, -1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(drho[[0, 0]].re, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(drho[[0, 2]].re, -0.15, epsilon = 1e-12);
        assert_abs_diff_eq!(drho[[1, 3]].re, -0.2, epsilon = 1e-12);
        // trace preserving
        assert_abs_diff_eq!(drho.diag().sum().norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn coherent_part() {
        let ham = hyperfine(0.0, 1.0);
        let H = ham.build(
            &crate::fields::SphericalVector::new(
                [C64::from(0.3), C64::new(0.0, 0.5), C64::from(-0.2)]),
            &[0.1, 0.0, 0.4],
        );
        let rho = test_rho(ham.dim());
        let direct = vec(&(commutator(&H, &rho) * (-C64::i())));
        let via_super = coherent_superoperator(&H).dot(&vec(&rho));
        for (a, b) in direct.iter().zip(&via_super) {
            assert_abs_diff_eq!((a - b).norm(), 0.0, epsilon = 1e-12);
        }
    }
}
