//! Flattened representations of density matrices.
//!
//! Both representations flatten an `n x n` matrix into a vector of length
//! `n^2`. The complex representation stores the matrix row-major; the real
//! representation stores each independent real degree of freedom once:
//! populations `rho_ii` at `i n + i`, and for `i < j` the real part of
//! `rho_ij` at `i n + j` and its imaginary part at `j n + i`.

use ndarray as nd;
use ndarray_linalg::Scalar;
use num_complex::Complex64 as C64;
use serde::{ Deserialize, Serialize };

/// Tag selecting a density-matrix representation.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Representation {
    /// `n^2` complex numbers.
    #[default]
    Complex,
    /// `n^2` real numbers; Hermitian symmetry is implicit.
    ReIm,
}

/// Conversion between density matrices and flat state vectors.
pub trait DensityRepr {
    /// Element type of the flat vector.
    type Elem: Scalar<Real = f64>;

    /// Flatten `rho` into a vector of length `n^2`.
    fn flatten<S>(rho: &nd::ArrayBase<S, nd::Ix2>) -> nd::Array1<Self::Elem>
    where S: nd::Data<Elem = C64>;

    /// Rebuild an `n x n` matrix from a flat vector of length `n^2`.
    fn unflatten<S>(y: &nd::ArrayBase<S, nd::Ix1>, n: usize) -> nd::Array2<C64>
    where S: nd::Data<Elem = Self::Elem>;
}

/// Row-major complex flattening.
#[derive(Copy, Clone, Debug)]
pub struct ComplexRepr;

impl DensityRepr for ComplexRepr {
    type Elem = C64;

    fn flatten<S>(rho: &nd::ArrayBase<S, nd::Ix2>) -> nd::Array1<C64>
    where S: nd::Data<Elem = C64>
    {
        rho.iter().copied().collect()
    }

    fn unflatten<S>(y: &nd::ArrayBase<S, nd::Ix1>, n: usize) -> nd::Array2<C64>
    where S: nd::Data<Elem = C64>
    {
        nd::Array2::from_shape_fn((n, n), |(i, j)| y[i * n + j])
    }
}

/// Real flattening of a Hermitian matrix.
///
/// Only the upper triangle of the input is read.
#[derive(Copy, Clone, Debug)]
pub struct ReImRepr;

impl DensityRepr for ReImRepr {
    type Elem = f64;

    fn flatten<S>(rho: &nd::ArrayBase<S, nd::Ix2>) -> nd::Array1<f64>
    where S: nd::Data<Elem = C64>
    {
        let n = rho.nrows();
        let mut y: nd::Array1<f64> = nd::Array1::zeros(n * n);
        for i in 0..n {
            y[i * n + i] = rho[[i, i]].re;
            for j in i + 1..n {
                y[i * n + j] = rho[[i, j]].re;
                y[j * n + i] = rho[[i, j]].im;
            }
        }
        y
    }

    fn unflatten<S>(y: &nd::ArrayBase<S, nd::Ix1>, n: usize) -> nd::Array2<C64>
    where S: nd::Data<Elem = f64>
    {
        nd::Array2::from_shape_fn((n, n), |(i, j)| {
            match i.cmp(&j) {
                std::cmp::Ordering::Equal => C64::from(y[i * n + i]),
                std::cmp::Ordering::Less
                    => C64::new(y[i * n + j], y[j * n + i]),
                std::cmp::Ordering::Greater
                    => C64::new(y[j * n + i], -y[i * n + j]),
            }
        })
    }
}

/// A flat density vector supplied by the caller.
#[derive(Clone, Debug, PartialEq)]
pub enum FlatDensity {
    Complex(nd::Array1<C64>),
    Real(nd::Array1<f64>),
}

impl FlatDensity {
    pub fn len(&self) -> usize {
        match self {
            Self::Complex(y) => y.len(),
            Self::Real(y) => y.len(),
        }
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl From<nd::Array1<C64>> for FlatDensity {
    fn from(y: nd::Array1<C64>) -> Self { Self::Complex(y) }
}

impl From<nd::Array1<f64>> for FlatDensity {
    fn from(y: nd::Array1<f64>) -> Self { Self::Real(y) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> nd::Array2<C64> {
        nd::array![
            [C64::new(0.5, 0.0), C64::new(0.1, 0.2), C64::new(0.0, -0.3)],
            [C64::new(0.1, -0.2), C64::new(0.3, 0.0), C64::new(0.05, 0.0)],
            [C64::new(0.0, 0.3), C64::new(0.05, 0.0), C64::new(0.2, 0.0)],
        ]
    }

    #[test]
    fn re_im_layout() {
        let y = ReImRepr::flatten(&sample());
        assert_eq!(y.len(), 9);
        assert_eq!(y[0], 0.5);
        assert_eq!(y[1], 0.1);
        assert_eq!(y[3], 0.2);
        assert_eq!(y[2], 0.0);
        assert_eq!(y[6], -0.3);
        assert_eq!(ReImRepr::unflatten(&y, 3), sample());
    }

    #[test]
    fn complex_layout() {
        let rho = sample();
        let y = ComplexRepr::flatten(&rho);
        assert_eq!(y[1], rho[[0, 1]]);
        assert_eq!(y[3], rho[[1, 0]]);
        assert_eq!(ComplexRepr::unflatten(&y, 3), rho);
    }

    #[test]
    fn representation_names() {
        #[derive(Deserialize)]
        struct Wrap { r: Representation }
        let w: Wrap = toml::from_str("r = \"re_im\"").unwrap();
        assert_eq!(w.r, Representation::ReIm);
        let w: Wrap = toml::from_str("r = \"complex\"").unwrap();
        assert_eq!(w.r, Representation::Complex);
    }
}
