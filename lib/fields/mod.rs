//! Classical light and magnetic fields driving the atom, plus the vector
//! algebra needed to express them in the spherical basis.
//!
//! Spherical unit vectors follow
//! ```text
//! e_{+1} = -(x + i y) / sqrt(2)
//! e_0    = z
//! e_{-1} = (x - i y) / sqrt(2)
//! ```
//! and a Cartesian vector `v` has spherical components `a_q = e_q^* . v`, so
//! that `v = sum_q a_q e_q`. The `q = +1` component of a light field drives
//! `Δm = +1` transitions.

use std::{ f64::consts::FRAC_1_SQRT_2, ops::{ Add, AddAssign, Mul } };
use num_complex::Complex64 as C64;
use num_traits::Zero;
use tracing::warn;
use crate::error::FieldError;

pub mod laser;
pub mod magnetic;

pub use laser::{ BeamSample, Intensity, LaserBeam, LaserBeams, LightField };
pub use magnetic::{ FnField, MagneticField, QuadrupoleField, UniformField };

/// A real Cartesian 3-vector.
pub type Vec3 = [f64; 3];

/// A complex Cartesian 3-vector.
pub type CVec3 = [C64; 3];

pub(crate) fn dot(a: &Vec3, b: &Vec3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

pub(crate) fn norm(a: &Vec3) -> f64 { dot(a, a).sqrt() }

pub(crate) fn add_scaled(a: &Vec3, b: &Vec3, s: f64) -> Vec3 {
    [a[0] + s * b[0], a[1] + s * b[1], a[2] + s * b[2]]
}

pub(crate) fn cross(a: &Vec3, b: &Vec3) -> Vec3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

/// Convert a complex Cartesian vector to spherical components
/// `[a_{-1}, a_0, a_{+1}]`.
pub fn cart_to_spherical(v: &CVec3) -> [C64; 3] {
    let i = C64::i();
    [
        (v[0] + i * v[1]) * FRAC_1_SQRT_2,
        v[2],
        -(v[0] - i * v[1]) * FRAC_1_SQRT_2,
    ]
}

/// Convert spherical components `[a_{-1}, a_0, a_{+1}]` to a complex Cartesian
/// vector.
pub fn spherical_to_cart(a: &[C64; 3]) -> CVec3 {
    let i = C64::i();
    [
        (a[0] - a[2]) * FRAC_1_SQRT_2,
        -i * (a[0] + a[2]) * FRAC_1_SQRT_2,
        a[1],
    ]
}

/// A complex vector stored by its spherical components `a_q`, `q = -1, 0, +1`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SphericalVector([C64; 3]);

impl SphericalVector {
    /// Create from spherical components ordered `[a_{-1}, a_0, a_{+1}]`.
    pub fn new(a: [C64; 3]) -> Self { Self(a) }

    pub fn zero() -> Self { Self([C64::zero(); 3]) }

    pub fn from_cartesian(v: &CVec3) -> Self { Self(cart_to_spherical(v)) }

    pub fn to_cartesian(&self) -> CVec3 { spherical_to_cart(&self.0) }

    /// Component `a_q`; `q` outside `-1..=1` gives zero.
    pub fn get(&self, q: i32) -> C64 {
        match q {
            -1 => self.0[0],
            0 => self.0[1],
            1 => self.0[2],
            _ => C64::zero(),
        }
    }

    pub fn components(&self) -> &[C64; 3] { &self.0 }

    pub fn norm_sqr(&self) -> f64 { self.0.iter().map(|a| a.norm_sqr()).sum() }

    pub fn norm(&self) -> f64 { self.norm_sqr().sqrt() }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|a| a.re.is_finite() && a.im.is_finite())
    }
}

impl Add for SphericalVector {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self([self.0[0] + rhs.0[0], self.0[1] + rhs.0[1], self.0[2] + rhs.0[2]])
    }
}

impl AddAssign for SphericalVector {
    fn add_assign(&mut self, rhs: Self) { *self = *self + rhs; }
}

impl Mul<C64> for SphericalVector {
    type Output = Self;

    fn mul(self, s: C64) -> Self {
        Self([self.0[0] * s, self.0[1] * s, self.0[2] * s])
    }
}

impl Mul<f64> for SphericalVector {
    type Output = Self;

    fn mul(self, s: f64) -> Self {
        Self([self.0[0] * s, self.0[1] * s, self.0[2] * s])
    }
}

/// A normalized light polarization.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Polarization(SphericalVector);

impl Polarization {
    /// Circular polarization of the given helicity (`+1` or `-1`) for a beam
    /// propagating along `kvec`.
    ///
    /// Helicity is defined relative to `kvec`, so a `+1` beam along `+z` is
    /// pure `σ+` while a `+1` beam along `-z` drives `Δm = -1`.
    pub fn circular(helicity: i32, kvec: &Vec3) -> Result<Self, FieldError> {
        if helicity.abs() != 1 {
            return Err(FieldError::BadHelicity(helicity));
        }
        let (e1, e2) = transverse_frame(kvec)?;
        let h = f64::from(helicity);
        let i = C64::i();
        let eps: CVec3 = [0, 1, 2].map(|k| {
            -h * (C64::from(e1[k]) + h * i * e2[k]) * FRAC_1_SQRT_2
        });
        Self::from_cartesian(&eps)
    }

    /// Linear polarization along a real axis.
    pub fn linear(axis: &Vec3) -> Result<Self, FieldError> {
        Self::from_cartesian(&axis.map(C64::from))
    }

    /// Normalize an arbitrary complex Cartesian polarization vector.
    pub fn from_cartesian(eps: &CVec3) -> Result<Self, FieldError> {
        Self::from_spherical(SphericalVector::from_cartesian(eps))
    }

    /// Normalize an arbitrary spherical polarization vector.
    pub fn from_spherical(a: SphericalVector) -> Result<Self, FieldError> {
        let n = a.norm();
        (a.is_finite() && n > 0.0 && n.is_finite())
            .then(|| Self(a * n.recip()))
            .ok_or(FieldError::ZeroPolarization)
    }

    /// Fail if `self` has a longitudinal component along `kvec`.
    pub fn check_transverse(&self, kvec: &Vec3) -> Result<(), FieldError> {
        let k = norm(kvec);
        if !(k > 0.0 && k.is_finite()) { return Err(FieldError::ZeroWavevector); }
        let eps = self.0.to_cartesian();
        let along: C64
            = eps.iter().zip(kvec).map(|(e, kk)| *e * (*kk / k)).sum();
        let err = along.norm();
        if err > 1e-6 { return Err(FieldError::NotTransverse(err)); }
        if err > 1e-12 {
            warn!(longitudinal = err, "polarization is nearly but not exactly transverse");
        }
        Ok(())
    }

    pub fn spherical(&self) -> &SphericalVector { &self.0 }

    pub fn cartesian(&self) -> CVec3 { self.0.to_cartesian() }
}

// orthonormal frame (e1, e2) such that (e1, e2, k) is right-handed
fn transverse_frame(kvec: &Vec3) -> Result<(Vec3, Vec3), FieldError> {
    let k = norm(kvec);
    if !(k > 0.0 && k.is_finite()) { return Err(FieldError::ZeroWavevector); }
    let th = (kvec[2] / k).clamp(-1.0, 1.0).acos();
    let ph = kvec[1].atan2(kvec[0]);
    let e1 = [th.cos() * ph.cos(), th.cos() * ph.sin(), -th.sin()];
    let e2 = [-ph.sin(), ph.cos(), 0.0];
    Ok((e1, e2))
}
