//! Classical magnetic fields.

use std::{ fmt, rc::Rc };
use crate::error::FieldError;
use super::{ Vec3, add_scaled, dot, norm };

/// Magnetic-field collaborator: the instantaneous field vector at a position
/// and time.
pub trait MagneticField {
    fn field(&self, r: &Vec3, t: f64) -> Vec3;

    /// Return `true` if the field does not depend on time.
    fn is_static(&self) -> bool { false }
}

/// A spatially and temporally uniform field.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct UniformField(pub Vec3);

impl UniformField {
    pub fn new(B: Vec3) -> Result<Self, FieldError> {
        B.iter().try_for_each(|b| FieldError::check_finite("B", *b))?;
        Ok(Self(B))
    }

    /// Zero field.
    pub fn zero() -> Self { Self([0.0; 3]) }
}

impl MagneticField for UniformField {
    fn field(&self, _r: &Vec3, _t: f64) -> Vec3 { self.0 }

    fn is_static(&self) -> bool { true }
}

/// A linear quadrupole field `B = grad * (r_perp - 2 r_par)` about a node at
/// `centre`, with symmetry axis `axis`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct QuadrupoleField {
    gradient: f64,
    axis: Vec3,
    centre: Vec3,
}

impl QuadrupoleField {
    /// Create a quadrupole field centred on the origin.
    pub fn new(gradient: f64, axis: Vec3) -> Result<Self, FieldError> {
        FieldError::check_finite("gradient", gradient)?;
        let n = norm(&axis);
        if !(n > 0.0 && n.is_finite()) {
            return Err(FieldError::NonFinite("axis", n));
        }
        Ok(Self { gradient, axis: axis.map(|a| a / n), centre: [0.0; 3] })
    }

    /// Move the field node.
    pub fn with_centre(mut self, centre: Vec3) -> Self {
        self.centre = centre;
        self
    }
}

impl MagneticField for QuadrupoleField {
    fn field(&self, r: &Vec3, _t: f64) -> Vec3 {
        let d = add_scaled(r, &self.centre, -1.0);
        let par = dot(&d, &self.axis);
        let perp = add_scaled(&d, &self.axis, -par);
        add_scaled(&perp, &self.axis, -2.0 * par).map(|b| self.gradient * b)
    }

    fn is_static(&self) -> bool { true }
}

/// A field given by an arbitrary function of position and time.
#[derive(Clone)]
pub struct FnField<'a> {
    f: Rc<dyn Fn(&Vec3, f64) -> Vec3 + 'a>,
    is_static: bool,
}

impl<'a> fmt::Debug for FnField<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FnField {{ f: Rc<...>, is_static: {:?} }}", self.is_static)
    }
}

impl<'a> FnField<'a> {
    /// Wrap a possibly time-dependent field function.
    pub fn new<F>(f: F) -> Self
    where F: Fn(&Vec3, f64) -> Vec3 + 'a
    {
        Self { f: Rc::new(f), is_static: false }
    }

    /// Wrap a field function that the caller guarantees does not depend on
    /// time.
    pub fn new_static<F>(f: F) -> Self
    where F: Fn(&Vec3, f64) -> Vec3 + 'a
    {
        Self { f: Rc::new(f), is_static: true }
    }
}

impl<'a> MagneticField for FnField<'a> {
    fn field(&self, r: &Vec3, t: f64) -> Vec3 { (self.f)(r, t) }

    fn is_static(&self) -> bool { self.is_static }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn quadrupole_along_z() {
        let q = QuadrupoleField::new(2.0, [0.0, 0.0, 5.0]).unwrap();
        let b = q.field(&[1.0, -1.0, 0.5], 0.0);
        assert_abs_diff_eq!(b[0], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(b[1], -2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(b[2], -2.0, epsilon = 1e-12);
        assert_eq!(q.field(&[0.0; 3], 3.0), [0.0; 3]);
        let shifted = q.with_centre([0.0, 0.0, 1.0]);
        assert_abs_diff_eq!(shifted.field(&[0.0, 0.0, 1.0], 0.0)[2], 0.0, epsilon = 1e-12);
        assert!(QuadrupoleField::new(1.0, [0.0; 3]).is_err());
    }

    #[test]
    fn closure_fields() {
        let ramp = FnField::new(|_, t| [0.0, 0.0, t]);
        assert_eq!(ramp.field(&[0.0; 3], 2.0), [0.0, 0.0, 2.0]);
        assert!(!ramp.is_static());
        assert!(FnField::new_static(|r, _| *r).is_static());
        assert!(UniformField::new([f64::INFINITY, 0.0, 0.0]).is_err());
        assert!(UniformField::zero().is_static());
    }
}
