//! Laser beams as seen by a single atom.
//!
//! Each beam is a classical plane wave (optionally with a transverse intensity
//! profile) characterized by its wavevector, polarization, detuning from the
//! rotating-frame reference, saturation parameter, and a constant phase.

use std::{ fmt, rc::Rc };
use num_complex::Complex64 as C64;
use tracing::debug;
use crate::error::FieldError;
use super::{ Polarization, SphericalVector, Vec3, cross, dot, norm };

/// Per-beam quantities sampled at one position and time.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BeamSample {
    /// Wavevector, in units of the inverse wavelength scale.
    pub kvec: Vec3,
    /// Normalized spherical polarization components.
    pub pol: SphericalVector,
    /// Detuning of the beam from the rotating-frame reference.
    pub delta: f64,
    /// Local saturation parameter.
    pub beta: f64,
    /// Complex field phasor `sqrt(beta / 2) exp(i (k . r - delta t + phi))`.
    pub amplitude: C64,
}

impl BeamSample {
    /// Spherical components of this beam's electric field.
    pub fn field(&self) -> SphericalVector { self.pol * self.amplitude }
}

/// Light-field collaborator consumed by both evolution engines.
///
/// The optical Bloch equations use the coherent sum [`Self::electric_field`];
/// the rate equations use the per-beam samples from [`Self::beams_at`], adding
/// their rates incoherently.
pub trait LightField {
    /// Sample every beam at position `r` and time `t`.
    fn beams_at(&self, r: &Vec3, t: f64) -> Vec<BeamSample>;

    /// Coherent sum of all beam fields at `(r, t)`.
    fn electric_field(&self, r: &Vec3, t: f64) -> SphericalVector {
        self.beams_at(r, t).iter()
            .fold(SphericalVector::zero(), |acc, b| acc + b.field())
    }

    /// Incoherent sum of all saturation parameters at `(r, t)`.
    fn total_intensity(&self, r: &Vec3, t: f64) -> f64 {
        self.beams_at(r, t).iter().map(|b| b.beta).sum()
    }

    /// Return `true` if no beam's saturation parameter, polarization, or
    /// detuning depends on time.
    ///
    /// Field phases always rotate; this flag only concerns the quantities that
    /// enter scattering rates.
    fn is_static(&self) -> bool { false }
}

/// Spatial profile of a beam's saturation parameter.
#[derive(Clone)]
pub enum Intensity<'a> {
    /// Constant over all space.
    Uniform(f64),
    /// Gaussian profile about the beam axis through the origin, with
    /// `1/e^2` intensity radius `waist`.
    Gaussian {
        beta: f64,
        waist: f64,
    },
    /// Arbitrary function of position and time.
    Function(Rc<dyn Fn(&Vec3, f64) -> f64 + 'a>),
}

impl<'a> fmt::Debug for Intensity<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uniform(beta) => write!(f, "Uniform({:?})", beta),
            Self::Gaussian { beta, waist } => {
                write!(f,
                    "Gaussian {{ beta: {:?}, waist: {:?} }}",
                    beta, waist,
                )
            },
            Self::Function(_) => write!(f, "Function(Rc<...>)"),
        }
    }
}

impl<'a> Intensity<'a> {
    /// Evaluate the saturation parameter at `(r, t)` for a beam along unit
    /// vector `khat`.
    pub fn at(&self, khat: &Vec3, r: &Vec3, t: f64) -> f64 {
        match self {
            Self::Uniform(beta) => *beta,
            Self::Gaussian { beta, waist } => {
                let rho = norm(&cross(khat, r));
                *beta * (-2.0 * (rho / *waist).powi(2)).exp()
            },
            Self::Function(f) => f(r, t),
        }
    }
}

/// A single classical laser beam.
#[derive(Clone, Debug)]
pub struct LaserBeam<'a> {
    kvec: Vec3,
    khat: Vec3,
    pol: Polarization,
    delta: f64,
    intensity: Intensity<'a>,
    phase: f64,
}

impl<'a> LaserBeam<'a> {
    /// Create a uniform plane-wave beam.
    ///
    /// Fails if `kvec` is zero or non-finite, if `pol` is not transverse to
    /// `kvec`, or if `beta` is negative or non-finite.
    pub fn new(kvec: Vec3, pol: Polarization, beta: f64, delta: f64)
        -> Result<Self, FieldError>
    {
        pol.check_transverse(&kvec)?;
        FieldError::check_saturation(beta)?;
        FieldError::check_finite("delta", delta)?;
        let k = norm(&kvec);
        let khat = kvec.map(|kk| kk / k);
        Ok(Self {
            kvec,
            khat,
            pol,
            delta,
            intensity: Intensity::Uniform(beta),
            phase: 0.0,
        })
    }

    /// Replace the uniform profile with a Gaussian of peak saturation
    /// parameter equal to the current uniform value.
    pub fn with_waist(mut self, waist: f64) -> Result<Self, FieldError> {
        if !(waist.is_finite() && waist > 0.0) {
            return Err(FieldError::BadWaist(waist));
        }
        let beta = match &self.intensity {
            Intensity::Uniform(b) | Intensity::Gaussian { beta: b, .. } => *b,
            Intensity::Function(f) => f(&[0.0; 3], 0.0),
        };
        self.intensity = Intensity::Gaussian { beta, waist };
        Ok(self)
    }

    /// Replace the intensity profile with an arbitrary function of position
    /// and time.
    pub fn with_intensity_fn<F>(mut self, f: F) -> Self
    where F: Fn(&Vec3, f64) -> f64 + 'a
    {
        self.intensity = Intensity::Function(Rc::new(f));
        self
    }

    /// Set a constant phase offset.
    pub fn with_phase(mut self, phase: f64) -> Self {
        self.phase = phase;
        self
    }

    pub fn kvec(&self) -> &Vec3 { &self.kvec }

    pub fn polarization(&self) -> &Polarization { &self.pol }

    pub fn delta(&self) -> f64 { self.delta }

    pub fn intensity(&self) -> &Intensity<'a> { &self.intensity }

    /// Sample the beam at `(r, t)`.
    ///
    /// Negative or non-finite values from a user intensity function are
    /// clamped to zero.
    pub fn sample(&self, r: &Vec3, t: f64) -> BeamSample {
        let beta = self.intensity.at(&self.khat, r, t);
        let beta = if beta.is_finite() && beta > 0.0 { beta } else { 0.0 };
        let ph = dot(&self.kvec, r) - self.delta * t + self.phase;
        BeamSample {
            kvec: self.kvec,
            pol: *self.pol.spherical(),
            delta: self.delta,
            beta,
            amplitude: (beta / 2.0).sqrt() * C64::cis(ph),
        }
    }
}

/// A collection of laser beams addressing the same transition.
#[derive(Clone, Debug, Default)]
pub struct LaserBeams<'a> {
    beams: Vec<LaserBeam<'a>>,
}

impl<'a> FromIterator<LaserBeam<'a>> for LaserBeams<'a> {
    fn from_iter<I>(iter: I) -> Self
    where I: IntoIterator<Item = LaserBeam<'a>>
    {
        Self { beams: iter.into_iter().collect() }
    }
}

impl<'a> LaserBeams<'a> {
    pub fn new() -> Self { Self::default() }

    pub fn push(&mut self, beam: LaserBeam<'a>) { self.beams.push(beam); }

    /// Builder-style [`Self::push`].
    pub fn with_beam(mut self, beam: LaserBeam<'a>) -> Self {
        self.beams.push(beam);
        self
    }

    pub fn beams(&self) -> &[LaserBeam<'a>] { &self.beams }

    pub fn len(&self) -> usize { self.beams.len() }

    pub fn is_empty(&self) -> bool { self.beams.is_empty() }

    /// Six counter-propagating beam pairs along the Cartesian axes in the usual
    /// magneto-optical trap configuration.
    ///
    /// Beams along `±x` and `±y` carry helicity `-helicity`; beams along `±z`
    /// carry `helicity`.
    pub fn mot_3d(k: f64, helicity: i32, beta: f64, delta: f64)
        -> Result<Self, FieldError>
    {
        let axes: [(Vec3, i32); 6] = [
            ([-k, 0.0, 0.0], -helicity),
            ([ k, 0.0, 0.0], -helicity),
            ([0.0, -k, 0.0], -helicity),
            ([0.0,  k, 0.0], -helicity),
            ([0.0, 0.0, -k],  helicity),
            ([0.0, 0.0,  k],  helicity),
        ];
        let beams: Self
            = axes.iter()
            .map(|(kvec, h)| {
                let pol = Polarization::circular(*h, kvec)?;
                LaserBeam::new(*kvec, pol, beta, delta)
            })
            .collect::<Result<_, _>>()?;
        debug!(beams = beams.len(), beta, delta, "constructed 3D MOT beams");
        Ok(beams)
    }
}

impl<'a> LightField for LaserBeams<'a> {
    fn beams_at(&self, r: &Vec3, t: f64) -> Vec<BeamSample> {
        self.beams.iter().map(|b| b.sample(r, t)).collect()
    }

    fn is_static(&self) -> bool {
        self.beams.iter()
            .all(|b| !matches!(b.intensity, Intensity::Function(_)))
    }
}

impl<'a> LightField for LaserBeam<'a> {
    fn beams_at(&self, r: &Vec3, t: f64) -> Vec<BeamSample> {
        vec![self.sample(r, t)]
    }

    fn is_static(&self) -> bool {
        !matches!(self.intensity, Intensity::Function(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn sigma_plus_z(beta: f64, delta: f64) -> LaserBeam<'static> {
        let k = [0.0, 0.0, 1.0];
        LaserBeam::new(k, Polarization::circular(1, &k).unwrap(), beta, delta)
            .unwrap()
    }

    #[test]
    fn amplitude_and_phase() {
        let beam = sigma_plus_z(2.0, 0.5).with_phase(0.1);
        let s = beam.sample(&[0.0, 0.0, 0.3], 2.0);
        assert_abs_diff_eq!(s.amplitude.norm(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(s.amplitude.arg(), 0.3 - 1.0 + 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(s.field().get(1).norm(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn gaussian_profile_falls_off_transversely() {
        let beam = sigma_plus_z(1.0, 0.0).with_waist(2.0).unwrap();
        let on_axis = beam.sample(&[0.0, 0.0, 5.0], 0.0).beta;
        let off_axis = beam.sample(&[2.0, 0.0, 0.0], 0.0).beta;
        assert_abs_diff_eq!(on_axis, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(off_axis, (-2.0_f64).exp(), epsilon = 1e-12);
        assert!(beam.with_waist(0.0).is_err());
    }

    #[test]
    fn coherent_vs_incoherent_sums() {
        let kr = [0.0, 0.0, -1.0];
        let beams = LaserBeams::new()
            .with_beam(sigma_plus_z(1.0, 0.0))
            .with_beam(
                LaserBeam::new(kr, Polarization::circular(-1, &kr).unwrap(), 1.0, 0.0)
                    .unwrap()
            );
        // both beams are σ+ relative to z; at the origin they add in phase
        let e = beams.electric_field(&[0.0; 3], 0.0);
        assert_abs_diff_eq!(e.get(1).norm_sqr(), 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(beams.total_intensity(&[0.0; 3], 0.0), 2.0, epsilon = 1e-12);
        // a quarter wavelength away they interfere destructively
        let z = std::f64::consts::FRAC_PI_2;
        let e = beams.electric_field(&[0.0, 0.0, z], 0.0);
        assert_abs_diff_eq!(e.get(1).norm_sqr(), 0.0, epsilon = 1e-12);
        assert!(beams.is_static());
    }

    #[test]
    fn function_intensity_is_not_static() {
        let beam = sigma_plus_z(1.0, 0.0)
            .with_intensity_fn(|_, t| if t < 1.0 { 1.0 } else { -3.0 });
        assert!(!beam.is_static());
        assert_eq!(beam.sample(&[0.0; 3], 2.0).beta, 0.0);
    }

    #[test]
    fn mot_beams_are_valid() {
        let beams = LaserBeams::mot_3d(1.0, 1, 0.5, -1.0).unwrap();
        assert_eq!(beams.len(), 6);
        for b in beams.beams() {
            assert!(b.polarization().check_transverse(b.kvec()).is_ok());
        }
        assert!(LaserBeam::new(
            [0.0, 0.0, 1.0],
            Polarization::linear(&[1.0, 0.0, 0.0]).unwrap(),
            -1.0,
            0.0,
        ).is_err());
    }
}
