//! Collection of all error types.
//!
//! All errors derive [`thiserror::Error`] and compose into the crate-level
//! [`Error`] through `#[from]` conversions, so every fallible public operation
//! can be used with `?` against [`Result`].

use ndarray as nd;
use ndarray_linalg::error::LinalgError;
use thiserror::Error;

/// Returned when an operation requiring equal-length arrays encounters arrays
/// with unequal length.
#[derive(Debug, Error)]
#[error("encountered arrays with incompatible lengths; expected {0}, got {1}")]
pub struct LengthError(pub usize, pub usize);

impl LengthError {
    pub(crate) fn check<S, A>(expected: usize, a: &nd::ArrayBase<S, nd::Ix1>)
        -> std::result::Result<(), Self>
    where S: nd::Data<Elem = A>
    {
        let n = a.len();
        (n == expected).then_some(()).ok_or(Self(expected, n))
    }
}

/// Returned when atomic structure cannot be constructed.
#[derive(Debug, Error)]
pub enum StructureError {
    /// Angular momentum quantum numbers must be finite, non-negative, and
    /// integer or half-integer.
    #[error("invalid angular momentum quantum number {0}")]
    BadQuantumNumber(f64),

    /// Electric dipole transitions require `|F_e - F_g|` to be 0 or 1 and
    /// exclude `0 -> 0`.
    #[error("electric dipole transition F = {0} -> F' = {1} is forbidden")]
    DipoleForbidden(f64, f64),

    /// Dipole tensor shape does not match the manifolds it is paired with.
    #[error("dipole tensor has shape {0:?}, but manifolds require {1:?}")]
    DipoleShape((usize, usize), (usize, usize)),

    /// Natural linewidths must be finite and positive.
    #[error("linewidth must be finite and positive; got {0}")]
    BadLinewidth(f64),

    /// Generic non-finite parameter.
    #[error("parameter `{0}` must be finite; got {1}")]
    NonFinite(&'static str, f64),
}

impl StructureError {
    pub(crate) fn check_finite(name: &'static str, x: f64)
        -> std::result::Result<(), Self>
    {
        x.is_finite().then_some(()).ok_or(Self::NonFinite(name, x))
    }

    pub(crate) fn check_linewidth(gamma: f64) -> std::result::Result<(), Self> {
        (gamma.is_finite() && gamma > 0.0)
            .then_some(())
            .ok_or(Self::BadLinewidth(gamma))
    }
}

/// Returned when a light or magnetic field description is invalid.
#[derive(Debug, Error)]
pub enum FieldError {
    /// Polarization vectors must be non-zero and finite.
    #[error("polarization vector has zero or non-finite norm")]
    ZeroPolarization,

    /// Wavevectors must be non-zero and finite.
    #[error("wavevector has zero or non-finite norm")]
    ZeroWavevector,

    /// Polarization must be transverse to its beam's wavevector.
    #[error("polarization is not transverse to the wavevector; |eps . k| = {0}")]
    NotTransverse(f64),

    /// Circular polarization helicity must be `+1` or `-1`.
    #[error("helicity must be +1 or -1; got {0}")]
    BadHelicity(i32),

    /// Saturation parameters must be finite and non-negative.
    #[error("saturation parameter must be finite and non-negative; got {0}")]
    BadSaturation(f64),

    /// Gaussian waists must be finite and positive.
    #[error("beam waist must be finite and positive; got {0}")]
    BadWaist(f64),

    /// Generic non-finite beam or field parameter.
    #[error("parameter `{0}` must be finite; got {1}")]
    NonFinite(&'static str, f64),
}

impl FieldError {
    pub(crate) fn check_finite(name: &'static str, x: f64)
        -> std::result::Result<(), Self>
    {
        x.is_finite().then_some(()).ok_or(Self::NonFinite(name, x))
    }

    pub(crate) fn check_saturation(beta: f64) -> std::result::Result<(), Self> {
        (beta.is_finite() && beta >= 0.0)
            .then_some(())
            .ok_or(Self::BadSaturation(beta))
    }
}

/// Returned when an engine is set up or queried incorrectly.
#[derive(Debug, Error)]
pub enum SetupError {
    /// [`LengthError`]
    #[error("initial state length error: {0}")]
    Length(#[from] LengthError),

    /// Initial populations must be finite and non-negative.
    #[error("population at index {0} is negative or non-finite: {1}")]
    BadPopulation(usize, f64),

    /// Initial density matrices must be square.
    #[error("density matrix must be square; got shape {0:?}")]
    NotSquare((usize, usize)),

    /// Initial density matrices must be Hermitian.
    #[error("density matrix is not Hermitian; max |rho - rho^dag| = {0}")]
    NotHermitian(f64),

    /// A complex state vector was given to the real/imaginary representation.
    #[error("the real/imaginary representation requires a real state vector")]
    ComplexInReIm,

    /// An evolution was requested before an initial state was set.
    #[error("no initial state has been set")]
    NoInitialState,

    /// A solution was requested before any evolution.
    #[error("no solution is available; evolve the system first")]
    NoSolution,

    /// Time spans must be finite with `t0 < t1`.
    #[error("invalid time span ({0}, {1})")]
    BadTimeSpan(f64, f64),

    /// Evaluation times must be finite, ascending and lie within the span.
    #[error("evaluation times must be finite, ascending and within ({0}, {1})")]
    BadEvalTimes(f64, f64),
}

impl SetupError {
    pub(crate) fn check_span(t_span: (f64, f64)) -> std::result::Result<(), Self> {
        let (t0, t1) = t_span;
        (t0.is_finite() && t1.is_finite() && t0 < t1)
            .then_some(())
            .ok_or(Self::BadTimeSpan(t0, t1))
    }

    pub(crate) fn check_populations<S>(N: &nd::ArrayBase<S, nd::Ix1>)
        -> std::result::Result<(), Self>
    where S: nd::Data<Elem = f64>
    {
        N.iter().enumerate()
            .find(|(_, n)| !n.is_finite() || **n < 0.0)
            .map_or(Ok(()), |(k, n)| Err(Self::BadPopulation(k, *n)))
    }
}

/// Returned when a numerical integration cannot complete.
#[derive(Debug, Error)]
pub enum IntegrationError {
    /// Tolerances and step sizes must be finite and positive.
    #[error("integrator parameter `{0}` must be finite and positive; got {1}")]
    BadParameter(&'static str, f64),

    /// The maximum number of steps was taken before reaching the end of the
    /// time span.
    #[error("step limit of {0} exceeded at t = {1}")]
    StepLimit(usize, f64),

    /// The adaptive step size shrank below the resolution of the time
    /// coordinate.
    #[error("step size underflow at t = {0}; h = {1}")]
    StepSizeUnderflow(f64, f64),

    /// The state acquired NaN or infinite entries.
    #[error("non-finite state encountered at t = {0}")]
    NonFinite(f64),
}

impl IntegrationError {
    pub(crate) fn check_positive(name: &'static str, x: f64)
        -> std::result::Result<(), Self>
    {
        (x.is_finite() && x > 0.0)
            .then_some(())
            .ok_or(Self::BadParameter(name, x))
    }
}

/// Returned by invariant checks on evolution outputs.
#[derive(Debug, Error)]
pub enum InvariantError {
    #[error("trace drifted by {drift:e} at time index {index} (tolerance {tol:e})")]
    TraceDrift { index: usize, drift: f64, tol: f64 },

    #[error("hermiticity error {err:e} at time index {index} (tolerance {tol:e})")]
    NonHermitian { index: usize, err: f64, tol: f64 },

    #[error("negative eigenvalue {min:e} at time index {index} (tolerance {tol:e})")]
    NegativeEigenvalue { index: usize, min: f64, tol: f64 },

    #[error("total population drifted by {drift:e} at time index {index} (tolerance {tol:e})")]
    PopulationDrift { index: usize, drift: f64, tol: f64 },
}

/// Returned when a configuration cannot be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// [`IntegrationError`]
    #[error("invalid integrator settings: {0}")]
    Integrator(#[from] IntegrationError),

    #[error("invariant tolerance must be finite and positive; got {0}")]
    Tolerance(f64),
}

/// Top-level error type.
#[derive(Debug, Error)]
pub enum Error {
    /// [`StructureError`]
    #[error("structure error: {0}")]
    Structure(#[from] StructureError),

    /// [`FieldError`]
    #[error("field error: {0}")]
    Field(#[from] FieldError),

    /// [`SetupError`]
    #[error("setup error: {0}")]
    Setup(#[from] SetupError),

    /// [`IntegrationError`]
    #[error("integration error: {0}")]
    Integration(#[from] IntegrationError),

    /// [`InvariantError`]
    #[error("invariant violated: {0}")]
    Invariant(#[from] InvariantError),

    /// [`ConfigError`]
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// [`LinalgError`]
    #[error("linalg error: {0}")]
    Linalg(#[from] LinalgError),
}

impl From<LengthError> for Error {
    fn from(err: LengthError) -> Self { Self::Setup(err.into()) }
}

pub type Result<T> = std::result::Result<T, Error>;
