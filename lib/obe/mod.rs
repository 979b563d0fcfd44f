//! Optical Bloch equations for the full density matrix of one atom.
//!
//! The density matrix evolves as
//! ```text
//! d rho / dt = -i [H(t), rho] + D[rho]
//! ```
//! where `H(t)` is assembled from the coherent sum of all beam fields at the
//! atom's position `r0 + v t` and `D` is the spontaneous-decay superoperator
//! built once from the dipole tensor.

use ndarray::{ self as nd, s };
use num_complex::Complex64 as C64;
use serde::{ Deserialize, Serialize };
use tracing::{ debug, info, warn };
use crate::{
    error::{ LengthError, Result, SetupError },
    fields::{ LightField, MagneticField, Vec3, add_scaled },
    hamiltonian::Hamiltonian,
    ode::{ self, Integrator, OdeSolution, OdeStats },
    rateeq::RateEquations,
    validation::{ self, DensityReport },
};

pub mod liouvillian;
pub mod repr;

pub use liouvillian::{ collapse_operators, commutator, decay_superoperator };
pub use repr::{ ComplexRepr, DensityRepr, FlatDensity, ReImRepr, Representation };

/// Settings for an [`Obe`] engine.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObeOptions {
    pub representation: Representation,
    /// Include spontaneous decay.
    pub dissipation: bool,
    /// Default integrator for [`Obe::evolve_density`].
    pub integrator: Integrator,
    /// Tolerance for the post-evolution invariant checks.
    pub invariant_tolerance: f64,
}

impl Default for ObeOptions {
    fn default() -> Self {
        Self {
            representation: Representation::Complex,
            dissipation: true,
            integrator: Integrator::default(),
            invariant_tolerance: 1e-6,
        }
    }
}

impl ObeOptions {
    pub fn with_representation(mut self, representation: Representation) -> Self {
        self.representation = representation;
        self
    }

    pub fn with_dissipation(mut self, dissipation: bool) -> Self {
        self.dissipation = dissipation;
        self
    }

    pub fn with_integrator(mut self, integrator: Integrator) -> Self {
        self.integrator = integrator;
        self
    }

    pub fn with_invariant_tolerance(mut self, tol: f64) -> Self {
        self.invariant_tolerance = tol;
        self
    }
}

#[derive(Clone, Debug)]
enum FlatSolution {
    Complex(OdeSolution<C64>),
    Real(OdeSolution<f64>),
}

impl FlatSolution {
    fn stats(&self) -> OdeStats {
        match self {
            Self::Complex(sol) => sol.stats,
            Self::Real(sol) => sol.stats,
        }
    }

    fn reshape(&self, n: usize) -> DensitySeries {
        fn unpack<R: DensityRepr>(sol: &OdeSolution<R::Elem>, n: usize)
            -> DensitySeries
        {
            let mut rho: nd::Array3<C64> = nd::Array3::zeros((n, n, sol.t.len()));
            let iter
                = sol.y.axis_iter(nd::Axis(1))
                .zip(rho.axis_iter_mut(nd::Axis(2)));
            for (yk, rho_k) in iter {
                R::unflatten(&yk, n).move_into(rho_k);
            }
            DensitySeries { t: sol.t.clone(), rho }
        }

        match self {
            Self::Complex(sol) => unpack::<ComplexRepr>(sol, n),
            Self::Real(sol) => unpack::<ReImRepr>(sol, n),
        }
    }
}

/// Optical-Bloch engine for an atom moving at constant velocity through a
/// light field and a magnetic field.
#[derive(Clone, Debug)]
pub struct Obe<'a, L, B>
where
    L: LightField,
    B: MagneticField,
{
    ham: &'a Hamiltonian,
    light: &'a L,
    mag: &'a B,
    r0: Vec3,
    v: Vec3,
    options: ObeOptions,
    decay: Option<nd::Array2<C64>>,
    rho0: Option<nd::Array2<C64>>,
    solution: Option<FlatSolution>,
}

impl<'a, L, B> Obe<'a, L, B>
where
    L: LightField,
    B: MagneticField,
{
    /// Create a new engine with default options, with the atom at rest at the
    /// origin.
    pub fn new(ham: &'a Hamiltonian, light: &'a L, mag: &'a B) -> Self {
        let options = ObeOptions::default();
        let decay = Self::build_decay(ham, options.dissipation);
        Self {
            ham,
            light,
            mag,
            r0: [0.0; 3],
            v: [0.0; 3],
            options,
            decay,
            rho0: None,
            solution: None,
        }
    }

    fn build_decay(ham: &Hamiltonian, dissipation: bool)
        -> Option<nd::Array2<C64>>
    {
        dissipation.then(|| {
            let n = ham.dim();
            let D = decay_superoperator(&collapse_operators(ham), n);
            debug!(n, "built decay superoperator");
            D
        })
    }

    /// Replace all options, rebuilding the decay superoperator if
    /// `dissipation` changes.
    ///
    /// A previously set initial state is kept.
    pub fn with_options(mut self, options: ObeOptions) -> Self {
        if options.dissipation != self.options.dissipation {
            self.decay = Self::build_decay(self.ham, options.dissipation);
        }
        self.options = options;
        self
    }

    pub fn with_position(mut self, r0: Vec3) -> Self {
        self.r0 = r0;
        self
    }

    pub fn with_velocity(mut self, v: Vec3) -> Self {
        self.v = v;
        self
    }

    pub fn options(&self) -> &ObeOptions { &self.options }

    pub fn hamiltonian(&self) -> &Hamiltonian { self.ham }

    pub fn position(&self) -> &Vec3 { &self.r0 }

    pub fn velocity(&self) -> &Vec3 { &self.v }

    /// Rate-equation engine over the same Hamiltonian, fields, position and
    /// velocity, sharing this engine's integrator and invariant tolerance.
    ///
    /// Useful for running both descriptions side by side.
    pub fn rate_equations(&self) -> RateEquations<'a, L, B> {
        RateEquations::new(self.ham, self.light, self.mag)
            .with_position(self.r0)
            .with_velocity(self.v)
            .with_integrator(self.options.integrator)
            .with_tolerance(self.options.invariant_tolerance)
    }

    /// Set the initial state from a flat density vector of length `n^2`.
    ///
    /// In the real/imaginary representation the vector must be real (a complex
    /// vector with vanishing imaginary parts is accepted); in the complex
    /// representation a real vector is promoted.
    pub fn set_initial_density(&mut self, rho0: FlatDensity) -> Result<()> {
        let n = self.ham.dim();
        let rho = match (self.options.representation, rho0) {
            (Representation::Complex, FlatDensity::Complex(y)) => {
                LengthError::check(n * n, &y)?;
                ComplexRepr::unflatten(&y, n)
            },
            (Representation::Complex, FlatDensity::Real(y)) => {
                LengthError::check(n * n, &y)?;
                ComplexRepr::unflatten(&y.mapv(C64::from), n)
            },
            (Representation::ReIm, FlatDensity::Real(y)) => {
                LengthError::check(n * n, &y)?;
                ReImRepr::unflatten(&y, n)
            },
            (Representation::ReIm, FlatDensity::Complex(y)) => {
                LengthError::check(n * n, &y)?;
                if y.iter().any(|c| c.im != 0.0) {
                    return Err(SetupError::ComplexInReIm.into());
                }
                ReImRepr::unflatten(&y.mapv(|c| c.re), n)
            },
        };
        self.rho0 = Some(rho);
        Ok(())
    }

    /// Set the initial state from a full density matrix.
    ///
    /// Fails if the matrix is not `n x n` or deviates from hermiticity by more
    /// than the invariant tolerance.
    pub fn set_initial_density_matrix(&mut self, rho0: nd::Array2<C64>)
        -> Result<()>
    {
        let n = self.ham.dim();
        let (r, c) = rho0.dim();
        if r != c {
            return Err(SetupError::NotSquare((r, c)).into());
        }
        if r != n {
            return Err(LengthError(n, r).into());
        }
        let err = validation::hermiticity_error(&rho0);
        if err > self.options.invariant_tolerance {
            return Err(SetupError::NotHermitian(err).into());
        }
        self.rho0 = Some(rho0);
        Ok(())
    }

    /// Set a diagonal initial state from populations.
    pub fn set_initial_density_from_populations<S>(
        &mut self,
        N: &nd::ArrayBase<S, nd::Ix1>,
    ) -> Result<()>
    where S: nd::Data<Elem = f64>
    {
        LengthError::check(self.ham.dim(), N)?;
        SetupError::check_populations(N)?;
        self.rho0 = Some(nd::Array2::from_diag(&N.mapv(C64::from)));
        Ok(())
    }

    /// Initial state as a matrix, if set.
    pub fn initial_density(&self) -> Option<&nd::Array2<C64>> {
        self.rho0.as_ref()
    }

    fn position_at(&self, t: f64) -> Vec3 { add_scaled(&self.r0, &self.v, t) }

    /// Instantaneous Hamiltonian seen by the moving atom.
    pub fn hamiltonian_at(&self, t: f64) -> nd::Array2<C64> {
        let r = self.position_at(t);
        self.ham.build(
            &self.light.electric_field(&r, t),
            &self.mag.field(&r, t),
        )
    }

    /// Evaluate `d rho / dt` at time `t`.
    pub fn rhs(&self, t: f64, rho: &nd::Array2<C64>) -> nd::Array2<C64> {
        let H = self.hamiltonian_at(t);
        let mut drho = commutator(&H, rho) * (-C64::i());
        if let Some(D) = &self.decay {
            let d = D.dot(&ComplexRepr::flatten(rho));
            drho += &ComplexRepr::unflatten(&d, rho.nrows());
        }
        drho
    }

    /// Full `n^2 x n^2` generator at time `t`, acting on row-major flattened
    /// density matrices.
    pub fn liouvillian(&self, t: f64) -> nd::Array2<C64> {
        let L = liouvillian::coherent_superoperator(&self.hamiltonian_at(t));
        match &self.decay {
            Some(D) => L + D,
            None => L,
        }
    }

    fn integrate<R: DensityRepr>(
        &self,
        rho0: &nd::Array2<C64>,
        t_span: (f64, f64),
        t_eval: Option<&nd::Array1<f64>>,
        method: &Integrator,
    ) -> Result<OdeSolution<R::Elem>>
    {
        let n = self.ham.dim();
        ode::solve(
            |t, y| Ok(R::flatten(&self.rhs(t, &R::unflatten(y, n)))),
            t_span,
            &R::flatten(rho0),
            t_eval,
            method,
        )
    }

    /// Integrate the density matrix over `t_span`.
    ///
    /// If `integrator` is `None`, the one from [`ObeOptions`] is used. On
    /// success the solution is stored (replacing any previous one) and
    /// returned; on failure the previous solution is kept. Invariant drift
    /// beyond tolerance is logged but not raised.
    pub fn evolve_density(
        &mut self,
        t_span: (f64, f64),
        t_eval: Option<&nd::Array1<f64>>,
        integrator: Option<Integrator>,
    ) -> Result<DensitySeries>
    {
        let rho0 = self.rho0.as_ref().ok_or(SetupError::NoInitialState)?;
        let method = integrator.unwrap_or(self.options.integrator);
        let solution = match self.options.representation {
            Representation::Complex => FlatSolution::Complex(
                self.integrate::<ComplexRepr>(rho0, t_span, t_eval, &method)?),
            Representation::ReIm => FlatSolution::Real(
                self.integrate::<ReImRepr>(rho0, t_span, t_eval, &method)?),
        };
        let stats = solution.stats();
        info!(
            representation = ?self.options.representation,
            steps = stats.steps,
            evaluations = stats.evaluations,
            "evolved density matrix",
        );
        let series = solution.reshape(self.ham.dim());
        if let Err(err) = series.check_invariants(self.options.invariant_tolerance) {
            warn!(%err, "density matrix invariant check failed");
        }
        self.solution = Some(solution);
        Ok(series)
    }

    /// Reshape the stored solution into a [`DensitySeries`].
    pub fn reshape_solution(&self) -> Result<DensitySeries> {
        self.solution.as_ref()
            .map(|sol| sol.reshape(self.ham.dim()))
            .ok_or(SetupError::NoSolution.into())
    }

    /// Integrator counters of the stored solution.
    pub fn solution_stats(&self) -> Option<OdeStats> {
        self.solution.as_ref().map(|sol| sol.stats())
    }
}

/// Density matrices `rho` of shape `(n, n, n_t)` at times `t`.
#[derive(Clone, Debug, PartialEq)]
pub struct DensitySeries {
    pub t: nd::Array1<f64>,
    pub rho: nd::Array3<C64>,
}

impl DensitySeries {
    /// Number of basis states.
    pub fn dim(&self) -> usize { self.rho.shape()[0] }

    /// Diagonal elements, shape `(n, n_t)`.
    pub fn populations(&self) -> nd::Array2<f64> {
        let n = self.dim();
        nd::Array2::from_shape_fn((n, self.t.len()), |(i, k)| self.rho[[i, i, k]].re)
    }

    pub fn traces(&self) -> nd::Array1<f64> {
        self.rho.axis_iter(nd::Axis(2))
            .map(|rho_k| validation::trace(&rho_k))
            .collect()
    }

    pub fn purities(&self) -> nd::Array1<f64> {
        self.rho.axis_iter(nd::Axis(2))
            .map(|rho_k| validation::purity(&rho_k))
            .collect()
    }

    /// `Tr(op rho)` at every time.
    pub fn expectation<S>(&self, op: &nd::ArrayBase<S, nd::Ix2>)
        -> Result<nd::Array1<C64>>
    where S: nd::Data<Elem = C64>
    {
        let n = self.dim();
        let (r, c) = op.dim();
        if r != c {
            return Err(SetupError::NotSquare((r, c)).into());
        }
        if r != n {
            return Err(LengthError(n, r).into());
        }
        Ok(
            self.rho.axis_iter(nd::Axis(2))
                .map(|rho_k| (op * &rho_k.t()).sum())
                .collect()
        )
    }

    /// Density matrix at the last time, if any.
    pub fn final_density(&self) -> Option<nd::Array2<C64>> {
        let nt = self.t.len();
        (nt > 0).then(|| self.rho.slice(s![.., .., nt - 1]).to_owned())
    }

    /// Invariant quantities at every time.
    pub fn invariant_report(&self) -> Result<Vec<DensityReport>> {
        self.rho.axis_iter(nd::Axis(2))
            .map(|rho_k| DensityReport::new(&rho_k))
            .collect()
    }

    /// Fail on the first time at which trace, hermiticity or positivity is
    /// violated by more than `tol`.
    pub fn check_invariants(&self, tol: f64) -> Result<()> {
        validation::check_density_series(&self.rho, tol)
    }

    /// Time average of the populations over `t_min <= t <= t_max`, weighted by
    /// the trapezoidal rule.
    pub fn average_populations(&self, t_min: f64, t_max: f64)
        -> Option<nd::Array1<f64>>
    {
        let P = self.populations();
        let idx: Vec<usize>
            = self.t.iter().enumerate()
            .filter(|(_, t)| **t >= t_min && **t <= t_max)
            .map(|(k, _)| k)
            .collect();
        if idx.len() < 2 {
            return idx.first().map(|k| P.column(*k).to_owned());
        }
        let mut acc: nd::Array1<f64> = nd::Array1::zeros(self.dim());
        for w in idx.windows(2) {
            let dt = self.t[w[1]] - self.t[w[0]];
            acc.scaled_add(dt / 2.0, &P.column(w[0]));
            acc.scaled_add(dt / 2.0, &P.column(w[1]));
        }
        let span = self.t[idx[idx.len() - 1]] - self.t[idx[0]];
        Some(acc / span)
    }
}

impl From<DensitySeries> for (nd::Array1<f64>, nd::Array3<C64>) {
    fn from(series: DensitySeries) -> Self { (series.t, series.rho) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use crate::{
        error::Error,
        fields::{ LaserBeam, LaserBeams, Polarization, UniformField },
        structure::Manifold,
    };

    fn two_level() -> Hamiltonian {
        Hamiltonian::bare_hyperfine(
            Manifold::new(0.0).unwrap(),
            Manifold::new(1.0).unwrap(),
        ).unwrap()
    }

    fn sigma_plus(beta: f64) -> LaserBeams<'static> {
        let k = [0.0, 0.0, 1.0];
        LaserBeams::new().with_beam(
            LaserBeam::new(k, Polarization::circular(1, &k).unwrap(), beta, 0.0)
                .unwrap()
        )
    }

    #[test]
    fn initial_state_validation() {
        let ham = two_level();
        let light = sigma_plus(2.0);
        let mag = UniformField::zero();
        let mut obe = Obe::new(&ham, &light, &mag);
        assert!(matches!(
            obe.evolve_density((0.0, 1.0), None, None),
            Err(Error::Setup(SetupError::NoInitialState)),
        ));
        assert!(matches!(
            obe.reshape_solution(),
            Err(Error::Setup(SetupError::NoSolution)),
        ));
        assert!(obe.set_initial_density(FlatDensity::Real(nd::Array1::zeros(15))).is_err());
        let mut bad: nd::Array2<C64> = nd::Array2::zeros((4, 4));
        bad[[0, 1]] = C64::from(0.5);
        assert!(matches!(
            obe.set_initial_density_matrix(bad),
            Err(Error::Setup(SetupError::NotHermitian(_))),
        ));
        assert!(obe.set_initial_density_matrix(nd::Array2::zeros((4, 3))).is_err());
        assert!(obe.set_initial_density_from_populations(&nd::array![1.0, -0.1, 0.0, 0.1]).is_err());

        // switching representation keeps a previously set state
        obe.set_initial_density_from_populations(&nd::array![1.0, 0.0, 0.0, 0.0])
            .unwrap();
        let obe = obe.with_options(
            ObeOptions::default()
                .with_representation(Representation::ReIm)
                .with_dissipation(false)
        );
        assert_eq!(obe.initial_density().map(|rho| rho[[0, 0]]), Some(C64::from(1.0)));

        let mut obe = Obe::new(&ham, &light, &mag)
            .with_options(ObeOptions::default().with_representation(Representation::ReIm));
        let mut y: nd::Array1<C64> = nd::Array1::zeros(16);
        y[0] = C64::new(1.0, 0.0);
        assert!(obe.set_initial_density(FlatDensity::Complex(y.clone())).is_ok());
        y[1] = C64::new(0.0, 0.1);
        assert!(matches!(
            obe.set_initial_density(FlatDensity::Complex(y)),
            Err(Error::Setup(SetupError::ComplexInReIm)),
        ));
    }

    #[test]
    fn liouvillian_matches_rhs() {
        let ham = two_level();
        let light = sigma_plus(2.0);
        let mag = UniformField::new([0.0, 0.2, 0.3]).unwrap();
        let obe = Obe::new(&ham, &light, &mag).with_velocity([0.0, 0.0, 0.5]);
        let mut rho: nd::Array2<C64> = nd::Array2::zeros((4, 4));
        rho[[0, 0]] = C64::from(0.6);
        rho[[3, 3]] = C64::from(0.4);
        rho[[0, 3]] = C64::new(0.1, 0.2);
        rho[[3, 0]] = C64::new(0.1, -0.2);
        let t = 0.7;
        let L = obe.liouvillian(t);
        let via_L = ComplexRepr::unflatten(&L.dot(&ComplexRepr::flatten(&rho)), 4);
        let direct = obe.rhs(t, &rho);
        for (a, b) in via_L.iter().zip(&direct) {
            assert_abs_diff_eq!((a - b).norm(), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn dissipation_off_leaves_coherent_generator() {
        let ham = two_level();
        let light = sigma_plus(2.0);
        let mag = UniformField::new([0.1, 0.0, 0.3]).unwrap();
        let obe = Obe::new(&ham, &light, &mag)
            .with_options(ObeOptions::default().with_dissipation(false));
        let coherent = liouvillian::coherent_superoperator(&obe.hamiltonian_at(0.4));
        assert_eq!(obe.liouvillian(0.4), coherent);
        let obe = obe.with_options(ObeOptions::default());
        let D = obe.liouvillian(0.4) - &coherent;
        assert!(D.iter().any(|x| x.norm() > 0.1));
    }

    #[test]
    fn companion_rate_equations() {
        let ham = two_level();
        let light = sigma_plus(2.0);
        let mag = UniformField::zero();
        let obe = Obe::new(&ham, &light, &mag)
            .with_position([0.1, 0.2, 0.3])
            .with_velocity([0.0, 0.0, -0.5])
            .with_options(ObeOptions::default().with_invariant_tolerance(1e-4));
        let re = obe.rate_equations();
        assert_eq!(re.position(), obe.position());
        assert_eq!(re.velocity(), obe.velocity());
        assert!(std::ptr::eq(re.hamiltonian(), obe.hamiltonian()));
        // k.v = -0.5 puts the beam 0.5 off resonance: R = 1/2, N_e = R / (2R + 1)
        let N = re.equilibrium_populations(*re.position(), *re.velocity(), 0.0)
            .unwrap();
        assert_abs_diff_eq!(N[3], 0.25, epsilon = 1e-12);
    }

    #[test]
    fn pure_decay() {
        let ham = two_level();
        let light = LaserBeams::new();
        let mag = UniformField::zero();
        let mut obe = Obe::new(&ham, &light, &mag);
        obe.set_initial_density_from_populations(&nd::array![0.0, 0.0, 0.0, 1.0])
            .unwrap();
        let t_eval = nd::array![0.0, 1.0, 2.0];
        let series = obe.evolve_density((0.0, 2.0), Some(&t_eval), None).unwrap();
        let P = series.populations();
        for (k, t) in t_eval.iter().enumerate() {
            assert_abs_diff_eq!(P[[3, k]], (-t).exp(), epsilon = 1e-5);
            assert_abs_diff_eq!(P[[0, k]], 1.0 - (-t).exp(), epsilon = 1e-5);
        }
        series.traces().iter()
            .for_each(|tr| assert_abs_diff_eq!(*tr, 1.0, epsilon = 1e-9));
        assert!(series.check_invariants(1e-6).is_ok());
        let rho_f = series.final_density().unwrap();
        assert_abs_diff_eq!(rho_f[[3, 3]].re, (-2.0_f64).exp(), epsilon = 1e-5);
        assert_eq!(obe.reshape_solution().unwrap(), series);
        assert!(obe.solution_stats().is_some());
    }

    #[test]
    fn series_helpers() {
        let mut rho: nd::Array3<C64> = nd::Array3::zeros((2, 2, 3));
        for k in 0..3 {
            rho[[0, 0, k]] = C64::from(1.0);
        }
        rho[[0, 0, 2]] = C64::from(0.5);
        rho[[1, 1, 2]] = C64::from(0.5);
        let series = DensitySeries { t: nd::array![0.0, 1.0, 2.0], rho };
        let sz = nd::array![
            [C64::from(1.0), C64::from(0.0)],
            [C64::from(0.0), C64::from(-1.0)],
        ];
        let ex = series.expectation(&sz).unwrap();
        assert_abs_diff_eq!(ex[0].re, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(ex[2].re, 0.0, epsilon = 1e-12);
        let pur = series.purities();
        assert_abs_diff_eq!(pur[2], 0.5, epsilon = 1e-12);
        let avg = series.average_populations(0.0, 2.0).unwrap();
        assert_abs_diff_eq!(avg[0], 0.875, epsilon = 1e-12);
        assert_eq!(series.invariant_report().unwrap().len(), 3);
        assert!(series.expectation(&nd::Array2::<C64>::eye(3)).is_err());
    }
}
