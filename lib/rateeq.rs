//! Rate equations for sublevel populations.
//!
//! Coherences are neglected: each beam drives incoherent transitions between
//! ground and excited eigenstates of the static-field Hamiltonian with a
//! Lorentzian rate, and excited states decay spontaneously with Clebsch-Gordan
//! branching. Populations are ordered as the eigenstates of
//! [`Hamiltonian::diagonalize_static_field`], which for a field along `z` (or
//! no field) is the bare `m_F` ordering.

use itertools::Itertools;
use ndarray as nd;
use ndarray_linalg::Solve;
use num_complex::Complex64 as C64;
use tracing::{ debug, info, warn };
use crate::{
    config::SimConfig,
    error::{ InvariantError, LengthError, Result, SetupError },
    fields::{ LightField, MagneticField, Vec3, dot },
    hamiltonian::Hamiltonian,
    ode::{ self, Integrator },
    validation,
};

/// Populations `populations` of shape `(n, n_t)` at times `t`.
#[derive(Clone, Debug, PartialEq)]
pub struct PopulationSolution {
    pub t: nd::Array1<f64>,
    pub populations: nd::Array2<f64>,
}

impl PopulationSolution {
    /// Total population at every time.
    pub fn totals(&self) -> nd::Array1<f64> {
        self.populations.sum_axis(nd::Axis(0))
    }

    /// Fail if the total population drifts from its initial value by more
    /// than `tol`.
    pub fn check_conservation(&self, tol: f64)
        -> std::result::Result<(), InvariantError>
    {
        validation::check_populations(&self.populations, tol)
    }

    /// Populations at the last time, if any.
    pub fn final_populations(&self) -> Option<nd::Array1<f64>> {
        let nt = self.t.len();
        (nt > 0).then(|| self.populations.column(nt - 1).to_owned())
    }
}

/// Rate-equation engine for an atom at a fixed position, moving at a fixed
/// velocity (entering only through Doppler shifts).
#[derive(Clone, Debug)]
pub struct RateEquations<'a, L, B>
where
    L: LightField,
    B: MagneticField,
{
    ham: &'a Hamiltonian,
    light: &'a L,
    mag: &'a B,
    r0: Vec3,
    v: Vec3,
    integrator: Integrator,
    tolerance: f64,
    N0: Option<nd::Array1<f64>>,
    solution: Option<PopulationSolution>,
}

impl<'a, L, B> RateEquations<'a, L, B>
where
    L: LightField,
    B: MagneticField,
{
    /// Create a new engine with the atom at rest at the origin.
    pub fn new(ham: &'a Hamiltonian, light: &'a L, mag: &'a B) -> Self {
        Self {
            ham,
            light,
            mag,
            r0: [0.0; 3],
            v: [0.0; 3],
            integrator: Integrator::default(),
            tolerance: 1e-6,
            N0: None,
            solution: None,
        }
    }

    pub fn with_position(mut self, r0: Vec3) -> Self {
        self.r0 = r0;
        self
    }

    pub fn with_velocity(mut self, v: Vec3) -> Self {
        self.v = v;
        self
    }

    /// Set the default integrator for [`Self::evolve_populations`].
    pub fn with_integrator(mut self, integrator: Integrator) -> Self {
        self.integrator = integrator;
        self
    }

    /// Set the tolerance used by the post-evolution conservation check.
    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }

    /// Take the integrator and invariant tolerance from a configuration.
    pub fn with_config(self, config: &SimConfig) -> Self {
        self.with_integrator(config.integrator)
            .with_tolerance(config.invariants.tolerance)
    }

    pub fn hamiltonian(&self) -> &Hamiltonian { self.ham }

    pub fn position(&self) -> &Vec3 { &self.r0 }

    pub fn velocity(&self) -> &Vec3 { &self.v }

    pub fn initial_population(&self) -> Option<&nd::Array1<f64>> {
        self.N0.as_ref()
    }

    /// Most recent successful solution.
    pub fn solution(&self) -> Option<&PopulationSolution> {
        self.solution.as_ref()
    }

    /// Set the initial populations.
    ///
    /// Fails if the length is not the number of sublevels or if any entry is
    /// negative or non-finite.
    pub fn set_initial_population(&mut self, N0: nd::Array1<f64>) -> Result<()> {
        LengthError::check(self.ham.dim(), &N0)?;
        SetupError::check_populations(&N0)?;
        self.N0 = Some(N0);
        Ok(())
    }

    /// Set the initial populations to the steady state at the atom's position
    /// and velocity at `t = 0`.
    pub fn set_initial_population_from_equilibrium(&mut self) -> Result<()> {
        let N = self.equilibrium_populations(self.r0, self.v, 0.0)?;
        // the direct solve can leave tiny negative round-off
        self.N0 = Some(N.mapv(|n| n.max(0.0)));
        Ok(())
    }

    /// Build the rate matrix `R` such that `dN/dt = R N` at position `r`,
    /// velocity `v` and time `t`.
    ///
    /// Every column of `R` sums to zero.
    pub fn rate_matrix(&self, r: Vec3, v: Vec3, t: f64)
        -> Result<nd::Array2<f64>>
    {
        let ng = self.ham.n_ground();
        let ne = self.ham.n_excited();
        let n = ng + ne;
        let gamma = self.ham.linewidth();
        let frame = self.ham.diagonalize_static_field(&self.mag.field(&r, t))?;
        let mut R: nd::Array2<f64> = nd::Array2::zeros((n, n));

        for beam in self.light.beams_at(&r, t) {
            if beam.beta <= 0.0 { continue; }
            let delta_eff = beam.delta - dot(&beam.kvec, &v);
            let a = beam.pol.components();
            for (i, j) in (0..ng).cartesian_product(0..ne) {
                let c: C64
                    = a.iter().zip(frame.dipole.iter())
                    .map(|(aq, dq)| aq.conj() * dq[[i, j]])
                    .sum();
                let c2 = c.norm_sqr();
                if c2 <= f64::EPSILON { continue; }
                let dE = frame.excited_energies[j] - frame.ground_energies[i];
                let lorentz
                    = 1.0 + 4.0 * (delta_eff - dE).powi(2) / gamma.powi(2);
                let rate = gamma / 2.0 * beam.beta * c2 / lorentz;
                R[[ng + j, i]] += rate;
                R[[i, ng + j]] += rate;
            }
        }

        for (i, j) in (0..ng).cartesian_product(0..ne) {
            let branch: f64
                = frame.dipole.iter().map(|dq| dq[[i, j]].norm_sqr()).sum();
            R[[i, ng + j]] += gamma * branch;
        }

        for k in 0..n {
            let loss: f64
                = R.column(k).iter().enumerate()
                .filter(|(m, _)| *m != k)
                .map(|(_, x)| *x)
                .sum();
            R[[k, k]] = -loss;
        }
        Ok(R)
    }

    /// Steady-state populations at `(r, v, t)`, normalized to unit total.
    ///
    /// Solves `R N = 0` with the last equation replaced by `sum N = 1`.
    pub fn equilibrium_populations(&self, r: Vec3, v: Vec3, t: f64)
        -> Result<nd::Array1<f64>>
    {
        let mut A = self.rate_matrix(r, v, t)?;
        let n = A.nrows();
        A.row_mut(n - 1).fill(1.0);
        let mut b: nd::Array1<f64> = nd::Array1::zeros(n);
        b[n - 1] = 1.0;
        let N = A.solve_into(b)?;
        debug!(n, "solved for equilibrium populations");
        Ok(N)
    }

    /// Integrate `dN/dt = R(t) N` over `t_span`.
    ///
    /// If both field collaborators are static, `R` is built once; otherwise
    /// it is rebuilt at every evaluation. If `integrator` is `None`, the
    /// engine's default is used. On success the solution is stored and
    /// returned; on failure the previous solution is kept. Drift of the total
    /// population beyond the engine's tolerance is logged but not raised.
    pub fn evolve_populations(
        &mut self,
        t_span: (f64, f64),
        t_eval: Option<&nd::Array1<f64>>,
        integrator: Option<Integrator>,
    ) -> Result<PopulationSolution>
    {
        let N0 = self.N0.as_ref().ok_or(SetupError::NoInitialState)?;
        let method = integrator.unwrap_or(self.integrator);
        SetupError::check_span(t_span)?;
        let sol = if self.light.is_static() && self.mag.is_static() {
            debug!("fields are static; building rate matrix once");
            let R = self.rate_matrix(self.r0, self.v, t_span.0)?;
            ode::solve(|_, N| Ok(R.dot(N)), t_span, N0, t_eval, &method)?
        } else {
            ode::solve(
                |t, N| Ok(self.rate_matrix(self.r0, self.v, t)?.dot(N)),
                t_span,
                N0,
                t_eval,
                &method,
            )?
        };
        info!(
            steps = sol.stats.steps,
            evaluations = sol.stats.evaluations,
            "evolved populations",
        );
        let solution = PopulationSolution { t: sol.t, populations: sol.y };
        if let Err(err) = solution.check_conservation(self.tolerance) {
            warn!(%err, "population conservation check failed");
        }
        self.solution = Some(solution.clone());
        Ok(solution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use crate::{
        error::Error,
        fields::{ FnField, LaserBeam, LaserBeams, Polarization, UniformField },
        structure::Manifold,
    };

    fn two_level() -> Hamiltonian {
        Hamiltonian::bare_hyperfine(
            Manifold::new(0.0).unwrap(),
            Manifold::new(1.0).unwrap().with_gfactor(1.0),
        ).unwrap()
    }

    fn sigma_plus(beta: f64, delta: f64) -> LaserBeams<'static> {
        let k = [0.0, 0.0, 1.0];
        LaserBeams::new().with_beam(
            LaserBeam::new(k, Polarization::circular(1, &k).unwrap(), beta, delta)
                .unwrap()
        )
    }

    #[test]
    fn two_level_rates() {
        let ham = two_level();
        let light = sigma_plus(2.0, 0.0);
        let mag = UniformField::zero();
        let re = RateEquations::new(&ham, &light, &mag);
        let R = re.rate_matrix([0.0; 3], [0.0; 3], 0.0).unwrap();
        // only g -> e(m = +1) is driven
        assert_abs_diff_eq!(R[[3, 0]], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(R[[0, 3]], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(R[[1, 0]], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(R[[0, 0]], -1.0, epsilon = 1e-12);
        for col in R.columns() {
            assert_abs_diff_eq!(col.sum(), 0.0, epsilon = 1e-12);
        }

        let N = re.equilibrium_populations([0.0; 3], [0.0; 3], 0.0).unwrap();
        assert_abs_diff_eq!(N[0], 2.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(N[3], 1.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn doppler_and_zeeman_shifts() {
        let ham = two_level();
        let mag = UniformField::new([0.0, 0.0, 1.5]).unwrap();
        // e(m = +1) is shifted down by 1.5, so a red detuning is resonant ...
        let light = sigma_plus(2.0, -1.5);
        let re = RateEquations::new(&ham, &light, &mag);
        let R = re.rate_matrix([0.0; 3], [0.0; 3], 0.0).unwrap();
        assert_abs_diff_eq!(R[[3, 0]], 1.0, epsilon = 1e-12);
        let light = sigma_plus(2.0, 1.5);
        let re = RateEquations::new(&ham, &light, &mag);
        let R = re.rate_matrix([0.0; 3], [0.0; 3], 0.0).unwrap();
        assert_abs_diff_eq!(R[[3, 0]], 1.0 / (1.0 + 4.0 * 3.0 * 3.0), epsilon = 1e-12);
        // ... as is zero detuning for an atom moving along the beam
        let light = sigma_plus(2.0, 0.0);
        let re = RateEquations::new(&ham, &light, &mag);
        let R = re.rate_matrix([0.0; 3], [0.0, 0.0, 1.5], 0.0).unwrap();
        assert_abs_diff_eq!(R[[3, 0]], 1.0, epsilon = 1e-12);
        let R = re.rate_matrix([0.0; 3], [0.0; 3], 0.0).unwrap();
        assert_abs_diff_eq!(R[[3, 0]], 1.0 / (1.0 + 4.0 * 1.5 * 1.5), epsilon = 1e-12);
    }

    #[test]
    fn setup_errors() {
        let ham = two_level();
        let light = sigma_plus(2.0, 0.0);
        let mag = UniformField::zero();
        let mut re = RateEquations::new(&ham, &light, &mag);
        assert!(matches!(
            re.evolve_populations((0.0, 1.0), None, None),
            Err(Error::Setup(SetupError::NoInitialState)),
        ));
        assert!(matches!(
            re.set_initial_population(nd::array![1.0, 0.0, 0.0]),
            Err(Error::Setup(SetupError::Length(_))),
        ));
        assert!(matches!(
            re.set_initial_population(nd::array![1.0, 0.0, -1e-3, 0.0]),
            Err(Error::Setup(SetupError::BadPopulation(2, _))),
        ));
        re.set_initial_population(nd::array![1.0, 0.0, 0.0, 0.0]).unwrap();
        assert!(re.evolve_populations((1.0, 0.0), None, None).is_err());
        assert!(re.solution().is_none());
    }

    #[test]
    fn static_and_dynamic_paths_agree() {
        let ham = two_level();
        let light = sigma_plus(1.0, -0.5);
        let uniform = UniformField::new([0.0, 0.0, 0.3]).unwrap();
        let closure = FnField::new(|_, _| [0.0, 0.0, 0.3]);
        let N0 = nd::array![1.0, 0.0, 0.0, 0.0];
        let t_eval = nd::Array1::linspace(0.0, 5.0, 11);

        let mut re_static = RateEquations::new(&ham, &light, &uniform);
        re_static.set_initial_population(N0.clone()).unwrap();
        let a = re_static.evolve_populations((0.0, 5.0), Some(&t_eval), None).unwrap();

        let mut re_dyn = RateEquations::new(&ham, &light, &closure);
        re_dyn.set_initial_population(N0).unwrap();
        let b = re_dyn.evolve_populations((0.0, 5.0), Some(&t_eval), None).unwrap();

        for (x, y) in a.populations.iter().zip(&b.populations) {
            assert_abs_diff_eq!(*x, *y, epsilon = 1e-9);
        }
        assert!(a.check_conservation(1e-6).is_ok());
        a.totals().iter().for_each(|s| assert_abs_diff_eq!(*s, 1.0, epsilon = 1e-6));
        assert_eq!(re_static.solution(), Some(&a));
    }

    #[test]
    fn equilibrium_initial_state_is_stationary() {
        let ham = Hamiltonian::bare_hyperfine(
            Manifold::new(1.0).unwrap(),
            Manifold::new(2.0).unwrap().with_gfactor(0.5),
        ).unwrap();
        let light = LaserBeams::mot_3d(1.0, 1, 0.5, -1.0).unwrap();
        let mag = UniformField::new([0.0, 0.0, 0.2]).unwrap();
        let mut re = RateEquations::new(&ham, &light, &mag);
        re.set_initial_population_from_equilibrium().unwrap();
        let N0 = re.initial_population().unwrap().clone();
        assert_abs_diff_eq!(N0.sum(), 1.0, epsilon = 1e-10);
        let sol = re.evolve_populations((0.0, 10.0), None, None).unwrap();
        let Nf = sol.final_populations().unwrap();
        for (a, b) in N0.iter().zip(&Nf) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-6);
        }
    }
}
