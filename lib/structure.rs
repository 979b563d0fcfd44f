//! Atomic structure for a ground/excited pair of angular-momentum manifolds.
//!
//! A [`Manifold`] is a single hyperfine (or fine-structure) level `F` with its
//! `2F + 1` Zeeman sublevels, ordered by ascending `m_F`. A [`DipoleTensor`]
//! holds the spherical components of the electric dipole operator between two
//! manifolds, expressed through Clebsch-Gordan coefficients.

use std::f64::consts::FRAC_1_SQRT_2;
use ndarray as nd;
use num_complex::Complex64 as C64;
use tracing::debug;
use crate::{
    error::StructureError,
    fields::{ SphericalVector, Vec3 },
    spin::{ Spin, SpinTotal, cg },
};

/// A single angular-momentum manifold.
#[derive(Clone, Debug, PartialEq)]
pub struct Manifold {
    total: SpinTotal,
    sublevels: Vec<Spin>,
    gfactor: f64,
    mu_b: f64,
    energy: f64,
}

impl Manifold {
    /// Create a manifold of total angular momentum `F` with `g = 0`,
    /// `mu_b = 1`, and zero bare energy.
    ///
    /// Fails if `F` is negative, non-finite, or not a multiple of 1/2.
    pub fn new(F: f64) -> Result<Self, StructureError> {
        let total = SpinTotal::from_f64(F)?;
        Ok(Self {
            total,
            sublevels: total.iter().collect(),
            gfactor: 0.0,
            mu_b: 1.0,
            energy: 0.0,
        })
    }

    /// Set the Landé g-factor.
    pub fn with_gfactor(mut self, g: f64) -> Self {
        self.gfactor = g;
        self
    }

    /// Set the Bohr magneton scale, converting field units to energy units.
    pub fn with_mu_b(mut self, mu_b: f64) -> Self {
        self.mu_b = mu_b;
        self
    }

    /// Set the bare energy of the manifold.
    pub fn with_energy(mut self, energy: f64) -> Self {
        self.energy = energy;
        self
    }

    pub(crate) fn check(&self) -> Result<(), StructureError> {
        StructureError::check_finite("gfactor", self.gfactor)?;
        StructureError::check_finite("mu_b", self.mu_b)?;
        StructureError::check_finite("energy", self.energy)?;
        Ok(())
    }

    /// Number of sublevels, `2F + 1`.
    pub fn dim(&self) -> usize { self.sublevels.len() }

    pub fn total(&self) -> SpinTotal { self.total }

    /// `F` as an `f64`.
    pub fn f(&self) -> f64 { self.total.f() }

    pub fn gfactor(&self) -> f64 { self.gfactor }

    pub fn mu_b(&self) -> f64 { self.mu_b }

    pub fn energy(&self) -> f64 { self.energy }

    /// Sublevel labels by ascending `m_F`.
    pub fn sublevels(&self) -> &[Spin] { &self.sublevels }

    /// Diagonal bare-energy operator.
    pub fn bare_hamiltonian(&self) -> nd::Array2<C64> {
        nd::Array2::<C64>::eye(self.dim()) * C64::from(self.energy)
    }

    /// Cartesian angular momentum operators `[F_x, F_y, F_z]`.
    pub fn angular_momentum(&self) -> [nd::Array2<C64>; 3] {
        let n = self.dim();
        let F = self.f();
        let mut Fp: nd::Array2<C64> = nd::Array2::zeros((n, n));
        let mut Fz: nd::Array2<C64> = nd::Array2::zeros((n, n));
        for (k, s) in self.sublevels.iter().enumerate() {
            let m = s.proj().f();
            Fz[[k, k]] = C64::from(m);
            if k + 1 < n {
                // <m + 1| F+ |m>
                Fp[[k + 1, k]]
                    = C64::from((F * (F + 1.0) - m * (m + 1.0)).sqrt());
            }
        }
        let Fm = Fp.t().to_owned();
        let Fx = (&Fp + &Fm) * C64::from(0.5);
        let Fy = (&Fp - &Fm) * C64::new(0.0, -0.5);
        [Fx, Fy, Fz]
    }

    /// Cartesian magnetic moment operators `mu_k = -g mu_b F_k`.
    pub fn moment(&self) -> [nd::Array2<C64>; 3] {
        let s = C64::from(-self.gfactor * self.mu_b);
        self.angular_momentum().map(|Fk| Fk * s)
    }

    /// Spherical magnetic moment operators `[mu_{-1}, mu_0, mu_{+1}]`.
    pub fn moment_spherical(&self) -> [nd::Array2<C64>; 3] {
        let [mux, muy, muz] = self.moment();
        let i = C64::i();
        let mu_m = (&mux - &muy * i) * C64::from(FRAC_1_SQRT_2);
        let mu_p = (&mux + &muy * i) * C64::from(-FRAC_1_SQRT_2);
        [mu_m, muz, mu_p]
    }

    /// Zeeman Hamiltonian `mu . B = -g mu_b F . B`.
    ///
    /// For `g > 0` the `+m` sublevels shift down in a field along `+z`.
    pub fn zeeman(&self, B: &Vec3) -> nd::Array2<C64> {
        let n = self.dim();
        if self.gfactor == 0.0 || B.iter().all(|b| *b == 0.0) {
            return nd::Array2::zeros((n, n));
        }
        let mu = self.moment();
        mu.iter().zip(B)
            .fold(nd::Array2::zeros((n, n)), |acc, (muk, bk)| {
                acc + muk * C64::from(*bk)
            })
    }
}

/// Spherical components `d_q`, `q = -1, 0, +1`, of the dipole operator between
/// a ground and an excited manifold.
///
/// Each component is a real `(n_g, n_e)` matrix with
/// `d_q[g, e] = <F_g m_g; 1 q | F_e m_e>`, non-zero only when
/// `m_e = m_g + q`. Columns are normalized so that every excited sublevel has
/// unit total emission weight `sum_{g, q} |d_q[g, e]|^2 = 1`.
#[derive(Clone, Debug, PartialEq)]
pub struct DipoleTensor {
    d: [nd::Array2<f64>; 3],
}

impl DipoleTensor {
    /// Build the dipole tensor for a bare hyperfine transition.
    ///
    /// Fails if `|F_e - F_g|` is not 0 or 1, or if `F_g = F_e = 0`.
    pub fn bare_hyperfine(ground: &Manifold, excited: &Manifold)
        -> Result<Self, StructureError>
    {
        let dF = i64::from(excited.total().halves())
            - i64::from(ground.total().halves());
        let allowed
            = matches!(dF, -2 | 0 | 2)
            && !(ground.total().halves() == 0 && excited.total().halves() == 0);
        if !allowed {
            return Err(StructureError::DipoleForbidden(ground.f(), excited.f()));
        }
        let ng = ground.dim();
        let ne = excited.dim();
        let d: [nd::Array2<f64>; 3] = [-1, 0, 1].map(|q| {
            let mut dq: nd::Array2<f64> = nd::Array2::zeros((ng, ne));
            let Some(photon) = Spin::new(2, 2 * q) else { return dq; };
            for (g, sg) in ground.sublevels().iter().enumerate() {
                let me = sg.proj().halves() + 2 * q;
                let Some(e)
                    = excited.sublevels().iter()
                    .position(|s| s.proj().halves() == me)
                    else { continue; };
                dq[[g, e]] = cg(*sg, photon, excited.sublevels()[e]);
            }
            dq
        });
        debug!(
            F_g = ground.f(),
            F_e = excited.f(),
            "built bare hyperfine dipole tensor",
        );
        Ok(Self { d })
    }

    /// Build a dipole tensor from explicit components `[d_{-1}, d_0, d_{+1}]`.
    ///
    /// Fails if the components do not share a common shape.
    pub fn from_components(d: [nd::Array2<f64>; 3])
        -> Result<Self, StructureError>
    {
        let shape = d[1].dim();
        match d.iter().find(|dq| dq.dim() != shape) {
            Some(dq) => Err(StructureError::DipoleShape(dq.dim(), shape)),
            None => Ok(Self { d }),
        }
    }

    /// Component `d_q`, if `q` is one of `-1, 0, +1`.
    pub fn component(&self, q: i32) -> Option<&nd::Array2<f64>> {
        match q {
            -1 => Some(&self.d[0]),
            0 => Some(&self.d[1]),
            1 => Some(&self.d[2]),
            _ => None,
        }
    }

    /// All components, ordered `[d_{-1}, d_0, d_{+1}]`.
    pub fn components(&self) -> &[nd::Array2<f64>; 3] { &self.d }

    /// `(n_g, n_e)`
    pub fn shape(&self) -> (usize, usize) { self.d[1].dim() }

    /// Spontaneous branching ratios `sum_q |d_q[g, e]|^2`.
    pub fn branching_ratios(&self) -> nd::Array2<f64> {
        self.d.iter()
            .fold(nd::Array2::zeros(self.shape()), |acc, dq| {
                acc + dq.mapv(|x| x * x)
            })
    }

    /// Project onto a spherical field vector: `sum_q a_q d_q`.
    pub fn project(&self, field: &SphericalVector) -> nd::Array2<C64> {
        let (ng, ne) = self.shape();
        (-1..=1).zip(&self.d)
            .fold(nd::Array2::zeros((ng, ne)), |acc, (q, dq)| {
                let a = field.get(q);
                acc + dq.mapv(|x| a * x)
            })
    }
}
