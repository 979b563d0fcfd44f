//! Assembly of the full ground/excited Hamiltonian for a single optical
//! transition.
//!
//! Matrices are laid out over the basis of all ground sublevels followed by all
//! excited sublevels, each by ascending `m_F`. Energies are in units of the
//! natural linewidth `Gamma` with `hbar = 1`, in the frame rotating at the
//! laser frequency: a beam of detuning `delta` contributes a field phasor
//! rotating as `exp(-i delta t)`, and the excited manifold is additionally
//! shifted by `-delta_H`.

use std::fmt;
use ndarray::{ self as nd, s };
use ndarray_linalg::{ self as la, Eigh };
use num_complex::Complex64 as C64;
use tracing::debug;
use crate::{
    error::{ Result, StructureError },
    fields::{ SphericalVector, Vec3 },
    hilbert::{ Basis, Level, Sublevel },
    structure::{ DipoleTensor, Manifold },
};

/// Ground/excited Hamiltonian for one dipole transition.
#[derive(Clone, Debug, PartialEq)]
pub struct Hamiltonian {
    ground: Manifold,
    excited: Manifold,
    dipole: DipoleTensor,
    gamma: f64,
    delta: f64,
    basis: Basis,
}

impl Hamiltonian {
    /// Pair two manifolds with a dipole tensor.
    ///
    /// Fails if the tensor's shape does not match `(n_g, n_e)` or if either
    /// manifold carries non-finite parameters.
    pub fn new(ground: Manifold, excited: Manifold, dipole: DipoleTensor)
        -> std::result::Result<Self, StructureError>
    {
        ground.check()?;
        excited.check()?;
        let expected = (ground.dim(), excited.dim());
        if dipole.shape() != expected {
            return Err(StructureError::DipoleShape(dipole.shape(), expected));
        }
        let basis: Basis
            = ground.sublevels().iter()
            .map(|s| (Sublevel::new(Level::Ground, *s), ground.energy()))
            .chain(
                excited.sublevels().iter()
                .map(|s| (Sublevel::new(Level::Excited, *s), excited.energy()))
            )
            .collect();
        debug!(
            n_ground = expected.0,
            n_excited = expected.1,
            "assembled hamiltonian structure",
        );
        Ok(Self { ground, excited, dipole, gamma: 1.0, delta: 0.0, basis })
    }

    /// Pair two manifolds with their bare hyperfine dipole tensor.
    pub fn bare_hyperfine(ground: Manifold, excited: Manifold)
        -> std::result::Result<Self, StructureError>
    {
        let dipole = DipoleTensor::bare_hyperfine(&ground, &excited)?;
        Self::new(ground, excited, dipole)
    }

    /// Set the natural linewidth of the excited manifold.
    pub fn with_linewidth(mut self, gamma: f64)
        -> std::result::Result<Self, StructureError>
    {
        StructureError::check_linewidth(gamma)?;
        self.gamma = gamma;
        Ok(self)
    }

    /// Set a global detuning, applied as `-delta` on the excited diagonal.
    pub fn with_detuning(mut self, delta: f64)
        -> std::result::Result<Self, StructureError>
    {
        StructureError::check_finite("delta", delta)?;
        self.delta = delta;
        Ok(self)
    }

    pub fn ground(&self) -> &Manifold { &self.ground }

    pub fn excited(&self) -> &Manifold { &self.excited }

    pub fn dipole(&self) -> &DipoleTensor { &self.dipole }

    /// Natural linewidth `Gamma`.
    pub fn linewidth(&self) -> f64 { self.gamma }

    pub fn detuning(&self) -> f64 { self.delta }

    pub fn n_ground(&self) -> usize { self.ground.dim() }

    pub fn n_excited(&self) -> usize { self.excited.dim() }

    /// Total number of sublevels.
    pub fn dim(&self) -> usize { self.ground.dim() + self.excited.dim() }

    /// Labelled basis, in matrix index order.
    pub fn basis(&self) -> &Basis { &self.basis }

    /// Diagonal blocks `(H_gg, H_ee)` including bare energies, Zeeman shifts
    /// and the global detuning.
    pub fn diagonal_blocks(&self, B: &Vec3)
        -> (nd::Array2<C64>, nd::Array2<C64>)
    {
        let Hg = self.ground.bare_hamiltonian() + self.ground.zeeman(B);
        let mut He = self.excited.bare_hamiltonian() + self.excited.zeeman(B);
        He.diag_mut().iter_mut().for_each(|h| { *h -= self.delta; });
        (Hg, He)
    }

    /// Ground-by-excited coupling block `H_ge[g, e] = -1/2 sum_q E_q^* d_q[g, e]`.
    ///
    /// The excited-by-ground block is its conjugate transpose.
    pub fn coupling_block(&self, field: &SphericalVector) -> nd::Array2<C64> {
        self.dipole.project(field).mapv(|x| -0.5 * x.conj())
    }

    /// Build the full Hamiltonian for an instantaneous coherent field `field`
    /// and magnetic field `B`.
    ///
    /// The result is Hermitian by construction.
    pub fn build(&self, field: &SphericalVector, B: &Vec3) -> nd::Array2<C64> {
        let ng = self.n_ground();
        let n = self.dim();
        let (Hg, He) = self.diagonal_blocks(B);
        let Hge = self.coupling_block(field);
        let mut H: nd::Array2<C64> = nd::Array2::zeros((n, n));
        H.slice_mut(s![..ng, ..ng]).assign(&Hg);
        H.slice_mut(s![ng.., ng..]).assign(&He);
        H.slice_mut(s![ng.., ..ng]).assign(&Hge.t().mapv(|x| x.conj()));
        H.slice_mut(s![..ng, ng..]).assign(&Hge);
        H
    }

    /// Diagonalize the static-field part of the Hamiltonian and rotate the
    /// dipole tensor into the resulting eigenbasis.
    ///
    /// A block that is already diagonal (e.g. zero field or a field along `z`)
    /// keeps the bare `m_F` ordering.
    pub fn diagonalize_static_field(&self, B: &Vec3) -> Result<ZeemanFrame> {
        let (Hg, He) = self.diagonal_blocks(B);
        let (Eg, Ug) = diagonalize_block(Hg)?;
        let (Ee, Ue) = diagonalize_block(He)?;
        let Ug_dag = Ug.t().mapv(|x| x.conj());
        let dipole: [nd::Array2<C64>; 3]
            = self.dipole.components()
            .clone()
            .map(|dq| Ug_dag.dot(&dq.mapv(C64::from)).dot(&Ue));
        Ok(ZeemanFrame {
            ground_energies: Eg,
            excited_energies: Ee,
            ground_vectors: Ug,
            excited_vectors: Ue,
            dipole,
        })
    }

    /// Summary of the level structure and non-zero dipole couplings.
    pub fn coupling_structure(&self) -> CouplingStructure {
        let gs: Vec<Sublevel>
            = self.basis.keys().filter(|s| s.is_ground()).copied().collect();
        let es: Vec<Sublevel>
            = self.basis.keys().filter(|s| s.is_excited()).copied().collect();
        let mut couplings: Vec<Coupling> = Vec::new();
        for (q, dq) in (-1..=1).zip(self.dipole.components()) {
            for ((g, e), &d) in dq.indexed_iter() {
                if d.abs() > 1e-12 {
                    couplings.push(
                        Coupling { q, ground: gs[g], excited: es[e], strength: d });
                }
            }
        }
        CouplingStructure {
            F_g: self.ground.f(),
            F_e: self.excited.f(),
            g_g: self.ground.gfactor(),
            g_e: self.excited.gfactor(),
            E_g: self.ground.energy(),
            E_e: self.excited.energy(),
            gamma: self.gamma,
            delta: self.delta,
            couplings,
        }
    }

    /// Print [`Self::coupling_structure`] to stdout.
    pub fn print_structure(&self) { println!("{}", self.coupling_structure()); }
}

fn is_diagonal(A: &nd::Array2<C64>) -> bool {
    let scale = A.iter().map(|a| a.norm()).fold(0.0, f64::max).max(1.0);
    A.indexed_iter()
        .all(|((i, j), a)| i == j || a.norm() <= 1e-14 * scale)
}

fn diagonalize_block(A: nd::Array2<C64>)
    -> Result<(nd::Array1<f64>, nd::Array2<C64>)>
{
    if is_diagonal(&A) {
        let E = A.diag().mapv(|a| a.re);
        return Ok((E, nd::Array2::eye(A.nrows())));
    }
    let (E, V) = A.eigh(la::UPLO::Lower)?;
    Ok((E, V))
}

/// Static-field eigenbasis of a [`Hamiltonian`].
///
/// Eigenvectors are stored as columns over the bare `m_F` basis of each
/// manifold. Dipole components are `U_g^dag d_q U_e`, ordered
/// `[d_{-1}, d_0, d_{+1}]`.
#[derive(Clone, Debug, PartialEq)]
pub struct ZeemanFrame {
    pub ground_energies: nd::Array1<f64>,
    pub excited_energies: nd::Array1<f64>,
    pub ground_vectors: nd::Array2<C64>,
    pub excited_vectors: nd::Array2<C64>,
    pub dipole: [nd::Array2<C64>; 3],
}

/// A single non-zero dipole coupling.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Coupling {
    pub q: i32,
    pub ground: Sublevel,
    pub excited: Sublevel,
    pub strength: f64,
}

/// Human-readable report of a [`Hamiltonian`]'s structure.
#[derive(Clone, Debug, PartialEq)]
pub struct CouplingStructure {
    pub F_g: f64,
    pub F_e: f64,
    pub g_g: f64,
    pub g_e: f64,
    pub E_g: f64,
    pub E_e: f64,
    pub gamma: f64,
    pub delta: f64,
    pub couplings: Vec<Coupling>,
}

impl fmt::Display for CouplingStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f,
            "transition F = {} -> F' = {} (Gamma = {}, delta = {})",
            self.F_g, self.F_e, self.gamma, self.delta,
        )?;
        writeln!(f, "  ground:  E0 = {}, g = {}", self.E_g, self.g_g)?;
        writeln!(f, "  excited: E0 = {}, g = {}", self.E_e, self.g_e)?;
        for q in -1..=1 {
            writeln!(f, "  d_q, q = {:+}:", q)?;
            for c in self.couplings.iter().filter(|c| c.q == q) {
                writeln!(f,
                    "    {} <-> {}: {:+.6}",
                    c.ground, c.excited, c.strength,
                )?;
            }
        }
        Ok(())
    }
}
