//! Sublevel labels and the ordered basis shared by every matrix in the crate.

use std::{ fmt, hash::Hash, ops::Deref };
use ndarray as nd;
use indexmap::IndexMap;
use num_complex::Complex64 as C64;
use num_traits::One;
use crate::spin::Spin;

/* Sublevels ******************************************************************/

/// Which side of the optical transition a sublevel sits on.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Ground,
    Excited,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self { Self::Ground => "g", Self::Excited => "e" })
    }
}

/// A single Zeeman sublevel `|F, m_F>` of either manifold.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Sublevel {
    pub level: Level,
    pub spin: Spin,
}

impl Sublevel {
    pub fn new(level: Level, spin: Spin) -> Self { Self { level, spin } }

    pub fn is_ground(&self) -> bool { self.level == Level::Ground }

    pub fn is_excited(&self) -> bool { self.level == Level::Excited }
}

impl fmt::Display for Sublevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (F, m) = self.spin.f();
        write!(f, "|{}; F={}, m={:+}>", self.level, F, m)
    }
}

/// `|a><b|` for two amplitude vectors.
pub fn outer_prod(a: &nd::Array1<C64>, b: &nd::Array1<C64>)
    -> nd::Array2<C64>
{
    nd::Array2::from_shape_fn((a.len(), b.len()), |(i, j)| a[i] * b[j].conj())
}

/* Basis **********************************************************************/

/// Ordered map from sublevel labels to bare energies (in units of `Gamma`).
///
/// Insertion order fixes the row/column index of each label. The underlying
/// [`IndexMap`] is exposed read-only through [`Deref`].
#[derive(Clone, Debug, PartialEq)]
pub struct Basis<S = Sublevel>
where S: Clone + Eq + Hash
{
    levels: IndexMap<S, f64>,
}

impl<S> AsRef<IndexMap<S, f64>> for Basis<S>
where S: Clone + Eq + Hash
{
    fn as_ref(&self) -> &IndexMap<S, f64> { &self.levels }
}

impl<S> Deref for Basis<S>
where S: Clone + Eq + Hash
{
    type Target = IndexMap<S, f64>;

    fn deref(&self) -> &Self::Target { &self.levels }
}

impl<S> Default for Basis<S>
where S: Clone + Eq + Hash
{
    fn default() -> Self { Self { levels: IndexMap::new() } }
}

impl<S> FromIterator<(S, f64)> for Basis<S>
where S: Clone + Eq + Hash
{
    fn from_iter<I>(iter: I) -> Self
    where I: IntoIterator<Item = (S, f64)>
    {
        Self { levels: IndexMap::from_iter(iter) }
    }
}

impl<S> Basis<S>
where S: Clone + Eq + Hash
{
    pub fn new() -> Self { Self::default() }

    /// Row/column index of `state`.
    pub fn get_index(&self, state: &S) -> Option<usize> {
        self.levels.get_index_of(state)
    }

    /// Unit vector selecting `state`.
    pub fn get_vector(&self, state: &S) -> Option<nd::Array1<C64>> {
        self.get_index(state).and_then(|k| self.get_vector_index(k))
    }

    /// Unit vector selecting the `index`-th label.
    pub fn get_vector_index(&self, index: usize) -> Option<nd::Array1<C64>> {
        let n = self.levels.len();
        (index < n).then(|| {
            let mut v: nd::Array1<C64> = nd::Array1::zeros(n);
            v[index] = C64::one();
            v
        })
    }

    /// Amplitude vector with entries `amp(label, index, energy)`.
    pub fn get_vector_weighted<F>(&self, amp: F) -> nd::Array1<C64>
    where F: Fn(&S, usize, f64) -> C64
    {
        self.levels.iter().enumerate()
            .map(|(k, (s, e))| amp(s, k, *e))
            .collect()
    }

    /// Projector onto `state`.
    pub fn get_density(&self, state: &S) -> Option<nd::Array2<C64>> {
        self.get_index(state).and_then(|k| self.get_density_index(k))
    }

    /// Projector onto the `index`-th label.
    pub fn get_density_index(&self, index: usize) -> Option<nd::Array2<C64>> {
        let n = self.levels.len();
        (index < n).then(|| {
            let mut rho: nd::Array2<C64> = nd::Array2::zeros((n, n));
            rho[[index, index]] = C64::one();
            rho
        })
    }

    /// Pure-state density matrix built from normalized amplitudes
    /// `amp(label, index, energy)`.
    ///
    /// Returns `None` if all amplitudes vanish or any is non-finite.
    pub fn get_density_weighted_pure<F>(&self, amp: F)
        -> Option<nd::Array2<C64>>
    where F: Fn(&S, usize, f64) -> C64
    {
        let psi = self.get_vector_weighted(amp);
        let norm = psi.iter().map(|a| a.norm_sqr()).sum::<f64>().sqrt();
        (norm > 0.0 && norm.is_finite())
            .then(|| {
                let psi = psi / C64::from(norm);
                outer_prod(&psi, &psi)
            })
    }

    /// Diagonal (incoherent mixture) density matrix with populations
    /// `pop(label, index, energy)`, used as given.
    pub fn get_density_diag<F>(&self, pop: F) -> nd::Array2<C64>
    where F: Fn(&S, usize, f64) -> f64
    {
        let diag: nd::Array1<C64>
            = self.get_vector_weighted(|s, k, e| C64::from(pop(s, k, e)));
        nd::Array2::from_diag(&diag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_level() -> Basis {
        let g = Sublevel::new(Level::Ground, Spin::new(0, 0).unwrap());
        let e = Sublevel::new(Level::Excited, Spin::new(0, 0).unwrap());
        [(g, 0.0), (e, 1.0)].into_iter().collect()
    }

    #[test]
    fn vectors_and_densities() {
        let basis = two_level();
        let e = *basis.keys().nth(1).unwrap();
        assert_eq!(basis.get_index(&e), Some(1));
        let v = basis.get_vector(&e).unwrap();
        assert_eq!(v[1], C64::from(1.0));
        assert_eq!(v[0], C64::from(0.0));
        let rho = basis.get_density(&e).unwrap();
        assert_eq!(rho[[1, 1]], C64::from(1.0));
        assert_eq!(rho.sum(), C64::from(1.0));
        assert!(basis.get_vector_index(2).is_none());
        let mix = basis.get_density_diag(|s, _, _| if s.is_ground() { 0.25 } else { 0.75 });
        assert_eq!(mix[[0, 0]], C64::from(0.25));
        assert_eq!(mix[[0, 1]], C64::from(0.0));
    }

    #[test]
    fn weighted_pure_is_normalized() {
        let basis = two_level();
        let rho = basis.get_density_weighted_pure(|_, _, _| C64::from(1.0)).unwrap();
        let tr: C64 = rho.diag().iter().sum();
        assert!((tr - C64::from(1.0)).norm() < 1e-12);
        assert!((rho[[0, 1]] - C64::from(0.5)).norm() < 1e-12);
        assert!(basis.get_density_weighted_pure(|_, _, _| C64::from(0.0)).is_none());
    }

    #[test]
    fn outer_product_conjugates_right_factor() {
        let a = nd::array![C64::new(0.0, 1.0), C64::from(2.0)];
        let op = outer_prod(&a, &a);
        assert_eq!(op[[0, 1]], C64::new(0.0, 2.0));
        assert_eq!(op[[1, 0]], C64::new(0.0, -2.0));
    }
}
