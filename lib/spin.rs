//! Half-integer-aware angular momentum labels and the coupling coefficients
//! between them.
//!
//! All quantum numbers are stored as integer counts of halves, so `F = 3/2` is
//! `3` and `m = -1/2` is `-1`.

use wigner_symbols::{ ClebschGordan, Wigner3jm };
use crate::error::StructureError;

/// Projection quantum number `m`, in halves.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SpinProj(i32);

impl SpinProj {
    pub fn new(m: i32) -> Self { Self(m) }

    /// `m + q` for a whole-unit photon index `q`.
    pub fn shifted(self, q: i32) -> Self {
        Self(self.0.saturating_add(2 * q))
    }

    /// `-m`
    pub fn reflected(self) -> Self { Self(-self.0) }

    pub fn halves(self) -> i32 { self.0 }

    /// Physical value `m` (half of [`Self::halves`]).
    pub fn f(self) -> f64 { 0.5 * f64::from(self.0) }
}

impl From<SpinProj> for f64 {
    fn from(m: SpinProj) -> Self { m.f() }
}

/// Total angular momentum `F` (or `J`), in halves.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SpinTotal(u32);

impl SpinTotal {
    pub fn new(j_halves: u32) -> Self { Self(j_halves) }

    /// Parse a physical value such as `1.5`.
    ///
    /// Fails unless `f` is finite, non-negative and a multiple of 1/2.
    pub fn from_f64(f: f64) -> Result<Self, StructureError> {
        let halves = 2.0 * f;
        (
            f.is_finite()
            && f >= 0.0
            && (halves - halves.round()).abs() < 1e-9
            && halves <= f64::from(i32::MAX)
        )
        .then(|| Self(halves.round() as u32))
        .ok_or(StructureError::BadQuantumNumber(f))
    }

    pub fn halves(self) -> u32 { self.0 }

    /// Physical value `F`.
    pub fn f(self) -> f64 { 0.5 * f64::from(self.0) }

    /// All `(F, m)` pairs for this `F`, from `m = -F` up to `m = +F`.
    pub fn iter(self) -> SpinProjections {
        SpinProjections { total: self, next: -(self.0 as i32) }
    }
}

impl IntoIterator for SpinTotal {
    type IntoIter = SpinProjections;
    type Item = Spin;

    fn into_iter(self) -> Self::IntoIter { self.iter() }
}

impl From<SpinTotal> for f64 {
    fn from(j: SpinTotal) -> Self { j.f() }
}

/// A valid `(F, m)` label with `|m| <= F` and `F - m` integral.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Spin(SpinTotal, SpinProj);

impl Spin {
    /// Pair a total and a projection, both in halves, if they are
    /// compatible.
    pub fn new(j: u32, m: i32) -> Option<Self> {
        let (jj, mm) = (i64::from(j), i64::from(m));
        let valid = mm.abs() <= jj && (jj - mm).rem_euclid(2) == 0;
        valid.then_some(Self(SpinTotal(j), SpinProj(m)))
    }

    /// Parse physical values such as `(1.5, -0.5)`.
    pub fn from_f64(j: f64, m: f64) -> Result<Self, StructureError> {
        let total = SpinTotal::from_f64(j)?;
        let m_halves = 2.0 * m;
        if !m.is_finite() || (m_halves - m_halves.round()).abs() > 1e-9 {
            return Err(StructureError::BadQuantumNumber(m));
        }
        Self::new(total.halves(), m_halves.round() as i32)
            .ok_or(StructureError::BadQuantumNumber(m))
    }

    pub fn total(self) -> SpinTotal { self.0 }

    pub fn proj(self) -> SpinProj { self.1 }

    /// `(F, m + q)`, if still a valid label.
    pub fn shifted(self, q: i32) -> Option<Self> {
        let m = self.1.shifted(q);
        Self::new(self.0.0, m.0)
    }

    /// `(F, -m)`
    pub fn reflected(self) -> Self { Self(self.0, self.1.reflected()) }

    /// `(F, m)` in halves.
    pub fn halves(self) -> (u32, i32) { (self.0.0, self.1.0) }

    /// Physical values `(F, m)`.
    pub fn f(self) -> (f64, f64) { (self.0.f(), self.1.f()) }
}

impl From<Spin> for (f64, f64) {
    fn from(jm: Spin) -> Self { jm.f() }
}

/// Ascending iterator over the sublevels of one [`SpinTotal`].
#[derive(Copy, Clone, Debug)]
pub struct SpinProjections {
    total: SpinTotal,
    next: i32,
}

impl Iterator for SpinProjections {
    type Item = Spin;

    fn next(&mut self) -> Option<Self::Item> {
        let cur = Spin::new(self.total.0, self.next)?;
        self.next += 2;
        Some(cur)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = ((self.total.0 as i32 - self.next) / 2 + 1).max(0) as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for SpinProjections { }

fn tj_tm(s: Spin) -> (i32, i32) {
    (s.total().halves() as i32, s.proj().halves())
}

/// Clebsch-Gordan coefficient `<j1 m1; j2 m2 | j3 m3>`.
pub fn cg(s1: Spin, s2: Spin, s3: Spin) -> f64 {
    let ((tj1, tm1), (tj2, tm2), (tj12, tm12)) = (tj_tm(s1), tj_tm(s2), tj_tm(s3));
    ClebschGordan { tj1, tm1, tj2, tm2, tj12, tm12 }.value().into()
}

/// Wigner 3j symbol with columns `s1`, `s2`, `s3`.
pub fn w3j(s1: Spin, s2: Spin, s3: Spin) -> f64 {
    let ((tj1, tm1), (tj2, tm2), (tj3, tm3)) = (tj_tm(s1), tj_tm(s2), tj_tm(s3));
    Wigner3jm { tj1, tm1, tj2, tm2, tj3, tm3 }.value().into()
}
