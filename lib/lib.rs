#![allow(non_snake_case, non_upper_case_globals)]

//! Internal-state dynamics of a single atom driven by laser light on one
//! hyperfine transition, by rate equations or optical Bloch equations.

pub mod error;
pub mod gfactors;
pub mod spin;
pub mod hilbert;
pub mod structure;
pub mod fields;
pub mod hamiltonian;
pub mod ode;
pub mod validation;
pub mod rateeq;
pub mod obe;
pub mod config;

pub use error::{ Error, Result };
pub use hamiltonian::Hamiltonian;
pub use obe::{ DensitySeries, Obe, ObeOptions };
pub use rateeq::{ PopulationSolution, RateEquations };
pub use structure::{ DipoleTensor, Manifold };
