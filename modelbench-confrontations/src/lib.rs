//! Concrete observational confrontations built on `modelbench-core`.
//!
//! Each submodule configures one comparison between an observational
//! product and a single physical quantity: data-root verification, the
//! confrontation descriptor (variable names, regions, units, weights), and
//! construction of the [`modelbench_core::confrontation::Confrontation`]
//! ready to confront models.

pub mod colors;
pub mod confrontations;

pub use confrontations::co2_mauna_loa::co2_mauna_loa;
pub use confrontations::gpp_fluxnet_mte::gpp_fluxnet_mte;
