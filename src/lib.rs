//! Confront climate model output with observational benchmarks.
//!
//! This crate is a thin facade over the workspace members:
//!
//! - [`modelbench_core`] holds the data model (variables, units, regions),
//!   the statistical metrics library, the staging logic that makes an
//!   observation and a model extraction directly comparable, and the
//!   confrontation orchestrator that turns staged pairs into scored result
//!   sets.
//! - [`modelbench_confrontations`] holds concrete, configured
//!   confrontations built on the core.

pub use modelbench_core::confrontation::{BenchmarkHandle, Confrontation, ConfrontationDef, Role};
pub use modelbench_core::errors::{BenchError, BenchResult};
pub use modelbench_core::metrics;
pub use modelbench_core::model::{Extraction, ExtractionRequest, ModelData, ObservationSource};
pub use modelbench_core::regions::{Region, RegionRegistry};
pub use modelbench_core::results::ResultSet;
pub use modelbench_core::score::{MetricKind, ScoreWeights};
pub use modelbench_core::units::UnitRegistry;
pub use modelbench_core::variable::Variable;

pub use modelbench_confrontations as confrontations;
