//! Unit registry with the conversions used by the bundled confrontations.
//!
//! # Conversion convention
//!
//! A registered entry `(from, to)` holds the scale and offset such that
//! `value_in_to = value_in_from * scale + offset`. The inverse entry is
//! derived automatically, so registering `degC -> K` also makes `K -> degC`
//! available. Lookups are exact string matches on the unit names; no
//! dimensional analysis is attempted.

use crate::errors::{BenchError, BenchResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;

/// A single multiplicative/offset unit conversion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnitConversion {
    pub scale: f64,
    pub offset: f64,
}

impl UnitConversion {
    /// The identity conversion.
    pub fn identity() -> Self {
        Self {
            scale: 1.0,
            offset: 0.0,
        }
    }

    /// Apply this conversion to a value.
    pub fn apply(&self, value: f64) -> f64 {
        value * self.scale + self.offset
    }

    /// The conversion mapping converted values back to the original unit.
    pub fn inverse(&self) -> Self {
        Self {
            scale: 1.0 / self.scale,
            offset: -self.offset / self.scale,
        }
    }
}

/// A unit-rewrite rule used by the staging magnitude-normalization pass.
///
/// When the observation's data sits far below unity, staging substitutes a
/// fragment of the unit string (e.g. `s-1` becomes `d-1`) and rescales the
/// data by `scale`. The physical meaning is unchanged; only the
/// representation moves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MagnitudeSubstitution {
    /// Fragment of the unit string to replace.
    pub fragment: String,
    /// Replacement fragment.
    pub replacement: String,
    /// Factor applied to the data when the substitution fires.
    pub scale: f64,
}

/// Registry of known unit conversions.
///
/// The global instance is available as [`UNIT_REGISTRY`]; confrontations
/// with unusual units can build their own via [`UnitRegistry::new`] and
/// [`UnitRegistry::register`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitRegistry {
    conversions: HashMap<(String, String), UnitConversion>,
    substitutions: Vec<MagnitudeSubstitution>,
}

impl UnitRegistry {
    /// Create an empty registry (identity conversions only).
    pub fn new() -> Self {
        Self {
            conversions: HashMap::new(),
            substitutions: Vec::new(),
        }
    }

    /// Create a registry seeded with the default conversion table.
    pub fn with_defaults() -> Self {
        let mut r = Self::new();

        // mass
        r.register_scale("kg", "g", 1e3);
        r.register_scale("g", "Pg", 1e-15);

        // mass fluxes, per area
        r.register_scale("kg m-2 s-1", "g m-2 s-1", 1e3);
        r.register_scale("kg m-2 s-1", "g m-2 d-1", 8.64e7);
        r.register_scale("g m-2 s-1", "g m-2 d-1", 8.64e4);

        // area-integrated mass rates, including the composed spellings the
        // space-integral operation produces
        r.register_scale("g s-1", "Pg y-1", 8.64e4 * 365.0 * 1e-15);
        r.register_scale("g d-1", "Pg y-1", 365.0 * 1e-15);
        r.register_scale("kg s-1", "Pg y-1", 8.64e4 * 365.0 * 1e-12);
        r.register_scale("g m-2 d-1 m2", "Pg y-1", 365.0 * 1e-15);
        r.register_scale("g m-2 s-1 m2", "Pg y-1", 8.64e4 * 365.0 * 1e-15);
        r.register_scale("kg m-2 s-1 m2", "Pg y-1", 8.64e4 * 365.0 * 1e-12);

        // temperature
        r.register("degC", "K", 1.0, 273.15);

        // mole fractions
        r.register_scale("ppm", "ppb", 1e3);

        // round-off normalization rules, applied in order
        r.push_substitution("s-1", "d-1", 8.64e4);
        r.push_substitution("kg", "g", 1e3);

        r
    }

    /// Register a conversion and its derived inverse.
    pub fn register(&mut self, from: &str, to: &str, scale: f64, offset: f64) {
        let conversion = UnitConversion { scale, offset };
        self.conversions
            .insert((from.to_string(), to.to_string()), conversion);
        self.conversions
            .insert((to.to_string(), from.to_string()), conversion.inverse());
    }

    /// Register a purely multiplicative conversion.
    pub fn register_scale(&mut self, from: &str, to: &str, scale: f64) {
        self.register(from, to, scale, 0.0);
    }

    /// Append a magnitude-substitution rule.
    pub fn push_substitution(&mut self, fragment: &str, replacement: &str, scale: f64) {
        self.substitutions.push(MagnitudeSubstitution {
            fragment: fragment.to_string(),
            replacement: replacement.to_string(),
            scale,
        });
    }

    /// Look up the conversion from one unit to another.
    pub fn conversion(&self, from: &str, to: &str) -> BenchResult<UnitConversion> {
        if from == to {
            return Ok(UnitConversion::identity());
        }
        self.conversions
            .get(&(from.to_string(), to.to_string()))
            .copied()
            .ok_or_else(|| BenchError::UnknownUnit {
                from: from.to_string(),
                to: to.to_string(),
            })
    }

    /// Find the first substitution rule applicable to `unit`.
    ///
    /// Returns the rewritten unit string and the data scale factor, or
    /// `None` if no rule's fragment occurs in the unit.
    pub fn substitute(&self, unit: &str) -> Option<(String, f64)> {
        self.substitutions
            .iter()
            .find(|s| unit.contains(s.fragment.as_str()))
            .map(|s| (unit.replacen(s.fragment.as_str(), &s.replacement, 1), s.scale))
    }
}

impl Default for UnitRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Global unit registry seeded with [`UnitRegistry::with_defaults`].
pub static UNIT_REGISTRY: LazyLock<UnitRegistry> = LazyLock::new(UnitRegistry::with_defaults);
