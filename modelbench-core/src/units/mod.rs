//! Physical-unit conversion for confrontation variables.
//!
//! Confrontations compare data drawn from independently-produced sources, so
//! the same physical quantity routinely arrives in different units
//! (`kg m-2 s-1` vs `g m-2 d-1`, `degC` vs `K`). This module provides:
//!
//! - [`UnitRegistry`]: a named conversion table mapping `(from, to)` unit
//!   pairs to a multiplicative factor and additive offset, with inverses
//!   derived automatically at registration time
//! - [`UnitConversion`]: one such factor/offset pair
//! - [`MagnitudeSubstitution`]: the unit-rewrite rules used by staging to
//!   pull poorly-scaled data (mean order of magnitude below 1e-2) back
//!   toward unity before aggregation
//! - [`UNIT_REGISTRY`]: a global registry seeded with the conversions the
//!   bundled confrontations need
//!
//! # Example
//!
//! ```
//! use modelbench_core::units::UNIT_REGISTRY;
//!
//! let c = UNIT_REGISTRY.conversion("kg m-2 s-1", "g m-2 s-1").unwrap();
//! assert_eq!(c.apply(1.0), 1000.0);
//! ```

pub mod registry;

pub use registry::{MagnitudeSubstitution, UnitConversion, UnitRegistry, UNIT_REGISTRY};

#[cfg(test)]
mod tests {
    use super::*;
    use is_close::is_close;

    #[test]
    fn conversion_round_trip() {
        let registry = UnitRegistry::with_defaults();
        let fwd = registry.conversion("degC", "K").unwrap();
        let back = registry.conversion("K", "degC").unwrap();
        let x = 21.5;
        assert!(is_close!(back.apply(fwd.apply(x)), x));
    }

    #[test]
    fn identity_conversion_always_known() {
        let registry = UnitRegistry::new();
        let c = registry.conversion("furlong", "furlong").unwrap();
        assert_eq!(c.apply(3.0), 3.0);
    }

    #[test]
    fn unknown_pair_is_an_error() {
        let registry = UnitRegistry::with_defaults();
        assert!(registry.conversion("kg", "W m-2").is_err());
    }
}
