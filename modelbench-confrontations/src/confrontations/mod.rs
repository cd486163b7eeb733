pub mod co2_mauna_loa;
pub mod gpp_fluxnet_mte;

/// The bundled confrontations, grouped by category.
pub fn catalog() -> Vec<(&'static str, &'static str)> {
    vec![
        ("EcosystemAndCarbonCycle", "GPPFluxnetGlobalMTE"),
        ("Forcings", "CO2MaunaLoa"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_lists_every_bundled_confrontation() {
        let names: Vec<&str> = catalog().iter().map(|(_, n)| *n).collect();
        assert!(names.contains(&"GPPFluxnetGlobalMTE"));
        assert!(names.contains(&"CO2MaunaLoa"));
    }
}
