//! Confront models with the Mauna Loa atmospheric CO2 record.
//!
//! A single-site monthly record: the model is resampled at the
//! observatory's coordinates and compared as a site mean, reported in ppm.

use modelbench_core::confrontation::{Confrontation, ConfrontationDef, Role};
use modelbench_core::errors::{BenchError, BenchResult};
use modelbench_core::model::ObservationSource;
use std::path::Path;
use std::sync::Arc;

/// Coordinates of the Mauna Loa observatory.
pub const MAUNA_LOA_LAT: f64 = 19.54;
pub const MAUNA_LOA_LON: f64 = -155.58;

/// Build the Mauna Loa CO2 confrontation.
pub fn co2_mauna_loa(
    root: impl AsRef<Path>,
    role: Role,
    source: Arc<dyn ObservationSource>,
) -> BenchResult<Confrontation> {
    let path = root.as_ref().join("DATA/co2/MAUNA.LOA/derived");
    if !path.is_dir() {
        let mut msg = format!(
            "I am looking for data for the CO2MaunaLoa confrontation here\n\n{}\n\nbut I cannot find it. ",
            path.display()
        );
        msg += "Did you download the data? Have you pointed the data root at it?";
        return Err(BenchError::MisplacedData(msg));
    }

    let mut def = ConfrontationDef::new(
        "CO2MaunaLoa",
        path.join("co2_1850-2012.nc").to_string_lossy().as_ref(),
        "co2",
    );
    def.alternate_vars = vec!["co2mass".to_string()];
    def.table_unit = Some("ppm".to_string());
    def.space_mean = true;

    Ok(Confrontation::new(def, role, source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelbench_core::model::MemorySource;
    use std::fs;

    #[test]
    fn missing_data_root_is_misplaced_data() {
        let err = co2_mauna_loa(
            "/nonexistent-data-root",
            Role::Replica,
            Arc::new(MemorySource::new()),
        )
        .unwrap_err();
        assert!(matches!(err, BenchError::MisplacedData(_)));
    }

    #[test]
    fn descriptor_reduces_space_by_mean() {
        let root = std::env::temp_dir().join(format!("mb-co2-root-{}", std::process::id()));
        fs::create_dir_all(root.join("DATA/co2/MAUNA.LOA/derived")).unwrap();

        let c = co2_mauna_loa(&root, Role::Master, Arc::new(MemorySource::new())).unwrap();
        assert!(c.def().space_mean);
        assert_eq!(c.def().table_unit.as_deref(), Some("ppm"));

        fs::remove_dir_all(&root).ok();
    }
}
