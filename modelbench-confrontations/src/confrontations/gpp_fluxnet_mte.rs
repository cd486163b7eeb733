//! Confront models with the gross primary productivity (GPP) product
//! generated by FLUXNET-MTE.
//!
//! The observational product is gridded monthly GPP; models are compared
//! over the globe and the Amazon basin on area-integrated fluxes reported
//! in Pg y-1.

use modelbench_core::confrontation::{Confrontation, ConfrontationDef, Role};
use modelbench_core::errors::{BenchError, BenchResult};
use modelbench_core::model::ObservationSource;
use modelbench_core::score::{MetricKind, ScoreWeights};
use std::path::Path;
use std::sync::Arc;

/// Build the FLUXNET-MTE GPP confrontation.
///
/// `root` is the benchmark data root; the conventional product layout is
/// verified up front so a missing download fails with a remediation hint
/// before any model work starts.
pub fn gpp_fluxnet_mte(
    root: impl AsRef<Path>,
    role: Role,
    source: Arc<dyn ObservationSource>,
) -> BenchResult<Confrontation> {
    let path = root.as_ref().join("DATA/gpp/FLUXNET-MTE/derived");
    if !path.is_dir() {
        let mut msg = format!(
            "I am looking for data for the GPPFluxnetGlobalMTE confrontation here\n\n{}\n\nbut I cannot find it. ",
            path.display()
        );
        msg += "Did you download the data? Have you pointed the data root at it?";
        return Err(BenchError::MisplacedData(msg));
    }

    let mut def = ConfrontationDef::new(
        "GPPFluxnetGlobalMTE",
        path.join("gpp.nc").to_string_lossy().as_ref(),
        "gpp",
    );
    def.alternate_vars = vec!["GPP".to_string()];
    def.regions = vec!["global".to_string(), "amazon".to_string()];
    def.table_unit = Some("Pg y-1".to_string());
    def.land_only = true;
    def.weights = ScoreWeights::from_pairs(&[
        (MetricKind::BiasScore, 1.0),
        (MetricKind::RmseScore, 2.0),
    ]);

    Ok(Confrontation::new(def, role, source))
}
