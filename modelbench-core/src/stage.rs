//! Staging: make an observation and a model extraction directly comparable.
//!
//! Staging reconciles time and units only. Grid-to-grid mismatches are the
//! model collaborator's problem (it extracts either at native resolution or
//! resampled at the observation's sites); what leaves this module is a pair
//! of variables on the same time sampling, in the same unit, ready for the
//! metrics library.

use crate::confrontation::ConfrontationDef;
use crate::errors::{BenchError, BenchResult};
use crate::model::{Extraction, ExtractionRequest, ModelData};
use crate::units::UnitRegistry;
use crate::variable::Variable;
use log::debug;
use ndarray::Array1;

/// Land-fraction threshold below which a cell is masked in land-only
/// confrontations: 1% of the cell's area.
const LAND_FRACTION_MIN: f64 = 0.01;

/// Largest per-sample time-stamp disagreement tolerated between the two
/// clipped axes, in days. Monthly-vs-other sampling mismatches are not
/// reconciled beyond this.
const TIME_TOLERANCE_DAYS: f64 = 20.0;

/// An observation and a model extraction on the same time sampling and in
/// the same unit.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedPair {
    pub observation: Variable,
    pub model: Variable,
}

/// Index of the sample of `t` nearest to `target`.
fn nearest_index(t: &Array1<f64>, target: f64) -> usize {
    let mut best = 0;
    let mut dist = f64::INFINITY;
    for (i, &ti) in t.iter().enumerate() {
        let d = (ti - target).abs();
        if d < dist {
            dist = d;
            best = i;
        }
    }
    best
}

/// Mean base-10 order of magnitude of the valid, nonzero data.
fn mean_order_of_magnitude(variable: &Variable) -> f64 {
    let mut sum = 0.0;
    let mut n = 0usize;
    for &v in variable.data().iter() {
        if !v.is_nan() && v != 0.0 {
            sum += v.abs().log10();
            n += 1;
        }
    }
    if n == 0 {
        f64::NAN
    } else {
        sum / n as f64
    }
}

/// Mask model cells whose land fraction is below [`LAND_FRACTION_MIN`].
fn apply_land_mask(variable: &Variable, model: &dyn ModelData) -> BenchResult<Variable> {
    let Some(fraction) = model.land_fraction() else {
        return Ok(variable.clone());
    };
    let shape = variable.data().shape().to_vec();
    let n = shape.len();
    if n < 2 || fraction.nrows() != shape[n - 2] || fraction.ncols() != shape[n - 1] {
        return Err(BenchError::Analysis(format!(
            "land fraction grid {:?} does not match model data {:?}",
            fraction.dim(),
            shape
        )));
    }
    let mut out = variable.clone();
    for (idx, v) in out.data_mut().indexed_iter_mut() {
        if fraction[[idx[n - 2], idx[n - 1]]] < LAND_FRACTION_MIN {
            *v = f64::NAN;
        }
    }
    Ok(out)
}

/// Stage one observational variable against one model.
///
/// 1. The observation's full time extent defines the requested window.
/// 2. The model extracts the quantity over that window, at the
///    observation's sites when the observation is site-sampled; when the
///    quantity is absent under every accepted name, the confrontation's
///    derived-quantity expression is evaluated instead.
/// 3. If the axes differ in length both series are clipped to the
///    intersected window at the nearest sample indices.
/// 4. Residual length mismatch fails with `VarNotOnTimeScale`; stamp
///    disagreement beyond 20 days fails with `VarsNotComparable`.
/// 5. Land-only confrontations mask model cells that are less than 1% land.
/// 6. While the observation's mean order of magnitude sits below -2 (at
///    most twice), data and unit are rewritten by the registry's
///    substitution table to reduce round-off in later aggregation.
/// 7. The model variable is converted into the observation's (possibly
///    rewritten) unit.
pub fn stage(
    def: &ConfrontationDef,
    observation: &Variable,
    model: &dyn ModelData,
    units: &UnitRegistry,
) -> BenchResult<StagedPair> {
    let obs_time = observation
        .time()
        .ok_or_else(|| BenchError::NotTemporalVariable(observation.name().to_string()))?;
    let (t0, tf) = (obs_time[0], obs_time[obs_time.len() - 1]);

    let mut request = ExtractionRequest::new(&def.variable, t0, tf)
        .with_alternates(&def.alternate_vars);
    if observation.ndata().is_some() {
        let (lat, lon) = (
            observation.lat().expect("site-sampled data has latitudes"),
            observation.lon().expect("site-sampled data has longitudes"),
        );
        request = request.at_sites(lat.clone(), lon.clone());
    }

    let extracted = match model.extract_time_series(&request)? {
        Extraction::Found(variable) => variable,
        Extraction::NotFound => match &def.derived {
            Some(expression) => {
                debug!(
                    "'{}' not in model '{}', deriving from '{}'",
                    def.variable,
                    model.display_name(),
                    expression
                );
                model.derived_variable(&def.variable, expression, &request)?
            }
            None => {
                return Err(BenchError::VarNotInModel {
                    variable: def.variable.clone(),
                    model: model.display_name().to_string(),
                })
            }
        },
    };

    let mut obs = observation.clone();
    let mut extracted = extracted;
    let mod_time = extracted
        .time()
        .ok_or_else(|| BenchError::NotTemporalVariable(extracted.name().to_string()))?;

    // reconcile differing sampling by clipping both to the intersection
    if obs_time.len() != mod_time.len() {
        let start = t0.max(mod_time[0]);
        let end = tf.min(mod_time[mod_time.len() - 1]);
        if end < start {
            return Err(BenchError::VarsNotComparable(format!(
                "'{}' and model '{}' share no overlapping time window",
                obs.name(),
                model.display_name()
            )));
        }
        let (o0, o1) = (
            nearest_index(obs_time, start),
            nearest_index(obs_time, end),
        );
        let (m0, m1) = (
            nearest_index(mod_time, start),
            nearest_index(mod_time, end),
        );
        obs = obs.clip_time(o0, o1)?;
        extracted = extracted.clip_time(m0, m1)?;
    }

    let obs_time = obs.time().expect("clipped observation keeps its time axis");
    let mod_time = extracted.time().expect("clipped model keeps its time axis");
    if obs_time.len() != mod_time.len() {
        return Err(BenchError::VarNotOnTimeScale {
            obs: obs_time.len(),
            model: mod_time.len(),
        });
    }
    for (&a, &b) in obs_time.iter().zip(mod_time.iter()) {
        if (a - b).abs() > TIME_TOLERANCE_DAYS {
            return Err(BenchError::VarsNotComparable(format!(
                "time stamps differ by {:.2} days, beyond the {TIME_TOLERANCE_DAYS} day tolerance",
                (a - b).abs()
            )));
        }
    }

    if def.land_only && extracted.spatial() {
        extracted = apply_land_mask(&extracted, model)?;
    }

    // pull poorly-scaled observations back toward unity before aggregation
    let mut passes = 0;
    while passes < 2 && mean_order_of_magnitude(&obs) < -2.0 {
        let Some((unit, scale)) = units.substitute(obs.unit()) else {
            break;
        };
        debug!(
            "rescaling '{}' from [{}] to [{}] for round-off control",
            obs.name(),
            obs.unit(),
            unit
        );
        obs = obs.rescale(scale, &unit);
        passes += 1;
    }

    let model_converted = extracted.convert(obs.unit(), units)?;
    Ok(StagedPair {
        observation: obs,
        model: model_converted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confrontation::ConfrontationDef;
    use crate::model::GriddedModel;
    use crate::units::UnitRegistry;
    use is_close::is_close;
    use ndarray::{array, Array1, ArrayD, IxDyn};

    fn monthly_times(n: usize) -> Array1<f64> {
        Array1::from_iter((0..n).map(|i| 15.0 + 30.4 * i as f64))
    }

    fn obs_variable(n: usize, value: f64, unit: &str) -> Variable {
        Variable::gridded(
            "gpp",
            unit,
            ArrayD::from_elem(IxDyn(&[n, 2, 2]), value),
            Some(monthly_times(n)),
            array![-45.0, 45.0],
            array![-90.0, 90.0],
        )
        .unwrap()
    }

    fn model_with(n: usize, value: f64, unit: &str) -> GriddedModel {
        let mut m = GriddedModel::new(
            "testmod",
            "#d62728",
            monthly_times(n),
            array![-45.0, 45.0],
            array![-90.0, 90.0],
        );
        m.add_field("gpp", unit, ArrayD::from_elem(IxDyn(&[n, 2, 2]), value));
        m
    }

    fn def() -> ConfrontationDef {
        ConfrontationDef::new("GPPTest", "mem://gpp", "gpp")
    }

    #[test]
    fn staging_converts_model_into_observation_unit() {
        let obs = obs_variable(24, 2.0, "g m-2 d-1");
        let model = model_with(24, 3.0e-5, "kg m-2 s-1");
        let units = UnitRegistry::with_defaults();
        let pair = stage(&def(), &obs, &model, &units).unwrap();
        assert_eq!(pair.model.unit(), "g m-2 d-1");
        // 3e-5 kg m-2 s-1 = 2.592 g m-2 d-1
        let first = *pair.model.data().iter().next().unwrap();
        assert!(is_close!(first, 3.0e-5 * 8.64e7));
    }

    #[test]
    fn magnitude_pass_rescales_small_observations_twice() {
        // a typical flux in SI units sits ~8 orders below unity
        let obs = obs_variable(24, 3.0e-8, "kg m-2 s-1");
        let model = model_with(24, 2.5e-8, "kg m-2 s-1");
        let units = UnitRegistry::with_defaults();
        let pair = stage(&def(), &obs, &model, &units).unwrap();
        assert_eq!(pair.observation.unit(), "g m-2 d-1");
        assert_eq!(pair.model.unit(), "g m-2 d-1");
        let v = *pair.observation.data().iter().next().unwrap();
        assert!(is_close!(v, 3.0e-8 * 8.64e7));
    }

    #[test]
    fn well_scaled_observations_are_left_alone() {
        let obs = obs_variable(24, 2.0, "g m-2 d-1");
        let model = model_with(24, 2.0, "g m-2 d-1");
        let units = UnitRegistry::with_defaults();
        let pair = stage(&def(), &obs, &model, &units).unwrap();
        assert_eq!(pair.observation.unit(), "g m-2 d-1");
    }

    #[test]
    fn observation_without_time_axis_is_rejected() {
        let obs = Variable::gridded(
            "gpp",
            "g m-2 d-1",
            ArrayD::from_elem(IxDyn(&[2, 2]), 1.0),
            None,
            array![-45.0, 45.0],
            array![-90.0, 90.0],
        )
        .unwrap();
        let model = model_with(24, 1.0, "g m-2 d-1");
        let units = UnitRegistry::with_defaults();
        assert!(matches!(
            stage(&def(), &obs, &model, &units),
            Err(BenchError::NotTemporalVariable(_))
        ));
    }

    #[test]
    fn missing_variable_without_derivation_fails() {
        let obs = obs_variable(24, 1.0, "g m-2 d-1");
        let mut model = GriddedModel::new(
            "empty",
            "#000000",
            monthly_times(24),
            array![-45.0, 45.0],
            array![-90.0, 90.0],
        );
        model.add_field("unrelated", "K", ArrayD::from_elem(IxDyn(&[24, 2, 2]), 1.0));
        let units = UnitRegistry::with_defaults();
        assert!(matches!(
            stage(&def(), &obs, &model, &units),
            Err(BenchError::VarNotInModel { .. })
        ));
    }

    #[test]
    fn missing_variable_falls_back_to_derivation() {
        let obs = obs_variable(24, 1.0, "g m-2 d-1");
        let mut model = GriddedModel::new(
            "deriving",
            "#9467bd",
            monthly_times(24),
            array![-45.0, 45.0],
            array![-90.0, 90.0],
        );
        model.add_field("ra", "g m-2 d-1", ArrayD::from_elem(IxDyn(&[24, 2, 2]), 0.75));
        model.add_field("rh", "g m-2 d-1", ArrayD::from_elem(IxDyn(&[24, 2, 2]), 0.25));
        let units = UnitRegistry::with_defaults();
        let mut d = def();
        d.derived = Some("ra + rh".to_string());
        let pair = stage(&d, &obs, &model, &units).unwrap();
        assert!(is_close!(*pair.model.data().iter().next().unwrap(), 1.0));
    }

    #[test]
    fn longer_model_record_is_clipped_to_the_observation() {
        let obs = obs_variable(24, 1.0, "g m-2 d-1");
        let model = model_with(120, 1.0, "g m-2 d-1");
        let units = UnitRegistry::with_defaults();
        let pair = stage(&def(), &obs, &model, &units).unwrap();
        assert_eq!(
            pair.observation.time().unwrap().len(),
            pair.model.time().unwrap().len()
        );
    }

    /// Test double that hands back a fixed record regardless of the
    /// requested window, so staging sees the raw time axis.
    struct FixedModel {
        variable: Variable,
    }

    impl crate::model::ModelData for FixedModel {
        fn extract_time_series(
            &self,
            _request: &ExtractionRequest,
        ) -> BenchResult<Extraction> {
            Ok(Extraction::Found(self.variable.clone()))
        }

        fn derived_variable(
            &self,
            name: &str,
            _expression: &str,
            _request: &ExtractionRequest,
        ) -> BenchResult<Variable> {
            Err(BenchError::VarNotInModel {
                variable: name.to_string(),
                model: "fixed".to_string(),
            })
        }

        fn cell_areas(&self) -> Option<&ndarray::Array2<f64>> {
            None
        }

        fn land_fraction(&self) -> Option<&ndarray::Array2<f64>> {
            None
        }

        fn display_name(&self) -> &str {
            "fixed"
        }

        fn display_color(&self) -> &str {
            "#8c564b"
        }
    }

    fn shifted_model(offset: f64) -> FixedModel {
        FixedModel {
            variable: Variable::gridded(
                "gpp",
                "g m-2 d-1",
                ArrayD::from_elem(IxDyn(&[24, 2, 2]), 1.0),
                Some(monthly_times(24).mapv(|t| t + offset)),
                array![-45.0, 45.0],
                array![-90.0, 90.0],
            )
            .unwrap(),
        }
    }

    #[test]
    fn twenty_day_offset_passes_twenty_point_oh_one_fails() {
        let obs = obs_variable(24, 1.0, "g m-2 d-1");
        let units = UnitRegistry::with_defaults();

        assert!(stage(&def(), &obs, &shifted_model(20.0), &units).is_ok());
        assert!(matches!(
            stage(&def(), &obs, &shifted_model(20.01), &units),
            Err(BenchError::VarsNotComparable(_))
        ));
    }

    #[test]
    fn land_only_masks_ocean_cells() {
        let obs = obs_variable(24, 1.0, "g m-2 d-1");
        let areas = ndarray::Array2::from_elem((2, 2), 1.0e12);
        let fraction = array![[0.0, 1.0], [0.005, 0.8]];
        let model = model_with(24, 1.0, "g m-2 d-1").with_areas(areas, fraction);
        let units = UnitRegistry::with_defaults();
        let mut d = def();
        d.land_only = true;
        let pair = stage(&d, &obs, &model, &units).unwrap();
        let masked = pair.model.data().iter().filter(|v| v.is_nan()).count();
        // two of the four cells fall below 1% land on every time step
        assert_eq!(masked, 2 * 24);
    }

    #[test]
    fn staging_is_idempotent() {
        let obs = obs_variable(24, 3.0e-8, "kg m-2 s-1");
        let model = model_with(120, 2.0e-8, "kg m-2 s-1");
        let units = UnitRegistry::with_defaults();
        let a = stage(&def(), &obs, &model, &units).unwrap();
        let b = stage(&def(), &obs, &model, &units).unwrap();
        assert_eq!(a, b);
    }
}
