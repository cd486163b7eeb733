//! The per-(confrontation, model) pipeline: stage, analyze, score.
//!
//! A [`Confrontation`] pairs one observational dataset with one physical
//! quantity and confronts models with it. Each confront call walks the
//! `Staged -> Analyzed -> Scored` state machine for that model, writing
//! named scalar/array results keyed by `(metric, region)` into a per-model
//! [`ResultSet`].
//!
//! One confrontation instance per dataset is constructed with
//! [`Role::Master`]; the master produces the single shared benchmark-only
//! result set, published through a write-once [`BenchmarkHandle`] that all
//! model comparisons reuse. Replicas never recompute it. Cross-process
//! runs need an external barrier to order the master's publication before
//! replica reads; within a process the handle itself is the
//! synchronization.

use crate::errors::{BenchError, BenchResult};
use crate::metrics::{self, Normalize};
use crate::model::{ModelData, ObservationSource};
use crate::regions::RegionRegistry;
use crate::relationship::{relate, RelationshipAxes};
use crate::results::{ResultData, ResultEntry, ResultSet};
use crate::score::{self, ScoreWeights};
use crate::stage::{stage, StagedPair};
use crate::units::UnitRegistry;
use crate::variable::Variable;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// Bin count for relationship histograms.
const RELATIONSHIP_BINS: usize = 20;

/// Immutable descriptor of a confrontation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfrontationDef {
    /// Confrontation name, used in artifact naming.
    pub name: String,
    /// Locator of the observational source resource.
    pub locator: String,
    /// Primary variable name.
    pub variable: String,
    /// Accepted alternate variable names.
    pub alternate_vars: Vec<String>,
    /// Expression the model evaluates when the variable is absent under
    /// every accepted name.
    pub derived: Option<String>,
    /// Regions to analyze.
    pub regions: Vec<String>,
    /// Unit for table entries (applied to space-integrated series).
    pub table_unit: Option<String>,
    /// Unit for plot entries.
    pub plot_unit: Option<String>,
    /// Reduce space by mean rather than integral.
    pub space_mean: bool,
    /// Mask model cells that are less than 1% land.
    pub land_only: bool,
    /// Weight map for overall-score aggregation.
    pub weights: ScoreWeights,
}

impl ConfrontationDef {
    pub fn new(name: &str, locator: &str, variable: &str) -> Self {
        Self {
            name: name.to_string(),
            locator: locator.to_string(),
            variable: variable.to_string(),
            alternate_vars: Vec::new(),
            derived: None,
            regions: vec!["global".to_string()],
            table_unit: None,
            plot_unit: None,
            space_mean: false,
            land_only: false,
            weights: ScoreWeights::default_scores(),
        }
    }

    /// Load a descriptor from TOML, validating the weight map against the
    /// closed metric-kind set so misconfiguration fails here rather than
    /// at aggregation time.
    pub fn from_toml_str(text: &str) -> BenchResult<Self> {
        #[derive(Deserialize)]
        struct Raw {
            name: String,
            locator: String,
            variable: String,
            #[serde(default)]
            alternate_vars: Vec<String>,
            #[serde(default)]
            derived: Option<String>,
            #[serde(default)]
            regions: Vec<String>,
            #[serde(default)]
            table_unit: Option<String>,
            #[serde(default)]
            plot_unit: Option<String>,
            #[serde(default)]
            space_mean: bool,
            #[serde(default)]
            land_only: bool,
            #[serde(default)]
            weights: HashMap<String, f64>,
        }
        let raw: Raw = toml::from_str(text).map_err(|e| {
            BenchError::Analysis(format!("invalid confrontation configuration: {e}"))
        })?;
        let weights = if raw.weights.is_empty() {
            ScoreWeights::default_scores()
        } else {
            ScoreWeights::try_from_map(&raw.weights)?
        };
        let regions = if raw.regions.is_empty() {
            vec!["global".to_string()]
        } else {
            raw.regions
        };
        Ok(Self {
            name: raw.name,
            locator: raw.locator,
            variable: raw.variable,
            alternate_vars: raw.alternate_vars,
            derived: raw.derived,
            regions,
            table_unit: raw.table_unit,
            plot_unit: raw.plot_unit,
            space_mean: raw.space_mean,
            land_only: raw.land_only,
            weights,
        })
    }
}

/// Which confrontation instance owns the shared benchmark artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// Produces the shared benchmark result set, exactly once.
    Master,
    /// Reuses the master's benchmark; never writes it.
    Replica,
}

/// Write-once handle to the shared benchmark result set.
///
/// The master publishes the fully-built set; every later reader gets the
/// same `Arc`. Publication is idempotent in the sense that only the first
/// write sticks.
#[derive(Debug, Clone, Default)]
pub struct BenchmarkHandle {
    slot: Arc<OnceLock<Arc<ResultSet>>>,
}

impl BenchmarkHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// The benchmark result set, once the master has published it.
    pub fn get(&self) -> Option<Arc<ResultSet>> {
        self.slot.get().cloned()
    }

    fn publish(&self, set: ResultSet) {
        let _ = self.slot.set(Arc::new(set));
    }
}

/// Progress of one (confrontation, model) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfrontState {
    Staged,
    Analyzed,
    Scored,
}

/// Results and progress for one confronted model.
#[derive(Debug, Clone)]
pub struct ModelRecord {
    pub state: ConfrontState,
    pub results: ResultSet,
}

/// A dependent confrontation used for relationship analysis.
#[derive(Debug)]
pub struct Dependent {
    def: ConfrontationDef,
    source: Arc<dyn ObservationSource>,
}

/// A configured comparison between one observational dataset and models.
#[derive(Debug)]
pub struct Confrontation {
    def: ConfrontationDef,
    role: Role,
    source: Arc<dyn ObservationSource>,
    dependents: Vec<Dependent>,
    benchmark: BenchmarkHandle,
    units: UnitRegistry,
    regions: RegionRegistry,
    records: HashMap<String, ModelRecord>,
}

impl Confrontation {
    pub fn new(def: ConfrontationDef, role: Role, source: Arc<dyn ObservationSource>) -> Self {
        Self {
            def,
            role,
            source,
            dependents: Vec::new(),
            benchmark: BenchmarkHandle::new(),
            units: UnitRegistry::with_defaults(),
            regions: RegionRegistry::with_defaults(),
            records: HashMap::new(),
        }
    }

    /// Share a benchmark handle between the master and its replicas.
    pub fn with_benchmark_handle(mut self, handle: BenchmarkHandle) -> Self {
        self.benchmark = handle;
        self
    }

    /// Register a dependent confrontation for relationship analysis.
    /// Dependents are analyzed in registration order.
    pub fn with_dependent(
        mut self,
        def: ConfrontationDef,
        source: Arc<dyn ObservationSource>,
    ) -> Self {
        self.dependents.push(Dependent { def, source });
        self
    }

    pub fn with_units(mut self, units: UnitRegistry) -> Self {
        self.units = units;
        self
    }

    pub fn with_regions(mut self, regions: RegionRegistry) -> Self {
        self.regions = regions;
        self
    }

    pub fn def(&self) -> &ConfrontationDef {
        &self.def
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// The shared benchmark handle, for report layers and replicas.
    pub fn benchmark_handle(&self) -> BenchmarkHandle {
        self.benchmark.clone()
    }

    /// Results for a confronted model.
    pub fn results(&self, model_name: &str) -> Option<&ResultSet> {
        self.records.get(model_name).map(|r| &r.results)
    }

    /// Pipeline state for a confronted model.
    pub fn state(&self, model_name: &str) -> Option<ConfrontState> {
        self.records.get(model_name).map(|r| r.state)
    }

    /// Confront one model with the observational data.
    ///
    /// On failure nothing is recorded for the model and, for the master,
    /// no benchmark is published: partially-written artifacts are
    /// discarded wholesale.
    pub fn confront(&mut self, model: &dyn ModelData) -> BenchResult<()> {
        // area integration is impossible without both grids; fail before
        // any staging work
        if model.cell_areas().is_none() || model.land_fraction().is_none() {
            return Err(BenchError::AreasNotInModel {
                model: model.display_name().to_string(),
                confrontation: self.def.name.clone(),
            });
        }

        info!(
            "confronting model '{}' with '{}'",
            model.display_name(),
            self.def.name
        );
        let observation = self
            .source
            .load(&self.def.variable, &self.def.alternate_vars)?;
        let pair = stage(&self.def, &observation, model, &self.units)?;
        debug!(
            "staged '{}': {} samples in [{}]",
            self.def.variable,
            pair.observation.time().map(|t| t.len()).unwrap_or(0),
            pair.observation.unit()
        );

        let mut results = ResultSet::new(model.display_name(), model.display_color());
        let build_benchmark = self.role == Role::Master && self.benchmark.get().is_none();
        let mut benchmark = build_benchmark.then(|| ResultSet::new("Benchmark", "#000000"));

        self.analyze(&pair, &mut results, benchmark.as_mut())?;
        self.analyze_relationships(&pair, model, &mut results, benchmark.as_mut())?;

        if let Some(benchmark) = benchmark {
            self.benchmark.publish(benchmark);
        }
        self.records.insert(
            model.display_name().to_string(),
            ModelRecord {
                state: ConfrontState::Analyzed,
                results,
            },
        );
        Ok(())
    }

    /// Aggregate the recorded score metrics of one model into
    /// `overall_score_over_<region>` entries and mark the pair scored.
    ///
    /// Must run after every constituent metric for the model has been
    /// recorded; recomputation overwrites the previous aggregate.
    pub fn compute_overall_score(&mut self, model_name: &str) -> BenchResult<()> {
        let record = self.records.get_mut(model_name).ok_or_else(|| {
            BenchError::Analysis(format!(
                "model '{model_name}' has not been confronted with '{}'",
                self.def.name
            ))
        })?;
        score::compute_overall_score(&mut record.results, &self.def.weights, &self.def.regions);
        record.state = ConfrontState::Scored;
        Ok(())
    }

    /// The fluxrate analysis: time integration, difference map, and
    /// per-region space-integrated series with bias/RMSE metrics.
    fn analyze(
        &self,
        pair: &StagedPair,
        results: &mut ResultSet,
        mut benchmark: Option<&mut ResultSet>,
    ) -> BenchResult<()> {
        let obs_timeint = pair.observation.integrate_in_time()?;
        let mod_timeint = pair.model.integrate_in_time()?;

        if pair.observation.spatial() {
            let diff = obs_timeint.spatial_difference(&mod_timeint)?;
            // symmetric range so a report layer can center a diverging map
            let magnitude = diff.min().abs().max(diff.max().abs());
            let mut entry = ResultEntry::new(
                "bias_map",
                map_data(&diff)?,
                diff.unit(),
            );
            entry.vmin = -magnitude;
            entry.vmax = magnitude;
            results.insert(entry);

            if let Some(benchmark) = benchmark.as_deref_mut() {
                benchmark.insert_variable("timeint_map", &obs_timeint);
            }
        }

        for region_name in &self.def.regions {
            let region = self.regions.get(region_name)?;
            let mut obs_sp = pair
                .observation
                .integrate_in_space(&region, self.def.space_mean)?;
            let mut mod_sp = pair.model.integrate_in_space(&region, self.def.space_mean)?;
            if let Some(unit) = &self.def.table_unit {
                obs_sp = obs_sp.convert(unit, &self.units)?;
                mod_sp = mod_sp.convert(unit, &self.units)?;
            }

            let time = obs_sp
                .time()
                .ok_or_else(|| BenchError::NotTemporalVariable(obs_sp.name().to_string()))?
                .clone();
            let weights = metrics::monthly_weights(time.view())?;
            let obs_values = obs_sp.values()?;
            let mod_values = mod_sp.values()?;

            let raw_bias = metrics::bias(
                obs_values,
                mod_values,
                Normalize::None,
                Some(weights.view()),
            )?;
            let bias_score = metrics::bias(
                obs_values,
                mod_values,
                Normalize::Score,
                Some(weights.view()),
            )?;
            let raw_rmse = metrics::rmse(obs_values, mod_values, Normalize::None)?;
            let rmse_score = metrics::rmse(obs_values, mod_values, Normalize::Score)?;

            results.insert_scalar(&format!("bias_over_{region_name}"), raw_bias, obs_sp.unit());
            results.insert_scalar(&format!("bias_score_over_{region_name}"), bias_score, "1");
            results.insert_scalar(&format!("rmse_over_{region_name}"), raw_rmse, obs_sp.unit());
            results.insert_scalar(&format!("rmse_score_over_{region_name}"), rmse_score, "1");
            results.insert_series(
                &format!("spaceint_over_{region_name}"),
                mod_values.to_owned(),
                mod_sp.unit(),
            );

            if time.len() >= 12 {
                let cycle = mod_sp.annual_cycle()?;
                results.insert_series(
                    &format!("cycle_mean_over_{region_name}"),
                    cycle.mean,
                    mod_sp.unit(),
                );
                results.insert_series(
                    &format!("cycle_std_over_{region_name}"),
                    cycle.std,
                    mod_sp.unit(),
                );
                results.insert_scalar(
                    &format!("cycle_peak_month_over_{region_name}"),
                    cycle.peak_month_mean,
                    "month",
                );
            }

            if let Some(benchmark) = benchmark.as_deref_mut() {
                benchmark.insert_series(
                    &format!("spaceint_over_{region_name}"),
                    obs_values.to_owned(),
                    obs_sp.unit(),
                );
                if time.len() >= 12 {
                    let cycle = obs_sp.annual_cycle()?;
                    benchmark.insert_series(
                        &format!("cycle_mean_over_{region_name}"),
                        cycle.mean,
                        obs_sp.unit(),
                    );
                    benchmark.insert_series(
                        &format!("cycle_std_over_{region_name}"),
                        cycle.std,
                        obs_sp.unit(),
                    );
                    benchmark.insert_scalar(
                        &format!("cycle_peak_month_over_{region_name}"),
                        cycle.peak_month_mean,
                        "month",
                    );
                }
            }
        }
        Ok(())
    }

    /// Stage each registered dependent against the same model and bin the
    /// joint distribution of the two time-integrated fields, benchmark and
    /// model sides on the same fixed axes.
    fn analyze_relationships(
        &self,
        pair: &StagedPair,
        model: &dyn ModelData,
        results: &mut ResultSet,
        mut benchmark: Option<&mut ResultSet>,
    ) -> BenchResult<()> {
        if self.dependents.is_empty() {
            return Ok(());
        }
        let obs_timeint = pair.observation.integrate_in_time()?;
        let mod_timeint = pair.model.integrate_in_time()?;

        for dependent in &self.dependents {
            debug!(
                "relationship analysis of '{}' against '{}'",
                self.def.variable, dependent.def.variable
            );
            let dep_obs = dependent
                .source
                .load(&dependent.def.variable, &dependent.def.alternate_vars)?;
            let dep_pair = stage(&dependent.def, &dep_obs, model, &self.units)?;
            let dep_obs_timeint = dep_pair.observation.integrate_in_time()?;
            let dep_mod_timeint = dep_pair.model.integrate_in_time()?;

            for region_name in &self.def.regions {
                let region = self.regions.get(region_name)?;
                let group = format!(
                    "relationship_{}_over_{region_name}",
                    dependent.def.variable
                );

                // the benchmark side fixes the axes both sides share
                let obs_rel = relate(
                    &dep_obs_timeint.mask_region(&region),
                    &obs_timeint.mask_region(&region),
                    RELATIONSHIP_BINS,
                    None,
                )?;
                let axes: RelationshipAxes = obs_rel.axes();
                let mod_rel = relate(
                    &dep_mod_timeint.mask_region(&region),
                    &mod_timeint.mask_region(&region),
                    RELATIONSHIP_BINS,
                    Some(&axes),
                )?;

                mod_rel.record(results, &group);
                if let Some(benchmark) = benchmark.as_deref_mut() {
                    obs_rel.record(benchmark, &group);
                }
            }
        }
        Ok(())
    }
}

fn map_data(variable: &Variable) -> BenchResult<ResultData> {
    let map = variable
        .data()
        .view()
        .into_dimensionality::<ndarray::Ix2>()
        .map_err(|_| {
            BenchError::Analysis(format!(
                "variable '{}' is not a 2-D map",
                variable.name()
            ))
        })?
        .to_owned();
    Ok(ResultData::Map(map))
}
