//! External collaborator contracts: model output and observation sources.
//!
//! A confrontation never reads model output or observational data directly;
//! it goes through two capability traits:
//!
//! - [`ModelData`]: sampled time-series extraction by variable name (with
//!   alternate-name fallback and algebraic derivation), per-cell area and
//!   land-fraction grids, and display metadata
//! - [`ObservationSource`]: loading of the observational variable under a
//!   primary or alternate name
//!
//! Extraction returns an explicit [`Extraction`] value rather than raising
//! on absence, so callers fall back to derivation as an ordinary, visible
//! step.
//!
//! [`GriddedModel`] and [`MemorySource`] are in-memory implementations used
//! by the test suites and by demos; real deployments adapt their own
//! storage behind the same traits.

use crate::errors::{BenchError, BenchResult};
use crate::units::UNIT_REGISTRY;
use crate::variable::Variable;
use ndarray::{Array1, Array2, ArrayD, Axis};
use std::collections::HashMap;

/// A request for a model-sampled time series.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    /// Primary variable name.
    pub name: String,
    /// Accepted alternate names, tried in order.
    pub alternates: Vec<String>,
    /// Per-site latitudes; when present the model resamples at these sites.
    pub lats: Option<Array1<f64>>,
    /// Per-site longitudes, paired with `lats`.
    pub lons: Option<Array1<f64>>,
    /// Start of the requested window, days since 1850-01-01.
    pub initial_time: f64,
    /// End of the requested window, days since 1850-01-01.
    pub final_time: f64,
    /// Unit to deliver the data in, when requested.
    pub output_unit: Option<String>,
}

impl ExtractionRequest {
    pub fn new(name: &str, initial_time: f64, final_time: f64) -> Self {
        Self {
            name: name.to_string(),
            alternates: Vec::new(),
            lats: None,
            lons: None,
            initial_time,
            final_time,
            output_unit: None,
        }
    }

    pub fn with_alternates(mut self, alternates: &[String]) -> Self {
        self.alternates = alternates.to_vec();
        self
    }

    pub fn at_sites(mut self, lats: Array1<f64>, lons: Array1<f64>) -> Self {
        self.lats = Some(lats);
        self.lons = Some(lons);
        self
    }

    pub fn in_unit(mut self, unit: &str) -> Self {
        self.output_unit = Some(unit.to_string());
        self
    }
}

/// Outcome of a model extraction attempt.
///
/// Absence is an ordinary value, not an error: the caller decides whether
/// to fall back to a derived expression or to fail.
#[derive(Debug, Clone)]
pub enum Extraction {
    Found(Variable),
    NotFound,
}

/// Capability interface a model must provide to be confronted.
///
/// Implementations are shared across the per-region and per-metric
/// computations of a confront call, which are free to run in parallel, so
/// the trait requires `Send + Sync`.
pub trait ModelData: Send + Sync {
    /// Extract a sampled time series by name, trying alternates in order.
    fn extract_time_series(&self, request: &ExtractionRequest) -> BenchResult<Extraction>;

    /// Evaluate a derived-quantity expression over the requested
    /// coordinates and window. Raises [`BenchError::VarNotInModel`] when
    /// the expression's inputs are unavailable.
    fn derived_variable(
        &self,
        name: &str,
        expression: &str,
        request: &ExtractionRequest,
    ) -> BenchResult<Variable>;

    /// Per-cell areas in m^2, when the model provides them.
    fn cell_areas(&self) -> Option<&Array2<f64>>;

    /// Per-cell land fraction in [0, 1], when the model provides it.
    fn land_fraction(&self) -> Option<&Array2<f64>>;

    /// Name used in tables and plots.
    fn display_name(&self) -> &str;

    /// Color used in plots, as a hex string.
    fn display_color(&self) -> &str;
}

/// Loader for the observational side of a confrontation.
pub trait ObservationSource: Send + Sync + std::fmt::Debug {
    /// Load the variable under its primary or any alternate name.
    fn load(&self, variable: &str, alternates: &[String]) -> BenchResult<Variable>;
}

/// In-memory gridded model output.
#[derive(Debug, Clone)]
pub struct GriddedModel {
    name: String,
    color: String,
    time: Array1<f64>,
    lat: Array1<f64>,
    lon: Array1<f64>,
    fields: HashMap<String, (ArrayD<f64>, String)>,
    cell_areas: Option<Array2<f64>>,
    land_fraction: Option<Array2<f64>>,
}

impl GriddedModel {
    pub fn new(
        name: &str,
        color: &str,
        time: Array1<f64>,
        lat: Array1<f64>,
        lon: Array1<f64>,
    ) -> Self {
        Self {
            name: name.to_string(),
            color: color.to_string(),
            time,
            lat,
            lon,
            fields: HashMap::new(),
            cell_areas: None,
            land_fraction: None,
        }
    }

    /// Attach a field on the model grid (time x lat x lon).
    pub fn add_field(&mut self, name: &str, unit: &str, data: ArrayD<f64>) {
        self.fields
            .insert(name.to_string(), (data, unit.to_string()));
    }

    pub fn with_areas(mut self, cell_areas: Array2<f64>, land_fraction: Array2<f64>) -> Self {
        self.cell_areas = Some(cell_areas);
        self.land_fraction = Some(land_fraction);
        self
    }

    /// Indices of the model samples falling inside the requested window.
    fn window(&self, request: &ExtractionRequest) -> (usize, usize) {
        let mut i0 = 0;
        while i0 < self.time.len() && self.time[i0] < request.initial_time {
            i0 += 1;
        }
        let mut i1 = self.time.len();
        while i1 > i0 && self.time[i1 - 1] > request.final_time {
            i1 -= 1;
        }
        (i0, i1)
    }

    fn build_variable(
        &self,
        name: &str,
        unit: &str,
        data: &ArrayD<f64>,
        request: &ExtractionRequest,
    ) -> BenchResult<Variable> {
        let (i0, i1) = self.window(request);
        if i1 <= i0 {
            return Err(BenchError::VarNotInModel {
                variable: name.to_string(),
                model: self.name.clone(),
            });
        }
        let time = self.time.slice(ndarray::s![i0..i1]).to_owned();
        let clipped = data
            .slice_axis(Axis(0), ndarray::Slice::from(i0..i1))
            .to_owned();

        let variable = match (&request.lats, &request.lons) {
            (Some(lats), Some(lons)) => {
                // resample at the observation's sites by nearest cell
                let nt = time.len();
                let nsites = lats.len();
                let mut sampled = Array2::zeros((nt, nsites));
                for s in 0..nsites {
                    let ilat = nearest(&self.lat, lats[s]);
                    let ilon = nearest(&self.lon, lons[s]);
                    for t in 0..nt {
                        sampled[[t, s]] = clipped[[t, ilat, ilon]];
                    }
                }
                Variable::site_sampled(name, unit, sampled, time, lats.clone(), lons.clone())?
            }
            _ => Variable::gridded(
                name,
                unit,
                clipped,
                Some(time),
                self.lat.clone(),
                self.lon.clone(),
            )?,
        };

        match &request.output_unit {
            Some(target) => variable.convert(target, &UNIT_REGISTRY),
            None => Ok(variable),
        }
    }
}

fn nearest(coords: &Array1<f64>, value: f64) -> usize {
    let mut best = 0;
    let mut dist = f64::INFINITY;
    for (i, &c) in coords.iter().enumerate() {
        let d = (c - value).abs();
        if d < dist {
            dist = d;
            best = i;
        }
    }
    best
}

impl ModelData for GriddedModel {
    fn extract_time_series(&self, request: &ExtractionRequest) -> BenchResult<Extraction> {
        let names = std::iter::once(request.name.as_str())
            .chain(request.alternates.iter().map(String::as_str));
        for name in names {
            if let Some((data, unit)) = self.fields.get(name) {
                return Ok(Extraction::Found(self.build_variable(
                    &request.name,
                    unit,
                    data,
                    request,
                )?));
            }
        }
        Ok(Extraction::NotFound)
    }

    fn derived_variable(
        &self,
        name: &str,
        expression: &str,
        request: &ExtractionRequest,
    ) -> BenchResult<Variable> {
        // the in-memory model supports sums of fields, which covers the
        // derivations the bundled confrontations declare
        let mut total: Option<(ArrayD<f64>, String)> = None;
        for term in expression.split('+').map(str::trim) {
            let (data, unit) = self.fields.get(term).ok_or_else(|| {
                BenchError::VarNotInModel {
                    variable: format!("{name} (derived from '{expression}')"),
                    model: self.name.clone(),
                }
            })?;
            total = Some(match total {
                None => (data.clone(), unit.clone()),
                Some((acc, unit)) => (acc + data, unit),
            });
        }
        let (data, unit) = total.ok_or_else(|| BenchError::VarNotInModel {
            variable: name.to_string(),
            model: self.name.clone(),
        })?;
        self.build_variable(name, &unit, &data, request)
    }

    fn cell_areas(&self) -> Option<&Array2<f64>> {
        self.cell_areas.as_ref()
    }

    fn land_fraction(&self) -> Option<&Array2<f64>> {
        self.land_fraction.as_ref()
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn display_color(&self) -> &str {
        &self.color
    }
}

/// In-memory observation source.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    variables: HashMap<String, Variable>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, variable: Variable) {
        self.variables
            .insert(variable.name().to_string(), variable);
    }
}

impl ObservationSource for MemorySource {
    fn load(&self, variable: &str, alternates: &[String]) -> BenchResult<Variable> {
        let names = std::iter::once(variable).chain(alternates.iter().map(String::as_str));
        for name in names {
            if let Some(v) = self.variables.get(name) {
                return Ok(v.clone());
            }
        }
        Err(BenchError::VarNotInFile(variable.to_string()))
    }
}
