//! The fundamental typed quantity every other component operates on.
//!
//! A [`Variable`] is a physical quantity sampled over time and/or space:
//! a masked numeric array tagged with a unit, an optional time axis (days
//! since 1850-01-01 on the no-leap calendar) and optional lat/lon
//! coordinates. Masked samples are `NaN`; every operation is NaN-aware.
//!
//! Three supports are distinguished:
//!
//! - **gridded**: `data` is time × lat × lon (or lat × lon without a time
//!   axis), `lat`/`lon` are the grid coordinate arrays
//! - **site-sampled**: `data` is time × site, `lat`/`lon` give one
//!   coordinate per site
//! - **series**: `data` is a bare time series with no spatial support
//!
//! Variables are immutable: analysis operations (unit conversion,
//! temporal/spatial integration, differencing) return new variables.

use crate::errors::{BenchError, BenchResult};
use crate::metrics;
use crate::regions::Region;
use crate::units::UnitRegistry;
use ndarray::{Array1, Array2, ArrayD, ArrayView1, Axis, IxDyn, Zip};
use serde::{Deserialize, Serialize};

/// The float type used throughout the engine.
pub type FloatValue = f64;

/// Mean radius of the Earth in metres, used for grid cell areas.
const EARTH_RADIUS: f64 = 6.371e6;

/// A physical quantity sampled over time and/or space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    name: String,
    unit: String,
    data: ArrayD<f64>,
    time: Option<Array1<f64>>,
    lat: Option<Array1<f64>>,
    lon: Option<Array1<f64>>,
    ndata: Option<usize>,
}

/// Per-calendar-month climatology of a monthly series.
///
/// `mean`/`std` hold one entry per calendar month; `peak_month_mean` and
/// `peak_month_std` summarize the month-of-maximum across the whole years
/// of the series (0 = January).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnualCycle {
    pub mean: Array1<f64>,
    pub std: Array1<f64>,
    pub peak_month_mean: f64,
    pub peak_month_std: f64,
}

impl Variable {
    /// A bare time series with no spatial support.
    pub fn series(
        name: &str,
        unit: &str,
        data: Array1<f64>,
        time: Array1<f64>,
    ) -> BenchResult<Self> {
        let v = Self {
            name: name.to_string(),
            unit: unit.to_string(),
            data: data.into_dyn(),
            time: Some(time),
            lat: None,
            lon: None,
            ndata: None,
        };
        v.validate()?;
        Ok(v)
    }

    /// A gridded, time-indexed variable (time × lat × lon).
    pub fn gridded(
        name: &str,
        unit: &str,
        data: ArrayD<f64>,
        time: Option<Array1<f64>>,
        lat: Array1<f64>,
        lon: Array1<f64>,
    ) -> BenchResult<Self> {
        let v = Self {
            name: name.to_string(),
            unit: unit.to_string(),
            data,
            time,
            lat: Some(lat),
            lon: Some(lon),
            ndata: None,
        };
        v.validate()?;
        Ok(v)
    }

    /// A site-sampled, time-indexed variable (time × site) with one
    /// lat/lon coordinate per site.
    pub fn site_sampled(
        name: &str,
        unit: &str,
        data: Array2<f64>,
        time: Array1<f64>,
        lat: Array1<f64>,
        lon: Array1<f64>,
    ) -> BenchResult<Self> {
        let ndata = lat.len();
        let v = Self {
            name: name.to_string(),
            unit: unit.to_string(),
            data: data.into_dyn(),
            time: Some(time),
            lat: Some(lat),
            lon: Some(lon),
            ndata: Some(ndata),
        };
        v.validate()?;
        Ok(v)
    }

    fn validate(&self) -> BenchResult<()> {
        if let Some(time) = &self.time {
            if time.len() != self.data.shape().first().copied().unwrap_or(0) {
                return Err(BenchError::Analysis(format!(
                    "variable '{}': time axis has {} samples but data's leading dimension is {}",
                    self.name,
                    time.len(),
                    self.data.shape().first().copied().unwrap_or(0)
                )));
            }
            for w in time.windows(2) {
                if w[1] <= w[0] {
                    return Err(BenchError::Analysis(format!(
                        "variable '{}': time axis is not strictly increasing",
                        self.name
                    )));
                }
            }
        }
        match (&self.lat, &self.lon, self.ndata) {
            (Some(lat), Some(lon), Some(ndata)) => {
                let sites = self.data.shape().last().copied().unwrap_or(0);
                if lat.len() != ndata || lon.len() != ndata || sites != ndata {
                    return Err(BenchError::Analysis(format!(
                        "variable '{}': site coordinates do not match data shape",
                        self.name
                    )));
                }
            }
            (Some(lat), Some(lon), None) => {
                let shape = self.data.shape();
                if shape.len() < 2
                    || shape[shape.len() - 2] != lat.len()
                    || shape[shape.len() - 1] != lon.len()
                {
                    return Err(BenchError::Analysis(format!(
                        "variable '{}': lat/lon do not describe data's trailing dimensions",
                        self.name
                    )));
                }
            }
            _ => {}
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn data(&self) -> &ArrayD<f64> {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut ArrayD<f64> {
        &mut self.data
    }

    pub fn time(&self) -> Option<&Array1<f64>> {
        self.time.as_ref()
    }

    pub fn lat(&self) -> Option<&Array1<f64>> {
        self.lat.as_ref()
    }

    pub fn lon(&self) -> Option<&Array1<f64>> {
        self.lon.as_ref()
    }

    /// True when the variable has a time axis.
    pub fn temporal(&self) -> bool {
        self.time.is_some()
    }

    /// True when the variable is defined on a lat/lon grid.
    pub fn spatial(&self) -> bool {
        self.lat.is_some() && self.lon.is_some() && self.ndata.is_none()
    }

    /// Site count for site-sampled data.
    pub fn ndata(&self) -> Option<usize> {
        self.ndata
    }

    /// Smallest valid value, `NaN` when fully masked.
    pub fn min(&self) -> f64 {
        self.data
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .fold(f64::NAN, f64::min)
    }

    /// Largest valid value, `NaN` when fully masked.
    pub fn max(&self) -> f64 {
        self.data
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .fold(f64::NAN, f64::max)
    }

    /// The data as a 1-D view; fails for gridded or site-sampled data.
    pub fn values(&self) -> BenchResult<ArrayView1<f64>> {
        self.data
            .view()
            .into_dimensionality::<ndarray::Ix1>()
            .map_err(|_| {
                BenchError::Analysis(format!(
                    "variable '{}' is not one-dimensional",
                    self.name
                ))
            })
    }

    /// The single value of a reduced (scalar) variable.
    pub fn scalar_value(&self) -> BenchResult<f64> {
        if self.data.len() != 1 {
            return Err(BenchError::Analysis(format!(
                "variable '{}' holds {} values, expected one",
                self.name,
                self.data.len()
            )));
        }
        Ok(*self.data.iter().next().unwrap())
    }

    /// Convert into another unit via the registry, returning a new
    /// unit-tagged variable with rescaled data.
    pub fn convert(&self, to_unit: &str, units: &UnitRegistry) -> BenchResult<Self> {
        let conversion = units.conversion(&self.unit, to_unit)?;
        let mut out = self.clone();
        out.data.mapv_inplace(|v| conversion.apply(v));
        out.unit = to_unit.to_string();
        Ok(out)
    }

    /// Multiply the data by `scale` and relabel the unit, without consulting
    /// the registry. Used by the staging magnitude-normalization pass, whose
    /// substitutions change representation but not physical meaning.
    pub fn rescale(&self, scale: f64, new_unit: &str) -> Self {
        let mut out = self.clone();
        out.data.mapv_inplace(|v| v * scale);
        out.unit = new_unit.to_string();
        out
    }

    /// Restrict to the time samples `i0..=i1`.
    pub(crate) fn clip_time(&self, i0: usize, i1: usize) -> BenchResult<Self> {
        let time = self
            .time
            .as_ref()
            .ok_or_else(|| BenchError::NotTemporalVariable(self.name.clone()))?;
        let mut out = self.clone();
        out.time = Some(time.slice(ndarray::s![i0..=i1]).to_owned());
        out.data = self
            .data
            .slice_axis(Axis(0), ndarray::Slice::from(i0 as isize..=i1 as isize))
            .to_owned();
        Ok(out)
    }

    /// Trapezoidal integral over the time axis.
    ///
    /// Sample pairs where either endpoint is masked contribute nothing;
    /// cells with no valid pair at all come out masked. The output unit
    /// gains ` d` and the time axis is dropped.
    pub fn integrate_in_time(&self) -> BenchResult<Self> {
        let time = self
            .time
            .as_ref()
            .ok_or_else(|| BenchError::NotTemporalVariable(self.name.clone()))?;
        if time.len() < 2 {
            return Err(BenchError::Analysis(format!(
                "variable '{}': time integration needs at least two samples",
                self.name
            )));
        }
        let rest: Vec<usize> = self.data.shape()[1..].to_vec();
        let mut acc = ArrayD::<f64>::zeros(IxDyn(&rest));
        let mut any = ArrayD::<f64>::zeros(IxDyn(&rest));
        for i in 0..time.len() - 1 {
            let dt = time[i + 1] - time[i];
            let a = self.data.index_axis(Axis(0), i);
            let b = self.data.index_axis(Axis(0), i + 1);
            Zip::from(&mut acc)
                .and(&mut any)
                .and(&a)
                .and(&b)
                .for_each(|acc, any, &a, &b| {
                    if !a.is_nan() && !b.is_nan() {
                        *acc += 0.5 * (a + b) * dt;
                        *any = 1.0;
                    }
                });
        }
        Zip::from(&mut acc).and(&any).for_each(|acc, &any| {
            if any == 0.0 {
                *acc = f64::NAN;
            }
        });
        Ok(Self {
            name: format!("{}_timeint", self.name),
            unit: format!("{} d", self.unit),
            data: acc,
            time: None,
            lat: self.lat.clone(),
            lon: self.lon.clone(),
            ndata: self.ndata,
        })
    }

    /// Area-weighted spatial integral (or mean) over a region.
    ///
    /// Gridded data uses spherical cell areas computed from the lat/lon
    /// coordinates; the integral's unit gains ` m2` while the mean keeps
    /// the unit unchanged. Site-sampled data reduces by the plain mean of
    /// the sites inside the region either way, since sites carry no area.
    /// The time axis, when present, is preserved.
    pub fn integrate_in_space(&self, region: &Region, mean: bool) -> BenchResult<Self> {
        if self.ndata.is_some() {
            return self.site_mean(region);
        }
        let (lat, lon) = match (&self.lat, &self.lon) {
            (Some(lat), Some(lon)) => (lat, lon),
            _ => {
                return Err(BenchError::Analysis(format!(
                    "variable '{}' has no spatial support to integrate over",
                    self.name
                )))
            }
        };
        let areas = cell_areas(lat, lon);
        let inside = region_mask(region, lat, lon);

        let reduce = |plane: ndarray::ArrayViewD<f64>| -> f64 {
            let plane = plane
                .into_dimensionality::<ndarray::Ix2>()
                .expect("gridded data planes are 2-D");
            let mut num = 0.0;
            let mut den = 0.0;
            for ((i, j), &v) in plane.indexed_iter() {
                if inside[[i, j]] && !v.is_nan() {
                    num += v * areas[[i, j]];
                    den += areas[[i, j]];
                }
            }
            if den == 0.0 {
                f64::NAN
            } else if mean {
                num / den
            } else {
                num
            }
        };

        let (suffix, unit) = if mean {
            ("spacemean", self.unit.clone())
        } else {
            ("spaceint", format!("{} m2", self.unit))
        };

        match &self.time {
            Some(time) => {
                let mut out = Array1::zeros(time.len());
                for (i, slot) in out.iter_mut().enumerate() {
                    *slot = reduce(self.data.index_axis(Axis(0), i));
                }
                Ok(Self {
                    name: format!("{}_{}", self.name, suffix),
                    unit,
                    data: out.into_dyn(),
                    time: Some(time.clone()),
                    lat: None,
                    lon: None,
                    ndata: None,
                })
            }
            None => {
                let value = reduce(self.data.view());
                Ok(Self {
                    name: format!("{}_{}", self.name, suffix),
                    unit,
                    data: Array1::from(vec![value]).into_dyn(),
                    time: None,
                    lat: None,
                    lon: None,
                    ndata: None,
                })
            }
        }
    }

    fn site_mean(&self, region: &Region) -> BenchResult<Self> {
        let (lat, lon) = (self.lat.as_ref().unwrap(), self.lon.as_ref().unwrap());
        let keep: Vec<bool> = lat
            .iter()
            .zip(lon.iter())
            .map(|(&la, &lo)| region.contains(la, lo))
            .collect();
        let data = self
            .data
            .view()
            .into_dimensionality::<ndarray::Ix2>()
            .map_err(|_| {
                BenchError::Analysis(format!(
                    "site-sampled variable '{}' must be time x site",
                    self.name
                ))
            })?;
        let mut out = Array1::zeros(data.nrows());
        for (i, row) in data.outer_iter().enumerate() {
            let mut sum = 0.0;
            let mut n = 0usize;
            for (j, &v) in row.iter().enumerate() {
                if keep[j] && !v.is_nan() {
                    sum += v;
                    n += 1;
                }
            }
            out[i] = if n == 0 { f64::NAN } else { sum / n as f64 };
        }
        Ok(Self {
            name: format!("{}_spacemean", self.name),
            unit: self.unit.clone(),
            data: out.into_dyn(),
            time: self.time.clone(),
            lat: None,
            lon: None,
            ndata: None,
        })
    }

    /// Pointwise difference `other - self` on identical supports.
    pub fn spatial_difference(&self, other: &Self) -> BenchResult<Self> {
        if self.data.shape() != other.data.shape() {
            return Err(BenchError::VarsNotComparable(format!(
                "cannot difference '{}' {:?} against '{}' {:?}: shapes differ",
                self.name,
                self.data.shape(),
                other.name,
                other.data.shape()
            )));
        }
        if self.unit != other.unit {
            return Err(BenchError::VarsNotComparable(format!(
                "cannot difference '{}' [{}] against '{}' [{}]: units differ",
                self.name, self.unit, other.name, other.unit
            )));
        }
        Ok(Self {
            name: "bias".to_string(),
            unit: self.unit.clone(),
            data: &other.data - &self.data,
            time: self.time.clone(),
            lat: self.lat.clone(),
            lon: self.lon.clone(),
            ndata: self.ndata,
        })
    }

    /// Mask the data to `NaN` outside the region.
    ///
    /// Variables without spatial support are returned unchanged; their
    /// values carry no coordinates to test.
    pub fn mask_region(&self, region: &Region) -> Self {
        let mut out = self.clone();
        match (&self.lat, &self.lon, self.ndata) {
            (Some(lat), Some(lon), Some(_)) => {
                // sites live on the trailing axis whatever the rank
                let n = self.data.ndim();
                let keep: Vec<bool> = lat
                    .iter()
                    .zip(lon.iter())
                    .map(|(&la, &lo)| region.contains(la, lo))
                    .collect();
                for (idx, v) in out.data.indexed_iter_mut() {
                    if !keep[idx[n - 1]] {
                        *v = f64::NAN;
                    }
                }
            }
            (Some(lat), Some(lon), None) => {
                let inside = region_mask(region, lat, lon);
                let shape = out.data.shape().to_vec();
                let n = shape.len();
                for (idx, v) in out.data.indexed_iter_mut() {
                    let (i, j) = (idx[n - 2], idx[n - 1]);
                    if !inside[[i, j]] {
                        *v = f64::NAN;
                    }
                }
            }
            _ => {}
        }
        out
    }

    /// Per-calendar-month climatology of a monthly 1-D series.
    pub fn annual_cycle(&self) -> BenchResult<AnnualCycle> {
        let time = self
            .time
            .as_ref()
            .ok_or_else(|| BenchError::NotTemporalVariable(self.name.clone()))?;
        let values = self.values()?;
        if time.len() < 12 {
            return Err(BenchError::Analysis(format!(
                "variable '{}': annual cycle needs at least one whole year",
                self.name
            )));
        }
        let mut month_values: Vec<Vec<f64>> = vec![Vec::new(); 12];
        for (&t, &v) in time.iter().zip(values.iter()) {
            let month = ((t.rem_euclid(metrics::DAYS_PER_YEAR)) / metrics::DAYS_PER_YEAR * 12.0)
                as usize;
            month_values[month.min(11)].push(v);
        }
        let mut mean = Array1::zeros(12);
        let mut std = Array1::zeros(12);
        for (m, vals) in month_values.iter().enumerate() {
            let arr = Array1::from(vals.clone());
            mean[m] = metrics::nanmean(arr.view());
            std[m] = metrics::nanstd(arr.view());
        }
        // month-of-maximum across whole years
        let years = time.len() / 12;
        let mut peaks = Array1::from_elem(years, f64::NAN);
        for y in 0..years {
            let mut best = f64::NAN;
            let mut best_m = None;
            for m in 0..12 {
                let v = values[12 * y + m];
                if !v.is_nan() && (best_m.is_none() || v > best) {
                    best = v;
                    best_m = Some(m);
                }
            }
            if let Some(m) = best_m {
                peaks[y] = m as f64;
            }
        }
        Ok(AnnualCycle {
            mean,
            std,
            peak_month_mean: metrics::nanmean(peaks.view()),
            peak_month_std: metrics::nanstd(peaks.view()),
        })
    }
}

/// Spherical cell areas in m^2 from grid-center coordinates.
///
/// Cell bounds are taken at the midpoints between centers, clamped to the
/// poles; edge cells extend symmetrically.
pub fn cell_areas(lat: &Array1<f64>, lon: &Array1<f64>) -> Array2<f64> {
    let lat_bnds = center_bounds(lat, -90.0, 90.0);
    let lon_bnds = center_bounds(lon, -180.0, 180.0);
    let mut areas = Array2::zeros((lat.len(), lon.len()));
    for i in 0..lat.len() {
        let band = (lat_bnds[i + 1].to_radians().sin() - lat_bnds[i].to_radians().sin()).abs();
        for j in 0..lon.len() {
            let width = (lon_bnds[j + 1] - lon_bnds[j]).abs().to_radians();
            areas[[i, j]] = EARTH_RADIUS * EARTH_RADIUS * band * width;
        }
    }
    areas
}

fn center_bounds(centers: &Array1<f64>, lo: f64, hi: f64) -> Vec<f64> {
    let n = centers.len();
    let mut bnds = vec![0.0; n + 1];
    if n == 1 {
        // degenerate grid, assume a one-degree cell
        bnds[0] = (centers[0] - 0.5).max(lo);
        bnds[1] = (centers[0] + 0.5).min(hi);
        return bnds;
    }
    for i in 1..n {
        bnds[i] = 0.5 * (centers[i - 1] + centers[i]);
    }
    bnds[0] = (centers[0] - 0.5 * (centers[1] - centers[0])).max(lo);
    bnds[n] = (centers[n - 1] + 0.5 * (centers[n - 1] - centers[n - 2])).min(hi);
    bnds
}

fn region_mask(region: &Region, lat: &Array1<f64>, lon: &Array1<f64>) -> Array2<bool> {
    let mut mask = Array2::from_elem((lat.len(), lon.len()), false);
    for (i, &la) in lat.iter().enumerate() {
        for (j, &lo) in lon.iter().enumerate() {
            mask[[i, j]] = region.contains(la, lo);
        }
    }
    mask
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regions::RegionRegistry;
    use crate::units::UnitRegistry;
    use is_close::is_close;
    use ndarray::array;

    fn monthly_times(years: usize) -> Array1<f64> {
        let mut t = Vec::new();
        for y in 0..years {
            let mut day = 0.0;
            for m in 0..12 {
                t.push(y as f64 * 365.0 + day + 0.5 * metrics::DAYS_PER_MONTH[m]);
                day += metrics::DAYS_PER_MONTH[m];
            }
        }
        Array1::from(t)
    }

    fn small_grid(value: f64, nt: usize) -> Variable {
        let lat = array![-45.0, 45.0];
        let lon = array![-90.0, 90.0];
        let data = ArrayD::from_elem(IxDyn(&[nt, 2, 2]), value);
        let time = Array1::from_iter((0..nt).map(|i| 15.0 + 30.0 * i as f64));
        Variable::gridded("gpp", "g m-2 d-1", data, Some(time), lat, lon).unwrap()
    }

    #[test]
    fn time_axis_must_match_leading_dimension() {
        let data = array![1.0, 2.0, 3.0];
        let time = array![0.0, 1.0];
        assert!(Variable::series("x", "K", data, time).is_err());
    }

    #[test]
    fn time_axis_must_be_strictly_increasing() {
        let data = array![1.0, 2.0, 3.0];
        let time = array![0.0, 2.0, 2.0];
        assert!(Variable::series("x", "K", data, time).is_err());
    }

    #[test]
    fn convert_round_trips() {
        let units = UnitRegistry::with_defaults();
        let v = Variable::series("t", "degC", array![0.0, 21.5], array![0.0, 1.0]).unwrap();
        let k = v.convert("K", &units).unwrap();
        assert_eq!(k.unit(), "K");
        assert!(is_close!(k.values().unwrap()[0], 273.15));
        let back = k.convert("degC", &units).unwrap();
        for (a, b) in v.values().unwrap().iter().zip(back.values().unwrap().iter()) {
            assert!(is_close!(*a, *b));
        }
    }

    #[test]
    fn convert_unknown_unit_fails() {
        let units = UnitRegistry::with_defaults();
        let v = Variable::series("t", "degC", array![0.0], array![0.0]).unwrap();
        assert!(matches!(
            v.convert("W m-2", &units),
            Err(BenchError::UnknownUnit { .. })
        ));
    }

    #[test]
    fn integrate_in_time_of_constant_is_span() {
        let v = small_grid(2.0, 4);
        let ti = v.integrate_in_time().unwrap();
        assert!(!ti.temporal());
        assert_eq!(ti.unit(), "g m-2 d-1 d");
        // constant 2.0 over 90 days
        let expected = 2.0 * 90.0;
        for val in ti.data().iter() {
            assert!(is_close!(*val, expected));
        }
    }

    #[test]
    fn integrate_in_time_skips_masked_pairs() {
        let time = array![0.0, 10.0, 20.0];
        let mut data = ArrayD::from_elem(IxDyn(&[3, 1, 1]), 1.0);
        data[[1, 0, 0]] = f64::NAN;
        let v = Variable::gridded("x", "g", data, Some(time), array![0.0], array![0.0]).unwrap();
        let ti = v.integrate_in_time().unwrap();
        // both pairs touch the masked sample, nothing accumulates
        assert!(ti.data().iter().next().unwrap().is_nan());
    }

    #[test]
    fn space_mean_of_uniform_field_is_the_value() {
        let regions = RegionRegistry::with_defaults();
        let v = small_grid(3.5, 2);
        let mean = v
            .integrate_in_space(&regions.get("global").unwrap(), true)
            .unwrap();
        assert_eq!(mean.unit(), "g m-2 d-1");
        for val in mean.values().unwrap().iter() {
            assert!(is_close!(*val, 3.5));
        }
    }

    #[test]
    fn space_integral_of_uniform_field_scales_with_area() {
        let regions = RegionRegistry::with_defaults();
        let v = small_grid(1.0, 1);
        let total = v
            .integrate_in_space(&regions.get("global").unwrap(), false)
            .unwrap();
        assert_eq!(total.unit(), "g m-2 d-1 m2");
        let lat = array![-45.0, 45.0];
        let lon = array![-90.0, 90.0];
        let expected: f64 = cell_areas(&lat, &lon).sum();
        assert!(is_close!(total.values().unwrap()[0], expected, rel_tol = 1e-10));
    }

    #[test]
    fn region_masking_excludes_outside_cells() {
        let regions = RegionRegistry::with_defaults();
        // northern cells only
        let northern = crate::regions::Region::new(0.0, 90.0, -180.0, 180.0);
        let mut v = small_grid(1.0, 1);
        v = v.mask_region(&northern);
        let masked: usize = v.data().iter().filter(|v| v.is_nan()).count();
        assert_eq!(masked, 2);

        // and the mean over the full region ignores them
        let mean = v
            .integrate_in_space(&regions.get("global").unwrap(), true)
            .unwrap();
        assert!(is_close!(mean.values().unwrap()[0], 1.0));
    }

    #[test]
    fn site_sampled_space_mean() {
        let time = array![0.0, 30.0];
        let data = array![[1.0, 3.0], [2.0, 4.0]];
        let v = Variable::site_sampled(
            "co2",
            "ppm",
            data,
            time,
            array![19.5, -89.98],
            array![-155.6, -24.8],
        )
        .unwrap();
        let mean = v
            .integrate_in_space(&crate::regions::Region::global(), true)
            .unwrap();
        let vals = mean.values().unwrap();
        assert!(is_close!(vals[0], 2.0));
        assert!(is_close!(vals[1], 3.0));
    }

    #[test]
    fn spatial_difference_requires_matching_grids() {
        let a = small_grid(1.0, 2);
        let b = small_grid(3.0, 2);
        let diff = a.spatial_difference(&b).unwrap();
        for v in diff.data().iter() {
            assert!(is_close!(*v, 2.0));
        }

        let c = small_grid(1.0, 3);
        assert!(matches!(
            a.spatial_difference(&c),
            Err(BenchError::VarsNotComparable(_))
        ));
    }

    #[test]
    fn annual_cycle_finds_the_peak_month() {
        let t = monthly_times(3);
        let values = Array1::from_iter((0..36).map(|i| if i % 12 == 6 { 9.0 } else { 1.0 }));
        let v = Variable::series("gpp", "g m-2 d-1", values, t).unwrap();
        let cycle = v.annual_cycle().unwrap();
        assert!(is_close!(cycle.peak_month_mean, 6.0));
        assert!(cycle.peak_month_std.abs() < 1e-12);
        assert!(is_close!(cycle.mean[6], 9.0));
        assert!(is_close!(cycle.mean[0], 1.0));
    }

    #[test]
    fn serialization_round_trip() {
        let v = small_grid(1.25, 2);
        let json = serde_json::to_string(&v).unwrap();
        let back: Variable = serde_json::from_str(&json).unwrap();
        assert_eq!(v, back);
    }
}
