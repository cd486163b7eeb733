//! Statistical metrics over aligned time series.
//!
//! All functions operate on equal-length 1-D arrays in which `NaN` marks a
//! masked sample; statistics are computed over the valid samples only.
//! Time is measured in days since 1850-01-01 on a 365-day no-leap calendar.
//!
//! The reference array is considered ground truth for the asymmetric
//! normalizations: [`Normalize::MaxMin`] divides by the reference range and
//! [`Normalize::Score`] maps onto a unitless skill score in [0, 1] where 1
//! is perfect agreement.

use crate::errors::{BenchError, BenchResult};
use ndarray::{Array1, ArrayView1};

/// Days in each calendar month of the no-leap calendar.
pub const DAYS_PER_MONTH: [f64; 12] = [
    31.0, 28.0, 31.0, 30.0, 31.0, 30.0, 31.0, 31.0, 30.0, 31.0, 30.0, 31.0,
];

/// Days per year of the no-leap calendar.
pub const DAYS_PER_YEAR: f64 = 365.0;

/// Normalization applied to [`bias`] and [`rmse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Normalize {
    /// Raw value in the units of the inputs.
    None,
    /// Divide by `max(reference) - min(reference)`.
    MaxMin,
    /// Map onto a unitless skill score in [0, 1], 1 = perfect.
    Score,
}

pub(crate) fn nanmin(values: ArrayView1<f64>) -> f64 {
    values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(f64::NAN, f64::min)
}

pub(crate) fn nanmax(values: ArrayView1<f64>) -> f64 {
    values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(f64::NAN, f64::max)
}

pub(crate) fn nanmean(values: ArrayView1<f64>) -> f64 {
    let mut sum = 0.0;
    let mut n = 0usize;
    for &v in values.iter() {
        if !v.is_nan() {
            sum += v;
            n += 1;
        }
    }
    if n == 0 {
        f64::NAN
    } else {
        sum / n as f64
    }
}

/// Population standard deviation over the valid samples.
pub(crate) fn nanstd(values: ArrayView1<f64>) -> f64 {
    let mean = nanmean(values);
    if mean.is_nan() {
        return f64::NAN;
    }
    let mut sum = 0.0;
    let mut n = 0usize;
    for &v in values.iter() {
        if !v.is_nan() {
            sum += (v - mean) * (v - mean);
            n += 1;
        }
    }
    (sum / n as f64).sqrt()
}

/// Weighted mean over the valid samples; weights are renormalized over the
/// samples that survive masking.
pub(crate) fn weighted_nanmean(values: ArrayView1<f64>, weights: ArrayView1<f64>) -> f64 {
    let mut num = 0.0;
    let mut den = 0.0;
    for (&v, &w) in values.iter().zip(weights.iter()) {
        if !v.is_nan() {
            num += w * v;
            den += w;
        }
    }
    if den == 0.0 {
        f64::NAN
    } else {
        num / den
    }
}

fn check_lengths(name: &str, a: usize, b: usize) -> BenchResult<()> {
    if a != b {
        return Err(BenchError::Analysis(format!(
            "{name}: input arrays differ in length ({a} vs {b})"
        )));
    }
    Ok(())
}

/// Computes the bias of a prediction against a reference.
///
/// The bias is `mean(prediction) - mean(reference)`, optionally weighted.
/// [`Normalize::MaxMin`] divides by the reference range;
/// [`Normalize::Score`] maps to `clip(1 - |bias / mean(reference)|, 0, 1)`.
///
/// # Example
///
/// ```
/// use modelbench_core::metrics::{bias, Normalize};
/// use ndarray::array;
///
/// let x = array![1.0, 2.0, 1.0, 2.0];
/// let y = array![2.0, 1.0, 2.0, 1.0];
/// assert_eq!(bias(x.view(), y.view(), Normalize::None, None).unwrap(), 0.0);
/// ```
pub fn bias(
    reference: ArrayView1<f64>,
    prediction: ArrayView1<f64>,
    normalize: Normalize,
    weights: Option<ArrayView1<f64>>,
) -> BenchResult<f64> {
    check_lengths("bias", reference.len(), prediction.len())?;
    let (pmean, rmean) = match weights {
        Some(w) => {
            check_lengths("bias weights", reference.len(), w.len())?;
            (weighted_nanmean(prediction, w), weighted_nanmean(reference, w))
        }
        None => (nanmean(prediction), nanmean(reference)),
    };
    let b = pmean - rmean;
    Ok(match normalize {
        Normalize::None => b,
        Normalize::MaxMin => b / (nanmax(reference) - nanmin(reference)),
        Normalize::Score => (1.0 - (b / rmean).abs()).clamp(0.0, 1.0),
    })
}

/// Computes the root mean squared error of a prediction against a reference.
///
/// [`Normalize::MaxMin`] divides by the reference range;
/// [`Normalize::Score`] is `clip(1 - rmse / (max(ref) - min(ref)), 0, 1)`.
///
/// # Example
///
/// ```
/// use modelbench_core::metrics::{rmse, Normalize};
/// use ndarray::array;
///
/// let x = array![1.0, 2.0, 3.0];
/// let y = array![4.0, 5.0, 6.0];
/// assert_eq!(rmse(x.view(), y.view(), Normalize::None).unwrap(), 3.0);
/// assert_eq!(rmse(x.view(), y.view(), Normalize::MaxMin).unwrap(), 1.5);
/// ```
pub fn rmse(
    reference: ArrayView1<f64>,
    prediction: ArrayView1<f64>,
    normalize: Normalize,
) -> BenchResult<f64> {
    check_lengths("rmse", reference.len(), prediction.len())?;
    let mut sum = 0.0;
    let mut n = 0usize;
    for (&r, &p) in reference.iter().zip(prediction.iter()) {
        if !r.is_nan() && !p.is_nan() {
            sum += (p - r) * (p - r);
            n += 1;
        }
    }
    if n == 0 {
        return Ok(f64::NAN);
    }
    let value = (sum / n as f64).sqrt();
    Ok(match normalize {
        Normalize::None => value,
        Normalize::MaxMin => value / (nanmax(reference) - nanmin(reference)),
        Normalize::Score => {
            (1.0 - value / (nanmax(reference) - nanmin(reference))).clamp(0.0, 1.0)
        }
    })
}

/// Index of the first January-aligned sample, searching the leading
/// `search` samples of `t` for the minimum of `t mod period`.
fn aligned_begin(t: ArrayView1<f64>, search: usize, period: f64) -> usize {
    let limit = search.min(t.len());
    let mut begin = 0;
    let mut best = f64::INFINITY;
    for (i, &ti) in t.iter().take(limit).enumerate() {
        let phase = ti.rem_euclid(period);
        if phase < best {
            best = phase;
            begin = i;
        }
    }
    begin
}

/// Window `t` to whole blocks of `block` monthly samples starting at the
/// first sample aligned to `period` days. Returns `(begin, end)` with
/// `end - begin` a multiple of `block`.
fn whole_blocks(t: ArrayView1<f64>, search: usize, period: f64, block: usize) -> (usize, usize) {
    let begin = aligned_begin(t, search, period);
    let end = begin + (t.len() - begin) / block * block;
    (begin, end)
}

/// Computes the annual mean of a monthly time series.
///
/// The series is truncated to whole years starting at the first
/// January-aligned sample; leading and trailing partial years are
/// discarded. Each year's mean time and value are weighted by the
/// canonical month lengths.
///
/// Returns `(tmean, vmean)`, one entry per whole year.
pub fn annual_mean(
    t: ArrayView1<f64>,
    var: ArrayView1<f64>,
) -> BenchResult<(Array1<f64>, Array1<f64>)> {
    check_lengths("annual_mean", t.len(), var.len())?;
    if t.len() < 12 {
        return Err(BenchError::Analysis(format!(
            "annual_mean requires at least 12 monthly samples, got {}",
            t.len()
        )));
    }
    let (begin, end) = whole_blocks(t, 11, DAYS_PER_YEAR, 12);
    let weights = Array1::from_iter(DAYS_PER_MONTH.iter().map(|d| d / DAYS_PER_YEAR));
    let years = (end - begin) / 12;
    let mut tmean = Array1::zeros(years);
    let mut vmean = Array1::zeros(years);
    for y in 0..years {
        let lo = begin + 12 * y;
        let ts = t.slice(ndarray::s![lo..lo + 12]);
        let vs = var.slice(ndarray::s![lo..lo + 12]);
        tmean[y] = weighted_nanmean(ts, weights.view());
        vmean[y] = weighted_nanmean(vs, weights.view());
    }
    Ok((tmean, vmean))
}

/// Computes the per-year minimum and maximum of a monthly time series.
///
/// Same whole-year windowing as [`annual_mean`]; extrema are unweighted.
/// Returns `(vmin, vmax)`.
pub fn annual_min_max(
    t: ArrayView1<f64>,
    var: ArrayView1<f64>,
) -> BenchResult<(Array1<f64>, Array1<f64>)> {
    check_lengths("annual_min_max", t.len(), var.len())?;
    if t.len() < 12 {
        return Err(BenchError::Analysis(format!(
            "annual_min_max requires at least 12 monthly samples, got {}",
            t.len()
        )));
    }
    let (begin, end) = whole_blocks(t, 11, DAYS_PER_YEAR, 12);
    let years = (end - begin) / 12;
    let mut vmin = Array1::zeros(years);
    let mut vmax = Array1::zeros(years);
    for y in 0..years {
        let lo = begin + 12 * y;
        let vs = var.slice(ndarray::s![lo..lo + 12]);
        vmin[y] = nanmin(vs);
        vmax[y] = nanmax(vs);
    }
    Ok((vmin, vmax))
}

/// Computes the mean and standard deviation of the seasonal amplitude over
/// decades.
///
/// The series is truncated to whole decades (120 monthly samples) starting
/// at the first decade-aligned sample; fractions of a decade at either end
/// are discarded. Within each decade the amplitude of each of the 10 years
/// is `max - min` of its 12 months; the mean and population standard
/// deviation of those 10 amplitudes are returned per decade, along with the
/// mean time of each decade.
///
/// Returns `(tmean, amp_mean, amp_std)`.
pub fn decadal_amplitude(
    t: ArrayView1<f64>,
    var: ArrayView1<f64>,
) -> BenchResult<(Array1<f64>, Array1<f64>, Array1<f64>)> {
    check_lengths("decadal_amplitude", t.len(), var.len())?;
    let (begin, end) = whole_blocks(t, 119, 10.0 * DAYS_PER_YEAR, 120);
    let decades = (end - begin) / 120;
    let mut tmean = Array1::zeros(decades);
    let mut amp_mean = Array1::zeros(decades);
    let mut amp_std = Array1::zeros(decades);
    for d in 0..decades {
        let lo = begin + 120 * d;
        tmean[d] = nanmean(t.slice(ndarray::s![lo..lo + 120]));
        let mut amps = Array1::zeros(10);
        for y in 0..10 {
            let ylo = lo + 12 * y;
            let vs = var.slice(ndarray::s![ylo..ylo + 12]);
            amps[y] = nanmax(vs) - nanmin(vs);
        }
        amp_mean[d] = nanmean(amps.view());
        amp_std[d] = nanstd(amps.view());
    }
    Ok((tmean, amp_mean, amp_std))
}

fn decadal_extremum_time(
    t: ArrayView1<f64>,
    var: ArrayView1<f64>,
    maximum: bool,
) -> BenchResult<Array1<f64>> {
    check_lengths("decadal_extremum_time", t.len(), var.len())?;
    let (begin, end) = whole_blocks(t, 119, 10.0 * DAYS_PER_YEAR, 120);
    let decades = (end - begin) / 120;
    if decades == 0 {
        return Ok(Array1::zeros(0));
    }
    // month-of-year offsets of the first whole year, as fractions of a year
    let month_offsets: Vec<f64> = (0..12)
        .map(|m| (t[begin + m] - t[begin]) / DAYS_PER_YEAR)
        .collect();
    let mut result = Array1::zeros(decades);
    for d in 0..decades {
        let lo = begin + 120 * d;
        let mut times = Array1::from_elem(10, f64::NAN);
        for y in 0..10 {
            let ylo = lo + 12 * y;
            let mut best_idx = None;
            let mut best = f64::NAN;
            for m in 0..12 {
                let v = var[ylo + m];
                if v.is_nan() {
                    continue;
                }
                let better = match best_idx {
                    None => true,
                    Some(_) => {
                        if maximum {
                            v > best
                        } else {
                            v < best
                        }
                    }
                };
                if better {
                    best = v;
                    best_idx = Some(m);
                }
            }
            if let Some(m) = best_idx {
                times[y] = month_offsets[m];
            }
        }
        result[d] = nanmean(times.view());
    }
    Ok(result)
}

/// For each whole decade, the mean fractional-year time at which the annual
/// maximum occurs.
pub fn decadal_max_time(t: ArrayView1<f64>, var: ArrayView1<f64>) -> BenchResult<Array1<f64>> {
    decadal_extremum_time(t, var, true)
}

/// For each whole decade, the mean fractional-year time at which the annual
/// minimum occurs.
pub fn decadal_min_time(t: ArrayView1<f64>, var: ArrayView1<f64>) -> BenchResult<Array1<f64>> {
    decadal_extremum_time(t, var, false)
}

/// For each sample, the slope of the least-squares line through all samples
/// within a `window`-day window centered on it.
///
/// The window is clamped at the series boundaries by sliding inward so it
/// never extends past the data but keeps its full width. The returned slope
/// is in var-units per year. Samples whose window holds fewer than two
/// valid points get `NaN`.
pub fn windowed_trend(
    t: ArrayView1<f64>,
    var: ArrayView1<f64>,
    window: f64,
) -> BenchResult<Array1<f64>> {
    check_lengths("windowed_trend", t.len(), var.len())?;
    let n = t.len();
    if n == 0 {
        return Err(BenchError::Analysis(
            "windowed_trend: empty input".to_string(),
        ));
    }
    let mut trend = Array1::from_elem(n, f64::NAN);
    for i in 0..n {
        let mut tleft = t[i] - 0.5 * window;
        let mut tright = t[i] + 0.5 * window;
        let dl = (t[0] - tleft).max(0.0);
        tleft += dl;
        tright += dl;
        let dr = (tright - t[n - 1]).max(0.0);
        tleft -= dr;
        tright -= dr;

        // least-squares slope of var against time in years
        let mut sx = 0.0;
        let mut sy = 0.0;
        let mut m = 0usize;
        for j in 0..n {
            if t[j] >= tleft && t[j] <= tright && !var[j].is_nan() {
                sx += t[j] / DAYS_PER_YEAR;
                sy += var[j];
                m += 1;
            }
        }
        if m < 2 {
            continue;
        }
        let xbar = sx / m as f64;
        let ybar = sy / m as f64;
        let mut sxy = 0.0;
        let mut sxx = 0.0;
        for j in 0..n {
            if t[j] >= tleft && t[j] <= tright && !var[j].is_nan() {
                let dx = t[j] / DAYS_PER_YEAR - xbar;
                sxy += dx * (var[j] - ybar);
                sxx += dx * dx;
            }
        }
        if sxx > 0.0 {
            trend[i] = sxy / sxx;
        }
    }
    Ok(trend)
}

/// Maps each time stamp to its canonical calendar-month day-count weight,
/// normalized to sum to 1 across the series.
pub fn monthly_weights(t: ArrayView1<f64>) -> BenchResult<Array1<f64>> {
    if t.is_empty() {
        return Err(BenchError::Analysis(
            "monthly_weights: empty input".to_string(),
        ));
    }
    let mut w = Array1::zeros(t.len());
    for (i, &ti) in t.iter().enumerate() {
        let month = ((ti.rem_euclid(DAYS_PER_YEAR)) / DAYS_PER_YEAR * 12.0) as usize;
        w[i] = DAYS_PER_MONTH[month.min(11)];
    }
    let total = w.sum();
    Ok(w / total)
}
