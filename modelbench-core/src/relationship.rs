//! Joint-distribution analysis between two variables.
//!
//! Given a dependent variable pair (independent axis, dependent axis) this
//! module bins the joint occurrence into a 2-D histogram and computes the
//! conditional mean/std of each axis per independent bin. Bin edges are
//! either derived from the data (benchmark side) or supplied
//! ([`RelationshipAxes`]), so the model and benchmark curves stay
//! comparable on the same fixed axes.

use crate::errors::{BenchError, BenchResult};
use crate::results::{ResultData, ResultEntry, ResultSet};
use crate::variable::Variable;
use ndarray::{Array1, Array2};

/// Fixed bin edges shared between benchmark and model analyses.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipAxes {
    pub ind_bnd: Array1<f64>,
    pub dep_bnd: Array1<f64>,
}

/// The binned joint distribution of two variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    /// Independent-axis bin centers.
    pub ind: Array1<f64>,
    /// Dependent-axis bin centers.
    pub dep: Array1<f64>,
    /// Independent-axis bin edges (len = bins + 1).
    pub ind_bnd: Array1<f64>,
    /// Dependent-axis bin edges (len = bins + 1).
    pub dep_bnd: Array1<f64>,
    /// Joint histogram, fraction of total valid samples, ind x dep.
    pub histogram: Array2<f64>,
    /// Mean of the independent values falling in each independent bin.
    pub ind_mean: Array1<f64>,
    /// Std of the independent values falling in each independent bin.
    pub ind_std: Array1<f64>,
    /// Conditional mean of the dependent values per independent bin.
    pub dep_mean: Array1<f64>,
    /// Conditional std of the dependent values per independent bin.
    pub dep_std: Array1<f64>,
    ind_unit: String,
    dep_unit: String,
}

impl Relationship {
    /// The axes of this analysis, for reuse on the other side of the
    /// comparison.
    pub fn axes(&self) -> RelationshipAxes {
        RelationshipAxes {
            ind_bnd: self.ind_bnd.clone(),
            dep_bnd: self.dep_bnd.clone(),
        }
    }

    /// Write the analysis into a named group of a result set, using the
    /// conventional entry names consumed by the report layer.
    pub fn record(&self, set: &mut ResultSet, group: &str) {
        let series = [
            ("ind", &self.ind, self.ind_unit.as_str()),
            ("dep", &self.dep, self.dep_unit.as_str()),
            ("ind_bnd", &self.ind_bnd, self.ind_unit.as_str()),
            ("dep_bnd", &self.dep_bnd, self.dep_unit.as_str()),
            ("ind_mean", &self.ind_mean, self.ind_unit.as_str()),
            ("ind_std", &self.ind_std, self.ind_unit.as_str()),
            ("dep_mean", &self.dep_mean, self.dep_unit.as_str()),
            ("dep_std", &self.dep_std, self.dep_unit.as_str()),
        ];
        for (name, data, unit) in series {
            set.insert_in_group(
                group,
                ResultEntry::new(name, ResultData::Series(data.clone()), unit),
            );
        }
        set.insert_in_group(
            group,
            ResultEntry::new("histogram", ResultData::Map(self.histogram.clone()), "1"),
        );
    }
}

fn edges_from_data(values: &[f64], bins: usize) -> Array1<f64> {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for &v in values {
        lo = lo.min(v);
        hi = hi.max(v);
    }
    if lo == hi {
        lo -= 0.5;
        hi += 0.5;
    }
    Array1::linspace(lo, hi, bins + 1)
}

fn bin_index(edges: &Array1<f64>, value: f64) -> Option<usize> {
    let bins = edges.len() - 1;
    let lo = edges[0];
    let hi = edges[bins];
    if value < lo || value > hi {
        return None;
    }
    let i = ((value - lo) / (hi - lo) * bins as f64) as usize;
    Some(i.min(bins - 1))
}

/// Compute the binned joint distribution of two equally-sampled variables.
///
/// Both variables must hold the same number of samples (they are staged
/// against the same window and support before analysis); pairs with a
/// masked member are dropped. When `axes` is supplied, samples falling
/// outside the fixed edges are dropped as well.
pub fn relate(
    independent: &Variable,
    dependent: &Variable,
    bins: usize,
    axes: Option<&RelationshipAxes>,
) -> BenchResult<Relationship> {
    if independent.data().len() != dependent.data().len() {
        return Err(BenchError::Analysis(format!(
            "relationship inputs differ in length ({} vs {})",
            independent.data().len(),
            dependent.data().len()
        )));
    }
    let pairs: Vec<(f64, f64)> = independent
        .data()
        .iter()
        .zip(dependent.data().iter())
        .filter(|(a, b)| !a.is_nan() && !b.is_nan())
        .map(|(&a, &b)| (a, b))
        .collect();
    if pairs.is_empty() {
        return Err(BenchError::Analysis(format!(
            "no overlapping valid samples between '{}' and '{}'",
            independent.name(),
            dependent.name()
        )));
    }

    let (ind_bnd, dep_bnd) = match axes {
        Some(axes) => (axes.ind_bnd.clone(), axes.dep_bnd.clone()),
        None => {
            let ind_values: Vec<f64> = pairs.iter().map(|p| p.0).collect();
            let dep_values: Vec<f64> = pairs.iter().map(|p| p.1).collect();
            (
                edges_from_data(&ind_values, bins),
                edges_from_data(&dep_values, bins),
            )
        }
    };
    let nbi = ind_bnd.len() - 1;
    let nbd = dep_bnd.len() - 1;

    let mut counts = Array2::<f64>::zeros((nbi, nbd));
    let mut ind_sums = vec![Vec::new(); nbi];
    let mut dep_sums = vec![Vec::new(); nbi];
    let mut total = 0.0;
    for &(iv, dv) in &pairs {
        let (Some(i), Some(j)) = (bin_index(&ind_bnd, iv), bin_index(&dep_bnd, dv)) else {
            continue;
        };
        counts[[i, j]] += 1.0;
        ind_sums[i].push(iv);
        dep_sums[i].push(dv);
        total += 1.0;
    }
    if total > 0.0 {
        counts /= total;
    }

    let centers = |edges: &Array1<f64>| -> Array1<f64> {
        Array1::from_iter(
            edges
                .windows(2)
                .into_iter()
                .map(|w| 0.5 * (w[0] + w[1])),
        )
    };
    let stats = |groups: &[Vec<f64>]| -> (Array1<f64>, Array1<f64>) {
        let mut mean = Array1::from_elem(groups.len(), f64::NAN);
        let mut std = Array1::from_elem(groups.len(), f64::NAN);
        for (i, g) in groups.iter().enumerate() {
            if g.is_empty() {
                continue;
            }
            let m = g.iter().sum::<f64>() / g.len() as f64;
            let var = g.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / g.len() as f64;
            mean[i] = m;
            std[i] = var.sqrt();
        }
        (mean, std)
    };

    let (ind_mean, ind_std) = stats(&ind_sums);
    let (dep_mean, dep_std) = stats(&dep_sums);

    Ok(Relationship {
        ind: centers(&ind_bnd),
        dep: centers(&dep_bnd),
        ind_bnd,
        dep_bnd,
        histogram: counts,
        ind_mean,
        ind_std,
        dep_mean,
        dep_std,
        ind_unit: independent.unit().to_string(),
        dep_unit: dependent.unit().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use is_close::is_close;
    use ndarray::Array1;

    fn series(name: &str, values: Vec<f64>) -> Variable {
        let n = values.len();
        let time = Array1::from_iter((0..n).map(|i| i as f64 * 30.0));
        Variable::series(name, "1", Array1::from(values), time).unwrap()
    }

    #[test]
    fn histogram_sums_to_one() {
        let ind = series("pr", vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        let dep = series("gpp", vec![0.0, 2.0, 4.0, 6.0, 8.0, 10.0]);
        let rel = relate(&ind, &dep, 4, None).unwrap();
        assert!(is_close!(rel.histogram.sum(), 1.0));
        assert_eq!(rel.ind.len(), 4);
        assert_eq!(rel.ind_bnd.len(), 5);
    }

    #[test]
    fn conditional_mean_tracks_a_linear_relation() {
        // dep = 2 * ind, so each occupied bin's conditional mean is twice
        // its ind mean
        let values: Vec<f64> = (0..100).map(|i| i as f64 / 10.0).collect();
        let doubled: Vec<f64> = values.iter().map(|v| 2.0 * v).collect();
        let ind = series("pr", values);
        let dep = series("gpp", doubled);
        let rel = relate(&ind, &dep, 10, None).unwrap();
        for i in 0..10 {
            if !rel.dep_mean[i].is_nan() {
                assert!(is_close!(rel.dep_mean[i], 2.0 * rel.ind_mean[i], rel_tol = 1e-9));
            }
        }
    }

    #[test]
    fn masked_pairs_are_dropped() {
        let ind = series("pr", vec![0.0, f64::NAN, 2.0, 3.0]);
        let dep = series("gpp", vec![1.0, 1.0, f64::NAN, 4.0]);
        let rel = relate(&ind, &dep, 2, None).unwrap();
        assert!(is_close!(rel.histogram.sum(), 1.0));
    }

    #[test]
    fn fixed_axes_are_reused_verbatim() {
        let ind = series("pr", vec![0.0, 1.0, 2.0, 3.0]);
        let dep = series("gpp", vec![0.0, 1.0, 2.0, 3.0]);
        let benchmark = relate(&ind, &dep, 4, None).unwrap();

        let ind2 = series("pr", vec![0.5, 1.5, 9.0]);
        let dep2 = series("gpp", vec![0.5, 1.5, 9.0]);
        let model = relate(&ind2, &dep2, 4, Some(&benchmark.axes())).unwrap();

        assert_eq!(model.ind_bnd, benchmark.ind_bnd);
        // the out-of-range sample is dropped, the rest renormalize
        assert!(is_close!(model.histogram.sum(), 1.0));
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let ind = series("pr", vec![0.0, 1.0]);
        let dep = series("gpp", vec![0.0, 1.0, 2.0]);
        assert!(relate(&ind, &dep, 2, None).is_err());
    }

    #[test]
    fn record_writes_the_conventional_group_entries() {
        let ind = series("pr", vec![0.0, 1.0, 2.0, 3.0]);
        let dep = series("gpp", vec![0.0, 1.0, 2.0, 3.0]);
        let rel = relate(&ind, &dep, 2, None).unwrap();
        let mut set = ResultSet::new("m", "#000000");
        rel.record(&mut set, "relationship_pr_over_global");
        for name in [
            "ind", "dep", "ind_bnd", "dep_bnd", "histogram", "ind_mean", "dep_mean", "ind_std",
            "dep_std",
        ] {
            assert!(
                set.get_in_group("relationship_pr_over_global", name).is_some(),
                "missing entry {name}"
            );
        }
    }
}
