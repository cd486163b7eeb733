//! Metric kinds, score weights, and overall-score aggregation.
//!
//! Result entries are named `<kind>_over_<region>` where the kind's first
//! two underscore-separated tokens identify it (`bias_score`,
//! `rmse_score`, ...). The set of kinds is closed: weight tables are
//! validated against [`MetricKind`] when a confrontation is configured, so
//! a misspelled weight key fails at load time rather than silently at
//! aggregation time.

use crate::errors::{BenchError, BenchResult};
use crate::results::ResultSet;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Guard against division by zero in weight normalization.
const WEIGHT_EPS: f64 = 1e-12;

/// The closed set of metric kinds known to the scoring layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricKind {
    Bias,
    BiasScore,
    Rmse,
    RmseScore,
    OverallScore,
}

impl MetricKind {
    /// The kind's spelling as used in result-entry names.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Bias => "bias",
            MetricKind::BiasScore => "bias_score",
            MetricKind::Rmse => "rmse",
            MetricKind::RmseScore => "rmse_score",
            MetricKind::OverallScore => "overall_score",
        }
    }

    /// Parse a kind from its result-entry spelling.
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "bias" => Some(MetricKind::Bias),
            "bias_score" => Some(MetricKind::BiasScore),
            "rmse" => Some(MetricKind::Rmse),
            "rmse_score" => Some(MetricKind::RmseScore),
            "overall_score" => Some(MetricKind::OverallScore),
            _ => None,
        }
    }

    /// Whether this kind is a normalized skill score in [0, 1].
    pub fn is_score(&self) -> bool {
        matches!(
            self,
            MetricKind::BiasScore | MetricKind::RmseScore | MetricKind::OverallScore
        )
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Weight map from metric kind to scalar weight.
///
/// Weights need not sum to 1; the sum of the weights actually contributing
/// is the normalizer. Kinds absent from the map are excluded from both the
/// weighted sum and the normalizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    weights: HashMap<MetricKind, f64>,
}

impl ScoreWeights {
    /// Equal unit weights for the bias and RMSE scores.
    pub fn default_scores() -> Self {
        let mut weights = HashMap::new();
        weights.insert(MetricKind::BiasScore, 1.0);
        weights.insert(MetricKind::RmseScore, 1.0);
        Self { weights }
    }

    pub fn from_pairs(pairs: &[(MetricKind, f64)]) -> Self {
        Self {
            weights: pairs.iter().copied().collect(),
        }
    }

    /// Build from a string-keyed map, rejecting unknown kinds. This is the
    /// configuration-load-time validation point.
    pub fn try_from_map(map: &HashMap<String, f64>) -> BenchResult<Self> {
        let mut weights = HashMap::new();
        for (key, &value) in map {
            let kind = MetricKind::parse(key).ok_or_else(|| {
                BenchError::Analysis(format!("'{key}' is not a known metric kind"))
            })?;
            weights.insert(kind, value);
        }
        Ok(Self { weights })
    }

    pub fn get(&self, kind: MetricKind) -> Option<f64> {
        self.weights.get(&kind).copied()
    }
}

/// The two-token kind prefix and region of a result-entry name, when the
/// name follows the `<kind>_over_<region>` convention.
fn parse_entry_name(name: &str) -> Option<(&str, &str)> {
    let (kind_part, region) = name.split_once("_over_")?;
    let mut tokens = kind_part.split('_');
    let first = tokens.next()?;
    let prefix_len = match tokens.next() {
        Some(second) => first.len() + 1 + second.len(),
        None => first.len(),
    };
    Some((&kind_part[..prefix_len.min(kind_part.len())], region))
}

/// Aggregate all recorded `*_score` metrics into one overall score per
/// region and store it as `overall_score_over_<region>`, overwriting any
/// previous aggregation.
///
/// For each region the overall score is
/// `sum(weight[kind] * value) / max(sum(weight[kind]), 1e-12)` over the
/// score metrics recorded for that region whose kind the weight map knows.
/// A region with no contributing metrics scores 0.
pub fn compute_overall_score(results: &mut ResultSet, weights: &ScoreWeights, regions: &[String]) {
    let mut sums: HashMap<String, (f64, f64)> = HashMap::new();
    for (name, value) in results.scalars() {
        let Some((prefix, region)) = parse_entry_name(name) else {
            continue;
        };
        let Some(kind) = MetricKind::parse(prefix) else {
            continue;
        };
        if !kind.is_score() || kind == MetricKind::OverallScore {
            continue;
        }
        let Some(weight) = weights.get(kind) else {
            continue;
        };
        let slot = sums.entry(region.to_string()).or_insert((0.0, 0.0));
        slot.0 += weight * value;
        slot.1 += weight;
    }
    for region in regions {
        let (num, den) = sums.get(region.as_str()).copied().unwrap_or((0.0, 0.0));
        let score = num / den.max(WEIGHT_EPS);
        results.insert_scalar(&format!("overall_score_over_{region}"), score, "1");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use is_close::is_close;

    fn regions(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn kind_spelling_round_trips() {
        for kind in [
            MetricKind::Bias,
            MetricKind::BiasScore,
            MetricKind::Rmse,
            MetricKind::RmseScore,
            MetricKind::OverallScore,
        ] {
            assert_eq!(MetricKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(MetricKind::parse("phase_score"), None);
    }

    #[test]
    fn weight_map_rejects_unknown_kinds_at_load_time() {
        let mut map = HashMap::new();
        map.insert("bias_score".to_string(), 1.0);
        map.insert("vibes_score".to_string(), 3.0);
        assert!(ScoreWeights::try_from_map(&map).is_err());
    }

    #[test]
    fn overall_score_is_a_weighted_mean_of_scores() {
        let mut set = ResultSet::new("m", "#000000");
        set.insert_scalar("bias_score_over_global", 0.8, "1");
        set.insert_scalar("rmse_score_over_global", 0.4, "1");
        // raw metrics never contribute
        set.insert_scalar("bias_over_global", 123.0, "g m-2 d-1");

        let weights =
            ScoreWeights::from_pairs(&[(MetricKind::BiasScore, 1.0), (MetricKind::RmseScore, 3.0)]);
        compute_overall_score(&mut set, &weights, &regions(&["global"]));

        let overall = set.get_scalar("overall_score_over_global").unwrap();
        assert!(is_close!(overall, (0.8 + 3.0 * 0.4) / 4.0));
    }

    #[test]
    fn unknown_and_unweighted_kinds_are_excluded_from_both_sums() {
        let mut set = ResultSet::new("m", "#000000");
        set.insert_scalar("bias_score_over_global", 0.5, "1");
        // rmse_score recorded but carries no weight: excluded entirely
        set.insert_scalar("rmse_score_over_global", 0.1, "1");

        let weights = ScoreWeights::from_pairs(&[(MetricKind::BiasScore, 2.0)]);
        compute_overall_score(&mut set, &weights, &regions(&["global"]));
        assert!(is_close!(
            set.get_scalar("overall_score_over_global").unwrap(),
            0.5
        ));
    }

    #[test]
    fn region_without_scores_gets_zero_not_nan() {
        let mut set = ResultSet::new("m", "#000000");
        let weights = ScoreWeights::default_scores();
        compute_overall_score(&mut set, &weights, &regions(&["global"]));
        let overall = set.get_scalar("overall_score_over_global").unwrap();
        assert_eq!(overall, 0.0);
    }

    #[test]
    fn recomputation_overwrites_the_previous_aggregate() {
        let mut set = ResultSet::new("m", "#000000");
        set.insert_scalar("bias_score_over_global", 0.2, "1");
        let weights = ScoreWeights::default_scores();
        compute_overall_score(&mut set, &weights, &regions(&["global"]));
        set.insert_scalar("bias_score_over_global", 0.9, "1");
        compute_overall_score(&mut set, &weights, &regions(&["global"]));
        assert!(is_close!(
            set.get_scalar("overall_score_over_global").unwrap(),
            0.9
        ));
    }

    #[test]
    fn regions_are_aggregated_independently() {
        let mut set = ResultSet::new("m", "#000000");
        set.insert_scalar("bias_score_over_global", 1.0, "1");
        set.insert_scalar("bias_score_over_amazon", 0.5, "1");
        let weights = ScoreWeights::default_scores();
        compute_overall_score(&mut set, &weights, &regions(&["global", "amazon"]));
        assert!(is_close!(
            set.get_scalar("overall_score_over_global").unwrap(),
            1.0
        ));
        assert!(is_close!(
            set.get_scalar("overall_score_over_amazon").unwrap(),
            0.5
        ));
    }
}
