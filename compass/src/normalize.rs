//! Indicator scoring: every raw value is mapped onto the common score scale, per indicator,
//! across all countries and years.

use itertools::Itertools;
use log::{debug, info, warn};

use crate::{
    config::Config,
    metadata::MetadataStore,
    observation::{IndicatorObservation, ScoredObservation},
    scorecard::RangeFallback,
};

/// Linear map from the fitted `[min, max]` of some samples onto a target range. A zero data
/// range is replaced by 1 so constant input lands on the lower end of the target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinMaxScaler {
    data_min: f64,
    data_range: f64,
    target: (f64, f64),
}

impl MinMaxScaler {
    /// `None` for an empty sample.
    pub fn fit(samples: &[f64], target: (f64, f64)) -> Option<Self> {
        let (min, max) = samples.iter().copied().minmax().into_option()?;
        let range = max - min;
        Some(Self {
            data_min: min,
            data_range: if range == 0.0 { 1.0 } else { range },
            target,
        })
    }

    pub fn transform(&self, value: f64) -> f64 {
        let (lo, hi) = self.target;
        lo + (value - self.data_min) / self.data_range * (hi - lo)
    }
}

/// The `q`th percentile (`0..=100`) of ascending `sorted`, interpolating linearly between the
/// neighbouring order statistics.
pub fn percentile(sorted: &[f64], q: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let rank = q.clamp(0.0, 100.0) / 100.0 * last as f64;
    let (below, above) = (rank.floor() as usize, rank.ceil() as usize);
    let fraction = rank - below as f64;
    Some(sorted[below] + (sorted[above] - sorted[below]) * fraction)
}

/// 1-based quintile bucket of `value` given the 20/40/60/80th percentile cutoffs.
fn bucket_of(value: f64, cutoffs: &[f64; 4]) -> usize {
    cutoffs.iter().take_while(|cutoff| value >= **cutoff).count() + 1
}

/// Scores for an indicator without usable bounds: values are split into quintile buckets and
/// bucket `i` is rescaled onto `[i, i + bucket_width]` on its own.
pub fn percentile_scores(values: &[f64], config: &Config) -> Vec<f64> {
    let sorted = values
        .iter()
        .copied()
        .sorted_by(|a, b| a.total_cmp(b))
        .collect_vec();
    let mut cutoffs = [0.0; 4];
    for (cutoff, q) in cutoffs.iter_mut().zip([20.0, 40.0, 60.0, 80.0]) {
        match percentile(&sorted, q) {
            Some(p) => *cutoff = p,
            None => return vec![],
        }
    }

    let buckets = values.iter().map(|v| bucket_of(*v, &cutoffs)).collect_vec();
    let scalers = (1..=5)
        .map(|bucket| {
            let members = bucket_members(values, &buckets, bucket);
            let anchor = bucket as f64;
            MinMaxScaler::fit(&members, (anchor, anchor + config.bucket_width))
        })
        .collect_vec();

    values
        .iter()
        .zip(&buckets)
        .map(|(value, bucket)| match &scalers[bucket - 1] {
            Some(scaler) => scaler.transform(*value),
            // Every bucket with a member has a scaler.
            None => *bucket as f64,
        })
        .collect()
}

fn bucket_members(values: &[f64], buckets: &[usize], bucket: usize) -> Vec<f64> {
    values
        .iter()
        .zip(buckets)
        .filter(|(_, b)| **b == bucket)
        .map(|(v, _)| *v)
        .collect()
}

/// Scores for an index indicator: the scaler is fitted on the declared bounds alone, so the
/// bounds always map onto the ends of the score scale and out-of-range values land outside it.
pub fn index_scores(values: &[f64], bounds: (f64, f64), config: &Config) -> Vec<f64> {
    match MinMaxScaler::fit(&[bounds.0, bounds.1], (config.score_min, config.score_max)) {
        Some(scaler) => values.iter().map(|v| scaler.transform(*v)).collect(),
        None => vec![],
    }
}

/// Reflect a score about the middle of the scale, for indicators where lower is better.
pub fn reflect(score: f64, inversion_constant: f64) -> f64 {
    inversion_constant - score
}

/// Result of indicator scoring: one scored row per input observation, in input order.
#[derive(Debug)]
pub struct IndicatorScores {
    pub scored: Vec<ScoredObservation>,
    pub range_fallbacks: Vec<RangeFallback>,
}

/// Score every observation within its (pillar, sub-pillar, indicator) group.
pub fn score_indicators(
    observations: Vec<IndicatorObservation>,
    metadata: &MetadataStore,
    config: &Config,
) -> IndicatorScores {
    let groups = observations
        .iter()
        .enumerate()
        .into_group_map_by(|(_, o)| o.indicator_key());

    let mut scores = vec![0.0; observations.len()];
    let mut range_fallbacks = vec![];
    let mut index_groups = 0;
    for (key, members) in groups.into_iter().sorted_by(|a, b| a.0.cmp(&b.0)) {
        let values = members.iter().map(|(_, o)| o.raw_value).collect_vec();
        let bounds = match metadata.lookup(key.pillar, &key.sub_pillar, &key.indicator) {
            Some(meta) => meta.index_bounds(&key).unwrap_or_else(|err| {
                warn!("{err}; using percentile buckets instead");
                range_fallbacks.push(RangeFallback {
                    indicator: key.clone(),
                    detail: err.to_string(),
                });
                None
            }),
            None => {
                debug!("No metadata for {key}; using percentile buckets");
                None
            }
        };
        let group_scores = match bounds {
            Some(bounds) => {
                index_groups += 1;
                index_scores(&values, bounds, config)
            }
            None => percentile_scores(&values, config),
        };
        for ((i, _), score) in members.iter().zip(group_scores) {
            scores[*i] = score;
        }
    }
    info!(
        "Scored {} observations ({} index indicators, {} range fallbacks)",
        observations.len(),
        index_groups,
        range_fallbacks.len()
    );

    let scored = observations
        .into_iter()
        .zip(scores)
        .map(|(observation, score)| ScoredObservation::new(observation, score))
        .collect();
    IndicatorScores {
        scored,
        range_fallbacks,
    }
}

/// Reflect the indicator score of every lower-is-better row. Must run exactly once, before rollup.
pub fn apply_directionality(scored: &mut [ScoredObservation], inversion_constant: f64) {
    let mut reflected = 0;
    for row in scored.iter_mut().filter(|r| !r.observation.higher_is_better) {
        row.indicator_score = reflect(row.indicator_score, inversion_constant);
        reflected += 1;
    }
    debug!("Reflected {reflected} lower-is-better scores");
}
