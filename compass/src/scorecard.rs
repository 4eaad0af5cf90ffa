//! The result of a scoring run and its non-fatal diagnostics.

use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::{
    observation::{IndicatorKey, ScoredObservation},
    rollup::{CountryScore, PillarScore, SubPillarScore},
};

/// An index indicator whose declared bounds were unusable and which was scored with
/// percentile buckets instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeFallback {
    pub indicator: IndicatorKey,
    pub detail: String,
}

/// Level at which a group failed. A country score is the plain mean of its pillar scores, so only
/// the weighted levels can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum RollupLevel {
    #[strum(serialize = "sub-pillar")]
    SubPillar,
    #[strum(serialize = "pillar")]
    Pillar,
}

/// A rollup group that could not be scored. Its rows carry no score at that level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollupGap {
    pub level: RollupLevel,
    pub country: String,
    pub group: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub observations_scored: usize,
    pub range_fallbacks: Vec<RangeFallback>,
    pub rollup_gaps: Vec<RollupGap>,
    pub countries_ranked: usize,
    /// Observers get sub-pillar and pillar ranks but no country rank.
    pub countries_unranked: usize,
}

/// Everything one run produces, before output assembly.
#[derive(Debug, Clone)]
pub struct Scorecard {
    pub observations: Vec<ScoredObservation>,
    pub sub_pillars: Vec<SubPillarScore>,
    pub pillars: Vec<PillarScore>,
    pub countries: Vec<CountryScore>,
    pub report: RunReport,
}

impl Scorecard {
    /// Countries with a country rank, best first.
    pub fn ranking(&self) -> Vec<&CountryScore> {
        let mut ranked = self
            .countries
            .iter()
            .filter(|c| c.rank.is_some())
            .collect::<Vec<_>>();
        ranked.sort_by(|a, b| a.rank.cmp(&b.rank).then_with(|| a.country.cmp(&b.country)));
        ranked
    }
}
