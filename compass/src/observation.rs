//! Row types flowing through the scoring pipeline.

use serde::{Deserialize, Serialize};

use crate::pillar::Pillar;

/// UN membership status taken from the reference country list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Membership {
    /// Full member state, flagged `x`.
    Full,
    /// Observer or special case, flagged `y`.
    Observer,
}

impl Membership {
    pub fn from_flag(flag: &str) -> Option<Self> {
        match flag.trim() {
            "x" | "X" => Some(Membership::Full),
            "y" | "Y" => Some(Membership::Observer),
            _ => None,
        }
    }

    pub fn flag(&self) -> &'static str {
        match self {
            Membership::Full => "x",
            Membership::Observer => "y",
        }
    }
}

/// Key identifying an indicator across all countries.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IndicatorKey {
    pub pillar: Pillar,
    pub sub_pillar: String,
    pub indicator: String,
}

impl IndicatorKey {
    pub fn new(pillar: Pillar, sub_pillar: &str, indicator: &str) -> Self {
        Self {
            pillar,
            sub_pillar: sub_pillar.to_owned(),
            indicator: indicator.to_owned(),
        }
    }
}

impl std::fmt::Display for IndicatorKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} / {} / {}", self.pillar, self.sub_pillar, self.indicator)
    }
}

/// Full identity of a raw observation. At most one row per key is expected per ingest run.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObservationKey {
    pub country: String,
    pub year: i32,
    pub indicator: IndicatorKey,
}

/// One measurement of an indicator for a country and year.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndicatorObservation {
    pub country: String,
    pub year: i32,
    pub pillar: Pillar,
    pub sub_pillar: String,
    pub indicator: String,
    pub raw_value: f64,
    pub higher_is_better: bool,
    pub membership: Membership,
}

impl IndicatorObservation {
    pub fn indicator_key(&self) -> IndicatorKey {
        IndicatorKey::new(self.pillar, &self.sub_pillar, &self.indicator)
    }

    pub fn key(&self) -> ObservationKey {
        ObservationKey {
            country: self.country.clone(),
            year: self.year,
            indicator: self.indicator_key(),
        }
    }
}

/// An observation enriched stage by stage. Each `Option` column is filled by the stage that
/// computes it and never rewritten afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoredObservation {
    pub observation: IndicatorObservation,
    pub indicator_score: f64,
    pub country_sub_pillar_score: Option<f64>,
    pub data_availability: Option<f64>,
    pub country_sub_pillar_rank: Option<u32>,
    pub country_pillar_score: Option<f64>,
    pub country_pillar_rank: Option<u32>,
    pub country_rank: Option<u32>,
    pub data_source: Option<String>,
    pub data_link: Option<String>,
}

impl ScoredObservation {
    pub fn new(observation: IndicatorObservation, indicator_score: f64) -> Self {
        Self {
            observation,
            indicator_score,
            country_sub_pillar_score: None,
            data_availability: None,
            country_sub_pillar_rank: None,
            country_pillar_score: None,
            country_pillar_rank: None,
            country_rank: None,
            data_source: None,
            data_link: None,
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn observation(
        country: &str,
        pillar: Pillar,
        sub_pillar: &str,
        indicator: &str,
        raw_value: f64,
    ) -> IndicatorObservation {
        IndicatorObservation {
            country: country.into(),
            year: 2022,
            pillar,
            sub_pillar: sub_pillar.into(),
            indicator: indicator.into(),
            raw_value,
            higher_is_better: true,
            membership: Membership::Full,
        }
    }
}
