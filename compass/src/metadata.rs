use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use log::{debug, info, warn};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

use crate::{
    error::{CompassError, CompassResult},
    observation::{IndicatorKey, IndicatorObservation},
    pillar::Pillar,
    table::{optional_string_column, read_csv, require_columns, string_column},
    COL,
};

/// This module contains the default names of the files the pipeline reads and writes.
pub mod paths {
    pub const SOURCES: &str = "Sources.csv";
    pub const WEIGHTS: &str = "Weights.csv";
    pub const COUNTRIES: &str = "Countries.csv";
    pub const AGGREGATED: &str = "output.csv";
    // Output stems, the extension follows the output format
    pub const FULL_DATA: &str = "full_data";
    pub const FULL_OUTPUT_ROLLING: &str = "full_output_rolling";
    pub const SDG_MAPPING: &str = "SDG_Mapping.csv";
    pub const SDG_OUTPUT: &str = "SDG_Mapping_Calculation.csv";
}

/// Whether an indicator is an absolute quantity or a bounded composite index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScaleType {
    Raw,
    Index,
    Unknown,
}

impl ScaleType {
    fn from_cell(cell: Option<&str>) -> Self {
        match cell.map(|c| c.trim().to_ascii_lowercase()).as_deref() {
            Some("raw") => ScaleType::Raw,
            Some("index") => ScaleType::Index,
            _ => ScaleType::Unknown,
        }
    }
}

/// Reference data for one indicator, taken from the Sources table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorMetadata {
    pub scale_type: ScaleType,
    /// Declared bounds as written in the table; only meaningful for `ScaleType::Index`.
    pub range_min: Option<String>,
    pub range_max: Option<String>,
    pub data_source: Option<String>,
    pub data_link: Option<String>,
}

impl IndicatorMetadata {
    /// Declared bounds of an index-typed indicator, `None` for every other scale type.
    ///
    /// Fails with `InvalidRangeMetadata` when an index declares bounds that are missing, not
    /// integers, or not increasing.
    pub fn index_bounds(&self, key: &IndicatorKey) -> CompassResult<Option<(f64, f64)>> {
        if self.scale_type != ScaleType::Index {
            return Ok(None);
        }
        let invalid = |detail: String| CompassError::InvalidRangeMetadata {
            pillar: key.pillar,
            sub_pillar: key.sub_pillar.clone(),
            indicator: key.indicator.clone(),
            detail,
        };
        let parse = |cell: &Option<String>, name: &str| {
            let cell = cell
                .as_deref()
                .ok_or_else(|| invalid(format!("missing {name} bound")))?;
            cell.trim()
                .parse::<i64>()
                .map_err(|_| invalid(format!("{name} bound '{cell}' is not an integer")))
        };
        let min = parse(&self.range_min, "min")?;
        let max = parse(&self.range_max, "max")?;
        if min >= max {
            return Err(invalid(format!("bounds {min}..{max} are not increasing")));
        }
        Ok(Some((min as f64, max as f64)))
    }
}

/// Distinct indicators, sub-pillars and pillars present in a dataset. These are the denominators
/// of the data availability percentages.
#[derive(Debug, Clone, Default)]
pub struct Coverage {
    indicators: HashMap<(Pillar, String), BTreeSet<String>>,
    sub_pillars: HashMap<Pillar, BTreeSet<String>>,
    pillars: BTreeSet<Pillar>,
}

impl Coverage {
    pub fn from_observations(observations: &[IndicatorObservation]) -> Self {
        let mut coverage = Self::default();
        for o in observations {
            coverage
                .indicators
                .entry((o.pillar, o.sub_pillar.clone()))
                .or_default()
                .insert(o.indicator.clone());
            coverage
                .sub_pillars
                .entry(o.pillar)
                .or_default()
                .insert(o.sub_pillar.clone());
            coverage.pillars.insert(o.pillar);
        }
        coverage
    }
}

/// Read-only lookups over the Sources and Weights tables, built once per run.
#[derive(Debug, Clone, Default)]
pub struct MetadataStore {
    entries: HashMap<IndicatorKey, IndicatorMetadata>,
    weights: HashMap<IndicatorKey, f64>,
    coverage: Coverage,
}

impl MetadataStore {
    pub fn new(
        entries: HashMap<IndicatorKey, IndicatorMetadata>,
        weights: HashMap<IndicatorKey, f64>,
    ) -> Self {
        Self {
            entries,
            weights,
            coverage: Coverage::default(),
        }
    }

    /// Load the Sources and Weights tables from CSV files.
    pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(sources: P, weights: Q) -> CompassResult<Self> {
        info!("Loading metadata from '{}'", sources.as_ref().display());
        let entries = entries_from_frame(&read_csv(sources)?)?;
        info!("Loading weights from '{}'", weights.as_ref().display());
        let weights = weights_from_frame(&read_csv(weights)?)?;
        info!(
            "Loaded metadata for {} indicators and {} weights",
            entries.len(),
            weights.len()
        );
        Ok(Self::new(entries, weights))
    }

    /// Attach the availability denominators of the dataset about to be scored.
    pub fn with_coverage(mut self, observations: &[IndicatorObservation]) -> Self {
        self.coverage = Coverage::from_observations(observations);
        debug!(
            "Coverage: {} pillars, {} sub-pillars",
            self.coverage.pillars.len(),
            self.coverage.indicators.len()
        );
        self
    }

    pub fn lookup(&self, pillar: Pillar, sub_pillar: &str, indicator: &str) -> Option<&IndicatorMetadata> {
        self.entries
            .get(&IndicatorKey::new(pillar, sub_pillar, indicator))
    }

    /// Rollup weight of an indicator, or of a sub-pillar when `indicator` is the `"nan"` key.
    pub fn weight(&self, pillar: Pillar, sub_pillar: &str, indicator: &str) -> CompassResult<f64> {
        self.weights
            .get(&IndicatorKey::new(pillar, sub_pillar, indicator))
            .copied()
            .ok_or_else(|| CompassError::MissingWeight {
                pillar,
                sub_pillar: sub_pillar.to_owned(),
                indicator: indicator.to_owned(),
            })
    }

    pub fn has_weights(&self) -> bool {
        !self.weights.is_empty()
    }

    /// Data source and link attribution of an indicator.
    pub fn source(&self, pillar: Pillar, sub_pillar: &str, indicator: &str) -> (Option<String>, Option<String>) {
        self.lookup(pillar, sub_pillar, indicator)
            .map(|m| (m.data_source.clone(), m.data_link.clone()))
            .unwrap_or_default()
    }

    /// Distinct indicators of a sub-pillar across the whole dataset.
    pub fn indicator_count(&self, pillar: Pillar, sub_pillar: &str) -> usize {
        self.coverage
            .indicators
            .get(&(pillar, sub_pillar.to_owned()))
            .map_or(0, BTreeSet::len)
    }

    /// Distinct sub-pillars of a pillar across the whole dataset.
    pub fn sub_pillar_count(&self, pillar: Pillar) -> usize {
        self.coverage.sub_pillars.get(&pillar).map_or(0, BTreeSet::len)
    }

    /// Distinct pillars present in the dataset.
    pub fn pillar_count(&self) -> usize {
        self.coverage.pillars.len()
    }
}

/// Key columns of a metadata row, or `None` (with a warning) when unusable.
fn row_key(
    pillar: Option<&str>,
    sub_pillar: Option<&str>,
    indicator: Option<&str>,
    table: &str,
) -> Option<IndicatorKey> {
    let (pillar_name, sub_pillar) = (pillar?, sub_pillar?);
    let Some(pillar) = Pillar::parse(pillar_name) else {
        warn!("{table}: skipping row with unknown pillar '{pillar_name}'");
        return None;
    };
    Some(IndicatorKey::new(pillar, sub_pillar, indicator?))
}

pub fn entries_from_frame(df: &DataFrame) -> CompassResult<HashMap<IndicatorKey, IndicatorMetadata>> {
    require_columns(df, &[COL::PILLAR, COL::SUB_PILLAR, COL::INDICATOR], "Sources")?;
    let pillars = string_column(df, COL::PILLAR)?;
    let sub_pillars = string_column(df, COL::SUB_PILLAR)?;
    let indicators = string_column(df, COL::INDICATOR)?;
    let scale_types = optional_string_column(df, COL::RAW_OR_INDEX)?;
    let mins = optional_string_column(df, COL::RANGE_MIN)?;
    let maxs = optional_string_column(df, COL::RANGE_MAX)?;
    let data_sources = optional_string_column(df, COL::DATA_SOURCE)?;
    let data_links = optional_string_column(df, COL::DATA_LINK)?;

    let mut entries = HashMap::new();
    for i in 0..df.height() {
        let Some(key) = row_key(
            pillars[i].as_deref(),
            sub_pillars[i].as_deref(),
            indicators[i].as_deref(),
            "Sources",
        ) else {
            continue;
        };
        if entries.contains_key(&key) {
            debug!("Sources: keeping first row for {key}");
            continue;
        }
        entries.insert(
            key,
            IndicatorMetadata {
                scale_type: ScaleType::from_cell(scale_types[i].as_deref()),
                range_min: mins[i].clone(),
                range_max: maxs[i].clone(),
                data_source: data_sources[i].clone(),
                data_link: data_links[i].clone(),
            },
        );
    }
    Ok(entries)
}

/// Rows with a blank indicator are sub-pillar weights and are keyed by `"nan"`.
pub fn weights_from_frame(df: &DataFrame) -> CompassResult<HashMap<IndicatorKey, f64>> {
    require_columns(df, &[COL::PILLAR, COL::SUB_PILLAR, COL::INDICATOR, COL::WEIGHT], "Weights")?;
    let pillars = string_column(df, COL::PILLAR)?;
    let sub_pillars = string_column(df, COL::SUB_PILLAR)?;
    let indicators = string_column(df, COL::INDICATOR)?;
    let weights = string_column(df, COL::WEIGHT)?;

    let mut table = HashMap::new();
    for i in 0..df.height() {
        let indicator = indicators[i]
            .as_deref()
            .unwrap_or(COL::SUB_PILLAR_WEIGHT_KEY);
        let Some(key) = row_key(
            pillars[i].as_deref(),
            sub_pillars[i].as_deref(),
            Some(indicator),
            "Weights",
        ) else {
            continue;
        };
        match weights[i].as_deref().map(|w| w.trim().parse::<f64>()) {
            Some(Ok(weight)) if weight.is_finite() && weight >= 0.0 => {
                table.insert(key, weight);
            }
            other => warn!("Weights: skipping {key} with unusable weight {other:?}"),
        }
    }
    Ok(table)
}
