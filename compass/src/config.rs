use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::column_names as COL;
use crate::error::CompassResult;

/// Which weights the rollup engine applies.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum WeightingPolicy {
    /// Weights from the weights table; a missing entry fails the group.
    #[default]
    Table,
    /// Every member weighs 1, i.e. plain arithmetic means.
    Uniform,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Lower end of the indicator score scale.
    pub score_min: f64,
    /// Upper end of the indicator score scale.
    pub score_max: f64,
    /// Width of each percentile bucket's sub-range, bucket `i` maps onto `[i, i + width]`.
    pub bucket_width: f64,
    /// Reflection constant for indicators where lower raw values are better.
    pub inversion_constant: f64,
    pub weighting: WeightingPolicy,
    /// Columns every indicator source file must provide once the pillar is tagged.
    pub source_headers: Vec<String>,
    /// Source files excluded from aggregation.
    pub skip_files: Vec<String>,
    /// Names allow-listed as observers on top of the reference country list.
    pub extra_observers: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            score_min: 1.0,
            score_max: 5.99,
            bucket_width: 0.99,
            inversion_constant: 6.99,
            weighting: WeightingPolicy::Table,
            source_headers: [
                COL::COUNTRY_NAME,
                COL::YEAR,
                COL::INDICATOR,
                COL::DATA_COL,
                COL::HIGHER_IS_BETTER,
                COL::PILLAR,
                COL::SUB_PILLAR,
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            skip_files: vec![
                "people_Cyberbullying_scores.csv".into(),
                "business_Doing Business Index_scores.csv".into(),
                "infrastructure_Mobile Coverage Maps_scores.csv".into(),
                "infrastructure_Internet Exchange Points (IXPs) map_scores.csv".into(),
                "infrastructure_Software Developer Ecosystem size_scores.csv".into(),
            ],
            extra_observers: vec!["Kosovo (UNSCR 1244)".into()],
        }
    }
}

impl Config {
    /// Read a TOML config file, falling back to defaults for absent keys.
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> CompassResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_should_keep_defaults() {
        let config: Config = toml::from_str(
            r#"
            weighting = "uniform"
            skip_files = []
            "#,
        )
        .unwrap();
        assert_eq!(config.weighting, WeightingPolicy::Uniform);
        assert!(config.skip_files.is_empty());
        assert_eq!(config.score_max, 5.99);
        assert_eq!(config.source_headers.len(), 7);
    }

    #[test]
    fn default_inversion_matches_scale() {
        let config = Config::default();
        assert!((config.score_min + config.score_max - config.inversion_constant).abs() < 1e-12);
    }
}
