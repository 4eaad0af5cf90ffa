//! Error types.

use crate::pillar::Pillar;

#[derive(thiserror::Error, Debug)]
pub enum CompassError {
    #[error("File '{file}' is missing required column '{column}'")]
    SchemaMismatch { file: String, column: String },
    #[error("Unknown pillar: {0}")]
    UnknownPillar(String),
    #[error("Invalid range metadata for {pillar} / {sub_pillar} / {indicator}: {detail}")]
    InvalidRangeMetadata {
        pillar: Pillar,
        sub_pillar: String,
        indicator: String,
        detail: String,
    },
    #[error("No weight for {pillar} / {sub_pillar} / {indicator}")]
    MissingWeight {
        pillar: Pillar,
        sub_pillar: String,
        indicator: String,
    },
    #[error("Total weight is zero for group: {0}")]
    ZeroWeight(String),
    #[error("Country name could not be resolved: {0}")]
    UnresolvedCountryName(String),
    #[error("Group has no members: {0}")]
    EmptyGroup(String),
    #[error("Invalid value '{value}' in column '{column}'")]
    InvalidValue { column: String, value: String },
    #[error("No weights could be resolved for any group in this run")]
    NoResolvableWeights,
    #[error("No observations to score")]
    NoObservations,
    #[error("Wrapped polars error: {0}")]
    PolarsError(#[from] polars::error::PolarsError),
    #[error("Wrapped IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Wrapped serde JSON error: {0}")]
    SerdeJSONError(#[from] serde_json::Error),
    #[error("Invalid TOML configuration: {0}")]
    TomlError(#[from] toml::de::Error),
}

pub type CompassResult<T> = Result<T, CompassError>;
