use compass::error::CompassError;
use polars::error::PolarsError;

#[derive(thiserror::Error, Debug)]
pub enum CompassCliError {
    #[error("{0:#}")]
    Anyhow(#[from] anyhow::Error),
    #[error("serde JSON error: {0}")]
    SerdeJSONError(#[from] serde_json::Error),
    #[error("polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("compass error: {0}")]
    CompassError(#[from] CompassError),
    #[error("std IO error: {0}")]
    IOError(#[from] std::io::Error),
}

pub type CompassCliResult<T> = Result<T, CompassCliError>;
