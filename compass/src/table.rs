//! Loading and writing tables. Every input table is read as CSV with all columns typed as strings
//! and parsed into typed rows by the caller, so a malformed cell is reported against its column
//! instead of failing schema inference for the whole file.

use std::{fs::File, path::Path};

use log::debug;
use polars::prelude::*;

use crate::{
    error::{CompassError, CompassResult},
    observation::{IndicatorObservation, Membership},
    pillar::Pillar,
    COL,
};

/// Load a CSV file with a header row, keeping every column as a string.
pub fn read_csv<P: AsRef<Path>>(path: P) -> CompassResult<DataFrame> {
    let path = path.as_ref();
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    debug!("Read '{}' with shape: {:?}", path.display(), df.shape());
    Ok(df)
}

/// Write a data frame to a CSV file, header included.
pub fn write_csv<P: AsRef<Path>>(path: P, df: &mut DataFrame) -> CompassResult<()> {
    let path = path.as_ref();
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).finish(df)?;
    debug!("Wrote '{}' with shape: {:?}", path.display(), df.shape());
    Ok(())
}

/// Check that every column in `columns` is present, naming the first one missing.
pub fn require_columns<S: AsRef<str>>(
    df: &DataFrame,
    columns: &[S],
    file: &str,
) -> CompassResult<()> {
    for column in columns {
        if df.column(column.as_ref()).is_err() {
            return Err(CompassError::SchemaMismatch {
                file: file.to_owned(),
                column: column.as_ref().to_owned(),
            });
        }
    }
    Ok(())
}

/// Cells of a column as trimmed strings, with blanks and nulls mapped to `None`.
pub fn string_column(df: &DataFrame, name: &str) -> CompassResult<Vec<Option<String>>> {
    let series = df.column(name)?.cast(&DataType::String)?;
    Ok(series
        .str()?
        .into_iter()
        .map(|cell| {
            cell.map(str::trim)
                .filter(|cell| !cell.is_empty())
                .map(str::to_owned)
        })
        .collect())
}

/// Like `string_column`, but an absent column yields all `None`.
pub fn optional_string_column(df: &DataFrame, name: &str) -> CompassResult<Vec<Option<String>>> {
    if df.column(name).is_ok() {
        string_column(df, name)
    } else {
        Ok(vec![None; df.height()])
    }
}

pub fn parse_f64(column: &str, value: &str) -> CompassResult<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| invalid(column, value))
}

/// Years are written either as integers or as floats with a zero fraction (`2021.0`).
pub fn parse_year(column: &str, value: &str) -> CompassResult<i32> {
    let value = value.trim();
    if let Ok(year) = value.parse::<i32>() {
        return Ok(year);
    }
    match value.parse::<f64>() {
        Ok(year) if year.fract() == 0.0 && year.abs() < i32::MAX as f64 => Ok(year as i32),
        _ => Err(invalid(column, value)),
    }
}

pub fn parse_bool(column: &str, value: &str) -> CompassResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "1" | "1.0" => Ok(true),
        "false" | "f" | "no" | "0" | "0.0" => Ok(false),
        _ => Err(invalid(column, value)),
    }
}

fn invalid(column: &str, value: &str) -> CompassError {
    CompassError::InvalidValue {
        column: column.to_owned(),
        value: value.to_owned(),
    }
}

fn required<'a>(column: &str, cell: &'a Option<String>) -> CompassResult<&'a str> {
    cell.as_deref().ok_or_else(|| invalid(column, ""))
}

/// Serialise observations to the aggregated table layout: the source headers plus the
/// membership flag.
pub fn observations_to_frame(observations: &[IndicatorObservation]) -> CompassResult<DataFrame> {
    let df = DataFrame::new(vec![
        Series::new(
            COL::COUNTRY_NAME,
            observations.iter().map(|o| o.country.as_str()).collect::<Vec<_>>(),
        ),
        Series::new(
            COL::YEAR,
            observations.iter().map(|o| o.year).collect::<Vec<_>>(),
        ),
        Series::new(
            COL::INDICATOR,
            observations.iter().map(|o| o.indicator.as_str()).collect::<Vec<_>>(),
        ),
        Series::new(
            COL::DATA_COL,
            observations.iter().map(|o| o.raw_value).collect::<Vec<_>>(),
        ),
        Series::new(
            COL::HIGHER_IS_BETTER,
            observations.iter().map(|o| o.higher_is_better).collect::<Vec<_>>(),
        ),
        Series::new(
            COL::PILLAR,
            observations.iter().map(|o| o.pillar.to_string()).collect::<Vec<_>>(),
        ),
        Series::new(
            COL::SUB_PILLAR,
            observations.iter().map(|o| o.sub_pillar.as_str()).collect::<Vec<_>>(),
        ),
        Series::new(
            COL::UN_MEMBER_STATES,
            observations.iter().map(|o| o.membership.flag()).collect::<Vec<_>>(),
        ),
    ])?;
    Ok(df)
}

/// Parse the aggregated table back into observations. Every cell must be valid here since the
/// table was produced by ingestion.
pub fn observations_from_frame(df: &DataFrame) -> CompassResult<Vec<IndicatorObservation>> {
    require_columns(
        df,
        &[
            COL::COUNTRY_NAME,
            COL::YEAR,
            COL::INDICATOR,
            COL::DATA_COL,
            COL::HIGHER_IS_BETTER,
            COL::PILLAR,
            COL::SUB_PILLAR,
            COL::UN_MEMBER_STATES,
        ],
        "aggregated observations",
    )?;
    let countries = string_column(df, COL::COUNTRY_NAME)?;
    let years = string_column(df, COL::YEAR)?;
    let indicators = string_column(df, COL::INDICATOR)?;
    let values = string_column(df, COL::DATA_COL)?;
    let directions = string_column(df, COL::HIGHER_IS_BETTER)?;
    let pillars = string_column(df, COL::PILLAR)?;
    let sub_pillars = string_column(df, COL::SUB_PILLAR)?;
    let members = string_column(df, COL::UN_MEMBER_STATES)?;

    (0..df.height())
        .map(|i| {
            let pillar_name = required(COL::PILLAR, &pillars[i])?;
            let pillar = Pillar::parse(pillar_name)
                .ok_or_else(|| CompassError::UnknownPillar(pillar_name.to_owned()))?;
            let flag = members[i].as_deref().unwrap_or_default();
            let membership = Membership::from_flag(flag)
                .ok_or_else(|| invalid(COL::UN_MEMBER_STATES, flag))?;
            Ok(IndicatorObservation {
                country: required(COL::COUNTRY_NAME, &countries[i])?.to_owned(),
                year: parse_year(COL::YEAR, required(COL::YEAR, &years[i])?)?,
                pillar,
                sub_pillar: required(COL::SUB_PILLAR, &sub_pillars[i])?.to_owned(),
                indicator: required(COL::INDICATOR, &indicators[i])?.to_owned(),
                raw_value: parse_f64(COL::DATA_COL, required(COL::DATA_COL, &values[i])?)?,
                higher_is_better: parse_bool(
                    COL::HIGHER_IS_BETTER,
                    required(COL::HIGHER_IS_BETTER, &directions[i])?,
                )?,
                membership,
            })
        })
        .collect()
}
