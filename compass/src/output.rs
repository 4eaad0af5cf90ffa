use std::fs::File;
use std::io::{Cursor, Write};
use std::path::Path;

use anyhow::Result;
use enum_dispatch::enum_dispatch;
use log::{debug, info};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::{
    error::CompassResult,
    metadata::MetadataStore,
    observation::ScoredObservation,
    scorecard::Scorecard,
    COL,
};

/// Trait to define different output generators. Defines two
/// functions, format which generates a serialized string of the
/// `DataFrame` and save which writes it to a writer
#[enum_dispatch]
pub trait OutputGenerator {
    fn save(&self, writer: &mut impl Write, df: &mut DataFrame) -> Result<()>;
    fn format(&self, df: &mut DataFrame) -> Result<String> {
        let mut data: Vec<u8> = vec![];
        let mut buff = Cursor::new(&mut data);
        self.save(&mut buff, df)?;

        Ok(String::from_utf8(data)?)
    }
    /// File extension for tables written by this generator.
    fn extension(&self) -> &'static str;
}

/// Enum of OutputFormatters one for each potential
/// output type
#[enum_dispatch(OutputGenerator)]
#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub enum OutputFormatter {
    Csv(CsvFormatter),
    Json(JsonFormatter),
    NdJson(NdJsonFormatter),
}

impl Default for OutputFormatter {
    fn default() -> Self {
        OutputFormatter::Csv(CsvFormatter)
    }
}

/// Output formats selectable from the command line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(ascii_case_insensitive, serialize_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
    NdJson,
}

impl From<OutputFormat> for OutputFormatter {
    fn from(value: OutputFormat) -> Self {
        match value {
            OutputFormat::Csv => OutputFormatter::Csv(CsvFormatter),
            OutputFormat::Json => OutputFormatter::Json(JsonFormatter),
            OutputFormat::NdJson => OutputFormatter::NdJson(NdJsonFormatter),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy)]
pub struct CsvFormatter;

impl OutputGenerator for CsvFormatter {
    fn save(&self, writer: &mut impl Write, df: &mut DataFrame) -> Result<()> {
        CsvWriter::new(writer).finish(df)?;
        Ok(())
    }
    fn extension(&self) -> &'static str {
        "csv"
    }
}

/// A single JSON array with one object per row
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy)]
pub struct JsonFormatter;

impl OutputGenerator for JsonFormatter {
    fn save(&self, writer: &mut impl Write, df: &mut DataFrame) -> Result<()> {
        JsonWriter::new(writer)
            .with_json_format(JsonFormat::Json)
            .finish(df)?;
        Ok(())
    }
    fn extension(&self) -> &'static str {
        "json"
    }
}

/// One JSON object per line
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy)]
pub struct NdJsonFormatter;

impl OutputGenerator for NdJsonFormatter {
    fn save(&self, writer: &mut impl Write, df: &mut DataFrame) -> Result<()> {
        JsonWriter::new(writer)
            .with_json_format(JsonFormat::JsonLines)
            .finish(df)?;
        Ok(())
    }
    fn extension(&self) -> &'static str {
        "ndjson"
    }
}

/// Write `df` to `<dir>/<stem>.<ext>` with the given formatter, returning the path written.
pub fn write_table(
    dir: &Path,
    stem: &str,
    formatter: &OutputFormatter,
    df: &mut DataFrame,
) -> Result<std::path::PathBuf> {
    let path = dir.join(format!("{stem}.{}", formatter.extension()));
    let mut file = File::create(&path)?;
    formatter.save(&mut file, df)?;
    info!("Wrote {} rows to '{}'", df.height(), path.display());
    Ok(path)
}

/// Copy the data source and link of each row's indicator onto the row.
pub fn attach_sources(scored: &mut [ScoredObservation], metadata: &MetadataStore) {
    for row in scored.iter_mut() {
        let o = &row.observation;
        let (source, link) = metadata.source(o.pillar, &o.sub_pillar, &o.indicator);
        row.data_source = source;
        row.data_link = link;
    }
}

/// One row per observation with every enrichment column.
pub fn full_data_frame(scored: &[ScoredObservation]) -> CompassResult<DataFrame> {
    let observations = scored.iter().map(|r| &r.observation).collect::<Vec<_>>();
    let df = DataFrame::new(vec![
        Series::new(
            COL::COUNTRY_NAME,
            observations.iter().map(|o| o.country.as_str()).collect::<Vec<_>>(),
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
            COL::INDICATOR_SCORE,
            scored.iter().map(|r| r.indicator_score).collect::<Vec<_>>(),
        ),
        Series::new(
            COL::COUNTRY_SUB_PILLAR_SCORE,
            scored.iter().map(|r| r.country_sub_pillar_score).collect::<Vec<_>>(),
        ),
        Series::new(
            COL::COUNTRY_SUB_PILLAR_RANK,
            scored.iter().map(|r| r.country_sub_pillar_rank).collect::<Vec<_>>(),
        ),
        Series::new(
            COL::COUNTRY_PILLAR_SCORE,
            scored.iter().map(|r| r.country_pillar_score).collect::<Vec<_>>(),
        ),
        Series::new(
            COL::COUNTRY_PILLAR_RANK,
            scored.iter().map(|r| r.country_pillar_rank).collect::<Vec<_>>(),
        ),
        Series::new(
            COL::COUNTRY_RANK,
            scored.iter().map(|r| r.country_rank).collect::<Vec<_>>(),
        ),
        Series::new(
            COL::DATA_AVAILABILITY,
            scored.iter().map(|r| r.data_availability).collect::<Vec<_>>(),
        ),
        Series::new(
            COL::DATA_SOURCE,
            scored.iter().map(|r| r.data_source.as_deref()).collect::<Vec<_>>(),
        ),
        Series::new(
            COL::DATA_LINK,
            scored.iter().map(|r| r.data_link.as_deref()).collect::<Vec<_>>(),
        ),
        Series::new(
            COL::YEAR,
            observations.iter().map(|o| o.year).collect::<Vec<_>>(),
        ),
    ])?;
    debug!("full_data shape: {:?}", df.shape());
    Ok(df)
}

/// A row of the long-format rolling output. Cells that do not apply to the row's level stay
/// empty.
#[derive(Debug, Clone, Default, PartialEq)]
struct RollingRow {
    country: String,
    pillar: String,
    sub_pillar: String,
    indicator: String,
    data_col: String,
    higher_is_better: String,
    new_rank_score: String,
    rank: String,
    data_availability: String,
    data_source: String,
    data_link: String,
    year: String,
}

fn cell<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn rolling_frame(rows: Vec<RollingRow>) -> PolarsResult<DataFrame> {
    let mut columns: [Vec<String>; 12] = Default::default();
    for row in rows {
        let cells = [
            row.country,
            row.pillar,
            row.sub_pillar,
            row.indicator,
            row.data_col,
            row.higher_is_better,
            row.new_rank_score,
            row.rank,
            row.data_availability,
            row.data_source,
            row.data_link,
            row.year,
        ];
        for (column, value) in columns.iter_mut().zip(cells) {
            column.push(value);
        }
    }
    DataFrame::new(
        COL::ROLLING_COLUMNS
            .iter()
            .zip(columns)
            .map(|(name, values)| Series::new(name, values))
            .collect(),
    )
}

/// Long-format table stacking country, pillar, sub-pillar and indicator rows, in that order.
/// Every column is a string.
pub fn rolling_output_frame(scorecard: &Scorecard) -> CompassResult<DataFrame> {
    let countries = scorecard
        .countries
        .iter()
        .map(|c| RollingRow {
            country: c.country.clone(),
            new_rank_score: c.score.to_string(),
            rank: cell(c.rank),
            data_availability: c.availability.to_string(),
            year: c.year.to_string(),
            ..Default::default()
        })
        .collect();
    let pillars = scorecard
        .pillars
        .iter()
        .map(|p| RollingRow {
            country: p.country.clone(),
            pillar: p.pillar.to_string(),
            new_rank_score: p.score.to_string(),
            rank: cell(p.rank),
            data_availability: p.availability.to_string(),
            year: p.year.to_string(),
            ..Default::default()
        })
        .collect();
    let sub_pillars = scorecard
        .sub_pillars
        .iter()
        .map(|s| RollingRow {
            country: s.country.clone(),
            pillar: s.pillar.to_string(),
            sub_pillar: s.sub_pillar.clone(),
            new_rank_score: s.score.to_string(),
            rank: cell(s.rank),
            data_availability: s.availability.to_string(),
            year: s.year.to_string(),
            ..Default::default()
        })
        .collect();
    let indicators = scorecard
        .observations
        .iter()
        .map(|r| RollingRow {
            country: r.observation.country.clone(),
            pillar: r.observation.pillar.to_string(),
            sub_pillar: r.observation.sub_pillar.clone(),
            indicator: r.observation.indicator.clone(),
            data_col: r.observation.raw_value.to_string(),
            higher_is_better: r.observation.higher_is_better.to_string(),
            new_rank_score: r.indicator_score.to_string(),
            data_source: r.data_source.clone().unwrap_or_default(),
            data_link: r.data_link.clone().unwrap_or_default(),
            year: r.observation.year.to_string(),
            ..Default::default()
        })
        .collect();

    let frames = [countries, pillars, sub_pillars, indicators]
        .into_iter()
        .map(|rows| rolling_frame(rows).map(IntoLazy::lazy))
        .collect::<PolarsResult<Vec<_>>>()?;
    let df = concat(frames, UnionArgs::default())?.collect()?;
    debug!("full_output_rolling shape: {:?}", df.shape());
    Ok(df)
}

/// Both output tables of a scorecard.
pub struct OutputTables {
    pub full_data: DataFrame,
    pub full_output_rolling: DataFrame,
}

impl OutputTables {
    pub fn assemble(scorecard: &Scorecard) -> CompassResult<Self> {
        Ok(Self {
            full_data: full_data_frame(&scorecard.observations)?,
            full_output_rolling: rolling_output_frame(scorecard)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        observation::{fixtures::observation, Membership},
        pillar::Pillar,
        rollup::{CountryScore, PillarScore, SubPillarScore},
        scorecard::RunReport,
    };

    fn scored() -> Vec<ScoredObservation> {
        let mut row = ScoredObservation::new(
            observation("Chile", Pillar::People, "Skills", "Literacy", 0.5),
            3.0,
        );
        row.country_sub_pillar_score = Some(3.0);
        row.country_sub_pillar_rank = Some(1);
        row.data_availability = Some(100.0);
        row.country_rank = Some(2);
        row.data_source = Some("UNESCO".into());
        vec![row]
    }

    fn scorecard() -> Scorecard {
        Scorecard {
            observations: scored(),
            sub_pillars: vec![SubPillarScore {
                country: "Chile".into(),
                membership: Membership::Full,
                pillar: Pillar::People,
                sub_pillar: "Skills".into(),
                score: 3.0,
                availability: 100.0,
                rank: Some(1),
                year: 2022,
            }],
            pillars: vec![PillarScore {
                country: "Chile".into(),
                membership: Membership::Full,
                pillar: Pillar::People,
                score: 3.0,
                availability: 50.0,
                rank: Some(1),
                year: 2022,
            }],
            countries: vec![CountryScore {
                country: "Chile".into(),
                membership: Membership::Full,
                score: 3.0,
                availability: 100.0,
                rank: None,
                year: 2022,
            }],
            report: RunReport::default(),
        }
    }

    #[test]
    fn full_data_has_expected_columns() {
        let df = full_data_frame(&scored()).unwrap();
        assert_eq!(df.get_column_names(), COL::FULL_DATA_COLUMNS.to_vec());
        assert_eq!(df.height(), 1);
        assert_eq!(df.column(COL::COUNTRY_PILLAR_SCORE).unwrap().null_count(), 1);
        let country_rank = df.column(COL::COUNTRY_RANK).unwrap().u32().unwrap();
        assert_eq!(country_rank.get(0), Some(2));
    }

    #[test]
    fn rolling_output_stacks_levels_in_order() {
        let df = rolling_output_frame(&scorecard()).unwrap();
        assert_eq!(df.get_column_names(), COL::ROLLING_COLUMNS.to_vec());
        assert_eq!(df.height(), 4);

        let pillar = df.column(COL::PILLAR).unwrap().str().unwrap();
        let sub_pillar = df.column(COL::SUB_PILLAR).unwrap().str().unwrap();
        let indicator = df.column(COL::INDICATOR).unwrap().str().unwrap();
        let rank = df.column(COL::RANK).unwrap().str().unwrap();
        assert_eq!(pillar.get(0), Some(""));
        assert_eq!(pillar.get(1), Some("People"));
        assert_eq!(sub_pillar.get(1), Some(""));
        assert_eq!(sub_pillar.get(2), Some("Skills"));
        assert_eq!(indicator.get(2), Some(""));
        assert_eq!(indicator.get(3), Some("Literacy"));
        // Unranked country and indicator rows have blank ranks.
        assert_eq!(rank.get(0), Some(""));
        assert_eq!(rank.get(2), Some("1"));
        assert_eq!(rank.get(3), Some(""));
    }

    #[test]
    fn formatters_write_every_row() {
        let mut df = rolling_output_frame(&scorecard()).unwrap();
        let csv = OutputFormatter::from(OutputFormat::Csv).format(&mut df).unwrap();
        assert_eq!(csv.lines().count(), 5);
        assert!(csv.starts_with("Country Name,Pillar,Sub-Pillar,Indicator"));

        let ndjson = OutputFormatter::from(OutputFormat::NdJson)
            .format(&mut df)
            .unwrap();
        assert_eq!(ndjson.lines().count(), 4);

        let json = OutputFormatter::from(OutputFormat::Json).format(&mut df).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.as_array().map(Vec::len), Some(4));
    }

    #[test]
    fn output_format_parses_case_insensitively() {
        assert_eq!("NDJSON".parse::<OutputFormat>().unwrap(), OutputFormat::NdJson);
        assert_eq!(OutputFormat::Json.to_string(), "json");
    }
}
