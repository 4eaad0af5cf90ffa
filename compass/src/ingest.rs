//! Aggregation of the per-source indicator files into one observation table.

use std::{
    collections::{BTreeSet, HashMap},
    path::Path,
};

use itertools::{izip, Itertools};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    config::Config,
    country::{CountryList, CountryNameNormalizer},
    error::{CompassError, CompassResult},
    observation::{IndicatorObservation, ObservationKey},
    pillar::Pillar,
    table::{parse_bool, parse_f64, parse_year, read_csv, require_columns, string_column},
    COL,
};

/// A source file that was not aggregated, and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub file: String,
    pub reason: String,
}

/// Audit trail of one aggregation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    pub files_read: Vec<String>,
    pub files_skipped: Vec<SkippedFile>,
    pub rows_read: usize,
    /// Rows dropped for a blank or placeholder country, or a missing/unparseable cell.
    pub incomplete_rows_dropped: usize,
    /// Rows whose canonical country name is not a UN member or observer.
    pub unresolved_rows_dropped: usize,
    pub unresolved_names: BTreeSet<String>,
    /// Keys seen more than once. These rows are kept, not deduplicated.
    pub duplicate_keys: Vec<ObservationKey>,
    pub rows_kept: usize,
}

impl IngestReport {
    fn skip(&mut self, file: &str, reason: impl ToString) {
        warn!("Skipping '{file}': {}", reason.to_string());
        self.files_skipped.push(SkippedFile {
            file: file.to_owned(),
            reason: reason.to_string(),
        });
    }
}

/// Observations from every usable source file, plus the audit report.
#[derive(Debug)]
pub struct Aggregation {
    pub observations: Vec<IndicatorObservation>,
    pub report: IngestReport,
}

/// Reads every `.csv` in `sources_dir` whose name starts with a pillar, canonicalises country
/// names and keeps only rows for UN members and allow-listed observers.
pub fn aggregate_files<P: AsRef<Path>>(
    sources_dir: P,
    config: &Config,
    normalizer: &CountryNameNormalizer,
    countries: &CountryList,
) -> CompassResult<Aggregation> {
    let mut report = IngestReport::default();
    let mut observations = vec![];

    let file_names = std::fs::read_dir(sources_dir.as_ref())?
        .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .filter(|name| name.ends_with(".csv"))
        .sorted()
        .collect_vec();
    debug!("Candidate source files: {file_names:?}");

    for file_name in file_names {
        let Some(pillar) = Pillar::from_file_name(&file_name) else {
            report.skip(&file_name, CompassError::UnknownPillar(file_name.clone()));
            continue;
        };
        if config.skip_files.iter().any(|skip| skip == file_name.trim()) {
            report.skip(&file_name, "listed in skip_files");
            continue;
        }
        match read_source_file(
            &sources_dir.as_ref().join(&file_name),
            &file_name,
            pillar,
            config,
            normalizer,
            countries,
            &mut report,
        ) {
            Ok(rows) => {
                debug!("Read {} observations from '{file_name}'", rows.len());
                report.files_read.push(file_name);
                observations.extend(rows);
            }
            Err(err) => report.skip(&file_name, err),
        }
    }

    report.duplicate_keys = find_duplicates(&observations);
    if !report.duplicate_keys.is_empty() {
        warn!(
            "{} observation keys occur more than once, e.g. {:?}",
            report.duplicate_keys.len(),
            report.duplicate_keys.first()
        );
    }
    report.rows_kept = observations.len();
    info!(
        "Aggregated {} rows from {} files ({} skipped); dropped {} incomplete and {} non-member rows",
        report.rows_kept,
        report.files_read.len(),
        report.files_skipped.len(),
        report.incomplete_rows_dropped,
        report.unresolved_rows_dropped
    );
    info!(
        "Countries in aggregated output: {}",
        observations.iter().map(|o| &o.country).unique().count()
    );
    Ok(Aggregation {
        observations,
        report,
    })
}

fn read_source_file(
    path: &Path,
    file_name: &str,
    pillar: Pillar,
    config: &Config,
    normalizer: &CountryNameNormalizer,
    countries: &CountryList,
    report: &mut IngestReport,
) -> CompassResult<Vec<IndicatorObservation>> {
    let df = read_csv(path)?;
    // The pillar column is tagged from the file name, so sources need not carry it
    let required = config
        .source_headers
        .iter()
        .filter(|header| header.as_str() != COL::PILLAR)
        .collect_vec();
    require_columns(&df, &required, file_name)?;
    report.rows_read += df.height();

    let mut rows = vec![];
    for (country, year, indicator, value, direction, sub_pillar) in izip!(
        string_column(&df, COL::COUNTRY_NAME)?,
        string_column(&df, COL::YEAR)?,
        string_column(&df, COL::INDICATOR)?,
        string_column(&df, COL::DATA_COL)?,
        string_column(&df, COL::HIGHER_IS_BETTER)?,
        string_column(&df, COL::SUB_PILLAR)?,
    ) {
        let parsed = (|| -> Option<_> {
            let country = normalizer.normalize(&country?)?;
            Some((
                country,
                parse_year(COL::YEAR, &year?).ok()?,
                indicator?,
                parse_f64(COL::DATA_COL, &value?).ok()?,
                parse_bool(COL::HIGHER_IS_BETTER, &direction?).ok()?,
                sub_pillar?,
            ))
        })();
        let Some((country, year, indicator, raw_value, higher_is_better, sub_pillar)) = parsed
        else {
            report.incomplete_rows_dropped += 1;
            continue;
        };
        let Some(membership) = countries.membership(&country) else {
            debug!("{file_name}: {}", CompassError::UnresolvedCountryName(country.clone()));
            report.unresolved_rows_dropped += 1;
            report.unresolved_names.insert(country);
            continue;
        };
        rows.push(IndicatorObservation {
            country,
            year,
            pillar,
            sub_pillar,
            indicator,
            raw_value,
            higher_is_better,
            membership,
        });
    }
    Ok(rows)
}

fn find_duplicates(observations: &[IndicatorObservation]) -> Vec<ObservationKey> {
    let mut counts: HashMap<ObservationKey, usize> = HashMap::new();
    for observation in observations {
        *counts.entry(observation.key()).or_default() += 1;
    }
    counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(key, _)| key)
        .sorted()
        .collect()
}
