//! Projection of sub-pillar scores onto Sustainable Development Goal targets.

use std::collections::BTreeMap;

use itertools::Itertools;
use log::{debug, info, warn};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    country::CountryList,
    error::CompassResult,
    table::{parse_f64, require_columns, string_column},
    COL,
};

/// A sub-pillar contributing to an SDG target with some weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SdgMapping {
    pub sdg: String,
    pub target: String,
    pub sub_pillar: String,
    pub weight: f64,
}

/// A computed target value, or the goal roll-up when `target` is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SdgScore {
    pub country: String,
    pub sdg: String,
    pub target: Option<String>,
    pub value: f64,
    pub weighted_value: f64,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Spreadsheet exports sometimes carry padded headers such as `"Weight "`.
fn trim_column_names(df: &mut DataFrame) -> PolarsResult<()> {
    let names = df
        .get_column_names()
        .iter()
        .map(|name| name.trim().to_owned())
        .collect_vec();
    df.set_column_names(names.as_slice())
}

/// Parse the mapping table, skipping rows with a blank key or an unusable weight.
pub fn mappings_from_frame(mut df: DataFrame) -> CompassResult<Vec<SdgMapping>> {
    trim_column_names(&mut df)?;
    require_columns(
        &df,
        &[COL::SDG_NUMBER, COL::SDG_TARGET, COL::SUB_PILLAR, COL::WEIGHT],
        "SDG mapping",
    )?;
    let mappings = itertools::izip!(
        string_column(&df, COL::SDG_NUMBER)?,
        string_column(&df, COL::SDG_TARGET)?,
        string_column(&df, COL::SUB_PILLAR)?,
        string_column(&df, COL::WEIGHT)?,
    )
    .filter_map(|(sdg, target, sub_pillar, weight)| {
        let weight = match parse_f64(COL::WEIGHT, weight.as_deref().unwrap_or_default()) {
            Ok(weight) => weight,
            Err(err) => {
                warn!("SDG mapping: skipping row for {target:?}: {err}");
                return None;
            }
        };
        Some(SdgMapping {
            sdg: sdg?,
            target: target?,
            sub_pillar: sub_pillar?,
            weight,
        })
    })
    .collect_vec();
    debug!("Loaded {} SDG mapping rows", mappings.len());
    Ok(mappings)
}

/// Sub-pillar scores per country from a rolling output table: the rows with a sub-pillar and no
/// indicator.
pub fn sub_pillar_scores_from_rolling(
    df: &DataFrame,
) -> CompassResult<BTreeMap<String, Vec<(String, f64)>>> {
    require_columns(
        df,
        &[COL::COUNTRY_NAME, COL::SUB_PILLAR, COL::INDICATOR, COL::NEW_RANK_SCORE],
        "rolling output",
    )?;
    let mut scores: BTreeMap<String, Vec<(String, f64)>> = BTreeMap::new();
    for (country, sub_pillar, indicator, score) in itertools::izip!(
        string_column(df, COL::COUNTRY_NAME)?,
        string_column(df, COL::SUB_PILLAR)?,
        string_column(df, COL::INDICATOR)?,
        string_column(df, COL::NEW_RANK_SCORE)?,
    ) {
        let (Some(country), Some(sub_pillar), None, Some(score)) =
            (country, sub_pillar, indicator, score)
        else {
            continue;
        };
        scores
            .entry(country)
            .or_default()
            .push((sub_pillar, parse_f64(COL::NEW_RANK_SCORE, &score)?));
    }
    Ok(scores)
}

/// Target and goal values for every full member country with mapped sub-pillar scores.
pub fn compute_sdg_scores(
    sub_pillar_scores: &BTreeMap<String, Vec<(String, f64)>>,
    mappings: &[SdgMapping],
    countries: &CountryList,
) -> Vec<SdgScore> {
    let targets = mappings
        .iter()
        .into_group_map_by(|m| (m.sdg.clone(), m.target.clone()))
        .into_iter()
        .sorted_by(|a, b| a.0.cmp(&b.0))
        .collect_vec();

    let mut results = vec![];
    for country in countries.full_members() {
        let Some(scores) = sub_pillar_scores.get(country) else {
            continue;
        };
        let mut target_rows: Vec<SdgScore> = vec![];
        for ((sdg, target), target_mappings) in &targets {
            let pairs = target_mappings
                .iter()
                .flat_map(|m| {
                    scores
                        .iter()
                        .filter(move |(sub_pillar, _)| *sub_pillar == m.sub_pillar)
                        .map(move |(_, score)| (*score, m.weight))
                })
                .collect_vec();
            if pairs.is_empty() {
                continue;
            }
            let total_weight: f64 = pairs.iter().map(|(_, w)| w).sum();
            if total_weight == 0.0 {
                debug!("{country}: zero total weight for SDG target {target}");
                continue;
            }
            let value = pairs.iter().map(|(s, _)| s).sum::<f64>() / pairs.len() as f64;
            let weighted_value = pairs.iter().map(|(s, w)| s * w).sum::<f64>() / total_weight;
            target_rows.push(SdgScore {
                country: country.to_owned(),
                sdg: sdg.clone(),
                target: Some(target.clone()),
                value,
                weighted_value,
            });
        }

        let goal_rows = target_rows
            .iter()
            .into_group_map_by(|row| row.sdg.clone())
            .into_iter()
            .sorted_by(|a, b| a.0.cmp(&b.0))
            .map(|(sdg, rows)| {
                let n = rows.len() as f64;
                SdgScore {
                    country: country.to_owned(),
                    sdg,
                    target: None,
                    value: rows.iter().map(|r| r.value).sum::<f64>() / n,
                    weighted_value: rows.iter().map(|r| r.weighted_value).sum::<f64>() / n,
                }
            })
            .collect_vec();
        // Goals average the unrounded target values
        results.extend(target_rows.into_iter().chain(goal_rows).map(|row| SdgScore {
            value: round2(row.value),
            weighted_value: round2(row.weighted_value),
            ..row
        }));
    }
    info!("Computed {} SDG rows", results.len());
    results
}

pub fn sdg_frame(scores: &[SdgScore]) -> CompassResult<DataFrame> {
    Ok(DataFrame::new(vec![
        Series::new(
            COL::SDG_COUNTRY_NAME,
            scores.iter().map(|s| s.country.as_str()).collect_vec(),
        ),
        Series::new(COL::SDG_NUMBER, scores.iter().map(|s| s.sdg.as_str()).collect_vec()),
        Series::new(
            COL::SDG_TARGET_OUT,
            scores
                .iter()
                .map(|s| s.target.as_deref().unwrap_or_default())
                .collect_vec(),
        ),
        Series::new(COL::SDG_VALUE, scores.iter().map(|s| s.value).collect_vec()),
        Series::new(
            COL::SDG_WEIGHTED_VALUE,
            scores.iter().map(|s| s.weighted_value).collect_vec(),
        ),
    ])?)
}

#[cfg(test)]
mod tests {
    use polars::df;

    use super::*;
    use crate::observation::Membership;

    fn mapping() -> DataFrame {
        df!(
            "SDG #" => &["SDG 4", "SDG 4", "SDG 4", "SDG 9"],
            "SDG Target" => &["4.4", "4.4", "4.a", "9.c"],
            "Sub-Pillar" => &["Skills", "Access", "Skills", "Connectivity"],
            "Weight " => &["3", "1", "1", "0"]
        )
        .unwrap()
    }

    fn rolling() -> DataFrame {
        df!(
            COL::COUNTRY_NAME => &["Chile", "Chile", "Chile", "Chile", "Kosovo (UNSCR 1244)"],
            COL::SUB_PILLAR => &[None, Some("Skills"), Some("Access"), Some("Connectivity"), Some("Skills")],
            COL::INDICATOR => &[None, None, None, None, None::<&str>],
            COL::NEW_RANK_SCORE => &["9.9", "4", "2", "5", "3"]
        )
        .unwrap()
    }

    #[test]
    fn padded_weight_header_is_accepted() {
        let mappings = mappings_from_frame(mapping()).unwrap();
        assert_eq!(mappings.len(), 4);
        assert_eq!(mappings[0].weight, 3.0);
    }

    #[test]
    fn targets_and_goals_are_computed_for_full_members() {
        let countries = CountryList::from_entries([
            ("Chile", Membership::Full),
            ("Kosovo (UNSCR 1244)", Membership::Observer),
        ]);
        let scores = sub_pillar_scores_from_rolling(&rolling()).unwrap();
        assert_eq!(scores["Chile"].len(), 3);

        let mappings = mappings_from_frame(mapping()).unwrap();
        let rows = compute_sdg_scores(&scores, &mappings, &countries);
        assert!(rows.iter().all(|r| r.country == "Chile"));

        let target_44 = rows
            .iter()
            .find(|r| r.target.as_deref() == Some("4.4"))
            .unwrap();
        assert_eq!(target_44.value, 3.0);
        assert_eq!(target_44.weighted_value, 3.5);

        // 9.c has zero total weight and is skipped.
        assert!(rows.iter().all(|r| r.sdg != "SDG 9"));

        let goal = rows.iter().find(|r| r.target.is_none()).unwrap();
        assert_eq!(goal.sdg, "SDG 4");
        assert_eq!(goal.value, 3.5);
        assert_eq!(goal.weighted_value, 3.75);

        let df = sdg_frame(&rows).unwrap();
        assert_eq!(
            df.get_column_names(),
            vec!["Country_Name", "SDG #", "SDG_Target", "Value", "Weighted_Value"]
        );
        assert_eq!(df.height(), 3);
    }

    #[test]
    fn goals_average_unrounded_targets() {
        let countries = CountryList::from_entries([("Chile", Membership::Full)]);
        let scores = BTreeMap::from([(
            "Chile".to_owned(),
            vec![
                ("Skills".to_owned(), 1.004),
                ("Access".to_owned(), 1.004),
                ("Connectivity".to_owned(), 1.014),
            ],
        )]);
        let mappings = [("1.1", "Skills"), ("1.2", "Access"), ("1.3", "Connectivity")]
            .into_iter()
            .map(|(target, sub_pillar)| SdgMapping {
                sdg: "SDG 1".into(),
                target: target.into(),
                sub_pillar: sub_pillar.into(),
                weight: 1.0,
            })
            .collect_vec();
        let rows = compute_sdg_scores(&scores, &mappings, &countries);
        let targets = rows
            .iter()
            .filter(|r| r.target.is_some())
            .map(|r| r.value)
            .collect_vec();
        assert_eq!(targets, vec![1.0, 1.0, 1.01]);

        let goal = rows.iter().find(|r| r.target.is_none()).unwrap();
        assert_eq!(goal.value, 1.01);
        assert_eq!(goal.weighted_value, 1.01);
    }

    #[test]
    fn values_are_rounded() {
        assert_eq!(round2(3.14159), 3.14);
        assert_eq!(round2(2.005 + 1e-9), 2.01);
    }
}
