//! Weighted aggregation of indicator scores into sub-pillar, pillar and country scores.

use std::collections::{BTreeMap, HashMap};

use itertools::Itertools;
use log::{debug, info, warn};
use nonempty::NonEmpty;
use serde::{Deserialize, Serialize};

use crate::{
    config::WeightingPolicy,
    error::{CompassError, CompassResult},
    metadata::MetadataStore,
    observation::{Membership, ScoredObservation},
    pillar::Pillar,
    scorecard::{RollupGap, RollupLevel},
    COL,
};

/// Source of the weights applied by the rollup. `indicator` is `"nan"` when asking for the
/// weight of a sub-pillar within its pillar.
pub trait Weighting {
    fn weight(&self, pillar: Pillar, sub_pillar: &str, indicator: &str) -> CompassResult<f64>;
}

impl Weighting for MetadataStore {
    fn weight(&self, pillar: Pillar, sub_pillar: &str, indicator: &str) -> CompassResult<f64> {
        MetadataStore::weight(self, pillar, sub_pillar, indicator)
    }
}

/// Every member weighs the same, so each level is a plain mean.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformWeights;

impl Weighting for UniformWeights {
    fn weight(&self, _: Pillar, _: &str, _: &str) -> CompassResult<f64> {
        Ok(1.0)
    }
}

/// The weighting a policy selects. `UniformWeights` is `'static`, so the result borrows only the
/// store.
pub fn weighting_for<'a>(policy: WeightingPolicy, store: &'a MetadataStore) -> &'a dyn Weighting {
    match policy {
        WeightingPolicy::Table => store,
        WeightingPolicy::Uniform => &UniformWeights,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubPillarScore {
    pub country: String,
    pub membership: Membership,
    pub pillar: Pillar,
    pub sub_pillar: String,
    pub score: f64,
    pub availability: f64,
    pub rank: Option<u32>,
    /// Latest year among the contributing observations.
    pub year: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PillarScore {
    pub country: String,
    pub membership: Membership,
    pub pillar: Pillar,
    pub score: f64,
    pub availability: f64,
    pub rank: Option<u32>,
    pub year: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryScore {
    pub country: String,
    pub membership: Membership,
    pub score: f64,
    pub availability: f64,
    pub rank: Option<u32>,
    pub year: i32,
}

#[derive(Debug, Clone, Default)]
pub struct Rollup {
    pub sub_pillars: Vec<SubPillarScore>,
    pub pillars: Vec<PillarScore>,
    pub countries: Vec<CountryScore>,
    pub gaps: Vec<RollupGap>,
}

/// One scored member of a rollup group.
#[derive(Debug, Clone, Copy)]
struct Member {
    score: f64,
    weight: f64,
}

fn weighted_mean(members: &NonEmpty<Member>, group: &str) -> CompassResult<f64> {
    let total_weight: f64 = members.iter().map(|m| m.weight).sum();
    if total_weight == 0.0 {
        return Err(CompassError::ZeroWeight(group.to_owned()));
    }
    Ok(members.iter().map(|m| m.score * m.weight).sum::<f64>() / total_weight)
}

fn percentage(present: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (present as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
}

/// Weights of every member of a group, failing on the first unresolvable one.
fn weigh<T>(
    items: &[T],
    score: impl Fn(&T) -> f64,
    weight: impl Fn(&T) -> CompassResult<f64>,
    group: &str,
) -> CompassResult<NonEmpty<Member>> {
    let members = items
        .iter()
        .map(|item| {
            Ok(Member {
                score: score(item),
                weight: weight(item)?,
            })
        })
        .collect::<CompassResult<Vec<_>>>()?;
    NonEmpty::from_vec(members).ok_or_else(|| CompassError::EmptyGroup(group.to_owned()))
}

/// Compute every level of the rollup over the scored rows.
///
/// Groups whose weights cannot be resolved are recorded as gaps; the run only fails when no
/// sub-pillar group at all could be scored.
pub fn roll_up(
    scored: &[ScoredObservation],
    weighting: &dyn Weighting,
    metadata: &MetadataStore,
) -> CompassResult<Rollup> {
    if scored.is_empty() {
        return Err(CompassError::NoObservations);
    }
    let mut rollup = Rollup::default();

    // Sub-pillars
    let by_sub_pillar: BTreeMap<(&str, Pillar, &str), Vec<&ScoredObservation>> = scored
        .iter()
        .map(|row| {
            let o = &row.observation;
            ((o.country.as_str(), o.pillar, o.sub_pillar.as_str()), row)
        })
        .into_group_map()
        .into_iter()
        .collect();
    let group_count = by_sub_pillar.len();
    for ((country, pillar, sub_pillar), rows) in by_sub_pillar {
        let group = format!("{country} / {pillar} / {sub_pillar}");
        let members = weigh(
            &rows,
            |row| row.indicator_score,
            |row| weighting.weight(pillar, sub_pillar, &row.observation.indicator),
            &group,
        );
        match members.and_then(|members| weighted_mean(&members, &group)) {
            Ok(score) => {
                let present = rows.iter().map(|r| &r.observation.indicator).unique().count();
                rollup.sub_pillars.push(SubPillarScore {
                    country: country.to_owned(),
                    membership: rows[0].observation.membership,
                    pillar,
                    sub_pillar: sub_pillar.to_owned(),
                    score,
                    availability: percentage(present, metadata.indicator_count(pillar, sub_pillar)),
                    rank: None,
                    year: rows.iter().map(|r| r.observation.year).max().unwrap_or_default(),
                });
            }
            Err(err) => rollup.record_gap(RollupLevel::SubPillar, country, group, err),
        }
    }
    if rollup.sub_pillars.is_empty() {
        return Err(CompassError::NoResolvableWeights);
    }
    debug!(
        "Scored {} of {group_count} sub-pillar groups",
        rollup.sub_pillars.len()
    );

    // Pillars
    let by_pillar: BTreeMap<(&str, Pillar), Vec<&SubPillarScore>> = rollup
        .sub_pillars
        .iter()
        .map(|s| ((s.country.as_str(), s.pillar), s))
        .into_group_map()
        .into_iter()
        .collect();
    let mut pillars = vec![];
    let mut pillar_gaps = vec![];
    for ((country, pillar), sub_pillars) in by_pillar {
        let group = format!("{country} / {pillar}");
        let members = weigh(
            &sub_pillars,
            |s| s.score,
            |s| weighting.weight(pillar, &s.sub_pillar, COL::SUB_PILLAR_WEIGHT_KEY),
            &group,
        );
        match members.and_then(|members| weighted_mean(&members, &group)) {
            Ok(score) => pillars.push(PillarScore {
                country: country.to_owned(),
                membership: sub_pillars[0].membership,
                pillar,
                score,
                availability: percentage(sub_pillars.len(), metadata.sub_pillar_count(pillar)),
                rank: None,
                year: sub_pillars.iter().map(|s| s.year).max().unwrap_or_default(),
            }),
            Err(err) => pillar_gaps.push((country.to_owned(), group, err)),
        }
    }
    for (country, group, err) in pillar_gaps {
        rollup.record_gap(RollupLevel::Pillar, &country, group, err);
    }
    rollup.pillars = pillars;

    // Countries
    let by_country: BTreeMap<&str, Vec<&PillarScore>> = rollup
        .pillars
        .iter()
        .map(|p| (p.country.as_str(), p))
        .into_group_map()
        .into_iter()
        .collect();
    rollup.countries = by_country
        .into_iter()
        .map(|(country, pillars)| CountryScore {
            country: country.to_owned(),
            membership: pillars[0].membership,
            score: pillars.iter().map(|p| p.score).sum::<f64>() / pillars.len() as f64,
            availability: percentage(pillars.len(), metadata.pillar_count()),
            rank: None,
            year: pillars.iter().map(|p| p.year).max().unwrap_or_default(),
        })
        .collect();

    info!(
        "Rolled up {} sub-pillar, {} pillar and {} country scores with {} gaps",
        rollup.sub_pillars.len(),
        rollup.pillars.len(),
        rollup.countries.len(),
        rollup.gaps.len()
    );
    Ok(rollup)
}

impl Rollup {
    fn record_gap(&mut self, level: RollupLevel, country: &str, group: String, err: CompassError) {
        warn!("No {level} score for {group}: {err}");
        self.gaps.push(RollupGap {
            level,
            country: country.to_owned(),
            group,
            reason: err.to_string(),
        });
    }

    /// Copy every level's score, rank and availability onto the member rows.
    pub fn broadcast(&self, scored: &mut [ScoredObservation]) {
        let sub_pillars: HashMap<_, _> = self
            .sub_pillars
            .iter()
            .map(|s| ((s.country.as_str(), s.pillar, s.sub_pillar.as_str()), s))
            .collect();
        let pillars: HashMap<_, _> = self
            .pillars
            .iter()
            .map(|p| ((p.country.as_str(), p.pillar), p))
            .collect();
        let countries: HashMap<_, _> = self
            .countries
            .iter()
            .map(|c| (c.country.as_str(), c))
            .collect();

        for row in scored.iter_mut() {
            let o = &row.observation;
            let sub_pillar = sub_pillars
                .get(&(o.country.as_str(), o.pillar, o.sub_pillar.as_str()))
                .copied();
            let pillar = pillars.get(&(o.country.as_str(), o.pillar)).copied();
            let country = countries.get(o.country.as_str()).copied();

            row.country_sub_pillar_score = sub_pillar.map(|s| s.score);
            row.data_availability = sub_pillar.map(|s| s.availability);
            row.country_sub_pillar_rank = sub_pillar.and_then(|s| s.rank);
            row.country_pillar_score = pillar.map(|p| p.score);
            row.country_pillar_rank = pillar.and_then(|p| p.rank);
            row.country_rank = country.and_then(|c| c.rank);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::observation::{fixtures::observation, IndicatorKey};

    const EPS: f64 = 1e-9;

    fn row(country: &str, pillar: Pillar, sub_pillar: &str, indicator: &str, score: f64) -> ScoredObservation {
        ScoredObservation::new(observation(country, pillar, sub_pillar, indicator, 0.0), score)
    }

    fn rows() -> Vec<ScoredObservation> {
        vec![
            row("Chile", Pillar::People, "Skills", "Literacy", 2.0),
            row("Chile", Pillar::People, "Skills", "Numeracy", 4.0),
            row("Chile", Pillar::People, "Access", "Phones", 5.0),
            row("Chile", Pillar::Strategy, "Plans", "Plan", 3.0),
            row("Peru", Pillar::People, "Skills", "Literacy", 1.0),
        ]
    }

    fn weights(entries: &[(Pillar, &str, &str, f64)]) -> MetadataStore {
        let weights = entries
            .iter()
            .map(|(p, sp, i, w)| (IndicatorKey::new(*p, sp, i), *w))
            .collect();
        MetadataStore::new(HashMap::new(), weights)
    }

    fn metadata(rows: &[ScoredObservation]) -> MetadataStore {
        MetadataStore::default().with_coverage(
            &rows.iter().map(|r| r.observation.clone()).collect::<Vec<_>>(),
        )
    }

    #[test]
    fn uniform_weights_give_plain_means() {
        let rows = rows();
        let rollup = roll_up(&rows, &UniformWeights, &metadata(&rows)).unwrap();
        let skills = rollup
            .sub_pillars
            .iter()
            .find(|s| s.country == "Chile" && s.sub_pillar == "Skills")
            .unwrap();
        assert!((skills.score - 3.0).abs() < EPS);
        assert_eq!(skills.availability, 100.0);

        let peru = rollup.sub_pillars.iter().find(|s| s.country == "Peru").unwrap();
        assert_eq!(peru.availability, 50.0);

        let people = rollup
            .pillars
            .iter()
            .find(|p| p.country == "Chile" && p.pillar == Pillar::People)
            .unwrap();
        assert!((people.score - 4.0).abs() < EPS);

        let chile = rollup.countries.iter().find(|c| c.country == "Chile").unwrap();
        assert!((chile.score - 3.5).abs() < EPS);
        assert_eq!(chile.availability, 100.0);
        assert!(rollup.gaps.is_empty());
    }

    #[test]
    fn table_weights_are_applied() {
        let rows = vec![
            row("Chile", Pillar::People, "Skills", "Literacy", 2.0),
            row("Chile", Pillar::People, "Skills", "Numeracy", 5.0),
        ];
        let store = weights(&[
            (Pillar::People, "Skills", "Literacy", 2.0),
            (Pillar::People, "Skills", "Numeracy", 1.0),
            (Pillar::People, "Skills", COL::SUB_PILLAR_WEIGHT_KEY, 1.0),
        ])
        .with_coverage(&rows.iter().map(|r| r.observation.clone()).collect::<Vec<_>>());
        let rollup = roll_up(&rows, &store, &store).unwrap();
        assert!((rollup.sub_pillars[0].score - 3.0).abs() < EPS);
        assert!((rollup.pillars[0].score - 3.0).abs() < EPS);
    }

    #[test]
    fn missing_weight_leaves_a_gap() {
        let rows = rows();
        let store = weights(&[
            (Pillar::People, "Skills", "Literacy", 1.0),
            (Pillar::People, "Skills", "Numeracy", 1.0),
            (Pillar::People, "Skills", COL::SUB_PILLAR_WEIGHT_KEY, 1.0),
        ]);
        let mut scored = rows.clone();
        let rollup = roll_up(&scored, &store, &metadata(&rows)).unwrap();
        assert_eq!(rollup.sub_pillars.len(), 2);
        assert!(rollup
            .gaps
            .iter()
            .any(|g| g.level == RollupLevel::SubPillar && g.group == "Chile / People / Access"));

        rollup.broadcast(&mut scored);
        assert!(scored[2].country_sub_pillar_score.is_none());
        assert!(scored[0].country_sub_pillar_score.is_some());
        assert!(scored.iter().all(|r| r
            .country_sub_pillar_score
            .map_or(true, f64::is_finite)));
    }

    #[test]
    fn missing_sub_pillar_weight_drops_the_pillar() {
        let rows = vec![
            row("Chile", Pillar::People, "Skills", "Literacy", 2.0),
            row("Chile", Pillar::People, "Skills", "Numeracy", 4.0),
            row("Chile", Pillar::Strategy, "Plans", "Plan", 5.0),
        ];
        let store = weights(&[
            (Pillar::People, "Skills", "Literacy", 1.0),
            (Pillar::People, "Skills", "Numeracy", 1.0),
            (Pillar::Strategy, "Plans", "Plan", 1.0),
            (Pillar::Strategy, "Plans", COL::SUB_PILLAR_WEIGHT_KEY, 1.0),
        ]);
        let mut scored = rows.clone();
        let rollup = roll_up(&scored, &store, &metadata(&rows)).unwrap();

        assert!(rollup
            .gaps
            .iter()
            .any(|g| g.level == RollupLevel::Pillar && g.group == "Chile / People"));
        assert!(!rollup
            .pillars
            .iter()
            .any(|p| p.country == "Chile" && p.pillar == Pillar::People));

        rollup.broadcast(&mut scored);
        for people in &scored[..2] {
            assert!((people.country_sub_pillar_score.unwrap() - 3.0).abs() < EPS);
            assert_eq!(people.country_pillar_score, None);
        }
        assert!((scored[2].country_pillar_score.unwrap() - 5.0).abs() < EPS);

        let chile = rollup.countries.iter().find(|c| c.country == "Chile").unwrap();
        assert!((chile.score - 5.0).abs() < EPS);
        assert_eq!(chile.availability, 50.0);
    }

    #[test]
    fn zero_total_weight_is_a_gap() {
        let rows = vec![row("Chile", Pillar::People, "Skills", "Literacy", 2.0)];
        let store = weights(&[
            (Pillar::People, "Skills", "Literacy", 0.0),
            (Pillar::People, "Skills", "Other", 1.0),
        ]);
        assert!(matches!(
            roll_up(&rows, &store, &metadata(&rows)),
            Err(CompassError::NoResolvableWeights)
        ));
    }

    #[test]
    fn availability_is_clamped() {
        assert_eq!(percentage(3, 2), 100.0);
        assert_eq!(percentage(1, 0), 0.0);
        assert_eq!(percentage(1, 4), 25.0);
    }

    #[test]
    fn no_rows_is_an_error() {
        assert!(matches!(
            roll_up(&[], &UniformWeights, &MetadataStore::default()),
            Err(CompassError::NoObservations)
        ));
    }
}
