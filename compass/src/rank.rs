//! Competition ("minimum") ranking of the rollup levels.

use itertools::Itertools;
use log::info;

use crate::{
    observation::Membership,
    rollup::{CountryScore, PillarScore, Rollup, SubPillarScore},
};

/// Rank by descending score: tied scores share a rank and the next distinct score is ranked
/// one past the number of strictly better entries. Entries without a score get no rank.
pub fn min_rank(scores: &[Option<f64>]) -> Vec<Option<u32>> {
    let present = scores.iter().flatten().copied().collect_vec();
    scores
        .iter()
        .map(|score| {
            score.map(|score| 1 + present.iter().filter(|other| **other > score).count() as u32)
        })
        .collect()
}

/// Rank the entries of each group independently, writing through `set_rank`.
fn rank_within<T, K: Eq + std::hash::Hash>(
    items: &mut [T],
    group: impl Fn(&T) -> K,
    score: impl Fn(&T) -> Option<f64>,
    set_rank: impl Fn(&mut T, Option<u32>),
) {
    let groups = (0..items.len()).into_group_map_by(|i| group(&items[*i]));
    for indices in groups.into_values() {
        let scores = indices.iter().map(|i| score(&items[*i])).collect_vec();
        for (i, rank) in indices.into_iter().zip(min_rank(&scores)) {
            set_rank(&mut items[i], rank);
        }
    }
}

/// Within each (pillar, sub-pillar), over members and observers alike.
pub fn rank_sub_pillars(sub_pillars: &mut [SubPillarScore]) {
    rank_within(
        sub_pillars,
        |s| (s.pillar, s.sub_pillar.clone()),
        |s| Some(s.score),
        |s, rank| s.rank = rank,
    );
}

/// Within each pillar, over members and observers alike.
pub fn rank_pillars(pillars: &mut [PillarScore]) {
    rank_within(pillars, |p| p.pillar, |p| Some(p.score), |p, rank| p.rank = rank);
}

/// Across all full members; observers are left unranked.
pub fn rank_countries(countries: &mut [CountryScore]) {
    rank_within(
        countries,
        |_| (),
        |c| (c.membership == Membership::Full).then_some(c.score),
        |c, rank| c.rank = rank,
    );
}

/// Rank every level of a rollup in place.
pub fn rank_all(rollup: &mut Rollup) {
    rank_sub_pillars(&mut rollup.sub_pillars);
    rank_pillars(&mut rollup.pillars);
    rank_countries(&mut rollup.countries);
    info!(
        "Ranked {} countries, {} left unranked",
        rollup.countries.iter().filter(|c| c.rank.is_some()).count(),
        rollup.countries.iter().filter(|c| c.rank.is_none()).count()
    );
}
