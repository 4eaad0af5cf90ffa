use std::path::Path;

use log::{debug, info};

use crate::config::Config;
use crate::country::{CountryList, CountryNameNormalizer};
use crate::error::{CompassError, CompassResult};
use crate::ingest::Aggregation;
use crate::metadata::MetadataStore;
use crate::observation::IndicatorObservation;
use crate::scorecard::{RunReport, Scorecard};

// Re-exports
pub use column_names as COL;

// Modules
pub mod column_names;
pub mod config;
pub mod country;
pub mod error;
pub mod ingest;
pub mod metadata;
pub mod normalize;
pub mod observation;
pub mod output;
pub mod pillar;
pub mod rank;
pub mod rollup;
pub mod scorecard;
pub mod sdg;
pub mod table;

/// Type for the scoring pipeline. Holds the configuration and the country name rules shared by
/// every stage of a run.
pub struct Compass {
    pub config: Config,
    normalizer: CountryNameNormalizer,
}

impl Default for Compass {
    fn default() -> Self {
        Self::new()
    }
}

impl Compass {
    /// Setup the Compass object with default configuration
    pub fn new() -> Self {
        Self::new_with_config(Config::default())
    }

    /// Setup the Compass object with custom configuration
    pub fn new_with_config(config: Config) -> Self {
        debug!("config: {config:?}");
        Self {
            config,
            normalizer: CountryNameNormalizer::new(),
        }
    }

    /// Load the UN reference list plus the configured extra observers.
    pub fn load_countries<P: AsRef<Path>>(&self, path: P) -> CompassResult<CountryList> {
        CountryList::load(path, &self.config.extra_observers)
    }

    /// Combine every indicator source file in `sources_dir` into one observation table.
    pub fn aggregate<P: AsRef<Path>>(
        &self,
        sources_dir: P,
        countries: &CountryList,
    ) -> CompassResult<Aggregation> {
        ingest::aggregate_files(sources_dir, &self.config, &self.normalizer, countries)
    }

    /// Score, roll up and rank a set of observations.
    pub fn score(
        &self,
        observations: Vec<IndicatorObservation>,
        metadata: MetadataStore,
    ) -> CompassResult<Scorecard> {
        if observations.is_empty() {
            return Err(CompassError::NoObservations);
        }
        let metadata = metadata.with_coverage(&observations);

        info!("Scoring {} observations", observations.len());
        let normalize::IndicatorScores {
            mut scored,
            range_fallbacks,
        } = normalize::score_indicators(observations, &metadata, &self.config);
        normalize::apply_directionality(&mut scored, self.config.inversion_constant);

        let weighting = rollup::weighting_for(self.config.weighting, &metadata);
        let mut rollup = rollup::roll_up(&scored, weighting, &metadata)?;
        rank::rank_all(&mut rollup);
        rollup.broadcast(&mut scored);
        output::attach_sources(&mut scored, &metadata);

        let report = RunReport {
            observations_scored: scored.len(),
            range_fallbacks,
            rollup_gaps: rollup.gaps,
            countries_ranked: rollup.countries.iter().filter(|c| c.rank.is_some()).count(),
            countries_unranked: rollup.countries.iter().filter(|c| c.rank.is_none()).count(),
        };
        Ok(Scorecard {
            observations: scored,
            sub_pillars: rollup.sub_pillars,
            pillars: rollup.pillars,
            countries: rollup.countries,
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::{
        config::WeightingPolicy,
        observation::Membership,
        output::OutputTables,
        pillar::Pillar,
        table::{observations_from_frame, observations_to_frame, read_csv, write_csv},
    };

    const HEADER: &str = "Country Name,Year,Indicator,data_col,higher_is_better,Sub-Pillar";

    fn write(dir: &Path, name: &str, lines: &[&str]) {
        fs::write(dir.join(name), lines.join("\n") + "\n").unwrap();
    }

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        let sources = dir.path().join("sources");
        fs::create_dir(&sources).unwrap();
        write(
            &sources,
            "people_Literacy_scores.csv",
            &[
                HEADER,
                "Chile,2021,Literacy,90,True,Skills",
                "Peru,2022,Literacy,80,True,Skills",
                "USA,2022,Literacy,95,True,Skills",
                "Kosovo,2022,Literacy,99,True,Skills",
            ],
        );
        write(
            &sources,
            "people_Dropout_scores.csv",
            &[
                HEADER,
                "Chile,2022,Dropout rate,10,False,Skills",
                "Peru,2022,Dropout rate,20,False,Skills",
                "United States of America,2022,Dropout rate,5,False,Skills",
            ],
        );
        write(
            &sources,
            "strategy_Plan_scores.csv",
            &[
                HEADER,
                "Chile,2022,Digital plan,3,True,Plans",
                "Peru,2022,Digital plan,7,True,Plans",
                "Atlantis,2022,Digital plan,9,True,Plans",
            ],
        );
        write(
            dir.path(),
            "Countries.csv",
            &[
                "Country or Area,UN Member States",
                "Chile,x",
                "Peru,x",
                "United States of America (the),x",
                "Atlantis,",
            ],
        );
        write(
            dir.path(),
            "Sources.csv",
            &[
                "Pillar,Sub-Pillar,Indicator,Raw/Index,min,max,Data Source,Data Link",
                "Strategy,Plans,Digital plan,Index,0,10,Survey,https://example.org",
                "People,Skills,Literacy,Raw,,,UNESCO,https://uis.unesco.org",
            ],
        );
        write(
            dir.path(),
            "Weights.csv",
            &[
                "Pillar,Sub-Pillar,Indicator,Weight",
                "People,Skills,Literacy,1",
                "People,Skills,Dropout rate,1",
                "People,Skills,,1",
                "Strategy,Plans,Digital plan,1",
                "Strategy,Plans,,1",
            ],
        );
        dir
    }

    fn run(config: Config) -> Scorecard {
        let dir = fixture();
        let compass = Compass::new_with_config(config);
        let countries = compass
            .load_countries(dir.path().join("Countries.csv"))
            .unwrap();
        let aggregation = compass
            .aggregate(dir.path().join("sources"), &countries)
            .unwrap();

        // Round trip through the aggregated table as the CLI does
        let aggregated = dir.path().join("output.csv");
        write_csv(&aggregated, &mut observations_to_frame(&aggregation.observations).unwrap())
            .unwrap();
        let observations = observations_from_frame(&read_csv(&aggregated).unwrap()).unwrap();

        let metadata = MetadataStore::load(
            dir.path().join("Sources.csv"),
            dir.path().join("Weights.csv"),
        )
        .unwrap();
        compass.score(observations, metadata).unwrap()
    }

    #[test]
    fn end_to_end_scores_and_ranks() {
        let scorecard = run(Config::default());
        assert_eq!(scorecard.observations.len(), 9);
        assert!(scorecard.report.rollup_gaps.is_empty());

        let plan = |country: &str| {
            scorecard
                .observations
                .iter()
                .find(|r| r.observation.country == country && r.observation.indicator == "Digital plan")
                .unwrap()
                .indicator_score
        };
        assert!((plan("Chile") - (1.0 + 0.3 * 4.99)).abs() < 1e-9);
        assert!((plan("Peru") - (1.0 + 0.7 * 4.99)).abs() < 1e-9);

        for row in &scorecard.observations {
            let availability = row.data_availability.unwrap();
            assert!((0.0..=100.0).contains(&availability));
            assert!(row.country_sub_pillar_score.is_some());
        }

        let kosovo = scorecard
            .countries
            .iter()
            .find(|c| c.country == "Kosovo (UNSCR 1244)")
            .unwrap();
        assert_eq!(kosovo.membership, Membership::Observer);
        assert_eq!(kosovo.rank, None);
        assert_eq!(scorecard.report.countries_ranked, 3);
        assert_eq!(scorecard.report.countries_unranked, 1);

        let ranking = scorecard.ranking();
        assert_eq!(ranking[0].rank, Some(1));
        assert!(ranking.windows(2).all(|w| w[0].score >= w[1].score));

        let people = scorecard
            .pillars
            .iter()
            .filter(|p| p.pillar == Pillar::People)
            .count();
        assert_eq!(people, 4);

        let literacy = scorecard
            .observations
            .iter()
            .find(|r| r.observation.indicator == "Literacy")
            .unwrap();
        assert_eq!(literacy.data_source.as_deref(), Some("UNESCO"));
    }

    #[test]
    fn output_tables_cover_every_level() {
        let scorecard = run(Config::default());
        let tables = OutputTables::assemble(&scorecard).unwrap();
        assert_eq!(tables.full_data.height(), 9);
        let expected = scorecard.countries.len()
            + scorecard.pillars.len()
            + scorecard.sub_pillars.len()
            + scorecard.observations.len();
        assert_eq!(tables.full_output_rolling.height(), expected);
    }

    #[test]
    fn uniform_weighting_needs_no_weights() {
        let config = Config {
            weighting: WeightingPolicy::Uniform,
            ..Config::default()
        };
        let dir = fixture();
        let compass = Compass::new_with_config(config);
        let countries = compass
            .load_countries(dir.path().join("Countries.csv"))
            .unwrap();
        let aggregation = compass
            .aggregate(dir.path().join("sources"), &countries)
            .unwrap();
        let scorecard = compass
            .score(aggregation.observations, MetadataStore::default())
            .unwrap();
        assert!(scorecard.report.rollup_gaps.is_empty());
        assert_eq!(scorecard.countries.len(), 4);
    }

    #[test]
    fn table_weighting_without_weights_aborts() {
        let dir = fixture();
        let compass = Compass::new();
        let countries = compass
            .load_countries(dir.path().join("Countries.csv"))
            .unwrap();
        let aggregation = compass
            .aggregate(dir.path().join("sources"), &countries)
            .unwrap();
        assert!(matches!(
            compass.score(aggregation.observations, MetadataStore::default()),
            Err(CompassError::NoResolvableWeights)
        ));
        assert!(matches!(
            compass.score(vec![], MetadataStore::default()),
            Err(CompassError::NoObservations)
        ));
    }
}
