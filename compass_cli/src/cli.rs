use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use compass::{
    config::Config,
    metadata::{paths, MetadataStore},
    output::{write_table, OutputFormat, OutputFormatter, OutputTables},
    scorecard::Scorecard,
    sdg::{compute_sdg_scores, mappings_from_frame, sdg_frame, sub_pillar_scores_from_rolling},
    table::{observations_from_frame, observations_to_frame, read_csv, write_csv},
    Compass,
};
use enum_dispatch::enum_dispatch;
use log::{debug, info};
use serde::Serialize;
use spinners::{Spinner, Spinners};

use crate::display::{display_country_ranking, display_ingest_report, display_run_report};
use crate::error::CompassCliResult;

const DEFAULT_PROGRESS_SPINNER: Spinners = Spinners::Dots;
const COMPLETE_PROGRESS_STRING: &str = "✔";
const RUNNING_TAIL_STRING: &str = "...";

/// Start a progress spinner unless running quietly.
fn spinner(quiet: bool, message: &str) -> Option<Spinner> {
    (!quiet).then(|| {
        Spinner::with_timer(
            DEFAULT_PROGRESS_SPINNER,
            message.to_string() + RUNNING_TAIL_STRING,
        )
    })
}

fn stop(sp: Option<Spinner>) {
    if let Some(mut s) = sp {
        s.stop_with_symbol(COMPLETE_PROGRESS_STRING);
    }
}

/// Write a diagnostics report as pretty JSON.
fn write_report<T: Serialize>(path: &Path, report: &T) -> CompassCliResult<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create report file '{}'", path.display()))?;
    serde_json::to_writer_pretty(file, report)?;
    info!("Wrote report to '{}'", path.display());
    Ok(())
}

/// Trait that defines what to run when a given subcommand is invoked.
#[enum_dispatch]
pub trait RunCommand {
    fn run(&self, config: Config) -> CompassCliResult<()>;
}

/// Inputs of the aggregation stage.
#[derive(Args, Debug, Clone)]
pub struct AggregateArgs {
    #[arg(
        short = 's',
        long,
        help = "Directory of per-indicator source CSV files named `<pillar>_<name>.csv`"
    )]
    sources_dir: PathBuf,
    #[arg(
        short = 'c',
        long,
        default_value = paths::COUNTRIES,
        help = "Reference list of countries with a `UN Member States` flag"
    )]
    countries: PathBuf,
}

/// Reference tables used by the scoring stage.
#[derive(Args, Debug, Clone)]
pub struct MetadataArgs {
    #[arg(long, default_value = paths::SOURCES, help = "Indicator metadata table")]
    sources: PathBuf,
    #[arg(long, default_value = paths::WEIGHTS, help = "Rollup weights table")]
    weights: PathBuf,
}

/// Where and how scored tables are written.
#[derive(Args, Debug, Clone)]
pub struct ScoreOutputArgs {
    #[arg(
        short = 'd',
        long,
        default_value = ".",
        help = "Directory for the full_data and full_output_rolling tables"
    )]
    output_dir: PathBuf,
    #[arg(
        short = 'f',
        long,
        value_name = "csv|json|ndjson",
        default_value_t = OutputFormat::Csv,
        help = "Output format for the scored tables"
    )]
    output_format: OutputFormat,
    #[arg(long, help = "Write the run report as JSON to this file")]
    report: Option<PathBuf>,
}

impl ScoreOutputArgs {
    fn write(&self, scorecard: &Scorecard) -> CompassCliResult<()> {
        let formatter: OutputFormatter = self.output_format.into();
        let mut tables = OutputTables::assemble(scorecard)?;
        std::fs::create_dir_all(&self.output_dir).with_context(|| {
            format!("Failed to create output directory '{}'", self.output_dir.display())
        })?;
        write_table(&self.output_dir, paths::FULL_DATA, &formatter, &mut tables.full_data)?;
        write_table(
            &self.output_dir,
            paths::FULL_OUTPUT_ROLLING,
            &formatter,
            &mut tables.full_output_rolling,
        )?;
        if let Some(report) = &self.report {
            write_report(report, &scorecard.report)?;
        }
        Ok(())
    }
}

fn load_metadata(args: &MetadataArgs) -> CompassCliResult<MetadataStore> {
    Ok(MetadataStore::load(&args.sources, &args.weights).with_context(|| {
        format!(
            "Failed to load metadata from '{}' and '{}'",
            args.sources.display(),
            args.weights.display()
        )
    })?)
}

/// The `aggregate` command combines every indicator source file into one observation table.
#[derive(Args, Debug)]
pub struct AggregateCommand {
    #[command(flatten)]
    aggregate_args: AggregateArgs,
    #[arg(
        short = 'o',
        long,
        default_value = paths::AGGREGATED,
        help = "Output file for the aggregated observations"
    )]
    output: PathBuf,
    #[arg(long, help = "Write the ingest report as JSON to this file")]
    report: Option<PathBuf>,
    #[arg(from_global)]
    quiet: bool,
}

impl RunCommand for AggregateCommand {
    fn run(&self, config: Config) -> CompassCliResult<()> {
        info!("Running `aggregate` subcommand");
        let sp = spinner(self.quiet, "Aggregating source files");
        let compass = Compass::new_with_config(config);
        let countries = compass.load_countries(&self.aggregate_args.countries)?;
        let aggregation = compass.aggregate(&self.aggregate_args.sources_dir, &countries)?;
        write_csv(
            &self.output,
            &mut observations_to_frame(&aggregation.observations)?,
        )?;
        stop(sp);

        if let Some(report) = &self.report {
            write_report(report, &aggregation.report)?;
        }
        display_ingest_report(&aggregation.report);
        Ok(())
    }
}

/// The `score` command normalizes, rolls up and ranks an aggregated observation table.
#[derive(Args, Debug)]
pub struct ScoreCommand {
    #[arg(
        short = 'i',
        long,
        default_value = paths::AGGREGATED,
        help = "Aggregated observations written by `aggregate`"
    )]
    input: PathBuf,
    #[command(flatten)]
    metadata_args: MetadataArgs,
    #[command(flatten)]
    output_args: ScoreOutputArgs,
    #[arg(from_global)]
    quiet: bool,
}

impl RunCommand for ScoreCommand {
    fn run(&self, config: Config) -> CompassCliResult<()> {
        info!("Running `score` subcommand");
        let sp = spinner(self.quiet, "Scoring observations");
        let observations = observations_from_frame(&read_csv(&self.input)?)
            .with_context(|| format!("Invalid aggregated table '{}'", self.input.display()))?;
        let metadata = load_metadata(&self.metadata_args)?;
        let scorecard = Compass::new_with_config(config).score(observations, metadata)?;
        self.output_args.write(&scorecard)?;
        stop(sp);

        display_run_report(&scorecard.report);
        Ok(())
    }
}

/// The `run` command aggregates and scores in one go.
#[derive(Args, Debug)]
pub struct RunAllCommand {
    #[command(flatten)]
    aggregate_args: AggregateArgs,
    #[command(flatten)]
    metadata_args: MetadataArgs,
    #[command(flatten)]
    output_args: ScoreOutputArgs,
    #[arg(from_global)]
    quiet: bool,
}

impl RunCommand for RunAllCommand {
    fn run(&self, config: Config) -> CompassCliResult<()> {
        info!("Running `run` subcommand");
        let compass = Compass::new_with_config(config);

        let sp = spinner(self.quiet, "Aggregating source files");
        let countries = compass.load_countries(&self.aggregate_args.countries)?;
        let aggregation = compass.aggregate(&self.aggregate_args.sources_dir, &countries)?;
        stop(sp);
        display_ingest_report(&aggregation.report);

        let sp = spinner(self.quiet, "Scoring observations");
        let metadata = load_metadata(&self.metadata_args)?;
        let scorecard = compass.score(aggregation.observations, metadata)?;
        self.output_args.write(&scorecard)?;
        stop(sp);

        display_run_report(&scorecard.report);
        Ok(())
    }
}

/// The `sdg` command projects sub-pillar scores onto SDG targets.
#[derive(Args, Debug)]
pub struct SdgCommand {
    #[arg(
        short = 'r',
        long,
        default_value = "full_output_rolling.csv",
        help = "Rolling output written by `score`"
    )]
    rolling: PathBuf,
    #[arg(short = 'm', long, default_value = paths::SDG_MAPPING, help = "SDG mapping table")]
    mapping: PathBuf,
    #[arg(short = 'c', long, default_value = paths::COUNTRIES, help = "Reference country list")]
    countries: PathBuf,
    #[arg(short = 'o', long, default_value = paths::SDG_OUTPUT, help = "Output file")]
    output: PathBuf,
    #[arg(from_global)]
    quiet: bool,
}

impl RunCommand for SdgCommand {
    fn run(&self, config: Config) -> CompassCliResult<()> {
        info!("Running `sdg` subcommand");
        let sp = spinner(self.quiet, "Computing SDG values");
        let countries = Compass::new_with_config(config).load_countries(&self.countries)?;
        let scores = sub_pillar_scores_from_rolling(&read_csv(&self.rolling)?)?;
        let mappings = mappings_from_frame(read_csv(&self.mapping)?)?;
        let rows = compute_sdg_scores(&scores, &mappings, &countries);
        write_csv(&self.output, &mut sdg_frame(&rows)?)?;
        stop(sp);
        println!("Wrote {} SDG rows to '{}'", rows.len(), self.output.display());
        Ok(())
    }
}

/// The `countries` command prints the country ranking from a rolling output table.
#[derive(Args, Debug)]
pub struct CountriesCommand {
    #[arg(
        short = 'i',
        long,
        default_value = "full_output_rolling.csv",
        help = "Rolling output written by `score` in CSV format"
    )]
    input: PathBuf,
    #[arg(short = 'n', long, help = "Show only the first N countries")]
    max_results: Option<usize>,
}

impl RunCommand for CountriesCommand {
    fn run(&self, _config: Config) -> CompassCliResult<()> {
        info!("Running `countries` subcommand");
        let rolling = read_csv(&self.input)
            .with_context(|| format!("Failed to read '{}'", self.input.display()))?;
        debug!("rolling output shape: {:?}", rolling.shape());
        display_country_ranking(&rolling, self.max_results)?;
        Ok(())
    }
}

/// Top level CLI
#[derive(Parser, Debug)]
#[command(version, about="Compass scores and ranks countries on digital development indicators.", long_about = None, name="compass")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
    #[arg(
        short = 'q',
        long = "quiet",
        help = "\
            Do not print progress spinners to stdout. Results and logs (when `RUST_LOG`\n\
            is set) will still be printed.",
        global = true
    )]
    quiet: bool,
    #[arg(
        long,
        global = true,
        help = "Config file to use instead of `<config dir>/compass/config.toml`"
    )]
    pub config: Option<PathBuf>,
}

/// Commands contains the list of subcommands avaliable for use in the CLI.
/// Each command should implement the RunCommand trait and specify the list
/// of required args for that command.
#[derive(Subcommand, Debug)]
#[enum_dispatch(RunCommand)]
pub enum Commands {
    /// Combine the indicator source files into one observation table
    Aggregate(AggregateCommand),
    /// Score, roll up and rank an aggregated observation table
    Score(ScoreCommand),
    /// Aggregate and score in one go
    Run(RunAllCommand),
    /// Project sub-pillar scores onto SDG targets
    Sdg(SdgCommand),
    /// Print the country ranking
    Countries(CountriesCommand),
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn write(dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, lines.join("\n") + "\n").unwrap();
        path
    }

    #[test]
    fn run_command_writes_outputs() {
        let dir = TempDir::new().unwrap();
        let sources = dir.path().join("sources");
        fs::create_dir(&sources).unwrap();
        write(
            &sources,
            "business_Startups_scores.csv",
            &[
                "Country Name,Year,Indicator,data_col,higher_is_better,Sub-Pillar",
                "Chile,2022,Startups,4,True,Entrepreneurship",
                "Peru,2022,Startups,9,True,Entrepreneurship",
            ],
        );
        let countries = write(
            dir.path(),
            "Countries.csv",
            &["Country or Area,UN Member States", "Chile,x", "Peru,x"],
        );
        let metadata = write(
            dir.path(),
            "Sources.csv",
            &["Pillar,Sub-Pillar,Indicator,Raw/Index,min,max,Data Source,Data Link"],
        );
        let weights = write(
            dir.path(),
            "Weights.csv",
            &["Pillar,Sub-Pillar,Indicator,Weight"],
        );
        let output_dir = dir.path().join("out");
        let command = RunAllCommand {
            aggregate_args: AggregateArgs {
                sources_dir: sources,
                countries,
            },
            metadata_args: MetadataArgs {
                sources: metadata,
                weights,
            },
            output_args: ScoreOutputArgs {
                output_dir: output_dir.clone(),
                output_format: OutputFormat::Csv,
                report: Some(dir.path().join("report.json")),
            },
            quiet: true,
        };
        let config = Config {
            weighting: compass::config::WeightingPolicy::Uniform,
            ..Config::default()
        };
        command.run(config).unwrap();

        assert!(output_dir.join("full_data.csv").exists());
        let rolling = output_dir.join("full_output_rolling.csv");
        assert!(rolling.exists());
        assert!(dir.path().join("report.json").exists());

        let countries_command = CountriesCommand {
            input: rolling,
            max_results: Some(1),
        };
        assert!(countries_command.run(Config::default()).is_ok());
    }

    #[test]
    fn output_format_should_parse_from_args() {
        let cli = Cli::try_parse_from(["compass", "score", "-f", "NDJSON", "-q"]).unwrap();
        match cli.command {
            Some(Commands::Score(score)) => {
                assert_eq!(score.output_args.output_format, OutputFormat::NdJson);
                assert!(score.quiet);
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(Cli::try_parse_from(["compass", "score", "-f", "parquet"]).is_err());
    }

    #[test]
    fn cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
