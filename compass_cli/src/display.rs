use comfy_table::{presets::NOTHING, *};
use compass::{ingest::IngestReport, scorecard::RunReport, COL};
use itertools::{izip, Itertools};
use polars::frame::DataFrame;

fn styled_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(NOTHING)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_style(comfy_table::TableComponent::BottomBorder, '─')
        .set_style(comfy_table::TableComponent::MiddleHeaderIntersections, '─')
        .set_style(comfy_table::TableComponent::HeaderLines, '─')
        .set_style(comfy_table::TableComponent::BottomBorderIntersections, '─')
        .set_style(comfy_table::TableComponent::TopBorder, '─')
        .set_style(comfy_table::TableComponent::TopBorderIntersections, '─');
    table
}

/// A country row of the rolling output.
#[derive(Debug, PartialEq)]
struct RankedCountry<'a> {
    name: &'a str,
    rank: Option<u32>,
    score: &'a str,
    availability: &'a str,
    year: &'a str,
}

/// Country rows of a rolling output table, ranked countries first in rank order.
fn ranked_countries(rolling: &DataFrame) -> anyhow::Result<Vec<RankedCountry<'_>>> {
    let rows = izip!(
        rolling.column(COL::COUNTRY_NAME)?.str()?,
        rolling.column(COL::PILLAR)?.str()?,
        rolling.column(COL::NEW_RANK_SCORE)?.str()?,
        rolling.column(COL::RANK)?.str()?,
        rolling.column(COL::DATA_AVAILABILITY)?.str()?,
        rolling.column(COL::YEAR)?.str()?,
    )
    .filter(|(_, pillar, ..)| pillar.unwrap_or_default().is_empty())
    .map(|(name, _, score, rank, availability, year)| RankedCountry {
        name: name.unwrap_or_default(),
        rank: rank.and_then(|r| r.trim().parse().ok()),
        score: score.unwrap_or_default(),
        availability: availability.unwrap_or_default(),
        year: year.unwrap_or_default(),
    })
    .sorted_by(|a, b| {
        (a.rank.is_none(), a.rank, a.name).cmp(&(b.rank.is_none(), b.rank, b.name))
    })
    .collect();
    Ok(rows)
}

/// Shorten a numeric cell for display, leaving anything else untouched.
fn short_number(cell: &str) -> String {
    cell.parse::<f64>()
        .map(|value| format!("{value:.2}"))
        .unwrap_or_else(|_| cell.to_owned())
}

pub fn display_country_ranking(
    rolling: &DataFrame,
    max_results: Option<usize>,
) -> anyhow::Result<()> {
    let countries = ranked_countries(rolling)?;
    let mut table = styled_table();
    table.set_header(vec![
        Cell::new("Rank").add_attribute(Attribute::Bold),
        Cell::new("Country").add_attribute(Attribute::Bold),
        Cell::new("Score").add_attribute(Attribute::Bold),
        Cell::new("Data availability (%)").add_attribute(Attribute::Bold),
        Cell::new("Latest year").add_attribute(Attribute::Bold),
    ]);
    for country in countries
        .iter()
        .take(max_results.unwrap_or(countries.len()))
    {
        table.add_row(vec![
            country.rank.map(|r| r.to_string()).unwrap_or_else(|| "-".into()),
            country.name.to_owned(),
            short_number(country.score),
            short_number(country.availability),
            country.year.to_owned(),
        ]);
    }
    if let Some(column) = table.column_mut(0) {
        column.set_cell_alignment(CellAlignment::Right);
    }
    println!("\n{}", table);
    Ok(())
}

fn summary_row(table: &mut Table, label: &str, value: impl ToString) {
    table.add_row(vec![
        Cell::new(label).add_attribute(Attribute::Bold),
        Cell::new(value.to_string()),
    ]);
}

pub fn display_ingest_report(report: &IngestReport) {
    let mut table = styled_table();
    summary_row(&mut table, "Files read", report.files_read.len());
    summary_row(&mut table, "Files skipped", report.files_skipped.len());
    summary_row(&mut table, "Rows read", report.rows_read);
    summary_row(&mut table, "Incomplete rows dropped", report.incomplete_rows_dropped);
    summary_row(&mut table, "Non-member rows dropped", report.unresolved_rows_dropped);
    summary_row(&mut table, "Duplicate keys", report.duplicate_keys.len());
    summary_row(&mut table, "Rows kept", report.rows_kept);
    println!("\n{}", table);
    for skipped in &report.files_skipped {
        println!("Skipped '{}': {}", skipped.file, skipped.reason);
    }
}

pub fn display_run_report(report: &RunReport) {
    let mut table = styled_table();
    summary_row(&mut table, "Observations scored", report.observations_scored);
    summary_row(&mut table, "Range fallbacks", report.range_fallbacks.len());
    summary_row(&mut table, "Rollup gaps", report.rollup_gaps.len());
    summary_row(&mut table, "Countries ranked", report.countries_ranked);
    summary_row(&mut table, "Countries unranked", report.countries_unranked);
    println!("\n{}", table);
}

#[cfg(test)]
mod tests {
    use polars::df;

    use super::*;

    #[test]
    fn country_rows_are_ranked_first() {
        let rolling = df!(
            COL::COUNTRY_NAME => &["Kosovo (UNSCR 1244)", "Peru", "Chile", "Chile"],
            COL::PILLAR => &["", "", "", "People"],
            COL::NEW_RANK_SCORE => &["5", "3.5", "4.25", "4"],
            COL::RANK => &["", "2", "1", "1"],
            COL::DATA_AVAILABILITY => &["50", "100", "100", "100"],
            COL::YEAR => &["2022", "2022", "2021", "2021"]
        )
        .unwrap();
        let names = ranked_countries(&rolling)
            .unwrap()
            .iter()
            .map(|c| c.name)
            .collect_vec();
        assert_eq!(names, vec!["Chile", "Peru", "Kosovo (UNSCR 1244)"]);
    }

    #[test]
    fn numbers_are_shortened() {
        assert_eq!(short_number("4.123456"), "4.12");
        assert_eq!(short_number(""), "");
    }
}
