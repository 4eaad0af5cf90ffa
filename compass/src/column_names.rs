//! This module stores the column names of every table the pipeline reads or writes. Input names
//! must be kept in sync with the upstream indicator spreadsheets; output names are consumed by the
//! dashboard and the SDG mapping step.

// Indicator source files and the aggregated observation table
pub const COUNTRY_NAME: &str = "Country Name";
pub const YEAR: &str = "Year";
pub const INDICATOR: &str = "Indicator";
pub const DATA_COL: &str = "data_col";
pub const HIGHER_IS_BETTER: &str = "higher_is_better";
pub const PILLAR: &str = "Pillar";
pub const SUB_PILLAR: &str = "Sub-Pillar";
pub const UN_MEMBER_STATES: &str = "UN Member States";

// Reference country list
pub const COUNTRY_OR_AREA: &str = "Country or Area";

// Sources (metadata) table
pub const RAW_OR_INDEX: &str = "Raw/Index";
pub const RANGE_MIN: &str = "min";
pub const RANGE_MAX: &str = "max";
pub const DATA_SOURCE: &str = "Data Source";
pub const DATA_LINK: &str = "Data Link";

// Weights table
pub const WEIGHT: &str = "Weight";

// Scored columns
pub const INDICATOR_SCORE: &str = "indicator_score";
pub const COUNTRY_SUB_PILLAR_SCORE: &str = "country_sub_pillar_score";
pub const COUNTRY_SUB_PILLAR_RANK: &str = "country_sub_pillar_rank";
pub const COUNTRY_PILLAR_SCORE: &str = "country_pillar_score";
pub const COUNTRY_PILLAR_RANK: &str = "country_pillar_rank";
pub const COUNTRY_RANK: &str = "country_rank";
pub const DATA_AVAILABILITY: &str = "data_availability";

// Long-format output
pub const NEW_RANK_SCORE: &str = "new_rank_score";
pub const RANK: &str = "rank";

// SDG mapping
pub const SDG_NUMBER: &str = "SDG #";
pub const SDG_TARGET: &str = "SDG Target";
pub const SDG_COUNTRY_NAME: &str = "Country_Name";
pub const SDG_TARGET_OUT: &str = "SDG_Target";
pub const SDG_VALUE: &str = "Value";
pub const SDG_WEIGHTED_VALUE: &str = "Weighted_Value";

/// Sentinel indicator key of the weights row used for sub-pillar to pillar weighting.
pub const SUB_PILLAR_WEIGHT_KEY: &str = "nan";

/// Column order of `full_data`.
pub const FULL_DATA_COLUMNS: [&str; 16] = [
    COUNTRY_NAME,
    INDICATOR,
    DATA_COL,
    HIGHER_IS_BETTER,
    PILLAR,
    SUB_PILLAR,
    INDICATOR_SCORE,
    COUNTRY_SUB_PILLAR_SCORE,
    COUNTRY_SUB_PILLAR_RANK,
    COUNTRY_PILLAR_SCORE,
    COUNTRY_PILLAR_RANK,
    COUNTRY_RANK,
    DATA_AVAILABILITY,
    DATA_SOURCE,
    DATA_LINK,
    YEAR,
];

/// Column order of `full_output_rolling`.
pub const ROLLING_COLUMNS: [&str; 12] = [
    COUNTRY_NAME,
    PILLAR,
    SUB_PILLAR,
    INDICATOR,
    DATA_COL,
    HIGHER_IS_BETTER,
    NEW_RANK_SCORE,
    RANK,
    DATA_AVAILABILITY,
    DATA_SOURCE,
    DATA_LINK,
    YEAR,
];
