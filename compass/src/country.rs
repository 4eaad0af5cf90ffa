//! Country-name canonicalisation and the UN reference list.
//!
//! Indicator sources spell country names in many ways ("USA", "Korea, Rep.", "Côte d’Ivoire").
//! `CountryNameNormalizer` rewrites them onto the spelling used by the reference list, applying its
//! rules in order so that later rules see the output of earlier ones.

use std::{collections::HashMap, path::Path};

use log::{debug, info, warn};
use regex::Regex;

use crate::{
    error::CompassResult,
    observation::Membership,
    table::{read_csv, require_columns, string_column},
    COL,
};

/// Raw values that are placeholders rather than country names.
const PLACEHOLDER_NAMES: [&str; 2] = ["-", "0.03"];

/// Whole-name replacements: the name must equal the pattern exactly.
const EXACT: &[(&str, &str)] = &[
    ("Bahrain (Kingdom of)", "Bahrain"),
    ("Bolivia", "Bolivia (Plurinational State of)"),
    ("Bolivia, Plurinational State of", "Bolivia (Plurinational State of)"),
    ("Brunei", "Brunei Darussalam"),
    ("Bulgaria (Rep.)", "Bulgaria"),
    ("Central African Republic", "Central African Republic (the)"),
    ("Central African Rep.", "Central African Republic (the)"),
    ("C.A. Republic", "Central African Republic (the)"),
    ("China (People's Rep.)", "China"),
    ("Comoros", "Comoros (the)"),
    ("Congo", "Congo (the)"),
    ("Congo (Brazzaville)", "Congo (the)"),
    ("Congo (Rep. of the)", "Congo (the)"),
    ("Congo, Rep.", "Congo (the)"),
    ("Congo (Rep.)", "Congo (the)"),
    ("Republic of the Congo", "Congo (the)"),
    ("R. of Congo", "Congo (the)"),
    ("Congo (Democratic Republic of the)", "Democratic Republic of the Congo (the)"),
    ("Congo, Dem. Rep.", "Democratic Republic of the Congo (the)"),
    ("Congo, The Democratic Republic of the", "Democratic Republic of the Congo (the)"),
    ("Congo, Democratic Republic", "Democratic Republic of the Congo (the)"),
    ("DR Congo", "Democratic Republic of the Congo (the)"),
    ("Democratic Republic of Congo", "Democratic Republic of the Congo (the)"),
    ("Democratic Republic of the Congo", "Democratic Republic of the Congo (the)"),
    ("Dem. Rep. of the Congo", "Democratic Republic of the Congo (the)"),
    ("Cote d'Ivoire", "Côte d'Ivoire"),
    ("Côte d’Ivoire", "Côte d'Ivoire"),
    ("Cote dIvoire", "Côte d'Ivoire"),
    ("Cōte d'Ivoire", "Côte d'Ivoire"),
    ("Ivory Coast", "Côte d'Ivoire"),
    ("Dem. People's Rep. of Korea", "Democratic People's Republic of Korea (the)"),
    ("Democratic People's Republic of Korea", "Democratic People's Republic of Korea (the)"),
    ("Korea, Dem. People's Rep.", "Democratic People's Republic of Korea (the)"),
    ("North Korea", "Democratic People's Republic of Korea (the)"),
    ("Eswatini (Kingdom of)", "Eswatini"),
    ("Swaziland", "Eswatini"),
    ("Faröe Islands", "Faroe Islands"),
    ("Georgia (Country)", "Georgia"),
    ("Korea", "Republic of Korea (the)"),
    ("Korea (Rep. of)", "Republic of Korea (the)"),
    ("Korea (Rep.)", "Republic of Korea (the)"),
    ("Korea (Republic of)", "Republic of Korea (the)"),
    ("Korea, South", "Republic of Korea (the)"),
    ("South Korea", "Republic of Korea (the)"),
    ("Republic of Korea", "Republic of Korea (the)"),
    ("Marshall Islands", "Marshall Islands (the)"),
    ("Morroco", "Morocco"),
    ("Niger", "Niger (the)"),
    ("West Bank and Gaza", "State of Palestine (the)"),
    ("Russia", "Russian Federation (the)"),
    ("Russian Federation", "Russian Federation (the)"),
    ("UAE", "United Arab Emirates (the)"),
    ("U.A.E", "United Arab Emirates (the)"),
    ("United Arab Emirates", "United Arab Emirates (the)"),
    ("United Kingdom", "United Kingdom of Great Britain and Northern Ireland (the)"),
    ("UK", "United Kingdom of Great Britain and Northern Ireland (the)"),
    ("Great Britain", "United Kingdom of Great Britain and Northern Ireland (the)"),
    (
        "United Kingdom of Great Britain and Northern Ireland",
        "United Kingdom of Great Britain and Northern Ireland (the)",
    ),
    ("Vietnam", "Viet Nam"),
    ("United States", "United States of America (the)"),
    ("USA", "United States of America (the)"),
    ("United States of America", "United States of America (the)"),
    ("Sint Maarten", "Saint Martin"),
    ("St. Martin (French part)", "Saint Martin (French Part)"),
    ("Sint Maarten (Dutch part)", "Saint Martin (Dutch Part)"),
    ("Eq. Guinea", "Equatorial Guinea"),
    ("Ant.& Barb.", "Antigua and Barbuda"),
    ("Domin. Rep.", "Dominican Republic (the)"),
    ("Dominica (Commonwealth of)", "Dominica"),
    ("Curacao", "Curaçao"),
    ("Reunion", "Réunion"),
];

/// Substring rules: any name containing the fragment is replaced as a whole.
const CONTAINING: &[(&str, &str)] = &[
    ("Bahamas", "Bahamas (the)"),
    ("Côte d'Ivoire", "Côte d'Ivoire"),
    ("Czech", "Czechia"),
    ("Dominican Re", "Dominican Republic (the)"),
    ("Hong Kong", "China, Hong Kong Special Administrative Region"),
    ("Hongkong", "China, Hong Kong Special Administrative Region"),
    ("Gambia", "Gambia (the)"),
    ("Iran", "Iran (Islamic Republic of)"),
    ("Korea, Rep", "Republic of Korea (the)"),
    ("Kyrgyz", "Kyrgyzstan"),
    ("Lao", "Lao People's Democratic Republic (the)"),
    ("Macao", "China, Macao Special Administrative Region"),
    ("Macau", "China, Macao Special Administrative Region"),
    ("Micronesia", "Micronesia (Federated States of)"),
    ("Moldova", "Republic of Moldova (the)"),
    ("Nepal", "Nepal"),
    ("New Ze", "New Zealand"),
    ("Macedonia", "North Macedonia"),
    ("Palestin", "State of Palestine (the)"),
    ("Panama", "Panama"),
    ("Philippines", "Philippines (the)"),
    ("Myanmar", "Myanmar"),
    ("Burma", "Myanmar"),
    ("Puerto Rico", "Puerto Rico"),
    ("Slovak", "Slovakia"),
];

/// Substring rules applied after the word-level Sudan rewrite.
const CONTAINING_LATE: &[(&str, &str)] = &[
    ("South Sudan", "South Sudan"),
    ("Syria", "Syrian Arab Republic (the)"),
    ("São Tomé", "Sao Tome and Principe"),
    ("Principe", "Sao Tome and Principe"),
    ("Taiwan", "Taiwan"),
    ("Taipei", "Taiwan"),
    ("Tanzania", "United Republic of Tanzania (the)"),
    ("Netherlands", "Netherlands (the)"),
    ("Virgin Islands", "United States Virgin Islands"),
    ("Vatican", "Vatican"),
    ("Venezuela", "Venezuela (Bolivarian Republic of)"),
    ("Yemen", "Yemen"),
    ("Arab world", "Arab World"),
    ("World", "World"),
    ("Kitts and Nevis", "Saint Kitts and Nevis"),
    ("Lucia", "Saint Lucia"),
    ("Vincent", "Saint Vincent and the Grenadines"),
    ("Verde", "Cabo Verde"),
    ("Egypt", "Egypt"),
    ("Korea, D", "Democratic People's Republic of Korea (the)"),
    ("Tobago", "Trinidad and Tobago"),
    ("Timor-Leste", "Timor-Leste"),
    ("Emirates", "United Arab Emirates (the)"),
    ("Papua", "Papua New Guinea"),
    ("Bissau", "Guinea-Bissau"),
    ("Bosnia", "Bosnia and Herzegovina"),
    ("European Union", "European Union"),
    ("Solomon", "Solomon Islands"),
    ("Kosovo", "Kosovo (UNSCR 1244)"),
];

/// Maps raw country strings onto canonical names. Construct once per run and share.
pub struct CountryNameNormalizer {
    exact: HashMap<&'static str, &'static str>,
    sudan: Regex,
}

impl Default for CountryNameNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl CountryNameNormalizer {
    pub fn new() -> Self {
        Self {
            exact: EXACT.iter().copied().collect(),
            // Unwrap: the pattern is a literal known to be valid
            sudan: Regex::new(r"\bSudan\b(?: \(the\))?").unwrap(),
        }
    }

    /// Canonical spelling of `raw`, or `None` for blanks and placeholder values.
    pub fn normalize(&self, raw: &str) -> Option<String> {
        let name = raw.trim().trim_matches('*').trim();
        if name.is_empty() || PLACEHOLDER_NAMES.contains(&name) {
            return None;
        }
        let mut name = self.rewrite_exact(name);
        name = rewrite_containing(CONTAINING, name);
        name = self.sudan.replace_all(&name, "Sudan (the)").into_owned();
        name = rewrite_containing(CONTAINING_LATE, name);
        // Exact rules can apply again to names produced by the substring rules
        Some(self.rewrite_exact(&name))
    }

    fn rewrite_exact(&self, name: &str) -> String {
        self.exact
            .get(name)
            .map(|canonical| canonical.to_string())
            .unwrap_or_else(|| name.to_owned())
    }
}

fn rewrite_containing(rules: &[(&str, &str)], name: String) -> String {
    rules.iter().fold(name, |name, (fragment, canonical)| {
        if name.contains(fragment) {
            canonical.to_string()
        } else {
            name
        }
    })
}

/// The reference list of countries and their UN membership status.
#[derive(Debug, Default, Clone)]
pub struct CountryList {
    members: HashMap<String, Membership>,
}

impl CountryList {
    /// Build from (name, flag) pairs, dropping non-members. Later entries override earlier ones.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, Membership)>,
        S: Into<String>,
    {
        Self {
            members: entries
                .into_iter()
                .map(|(name, membership)| (name.into(), membership))
                .collect(),
        }
    }

    /// Load the reference list and add `extra_observers` with the observer flag.
    pub fn load<P: AsRef<Path>>(path: P, extra_observers: &[String]) -> CompassResult<Self> {
        let path = path.as_ref();
        let df = read_csv(path)?;
        require_columns(
            &df,
            &[COL::COUNTRY_OR_AREA, COL::UN_MEMBER_STATES],
            &path.display().to_string(),
        )?;
        let names = string_column(&df, COL::COUNTRY_OR_AREA)?;
        let flags = string_column(&df, COL::UN_MEMBER_STATES)?;
        let mut list = Self::from_entries(names.into_iter().zip(flags).filter_map(
            |(name, flag)| {
                let membership = flag.as_deref().and_then(Membership::from_flag)?;
                Some((name?, membership))
            },
        ));
        for name in extra_observers {
            if list.members.contains_key(name) {
                warn!("Allow-listed country '{name}' already in reference list");
                continue;
            }
            debug!("Allow-listing '{name}' as observer");
            list.members.insert(name.clone(), Membership::Observer);
        }
        info!("Countries from reference list: {}", list.len());
        Ok(list)
    }

    pub fn membership(&self, name: &str) -> Option<Membership> {
        self.members.get(name).copied()
    }

    /// Names flagged as full members, sorted.
    pub fn full_members(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .members
            .iter()
            .filter(|(_, membership)| **membership == Membership::Full)
            .map(|(name, _)| name.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
