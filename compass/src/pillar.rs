//! The seven policy pillars of the compass.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumString,
    EnumIter,
    Display,
)]
#[strum(ascii_case_insensitive)]
pub enum Pillar {
    Business,
    Foundations,
    Government,
    Infrastructure,
    People,
    Regulation,
    Strategy,
}

impl Pillar {
    /// Parse a pillar from a table cell or file name prefix, ignoring surrounding whitespace.
    pub fn parse(value: &str) -> Option<Self> {
        value.trim().parse().ok()
    }

    /// Pillar tag of an indicator source file: the file name prefix before the first underscore.
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        file_name.split('_').next().and_then(Self::parse)
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn pillar_should_parse_case_insensitively() {
        assert_eq!(Pillar::parse("business"), Some(Pillar::Business));
        assert_eq!(Pillar::parse(" INFRASTRUCTURE "), Some(Pillar::Infrastructure));
        assert_eq!(Pillar::parse("Regulation"), Some(Pillar::Regulation));
        assert_eq!(Pillar::parse("digital rights"), None);
    }

    #[test]
    fn pillar_should_display_capitalized() {
        assert_eq!(Pillar::People.to_string(), "People");
        assert_eq!(Pillar::iter().count(), 7);
    }

    #[test]
    fn pillar_from_file_name_uses_prefix() {
        assert_eq!(
            Pillar::from_file_name("people_Cyberbullying_scores.csv"),
            Some(Pillar::People)
        );
        assert_eq!(
            Pillar::from_file_name("Strategy_National Plan_scores.csv"),
            Some(Pillar::Strategy)
        );
        assert_eq!(Pillar::from_file_name("readme.csv"), None);
    }
}
