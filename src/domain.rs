use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::TrendsError;

/// Structure determination method as labelled by the RCSB search service.
///
/// Variants are declared in alphabetical order of their codes so that the
/// derived `Ord` matches the order a sorted list of codes would have.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum,
)]
pub enum Technique {
    #[serde(rename = "EM")]
    Em,
    #[serde(rename = "Multiple methods")]
    MultipleMethods,
    #[serde(rename = "NMR")]
    Nmr,
    #[serde(rename = "Neutron")]
    Neutron,
    #[serde(rename = "Other")]
    Other,
    #[serde(rename = "X-ray")]
    XRay,
}

impl Technique {
    /// Registry order, which is also the order techniques are fetched in.
    pub const ALL: [Technique; 6] = [
        Technique::Em,
        Technique::XRay,
        Technique::Nmr,
        Technique::Neutron,
        Technique::MultipleMethods,
        Technique::Other,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Technique::Em => "EM",
            Technique::XRay => "X-ray",
            Technique::Nmr => "NMR",
            Technique::Neutron => "Neutron",
            Technique::MultipleMethods => "Multiple methods",
            Technique::Other => "Other",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Technique::Em => "Electron Microscopy",
            Technique::XRay => "X-ray Crystallography",
            Technique::Nmr => "Nuclear Magnetic Resonance",
            Technique::Neutron => "Neutron Diffraction",
            Technique::MultipleMethods => "Multiple Methods",
            Technique::Other => "Other Techniques",
        }
    }

    /// Values of the `experimental_method` field in the PDBe Solr index that
    /// count towards this technique. Techniques without a matching index value
    /// fall back to their code, which the index never holds.
    pub fn pdbe_labels(self) -> &'static [&'static str] {
        match self {
            Technique::Em => &["Electron Microscopy"],
            Technique::XRay => &["X-ray diffraction"],
            Technique::Nmr => &["Solution NMR", "Solid-state NMR"],
            Technique::Neutron => &["Neutron Diffraction"],
            Technique::MultipleMethods => &["Multiple methods"],
            Technique::Other => &["Other"],
        }
    }

    /// Whether PDBe row counts for this technique are meaningful.
    pub fn has_pdbe_label(self) -> bool {
        !matches!(self, Technique::MultipleMethods | Technique::Other)
    }

    pub fn default_selection() -> Vec<Technique> {
        vec![Technique::XRay, Technique::Em, Technique::Nmr]
    }
}

impl fmt::Display for Technique {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Technique {
    type Err = TrendsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        Technique::ALL
            .into_iter()
            .find(|technique| technique.code().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| TrendsError::UnknownTechnique(value.to_string()))
    }
}

/// Inclusive range of release years. `low <= high` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct YearRange {
    low: i32,
    high: i32,
}

impl YearRange {
    pub fn new(low: i32, high: i32) -> Result<Self, TrendsError> {
        if low > high {
            return Err(TrendsError::InvalidYearRange { low, high });
        }
        Ok(Self { low, high })
    }

    pub fn low(&self) -> i32 {
        self.low
    }

    pub fn high(&self) -> i32 {
        self.high
    }

    pub fn contains(&self, year: i32) -> bool {
        (self.low..=self.high).contains(&year)
    }

    pub fn years(&self) -> RangeInclusive<i32> {
        self.low..=self.high
    }

    pub fn len(&self) -> usize {
        (self.high - self.low) as usize + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

impl fmt::Display for YearRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.low, self.high)
    }
}

/// Parses a bucket label such as `"2020"` into a year. Anything other than
/// plain ASCII digits is rejected.
pub fn parse_year(label: &str) -> Result<i32, TrendsError> {
    let trimmed = label.trim();
    if trimmed.is_empty() || !trimmed.chars().all(|ch| ch.is_ascii_digit()) {
        return Err(TrendsError::InvalidYearLabel(label.to_string()));
    }
    trimmed
        .parse()
        .map_err(|_| TrendsError::InvalidYearLabel(label.to_string()))
}
