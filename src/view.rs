//! What the presentation layer consumes: a resolved selection, the filtered
//! dataset, and per-technique changes between the selection's boundary
//! years.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::dataset::Dataset;
use crate::domain::{Technique, YearRange};
use crate::error::TrendsError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub years: YearRange,
    /// Selected techniques in the order they were requested.
    pub techniques: Vec<Technique>,
}

#[derive(Debug, Clone)]
pub struct SelectionDefaults {
    pub from_year: i32,
    pub techniques: Vec<Technique>,
}

impl Selection {
    /// Fills unset bounds and techniques from `defaults` and clamps the
    /// years to what `dataset` covers. The default upper bound is the year
    /// before the latest one, which is usually still accumulating entries.
    pub fn resolve(
        dataset: &Dataset,
        from: Option<i32>,
        to: Option<i32>,
        techniques: &[Technique],
        defaults: &SelectionDefaults,
    ) -> Result<Self, TrendsError> {
        let (Some(min_year), Some(max_year)) = (dataset.min_year(), dataset.max_year()) else {
            return Err(TrendsError::EmptyResult);
        };

        let low = from.unwrap_or(defaults.from_year).clamp(min_year, max_year);
        let high = match to {
            Some(to) => to.clamp(min_year, max_year),
            None => (max_year - 1).max(low),
        };
        let years = YearRange::new(low, high)?;

        let available = dataset.techniques();
        let requested = if techniques.is_empty() {
            defaults.techniques.as_slice()
        } else {
            techniques
        };
        let mut selected = Vec::new();
        for technique in requested {
            if available.contains(technique) && !selected.contains(technique) {
                selected.push(*technique);
            }
        }

        Ok(Self {
            years,
            techniques: selected,
        })
    }

    pub fn technique_set(&self) -> BTreeSet<Technique> {
        self.techniques.iter().copied().collect()
    }
}

/// Change between the first and last year of a selection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Delta {
    /// The first year had no structures, so there is nothing to compare to.
    NotAvailable,
    Percent { value: f64 },
}

impl Delta {
    pub fn between(first_count: u64, last_count: u64) -> Self {
        if first_count == 0 {
            return Delta::NotAvailable;
        }
        let first = first_count as f64;
        Delta::Percent {
            value: (last_count as f64 - first) / first * 100.0,
        }
    }
}

impl fmt::Display for Delta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Delta::NotAvailable => write!(f, "n/a"),
            Delta::Percent { value } => write!(f, "{} %", format_grouped_f64(*value)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TechniqueDelta {
    pub technique: Technique,
    pub technique_full: &'static str,
    pub first_count: u64,
    pub last_count: u64,
    pub delta: Delta,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub selection: Selection,
    pub dataset: Dataset,
    pub deltas: Vec<TechniqueDelta>,
}

impl DashboardView {
    pub fn build(dataset: &Dataset, selection: Selection) -> Self {
        let filtered = dataset.filter(
            &selection.technique_set(),
            selection.years.low(),
            selection.years.high(),
        );
        let deltas = selection
            .techniques
            .iter()
            .map(|&technique| {
                let first_count = filtered.count(selection.years.low(), technique);
                let last_count = filtered.count(selection.years.high(), technique);
                TechniqueDelta {
                    technique,
                    technique_full: technique.display_name(),
                    first_count,
                    last_count,
                    delta: Delta::between(first_count, last_count),
                }
            })
            .collect();

        Self {
            selection,
            dataset: filtered,
            deltas,
        }
    }
}

/// `12345` → `"12,345"`.
pub fn format_grouped(value: u64) -> String {
    group_digits(&value.to_string())
}

fn format_grouped_f64(value: f64) -> String {
    let formatted = format!("{:.2}", value.abs());
    let (int_part, frac_part) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));
    let sign = if value < 0.0 && formatted != "0.00" { "-" } else { "" };
    format!("{sign}{}.{frac_part}", group_digits(int_part))
}

fn group_digits(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
