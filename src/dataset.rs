use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::domain::Technique;

/// Number of structures released in one year with one technique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "RecordRow")]
pub struct Record {
    pub year: i32,
    pub technique: Technique,
    pub count: u64,
}

impl Record {
    pub fn new(year: i32, technique: Technique, count: u64) -> Self {
        Self {
            year,
            technique,
            count,
        }
    }

    pub fn technique_full(&self) -> &'static str {
        self.technique.display_name()
    }
}

#[derive(Serialize)]
struct RecordRow {
    #[serde(rename = "Year")]
    year: i32,
    #[serde(rename = "Technique")]
    technique: &'static str,
    #[serde(rename = "TechniqueFull")]
    technique_full: &'static str,
    #[serde(rename = "Count")]
    count: u64,
}

impl From<Record> for RecordRow {
    fn from(record: Record) -> Self {
        Self {
            year: record.year,
            technique: record.technique.code(),
            technique_full: record.technique_full(),
            count: record.count,
        }
    }
}

/// Yearly counts, at most one record per (year, technique), sorted by year
/// then technique.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Dataset {
    records: Vec<Record>,
    min_year: Option<i32>,
    max_year: Option<i32>,
}

impl Dataset {
    /// Builds a dataset, summing the counts of duplicate (year, technique)
    /// pairs.
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = Record>,
    {
        let mut totals = BTreeMap::<(i32, Technique), u64>::new();
        for record in records {
            *totals.entry((record.year, record.technique)).or_insert(0) += record.count;
        }

        let records = totals
            .into_iter()
            .map(|((year, technique), count)| Record::new(year, technique, count))
            .collect::<Vec<_>>();
        let min_year = records.first().map(|record| record.year);
        let max_year = records.last().map(|record| record.year);

        Self {
            records,
            min_year,
            max_year,
        }
    }

    pub fn merged_with<I>(&self, records: I) -> Self
    where
        I: IntoIterator<Item = Record>,
    {
        Self::from_records(self.records.iter().copied().chain(records))
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn min_year(&self) -> Option<i32> {
        self.min_year
    }

    pub fn max_year(&self) -> Option<i32> {
        self.max_year
    }

    pub fn techniques(&self) -> Vec<Technique> {
        self.records
            .iter()
            .map(|record| record.technique)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn years(&self) -> BTreeSet<i32> {
        self.records.iter().map(|record| record.year).collect()
    }

    pub fn contains(&self, year: i32, technique: Technique) -> bool {
        self.find(year, technique).is_some()
    }

    /// Count for one slice; zero when the slice is absent.
    pub fn count(&self, year: i32, technique: Technique) -> u64 {
        self.find(year, technique)
            .map(|record| record.count)
            .unwrap_or(0)
    }

    pub fn filter(&self, techniques: &BTreeSet<Technique>, low: i32, high: i32) -> Dataset {
        Self::from_records(
            self.records
                .iter()
                .filter(|record| {
                    techniques.contains(&record.technique)
                        && record.year >= low
                        && record.year <= high
                })
                .copied(),
        )
    }

    fn find(&self, year: i32, technique: Technique) -> Option<&Record> {
        self.records
            .binary_search_by(|record| (record.year, record.technique).cmp(&(year, technique)))
            .ok()
            .map(|index| &self.records[index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        Dataset::from_records([
            Record::new(2021, Technique::XRay, 9000),
            Record::new(2020, Technique::Em, 1500),
            Record::new(2020, Technique::XRay, 10000),
            Record::new(2021, Technique::Em, 2500),
            Record::new(2019, Technique::Nmr, 400),
        ])
    }

    #[test]
    fn sorted_with_bounds() {
        let dataset = sample();
        assert_eq!(dataset.min_year(), Some(2019));
        assert_eq!(dataset.max_year(), Some(2021));
        assert_eq!(dataset.records()[0], Record::new(2019, Technique::Nmr, 400));
        assert_eq!(
            dataset.techniques(),
            vec![Technique::Em, Technique::Nmr, Technique::XRay]
        );
    }

    #[test]
    fn duplicates_are_summed() {
        let dataset = Dataset::from_records([
            Record::new(2020, Technique::Em, 10),
            Record::new(2020, Technique::Em, 5),
        ]);
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.count(2020, Technique::Em), 15);
    }

    #[test]
    fn empty_dataset_has_no_bounds() {
        let dataset = Dataset::default();
        assert!(dataset.is_empty());
        assert_eq!(dataset.min_year(), None);
        assert_eq!(dataset.max_year(), None);
    }

    #[test]
    fn filter_is_inclusive_and_pure() {
        let dataset = sample();
        let selected = BTreeSet::from([Technique::Em]);
        let filtered = dataset.filter(&selected, 2020, 2021);
        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered.min_year(), Some(2020));
        assert_eq!(dataset.len(), 5);
    }

    #[test]
    fn merge_recomputes_bounds() {
        let merged = sample().merged_with([Record::new(2022, Technique::Neutron, 3)]);
        assert_eq!(merged.max_year(), Some(2022));
        assert_eq!(merged.count(2022, Technique::Neutron), 3);
    }

    #[test]
    fn record_serializes_with_display_name() {
        let value = serde_json::to_value(Record::new(2020, Technique::XRay, 150)).unwrap();
        assert_eq!(value["Year"], 2020);
        assert_eq!(value["Technique"], "X-ray");
        assert_eq!(value["TechniqueFull"], "X-ray Crystallography");
        assert_eq!(value["Count"], 150);
    }
}
