use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::cache::{CsvCache, MemoCache, MemoKey, missing_pairs};
use crate::dataset::{Dataset, Record};
use crate::domain::{Technique, YearRange};
use crate::error::TrendsError;
use crate::flatten::{flatten_facets, flatten_row};
use crate::pdbe::PdbeSearchClient;
use crate::query::{RowQuery, SearchQuery};
use crate::rcsb::RcsbSearchClient;

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// One slice of the pipeline that contributed nothing because its fetch or
/// its response failed.
#[derive(Debug, Clone, Serialize)]
pub struct FailedSlice {
    pub technique: Technique,
    pub year: Option<i32>,
    pub error: String,
    pub transient: bool,
}

impl FailedSlice {
    fn new(technique: Technique, year: Option<i32>, error: &TrendsError) -> Self {
        Self {
            technique,
            year,
            error: error.to_string(),
            transient: error.is_transient(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshResult {
    pub cache_path: String,
    pub years: YearRange,
    pub missing_pairs: usize,
    pub fetched_pairs: usize,
    pub failed: Vec<FailedSlice>,
    /// Years left out of the cache because at least one of their pairs
    /// failed; they are retried on the next refresh.
    pub incomplete_years: Vec<i32>,
    /// Techniques committed with counts PDBe cannot attribute to them; their
    /// cached rows read zero.
    pub unlabelled_techniques: Vec<Technique>,
    pub written: bool,
    pub rows: usize,
    #[serde(skip)]
    pub dataset: Dataset,
}

#[derive(Clone)]
pub struct App<R: RcsbSearchClient, P: PdbeSearchClient> {
    rcsb: R,
    pdbe: P,
}

impl<R: RcsbSearchClient, P: PdbeSearchClient> App<R, P> {
    pub fn new(rcsb: R, pdbe: P) -> Self {
        Self { rcsb, pdbe }
    }

    /// Fetches every technique from the RCSB search service once per
    /// process; later calls with the same techniques are served by `memo`.
    pub fn load_live(
        &self,
        memo: &MemoCache,
        techniques: &[Technique],
        sink: &dyn ProgressSink,
    ) -> Result<Arc<Dataset>, TrendsError> {
        memo.get_or_try_insert_with(MemoKey::new(techniques), || {
            let (dataset, _) = self.fetch_live(techniques, sink);
            if dataset.is_empty() {
                return Err(TrendsError::EmptyResult);
            }
            Ok(dataset)
        })
    }

    /// Runs one faceted search per technique without any caching. Failed
    /// techniques contribute nothing and are returned alongside the data.
    pub fn fetch_live(
        &self,
        techniques: &[Technique],
        sink: &dyn ProgressSink,
    ) -> (Dataset, Vec<FailedSlice>) {
        let started = Instant::now();
        let mut records = Vec::new();
        let mut failed = Vec::new();

        for &technique in techniques {
            sink.event(ProgressEvent {
                message: format!("phase=Fetch; technique {technique}"),
                elapsed: Some(started.elapsed()),
            });
            let query = SearchQuery::for_technique(technique, None);
            match self
                .rcsb
                .search(&query)
                .and_then(|raw| flatten_facets(&raw))
            {
                Ok(found) => {
                    tracing::debug!(%technique, records = found.len(), "flattened facets");
                    records.extend(found);
                }
                Err(err) => {
                    report_failure(sink, technique, None, &err);
                    failed.push(FailedSlice::new(technique, None, &err));
                }
            }
        }

        let dataset = Dataset::from_records(records);
        sink.event(ProgressEvent {
            message: format!(
                "phase=Done; {} records from {} techniques",
                dataset.len(),
                techniques.len() - failed.len()
            ),
            elapsed: Some(started.elapsed()),
        });
        (dataset, failed)
    }

    /// Loads the persisted table, fetches only the (technique, year) pairs it
    /// lacks from PDBe, and rewrites the file when anything was added.
    pub fn refresh_incremental(
        &self,
        cache: &CsvCache,
        techniques: &[Technique],
        years: YearRange,
        sink: &dyn ProgressSink,
    ) -> Result<RefreshResult, TrendsError> {
        let started = Instant::now();
        sink.event(ProgressEvent {
            message: format!("phase=Resolve; loading {}", cache.path()),
            elapsed: None,
        });
        let existing = cache.load()?;
        let missing = missing_pairs(&existing, techniques, years);

        if missing.is_empty() {
            tracing::info!(path = %cache.path(), rows = existing.len(), "cache is complete");
            if existing.is_empty() {
                return Err(TrendsError::EmptyResult);
            }
            return Ok(RefreshResult {
                cache_path: cache.path().to_string(),
                years,
                missing_pairs: 0,
                fetched_pairs: 0,
                failed: Vec::new(),
                incomplete_years: Vec::new(),
                unlabelled_techniques: Vec::new(),
                written: false,
                rows: existing.len(),
                dataset: existing,
            });
        }

        let mut fetched = BTreeMap::<i32, Vec<Record>>::new();
        let mut failed = Vec::new();
        for (index, &(technique, year)) in missing.iter().enumerate() {
            sink.event(ProgressEvent {
                message: format!(
                    "phase=Fetch; {technique} {year} ({}/{})",
                    index + 1,
                    missing.len()
                ),
                elapsed: Some(started.elapsed()),
            });
            let query = RowQuery::new(technique, year);
            match self
                .pdbe
                .count(&query)
                .and_then(|raw| flatten_row(&raw, technique, year))
            {
                Ok(record) => fetched.entry(year).or_default().push(record),
                Err(err) => {
                    report_failure(sink, technique, Some(year), &err);
                    failed.push(FailedSlice::new(technique, Some(year), &err));
                }
            }
        }

        let mut incomplete_years = failed
            .iter()
            .filter_map(|slice| slice.year)
            .collect::<Vec<_>>();
        incomplete_years.sort_unstable();
        incomplete_years.dedup();

        let committed = fetched
            .into_iter()
            .filter(|(year, _)| incomplete_years.binary_search(year).is_err())
            .flat_map(|(_, records)| records)
            .collect::<Vec<_>>();
        let fetched_pairs = committed.len();

        let mut unlabelled_techniques = committed
            .iter()
            .map(|record| record.technique)
            .filter(|technique| !technique.has_pdbe_label())
            .collect::<Vec<_>>();
        unlabelled_techniques.sort_unstable();
        unlabelled_techniques.dedup();
        for technique in &unlabelled_techniques {
            tracing::warn!(
                %technique,
                "PDBe has no method label for technique; caching its counts as zero"
            );
        }

        if !incomplete_years.is_empty() {
            tracing::warn!(
                years = ?incomplete_years,
                "leaving incomplete years out of the cache"
            );
        }

        let dataset = existing.merged_with(committed);
        let written = fetched_pairs > 0;
        if written {
            cache.save(&dataset)?;
            tracing::info!(
                path = %cache.path(),
                added = fetched_pairs,
                rows = dataset.len(),
                "cache updated"
            );
        }

        if dataset.is_empty() {
            return Err(TrendsError::EmptyResult);
        }

        sink.event(ProgressEvent {
            message: format!(
                "phase=Done; {fetched_pairs} of {} missing pairs added",
                missing.len()
            ),
            elapsed: Some(started.elapsed()),
        });

        Ok(RefreshResult {
            cache_path: cache.path().to_string(),
            years,
            missing_pairs: missing.len(),
            fetched_pairs,
            failed,
            incomplete_years,
            unlabelled_techniques,
            written,
            rows: dataset.len(),
            dataset,
        })
    }
}

fn report_failure(
    sink: &dyn ProgressSink,
    technique: Technique,
    year: Option<i32>,
    err: &TrendsError,
) {
    let slice = match year {
        Some(year) => format!("{technique} {year}"),
        None => technique.to_string(),
    };
    tracing::warn!(%technique, ?year, error = %err, "no data for slice");
    sink.event(ProgressEvent {
        message: format!("phase=Fetch; failed to fetch data for {slice}: {err}"),
        elapsed: None,
    });
}
