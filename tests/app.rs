use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use serde_json::{Value, json};

use pdb_trends::app::{App, ProgressEvent, ProgressSink};
use pdb_trends::cache::{CsvCache, MemoCache};
use pdb_trends::dataset::{Dataset, Record};
use pdb_trends::domain::{Technique, YearRange};
use pdb_trends::error::TrendsError;
use pdb_trends::pdbe::PdbeSearchClient;
use pdb_trends::query::{QueryNode, RowQuery, SearchQuery, TerminalValue};
use pdb_trends::rcsb::RcsbSearchClient;

struct NoopSink;

impl ProgressSink for NoopSink {
    fn event(&self, _event: ProgressEvent) {}
}

#[derive(Default)]
struct RecordingSink {
    messages: Mutex<Vec<String>>,
}

impl ProgressSink for RecordingSink {
    fn event(&self, event: ProgressEvent) {
        self.messages.lock().unwrap().push(event.message);
    }
}

#[derive(Default)]
struct MockRcsb {
    responses: HashMap<String, Value>,
    failing: Vec<String>,
    calls: Arc<Mutex<usize>>,
}

impl MockRcsb {
    fn with_response(mut self, code: &str, response: Value) -> Self {
        self.responses.insert(code.to_string(), response);
        self
    }

    fn with_failure(mut self, code: &str) -> Self {
        self.failing.push(code.to_string());
        self
    }

    fn call_counter(&self) -> Arc<Mutex<usize>> {
        Arc::clone(&self.calls)
    }
}

fn technique_code(query: &SearchQuery) -> String {
    let QueryNode::Group { nodes, .. } = &query.query else {
        panic!("expected group node");
    };
    let Some(QueryNode::Terminal { parameters, .. }) = nodes.first() else {
        panic!("expected terminal node");
    };
    let TerminalValue::Text(code) = &parameters.value else {
        panic!("expected text value");
    };
    code.clone()
}

impl RcsbSearchClient for MockRcsb {
    fn search(&self, query: &SearchQuery) -> Result<Value, TrendsError> {
        *self.calls.lock().unwrap() += 1;
        let code = technique_code(query);
        if self.failing.contains(&code) {
            return Err(TrendsError::RcsbStatus {
                status: 500,
                message: "boom".to_string(),
            });
        }
        Ok(self.responses.get(&code).cloned().unwrap_or_else(|| json!({})))
    }
}

#[derive(Default)]
struct MockPdbe {
    counts: HashMap<(Technique, i32), u64>,
    failing: Vec<(Technique, i32)>,
    calls: Arc<Mutex<Vec<(Technique, i32)>>>,
}

impl MockPdbe {
    fn call_log(&self) -> Arc<Mutex<Vec<(Technique, i32)>>> {
        Arc::clone(&self.calls)
    }
}

impl PdbeSearchClient for MockPdbe {
    fn count(&self, query: &RowQuery) -> Result<Value, TrendsError> {
        let key = (query.technique, query.year);
        self.calls.lock().unwrap().push(key);
        if self.failing.contains(&key) {
            return Err(TrendsError::PdbeHttp("connection reset".to_string()));
        }
        let found = self.counts.get(&key).copied().unwrap_or(0);
        Ok(json!({"responseHeader": {"status": 0}, "response": {"numFound": found, "docs": []}}))
    }
}

fn facets(year_counts: &[(&str, &str, u64)]) -> Value {
    let buckets = year_counts
        .iter()
        .map(|(year, technique, population)| {
            json!({
                "label": year,
                "population": population,
                "facets": [{"name": "Experimental Method", "buckets": [
                    {"label": technique, "population": population}
                ]}]
            })
        })
        .collect::<Vec<_>>();
    json!({"query_id": "q", "result_type": "entry", "total_count": 0,
           "facets": [{"name": "Release Date", "buckets": buckets}]})
}

fn temp_cache(temp: &tempfile::TempDir) -> CsvCache {
    CsvCache::new(Utf8PathBuf::from_path_buf(temp.path().join("pdb_counts.csv")).unwrap())
}

#[test]
fn live_pipeline_is_memoized() {
    let rcsb = MockRcsb::default()
        .with_response("X-ray", facets(&[("2019", "X-ray", 9000), ("2020", "X-ray", 10000)]))
        .with_response("EM", facets(&[("2020", "EM", 1500)]));
    let app = App::new(rcsb, MockPdbe::default());
    let memo = MemoCache::new();

    let first = app.load_live(&memo, &Technique::ALL, &NoopSink).unwrap();
    let second = app.load_live(&memo, &Technique::ALL, &NoopSink).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.len(), 3);
    assert_eq!(first.min_year(), Some(2019));
    assert_eq!(first.max_year(), Some(2020));
    assert_eq!(first.count(2020, Technique::Em), 1500);
}

#[test]
fn live_pipeline_fetches_each_technique_once() {
    let rcsb = MockRcsb::default().with_response("NMR", facets(&[("1995", "NMR", 300)]));
    let calls = rcsb.call_counter();
    let app = App::new(rcsb, MockPdbe::default());
    let memo = MemoCache::new();

    app.load_live(&memo, &Technique::ALL, &NoopSink).unwrap();
    app.load_live(&memo, &Technique::ALL, &NoopSink).unwrap();

    assert_eq!(*calls.lock().unwrap(), Technique::ALL.len());
}

#[test]
fn live_failures_are_isolated() {
    let rcsb = MockRcsb::default()
        .with_response("X-ray", facets(&[("2020", "X-ray", 10000)]))
        .with_response("NMR", json!({"facets": "not-a-list"}))
        .with_failure("EM");
    let app = App::new(rcsb, MockPdbe::default());
    let sink = RecordingSink::default();

    let (dataset, failed) = app.fetch_live(&Technique::ALL, &sink);

    assert_eq!(dataset.records(), &[Record::new(2020, Technique::XRay, 10000)]);
    let failed_techniques = failed.iter().map(|slice| slice.technique).collect::<Vec<_>>();
    assert_eq!(failed_techniques, vec![Technique::Em, Technique::Nmr]);
    assert!(failed[0].transient);
    assert!(!failed[1].transient);
    let messages = sink.messages.lock().unwrap();
    assert!(
        messages
            .iter()
            .any(|message| message.contains("failed to fetch data for EM"))
    );
}

#[test]
fn live_bad_bucket_keeps_sibling_years() {
    let rcsb = MockRcsb::default().with_response(
        "EM",
        facets(&[("2019", "EM", 900), ("2020", "EM", 1500), ("bogus", "EM", 3)]),
    );
    let app = App::new(rcsb, MockPdbe::default());

    let (dataset, failed) = app.fetch_live(&[Technique::Em], &NoopSink);

    assert!(failed.is_empty());
    assert_eq!(
        dataset.records(),
        &[
            Record::new(2019, Technique::Em, 900),
            Record::new(2020, Technique::Em, 1500)
        ]
    );
}

#[test]
fn live_total_failure_is_no_data() {
    let rcsb = MockRcsb::default().with_failure("X-ray").with_failure("EM");
    let app = App::new(rcsb, MockPdbe::default());
    let memo = MemoCache::new();

    let err = app
        .load_live(&memo, &[Technique::XRay, Technique::Em], &NoopSink)
        .unwrap_err();
    assert_matches!(err, TrendsError::EmptyResult);
    assert!(memo.is_empty());
}

#[test]
fn memo_is_keyed_by_technique_set() {
    let rcsb = MockRcsb::default()
        .with_response("EM", facets(&[("2021", "EM", 2500)]))
        .with_response("X-ray", facets(&[("2021", "X-ray", 9000)]));
    let calls = rcsb.call_counter();
    let memo = MemoCache::new();
    let app = App::new(rcsb, MockPdbe::default());

    app.load_live(&memo, &[Technique::Em], &NoopSink).unwrap();
    app.load_live(&memo, &[Technique::Em, Technique::Em], &NoopSink)
        .unwrap();
    assert_eq!(*calls.lock().unwrap(), 1);

    let both = app
        .load_live(&memo, &[Technique::XRay, Technique::Em], &NoopSink)
        .unwrap();
    assert_eq!(*calls.lock().unwrap(), 3);
    assert_eq!(both.len(), 2);
    assert_eq!(memo.len(), 2);

    memo.clear();
    app.load_live(&memo, &[Technique::Em], &NoopSink).unwrap();
    assert_eq!(*calls.lock().unwrap(), 4);
}

#[test]
fn refresh_fills_missing_years() {
    let temp = tempfile::tempdir().unwrap();
    let cache = temp_cache(&temp);
    let techniques = [Technique::XRay, Technique::Em];
    cache
        .save(&Dataset::from_records([
            Record::new(2020, Technique::XRay, 10000),
            Record::new(2020, Technique::Em, 1500),
        ]))
        .unwrap();

    let mut pdbe = MockPdbe::default();
    pdbe.counts.insert((Technique::XRay, 2021), 9500);
    let calls = pdbe.call_log();
    let app = App::new(MockRcsb::default(), pdbe);

    let years = YearRange::new(2020, 2021).unwrap();
    let result = app
        .refresh_incremental(&cache, &techniques, years, &NoopSink)
        .unwrap();

    assert!(result.written);
    assert_eq!(result.missing_pairs, 2);
    assert_eq!(result.fetched_pairs, 2);
    assert_eq!(
        *calls.lock().unwrap(),
        vec![(Technique::XRay, 2021), (Technique::Em, 2021)]
    );
    let reloaded = cache.load().unwrap();
    let rows_2021 = reloaded
        .records()
        .iter()
        .filter(|record| record.year == 2021)
        .collect::<Vec<_>>();
    assert_eq!(rows_2021.len(), techniques.len());
    assert_eq!(reloaded.count(2021, Technique::XRay), 9500);
    assert!(reloaded.contains(2021, Technique::Em));
    assert_eq!(reloaded.count(2021, Technique::Em), 0);
    assert_eq!(reloaded.count(2020, Technique::XRay), 10000);
}

#[test]
fn refresh_is_noop_when_complete() {
    let temp = tempfile::tempdir().unwrap();
    let cache = temp_cache(&temp);
    cache
        .save(&Dataset::from_records([
            Record::new(2022, Technique::Nmr, 300),
            Record::new(2023, Technique::Nmr, 280),
        ]))
        .unwrap();
    let before = std::fs::read(cache.path().as_std_path()).unwrap();

    let pdbe = MockPdbe::default();
    let calls = pdbe.call_log();
    let app = App::new(MockRcsb::default(), pdbe);
    let years = YearRange::new(2022, 2023).unwrap();
    let result = app
        .refresh_incremental(&cache, &[Technique::Nmr], years, &NoopSink)
        .unwrap();

    assert!(!result.written);
    assert_eq!(result.missing_pairs, 0);
    assert!(calls.lock().unwrap().is_empty());
    assert_eq!(result.dataset.len(), 2);
    assert_eq!(std::fs::read(cache.path().as_std_path()).unwrap(), before);
}

#[test]
fn refresh_keeps_incomplete_years_out() {
    let temp = tempfile::tempdir().unwrap();
    let cache = temp_cache(&temp);
    let techniques = [Technique::XRay, Technique::Em];

    let mut pdbe = MockPdbe::default();
    pdbe.counts.insert((Technique::XRay, 2000), 2500);
    pdbe.counts.insert((Technique::XRay, 2001), 2700);
    pdbe.failing.push((Technique::Em, 2001));
    let app = App::new(MockRcsb::default(), pdbe);
    let years = YearRange::new(2000, 2001).unwrap();

    let result = app
        .refresh_incremental(&cache, &techniques, years, &NoopSink)
        .unwrap();
    assert_eq!(result.incomplete_years, vec![2001]);
    assert_eq!(result.fetched_pairs, 2);
    assert_eq!(result.failed.len(), 1);

    let persisted = cache.load().unwrap();
    assert_eq!(persisted.years().into_iter().collect::<Vec<_>>(), vec![2000]);

    let pdbe = MockPdbe::default();
    let calls = pdbe.call_log();
    let retry = App::new(MockRcsb::default(), pdbe);
    let result = retry
        .refresh_incremental(&cache, &techniques, years, &NoopSink)
        .unwrap();
    assert_eq!(result.missing_pairs, 2);
    assert!(result.incomplete_years.is_empty());
    assert_eq!(
        *calls.lock().unwrap(),
        vec![(Technique::XRay, 2001), (Technique::Em, 2001)]
    );
    assert_eq!(cache.load().unwrap().len(), 4);
}

#[test]
fn refresh_only_requests_gaps() {
    let temp = tempfile::tempdir().unwrap();
    let cache = temp_cache(&temp);
    cache
        .save(&Dataset::from_records([
            Record::new(1999, Technique::XRay, 1900),
            Record::new(2000, Technique::XRay, 2500),
            Record::new(2000, Technique::Em, 20),
        ]))
        .unwrap();

    let pdbe = MockPdbe::default();
    let calls = pdbe.call_log();
    let app = App::new(MockRcsb::default(), pdbe);
    let years = YearRange::new(1999, 2000).unwrap();
    app.refresh_incremental(&cache, &[Technique::XRay, Technique::Em], years, &NoopSink)
        .unwrap();

    assert_eq!(*calls.lock().unwrap(), vec![(Technique::Em, 1999)]);
    let reloaded = cache.load().unwrap();
    assert_eq!(reloaded.len(), 4);
    assert_eq!(reloaded.count(1999, Technique::XRay), 1900);
}

#[test]
fn refresh_never_drops_existing_years() {
    let temp = tempfile::tempdir().unwrap();
    let cache = temp_cache(&temp);
    cache
        .save(&Dataset::from_records([Record::new(1980, Technique::XRay, 50)]))
        .unwrap();

    let app = App::new(MockRcsb::default(), MockPdbe::default());
    let years = YearRange::new(2010, 2010).unwrap();
    let result = app
        .refresh_incremental(&cache, &[Technique::XRay], years, &NoopSink)
        .unwrap();

    assert!(result.written);
    let reloaded = cache.load().unwrap();
    assert!(reloaded.contains(1980, Technique::XRay));
    assert!(reloaded.contains(2010, Technique::XRay));
}

#[test]
fn refresh_with_nothing_fetched_is_no_data() {
    let temp = tempfile::tempdir().unwrap();
    let cache = temp_cache(&temp);
    let mut pdbe = MockPdbe::default();
    pdbe.failing.push((Technique::Neutron, 2015));
    let app = App::new(MockRcsb::default(), pdbe);
    let years = YearRange::new(2015, 2015).unwrap();

    let err = app
        .refresh_incremental(&cache, &[Technique::Neutron], years, &NoopSink)
        .unwrap_err();
    assert_matches!(err, TrendsError::EmptyResult);
    assert!(!cache.exists());
}

#[test]
fn refresh_flags_techniques_without_pdbe_label() {
    let temp = tempfile::tempdir().unwrap();
    let cache = temp_cache(&temp);
    let mut pdbe = MockPdbe::default();
    pdbe.counts.insert((Technique::XRay, 2018), 11000);
    let app = App::new(MockRcsb::default(), pdbe);
    let years = YearRange::new(2018, 2018).unwrap();

    let result = app
        .refresh_incremental(
            &cache,
            &[Technique::XRay, Technique::MultipleMethods, Technique::Other],
            years,
            &NoopSink,
        )
        .unwrap();

    assert_eq!(
        result.unlabelled_techniques,
        vec![Technique::MultipleMethods, Technique::Other]
    );
    assert_eq!(result.dataset.count(2018, Technique::Other), 0);
    assert!(result.written);
}
