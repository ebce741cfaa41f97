use assert_matches::assert_matches;
use serde_json::Value;

use pdb_trends::dataset::{Dataset, Record};
use pdb_trends::domain::Technique;
use pdb_trends::error::TrendsError;
use pdb_trends::flatten::flatten_facets;

#[test]
fn single_bucket_end_to_end() {
    let raw: Value = serde_json::from_str(
        r#"{"facets":[{"buckets":[{"label":"2020","facets":[{"buckets":[{"label":"X-ray","population":150}]}]}]}]}"#,
    )
    .unwrap();
    let dataset = Dataset::from_records(flatten_facets(&raw).unwrap());

    assert_eq!(dataset.records(), &[Record::new(2020, Technique::XRay, 150)]);
    let row = serde_json::to_value(dataset.records()[0]).unwrap();
    assert_eq!(row["Year"], 2020);
    assert_eq!(row["Technique"], "X-ray");
    assert_eq!(row["Count"], 150);
}

#[test]
fn sparse_history() {
    let raw: Value = serde_json::from_str(
        r#"{"facets":[{"name":"Release Date","buckets":[
            {"label":"1985","population":0,"facets":[{"buckets":[]}]},
            {"label":"2015","population":120,"facets":[{"buckets":[{"label":"EM","population":120}]}]}
        ]}]}"#,
    )
    .unwrap();
    let records = flatten_facets(&raw).unwrap();
    assert_eq!(records, vec![Record::new(2015, Technique::Em, 120)]);
}

#[test]
fn label_of_wrong_type_is_malformed() {
    let raw: Value = serde_json::from_str(
        r#"{"facets":[{"buckets":[{"label":2020,"facets":[]}]}]}"#,
    )
    .unwrap();
    assert_matches!(flatten_facets(&raw), Err(TrendsError::MalformedResponse(_)));
}
