//! Turns search responses into [`Record`]s.
//!
//! Sparse history is normal (no EM entries before the 1990s, for instance),
//! so absent facets or empty bucket lists yield no records. A response whose
//! shape is wrong is rejected as a whole; a single bucket with a bad year
//! label or a technique outside the registry is logged and skipped.

use serde::Deserialize;
use serde_json::Value;

use crate::dataset::Record;
use crate::domain::{Technique, parse_year};
use crate::error::TrendsError;

#[derive(Debug, Deserialize)]
struct FacetResponse {
    #[serde(default)]
    facets: Vec<YearFacet>,
}

#[derive(Debug, Deserialize)]
struct YearFacet {
    #[serde(default)]
    buckets: Vec<YearBucket>,
}

#[derive(Debug, Deserialize)]
struct YearBucket {
    label: String,
    #[serde(default)]
    facets: Vec<TechniqueFacet>,
}

#[derive(Debug, Deserialize)]
struct TechniqueFacet {
    #[serde(default)]
    buckets: Vec<TechniqueBucket>,
}

#[derive(Debug, Deserialize)]
struct TechniqueBucket {
    label: String,
    population: u64,
}

#[derive(Debug, Deserialize)]
struct RowResponse {
    response: RowBody,
}

#[derive(Debug, Deserialize)]
struct RowBody {
    #[serde(rename = "numFound")]
    num_found: u64,
}

/// Flattens a faceted RCSB response (year buckets holding technique
/// buckets). Only the first top-level facet is read.
pub fn flatten_facets(raw: &Value) -> Result<Vec<Record>, TrendsError> {
    if raw.is_null() {
        return Ok(Vec::new());
    }
    let response = FacetResponse::deserialize(raw)
        .map_err(|err| TrendsError::MalformedResponse(err.to_string()))?;

    let Some(year_facet) = response.facets.first() else {
        return Ok(Vec::new());
    };

    let mut records = Vec::new();
    for year_bucket in &year_facet.buckets {
        let year = match parse_year(&year_bucket.label) {
            Ok(year) => year,
            Err(err) => {
                skip_bucket(&err);
                continue;
            }
        };
        let Some(technique_facet) = year_bucket.facets.first() else {
            continue;
        };
        for bucket in &technique_facet.buckets {
            match bucket.label.parse::<Technique>() {
                Ok(technique) => records.push(Record::new(year, technique, bucket.population)),
                Err(err) => skip_bucket(&err),
            }
        }
    }
    Ok(records)
}

fn skip_bucket(err: &TrendsError) {
    tracing::warn!(error = %err, "skipping facet bucket");
}

/// Reads the row count of a PDBe Solr response as the record for the
/// queried (technique, year) pair.
pub fn flatten_row(raw: &Value, technique: Technique, year: i32) -> Result<Record, TrendsError> {
    let response = RowResponse::deserialize(raw)
        .map_err(|err| TrendsError::MalformedResponse(err.to_string()))?;
    Ok(Record::new(year, technique, response.response.num_found))
}
