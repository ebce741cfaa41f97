use std::collections::HashMap;
use std::fs;
use std::sync::{Arc, Mutex};

use camino::{Utf8Path, Utf8PathBuf};

use crate::dataset::{Dataset, Record};
use crate::domain::{Technique, YearRange};
use crate::error::TrendsError;
use crate::store::Store;

const CSV_HEADER: [&str; 3] = ["Year", "Technique", "Count"];

/// Key of a memoized pipeline run: the techniques that were fetched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemoKey {
    techniques: Vec<Technique>,
}

impl MemoKey {
    pub fn new(techniques: &[Technique]) -> Self {
        let mut techniques = techniques.to_vec();
        techniques.sort();
        techniques.dedup();
        Self { techniques }
    }
}

/// Process-lifetime memo of fetched datasets. Entries are only dropped by
/// [`MemoCache::clear`].
#[derive(Debug, Default)]
pub struct MemoCache {
    entries: Mutex<HashMap<MemoKey, Arc<Dataset>>>,
}

impl MemoCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &MemoKey) -> Option<Arc<Dataset>> {
        self.lock().get(key).cloned()
    }

    /// Returns the memoized dataset for `key`, running `loader` on a miss.
    /// A failed load leaves the cache untouched.
    pub fn get_or_try_insert_with<F>(
        &self,
        key: MemoKey,
        loader: F,
    ) -> Result<Arc<Dataset>, TrendsError>
    where
        F: FnOnce() -> Result<Dataset, TrendsError>,
    {
        if let Some(hit) = self.get(&key) {
            tracing::debug!(?key, "memo cache hit");
            return Ok(hit);
        }
        let dataset = Arc::new(loader()?);
        self.lock().insert(key, Arc::clone(&dataset));
        Ok(dataset)
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<MemoKey, Arc<Dataset>>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Yearly counts persisted as `Year,Technique,Count` rows.
#[derive(Debug, Clone)]
pub struct CsvCache {
    path: Utf8PathBuf,
}

impl CsvCache {
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.as_std_path().exists()
    }

    /// Reads the table; a missing file is an empty dataset.
    pub fn load(&self) -> Result<Dataset, TrendsError> {
        if !self.exists() {
            return Ok(Dataset::default());
        }
        let content = fs::read_to_string(self.path.as_std_path())
            .map_err(|err| TrendsError::Filesystem(format!("read {}: {err}", self.path)))?;
        Ok(Dataset::from_records(parse_csv(&content)?))
    }

    pub fn save(&self, dataset: &Dataset) -> Result<(), TrendsError> {
        Store::write_bytes_atomic(&self.path, render_csv(dataset).as_bytes())
    }
}

/// (technique, year) pairs in `years` with no row in `dataset`, ordered by
/// year and then by the order of `techniques`.
pub fn missing_pairs(
    dataset: &Dataset,
    techniques: &[Technique],
    years: YearRange,
) -> Vec<(Technique, i32)> {
    years
        .years()
        .flat_map(|year| techniques.iter().map(move |technique| (*technique, year)))
        .filter(|(technique, year)| !dataset.contains(*year, *technique))
        .collect()
}

pub fn render_csv(dataset: &Dataset) -> String {
    let mut out = CSV_HEADER.join(",");
    out.push('\n');
    for record in dataset.records() {
        out.push_str(&format!(
            "{},{},{}\n",
            record.year,
            csv_escape(record.technique.code()),
            record.count
        ));
    }
    out
}

pub fn parse_csv(content: &str) -> Result<Vec<Record>, TrendsError> {
    let mut lines = content.lines().enumerate();

    match lines.next() {
        Some((_, header)) => {
            let fields = split_csv_line(header, 1)?;
            if fields.iter().map(|field| field.trim()).ne(CSV_HEADER) {
                return Err(TrendsError::CacheParse {
                    line: 1,
                    message: format!("expected header {}", CSV_HEADER.join(",")),
                });
            }
        }
        None => return Ok(Vec::new()),
    }

    let mut records = Vec::new();
    for (index, line) in lines {
        let line_no = index + 1;
        if line.trim().is_empty() {
            continue;
        }
        let fields = split_csv_line(line, line_no)?;
        let [year, technique, count] = fields.as_slice() else {
            return Err(TrendsError::CacheParse {
                line: line_no,
                message: format!("expected 3 fields, found {}", fields.len()),
            });
        };
        let year = year.trim().parse::<i32>().map_err(|err| TrendsError::CacheParse {
            line: line_no,
            message: format!("year: {err}"),
        })?;
        let technique = technique
            .parse::<Technique>()
            .map_err(|err| TrendsError::CacheParse {
                line: line_no,
                message: err.to_string(),
            })?;
        let count = count.trim().parse::<u64>().map_err(|err| TrendsError::CacheParse {
            line: line_no,
            message: format!("count: {err}"),
        })?;
        records.push(Record::new(year, technique, count));
    }
    Ok(records)
}

fn csv_escape(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn split_csv_line(line: &str, line_no: usize) -> Result<Vec<String>, TrendsError> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' if current.is_empty() => in_quotes = true,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    if in_quotes {
        return Err(TrendsError::CacheParse {
            line: line_no,
            message: "unterminated quoted field".to_string(),
        });
    }
    fields.push(current);
    Ok(fields)
}
