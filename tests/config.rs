use assert_matches::assert_matches;

use pdb_trends::config::{ConfigLoader, HttpSettings};
use pdb_trends::domain::Technique;
use pdb_trends::error::TrendsError;

#[test]
fn load_config_file() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("pdb-trends.json");
    std::fs::write(
        &path,
        r#"{
            "schema_version": 1,
            "techniques": ["X-ray", "EM", "NMR"],
            "min_year": 1990,
            "max_year": 2024,
            "cache_file": "counts.csv",
            "selection": {"from_year": 2010, "techniques": ["EM"]},
            "http": {"timeout_secs": 5}
        }"#,
    )
    .unwrap();

    let resolved = ConfigLoader::resolve(path.to_str()).unwrap();
    assert_eq!(
        resolved.techniques,
        vec![Technique::Em, Technique::XRay, Technique::Nmr]
    );
    assert_eq!((resolved.years.low(), resolved.years.high()), (1990, 2024));
    assert_eq!(resolved.cache_file.as_deref().map(|p| p.as_str()), Some("counts.csv"));
    assert_eq!(resolved.default_from_year, 2010);
    assert_eq!(resolved.default_techniques, vec![Technique::Em]);
    assert_eq!(
        resolved.http,
        HttpSettings {
            timeout_secs: 5,
            max_retries: 3
        }
    );
}

#[test]
fn explicit_missing_file_is_an_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("absent.json");
    assert_matches!(
        ConfigLoader::resolve(path.to_str()),
        Err(TrendsError::ConfigRead(_))
    );
}

#[test]
fn inverted_year_range_rejected() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("pdb-trends.json");
    std::fs::write(&path, r#"{"min_year": 2020, "max_year": 2000}"#).unwrap();
    assert_matches!(
        ConfigLoader::resolve(path.to_str()),
        Err(TrendsError::InvalidYearRange {
            low: 2020,
            high: 2000
        })
    );
}

#[test]
fn invalid_json_rejected() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("pdb-trends.json");
    std::fs::write(&path, "{ techniques: ").unwrap();
    assert_matches!(
        ConfigLoader::resolve(path.to_str()),
        Err(TrendsError::ConfigParse(_))
    );
}
