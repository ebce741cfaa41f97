use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::domain::{Technique, YearRange};
use crate::error::TrendsError;

pub const DEFAULT_CONFIG_FILE: &str = "pdb-trends.json";
/// First year with released PDB entries.
pub const DEFAULT_MIN_YEAR: i32 = 1976;
pub const DEFAULT_FROM_YEAR: i32 = 2000;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub techniques: Option<Vec<String>>,
    #[serde(default)]
    pub min_year: Option<i32>,
    #[serde(default)]
    pub max_year: Option<i32>,
    #[serde(default)]
    pub cache_file: Option<String>,
    #[serde(default)]
    pub selection: Option<SelectionEntry>,
    #[serde(default)]
    pub http: Option<HttpEntry>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct SelectionEntry {
    #[serde(default)]
    pub from_year: Option<i32>,
    #[serde(default)]
    pub techniques: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct HttpEntry {
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub max_retries: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub max_retries: usize,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    /// Techniques to fetch, in registry order.
    pub techniques: Vec<Technique>,
    /// Years the durable cache is expected to cover.
    pub years: YearRange,
    pub cache_file: Option<Utf8PathBuf>,
    pub default_from_year: i32,
    pub default_techniques: Vec<Technique>,
    pub http: HttpSettings,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads the config at `path`, or `pdb-trends.json` in the current
    /// directory when it exists. Without either, built-in defaults apply.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, TrendsError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| TrendsError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| TrendsError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, TrendsError> {
        let schema_version = config.schema_version.unwrap_or(1);

        let techniques = match config.techniques {
            Some(codes) => registry_order(parse_techniques(&codes)?),
            None => Technique::ALL.to_vec(),
        };

        let min_year = config.min_year.unwrap_or(DEFAULT_MIN_YEAR);
        let max_year = config.max_year.unwrap_or_else(current_year);
        let years = YearRange::new(min_year, max_year)?;

        let selection = config.selection.unwrap_or_default();
        let default_techniques = match selection.techniques {
            Some(codes) => parse_techniques(&codes)?,
            None => Technique::default_selection(),
        };

        let http = config.http.unwrap_or_default();
        let defaults = HttpSettings::default();

        Ok(ResolvedConfig {
            schema_version,
            techniques,
            years,
            cache_file: config.cache_file.map(Utf8PathBuf::from),
            default_from_year: selection.from_year.unwrap_or(DEFAULT_FROM_YEAR),
            default_techniques,
            http: HttpSettings {
                timeout_secs: http.timeout_secs.unwrap_or(defaults.timeout_secs),
                max_retries: http.max_retries.unwrap_or(defaults.max_retries),
            },
        })
    }
}

pub fn current_year() -> i32 {
    chrono::Local::now().year()
}

fn parse_techniques(codes: &[String]) -> Result<Vec<Technique>, TrendsError> {
    let mut techniques = Vec::new();
    for code in codes {
        let technique: Technique = code.parse()?;
        if !techniques.contains(&technique) {
            techniques.push(technique);
        }
    }
    Ok(techniques)
}

fn registry_order(techniques: Vec<Technique>) -> Vec<Technique> {
    Technique::ALL
        .into_iter()
        .filter(|technique| techniques.contains(technique))
        .collect()
}
