use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use serde_json::Value;

use crate::config::HttpSettings;
use crate::error::TrendsError;
use crate::http::{build_client, send_with_retries};
use crate::query::SearchQuery;

pub const RCSB_SEARCH_URL: &str = "https://search.rcsb.org/rcsbsearch/v2/query";

pub trait RcsbSearchClient: Send + Sync {
    /// Runs a faceted search and returns the decoded body. A search with no
    /// hits yields an empty object.
    fn search(&self, query: &SearchQuery) -> Result<Value, TrendsError>;
}

#[derive(Clone)]
pub struct RcsbHttpClient {
    client: Client,
    base_url: String,
    max_retries: usize,
}

impl RcsbHttpClient {
    pub fn new(settings: &HttpSettings) -> Result<Self, TrendsError> {
        Self::with_base_url(settings, RCSB_SEARCH_URL)
    }

    pub fn with_base_url(settings: &HttpSettings, base_url: &str) -> Result<Self, TrendsError> {
        let client = build_client(settings, TrendsError::RcsbHttp)?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
            max_retries: settings.max_retries,
        })
    }

    fn handle_status(response: Response) -> Result<Option<Response>, TrendsError> {
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if response.status().is_success() {
            return Ok(Some(response));
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "RCSB search request failed".to_string());
        Err(TrendsError::RcsbStatus { status, message })
    }
}

impl RcsbSearchClient for RcsbHttpClient {
    fn search(&self, query: &SearchQuery) -> Result<Value, TrendsError> {
        let json = query.to_json()?;
        tracing::debug!(url = %self.base_url, query = %json, "RCSB search");
        let response = send_with_retries(
            || self.client.get(&self.base_url).query(&[("json", json.as_str())]),
            self.max_retries,
            TrendsError::RcsbHttp,
        )?;
        match Self::handle_status(response)? {
            Some(response) => response
                .json()
                .map_err(|err| TrendsError::MalformedResponse(err.to_string())),
            None => Ok(Value::Object(Default::default())),
        }
    }
}
