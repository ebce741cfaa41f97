use reqwest::blocking::{Client, Response};
use serde_json::Value;

use crate::config::HttpSettings;
use crate::error::TrendsError;
use crate::http::{build_client, send_with_retries};
use crate::query::RowQuery;

pub const PDBE_SEARCH_URL: &str = "https://www.ebi.ac.uk/pdbe/search/pdb/select";

pub trait PdbeSearchClient: Send + Sync {
    fn count(&self, query: &RowQuery) -> Result<Value, TrendsError>;
}

#[derive(Clone)]
pub struct PdbeHttpClient {
    client: Client,
    base_url: String,
    max_retries: usize,
}

impl PdbeHttpClient {
    pub fn new(settings: &HttpSettings) -> Result<Self, TrendsError> {
        Self::with_base_url(settings, PDBE_SEARCH_URL)
    }

    pub fn with_base_url(settings: &HttpSettings, base_url: &str) -> Result<Self, TrendsError> {
        let client = build_client(settings, TrendsError::PdbeHttp)?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
            max_retries: settings.max_retries,
        })
    }

    fn handle_status(response: Response) -> Result<Response, TrendsError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "PDBe search request failed".to_string());
        Err(TrendsError::PdbeStatus { status, message })
    }
}

impl PdbeSearchClient for PdbeHttpClient {
    fn count(&self, query: &RowQuery) -> Result<Value, TrendsError> {
        let params = query.params();
        tracing::debug!(url = %self.base_url, q = %query.q(), "PDBe search");
        let response = send_with_retries(
            || self.client.get(&self.base_url).query(&params),
            self.max_retries,
            TrendsError::PdbeHttp,
        )?;
        Self::handle_status(response)?
            .json()
            .map_err(|err| TrendsError::MalformedResponse(err.to_string()))
    }
}
