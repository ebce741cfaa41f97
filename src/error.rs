use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum TrendsError {
    #[error("unknown experimental technique: {0}")]
    UnknownTechnique(String),

    #[error("invalid year label: {0}")]
    InvalidYearLabel(String),

    #[error("invalid year range: {low}..={high}")]
    InvalidYearRange { low: i32, high: i32 },

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("failed to encode search query: {0}")]
    QueryEncode(String),

    #[error("RCSB search request failed: {0}")]
    RcsbHttp(String),

    #[error("RCSB search returned status {status}: {message}")]
    RcsbStatus { status: u16, message: String },

    #[error("PDBe search request failed: {0}")]
    PdbeHttp(String),

    #[error("PDBe search returned status {status}: {message}")]
    PdbeStatus { status: u16, message: String },

    #[error("malformed search response: {0}")]
    MalformedResponse(String),

    #[error("no data available")]
    #[diagnostic(help("every remote fetch failed or returned nothing; try again later"))]
    EmptyResult,

    #[error("malformed cache file at line {line}: {message}")]
    CacheParse { line: usize, message: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl TrendsError {
    /// Failures worth retrying later: transport errors, throttling and
    /// server-side statuses. Everything else will fail the same way again.
    pub fn is_transient(&self) -> bool {
        match self {
            TrendsError::RcsbHttp(_) | TrendsError::PdbeHttp(_) => true,
            TrendsError::RcsbStatus { status, .. } | TrendsError::PdbeStatus { status, .. } => {
                is_retryable_status(*status)
            }
            _ => false,
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            TrendsError::RcsbHttp(_)
                | TrendsError::RcsbStatus { .. }
                | TrendsError::PdbeHttp(_)
                | TrendsError::PdbeStatus { .. }
        )
    }
}

pub(crate) fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(TrendsError::RcsbHttp("timed out".to_string()).is_transient());
        assert!(
            TrendsError::PdbeStatus {
                status: 503,
                message: String::new()
            }
            .is_transient()
        );
        assert!(
            !TrendsError::RcsbStatus {
                status: 400,
                message: String::new()
            }
            .is_transient()
        );
        assert!(!TrendsError::MalformedResponse("x".to_string()).is_transient());
        let encode = TrendsError::QueryEncode("key must be a string".to_string());
        assert!(!encode.is_transient());
        assert!(!encode.is_remote());
        assert!(!TrendsError::EmptyResult.is_remote());
    }
}
