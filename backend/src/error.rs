//! Error types for the census pipeline.
//!
//! - [`FetchError`] - HTTP transport and payload errors at the IBGE boundary
//! - [`ParseError`] - Raw table shape errors
//! - [`CacheError`] - Response cache errors
//! - [`PipelineError`] - Top-level orchestration errors
//! - [`ServerError`] - HTTP server errors
//!
//! Missing data for a municipality is not an error: it is modeled as `None`
//! or zero on [`crate::models::MunicipalityRecord`].

use thiserror::Error;

// =============================================================================
// Fetch Errors
// =============================================================================

/// Errors while talking to the IBGE services.
///
/// Every variant is caught at the fetch boundary and degrades to
/// "no data for this source".
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network failure (DNS, connection reset, TLS...).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The request exceeded the configured timeout.
    #[error("Request timed out after {0}s")]
    Timeout(u64),

    /// Non-2xx response.
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// Body is not valid JSON.
    #[error("Invalid JSON: {0}")]
    Parse(String),

    /// JSON is valid but not shaped as expected.
    #[error("Unexpected payload shape: {0}")]
    Shape(String),
}

impl From<ParseError> for FetchError {
    fn from(err: ParseError) -> Self {
        FetchError::Shape(err.to_string())
    }
}

// =============================================================================
// Raw Table Errors
// =============================================================================

/// Errors while reading a raw statistics table.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Payload is neither the columnar nor the nested shape.
    #[error("Unrecognized table shape: {0}")]
    UnknownShape(String),

    /// Columnar table without a header row.
    #[error("Table has no header row")]
    MissingHeader,

    /// A required column is not described by the header.
    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Cache Errors
// =============================================================================

/// Errors from the on-disk response cache.
#[derive(Debug, Error)]
pub enum CacheError {
    /// IO error.
    #[error("Cache IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("Cache JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline errors.
///
/// Source failures never show up here; they are recorded on the report.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A fetch is already running for this session.
    #[error("A fetch is already running for session '{0}'")]
    Busy(String),

    /// No state matches the user's selection.
    #[error("Unknown state: {0}")]
    UnknownState(String),

    /// The state list could not be loaded.
    #[error("Could not load the state list: {0}")]
    States(#[from] FetchError),

    /// Report serialization failed.
    #[error("Report error: {0}")]
    Report(String),
}

impl From<csv::Error> for PipelineError {
    fn from(err: csv::Error) -> Self {
        PipelineError::Report(err.to_string())
    }
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Upstream IBGE service failed.
    #[error("Upstream error: {0}")]
    Upstream(#[from] FetchError),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for fetch operations.
pub type FetchResult<T> = Result<T, FetchError>;

/// Result type for raw table parsing.
pub type ParseResult<T> = Result<T, ParseError>;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        // ParseError -> FetchError
        let parse_err = ParseError::MissingColumn("Município (Código)".into());
        let fetch_err: FetchError = parse_err.into();
        assert!(matches!(fetch_err, FetchError::Shape(_)));
        assert!(fetch_err.to_string().contains("Município (Código)"));

        // FetchError -> PipelineError
        let pipeline_err: PipelineError = FetchError::Timeout(30).into();
        assert!(pipeline_err.to_string().contains("30s"));
    }

    #[test]
    fn test_status_error_format() {
        let err = FetchError::Status {
            status: 503,
            url: "https://apisidra.ibge.gov.br/values/t/200".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("503"));
        assert!(msg.contains("apisidra"));
    }
}
