//! # Censo - municipalities where women outnumber men
//!
//! Censo pulls 2010 Census aggregate tables from the IBGE APIs for one
//! Brazilian state, folds them into one record per municipality, keeps the
//! municipalities with more women than men and derives a few indicators
//! (share of women aged 15-29, per-capita income, female-headed households).
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  IBGE APIs  │────▶│   Parser    │────▶│  Transform  │────▶│   Report    │
//! │ (3 tables)  │     │ (2 shapes)  │     │ (reshape +  │     │ (table, top │
//! │             │     │             │     │  derive)    │     │  10s, CSV)  │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use censo::{resolve_state, run_report, Config, IbgeClient, ReportOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = IbgeClient::new(Config::from_env())?;
//!     let state = resolve_state(&client, "RJ").await?;
//!     let report = run_report(&client, &state, &ReportOptions::default()).await;
//!     print!("{}", report.to_csv()?);
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`] - Environment-driven configuration
//! - [`error`] - Hierarchical error types
//! - [`models`] - Domain models (StateRef, MunicipalityRecord, ReportRow)
//! - [`parser`] - Raw table normalization and locale-aware numbers
//! - [`validation`] - JSON schema validation of reference payloads
//! - [`cache`] - On-disk response cache
//! - [`ibge`] - IBGE client and table definitions
//! - [`transform`] - Reshape, derive and pipeline
//! - [`report`] - Rankings, notices, CSV and text rendering
//! - [`session`] - Per-session single-flight guard
//! - [`api`] - HTTP API server and log broadcaster

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Parsing
pub mod parser;

// Validation
pub mod validation;

// Caching
pub mod cache;

// Data access
pub mod ibge;

// Transformation
pub mod transform;

// Presentation
pub mod report;

// Concurrency
pub mod session;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Config and errors
// =============================================================================

pub use config::{Config, TableApi};

pub use error::{
    CacheError,
    FetchError,
    ParseError,
    PipelineError,
    ServerError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    find_state,
    MunicipalityRecord,
    MunicipalityRef,
    ReportRow,
    StateRef,
};

// =============================================================================
// Re-exports - Parsing
// =============================================================================

pub use parser::{
    decode_body,
    parse_count,
    parse_decimal,
    RawTable,
    TableRow,
};

// =============================================================================
// Re-exports - IBGE client
// =============================================================================

pub use ibge::{AggregateTable, IbgeClient, Source};

// =============================================================================
// Re-exports - Cache
// =============================================================================

pub use cache::{CachedResponse, ResponseCache};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::{
    build_report,
    derive_and_filter,
    fetch_state_tables,
    reshape,
    resolve_state,
    run_report,
    run_report_for_session,
    state_by_id,
    ReportOptions,
    Reshaped,
};

// =============================================================================
// Re-exports - Report
// =============================================================================

pub use report::{BarChart, Notice, Report, SourceStatus};

pub use session::{FetchGuard, SessionGuards};

// =============================================================================
// Re-exports - API
// =============================================================================

pub use api::types::{error_response, ReportMetadata, ReportResponse};

// Server
pub mod server {
    pub use crate::api::server::{router, start_server, AppState};
}
