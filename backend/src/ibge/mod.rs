//! IBGE client: reference data and aggregate tables.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use censo::ibge::{IbgeClient, tables};
//! use censo::Config;
//!
//! let client = IbgeClient::new(Config::from_env())?;
//! let states = client.list_states().await;
//! let population = client.fetch_aggregate_table(&tables::POPULATION, 33).await;
//! ```
//!
//! Every failure (transport, timeout, non-2xx status, bad JSON, unexpected
//! shape) stops at this boundary. The `try_*` methods return it as a
//! [`FetchError`]; the plain methods log it and return empty data.

pub mod tables;

use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use crate::api::logs::{log_error, log_info_indent, log_success_indent, log_warning};
use crate::cache::ResponseCache;
use crate::config::{Config, TableApi};
use crate::error::{FetchError, FetchResult};
use crate::models::{MunicipalityRef, StateRef};
use crate::parser::{decode_body, RawTable};
use crate::validation::{validate_municipalities, validate_states};

pub use tables::{AggregateTable, Source, HEADSHIP, INCOME, POPULATION, REPORT_TABLES};

/// `/localidades/estados` item.
#[derive(Debug, Deserialize)]
struct RawState {
    id: u32,
    sigla: String,
    nome: String,
}

/// `/localidades/estados/{id}/municipios` item.
#[derive(Debug, Deserialize)]
struct RawMunicipality {
    id: u64,
    nome: String,
}

/// HTTP client for the IBGE services
#[derive(Clone)]
pub struct IbgeClient {
    http: reqwest::Client,
    config: Config,
    cache: Option<ResponseCache>,
}

impl IbgeClient {
    /// Create a client with the configured timeout and cache.
    pub fn new(config: Config) -> FetchResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("censo/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let cache = (!config.no_cache)
            .then(|| ResponseCache::new(&config.cache_dir, config.cache_ttl_hours));

        Ok(Self { http, config, cache })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // =========================================================================
    // Reference data
    // =========================================================================

    /// States sorted by name.
    pub async fn try_list_states(&self) -> FetchResult<Vec<StateRef>> {
        let url = format!("{}/estados", self.config.localidades_url);

        self.fetch_cached(&url, |body| {
            validate_states(body).map_err(|errs| FetchError::Shape(errs.join("; ")))?;
            let raw: Vec<RawState> =
                serde_json::from_value(body.clone()).map_err(|e| FetchError::Shape(e.to_string()))?;

            let mut states: Vec<StateRef> = raw
                .into_iter()
                .map(|s| StateRef {
                    id: s.id,
                    acronym: s.sigla,
                    name: s.nome,
                })
                .collect();
            states.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(states)
        })
        .await
    }

    /// States sorted by name; empty on failure (the error is logged).
    pub async fn list_states(&self) -> Vec<StateRef> {
        match self.try_list_states().await {
            Ok(states) => states,
            Err(e) => {
                log_error(format!("Could not load the state list: {}", e));
                Vec::new()
            }
        }
    }

    /// Municipalities of a state sorted by name.
    pub async fn try_list_municipalities(&self, state_id: u32) -> FetchResult<Vec<MunicipalityRef>> {
        let url = format!("{}/estados/{}/municipios", self.config.localidades_url, state_id);

        self.fetch_cached(&url, |body| {
            validate_municipalities(body).map_err(|errs| FetchError::Shape(errs.join("; ")))?;
            let raw: Vec<RawMunicipality> =
                serde_json::from_value(body.clone()).map_err(|e| FetchError::Shape(e.to_string()))?;

            let mut municipalities: Vec<MunicipalityRef> = raw
                .into_iter()
                .map(|m| MunicipalityRef {
                    code: m.id,
                    name: m.nome,
                })
                .collect();
            municipalities.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(municipalities)
        })
        .await
    }

    /// Municipalities of a state; empty on failure (the error is logged).
    pub async fn list_municipalities(&self, state_id: u32) -> Vec<MunicipalityRef> {
        match self.try_list_municipalities(state_id).await {
            Ok(municipalities) => municipalities,
            Err(e) => {
                log_error(format!("Could not load municipalities of state {}: {}", state_id, e));
                Vec::new()
            }
        }
    }

    // =========================================================================
    // Aggregate tables
    // =========================================================================

    /// URL of an aggregate table for the configured table API.
    pub fn table_url(&self, table: &AggregateTable, state_id: u32) -> String {
        match self.config.table_api {
            TableApi::Sidra => table.sidra_url(&self.config.sidra_url, state_id),
            TableApi::Agregados => table.agregados_url(&self.config.agregados_url, state_id),
        }
    }

    /// Fetch one table for every municipality of a state in a single call.
    ///
    /// An empty table is an error here: it means "no data for this source".
    pub async fn try_fetch_aggregate_table(
        &self,
        table: &AggregateTable,
        state_id: u32,
    ) -> FetchResult<RawTable> {
        let url = self.table_url(table, state_id);

        self.fetch_cached(&url, |body| {
            let raw = RawTable::from_json(body)?;
            if raw.is_empty() {
                return Err(FetchError::Shape("table has no data rows".to_string()));
            }
            Ok(raw)
        })
        .await
    }

    /// Same as [`Self::try_fetch_aggregate_table`], degrading failures to an
    /// empty table.
    pub async fn fetch_aggregate_table(&self, table: &AggregateTable, state_id: u32) -> RawTable {
        match self.try_fetch_aggregate_table(table, state_id).await {
            Ok(raw) => raw,
            Err(e) => {
                log_warning(format!("No data for {}: {}", table.source.label(), e));
                RawTable::empty()
            }
        }
    }

    // =========================================================================
    // HTTP
    // =========================================================================

    /// Serve from cache when fresh, otherwise GET, parse and cache on success.
    async fn fetch_cached<T>(
        &self,
        url: &str,
        parse: impl Fn(&Value) -> FetchResult<T>,
    ) -> FetchResult<T> {
        if let Some(cache) = &self.cache {
            if let Some(body) = cache.get(url) {
                match parse(&body) {
                    Ok(parsed) => {
                        log_success_indent(format!("cache hit: {}", url), 1);
                        return Ok(parsed);
                    }
                    Err(e) => log_warning(format!("Ignoring unusable cache entry for {}: {}", url, e)),
                }
            }
        }

        let body = self.get_json(url).await?;
        let parsed = parse(&body)?;

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.put(url, &body) {
                log_warning(format!("Could not cache response: {}", e));
            }
        }

        Ok(parsed)
    }

    async fn get_json(&self, url: &str) -> FetchResult<Value> {
        log_info_indent(format!("GET {}", url), 1);

        let response = self
            .http
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let bytes = response.bytes().await.map_err(|e| self.transport_error(e))?;
        let text = decode_body(&bytes);

        serde_json::from_str(&text).map_err(|e| FetchError::Parse(e.to_string()))
    }

    fn transport_error(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.config.timeout_secs)
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}
