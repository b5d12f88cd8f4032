//! High-level pipeline: fetch the three tables of a state, reshape, filter
//! and derive, and wrap the result in a [`Report`].
//!
//! # Example
//!
//! ```rust,ignore
//! use censo::transform::{run_report, resolve_state, ReportOptions};
//! use censo::{Config, IbgeClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = IbgeClient::new(Config::from_env())?;
//!     let state = resolve_state(&client, "RJ").await?;
//!     let report = run_report(&client, &state, &ReportOptions::default()).await;
//!
//!     println!("{} municipalities", report.rows.len());
//!     Ok(())
//! }
//! ```

use serde::{Deserialize, Serialize};

use super::derive::derive_and_filter;
use super::reshape::reshape_tables;
use crate::api::logs::{log_error, log_info, log_success, log_warning};
use crate::error::{PipelineError, PipelineResult};
use crate::ibge::{IbgeClient, Source, REPORT_TABLES};
use crate::models::{find_state, StateRef};
use crate::parser::RawTable;
use crate::report::{Report, SourceStatus, DEFAULT_TOP};
use crate::session::SessionGuards;

/// Options for a report run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportOptions {
    /// Minimum total population (inclusive)
    pub min_total_population: u64,

    /// Size of the top-N rankings
    pub top: usize,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            min_total_population: 0,
            top: DEFAULT_TOP,
        }
    }
}

/// The three raw tables of a state, with their fetch outcome.
#[derive(Debug, Clone)]
pub struct StateTables {
    pub population: RawTable,
    pub income: RawTable,
    pub headship: RawTable,
    pub sources: Vec<SourceStatus>,
}

/// Resolve a user selection (id, acronym or name) against the state list.
pub async fn resolve_state(client: &IbgeClient, query: &str) -> PipelineResult<StateRef> {
    let states = client.try_list_states().await?;
    find_state(&states, query)
        .cloned()
        .ok_or_else(|| PipelineError::UnknownState(query.to_string()))
}

/// Look a state up by IBGE id.
///
/// If the state list itself is unavailable the id is used as is, so a
/// report can still be attempted.
pub async fn state_by_id(client: &IbgeClient, id: u32) -> PipelineResult<StateRef> {
    match client.try_list_states().await {
        Ok(states) => states
            .into_iter()
            .find(|s| s.id == id)
            .ok_or_else(|| PipelineError::UnknownState(id.to_string())),
        Err(e) => {
            log_warning(format!("State list unavailable ({}), using id {}", e, id));
            Ok(StateRef {
                id,
                acronym: String::new(),
                name: id.to_string(),
            })
        }
    }
}

/// Fetch population, income and headship, one after the other.
///
/// A failing source is recorded on its [`SourceStatus`] and contributes an
/// empty table.
pub async fn fetch_state_tables(client: &IbgeClient, state_id: u32) -> StateTables {
    let mut sources = Vec::with_capacity(3);
    let mut tables = Vec::with_capacity(3);

    for table in REPORT_TABLES {
        log_info(format!("Fetching {}...", table.source.label()));
        match client.try_fetch_aggregate_table(&table, state_id).await {
            Ok(raw) => {
                log_success(format!("{}: {} cells", table.source.label(), raw.len()));
                sources.push(SourceStatus::ok(table.source, raw.len()));
                tables.push(raw);
            }
            Err(e) => {
                match table.source {
                    Source::Population => log_error(format!("No data for {}: {}", table.source.label(), e)),
                    _ => log_warning(format!("No data for {}: {}", table.source.label(), e)),
                }
                sources.push(SourceStatus::failed(table.source, e.to_string()));
                tables.push(RawTable::empty());
            }
        }
    }

    let mut tables = tables.into_iter();
    StateTables {
        population: tables.next().unwrap_or_else(RawTable::empty),
        income: tables.next().unwrap_or_else(RawTable::empty),
        headship: tables.next().unwrap_or_else(RawTable::empty),
        sources,
    }
}

/// Reshape, filter and derive already fetched tables.
pub fn build_report(state: &StateRef, options: &ReportOptions, tables: StateTables) -> Report {
    let mut sources = tables.sources;
    let reshaped = reshape_tables(&tables.population, &tables.income, &tables.headship);

    // Report normalized row counts rather than raw cells
    for status in sources.iter_mut().filter(|s| s.ok) {
        status.rows = reshaped.row_count(status.source);
    }

    if !reshaped.skipped.is_empty() {
        log_warning(format!("{} rows skipped", reshaped.skipped.len()));
        for skip in reshaped.skipped.iter().take(3) {
            log_warning(format!("{} row {}: {}", skip.source.label(), skip.row, skip.reason));
        }
    }
    if reshaped.dropped > 0 {
        log_info(format!(
            "{} income/headship rows for municipalities without population data dropped",
            reshaped.dropped
        ));
    }

    let seen = reshaped.records.len();
    let rows = derive_and_filter(reshaped.records.into_values(), options.min_total_population);
    log_success(format!(
        "{} of {} municipalities have more women than men (min. population {})",
        rows.len(),
        seen,
        options.min_total_population
    ));

    Report::new(
        state.clone(),
        options.min_total_population,
        seen,
        reshaped.skipped.len(),
        sources,
        rows,
    )
}

/// Build the report for a state. Never fails: source problems show up in
/// [`Report::sources`] and [`Report::notice`].
pub async fn run_report(client: &IbgeClient, state: &StateRef, options: &ReportOptions) -> Report {
    log_info(format!("Building report for {} ({})", state.name, state.id));
    let tables = fetch_state_tables(client, state.id).await;
    build_report(state, options, tables)
}

/// [`run_report`] under the session's single-flight guard.
pub async fn run_report_for_session(
    client: &IbgeClient,
    guards: &SessionGuards,
    session: &str,
    state: &StateRef,
    options: &ReportOptions,
) -> PipelineResult<Report> {
    let _guard = guards
        .try_acquire(session)
        .ok_or_else(|| PipelineError::Busy(session.to_string()))?;

    Ok(run_report(client, state, options).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::report::Notice;
    use serde_json::json;

    fn rj() -> StateRef {
        StateRef {
            id: 33,
            acronym: "RJ".into(),
            name: "Rio de Janeiro".into(),
        }
    }

    fn offline_client() -> IbgeClient {
        let config = Config {
            localidades_url: "http://127.0.0.1:9".to_string(),
            sidra_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 2,
            ..Config::default()
        }
        .without_cache();
        IbgeClient::new(config).unwrap()
    }

    fn population_table() -> RawTable {
        RawTable::from_json(&json!([
            {"D1C": "Município (Código)", "D1N": "Município", "D2N": "Sexo", "D3N": "Grupo de idade", "V": "Valor"},
            {"D1C": "1", "D1N": "A - RJ", "D2N": "Mulheres", "D3N": "Total", "V": "600"},
            {"D1C": "1", "D1N": "A - RJ", "D2N": "Homens", "D3N": "Total", "V": "400"},
            {"D1C": "1", "D1N": "A - RJ", "D2N": "Mulheres", "D3N": "20 a 24 anos", "V": "150"}
        ]))
        .unwrap()
    }

    fn income_table() -> RawTable {
        RawTable::from_json(&json!([
            {"D1C": "Município (Código)", "D1N": "Município", "V": "Valor"},
            {"D1C": "1", "D1N": "A - RJ", "V": "812,50"},
            {"D1C": "2", "D1N": "B - RJ", "V": "900"}
        ]))
        .unwrap()
    }

    fn tables(population: RawTable, income: RawTable) -> StateTables {
        StateTables {
            sources: vec![
                SourceStatus::ok(Source::Population, population.len()),
                SourceStatus::ok(Source::Income, income.len()),
                SourceStatus::failed(Source::Headship, "HTTP 500"),
            ],
            population,
            income,
            headship: RawTable::empty(),
        }
    }

    #[test]
    fn test_build_report_scenario() {
        let report = build_report(&rj(), &ReportOptions::default(), tables(population_table(), income_table()));

        assert_eq!(report.municipalities_seen, 1);
        assert_eq!(report.rows.len(), 1);
        let row = &report.rows[0];
        assert_eq!(row.record.name, "A");
        assert_eq!(row.total_population, 1000);
        assert_eq!(row.young_female_pct, 25.0);
        assert_eq!(row.record.per_capita_income, Some(812.5));
        assert_eq!(row.female_headship_pct, 0.0);
        assert!(report.notice().is_none());
        assert!(!report.source(Source::Headship).unwrap().ok);
    }

    #[test]
    fn test_source_rows_are_normalized_counts() {
        let report = build_report(&rj(), &ReportOptions::default(), tables(population_table(), income_table()));

        assert_eq!(report.source(Source::Population).unwrap().rows, 3);
        assert_eq!(report.source(Source::Income).unwrap().rows, 2);
        assert_eq!(report.source(Source::Headship).unwrap().rows, 0);
    }

    #[test]
    fn test_build_report_threshold() {
        let options = ReportOptions {
            min_total_population: 1500,
            ..ReportOptions::default()
        };
        let report = build_report(&rj(), &options, tables(population_table(), income_table()));
        assert!(report.rows.is_empty());
        assert!(matches!(report.notice(), Some(Notice::NoMatches(_))));
    }

    #[tokio::test]
    async fn test_offline_run_reports_error_notice() {
        let report = run_report(&offline_client(), &rj(), &ReportOptions::default()).await;
        assert!(report.rows.is_empty());
        assert!(report.sources.iter().all(|s| !s.ok));
        assert!(matches!(report.notice(), Some(Notice::Error(_))));
    }

    #[tokio::test]
    async fn test_busy_session_rejected() {
        let client = offline_client();
        let guards = SessionGuards::new();
        let held = guards.try_acquire("tab").unwrap();

        let result = run_report_for_session(&client, &guards, "tab", &rj(), &ReportOptions::default()).await;
        assert!(matches!(result, Err(PipelineError::Busy(_))));

        drop(held);
        let result = run_report_for_session(&client, &guards, "tab", &rj(), &ReportOptions::default()).await;
        assert!(result.is_ok());
        assert!(!guards.is_busy("tab"));
    }

    #[tokio::test]
    async fn test_state_by_id_falls_back_offline() {
        let state = state_by_id(&offline_client(), 33).await.unwrap();
        assert_eq!(state.id, 33);
        assert!(resolve_state(&offline_client(), "RJ").await.is_err());
    }
}
