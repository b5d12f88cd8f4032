//! Finished reports: rankings, notices and CSV export.
//!
//! A [`Report`] is built once by the pipeline and only read afterwards;
//! nothing here recomputes filters or derived fields.

pub mod render;

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{PipelineError, PipelineResult};
use crate::ibge::Source;
use crate::models::{ReportRow, StateRef};

pub use render::{Bar, BarChart};

/// Default size of the top-N rankings.
pub const DEFAULT_TOP: usize = 10;

/// Fetch outcome of one data source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SourceStatus {
    pub source: Source,
    pub ok: bool,
    /// Normalized rows obtained from the source.
    pub rows: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SourceStatus {
    pub fn ok(source: Source, rows: usize) -> Self {
        Self { source, ok: true, rows, error: None }
    }

    pub fn failed(source: Source, error: impl Into<String>) -> Self {
        Self {
            source,
            ok: false,
            rows: 0,
            error: Some(error.into()),
        }
    }
}

/// Message shown instead of (or above) the report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "message", rename_all = "camelCase")]
pub enum Notice {
    /// The population data could not be obtained.
    Error(String),
    /// Data was obtained but no municipality passed the filters.
    NoMatches(String),
}

impl Notice {
    pub fn message(&self) -> &str {
        match self {
            Notice::Error(m) | Notice::NoMatches(m) => m,
        }
    }
}

/// Report for one state and population threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: String,
    pub state: StateRef,
    pub min_total_population: u64,
    pub generated_at: DateTime<Utc>,
    /// Municipalities present in the population data, before filtering.
    pub municipalities_seen: usize,
    /// Rows that could not be used, across all sources.
    pub skipped_rows: usize,
    pub sources: Vec<SourceStatus>,
    /// Filtered rows, by female population descending.
    pub rows: Vec<ReportRow>,
}

impl Report {
    pub fn new(
        state: StateRef,
        min_total_population: u64,
        municipalities_seen: usize,
        skipped_rows: usize,
        sources: Vec<SourceStatus>,
        rows: Vec<ReportRow>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            state,
            min_total_population,
            generated_at: Utc::now(),
            municipalities_seen,
            skipped_rows,
            sources,
            rows,
        }
    }

    pub fn source(&self, source: Source) -> Option<&SourceStatus> {
        self.sources.iter().find(|s| s.source == source)
    }

    /// What to tell the user before (or instead of) the table.
    pub fn notice(&self) -> Option<Notice> {
        let population_failed = self
            .source(Source::Population)
            .map_or(true, |status| !status.ok);

        if population_failed || self.municipalities_seen == 0 {
            let detail = self
                .source(Source::Population)
                .and_then(|s| s.error.clone())
                .unwrap_or_else(|| "no municipalities returned".to_string());
            return Some(Notice::Error(format!(
                "Could not load population data for {}: {}",
                self.state.name, detail
            )));
        }

        if self.rows.is_empty() {
            return Some(Notice::NoMatches(format!(
                "No municipality in {} has more women than men and at least {} inhabitants",
                self.state.name, self.min_total_population
            )));
        }

        None
    }

    // =========================================================================
    // Rankings
    // =========================================================================

    /// Highest share of women aged 15-29.
    pub fn top_by_young_female(&self, n: usize) -> Vec<&ReportRow> {
        top_by(&self.rows, n, |r| Some(r.young_female_pct))
    }

    /// Highest per-capita income; municipalities without income are left out.
    pub fn top_by_income(&self, n: usize) -> Vec<&ReportRow> {
        top_by(&self.rows, n, |r| r.record.per_capita_income)
    }

    /// Highest share of female-headed households.
    pub fn top_by_female_headship(&self, n: usize) -> Vec<&ReportRow> {
        top_by(&self.rows, n, |r| Some(r.female_headship_pct))
    }

    /// The three ranking charts, in display order.
    pub fn charts(&self, n: usize) -> Vec<BarChart> {
        vec![
            BarChart::new(
                format!("Top {} - women aged 15-29 (%)", n),
                self.top_by_young_female(n),
                |r| r.young_female_pct,
            ),
            BarChart::new(
                format!("Top {} - per-capita income (R$)", n),
                self.top_by_income(n),
                |r| r.record.per_capita_income.unwrap_or(0.0),
            ),
            BarChart::new(
                format!("Top {} - female-headed households (%)", n),
                self.top_by_female_headship(n),
                |r| r.female_headship_pct,
            ),
        ]
    }

    // =========================================================================
    // CSV
    // =========================================================================

    /// `dados_mulheres_<state>.csv`
    pub fn csv_file_name(&self) -> String {
        format!("dados_mulheres_{}.csv", self.state.slug())
    }

    /// Header line, then one line per filtered municipality; absent values
    /// are empty fields.
    pub fn to_csv(&self) -> PipelineResult<String> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        writer.write_record(CSV_HEADER)?;
        for row in &self.rows {
            writer.serialize(CsvRow::from(row))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| PipelineError::Report(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| PipelineError::Report(e.to_string()))
    }

    /// Write [`to_csv`](Self::to_csv) to `path`, or to
    /// [`csv_file_name`](Self::csv_file_name) inside it when `path` is a
    /// directory. Returns the written path.
    pub fn write_csv(&self, path: &Path) -> PipelineResult<PathBuf> {
        let path = if path.is_dir() {
            path.join(self.csv_file_name())
        } else {
            path.to_path_buf()
        };
        fs::write(&path, self.to_csv()?)
            .map_err(|e| PipelineError::Report(format!("{}: {}", path.display(), e)))?;
        Ok(path)
    }

    /// Write the report as pretty JSON.
    pub fn write_json(&self, path: &Path) -> PipelineResult<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| PipelineError::Report(e.to_string()))?;
        fs::write(path, json).map_err(|e| PipelineError::Report(format!("{}: {}", path.display(), e)))
    }
}

/// Descending by metric; rows without a metric are excluded, ties keep
/// table order.
fn top_by<F>(rows: &[ReportRow], n: usize, metric: F) -> Vec<&ReportRow>
where
    F: Fn(&ReportRow) -> Option<f64>,
{
    let mut ranked: Vec<(&ReportRow, f64)> = rows
        .iter()
        .filter_map(|r| metric(r).map(|value| (r, value)))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked.into_iter().take(n).map(|(r, _)| r).collect()
}

/// CSV column names, in [`CsvRow`] field order.
pub const CSV_HEADER: [&str; 10] = [
    "code",
    "municipality",
    "female_population",
    "male_population",
    "total_population",
    "young_female_population",
    "young_female_pct",
    "per_capita_income",
    "female_headed_households",
    "female_headship_pct",
];

/// CSV line layout.
#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    code: u64,
    municipality: &'a str,
    female_population: u64,
    male_population: u64,
    total_population: u64,
    young_female_population: u64,
    young_female_pct: f64,
    per_capita_income: Option<f64>,
    female_headed_households: Option<u64>,
    female_headship_pct: f64,
}

impl<'a> From<&'a ReportRow> for CsvRow<'a> {
    fn from(row: &'a ReportRow) -> Self {
        Self {
            code: row.record.code,
            municipality: &row.record.name,
            female_population: row.record.female_population,
            male_population: row.record.male_population,
            total_population: row.total_population,
            young_female_population: row.record.young_female_population,
            young_female_pct: row.young_female_pct,
            per_capita_income: row.record.per_capita_income,
            female_headed_households: row.record.female_headed_households,
            female_headship_pct: row.female_headship_pct,
        }
    }
}
