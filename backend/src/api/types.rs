//! REST API types.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::models::{ReportRow, StateRef};
use crate::report::{BarChart, Notice, Report, SourceStatus};

/// Report payload for `GET /api/states/{id}/report`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportResponse {
    /// Unique report identifier
    pub report_id: String,

    /// Status: "ready", "empty", "error"
    pub status: String,

    pub state: StateRef,

    /// Message to show above the report, if any
    pub notice: Option<Notice>,

    /// Filtered municipalities, by female population descending
    pub rows: Vec<ReportRow>,

    /// Top-N rankings in display order
    pub charts: Vec<BarChart>,

    /// Metadata about the run
    pub metadata: ReportMetadata,
}

/// Metadata about a report run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetadata {
    pub min_total_population: u64,
    pub municipalities_seen: usize,
    pub municipalities_matched: usize,
    pub skipped_rows: usize,
    pub generated_at: String,
    pub csv_file_name: String,
    pub sources: Vec<SourceStatus>,
}

impl ReportResponse {
    pub fn new(report: &Report, top: usize) -> Self {
        let notice = report.notice();
        let status = match notice {
            Some(Notice::Error(_)) => "error",
            Some(Notice::NoMatches(_)) => "empty",
            None => "ready",
        };

        ReportResponse {
            report_id: report.id.clone(),
            status: status.to_string(),
            state: report.state.clone(),
            notice,
            rows: report.rows.clone(),
            charts: report.charts(top),
            metadata: ReportMetadata {
                min_total_population: report.min_total_population,
                municipalities_seen: report.municipalities_seen,
                municipalities_matched: report.rows.len(),
                skipped_rows: report.skipped_rows,
                generated_at: report.generated_at.to_rfc3339(),
                csv_file_name: report.csv_file_name(),
                sources: report.sources.clone(),
            },
        }
    }
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "status": "error",
        "error": error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::tests::sample_report;

    #[test]
    fn test_report_response_shape() {
        let report = sample_report();
        let response = ReportResponse::new(&report, 2);
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["status"], "ready");
        assert!(json["notice"].is_null());
        assert_eq!(json["state"]["acronym"], "RJ");
        assert_eq!(json["rows"].as_array().unwrap().len(), 3);
        assert_eq!(json["rows"][0]["femalePopulation"], 260_000);
        assert_eq!(json["charts"][0]["bars"].as_array().unwrap().len(), 2);
        assert_eq!(json["metadata"]["csvFileName"], "dados_mulheres_rio_de_janeiro.csv");
        assert_eq!(json["metadata"]["sources"][0]["source"], "population");
    }

    #[test]
    fn test_error_response() {
        let json = error_response("Unknown state: 99");
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"], "Unknown state: 99");
    }
}
