//! HTTP Server for the census API.
//!
//! # API Endpoints
//!
//! | Method | Path                                  | Description                 |
//! |--------|---------------------------------------|-----------------------------|
//! | GET    | `/health`                             | Health check                |
//! | GET    | `/api/states`                         | States, by name             |
//! | GET    | `/api/states/{id}/municipalities`     | Municipalities of a state   |
//! | GET    | `/api/states/{id}/report`             | Report JSON                 |
//! | GET    | `/api/states/{id}/report.csv`         | Report CSV download         |
//! | GET    | `/api/logs`                           | SSE stream for live logs    |
//!
//! Report endpoints accept `minPopulation` and `top` query parameters and
//! are single-flight per `x-session-id` header (409 while one is running).

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{sse::Event, IntoResponse, Json, Sse},
    routing::get,
    Router,
};
use futures::stream::Stream;
use serde::Deserialize;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::LOG_BROADCASTER;
use super::types::{error_response, ReportResponse};
use crate::config::Config;
use crate::error::{PipelineError, ServerError};
use crate::ibge::IbgeClient;
use crate::models::{MunicipalityRef, StateRef};
use crate::report::{Report, DEFAULT_TOP};
use crate::session::SessionGuards;
use crate::transform::pipeline::{run_report_for_session, state_by_id, ReportOptions};

/// Header carrying the caller's session key.
pub const SESSION_HEADER: &str = "x-session-id";

/// Session used when the header is missing.
pub const ANONYMOUS_SESSION: &str = "anonymous";

type ApiError = (StatusCode, Json<Value>);

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub client: IbgeClient,
    pub guards: SessionGuards,
}

impl AppState {
    pub fn new(client: IbgeClient) -> Self {
        Self {
            client,
            guards: SessionGuards::new(),
        }
    }
}

/// Query parameters of the report endpoints
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportQuery {
    #[serde(default)]
    pub min_population: u64,
    #[serde(default = "default_top")]
    pub top: usize,
}

fn default_top() -> usize {
    DEFAULT_TOP
}

/// Build the API router
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::HeaderName::from_static(SESSION_HEADER),
        ])
        .expose_headers([header::CONTENT_TYPE, header::CONTENT_DISPOSITION]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/states", get(list_states))
        .route("/api/states/{id}/municipalities", get(list_municipalities))
        .route("/api/states/{id}/report", get(report_json))
        .route("/api/states/{id}/report.csv", get(report_csv))
        .route("/api/logs", get(sse_logs))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(port: u16, config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let client = IbgeClient::new(config)?;
    let app = router(AppState::new(client));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("Census server running on http://localhost:{}", port);
    println!("   GET /api/states                          - States");
    println!("   GET /api/states/{{id}}/municipalities      - Municipalities");
    println!("   GET /api/states/{{id}}/report[.csv]        - Report (JSON or CSV)");
    println!("   GET /api/logs                            - SSE log stream");
    println!("   GET /health                              - Health check");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "censo",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "states": "GET /api/states",
            "report": "GET /api/states/{id}/report",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

async fn list_states(State(app): State<AppState>) -> Result<Json<Vec<StateRef>>, ApiError> {
    let states = app.client.try_list_states().await.map_err(ServerError::from).map_err(api_error)?;
    Ok(Json(states))
}

async fn list_municipalities(
    State(app): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<Vec<MunicipalityRef>>, ApiError> {
    let municipalities = app
        .client
        .try_list_municipalities(id)
        .await
        .map_err(ServerError::from)
        .map_err(api_error)?;
    Ok(Json(municipalities))
}

async fn report_json(
    State(app): State<AppState>,
    Path(id): Path<u32>,
    Query(query): Query<ReportQuery>,
    headers: HeaderMap,
) -> Result<Json<ReportResponse>, ApiError> {
    let report = build(&app, id, &query, &headers).await?;
    Ok(Json(ReportResponse::new(&report, query.top)))
}

async fn report_csv(
    State(app): State<AppState>,
    Path(id): Path<u32>,
    Query(query): Query<ReportQuery>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let report = build(&app, id, &query, &headers).await?;
    let csv = report.to_csv().map_err(ServerError::from).map_err(api_error)?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", report.csv_file_name()),
            ),
        ],
        csv,
    ))
}

async fn build(app: &AppState, id: u32, query: &ReportQuery, headers: &HeaderMap) -> Result<Report, ApiError> {
    let session = session_id(headers);
    let state = state_by_id(&app.client, id).await.map_err(ServerError::from).map_err(api_error)?;
    let options = ReportOptions {
        min_total_population: query.min_population,
        top: query.top,
    };

    run_report_for_session(&app.client, &app.guards, &session, &state, &options)
        .await
        .map_err(ServerError::from)
        .map_err(api_error)
}

/// Session key from the request headers.
pub fn session_id(headers: &HeaderMap) -> String {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(ANONYMOUS_SESSION)
        .to_string()
}

fn api_error(err: ServerError) -> ApiError {
    let status = match &err {
        ServerError::Pipeline(PipelineError::Busy(_)) => StatusCode::CONFLICT,
        ServerError::Pipeline(PipelineError::UnknownState(_)) => StatusCode::NOT_FOUND,
        ServerError::Pipeline(PipelineError::States(_)) | ServerError::Upstream(_) => StatusCode::BAD_GATEWAY,
        ServerError::Pipeline(PipelineError::Report(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
    };
    (status, Json(error_response(&err.to_string())))
}
