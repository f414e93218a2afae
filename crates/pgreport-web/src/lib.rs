//! pgreport Web API Server
//!
//! REST endpoints for listing logs and driving report generation, plus
//! static serving of the generated reports.

use axum::{
    async_trait,
    extract::{FromRequest, Multipart, Path, Request, State},
    http::{
        header::{HeaderValue, CONTENT_TYPE},
        Method, StatusCode,
    },
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Form, Router,
};
use pgreport_core::{constants::REPORT_URL_PREFIX, Error, ErrorKind, Result};
use pgreport_db::LogSource;
use pgreport_jobs::{ReportJob, ReportService};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// API response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    service: Arc<ReportService>,
    logs: Arc<dyn LogSource>,
}

impl AppState {
    pub fn new(service: Arc<ReportService>, logs: Arc<dyn LogSource>) -> Self {
        Self { service, logs }
    }

    pub fn service(&self) -> &Arc<ReportService> {
        &self.service
    }
}

/// Report request form, urlencoded or multipart
///
/// A body that is neither yields no log file, which the handler reports
/// as a validation error.
#[derive(Debug, Default, Deserialize)]
pub struct ReportRequest {
    #[serde(rename = "logFile")]
    pub log_file: Option<String>,
}

#[async_trait]
impl<S> FromRequest<S> for ReportRequest
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> std::result::Result<Self, Self::Rejection> {
        let multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map_or(false, |v| v.starts_with("multipart/form-data"));

        if !multipart {
            return Ok(match Form::<ReportRequest>::from_request(req, state).await {
                Ok(Form(form)) => form,
                Err(_) => ReportRequest::default(),
            });
        }

        let invalid = |e: String| failure(Error::validation(format!("Invalid multipart form: {}", e)));
        let mut form = Multipart::from_request(req, state)
            .await
            .map_err(|e| invalid(e.body_text()))?;

        let mut request = ReportRequest::default();
        while let Some(field) = form.next_field().await.map_err(|e| invalid(e.body_text()))? {
            if field.name() == Some("logFile") {
                request.log_file = Some(field.text().await.map_err(|e| invalid(e.body_text()))?);
            }
        }
        Ok(request)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Accepted {
    report_name: String,
}

#[derive(Serialize)]
struct Stopped {
    stopped: String,
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    create_router_with_cors(state, None)
}

/// Create the API router with a fixed CORS origin; any origin otherwise
pub fn create_router_with_cors(state: AppState, cors_origin: Option<String>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);
    let cors = match cors_origin.map(|o| o.parse::<HeaderValue>()) {
        Some(Ok(origin)) => cors.allow_origin(origin),
        Some(Err(e)) => {
            warn!("Ignoring invalid CORS origin: {}", e);
            cors.allow_origin(Any)
        }
        None => cors.allow_origin(Any),
    };

    let reports = ServeDir::new(state.service.report_dir());

    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/servers", get(list_servers))
        .route("/api/logs/:server", get(list_logs))
        .route("/api/report/:server", post(generate_report))
        .route("/api/reports/:server", get(list_reports))
        .route("/api/report-status/:server/:report", get(report_status))
        .route("/api/stop-report/:server/:report", post(stop_report))
        .route("/api/jobs", get(list_jobs))
        .nest_service(REPORT_URL_PREFIX, reports)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the API until `shutdown` resolves
pub async fn start_server<F>(
    addr: SocketAddr,
    state: AppState,
    cors_origin: Option<String>,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router_with_cors(state, cors_origin);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Starting pgreport Web API on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

fn status_code(err: &Error) -> StatusCode {
    match err.kind() {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn failure(err: Error) -> Response {
    let status = status_code(&err);
    if status.is_server_error() {
        warn!("Request failed: {}", err);
    }
    (status, Json(ApiResponse::<()>::err(err.to_string()))).into_response()
}

fn respond<T: Serialize>(result: Result<T>) -> Response {
    match result {
        Ok(data) => Json(ApiResponse::ok(data)).into_response(),
        Err(e) => failure(e),
    }
}

// === API Handlers ===

async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION")
    })))
}

async fn list_servers(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::ok(state.service.registry().list().to_vec()))
}

async fn list_logs(State(state): State<AppState>, Path(server): Path<String>) -> Response {
    let config = match state.service.registry().find(&server) {
        Ok(config) => config,
        Err(e) => return failure(e),
    };
    info!("Listing logs for {}", server);
    respond(state.logs.list_logs(config).await)
}

async fn generate_report(
    State(state): State<AppState>,
    Path(server): Path<String>,
    req: ReportRequest,
) -> Response {
    let Some(log_file) = req.log_file else {
        return failure(Error::validation("Log file not specified"));
    };

    info!("Report requested for {}:{}", server, log_file);
    match state.service.generate(&server, &log_file).await {
        // Pipeline keeps running after the response; status polling observes it
        Ok(launch) => Json(ApiResponse::ok(Accepted {
            report_name: launch.report_name,
        }))
        .into_response(),
        Err(e) => failure(e),
    }
}

async fn list_reports(State(state): State<AppState>, Path(server): Path<String>) -> Response {
    respond(state.service.list_reports(&server).await)
}

async fn report_status(
    State(state): State<AppState>,
    Path((server, report)): Path<(String, String)>,
) -> Response {
    respond(state.service.status(&server, &report).await)
}

async fn stop_report(
    State(state): State<AppState>,
    Path((server, report)): Path<(String, String)>,
) -> Response {
    respond(
        state
            .service
            .stop(&server, &report)
            .map(|()| Stopped { stopped: report }),
    )
}

async fn list_jobs(State(state): State<AppState>) -> impl IntoResponse {
    let jobs: Vec<ReportJob> = state
        .service
        .tracker()
        .list_all()
        .into_iter()
        .map(|(_, job)| job)
        .collect();
    Json(ApiResponse::ok(jobs))
}
