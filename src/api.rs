use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::catalog::Catalog;
use crate::domain::{ExternalId, SpecialReport, SpecialReportLink};
use crate::error::TransformerError;
use crate::tme::TermSource;

pub const COLLECTION_PATH: &str = "/transformers/special-reports";

pub trait SpecialReportService: Send + Sync + 'static {
    fn count(&self) -> usize;
    fn ids(&self) -> Vec<ExternalId>;
    fn links(&self) -> Option<Vec<SpecialReportLink>>;
    fn get(&self, id: &str) -> Option<SpecialReport>;
    fn reload(&self) -> Result<usize, TransformerError>;
    fn check_connectivity(&self) -> Result<(), TransformerError>;
}

impl<S: TermSource + 'static> SpecialReportService for Catalog<S> {
    fn count(&self) -> usize {
        Catalog::count(self)
    }

    fn ids(&self) -> Vec<ExternalId> {
        Catalog::ids(self)
    }

    fn links(&self) -> Option<Vec<SpecialReportLink>> {
        Catalog::links(self)
    }

    fn get(&self, id: &str) -> Option<SpecialReport> {
        Catalog::get(self, id)
    }

    fn reload(&self) -> Result<usize, TransformerError> {
        Catalog::reload(self)
    }

    fn check_connectivity(&self) -> Result<(), TransformerError> {
        Catalog::check_connectivity(self)
    }
}

#[derive(Clone)]
struct ApiState {
    service: Arc<dyn SpecialReportService>,
}

#[derive(Debug, Serialize)]
struct IdEntry<'a> {
    id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthReport {
    schema_version: u8,
    name: &'static str,
    description: &'static str,
    checks: Vec<HealthCheck>,
    ok: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthCheck {
    name: &'static str,
    ok: bool,
    severity: u8,
    business_impact: &'static str,
    technical_summary: &'static str,
    panic_guide: &'static str,
    check_output: String,
    last_updated: String,
}

pub fn router(service: Arc<dyn SpecialReportService>) -> Router {
    Router::new()
        .route(COLLECTION_PATH, get(get_special_reports))
        .route("/transformers/special-reports/__count", get(get_count))
        .route("/transformers/special-reports/__ids", get(get_ids))
        .route("/transformers/special-reports/__reload", post(reload))
        .route("/transformers/special-reports/{uuid}", get(get_special_report))
        .route("/__health", get(health))
        .route("/__gtg", get(good_to_go))
        .route("/__ping", get(ping))
        .route("/ping", get(ping))
        .route("/__build-info", get(build_info))
        .route("/build-info", get(build_info))
        .layer(middleware::from_fn(log_request))
        .with_state(ApiState { service })
}

pub async fn serve(
    service: Arc<dyn SpecialReportService>,
    port: u16,
) -> Result<(), TransformerError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|err| TransformerError::Server(format!("failed to bind {addr}: {err}")))?;
    info!(%addr, "listening");
    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| TransformerError::Server(err.to_string()))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "unable to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let transaction_id = request
        .headers()
        .get("X-Request-Id")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let started = Instant::now();

    let response = next.run(request).await;
    info!(
        %method,
        path = %path,
        transaction_id = transaction_id.as_deref().unwrap_or("-"),
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "handled request"
    );
    response
}

async fn get_special_reports(State(state): State<ApiState>) -> Response {
    match state.service.links() {
        Some(links) => json_response(&links),
        None => not_found(),
    }
}

async fn get_special_report(State(state): State<ApiState>, Path(uuid): Path<String>) -> Response {
    let service = Arc::clone(&state.service);
    match run_blocking(move || service.get(&uuid)).await {
        Ok(Some(report)) => json_response(&report),
        Ok(None) => not_found(),
        Err(response) => response,
    }
}

async fn get_count(State(state): State<ApiState>) -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        state.service.count().to_string(),
    )
        .into_response()
}

async fn get_ids(State(state): State<ApiState>) -> Response {
    let mut body = String::new();
    for id in state.service.ids() {
        match serde_json::to_string(&IdEntry { id: id.as_str() }) {
            Ok(line) => {
                body.push_str(&line);
                body.push('\n');
            }
            Err(err) => warn!(uuid = %id, error = %err, "couldn't encode special report id"),
        }
    }
    ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response()
}

async fn reload(State(state): State<ApiState>) -> Response {
    let service = Arc::clone(&state.service);
    match run_blocking(move || service.reload()).await {
        Ok(Ok(count)) => {
            info!(count, "reloaded special reports");
            StatusCode::OK.into_response()
        }
        Ok(Err(err)) => {
            warn!(error = %err, "problem reloading terms from TME");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string())
        }
        Err(response) => response,
    }
}

async fn health(State(state): State<ApiState>) -> Response {
    let service = Arc::clone(&state.service);
    let (ok, check_output) = match run_blocking(move || service.check_connectivity()).await {
        Ok(Ok(())) => (true, "Connectivity to TME is ok".to_string()),
        Ok(Err(err)) => (false, format!("Error connecting to TME: {err}")),
        Err(_) => (false, "Error connecting to TME: check did not complete".to_string()),
    };

    let report = HealthReport {
        schema_version: 1,
        name: "Special Reports Transformer Healthchecks",
        description: "Checks for accessing TME",
        checks: vec![HealthCheck {
            name: "Check connectivity to TME",
            ok,
            severity: 1,
            business_impact: "Unable to respond to request for the special report data from TME",
            technical_summary: "Cannot connect to TME to be able to supply special reports",
            panic_guide: "https://sites.google.com/a/ft.com/ft-technology-service-transition/home/run-book-library/specialReports-transfomer",
            check_output,
            last_updated: chrono::Utc::now().to_rfc3339(),
        }],
        ok,
    };
    json_response(&report)
}

async fn good_to_go(State(state): State<ApiState>) -> Response {
    let service = Arc::clone(&state.service);
    match run_blocking(move || service.check_connectivity()).await {
        Ok(Ok(())) => (StatusCode::OK, "OK").into_response(),
        Ok(Err(err)) => {
            warn!(error = %err, "good-to-go check failed");
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
        Err(_) => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

async fn ping() -> &'static str {
    "pong"
}

async fn build_info() -> Response {
    json_response(&json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "description": env!("CARGO_PKG_DESCRIPTION"),
    }))
}

async fn run_blocking<T, F>(work: F) -> Result<T, Response>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|err| {
        error!(error = %err, "blocking task failed");
        json_error(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string())
    })
}

fn json_response<T: Serialize>(value: &T) -> Response {
    match serde_json::to_vec(value) {
        Ok(body) => ([(header::CONTENT_TYPE, "application/json")], body).into_response(),
        Err(err) => {
            let err = TransformerError::Encoding(err.to_string());
            error!(error = %err, "error on json encoding");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string())
        }
    }
}

fn json_error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        [(header::CONTENT_TYPE, "application/json")],
    )
        .into_response()
}
