use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use tower::ServiceExt;

use special_reports_transformer::api::{SpecialReportService, router};
use special_reports_transformer::catalog::{Catalog, CatalogSettings};
use special_reports_transformer::domain::{ExternalId, RawTerm, SpecialReport, SpecialReportLink};
use special_reports_transformer::error::TransformerError;
use special_reports_transformer::identity::derive_external_id;
use special_reports_transformer::tme::TermSource;
use special_reports_transformer::transform::transform_special_report;

const TAXONOMY: &str = "SpecialReports";
const BASE_URL: &str = "http://localhost:8080/transformers/special-reports/";
const TEST_UUID: &str = "ccd5cc74-1f1b-3ac6-a563-e36dff51926c";
const GET_SPECIAL_REPORTS_RESPONSE: &str = r#"[{"apiUrl":"http://localhost:8080/transformers/special-reports/ccd5cc74-1f1b-3ac6-a563-e36dff51926c"}]"#;
const GET_SPECIAL_REPORT_BY_UUID_RESPONSE: &str = r#"{"uuid":"ccd5cc74-1f1b-3ac6-a563-e36dff51926c","alternativeIdentifiers":{"TME":["YjgzMzc1NTktYWMwOC0zNDA0LTkwMjUtYmFkNTFlYmUyZmM3-U3BlY2lhbFJlcG9ydHM="],"uuids":["ccd5cc74-1f1b-3ac6-a563-e36dff51926c"]},"prefLabel":"Global Special Reports","type":"Special Report"}"#;

#[derive(Default)]
struct DummyService {
    terms: Vec<RawTerm>,
    found: bool,
    disconnected: bool,
    reload_fails: bool,
}

impl DummyService {
    fn with_report() -> Self {
        Self {
            terms: vec![RawTerm::new(
                "Global Special Reports",
                "b8337559-ac08-3404-9025-bad51ebe2fc7",
            )],
            found: true,
            ..Self::default()
        }
    }
}

impl SpecialReportService for DummyService {
    fn count(&self) -> usize {
        self.terms.len()
    }

    fn ids(&self) -> Vec<ExternalId> {
        self.terms
            .iter()
            .map(|term| derive_external_id(&term.raw_id, TAXONOMY))
            .collect()
    }

    fn links(&self) -> Option<Vec<SpecialReportLink>> {
        if !self.found {
            return None;
        }
        Some(
            self.ids()
                .iter()
                .map(|id| SpecialReportLink::new(BASE_URL, id))
                .collect(),
        )
    }

    fn get(&self, id: &str) -> Option<SpecialReport> {
        if !self.found {
            return None;
        }
        self.terms
            .iter()
            .map(|term| transform_special_report(term, TAXONOMY))
            .find(|report| report.uuid == id)
    }

    fn reload(&self) -> Result<usize, TransformerError> {
        if self.reload_fails {
            return Err(TransformerError::SourceUnavailable {
                offset: 0,
                source: Box::new(TransformerError::TmeHttp("boom".to_string())),
            });
        }
        Ok(self.terms.len())
    }

    fn check_connectivity(&self) -> Result<(), TransformerError> {
        if self.disconnected {
            return Err(TransformerError::TmeHttp("connection refused".to_string()));
        }
        Ok(())
    }
}

fn app(service: impl SpecialReportService) -> Router {
    router(Arc::new(service))
}

async fn send(router: Router, method: &str, uri: &str) -> Response {
    router
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn content_type(response: &Response) -> &str {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

#[tokio::test]
async fn get_special_report_by_uuid() {
    let response = send(
        app(DummyService::with_report()),
        "GET",
        &format!("/transformers/special-reports/{TEST_UUID}"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(content_type(&response), "application/json");
    assert_eq!(body_text(response).await, GET_SPECIAL_REPORT_BY_UUID_RESPONSE);
}

#[tokio::test]
async fn get_special_report_by_uuid_not_found() {
    let service = DummyService {
        found: false,
        ..DummyService::with_report()
    };
    let response = send(
        app(service),
        "GET",
        &format!("/transformers/special-reports/{TEST_UUID}"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(content_type(&response), "application/json");
    assert_eq!(body_text(response).await, "");
}

#[tokio::test]
async fn get_special_reports() {
    let response = send(
        app(DummyService::with_report()),
        "GET",
        "/transformers/special-reports",
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, GET_SPECIAL_REPORTS_RESPONSE);
}

#[tokio::test]
async fn get_special_reports_not_found() {
    let response = send(
        app(DummyService::default()),
        "GET",
        "/transformers/special-reports",
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_text(response).await, "");
}

#[tokio::test]
async fn get_count() {
    let response = send(
        app(DummyService::with_report()),
        "GET",
        "/transformers/special-reports/__count",
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "1");
}

#[tokio::test]
async fn get_ids() {
    let response = send(
        app(DummyService::with_report()),
        "GET",
        "/transformers/special-reports/__ids",
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(content_type(&response).starts_with("text/plain"));
    assert_eq!(body_text(response).await, format!("{{\"id\":\"{TEST_UUID}\"}}\n"));
}

#[tokio::test]
async fn get_ids_when_empty() {
    let response = send(
        app(DummyService::default()),
        "GET",
        "/transformers/special-reports/__ids",
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "");
}

#[tokio::test]
async fn reload_succeeds() {
    let response = send(
        app(DummyService::with_report()),
        "POST",
        "/transformers/special-reports/__reload",
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn reload_failure_is_an_internal_error() {
    let service = DummyService {
        reload_fails: true,
        ..DummyService::with_report()
    };
    let response = send(app(service), "POST", "/transformers/special-reports/__reload").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(
        body["message"],
        "special reports source unavailable at offset 0"
    );
}

#[tokio::test]
async fn reload_requires_post() {
    let response = send(
        app(DummyService::with_report()),
        "GET",
        "/transformers/special-reports/__reload",
    )
    .await;

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn good_to_go_reflects_connectivity() {
    let response = send(app(DummyService::with_report()), "GET", "/__gtg").await;
    assert_eq!(response.status(), StatusCode::OK);

    let service = DummyService {
        disconnected: true,
        ..DummyService::with_report()
    };
    let response = send(app(service), "GET", "/__gtg").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn health_reports_tme_check() {
    let service = DummyService {
        disconnected: true,
        ..DummyService::with_report()
    };
    let response = send(app(service), "GET", "/__health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["ok"], false);
    assert_eq!(body["checks"][0]["name"], "Check connectivity to TME");
    assert_eq!(body["checks"][0]["ok"], false);
    assert_eq!(body["checks"][0]["severity"], 1);
}

#[tokio::test]
async fn ping_and_build_info() {
    let response = send(app(DummyService::default()), "GET", "/__ping").await;
    assert_eq!(body_text(response).await, "pong");

    let response = send(app(DummyService::default()), "GET", "/__build-info").await;
    let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["name"], "special-reports-transformer");
}

struct SingleTermSource(RawTerm);

impl TermSource for SingleTermSource {
    fn list_page(&self, offset: usize) -> Result<Vec<RawTerm>, TransformerError> {
        if offset == 0 {
            return Ok(vec![self.0.clone()]);
        }
        Ok(Vec::new())
    }

    fn fetch_by_raw_id(&self, raw_id: &str) -> Result<RawTerm, TransformerError> {
        if raw_id == self.0.raw_id {
            return Ok(self.0.clone());
        }
        Err(TransformerError::TmeStatus {
            status: 404,
            message: "not found".to_string(),
        })
    }

    fn check_connectivity(&self) -> Result<(), TransformerError> {
        Ok(())
    }
}

#[tokio::test]
async fn serves_a_loaded_catalog() {
    let catalog = Catalog::load(
        SingleTermSource(RawTerm::new(
            "Business Guide to Manchester 2012",
            "8f57aae4-d6f1-4322-88b0-9d9f176ffd8c",
        )),
        CatalogSettings {
            base_url: BASE_URL.to_string(),
            taxonomy_name: TAXONOMY.to_string(),
            page_size: 100,
        },
    )
    .unwrap();
    let router = app(catalog);

    let response = send(
        router.clone(),
        "GET",
        "/transformers/special-reports/a39edaf1-534d-33b8-9e6b-d80137e75ef8",
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["prefLabel"], "Business Guide to Manchester 2012");
    assert_eq!(body["type"], "Special Report");

    let response = send(router.clone(), "GET", "/transformers/special-reports/unknown").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(router, "GET", "/transformers/special-reports/__count").await;
    assert_eq!(body_text(response).await, "1");
}
