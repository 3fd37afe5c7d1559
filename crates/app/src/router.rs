use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;

use jobtrack_core::clock::{system_clock, Clock};
use jobtrack_storage::Repositories;

use crate::{extension, telemetry};

#[derive(Clone)]
pub struct AppState {
    metrics: PrometheusHandle,
    repositories: Repositories,
    extension_api_key: Option<Arc<str>>,
    clock: Clock,
}

impl AppState {
    pub fn new(
        metrics: PrometheusHandle,
        repositories: Repositories,
        extension_api_key: Option<String>,
    ) -> Self {
        Self {
            metrics,
            repositories,
            extension_api_key: extension_api_key.map(Arc::from),
            clock: system_clock(),
        }
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn metrics(&self) -> &PrometheusHandle {
        &self.metrics
    }

    pub fn repositories(&self) -> &Repositories {
        &self.repositories
    }

    pub fn extension_api_key(&self) -> Option<&str> {
        self.extension_api_key.as_deref()
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route("/api/extension/applications", post(extension::handle))
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = telemetry::render_metrics(state.metrics());
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
        .body(Body::from(body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use chrono::TimeZone;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use jobtrack_core::clock::{fixed_clock, sequential_ids};
    use jobtrack_core::status::StatusLabel;

    const API_KEY: &str = "extension-test-key";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 30, 0).unwrap()
    }

    fn setup_state(api_key: Option<&str>) -> AppState {
        let metrics = telemetry::init_metrics().expect("metrics init");
        let repositories = Repositories::in_memory(sequential_ids(), fixed_clock(now()));
        AppState::new(metrics, repositories, api_key.map(str::to_string))
            .with_clock(fixed_clock(now()))
    }

    fn submit(key: Option<&str>, body: String) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/extension/applications")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(key) = key {
            builder = builder.header("x-api-key", key);
        }
        builder.body(Body::from(body)).unwrap()
    }

    fn posting() -> String {
        json!({
            "company": "Acme",
            "position": "Platform Engineer",
            "job_posting_url": "https://boards.greenhouse.io/acme/jobs/1"
        })
        .to_string()
    }

    async fn json_body(response: Response) -> Value {
        let collected = response
            .into_body()
            .collect()
            .await
            .expect("body should read");
        serde_json::from_slice(&collected.to_bytes()).expect("json body")
    }

    #[tokio::test]
    async fn healthz_returns_ok() {
        let app = app_router(setup_state(None));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/healthz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .expect("handler should respond");

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn metrics_exports_build_info() {
        let app = app_router(setup_state(None));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .expect("handler should respond");

        assert_eq!(response.status(), StatusCode::OK);
        let collected = response
            .into_body()
            .collect()
            .await
            .expect("body should read");
        let body = String::from_utf8(collected.to_bytes().to_vec()).expect("utf-8");
        assert!(body.contains("app_build_info"));
        assert!(body.contains("app_uptime_seconds"));
    }

    #[tokio::test]
    async fn extension_submission_creates_applied_application() {
        let state = setup_state(Some(API_KEY));
        let repositories = state.repositories().clone();
        let app = app_router(state);

        let response = app
            .oneshot(submit(Some(API_KEY), posting()))
            .await
            .expect("handler should respond");
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = json_body(response).await;
        assert_eq!(body["company"], "Acme");
        assert_eq!(body["position_title"], "Platform Engineer");

        let stored = repositories.job_applications.get_all().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].status().label(), StatusLabel::Applied);
        assert_eq!(
            stored[0].application_date,
            Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn wrong_or_missing_key_is_unauthorized() {
        let state = setup_state(Some(API_KEY));
        let repositories = state.repositories().clone();
        let app = app_router(state);

        for key in [None, Some("not-the-key"), Some("extension-test-ke")] {
            let response = app
                .clone()
                .oneshot(submit(key, posting()))
                .await
                .expect("handler should respond");
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "key {key:?}");
            assert_eq!(
                response.headers()[header::CONTENT_TYPE],
                "application/problem+json"
            );
        }
        let stored = repositories.job_applications.get_all().await.unwrap();
        assert!(stored.is_empty());
    }

    #[tokio::test]
    async fn unconfigured_key_refuses_everything() {
        let app = app_router(setup_state(None));

        let response = app
            .oneshot(submit(Some(API_KEY), posting()))
            .await
            .expect("handler should respond");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn blank_fields_are_reported_as_problems() {
        let app = app_router(setup_state(Some(API_KEY)));
        let body = json!({ "company": "   ", "position": "" }).to_string();

        let response = app
            .oneshot(submit(Some(API_KEY), body))
            .await
            .expect("handler should respond");
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/problem+json"
        );

        let problem = json_body(response).await;
        assert_eq!(problem["type"], "validation_failed");
        let fields: Vec<&str> = problem["errors"]
            .as_array()
            .expect("errors array")
            .iter()
            .filter_map(|issue| issue["field"].as_str())
            .collect();
        assert!(fields.contains(&"company"));
        assert!(fields.contains(&"position_title"));
    }

    #[tokio::test]
    async fn missing_fields_and_broken_json_are_distinguished() {
        let app = app_router(setup_state(Some(API_KEY)));
        let partial = json!({ "company": "Acme" }).to_string();

        let response = app
            .clone()
            .oneshot(submit(Some(API_KEY), partial))
            .await
            .expect("handler should respond");
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let response = app
            .oneshot(submit(Some(API_KEY), "{\"company\":".to_string()))
            .await
            .expect("handler should respond");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
