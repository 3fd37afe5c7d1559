use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use metrics::counter;
use serde_json::error::Category;
use subtle::ConstantTimeEq;
use tracing::{error, info, warn};

use jobtrack_core::ingest::ExtensionPayload;

use crate::problem::ProblemResponse;
use crate::router::AppState;

const HEADER_API_KEY: &str = "x-api-key";

/// Records a job application submitted by the browser extension.
pub async fn handle(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ProblemResponse> {
    authorize(&state, &headers).map_err(|problem| {
        counter!("extension_ingest_total", "result" => "unauthorized").increment(1);
        problem
    })?;

    let payload: ExtensionPayload = serde_json::from_slice(&body).map_err(|err| {
        counter!("extension_ingest_total", "result" => "invalid").increment(1);
        match err.classify() {
            Category::Data => ProblemResponse::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                "invalid_payload",
                format!("payload does not describe a posting: {err}"),
            ),
            _ => ProblemResponse::new(
                StatusCode::BAD_REQUEST,
                "invalid_json",
                format!("failed to parse payload: {err}"),
            ),
        }
    })?;

    let data = payload.into_new_application(state.now());
    let created = state
        .repositories()
        .job_applications
        .create(data)
        .await
        .map_err(|err| match err.validation() {
            Some(validation) => {
                counter!("extension_ingest_total", "result" => "invalid").increment(1);
                warn!(stage = "ingest", error = %err, "extension payload rejected");
                ProblemResponse::validation(validation)
            }
            None => {
                counter!("extension_ingest_total", "result" => "error").increment(1);
                error!(stage = "ingest", error = %err, "failed to store extension application");
                ProblemResponse::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "storage_error",
                    "failed to store application",
                )
            }
        })?;

    counter!("extension_ingest_total", "result" => "created").increment(1);
    info!(
        stage = "ingest",
        id = %created.id,
        company = %created.company,
        "extension application recorded"
    );
    Ok((StatusCode::CREATED, Json(created)).into_response())
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ProblemResponse> {
    let Some(expected) = state.extension_api_key() else {
        warn!(
            stage = "ingest",
            "extension request refused: no api key configured"
        );
        return Err(unauthorized("extension ingestion is not enabled"));
    };

    let provided = headers
        .get(HEADER_API_KEY)
        .map(|value| value.as_bytes())
        .ok_or_else(|| unauthorized("missing x-api-key header"))?;

    if expected.as_bytes().ct_eq(provided).into() {
        Ok(())
    } else {
        warn!(
            stage = "ingest",
            "extension request refused: api key mismatch"
        );
        Err(unauthorized("invalid api key"))
    }
}

fn unauthorized(detail: &'static str) -> ProblemResponse {
    ProblemResponse::new(StatusCode::UNAUTHORIZED, "unauthorized", detail)
}
