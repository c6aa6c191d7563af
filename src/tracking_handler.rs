use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use shiptrack_carriers::{TrackingError, TrackingResult};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackParams {
    pub tracking_number: String,
    pub carrier_code: Option<String>,
}

pub async fn track(State(state): State<AppState>, Query(params): Query<TrackParams>) -> Response {
    match state
        .aggregator
        .track(&params.tracking_number, params.carrier_code.as_deref())
        .await
    {
        Ok(result) => Json(result).into_response(),
        Err(err) => tracking_error_response(err),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub tracking_numbers: Vec<String>,
    #[serde(default)]
    pub carrier_code: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchItem {
    tracking_number: String,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<TrackingResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub async fn track_batch(
    State(state): State<AppState>,
    Json(request): Json<BatchRequest>,
) -> Response {
    let outcomes = state
        .aggregator
        .track_batch(&request.tracking_numbers, request.carrier_code.as_deref())
        .await;

    let results: Vec<BatchItem> = outcomes
        .into_iter()
        .map(|item| match item.outcome {
            Ok(result) => BatchItem {
                tracking_number: item.tracking_number,
                ok: true,
                result: Some(result),
                error: None,
            },
            Err(err) => BatchItem {
                tracking_number: item.tracking_number,
                ok: false,
                result: None,
                error: Some(err.to_string()),
            },
        })
        .collect();

    Json(json!({ "results": results })).into_response()
}

pub async fn list_carriers(State(state): State<AppState>) -> Response {
    Json(state.aggregator.registry().list()).into_response()
}

pub async fn health(State(state): State<AppState>) -> Response {
    let carriers = state.aggregator.registry().health();
    let database_up = state.store.is_available().await;

    Json(json!({
        "status": if database_up { "ok" } else { "degraded" },
        "carriers": carriers,
        "database": {
            "status": if database_up { "up" } else { "down" },
            "backend": state.store.name(),
        },
        "cache": {
            "status": "up",
            "entries": state.aggregator.cached_entry_count(),
        },
    }))
    .into_response()
}

fn tracking_error_response(err: TrackingError) -> Response {
    let status = if err.is_client_error() {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::BAD_GATEWAY
    };
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}
