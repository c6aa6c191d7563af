use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use shiptrack_notify::{
    NewNotification, NotificationFilter, NotificationKind, NotificationStatus, NotifyError,
};

use crate::state::AppState;

pub async fn create(
    State(state): State<AppState>,
    Json(new): Json<NewNotification>,
) -> Response {
    match state.dispatcher.create(new).await {
        Ok(notification) => (StatusCode::CREATED, Json(notification)).into_response(),
        Err(err) => notify_error_response(err),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub user_id: String,
    #[serde(default)]
    pub status: Option<NotificationStatus>,
    #[serde(default)]
    pub kind: Option<NotificationKind>,
}

pub async fn list(State(state): State<AppState>, Query(params): Query<ListParams>) -> Response {
    let filter = NotificationFilter {
        status: params.status,
        kind: params.kind,
    };
    let notifications = state.dispatcher.list(&params.user_id, &filter).await;
    Json(notifications).into_response()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerParams {
    pub user_id: String,
}

pub async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<OwnerParams>,
) -> Response {
    match state.dispatcher.mark_read(&id, &params.user_id).await {
        Ok(notification) => Json(notification).into_response(),
        Err(err) => notify_error_response(err),
    }
}

pub async fn archive(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<OwnerParams>,
) -> Response {
    match state.dispatcher.archive(&id, &params.user_id).await {
        Ok(notification) => Json(notification).into_response(),
        Err(err) => notify_error_response(err),
    }
}

fn notify_error_response(err: NotifyError) -> Response {
    let status = match err {
        NotifyError::NotFound => StatusCode::NOT_FOUND,
        NotifyError::InvalidTransition { .. } => StatusCode::CONFLICT,
        NotifyError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}
