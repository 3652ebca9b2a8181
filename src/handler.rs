use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::info;

use crate::error::ServiceError;
use crate::model::{AddBook, CreateList, UpdateList};
use crate::service::DataService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<dyn DataService>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

fn error(status: StatusCode, msg: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: msg.to_string(),
        }),
    )
        .into_response()
}

fn deleted() -> Response {
    (StatusCode::OK, Json(SuccessResponse { success: true })).into_response()
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        match &self {
            ServiceError::Validation(msg) => error(StatusCode::BAD_REQUEST, msg),
            ServiceError::NotFound { entity, .. } => {
                error(StatusCode::NOT_FOUND, &format!("{entity} not found"))
            }
            ServiceError::Storage(e) => {
                tracing::error!(error = %format!("{e:#}"), "storage failure");
                error(StatusCode::INTERNAL_SERVER_ERROR, "storage failure")
            }
            ServiceError::Transport(e) => {
                tracing::error!(error = %e, "upstream failure");
                error(StatusCode::BAD_GATEWAY, "upstream failure")
            }
        }
    }
}

pub async fn healthcheck() -> impl IntoResponse {
    info!("got healthcheck request");
    Json(serde_json::json!({ "status": "ok" }))
}

pub async fn get_lists(State(state): State<AppState>) -> Result<Response, ServiceError> {
    let lists = state.service.get_lists().await?;
    Ok((StatusCode::OK, Json(lists)).into_response())
}

pub async fn create_list(
    State(state): State<AppState>,
    Json(payload): Json<CreateList>,
) -> Result<Response, ServiceError> {
    let list = state
        .service
        .create_list(&payload.title, payload.description.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(list)).into_response())
}

pub async fn get_list(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ServiceError> {
    match state.service.get_list_details(&id).await? {
        Some(detail) => Ok((StatusCode::OK, Json(detail)).into_response()),
        None => Ok(error(StatusCode::NOT_FOUND, "Not found")),
    }
}

pub async fn update_list(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateList>,
) -> Result<Response, ServiceError> {
    let list = state
        .service
        .update_list(&id, &payload.title, payload.description.as_deref())
        .await?;
    Ok((StatusCode::OK, Json(list)).into_response())
}

pub async fn delete_list(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ServiceError> {
    state.service.delete_list(&id).await?;
    Ok(deleted())
}

pub async fn add_book(
    State(state): State<AppState>,
    Json(payload): Json<AddBook>,
) -> Result<Response, ServiceError> {
    let book = state
        .service
        .add_book(&payload.list_id, &payload.title, &payload.url)
        .await?;
    Ok((StatusCode::CREATED, Json(book)).into_response())
}

pub async fn delete_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ServiceError> {
    state.service.delete_book(&id).await?;
    Ok(deleted())
}
