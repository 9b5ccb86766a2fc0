//! Status thing API handlers
//!
//! Each handler decodes the request, makes one or two provider calls and
//! encodes the result. Errors are converted to [`ApiError`] responses.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{de::DeserializeOwned, Deserialize};
use tracing::instrument;

use super::error::ApiError;
use crate::model::{NewStatusThing, Status, StatusThing};
use crate::provider::Provider;

/// Shared state for the API handlers
#[derive(Clone)]
pub struct ApiState {
    provider: Arc<dyn Provider>,
}

impl ApiState {
    /// Create handler state around a provider
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }
}

/// Body of a status update request
#[derive(Debug, Default, Deserialize)]
struct StatusUpdate {
    #[serde(default)]
    status: Status,
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request(format!("invalid request body: {}", e)))
}

/// `GET /`: every status thing
#[instrument(skip(state))]
pub async fn list_things(State(state): State<ApiState>) -> Result<Json<Vec<StatusThing>>, ApiError> {
    let things = state.provider.all().await?;
    Ok(Json(things))
}

/// `GET /{id}`: one status thing
#[instrument(skip(state))]
pub async fn get_thing(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<StatusThing>, ApiError> {
    let thing = state.provider.get(&id).await?;
    Ok(Json(thing))
}

/// `PUT /`: create a status thing from `{name, description, status}`
///
/// Any `id` in the body is ignored.
#[instrument(skip(state, body))]
pub async fn create_thing(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<Json<StatusThing>, ApiError> {
    let requested: StatusThing = decode(&body)?;
    let created = state
        .provider
        .add(NewStatusThing::new(
            requested.name,
            requested.description,
            requested.status,
        ))
        .await?;

    tracing::info!(id = %created.id, name = %created.name, "created status thing");
    Ok(Json(created))
}

/// `POST /{id}`: change the status from `{status}`; empty body on success
#[instrument(skip(state, body))]
pub async fn update_status(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let update: StatusUpdate = decode(&body)?;
    state.provider.set_status(&id, update.status).await?;
    Ok(StatusCode::OK)
}

/// `DELETE /{id}`: remove a status thing, responding with its last state
#[instrument(skip(state))]
pub async fn delete_thing(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<StatusThing>, ApiError> {
    let thing = state.provider.get(&id).await?;
    state.provider.remove(&id).await?;

    tracing::info!(id = %thing.id, "deleted status thing");
    Ok(Json(thing))
}
