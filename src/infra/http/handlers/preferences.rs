//! Preference handlers

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use super::{envelope, json_body, service_error};
use crate::application::services::PreferenceInput;
use crate::domain::types::EntityType;
use crate::infra::http::error::ApiError;
use crate::infra::http::messages::Action;
use crate::infra::http::params::ApiQuery;
use crate::infra::http::resources::Renderer;
use crate::infra::http::state::ApiState;

const ENTITY: EntityType = EntityType::Preference;

/// The installation's single preference record.
pub async fn show_preferences(
    State(state): State<ApiState>,
    ApiQuery(params): ApiQuery,
) -> Result<impl IntoResponse, ApiError> {
    let preference = state
        .preferences
        .current(&params)
        .await
        .map_err(service_error(ENTITY, Action::List))?;
    let data = Renderer::new(&state, ENTITY, &params).preference(&preference);

    Ok(envelope(StatusCode::OK, ENTITY, Action::List, Some(data)))
}

pub async fn create_preferences(
    State(state): State<ApiState>,
    payload: Result<Json<PreferenceInput>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let input = json_body(payload)?;
    let preference = state
        .preferences
        .create(input)
        .await
        .map_err(service_error(ENTITY, Action::Create))?;
    let data = Renderer::new(&state, ENTITY, &Default::default()).preference(&preference);

    Ok(envelope(StatusCode::CREATED, ENTITY, Action::Create, Some(data)))
}

pub async fn update_preferences(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    payload: Result<Json<PreferenceInput>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let input = json_body(payload)?;
    let preference = state
        .preferences
        .update(&id, input)
        .await
        .map_err(service_error(ENTITY, Action::Update))?;
    let data = Renderer::new(&state, ENTITY, &Default::default()).preference(&preference);

    Ok(envelope(StatusCode::OK, ENTITY, Action::Update, Some(data)))
}
