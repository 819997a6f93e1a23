//! Time Frame handlers

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use super::{envelope, json_body, service_error};
use crate::application::filter::QueryParams;
use crate::application::services::{TIME_FRAME_RELOAD_QUERY, TimeFrameInput};
use crate::domain::types::EntityType;
use crate::infra::http::error::ApiError;
use crate::infra::http::messages::Action;
use crate::infra::http::params::ApiQuery;
use crate::infra::http::resources::{Renderer, collection};
use crate::infra::http::state::ApiState;

const ENTITY: EntityType = EntityType::TimeFrame;

pub async fn list_time_frames(
    State(state): State<ApiState>,
    ApiQuery(params): ApiQuery,
) -> Result<impl IntoResponse, ApiError> {
    let to_api = service_error(ENTITY, Action::List);
    let page = state.time_frames.list(&params).await.map_err(to_api)?;

    let renderer = Renderer::new(&state, ENTITY, &params);
    let mut data = Vec::with_capacity(page.data.len());
    for time_frame in &page.data {
        data.push(renderer.time_frame(time_frame).await.map_err(to_api)?);
    }

    Ok(Json(collection(ENTITY, &page, data, &params)))
}

pub async fn show_time_frame(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    ApiQuery(params): ApiQuery,
) -> Result<impl IntoResponse, ApiError> {
    let to_api = service_error(ENTITY, Action::Show);
    let time_frame = state.time_frames.get(&id, &params).await.map_err(to_api)?;
    let data = Renderer::new(&state, ENTITY, &params)
        .time_frame(&time_frame)
        .await
        .map_err(to_api)?;

    Ok(envelope(StatusCode::OK, ENTITY, Action::Show, Some(data)))
}

pub async fn create_time_frame(
    State(state): State<ApiState>,
    payload: Result<Json<TimeFrameInput>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let to_api = service_error(ENTITY, Action::Create);
    let input = json_body(payload)?;
    let time_frame = state.time_frames.create(input).await.map_err(to_api)?;
    let data = Renderer::new(&state, ENTITY, &Default::default())
        .time_frame(&time_frame)
        .await
        .map_err(to_api)?;

    Ok(envelope(StatusCode::CREATED, ENTITY, Action::Create, Some(data)))
}

pub async fn update_time_frame(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    payload: Result<Json<TimeFrameInput>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let to_api = service_error(ENTITY, Action::Update);
    let input = json_body(payload)?;
    let time_frame = state.time_frames.update(&id, input).await.map_err(to_api)?;
    let data = Renderer::new(&state, ENTITY, &QueryParams::parse(TIME_FRAME_RELOAD_QUERY))
        .time_frame(&time_frame)
        .await
        .map_err(to_api)?;

    Ok(envelope(StatusCode::OK, ENTITY, Action::Update, Some(data)))
}

pub async fn delete_time_frame(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .time_frames
        .delete(&id)
        .await
        .map_err(service_error(ENTITY, Action::Delete))?;

    Ok(envelope(StatusCode::OK, ENTITY, Action::Delete, None))
}
