//! API handlers organized by resource type.
//!
//! Helpers for envelopes and error conversion are defined here and shared
//! across modules.

mod preferences;
mod projects;
mod time_entries;
mod time_frames;

pub use preferences::*;
pub use projects::*;
pub use time_entries::*;
pub use time_frames::*;

use std::borrow::Cow;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::Value;

use super::error::{ApiError, Envelope};
use super::messages::{self, Action};
use crate::application::error::ServiceError;
use crate::domain::types::EntityType;

fn envelope(status: StatusCode, entity: EntityType, action: Action, data: Option<Value>) -> Response {
    let body = Envelope {
        status: status.as_u16(),
        message: Cow::Borrowed(messages::success(entity, action)),
        data,
    };
    (status, Json(body)).into_response()
}

fn service_error(
    entity: EntityType,
    action: Action,
) -> impl Fn(ServiceError) -> ApiError + Copy {
    move |err| ApiError::from_service(entity, action, err)
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(ApiError::from_rejection)
}
