use std::borrow::Cow;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::{Value, json};

use super::messages::{self, Action};
use crate::application::error::{ErrorReport, ServiceError};
use crate::application::repos::RepoError;
use crate::domain::error::DomainError;
use crate::domain::types::EntityType;

const REPORT_SOURCE: &str = "infra::http";

/// Public JSON envelope shared by successful and failed responses.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub status: u16,
    pub message: Cow<'static, str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: Cow<'static, str>,
    data: Option<Value>,
    report: Vec<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            status,
            message: message.into(),
            data: None,
            report: Vec::new(),
        }
    }

    pub fn not_found(entity: EntityType) -> Self {
        Self::new(StatusCode::NOT_FOUND, messages::not_found(entity))
    }

    /// 422 carrying the offending field, when one is known.
    pub fn unprocessable(message: impl Into<String>, field: Option<&str>) -> Self {
        let message = message.into();
        let data = field.map(|field| json!({ "errors": { field: [message.clone()] } }));
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: Cow::Owned(message),
            data,
            report: Vec::new(),
        }
    }

    pub fn internal(message: &'static str, error: &dyn std::error::Error) -> Self {
        let report = ErrorReport::from_error(REPORT_SOURCE, StatusCode::INTERNAL_SERVER_ERROR, error);
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: Cow::Borrowed(message),
            data: None,
            report: report.messages,
        }
    }

    pub fn from_service(entity: EntityType, action: Action, error: ServiceError) -> Self {
        if error.is_not_found() {
            return Self::not_found(entity);
        }
        match error {
            ServiceError::Domain(DomainError::Validation { field, message }) => {
                Self::unprocessable(message, Some(field))
            }
            ServiceError::Repo(RepoError::InvalidInput { message }) => {
                Self::unprocessable(message, None)
            }
            other => Self::internal(messages::failure(entity, action), &other),
        }
    }

    pub fn from_rejection(rejection: JsonRejection) -> Self {
        let status = match rejection {
            JsonRejection::MissingJsonContentType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            JsonRejection::JsonSyntaxError(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::UNPROCESSABLE_ENTITY,
        };
        Self::new(status, rejection.body_text())
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let report = if self.report.is_empty() {
            ErrorReport::from_message(REPORT_SOURCE, self.status, self.message.clone())
        } else {
            ErrorReport {
                source: REPORT_SOURCE,
                status: self.status,
                messages: self.report,
            }
        };

        let body = Envelope {
            status: self.status.as_u16(),
            message: self.message,
            data: self.data,
        };
        let mut response = (self.status, Json(body)).into_response();
        report.attach(&mut response);
        response
    }
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;

    use super::*;

    async fn body_json(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn missing_records_map_to_404_envelope() {
        let error = ApiError::from_service(
            EntityType::TimeFrame,
            Action::Show,
            ServiceError::Repo(RepoError::NotFound),
        );
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.extensions().get::<ErrorReport>().is_some());
        assert_eq!(
            body_json(response).await,
            json!({ "status": 404, "message": "TimeFrame not found" })
        );
    }

    #[tokio::test]
    async fn field_validation_lists_the_field() {
        let error = ApiError::from_service(
            EntityType::Preference,
            Action::Create,
            DomainError::invalid_field("currency", "must be 3 letters").into(),
        );
        assert_eq!(error.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            body_json(error.into_response()).await,
            json!({
                "status": 422,
                "message": "must be 3 letters",
                "data": { "errors": { "currency": ["must be 3 letters"] } }
            })
        );
    }

    #[tokio::test]
    async fn persistence_failures_use_action_message_and_keep_detail_out_of_body() {
        let error = ApiError::from_service(
            EntityType::TimeFrame,
            Action::List,
            ServiceError::Repo(RepoError::Persistence("connection reset".to_string())),
        );
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let report = response.extensions().get::<ErrorReport>().cloned().unwrap();
        assert!(report.messages[0].contains("connection reset"));
        assert_eq!(
            body_json(response).await,
            json!({ "status": 500, "message": "Timeframes Retrieval Error" })
        );
    }
}
