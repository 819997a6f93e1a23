use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::application::filter::QueryParams;

/// The raw query string parsed into the translator's parameter map, in transport order.
#[derive(Debug, Clone, Default)]
pub struct ApiQuery(pub QueryParams);

impl<S> FromRequestParts<S> for ApiQuery
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(QueryParams::parse(parts.uri.query().unwrap_or(""))))
    }
}
