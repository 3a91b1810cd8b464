//! HTTP request handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use rates_types::{AppError, QueryError, RateStore, parse_effective_date};

use crate::RateQueryService;

/// Application state shared across handlers.
pub struct AppState<S: RateStore> {
    pub service: RateQueryService<S>,
}

/// Wrapper to implement IntoResponse for AppError (orphan rule workaround).
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        ApiError(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Internal(msg) => {
                tracing::error!("Query failed: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
        };

        let body = serde_json::json!({
            "error": message,
            "code": status.as_u16()
        });

        (status, Json(body)).into_response()
    }
}

/// Health check endpoint.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy" }))
}

/// Rates of the most recent publication date.
#[tracing::instrument(skip(state))]
pub async fn latest_rates<S: RateStore>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<impl IntoResponse, ApiError> {
    let rates = state.service.latest_rates().await?;
    Ok(Json(rates))
}

#[derive(Debug, Deserialize)]
pub struct RatesParams {
    pub date: Option<String>,
}

/// Rates for `?date=`, or the latest rates when the parameter is absent.
#[tracing::instrument(skip(state))]
pub async fn rates_by_date<S: RateStore>(
    State(state): State<Arc<AppState<S>>>,
    Query(params): Query<RatesParams>,
) -> Result<impl IntoResponse, ApiError> {
    let date = params
        .date
        .as_deref()
        .map(parse_effective_date)
        .transpose()
        .map_err(AppError::from)?;

    let rates = state.service.rates_by_date(date).await?;
    Ok(Json(rates))
}

/// Distinct publication dates, newest first.
#[tracing::instrument(skip(state))]
pub async fn publication_dates<S: RateStore>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<impl IntoResponse, ApiError> {
    let dates = state.service.publication_dates().await?;
    Ok(Json(dates))
}

/// History of one currency code.
#[tracing::instrument(skip(state))]
pub async fn history<S: RateStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let points = state.service.history(&code).await?;
    Ok(Json(points))
}
