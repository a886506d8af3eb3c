use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use chrono::{Datelike, Local};
use serde::Serialize;

use crate::db;
use crate::domain::{Month, Purchase};
use crate::error::Error;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub data: T,
}

pub struct AppError(Error);

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self.0 {
            Error::NotFound => (StatusCode::NOT_FOUND, "purchase not found".to_string()),
            Error::InvalidArgument(msg) => (StatusCode::BAD_REQUEST, msg),
            err => {
                tracing::error!("request failed: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        (
            status,
            Json(serde_json::json!({ "message": error_message })),
        )
            .into_response()
    }
}

pub async fn home() -> Redirect {
    let today = Local::now().date_naive();
    Redirect::to(&format!(
        "/api/purchases/{:04}/{:02}",
        today.year(),
        today.month()
    ))
}

pub async fn get_purchases(
    State(state): State<Arc<AppState>>,
    Path((year, month)): Path<(i32, u32)>,
) -> Result<Json<DataResponse<Vec<Purchase>>>, AppError> {
    let month = Month::new(year, month)
        .ok_or_else(|| Error::InvalidArgument(format!("invalid month {}-{}", year, month)))?;

    let purchases = db::query_purchases(&state.pool, month).await?;
    Ok(Json(DataResponse { data: purchases }))
}

pub async fn get_purchase(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DataResponse<Purchase>>, AppError> {
    let purchase = db::query_purchase(&state.pool, &id).await?;
    Ok(Json(DataResponse { data: purchase }))
}

pub async fn delete_purchase(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    db::delete_purchase(&state.pool, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
