//! HTTP route handlers.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};

use crate::engine::{AllocationEngine, EngineStats};
use crate::error::EngineError;
use crate::models::{Doctor, PatientType, Token};

#[derive(Debug, Deserialize)]
pub struct BookRequest {
    pub doctor_id: Option<String>,
    pub slot_id: Option<String>,
    pub patient_name: Option<String>,
    pub patient_type: Option<PatientType>,
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub token_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub status: &'static str,
    pub token: Token,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promoted: Option<Token>,
}

#[derive(Debug, Deserialize)]
pub struct ScheduleQuery {
    pub doctor_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WaitlistQuery {
    pub doctor_id: Option<String>,
    pub slot_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub waitlist_enabled: bool,
    pub stats: EngineStats,
}

/// Engine error rendered as `{"error": ...}` with a matching status code.
#[derive(Debug)]
pub struct ApiError(EngineError);

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            EngineError::DoctorNotFound(_)
            | EngineError::SlotNotFound { .. }
            | EngineError::TokenNotFound(_) => StatusCode::NOT_FOUND,
            EngineError::SlotFull { .. } => StatusCode::CONFLICT,
            EngineError::InvalidRequest(_) | EngineError::Model(_) => StatusCode::BAD_REQUEST,
        };
        (
            status,
            Json(serde_json::json!({ "error": self.0.to_string() })),
        )
            .into_response()
    }
}

fn required(field: &str, value: Option<String>) -> Result<String, ApiError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(EngineError::InvalidRequest(format!("{field} is required")).into()),
    }
}

async fn book_token(
    State(engine): State<Arc<AllocationEngine>>,
    Json(request): Json<BookRequest>,
) -> Result<(StatusCode, Json<Token>), ApiError> {
    let doctor_id = required("doctor_id", request.doctor_id)?;
    let slot_id = required("slot_id", request.slot_id)?;
    let patient_name = required("patient_name", request.patient_name)?;
    let patient_type = request
        .patient_type
        .ok_or_else(|| EngineError::InvalidRequest("patient_type is required".to_string()))?;

    let token = engine.book_token(&doctor_id, &slot_id, &patient_name, patient_type)?;
    Ok((StatusCode::CREATED, Json(token)))
}

async fn cancel_token(
    State(engine): State<Arc<AllocationEngine>>,
    Json(request): Json<CancelRequest>,
) -> Result<Json<CancelResponse>, ApiError> {
    let token_id = required("token_id", request.token_id)?;
    let cancellation = engine.cancel_token(&token_id)?;
    Ok(Json(CancelResponse {
        status: "CANCELLED",
        token: cancellation.token,
        promoted: cancellation.promoted,
    }))
}

async fn get_schedule(
    State(engine): State<Arc<AllocationEngine>>,
    Query(query): Query<ScheduleQuery>,
) -> Result<Json<Doctor>, ApiError> {
    let doctor_id = required("doctor_id", query.doctor_id)?;
    Ok(Json(engine.get_doctor_schedule(&doctor_id)?))
}

async fn get_waitlist(
    State(engine): State<Arc<AllocationEngine>>,
    Query(query): Query<WaitlistQuery>,
) -> Result<Json<Vec<Token>>, ApiError> {
    let doctor_id = required("doctor_id", query.doctor_id)?;
    let slot_id = required("slot_id", query.slot_id)?;
    Ok(Json(engine.get_waitlist(&doctor_id, &slot_id)?))
}

async fn health(State(engine): State<Arc<AllocationEngine>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        waitlist_enabled: engine.config().waitlist_enabled,
        stats: engine.stats(),
    })
}

pub fn routes(engine: Arc<AllocationEngine>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/book", post(book_token))
        .route("/cancel", post(cancel_token))
        .route("/schedule", get(get_schedule))
        .route("/waitlist", get(get_waitlist))
        .with_state(engine)
}
