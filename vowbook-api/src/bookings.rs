use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use vowbook_core::Caller;
use vowbook_order::{Booking, BookingModification, BookingQuery, CreateBookingRequest, ModificationChange};
use vowbook_shared::Page;

use crate::error::AppError;
use crate::extract::{optional_json, AppJson};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CancelBookingRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateModificationRequest {
    pub requested_changes: ModificationChange,
    pub reason: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", post(create_booking).get(list_bookings))
        .route("/v1/bookings/{id}", get(get_booking))
        .route("/v1/bookings/{id}/cancel", post(cancel_booking))
        .route(
            "/v1/bookings/{id}/modifications",
            post(request_modification).get(list_modifications),
        )
}

async fn create_booking(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    AppJson(req): AppJson<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let booking = state.coordinator.create_booking(&caller, req).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

async fn list_bookings(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<BookingQuery>,
) -> Result<Json<Page<Booking>>, AppError> {
    Ok(Json(state.coordinator.list_bookings(&caller, query).await?))
}

async fn get_booking(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.coordinator.get_booking(&caller, id).await?))
}

async fn cancel_booking(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<Booking>, AppError> {
    let req: CancelBookingRequest = optional_json(&body)?;
    Ok(Json(state.workflow.cancel_booking(&caller, id, req.reason).await?))
}

async fn request_modification(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
    AppJson(req): AppJson<CreateModificationRequest>,
) -> Result<(StatusCode, Json<BookingModification>), AppError> {
    let modification = state
        .workflow
        .request_modification(&caller, id, req.requested_changes, req.reason)
        .await?;
    Ok((StatusCode::CREATED, Json(modification)))
}

async fn list_modifications(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<BookingModification>>, AppError> {
    Ok(Json(state.workflow.list_for_booking(&caller, id).await?))
}
