use axum::{extract::State, routing::post, Json, Router};
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use uuid::Uuid;
use vowbook_catalog::{AvailabilityCheck, SlotKey};
use vowbook_core::CoreError;

use crate::error::AppError;
use crate::extract::AppJson;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CheckAvailabilityRequest {
    pub vendor_id: Uuid,
    pub venue_id: Option<Uuid>,
    pub date: NaiveDate,
    #[serde(with = "vowbook_catalog::clock")]
    pub start_time: NaiveTime,
    #[serde(with = "vowbook_catalog::clock")]
    pub end_time: NaiveTime,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/availability/check", post(check_availability))
}

async fn check_availability(
    State(state): State<AppState>,
    AppJson(req): AppJson<CheckAvailabilityRequest>,
) -> Result<Json<AvailabilityCheck>, AppError> {
    if req.start_time >= req.end_time {
        return Err(CoreError::Validation("start_time must be before end_time".to_string()).into());
    }
    let key = SlotKey::new(req.vendor_id, req.venue_id, req.date);
    let check = state
        .availability
        .check_availability(&key, req.start_time, req.end_time)
        .await
        .map_err(CoreError::internal)?;
    Ok(Json(check))
}
