use axum::{
    body::Bytes,
    extract::{Path, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use vowbook_core::Caller;
use vowbook_order::{BookingModification, CounterOfferInput, CustomerDecision, VendorDecision};

use crate::error::AppError;
use crate::extract::{optional_json, AppJson};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct VendorResponseRequest {
    pub status: VendorDecision,
    #[serde(default)]
    pub message: String,
    pub counter_offer: Option<CounterOfferInput>,
}

#[derive(Debug, Deserialize)]
pub struct CustomerResponseRequest {
    pub status: CustomerDecision,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApproveRequest {
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub message: String,
    #[serde(default)]
    pub attachments: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WithdrawRequest {
    pub reason: Option<String>,
}

type ModificationResult = Result<Json<BookingModification>, AppError>;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/modifications/{id}", get(get_modification))
        .route("/v1/modifications/{id}/vendor-response", post(vendor_response))
        .route("/v1/modifications/{id}/customer-response", post(customer_response))
        .route("/v1/modifications/{id}/approve", post(approve))
        .route("/v1/modifications/{id}/reject", post(reject))
        .route("/v1/modifications/{id}/messages", post(add_message))
        .route("/v1/modifications/{id}/implement", post(implement))
        .route("/v1/modifications/{id}/cancel", post(withdraw))
}

async fn get_modification(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> ModificationResult {
    Ok(Json(state.workflow.get_modification(&caller, id).await?))
}

async fn vendor_response(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
    AppJson(req): AppJson<VendorResponseRequest>,
) -> ModificationResult {
    let modification = state
        .workflow
        .vendor_respond(&caller, id, req.status, req.message, req.counter_offer)
        .await?;
    Ok(Json(modification))
}

async fn customer_response(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
    AppJson(req): AppJson<CustomerResponseRequest>,
) -> ModificationResult {
    let modification = state
        .workflow
        .customer_respond(&caller, id, req.status, req.message)
        .await?;
    Ok(Json(modification))
}

async fn approve(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> ModificationResult {
    let req: ApproveRequest = optional_json(&body)?;
    Ok(Json(state.workflow.approve_modification(&caller, id, req.notes).await?))
}

async fn reject(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
    AppJson(req): AppJson<RejectRequest>,
) -> ModificationResult {
    Ok(Json(state.workflow.reject_modification(&caller, id, req.reason).await?))
}

async fn add_message(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
    AppJson(req): AppJson<MessageRequest>,
) -> ModificationResult {
    let modification = state
        .workflow
        .add_message(&caller, id, req.message, req.attachments)
        .await?;
    Ok(Json(modification))
}

async fn implement(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> ModificationResult {
    Ok(Json(state.workflow.implement(&caller, id).await?))
}

async fn withdraw(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> ModificationResult {
    let req: WithdrawRequest = optional_json(&body)?;
    Ok(Json(state.workflow.cancel_modification(&caller, id, req.reason).await?))
}
