use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::payments::{CallbackAck, InitiatePaymentRequest, StkCallbackEnvelope},
    error::AppResult,
    middleware::auth::AuthUser,
    models::Payment,
    response::ApiResponse,
    services::payment_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders/{id}/initiate", post(initiate_payment))
        .route("/orders/{id}/status", get(payment_status))
        .route("/mpesa/callback", post(mpesa_callback))
}

#[utoipa::path(
    post,
    path = "/api/payments/orders/{id}/initiate",
    request_body = InitiatePaymentRequest,
    responses(
        (status = 200, description = "STK push sent to the customer's phone", body = ApiResponse<Payment>),
        (status = 400, description = "Order not payable or invalid phone number"),
        (status = 502, description = "Gateway rejected the request"),
    ),
    tag = "Payments"
)]
pub async fn initiate_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<InitiatePaymentRequest>,
) -> AppResult<Json<ApiResponse<Payment>>> {
    let response = payment_service::initiate_mpesa(&state, &user, id, payload).await?;
    Ok(Json(response))
}

#[utoipa::path(get, path = "/api/payments/orders/{id}/status", tag = "Payments")]
pub async fn payment_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Payment>>> {
    let response = payment_service::payment_status(&state, &user, id).await?;
    Ok(Json(response))
}

// Called by the Daraja gateway, not by clients; no auth on purpose.
#[utoipa::path(
    post,
    path = "/api/payments/mpesa/callback",
    request_body = StkCallbackEnvelope,
    responses(
        (status = 200, description = "Callback acknowledged", body = CallbackAck)
    ),
    tag = "Payments"
)]
pub async fn mpesa_callback(
    State(state): State<AppState>,
    Json(envelope): Json<StkCallbackEnvelope>,
) -> AppResult<Json<CallbackAck>> {
    let ack = payment_service::handle_callback(&state, envelope).await?;
    Ok(Json(ack))
}
