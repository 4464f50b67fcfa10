use axum::{Json, Router, extract::State, routing::post};

use crate::{
    dto::checkout::{Quote, QuoteRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::checkout_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/quote", post(quote))
}

#[utoipa::path(
    post,
    path = "/api/checkout/quote",
    request_body = QuoteRequest,
    responses(
        (status = 200, description = "Priced quote for the current cart", body = ApiResponse<Quote>),
        (status = 400, description = "Empty cart, bad coupon or no delivery coverage"),
    ),
    tag = "Checkout"
)]
pub async fn quote(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<QuoteRequest>,
) -> AppResult<Json<ApiResponse<Quote>>> {
    let response = checkout_service::quote(&state, &user, payload).await?;
    Ok(Json(response))
}
