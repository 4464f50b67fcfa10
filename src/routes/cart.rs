use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get, post, put},
};
use uuid::Uuid;

use crate::{
    dto::cart::{AddToCartRequest, CartView, UpdateCartItemRequest},
    error::AppResult,
    middleware::auth::CartIdentity,
    response::ApiResponse,
    services::cart_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(view_cart))
        .route("/items", post(add_to_cart))
        .route("/items/{id}", put(update_cart_item))
        .route("/items/{id}", delete(remove_cart_item))
        .route("/", delete(clear_cart))
}

#[utoipa::path(
    get,
    path = "/api/cart",
    responses(
        (status = 200, description = "Current cart", body = ApiResponse<CartView>),
        (status = 400, description = "Missing bearer token or X-Session-Key header"),
    ),
    tag = "Cart"
)]
pub async fn view_cart(
    State(state): State<AppState>,
    identity: CartIdentity,
) -> AppResult<Json<ApiResponse<CartView>>> {
    let response = cart_service::view_cart(&state.pool, &identity).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/api/cart/items",
    request_body = AddToCartRequest,
    responses(
        (status = 200, description = "Updated cart", body = ApiResponse<CartView>),
        (status = 400, description = "Out of stock or invalid quantity"),
    ),
    tag = "Cart"
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    identity: CartIdentity,
    Json(payload): Json<AddToCartRequest>,
) -> AppResult<Json<ApiResponse<CartView>>> {
    let response = cart_service::add_to_cart(&state.pool, &identity, payload).await?;
    Ok(Json(response))
}

#[utoipa::path(put, path = "/api/cart/items/{id}", request_body = UpdateCartItemRequest, tag = "Cart")]
pub async fn update_cart_item(
    State(state): State<AppState>,
    identity: CartIdentity,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCartItemRequest>,
) -> AppResult<Json<ApiResponse<CartView>>> {
    let response = cart_service::update_cart_item(&state.pool, &identity, id, payload).await?;
    Ok(Json(response))
}

#[utoipa::path(delete, path = "/api/cart/items/{id}", tag = "Cart")]
pub async fn remove_cart_item(
    State(state): State<AppState>,
    identity: CartIdentity,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<CartView>>> {
    let response = cart_service::remove_cart_item(&state.pool, &identity, id).await?;
    Ok(Json(response))
}

#[utoipa::path(delete, path = "/api/cart", tag = "Cart")]
pub async fn clear_cart(
    State(state): State<AppState>,
    identity: CartIdentity,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let response = cart_service::clear_cart(&state.pool, &identity).await?;
    Ok(Json(response))
}
