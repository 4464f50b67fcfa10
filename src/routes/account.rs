use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{delete, get, post, put},
};
use uuid::Uuid;

use crate::{
    dto::account::{
        AddToWishlistRequest, AddressList, CreateAddressRequest, NotificationList,
        UpdateAddressRequest, WishlistList,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::{Address, Notification},
    response::ApiResponse,
    routes::params::Pagination,
    services::{account_service, notification_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/addresses", get(list_addresses))
        .route("/addresses", post(create_address))
        .route("/addresses/{id}", put(update_address))
        .route("/addresses/{id}", delete(delete_address))
        .route("/addresses/{id}/default", post(set_default_address))
        .route("/wishlist", get(list_wishlist))
        .route("/wishlist", post(add_to_wishlist))
        .route("/wishlist/{product_id}", delete(remove_from_wishlist))
        .route("/notifications", get(list_notifications))
        .route("/notifications/read-all", post(mark_all_read))
        .route("/notifications/{id}/read", post(mark_read))
}

#[utoipa::path(get, path = "/api/account/addresses", tag = "Account")]
pub async fn list_addresses(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<AddressList>>> {
    let response = account_service::list_addresses(&state.pool, &user).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/api/account/addresses",
    request_body = CreateAddressRequest,
    responses(
        (status = 200, description = "Created address", body = ApiResponse<Address>)
    ),
    tag = "Account"
)]
pub async fn create_address(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateAddressRequest>,
) -> AppResult<Json<ApiResponse<Address>>> {
    let response = account_service::create_address(&state.pool, &user, payload).await?;
    Ok(Json(response))
}

#[utoipa::path(put, path = "/api/account/addresses/{id}", request_body = UpdateAddressRequest, tag = "Account")]
pub async fn update_address(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateAddressRequest>,
) -> AppResult<Json<ApiResponse<Address>>> {
    let response = account_service::update_address(&state.pool, &user, id, payload).await?;
    Ok(Json(response))
}

#[utoipa::path(delete, path = "/api/account/addresses/{id}", tag = "Account")]
pub async fn delete_address(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let response = account_service::delete_address(&state.pool, &user, id).await?;
    Ok(Json(response))
}

#[utoipa::path(post, path = "/api/account/addresses/{id}/default", tag = "Account")]
pub async fn set_default_address(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Address>>> {
    let response = account_service::set_default_address(&state.pool, &user, id).await?;
    Ok(Json(response))
}

#[utoipa::path(get, path = "/api/account/wishlist", tag = "Account")]
pub async fn list_wishlist(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<WishlistList>>> {
    let response = account_service::list_wishlist(&state.pool, &user, pagination).await?;
    Ok(Json(response))
}

#[utoipa::path(post, path = "/api/account/wishlist", request_body = AddToWishlistRequest, tag = "Account")]
pub async fn add_to_wishlist(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AddToWishlistRequest>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let response = account_service::add_to_wishlist(&state.pool, &user, payload).await?;
    Ok(Json(response))
}

#[utoipa::path(delete, path = "/api/account/wishlist/{product_id}", tag = "Account")]
pub async fn remove_from_wishlist(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let response = account_service::remove_from_wishlist(&state.pool, &user, product_id).await?;
    Ok(Json(response))
}

#[utoipa::path(get, path = "/api/account/notifications", tag = "Account")]
pub async fn list_notifications(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<NotificationList>>> {
    let response = notification_service::list_notifications(&state.pool, &user, pagination).await?;
    Ok(Json(response))
}

#[utoipa::path(post, path = "/api/account/notifications/{id}/read", tag = "Account")]
pub async fn mark_read(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Notification>>> {
    let response = notification_service::mark_read(&state.pool, &user, id).await?;
    Ok(Json(response))
}

#[utoipa::path(post, path = "/api/account/notifications/read-all", tag = "Account")]
pub async fn mark_all_read(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let response = notification_service::mark_all_read(&state.pool, &user).await?;
    Ok(Json(response))
}
