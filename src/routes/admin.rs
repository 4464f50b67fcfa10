use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{delete, get, patch, post, put},
};
use uuid::Uuid;

use crate::{
    dto::{
        admin::{
            AdjustInventoryRequest, CouponList, CreateCouponRequest, CreateDeliveryZoneRequest,
            DeliveryZoneList, LowStockList, LowStockQuery, UpdateCouponRequest,
            UpdateDeliveryZoneRequest, UpdateOrderStatusRequest,
        },
        catalog::{CreateProductRequest, UpdateProductRequest},
        orders::{OrderList, OrderWithItems},
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::{Coupon, DeliveryZone, Product, Review},
    response::ApiResponse,
    routes::params::OrderListQuery,
    services::{admin_service, catalog_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_all_orders))
        .route("/orders/{id}", get(get_any_order))
        .route("/orders/{id}/status", patch(update_order_status))
        .route("/products", post(create_product))
        .route("/products/{id}", put(update_product))
        .route("/products/{id}", delete(delete_product))
        .route("/products/{id}/inventory", patch(adjust_inventory))
        .route("/products/low-stock", get(low_stock))
        .route("/reviews/{id}/approve", patch(approve_review))
        .route("/reviews/{id}", delete(delete_review))
        .route("/coupons", get(list_coupons))
        .route("/coupons", post(create_coupon))
        .route("/coupons/{id}", put(update_coupon))
        .route("/coupons/{id}", delete(delete_coupon))
        .route("/delivery-zones", get(list_delivery_zones))
        .route("/delivery-zones", post(create_delivery_zone))
        .route("/delivery-zones/{id}", put(update_delivery_zone))
        .route("/delivery-zones/{id}", delete(delete_delivery_zone))
}

#[utoipa::path(
    get,
    path = "/api/admin/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "Filter by order status"),
    ),
    tag = "Admin"
)]
pub async fn list_all_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let response = admin_service::list_all_orders(&state, &user, query).await?;
    Ok(Json(response))
}

#[utoipa::path(get, path = "/api/admin/orders/{id}", tag = "Admin")]
pub async fn get_any_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let response = admin_service::get_any_order(&state, &user, id).await?;
    Ok(Json(response))
}

#[utoipa::path(
    patch,
    path = "/api/admin/orders/{id}/status",
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Order moved to the new status", body = ApiResponse<OrderWithItems>),
        (status = 400, description = "Transition not allowed"),
    ),
    tag = "Admin"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let response = admin_service::update_order_status(&state, &user, id, payload).await?;
    Ok(Json(response))
}

#[utoipa::path(post, path = "/api/admin/products", request_body = CreateProductRequest, tag = "Admin")]
pub async fn create_product(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateProductRequest>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let response = catalog_service::create_product(&state, &user, payload).await?;
    Ok(Json(response))
}

#[utoipa::path(put, path = "/api/admin/products/{id}", request_body = UpdateProductRequest, tag = "Admin")]
pub async fn update_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductRequest>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let response = catalog_service::update_product(&state, &user, id, payload).await?;
    Ok(Json(response))
}

#[utoipa::path(delete, path = "/api/admin/products/{id}", tag = "Admin")]
pub async fn delete_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let response = catalog_service::delete_product(&state, &user, id).await?;
    Ok(Json(response))
}

#[utoipa::path(
    get,
    path = "/api/admin/products/low-stock",
    params(
        ("threshold" = Option<i32>, Query, description = "Override the per-product threshold"),
    ),
    tag = "Admin"
)]
pub async fn low_stock(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<LowStockQuery>,
) -> AppResult<Json<ApiResponse<LowStockList>>> {
    let response = admin_service::low_stock(&state, &user, query).await?;
    Ok(Json(response))
}

#[utoipa::path(
    patch,
    path = "/api/admin/products/{id}/inventory",
    request_body = AdjustInventoryRequest,
    responses(
        (status = 200, description = "Adjusted product", body = ApiResponse<Product>),
        (status = 400, description = "Adjustment would take stock below zero"),
    ),
    tag = "Admin"
)]
pub async fn adjust_inventory(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AdjustInventoryRequest>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let response = admin_service::adjust_inventory(&state, &user, id, payload).await?;
    Ok(Json(response))
}

#[utoipa::path(get, path = "/api/admin/coupons", tag = "Admin")]
pub async fn list_coupons(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<CouponList>>> {
    let response = admin_service::list_coupons(&state, &user).await?;
    Ok(Json(response))
}

#[utoipa::path(post, path = "/api/admin/coupons", request_body = CreateCouponRequest, tag = "Admin")]
pub async fn create_coupon(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateCouponRequest>,
) -> AppResult<Json<ApiResponse<Coupon>>> {
    let response = admin_service::create_coupon(&state, &user, payload).await?;
    Ok(Json(response))
}

#[utoipa::path(put, path = "/api/admin/coupons/{id}", request_body = UpdateCouponRequest, tag = "Admin")]
pub async fn update_coupon(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCouponRequest>,
) -> AppResult<Json<ApiResponse<Coupon>>> {
    let response = admin_service::update_coupon(&state, &user, id, payload).await?;
    Ok(Json(response))
}

#[utoipa::path(delete, path = "/api/admin/coupons/{id}", tag = "Admin")]
pub async fn delete_coupon(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let response = admin_service::delete_coupon(&state, &user, id).await?;
    Ok(Json(response))
}

#[utoipa::path(patch, path = "/api/admin/reviews/{id}/approve", tag = "Admin")]
pub async fn approve_review(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Review>>> {
    let response = admin_service::approve_review(&state, &user, id).await?;
    Ok(Json(response))
}

#[utoipa::path(delete, path = "/api/admin/reviews/{id}", tag = "Admin")]
pub async fn delete_review(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let response = admin_service::delete_review(&state, &user, id).await?;
    Ok(Json(response))
}

#[utoipa::path(get, path = "/api/admin/delivery-zones", tag = "Admin")]
pub async fn list_delivery_zones(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<DeliveryZoneList>>> {
    let response = admin_service::list_delivery_zones(&state, &user).await?;
    Ok(Json(response))
}

#[utoipa::path(post, path = "/api/admin/delivery-zones", request_body = CreateDeliveryZoneRequest, tag = "Admin")]
pub async fn create_delivery_zone(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateDeliveryZoneRequest>,
) -> AppResult<Json<ApiResponse<DeliveryZone>>> {
    let response = admin_service::create_delivery_zone(&state, &user, payload).await?;
    Ok(Json(response))
}

#[utoipa::path(put, path = "/api/admin/delivery-zones/{id}", request_body = UpdateDeliveryZoneRequest, tag = "Admin")]
pub async fn update_delivery_zone(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateDeliveryZoneRequest>,
) -> AppResult<Json<ApiResponse<DeliveryZone>>> {
    let response = admin_service::update_delivery_zone(&state, &user, id, payload).await?;
    Ok(Json(response))
}

#[utoipa::path(delete, path = "/api/admin/delivery-zones/{id}", tag = "Admin")]
pub async fn delete_delivery_zone(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let response = admin_service::delete_delivery_zone(&state, &user, id).await?;
    Ok(Json(response))
}
