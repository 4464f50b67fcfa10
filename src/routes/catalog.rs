use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};

use crate::{
    dto::catalog::{
        BannerList, BrandList, CategoryList, CreateReviewRequest, ProductDetail, ProductList,
        ReviewList,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::Review,
    response::ApiResponse,
    routes::params::{Pagination, ProductQuery},
    services::catalog_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products))
        .route("/products/{slug}", get(get_product))
        .route("/products/{slug}/reviews", get(list_reviews))
        .route("/products/{slug}/reviews", post(create_review))
        .route("/categories", get(list_categories))
        .route("/brands", get(list_brands))
        .route("/banners", get(list_banners))
}

#[utoipa::path(
    get,
    path = "/api/catalog/products",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("q" = Option<String>, Query, description = "Search term"),
        ("category" = Option<String>, Query, description = "Category slug, includes children"),
        ("brand" = Option<String>, Query, description = "Brand slug"),
        ("min_price" = Option<i64>, Query, description = "Minimum price in cents"),
        ("max_price" = Option<i64>, Query, description = "Maximum price in cents"),
        ("featured" = Option<bool>, Query, description = "Featured products only"),
        ("sort" = Option<String>, Query, description = "newest, price_low, price_high or popular"),
    ),
    responses(
        (status = 200, description = "List products", body = ApiResponse<ProductList>)
    ),
    tag = "Catalog"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    let response = catalog_service::list_products(&state, query).await?;
    Ok(Json(response))
}

#[utoipa::path(
    get,
    path = "/api/catalog/products/{slug}",
    params(("slug" = String, Path, description = "Product slug")),
    responses(
        (status = 200, description = "Product detail", body = ApiResponse<ProductDetail>),
        (status = 404, description = "Product not found"),
    ),
    tag = "Catalog"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<Json<ApiResponse<ProductDetail>>> {
    let response = catalog_service::get_product_detail(&state, &slug).await?;
    Ok(Json(response))
}

#[utoipa::path(
    get,
    path = "/api/catalog/products/{slug}/reviews",
    params(("slug" = String, Path, description = "Product slug")),
    responses(
        (status = 200, description = "Approved reviews", body = ApiResponse<ReviewList>)
    ),
    tag = "Catalog"
)]
pub async fn list_reviews(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<ReviewList>>> {
    let response = catalog_service::list_reviews(&state, &slug, pagination).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/api/catalog/products/{slug}/reviews",
    request_body = CreateReviewRequest,
    responses(
        (status = 200, description = "Submitted review", body = ApiResponse<Review>),
        (status = 400, description = "Invalid rating or already reviewed"),
    ),
    tag = "Catalog"
)]
pub async fn create_review(
    State(state): State<AppState>,
    user: AuthUser,
    Path(slug): Path<String>,
    Json(payload): Json<CreateReviewRequest>,
) -> AppResult<Json<ApiResponse<Review>>> {
    let response = catalog_service::create_review(&state, &user, &slug, payload).await?;
    Ok(Json(response))
}

#[utoipa::path(get, path = "/api/catalog/categories", tag = "Catalog")]
pub async fn list_categories(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<CategoryList>>> {
    let response = catalog_service::list_categories(&state).await?;
    Ok(Json(response))
}

#[utoipa::path(get, path = "/api/catalog/brands", tag = "Catalog")]
pub async fn list_brands(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<BrandList>>> {
    let response = catalog_service::list_brands(&state).await?;
    Ok(Json(response))
}

#[utoipa::path(get, path = "/api/catalog/banners", tag = "Catalog")]
pub async fn list_banners(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<BannerList>>> {
    let response = catalog_service::list_banners(&state).await?;
    Ok(Json(response))
}
