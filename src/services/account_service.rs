use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    db::DbPool,
    dto::account::{
        AddToWishlistRequest, AddressList, CreateAddressRequest, UpdateAddressRequest,
        WishlistEntry, WishlistList,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Address, Product},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
};

const ADDRESS_TYPES: &[&str] = &["home", "work", "other"];

pub async fn list_addresses(pool: &DbPool, user: &AuthUser) -> AppResult<ApiResponse<AddressList>> {
    let items: Vec<Address> = sqlx::query_as(
        "SELECT * FROM addresses WHERE user_id = $1 ORDER BY is_default DESC, created_at DESC",
    )
    .bind(user.user_id)
    .fetch_all(pool)
    .await?;
    Ok(ApiResponse::success("Addresses", AddressList { items }, None))
}

pub async fn create_address(
    pool: &DbPool,
    user: &AuthUser,
    payload: CreateAddressRequest,
) -> AppResult<ApiResponse<Address>> {
    if !ADDRESS_TYPES.contains(&payload.address_type.as_str()) {
        return Err(AppError::BadRequest(
            "address_type must be home, work or other".into(),
        ));
    }

    let make_default = payload.is_default.unwrap_or(false);
    if make_default {
        sqlx::query("UPDATE addresses SET is_default = FALSE WHERE user_id = $1")
            .bind(user.user_id)
            .execute(pool)
            .await?;
    }

    let address: Address = sqlx::query_as(
        r#"
        INSERT INTO addresses
            (id, user_id, address_type, full_name, phone_number, region, city, area,
             street_address, additional_info, is_default)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.user_id)
    .bind(&payload.address_type)
    .bind(&payload.full_name)
    .bind(&payload.phone_number)
    .bind(&payload.region)
    .bind(&payload.city)
    .bind(&payload.area)
    .bind(&payload.street_address)
    .bind(&payload.additional_info)
    .bind(make_default)
    .fetch_one(pool)
    .await?;

    Ok(ApiResponse::success("Address added", address, Some(Meta::empty())))
}

pub async fn update_address(
    pool: &DbPool,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateAddressRequest,
) -> AppResult<ApiResponse<Address>> {
    let existing: Option<Address> =
        sqlx::query_as("SELECT * FROM addresses WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user.user_id)
            .fetch_optional(pool)
            .await?;
    let existing = existing.ok_or(AppError::NotFound)?;

    let address_type = payload.address_type.unwrap_or(existing.address_type);
    if !ADDRESS_TYPES.contains(&address_type.as_str()) {
        return Err(AppError::BadRequest(
            "address_type must be home, work or other".into(),
        ));
    }

    let address: Address = sqlx::query_as(
        r#"
        UPDATE addresses
        SET address_type = $3, full_name = $4, phone_number = $5, region = $6,
            city = $7, area = $8, street_address = $9, additional_info = $10
        WHERE id = $1 AND user_id = $2
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(user.user_id)
    .bind(address_type)
    .bind(payload.full_name.unwrap_or(existing.full_name))
    .bind(payload.phone_number.unwrap_or(existing.phone_number))
    .bind(payload.region.unwrap_or(existing.region))
    .bind(payload.city.unwrap_or(existing.city))
    .bind(payload.area.unwrap_or(existing.area))
    .bind(payload.street_address.unwrap_or(existing.street_address))
    .bind(payload.additional_info.or(existing.additional_info))
    .fetch_one(pool)
    .await?;

    Ok(ApiResponse::success("Address updated", address, Some(Meta::empty())))
}

pub async fn delete_address(
    pool: &DbPool,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = sqlx::query("DELETE FROM addresses WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user.user_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    Ok(ApiResponse::success(
        "Address deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn set_default_address(
    pool: &DbPool,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Address>> {
    sqlx::query("UPDATE addresses SET is_default = FALSE WHERE user_id = $1")
        .bind(user.user_id)
        .execute(pool)
        .await?;

    let address: Option<Address> = sqlx::query_as(
        "UPDATE addresses SET is_default = TRUE WHERE id = $1 AND user_id = $2 RETURNING *",
    )
    .bind(id)
    .bind(user.user_id)
    .fetch_optional(pool)
    .await?;

    let address = address.ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("Default address set", address, Some(Meta::empty())))
}

#[derive(FromRow)]
struct WishlistRow {
    wishlist_id: Uuid,
    wishlist_created_at: DateTime<Utc>,
    #[sqlx(flatten)]
    product: Product,
}

pub async fn list_wishlist(
    pool: &DbPool,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<WishlistList>> {
    let (page, limit, offset) = pagination.normalize();
    let rows: Vec<WishlistRow> = sqlx::query_as(
        r#"
        SELECT w.id AS wishlist_id, w.created_at AS wishlist_created_at, p.*
        FROM wishlists w
        JOIN products p ON p.id = w.product_id
        WHERE w.user_id = $1
        ORDER BY w.created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user.user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM wishlists WHERE user_id = $1")
        .bind(user.user_id)
        .fetch_one(pool)
        .await?;

    let items = rows
        .into_iter()
        .map(|row| WishlistEntry {
            id: row.wishlist_id,
            product: row.product,
            created_at: row.wishlist_created_at,
        })
        .collect();

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success("Wishlist", WishlistList { items }, Some(meta)))
}

pub async fn add_to_wishlist(
    pool: &DbPool,
    user: &AuthUser,
    payload: AddToWishlistRequest,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let product_exists: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM products WHERE id = $1 AND is_active")
            .bind(payload.product_id)
            .fetch_optional(pool)
            .await?;

    if product_exists.is_none() {
        return Err(AppError::BadRequest("Product not found".into()));
    }

    sqlx::query(
        r#"
        INSERT INTO wishlists (id, user_id, product_id)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id, product_id) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.user_id)
    .bind(payload.product_id)
    .execute(pool)
    .await?;

    log_audit(
        pool,
        Some(user.user_id),
        "wishlist_add",
        Some("wishlists"),
        Some(serde_json::json!({ "product_id": payload.product_id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Added to wishlist",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn remove_from_wishlist(
    pool: &DbPool,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = sqlx::query("DELETE FROM wishlists WHERE user_id = $1 AND product_id = $2")
        .bind(user.user_id)
        .bind(product_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    Ok(ApiResponse::success(
        "Removed from wishlist",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}
