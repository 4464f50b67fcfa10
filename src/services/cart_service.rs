use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    db::DbPool,
    dto::cart::{AddToCartRequest, CartLine, CartView, UpdateCartItemRequest},
    error::{AppError, AppResult},
    middleware::auth::CartIdentity,
    models::Product,
    response::{ApiResponse, Meta},
};

#[derive(FromRow)]
struct CartRow {
    id: Uuid,
}

/// Get-or-create the cart for a user or an anonymous session key.
async fn resolve_cart(pool: &DbPool, identity: &CartIdentity) -> AppResult<Uuid> {
    let existing: Option<CartRow> = match identity {
        CartIdentity::User(user) => {
            sqlx::query_as("SELECT id FROM carts WHERE user_id = $1")
                .bind(user.user_id)
                .fetch_optional(pool)
                .await?
        }
        CartIdentity::Session(key) => {
            sqlx::query_as("SELECT id FROM carts WHERE session_key = $1")
                .bind(key)
                .fetch_optional(pool)
                .await?
        }
    };

    if let Some(cart) = existing {
        return Ok(cart.id);
    }

    let id = Uuid::new_v4();
    let cart: CartRow = match identity {
        CartIdentity::User(user) => {
            sqlx::query_as("INSERT INTO carts (id, user_id) VALUES ($1, $2) RETURNING id")
                .bind(id)
                .bind(user.user_id)
                .fetch_one(pool)
                .await?
        }
        CartIdentity::Session(key) => {
            sqlx::query_as("INSERT INTO carts (id, session_key) VALUES ($1, $2) RETURNING id")
                .bind(id)
                .bind(key)
                .fetch_one(pool)
                .await?
        }
    };
    Ok(cart.id)
}

#[derive(FromRow)]
struct CartItemProductRow {
    item_id: Uuid,
    variant_id: Option<Uuid>,
    quantity: i32,
    item_price: i64,
    id: Uuid,
    vendor_id: Option<Uuid>,
    category_id: Option<Uuid>,
    brand_id: Option<Uuid>,
    name: String,
    slug: String,
    sku: String,
    description: Option<String>,
    price: i64,
    compare_price: Option<i64>,
    stock: i32,
    low_stock_threshold: i32,
    is_active: bool,
    is_featured: bool,
    views: i32,
    total_sales: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

pub async fn view_cart(pool: &DbPool, identity: &CartIdentity) -> AppResult<ApiResponse<CartView>> {
    let cart_id = resolve_cart(pool, identity).await?;

    let rows = sqlx::query_as::<_, CartItemProductRow>(
        r#"
        SELECT ci.id AS item_id, ci.variant_id, ci.quantity, ci.price AS item_price,
               p.*
        FROM cart_items ci
        JOIN products p ON p.id = ci.product_id
        WHERE ci.cart_id = $1
        ORDER BY ci.created_at DESC
        "#,
    )
    .bind(cart_id)
    .fetch_all(pool)
    .await?;

    let mut total_items = 0_i64;
    let mut subtotal = 0_i64;
    let items: Vec<CartLine> = rows
        .into_iter()
        .map(|row| {
            let line_total = row.item_price * i64::from(row.quantity);
            total_items += i64::from(row.quantity);
            subtotal += line_total;
            CartLine {
                id: row.item_id,
                variant_id: row.variant_id,
                quantity: row.quantity,
                price: row.item_price,
                line_total,
                product: Product {
                    id: row.id,
                    vendor_id: row.vendor_id,
                    category_id: row.category_id,
                    brand_id: row.brand_id,
                    name: row.name,
                    slug: row.slug,
                    sku: row.sku,
                    description: row.description,
                    price: row.price,
                    compare_price: row.compare_price,
                    stock: row.stock,
                    low_stock_threshold: row.low_stock_threshold,
                    is_active: row.is_active,
                    is_featured: row.is_featured,
                    views: row.views,
                    total_sales: row.total_sales,
                    created_at: row.created_at,
                    updated_at: row.updated_at,
                },
            }
        })
        .collect();

    let view = CartView {
        id: cart_id,
        items,
        total_items,
        subtotal,
    };
    Ok(ApiResponse::success("OK", view, Some(Meta::empty())))
}

pub async fn add_to_cart(
    pool: &DbPool,
    identity: &CartIdentity,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartView>> {
    if payload.quantity <= 0 {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }

    let product: Option<(i64, i32)> =
        sqlx::query_as("SELECT price, stock FROM products WHERE id = $1 AND is_active")
            .bind(payload.product_id)
            .fetch_optional(pool)
            .await?;
    let (product_price, stock) = product
        .ok_or_else(|| AppError::BadRequest("product not found".to_string()))?;

    // A variant can carry its own price; fall back to the product's.
    let mut unit_price = product_price;
    if let Some(variant_id) = payload.variant_id {
        let variant: Option<(Option<i64>,)> = sqlx::query_as(
            "SELECT price FROM product_variants WHERE id = $1 AND product_id = $2 AND is_active",
        )
        .bind(variant_id)
        .bind(payload.product_id)
        .fetch_optional(pool)
        .await?;
        let variant = variant
            .ok_or_else(|| AppError::BadRequest("variant not found".to_string()))?;
        if let Some(price) = variant.0 {
            unit_price = price;
        }
    }

    let cart_id = resolve_cart(pool, identity).await?;

    let existing: Option<(Uuid, i32)> = sqlx::query_as(
        r#"
        SELECT id, quantity FROM cart_items
        WHERE cart_id = $1 AND product_id = $2 AND variant_id IS NOT DISTINCT FROM $3
        "#,
    )
    .bind(cart_id)
    .bind(payload.product_id)
    .bind(payload.variant_id)
    .fetch_optional(pool)
    .await?;

    let requested = existing.as_ref().map_or(0, |(_, q)| *q) + payload.quantity;
    if stock < requested {
        return Err(AppError::BadRequest("Insufficient stock available".into()));
    }

    if let Some((item_id, _)) = existing {
        sqlx::query("UPDATE cart_items SET quantity = $2 WHERE id = $1")
            .bind(item_id)
            .bind(requested)
            .execute(pool)
            .await?;
    } else {
        sqlx::query(
            r#"
            INSERT INTO cart_items (id, cart_id, product_id, variant_id, quantity, price)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(cart_id)
        .bind(payload.product_id)
        .bind(payload.variant_id)
        .bind(payload.quantity)
        .bind(unit_price)
        .execute(pool)
        .await?;
    }

    sqlx::query("UPDATE carts SET updated_at = now() WHERE id = $1")
        .bind(cart_id)
        .execute(pool)
        .await?;

    if let CartIdentity::User(user) = identity {
        log_audit(
            pool,
            Some(user.user_id),
            "cart_add",
            Some("cart_items"),
            Some(serde_json::json!({
                "product_id": payload.product_id,
                "quantity": payload.quantity
            })),
        )
        .await;
    }

    view_cart(pool, identity).await
}

pub async fn update_cart_item(
    pool: &DbPool,
    identity: &CartIdentity,
    item_id: Uuid,
    payload: UpdateCartItemRequest,
) -> AppResult<ApiResponse<CartView>> {
    let cart_id = resolve_cart(pool, identity).await?;

    if payload.quantity <= 0 {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = $1 AND cart_id = $2")
            .bind(item_id)
            .bind(cart_id)
            .execute(pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        return view_cart(pool, identity).await;
    }

    let stock: Option<(i32,)> = sqlx::query_as(
        r#"
        SELECT p.stock FROM cart_items ci
        JOIN products p ON p.id = ci.product_id
        WHERE ci.id = $1 AND ci.cart_id = $2
        "#,
    )
    .bind(item_id)
    .bind(cart_id)
    .fetch_optional(pool)
    .await?;
    let stock = stock.ok_or(AppError::NotFound)?;

    if stock.0 < payload.quantity {
        return Err(AppError::BadRequest("Insufficient stock available".into()));
    }

    sqlx::query("UPDATE cart_items SET quantity = $3 WHERE id = $1 AND cart_id = $2")
        .bind(item_id)
        .bind(cart_id)
        .bind(payload.quantity)
        .execute(pool)
        .await?;

    view_cart(pool, identity).await
}

pub async fn remove_cart_item(
    pool: &DbPool,
    identity: &CartIdentity,
    item_id: Uuid,
) -> AppResult<ApiResponse<CartView>> {
    let cart_id = resolve_cart(pool, identity).await?;

    let result = sqlx::query("DELETE FROM cart_items WHERE id = $1 AND cart_id = $2")
        .bind(item_id)
        .bind(cart_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    view_cart(pool, identity).await
}

pub async fn clear_cart(
    pool: &DbPool,
    identity: &CartIdentity,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let cart_id = resolve_cart(pool, identity).await?;

    sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
        .bind(cart_id)
        .execute(pool)
        .await?;

    Ok(ApiResponse::success(
        "Cart cleared",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}
