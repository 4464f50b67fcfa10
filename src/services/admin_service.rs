use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::{
        admin::{
            AdjustInventoryRequest, CouponList, CreateCouponRequest, CreateDeliveryZoneRequest,
            DeliveryZoneList, LowStockList, LowStockQuery, UpdateCouponRequest,
            UpdateDeliveryZoneRequest, UpdateOrderStatusRequest,
        },
        orders::{OrderList, OrderWithItems},
    },
    entity::{
        coupons::{ActiveModel as CouponActive, Column as CouponCol, Entity as Coupons},
        order_items::{Column as OrderItemCol, Entity as OrderItems},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, OrderStatus},
        payments::{
            ActiveModel as PaymentActive, Column as PaymentCol, Entity as Payments, PaymentStatus,
        },
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Coupon, DeliveryZone, Order, OrderItem, Payment, Product, Review},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::notification_service,
    state::AppState,
};

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;

    let (page, limit, offset) = query.pagination.normalize();
    let mut condition = Condition::all();
    if let Some(status) = query.status {
        condition = condition.add(OrderCol::Status.eq(status));
    }

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let mut finder = Orders::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;
    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Order::from)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Ok", OrderList { items: orders }, Some(meta)))
}

pub async fn get_any_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    ensure_admin(user)?;

    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(OrderItem::from)
        .collect();

    let payment = Payments::find()
        .filter(PaymentCol::OrderId.eq(order.id))
        .order_by_desc(PaymentCol::CreatedAt)
        .one(&state.orm)
        .await?
        .map(Payment::from);

    Ok(ApiResponse::success(
        "OK",
        OrderWithItems {
            order: order.into(),
            items,
            payment,
        },
        Some(Meta::empty()),
    ))
}

pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    ensure_admin(user)?;

    let txn = state.orm.begin().await?;

    let order = Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    if !order.status.can_transition_to(payload.status) {
        return Err(AppError::BadRequest(format!(
            "Cannot move order from {:?} to {:?}",
            order.status, payload.status
        )));
    }

    let now = Utc::now();
    let customer_id = order.user_id;
    let order_number = order.order_number.clone();

    let mut active: OrderActive = order.into();
    active.status = Set(payload.status);
    active.updated_at = Set(now.into());
    if let Some(tracking) = payload.tracking_number {
        active.tracking_number = Set(Some(tracking));
    }
    if let Some(note) = payload.admin_note {
        active.admin_note = Set(Some(note));
    }
    match payload.status {
        OrderStatus::Confirmed => active.confirmed_at = Set(Some(now.into())),
        OrderStatus::Shipped => active.shipped_at = Set(Some(now.into())),
        OrderStatus::Delivered => active.delivered_at = Set(Some(now.into())),
        _ => {}
    }
    let order = active.update(&txn).await?;

    // Cash payments settle on delivery; refunds follow the returns flow.
    if matches!(payload.status, OrderStatus::Delivered | OrderStatus::Refunded) {
        let payment = Payments::find()
            .filter(PaymentCol::OrderId.eq(order.id))
            .order_by_desc(PaymentCol::CreatedAt)
            .one(&txn)
            .await?;
        if let Some(p) = payment {
            let next = match payload.status {
                OrderStatus::Delivered if p.status == PaymentStatus::Pending => {
                    Some(PaymentStatus::Completed)
                }
                OrderStatus::Refunded if p.status == PaymentStatus::Completed => {
                    Some(PaymentStatus::Refunded)
                }
                _ => None,
            };
            if let Some(next) = next {
                let mut active: PaymentActive = p.into();
                active.status = Set(next);
                if next == PaymentStatus::Completed {
                    active.completed_at = Set(Some(now.into()));
                }
                active.update(&txn).await?;
            }
        }
    }

    txn.commit().await?;

    log_audit(
        &state.pool,
        Some(user.user_id),
        "order_status_update",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "status": payload.status })),
    )
    .await;

    notification_service::notify(
        &state.pool,
        customer_id,
        "order",
        "Order updated",
        &format!("Your order {} is now {:?}.", order_number, payload.status),
        Some(&format!("/orders/{}", order.id)),
    )
    .await;

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(OrderItem::from)
        .collect();

    let payment = Payments::find()
        .filter(PaymentCol::OrderId.eq(order.id))
        .order_by_desc(PaymentCol::CreatedAt)
        .one(&state.orm)
        .await?
        .map(Payment::from);

    Ok(ApiResponse::success(
        "Order status updated",
        OrderWithItems {
            order: order.into(),
            items,
            payment,
        },
        Some(Meta::empty()),
    ))
}

pub async fn low_stock(
    state: &AppState,
    user: &AuthUser,
    query: LowStockQuery,
) -> AppResult<ApiResponse<LowStockList>> {
    ensure_admin(user)?;

    let items: Vec<Product> = match query.threshold {
        Some(threshold) => {
            sqlx::query_as(
                "SELECT * FROM products WHERE is_active AND stock <= $1 ORDER BY stock ASC",
            )
            .bind(threshold)
            .fetch_all(&state.pool)
            .await?
        }
        None => {
            sqlx::query_as(
                "SELECT * FROM products WHERE is_active AND stock <= low_stock_threshold ORDER BY stock ASC",
            )
            .fetch_all(&state.pool)
            .await?
        }
    };

    Ok(ApiResponse::success("Low stock", LowStockList { items }, None))
}

pub async fn adjust_inventory(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    payload: AdjustInventoryRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;

    // The stock guard lives in the WHERE clause so concurrent adjustments
    // cannot drive the count negative.
    let product: Option<Product> = sqlx::query_as(
        r#"
        UPDATE products
        SET stock = stock + $2, updated_at = NOW()
        WHERE id = $1 AND stock + $2 >= 0
        RETURNING *
        "#,
    )
    .bind(product_id)
    .bind(payload.delta)
    .fetch_optional(&state.pool)
    .await?;

    let Some(product) = product else {
        let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM products WHERE id = $1")
            .bind(product_id)
            .fetch_optional(&state.pool)
            .await?;
        return match exists {
            Some(_) => Err(AppError::BadRequest(
                "Adjustment would take stock below zero".into(),
            )),
            None => Err(AppError::NotFound),
        };
    };

    log_audit(
        &state.pool,
        Some(user.user_id),
        "inventory_adjust",
        Some("products"),
        Some(serde_json::json!({ "product_id": product_id, "delta": payload.delta })),
    )
    .await;

    Ok(ApiResponse::success("Inventory adjusted", product, Some(Meta::empty())))
}

pub async fn approve_review(
    state: &AppState,
    user: &AuthUser,
    review_id: Uuid,
) -> AppResult<ApiResponse<Review>> {
    ensure_admin(user)?;

    let review: Option<Review> = sqlx::query_as(
        "UPDATE reviews SET is_approved = TRUE WHERE id = $1 RETURNING *",
    )
    .bind(review_id)
    .fetch_optional(&state.pool)
    .await?;
    let review = review.ok_or(AppError::NotFound)?;

    log_audit(
        &state.pool,
        Some(user.user_id),
        "review_approve",
        Some("reviews"),
        Some(serde_json::json!({ "review_id": review_id })),
    )
    .await;

    Ok(ApiResponse::success("Review approved", review, Some(Meta::empty())))
}

pub async fn delete_review(
    state: &AppState,
    user: &AuthUser,
    review_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;

    let result = sqlx::query("DELETE FROM reviews WHERE id = $1")
        .bind(review_id)
        .execute(&state.pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    log_audit(
        &state.pool,
        Some(user.user_id),
        "review_delete",
        Some("reviews"),
        Some(serde_json::json!({ "review_id": review_id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Review deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn list_coupons(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CouponList>> {
    ensure_admin(user)?;

    let items = Coupons::find()
        .order_by_desc(CouponCol::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Coupon::from)
        .collect();

    Ok(ApiResponse::success("Coupons", CouponList { items }, None))
}

pub async fn create_coupon(
    state: &AppState,
    user: &AuthUser,
    payload: CreateCouponRequest,
) -> AppResult<ApiResponse<Coupon>> {
    ensure_admin(user)?;

    let code = payload.code.trim().to_uppercase();
    if code.is_empty() {
        return Err(AppError::BadRequest("Coupon code is required".into()));
    }
    if payload.discount_value <= 0 {
        return Err(AppError::BadRequest("discount_value must be positive".into()));
    }
    if payload.valid_to <= payload.valid_from {
        return Err(AppError::BadRequest("valid_to must be after valid_from".into()));
    }

    let existing = Coupons::find()
        .filter(CouponCol::Code.eq(code.clone()))
        .one(&state.orm)
        .await?;
    if existing.is_some() {
        return Err(AppError::BadRequest("Coupon code already exists".into()));
    }

    let coupon = CouponActive {
        id: Set(Uuid::new_v4()),
        code: Set(code),
        discount_type: Set(payload.discount_type),
        discount_value: Set(payload.discount_value),
        minimum_purchase: Set(payload.minimum_purchase.unwrap_or(0)),
        maximum_discount: Set(payload.maximum_discount),
        usage_limit: Set(payload.usage_limit),
        usage_count: Set(0),
        user_limit: Set(payload.user_limit.unwrap_or(1)),
        valid_from: Set(payload.valid_from.into()),
        valid_to: Set(payload.valid_to.into()),
        is_active: Set(payload.is_active.unwrap_or(true)),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    log_audit(
        &state.pool,
        Some(user.user_id),
        "coupon_create",
        Some("coupons"),
        Some(serde_json::json!({ "coupon_id": coupon.id, "code": coupon.code.clone() })),
    )
    .await;

    Ok(ApiResponse::success("Coupon created", coupon.into(), Some(Meta::empty())))
}

pub async fn update_coupon(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateCouponRequest,
) -> AppResult<ApiResponse<Coupon>> {
    ensure_admin(user)?;

    let coupon = Coupons::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: CouponActive = coupon.into();
    if let Some(discount_type) = payload.discount_type {
        active.discount_type = Set(discount_type);
    }
    if let Some(value) = payload.discount_value {
        if value <= 0 {
            return Err(AppError::BadRequest("discount_value must be positive".into()));
        }
        active.discount_value = Set(value);
    }
    if let Some(minimum) = payload.minimum_purchase {
        active.minimum_purchase = Set(minimum);
    }
    if payload.maximum_discount.is_some() {
        active.maximum_discount = Set(payload.maximum_discount);
    }
    if payload.usage_limit.is_some() {
        active.usage_limit = Set(payload.usage_limit);
    }
    if let Some(user_limit) = payload.user_limit {
        active.user_limit = Set(user_limit);
    }
    if let Some(valid_from) = payload.valid_from {
        active.valid_from = Set(valid_from.into());
    }
    if let Some(valid_to) = payload.valid_to {
        active.valid_to = Set(valid_to.into());
    }
    if let Some(is_active) = payload.is_active {
        active.is_active = Set(is_active);
    }

    let coupon = active.update(&state.orm).await?;

    Ok(ApiResponse::success("Coupon updated", coupon.into(), Some(Meta::empty())))
}

pub async fn delete_coupon(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;

    let result = Coupons::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    Ok(ApiResponse::success(
        "Coupon deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn list_delivery_zones(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<DeliveryZoneList>> {
    ensure_admin(user)?;

    let items: Vec<DeliveryZone> =
        sqlx::query_as("SELECT * FROM delivery_zones ORDER BY region, city")
            .fetch_all(&state.pool)
            .await?;

    Ok(ApiResponse::success("Delivery zones", DeliveryZoneList { items }, None))
}

pub async fn create_delivery_zone(
    state: &AppState,
    user: &AuthUser,
    payload: CreateDeliveryZoneRequest,
) -> AppResult<ApiResponse<DeliveryZone>> {
    ensure_admin(user)?;

    if payload.delivery_fee < 0 {
        return Err(AppError::BadRequest("delivery_fee cannot be negative".into()));
    }
    if payload.estimated_days <= 0 {
        return Err(AppError::BadRequest("estimated_days must be positive".into()));
    }

    let zone: Option<DeliveryZone> = sqlx::query_as(
        r#"
        INSERT INTO delivery_zones (id, region, city, delivery_fee, estimated_days, is_active)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (region, city) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(payload.region.trim())
    .bind(payload.city.trim())
    .bind(payload.delivery_fee)
    .bind(payload.estimated_days)
    .bind(payload.is_active.unwrap_or(true))
    .fetch_optional(&state.pool)
    .await?;

    let zone = zone.ok_or_else(|| {
        AppError::BadRequest("A zone for that region and city already exists".into())
    })?;

    Ok(ApiResponse::success("Delivery zone created", zone, Some(Meta::empty())))
}

pub async fn update_delivery_zone(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateDeliveryZoneRequest,
) -> AppResult<ApiResponse<DeliveryZone>> {
    ensure_admin(user)?;

    if let Some(fee) = payload.delivery_fee {
        if fee < 0 {
            return Err(AppError::BadRequest("delivery_fee cannot be negative".into()));
        }
    }
    if let Some(days) = payload.estimated_days {
        if days <= 0 {
            return Err(AppError::BadRequest("estimated_days must be positive".into()));
        }
    }

    let zone: Option<DeliveryZone> = sqlx::query_as(
        r#"
        UPDATE delivery_zones
        SET delivery_fee = COALESCE($2, delivery_fee),
            estimated_days = COALESCE($3, estimated_days),
            is_active = COALESCE($4, is_active)
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(payload.delivery_fee)
    .bind(payload.estimated_days)
    .bind(payload.is_active)
    .fetch_optional(&state.pool)
    .await?;

    let zone = zone.ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("Delivery zone updated", zone, Some(Meta::empty())))
}

pub async fn delete_delivery_zone(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;

    let result = sqlx::query("DELETE FROM delivery_zones WHERE id = $1")
        .bind(id)
        .execute(&state.pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    Ok(ApiResponse::success(
        "Delivery zone deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}
