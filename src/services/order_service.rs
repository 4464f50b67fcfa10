use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::orders::{CancelOrderRequest, OrderList, OrderTracking, OrderWithItems, PlaceOrderRequest},
    entity::{
        cart_items::{Column as CartItemCol, Entity as CartItems},
        carts::{Column as CartCol, Entity as Carts},
        coupons::ActiveModel as CouponActive,
        order_items::{ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems},
        orders::{
            ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, OrderStatus,
        },
        payments::{
            ActiveModel as PaymentActive, Column as PaymentCol, Entity as Payments, PaymentStatus,
        },
        product_variants::Entity as ProductVariants,
        products::{Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, OrderItem, Payment},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::{checkout_service, notification_service},
    state::AppState,
};

pub async fn place_order(
    state: &AppState,
    user: &AuthUser,
    payload: PlaceOrderRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    // Delivery resolution reads static tables; no need to hold the
    // transaction open for it.
    let delivery = checkout_service::resolve_delivery(
        &state.pool,
        user.user_id,
        payload.delivery_method,
        payload.address_id,
        payload.pickup_station_id,
    )
    .await?;

    let txn = state.orm.begin().await?;

    let cart = Carts::find()
        .filter(CartCol::UserId.eq(user.user_id))
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::BadRequest("Cart is empty".into()))?;

    let mut lines = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart.id))
        .lock(LockType::Update)
        .all(&txn)
        .await?;

    if lines.is_empty() {
        return Err(AppError::BadRequest("Cart is empty".into()));
    }

    // Lock each product row so concurrent checkouts cannot race the
    // stock decrement. Locks are taken in product id order so two orders
    // sharing products cannot deadlock each other.
    lines.sort_by_key(|line| line.product_id);
    let mut subtotal: i64 = 0;
    let mut products = Vec::with_capacity(lines.len());
    for line in &lines {
        if line.quantity <= 0 {
            return Err(AppError::BadRequest("Cart has invalid quantity".into()));
        }
        let product = Products::find_by_id(line.product_id)
            .lock(LockType::Update)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                AppError::BadRequest(format!("Product {} no longer exists", line.product_id))
            })?;
        if !product.is_active {
            return Err(AppError::BadRequest(format!(
                "{} is no longer available",
                product.name
            )));
        }
        if product.stock < line.quantity {
            return Err(AppError::BadRequest(format!(
                "Insufficient stock for {}",
                product.name
            )));
        }
        subtotal += line.price * i64::from(line.quantity);
        products.push(product);
    }

    let mut discount: i64 = 0;
    let mut coupon_id = None;
    if let Some(code) = payload.coupon_code.as_ref().filter(|c| !c.is_empty()) {
        let (coupon, amount) =
            checkout_service::validate_coupon(&txn, user.user_id, code, subtotal).await?;
        discount = amount;
        coupon_id = Some(coupon.id);

        let usage = coupon.usage_count + 1;
        let mut active: CouponActive = coupon.into();
        active.usage_count = Set(usage);
        active.update(&txn).await?;
    }

    let total = subtotal + delivery.fee - discount;
    let order_id = Uuid::new_v4();

    let order = OrderActive {
        id: Set(order_id),
        order_number: Set(build_order_number(order_id)),
        user_id: Set(user.user_id),
        status: Set(OrderStatus::Pending),
        delivery_method: Set(payload.delivery_method),
        address_id: Set(payload.address_id),
        pickup_station_id: Set(payload.pickup_station_id),
        coupon_id: Set(coupon_id),
        subtotal: Set(subtotal),
        delivery_fee: Set(delivery.fee),
        discount: Set(discount),
        total: Set(total),
        customer_note: Set(payload.customer_note),
        admin_note: Set(None),
        tracking_number: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
        confirmed_at: Set(None),
        shipped_at: Set(None),
        delivered_at: Set(None),
    }
    .insert(&txn)
    .await?;

    let mut order_items: Vec<OrderItem> = Vec::with_capacity(lines.len());
    for (line, product) in lines.iter().zip(&products) {
        let variant_name = match line.variant_id {
            Some(variant_id) => ProductVariants::find_by_id(variant_id)
                .one(&txn)
                .await?
                .map(|v| v.name),
            None => None,
        };

        // Denormalized snapshot: catalog edits must not rewrite history.
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(Some(product.id)),
            vendor_id: Set(product.vendor_id),
            product_name: Set(product.name.clone()),
            product_sku: Set(product.sku.clone()),
            variant_name: Set(variant_name),
            quantity: Set(line.quantity),
            price: Set(line.price),
            total: Set(line.price * i64::from(line.quantity)),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
        order_items.push(item.into());

        Products::update_many()
            .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).sub(line.quantity))
            .col_expr(
                ProdCol::TotalSales,
                Expr::col(ProdCol::TotalSales).add(line.quantity),
            )
            .filter(ProdCol::Id.eq(product.id))
            .exec(&txn)
            .await?;
    }

    let payment_id = Uuid::new_v4();
    let payment = PaymentActive {
        id: Set(payment_id),
        order_id: Set(order.id),
        transaction_id: Set(build_transaction_id(payment_id)),
        payment_method: Set(payload.payment_method),
        status: Set(PaymentStatus::Pending),
        amount: Set(total),
        mpesa_receipt: Set(None),
        mpesa_phone: Set(None),
        merchant_request_id: Set(None),
        checkout_request_id: Set(None),
        response_data: Set(None),
        failure_reason: Set(None),
        created_at: NotSet,
        completed_at: Set(None),
    }
    .insert(&txn)
    .await?;

    CartItems::delete_many()
        .filter(CartItemCol::CartId.eq(cart.id))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    log_audit(
        &state.pool,
        Some(user.user_id),
        "order_place",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "total": total })),
    )
    .await;

    notification_service::notify(
        &state.pool,
        user.user_id,
        "order",
        "Order placed",
        &format!("Your order {} has been placed.", order.order_number),
        Some(&format!("/orders/{}", order.id)),
    )
    .await;

    Ok(ApiResponse::success(
        "Order placed",
        OrderWithItems {
            order: order.into(),
            items: order_items,
            payment: Some(payment.into()),
        },
        Some(Meta::empty()),
    ))
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let mut condition = Condition::all().add(OrderCol::UserId.eq(user.user_id));
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

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::Id.eq(id)),
        )
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

pub async fn cancel_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: CancelOrderRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let txn = state.orm.begin().await?;

    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::Id.eq(id)),
        )
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    if !order.status.is_cancellable() {
        return Err(AppError::BadRequest(format!(
            "Order can no longer be cancelled (status: {:?})",
            order.status
        )));
    }

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&txn)
        .await?;

    // Cancellation reverses the stock decrement taken at placement.
    for item in &items {
        if let Some(product_id) = item.product_id {
            Products::update_many()
                .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).add(item.quantity))
                .col_expr(
                    ProdCol::TotalSales,
                    Expr::col(ProdCol::TotalSales).sub(item.quantity),
                )
                .filter(ProdCol::Id.eq(product_id))
                .exec(&txn)
                .await?;
        }
    }

    let payment = Payments::find()
        .filter(PaymentCol::OrderId.eq(order.id))
        .order_by_desc(PaymentCol::CreatedAt)
        .one(&txn)
        .await?;

    let payment = match payment {
        Some(p) => {
            let next = if p.status == PaymentStatus::Completed {
                PaymentStatus::Refunded
            } else {
                PaymentStatus::Cancelled
            };
            let mut active: PaymentActive = p.into();
            active.status = Set(next);
            Some(active.update(&txn).await?)
        }
        None => None,
    };

    let mut active: OrderActive = order.into();
    active.status = Set(OrderStatus::Cancelled);
    active.admin_note = Set(payload.reason.clone());
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;

    txn.commit().await?;

    log_audit(
        &state.pool,
        Some(user.user_id),
        "order_cancel",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Order cancelled",
        OrderWithItems {
            order: order.into(),
            items: items.into_iter().map(OrderItem::from).collect(),
            payment: payment.map(Payment::from),
        },
        Some(Meta::empty()),
    ))
}

pub async fn track_order(
    state: &AppState,
    user: &AuthUser,
    order_number: &str,
) -> AppResult<ApiResponse<OrderTracking>> {
    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::OrderNumber.eq(order_number)),
        )
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let tracking = OrderTracking {
        order_number: order.order_number,
        status: order.status,
        tracking_number: order.tracking_number,
        confirmed_at: order.confirmed_at.map(|dt| dt.with_timezone(&Utc)),
        shipped_at: order.shipped_at.map(|dt| dt.with_timezone(&Utc)),
        delivered_at: order.delivered_at.map(|dt| dt.with_timezone(&Utc)),
    };

    Ok(ApiResponse::success("Tracking", tracking, Some(Meta::empty())))
}

fn build_order_number(order_id: Uuid) -> String {
    let hex = order_id.simple().to_string();
    format!("ORD-{}", hex[..10].to_uppercase())
}

fn build_transaction_id(payment_id: Uuid) -> String {
    let hex = payment_id.simple().to_string();
    format!("TXN-{}", hex[..12].to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::{build_order_number, build_transaction_id};
    use uuid::Uuid;

    #[test]
    fn reference_numbers_have_fixed_shape() {
        let order = build_order_number(Uuid::new_v4());
        assert!(order.starts_with("ORD-"));
        assert_eq!(order.len(), 14);

        let txn = build_transaction_id(Uuid::new_v4());
        assert!(txn.starts_with("TXN-"));
        assert_eq!(txn.len(), 16);
    }
}
