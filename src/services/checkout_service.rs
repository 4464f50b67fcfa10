use chrono::Utc;
use sea_orm::{ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter};
use uuid::Uuid;

use crate::{
    db::DbPool,
    dto::checkout::{Quote, QuoteRequest},
    entity::{
        coupons::{Column as CouponCol, DiscountType, Entity as Coupons, Model as CouponModel},
        orders::{Column as OrderCol, DeliveryMethod, Entity as Orders},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    response::{ApiResponse, Meta},
    state::AppState,
};

pub struct DeliveryQuote {
    pub fee: i64,
    pub estimated_days: Option<i32>,
}

/// Resolve the delivery fee for the chosen method. Home delivery looks the
/// fee up in the zone table by the address's region/city; pickup charges the
/// station's own fee.
pub async fn resolve_delivery(
    pool: &DbPool,
    user_id: Uuid,
    method: DeliveryMethod,
    address_id: Option<Uuid>,
    pickup_station_id: Option<Uuid>,
) -> AppResult<DeliveryQuote> {
    match method {
        DeliveryMethod::HomeDelivery => {
            let address_id = address_id
                .ok_or_else(|| AppError::BadRequest("Select a delivery address".into()))?;
            let address: Option<(String, String)> =
                sqlx::query_as("SELECT region, city FROM addresses WHERE id = $1 AND user_id = $2")
                    .bind(address_id)
                    .bind(user_id)
                    .fetch_optional(pool)
                    .await?;
            let (region, city) = address
                .ok_or_else(|| AppError::BadRequest("Delivery address not found".into()))?;

            let zone: Option<(i64, i32)> = sqlx::query_as(
                r#"
                SELECT delivery_fee, estimated_days FROM delivery_zones
                WHERE lower(region) = lower($1) AND lower(city) = lower($2) AND is_active
                "#,
            )
            .bind(&region)
            .bind(&city)
            .fetch_optional(pool)
            .await?;
            let (fee, estimated_days) = zone.ok_or_else(|| {
                AppError::BadRequest(format!("No delivery coverage for {city}, {region}"))
            })?;

            Ok(DeliveryQuote {
                fee,
                estimated_days: Some(estimated_days),
            })
        }
        DeliveryMethod::PickupStation => {
            let station_id = pickup_station_id
                .ok_or_else(|| AppError::BadRequest("Select a pickup station".into()))?;
            let station: Option<(i64,)> = sqlx::query_as(
                "SELECT delivery_fee FROM pickup_stations WHERE id = $1 AND is_active",
            )
            .bind(station_id)
            .fetch_optional(pool)
            .await?;
            let station = station
                .ok_or_else(|| AppError::BadRequest("Pickup station not found".into()))?;

            Ok(DeliveryQuote {
                fee: station.0,
                estimated_days: None,
            })
        }
    }
}

/// Validate a coupon for this user and subtotal, returning the coupon and the
/// discount it grants. Runs against any connection so order placement can call
/// it inside its transaction.
pub async fn validate_coupon<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    code: &str,
    subtotal: i64,
) -> AppResult<(CouponModel, i64)> {
    // Codes are stored upper-cased; accept any casing from the client.
    let code = code.trim().to_uppercase();
    let coupon = Coupons::find()
        .filter(CouponCol::Code.eq(code))
        .one(conn)
        .await?
        .ok_or_else(|| AppError::BadRequest("Invalid coupon code".into()))?;

    let now = Utc::now();
    if !coupon.is_active
        || now < coupon.valid_from.with_timezone(&Utc)
        || now > coupon.valid_to.with_timezone(&Utc)
    {
        return Err(AppError::BadRequest("Coupon is not valid".into()));
    }

    if let Some(limit) = coupon.usage_limit {
        if coupon.usage_count >= limit {
            return Err(AppError::BadRequest("Coupon usage limit reached".into()));
        }
    }

    let user_usage = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user_id))
                .add(OrderCol::CouponId.eq(coupon.id)),
        )
        .count(conn)
        .await? as i32;
    if user_usage >= coupon.user_limit {
        return Err(AppError::BadRequest(
            "You have already used this coupon".into(),
        ));
    }

    if subtotal < coupon.minimum_purchase {
        return Err(AppError::BadRequest(format!(
            "Coupon requires a minimum purchase of {}",
            coupon.minimum_purchase
        )));
    }

    let discount = compute_discount(
        coupon.discount_type,
        coupon.discount_value,
        coupon.maximum_discount,
        subtotal,
    );
    Ok((coupon, discount))
}

/// Percentage or fixed discount, capped by the optional maximum and never
/// exceeding the subtotal.
pub fn compute_discount(
    discount_type: DiscountType,
    discount_value: i64,
    maximum_discount: Option<i64>,
    subtotal: i64,
) -> i64 {
    let raw = match discount_type {
        DiscountType::Percentage => subtotal * discount_value / 100,
        DiscountType::Fixed => discount_value,
    };
    let capped = match maximum_discount {
        Some(max) => raw.min(max),
        None => raw,
    };
    capped.clamp(0, subtotal)
}

pub async fn cart_subtotal(pool: &DbPool, user_id: Uuid) -> AppResult<i64> {
    let row: (Option<i64>,) = sqlx::query_as(
        r#"
        SELECT SUM(ci.price * ci.quantity)::bigint
        FROM cart_items ci
        JOIN carts c ON c.id = ci.cart_id
        WHERE c.user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    Ok(row.0.unwrap_or(0))
}

pub async fn quote(
    state: &AppState,
    user: &AuthUser,
    payload: QuoteRequest,
) -> AppResult<ApiResponse<Quote>> {
    let subtotal = cart_subtotal(&state.pool, user.user_id).await?;
    if subtotal == 0 {
        return Err(AppError::BadRequest("Cart is empty".into()));
    }

    let delivery = resolve_delivery(
        &state.pool,
        user.user_id,
        payload.delivery_method,
        payload.address_id,
        payload.pickup_station_id,
    )
    .await?;

    let mut discount = 0;
    let mut coupon_code = None;
    if let Some(code) = payload.coupon_code.as_ref().filter(|c| !c.is_empty()) {
        let (coupon, amount) = validate_coupon(&state.orm, user.user_id, code, subtotal).await?;
        discount = amount;
        coupon_code = Some(coupon.code);
    }

    let quote = Quote {
        subtotal,
        delivery_fee: delivery.fee,
        discount,
        total: subtotal + delivery.fee - discount,
        estimated_days: delivery.estimated_days,
        coupon_code,
    };
    Ok(ApiResponse::success("Quote", quote, Some(Meta::empty())))
}

#[cfg(test)]
mod tests {
    use super::compute_discount;
    use crate::entity::coupons::DiscountType;

    #[test]
    fn percentage_discount_is_capped_by_maximum() {
        // 10% of 50,000 = 5,000, capped at 3,000
        assert_eq!(
            compute_discount(DiscountType::Percentage, 10, Some(3_000), 50_000),
            3_000
        );
        assert_eq!(
            compute_discount(DiscountType::Percentage, 10, None, 50_000),
            5_000
        );
    }

    #[test]
    fn fixed_discount_never_exceeds_subtotal() {
        assert_eq!(compute_discount(DiscountType::Fixed, 8_000, None, 5_000), 5_000);
        assert_eq!(compute_discount(DiscountType::Fixed, 2_000, None, 5_000), 2_000);
    }

    #[test]
    fn negative_values_clamp_to_zero() {
        assert_eq!(compute_discount(DiscountType::Fixed, -100, None, 5_000), 0);
    }
}
