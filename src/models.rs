use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::{
    coupons::DiscountType,
    order_items,
    orders::{self, DeliveryMethod, OrderStatus},
    payments::{self, PaymentMethod, PaymentStatus},
};

#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub phone_number: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Address {
    pub id: Uuid,
    pub user_id: Uuid,
    pub address_type: String,
    pub full_name: String,
    pub phone_number: String,
    pub region: String,
    pub city: String,
    pub area: String,
    pub street_address: String,
    pub additional_info: Option<String>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct PickupStation {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub region: String,
    pub city: String,
    pub address: String,
    pub phone_number: String,
    pub operating_hours: String,
    pub delivery_fee: i64,
    pub capacity: i32,
    pub is_active: bool,
}

#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub parent_id: Option<Uuid>,
    pub description: Option<String>,
    pub is_active: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Brand {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub is_active: bool,
}

#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Vendor {
    pub id: Uuid,
    pub business_name: String,
    pub slug: String,
    pub is_active: bool,
    pub rating: i32,
}

#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub vendor_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub brand_id: Option<Uuid>,
    pub name: String,
    pub slug: String,
    pub sku: String,
    pub description: Option<String>,
    pub price: i64,
    pub compare_price: Option<i64>,
    pub stock: i32,
    pub low_stock_threshold: i32,
    pub is_active: bool,
    pub is_featured: bool,
    pub views: i32,
    pub total_sales: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Discount badge vs the struck-through compare price, in whole percent.
    pub fn discount_percentage(&self) -> i64 {
        match self.compare_price {
            Some(compare) if compare > self.price && compare > 0 => {
                (compare - self.price) * 100 / compare
            }
            _ => 0,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ProductImage {
    pub id: Uuid,
    pub product_id: Uuid,
    pub url: String,
    pub alt_text: Option<String>,
    pub is_primary: bool,
    pub sort_order: i32,
}

#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ProductVariant {
    pub id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    pub sku: String,
    pub price: Option<i64>,
    pub stock: i32,
    pub is_active: bool,
}

#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ProductSpecification {
    pub id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    pub value: String,
    pub sort_order: i32,
}

#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Review {
    pub id: Uuid,
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub rating: i32,
    pub title: String,
    pub comment: String,
    pub is_verified_purchase: bool,
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct DeliveryZone {
    pub id: Uuid,
    pub region: String,
    pub city: String,
    pub delivery_fee: i64,
    pub estimated_days: i32,
    pub is_active: bool,
}

#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Banner {
    pub id: Uuid,
    pub title: String,
    pub subtitle: Option<String>,
    pub image_url: String,
    pub link: Option<String>,
    pub sort_order: i32,
    pub is_active: bool,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Coupon {
    pub id: Uuid,
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub minimum_purchase: i64,
    pub maximum_discount: Option<i64>,
    pub usage_limit: Option<i32>,
    pub usage_count: i32,
    pub user_limit: i32,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    pub is_active: bool,
}

impl From<crate::entity::coupons::Model> for Coupon {
    fn from(model: crate::entity::coupons::Model) -> Self {
        Self {
            id: model.id,
            code: model.code,
            discount_type: model.discount_type,
            discount_value: model.discount_value,
            minimum_purchase: model.minimum_purchase,
            maximum_discount: model.maximum_discount,
            usage_limit: model.usage_limit,
            usage_count: model.usage_count,
            user_limit: model.user_limit,
            valid_from: model.valid_from.with_timezone(&Utc),
            valid_to: model.valid_to.with_timezone(&Utc),
            is_active: model.is_active,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,
    pub status: OrderStatus,
    pub delivery_method: DeliveryMethod,
    pub address_id: Option<Uuid>,
    pub pickup_station_id: Option<Uuid>,
    pub coupon_id: Option<Uuid>,
    pub subtotal: i64,
    pub delivery_fee: i64,
    pub discount: i64,
    pub total: i64,
    pub customer_note: Option<String>,
    pub tracking_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl From<orders::Model> for Order {
    fn from(model: orders::Model) -> Self {
        Self {
            id: model.id,
            order_number: model.order_number,
            user_id: model.user_id,
            status: model.status,
            delivery_method: model.delivery_method,
            address_id: model.address_id,
            pickup_station_id: model.pickup_station_id,
            coupon_id: model.coupon_id,
            subtotal: model.subtotal,
            delivery_fee: model.delivery_fee,
            discount: model.discount,
            total: model.total,
            customer_note: model.customer_note,
            tracking_number: model.tracking_number,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
            confirmed_at: model.confirmed_at.map(|dt| dt.with_timezone(&Utc)),
            shipped_at: model.shipped_at.map(|dt| dt.with_timezone(&Utc)),
            delivered_at: model.delivered_at.map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Option<Uuid>,
    pub product_name: String,
    pub product_sku: String,
    pub variant_name: Option<String>,
    pub quantity: i32,
    pub price: i64,
    pub total: i64,
    pub created_at: DateTime<Utc>,
}

impl From<order_items::Model> for OrderItem {
    fn from(model: order_items::Model) -> Self {
        Self {
            id: model.id,
            order_id: model.order_id,
            product_id: model.product_id,
            product_name: model.product_name,
            product_sku: model.product_sku,
            variant_name: model.variant_name,
            quantity: model.quantity,
            price: model.price,
            total: model.total,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Payment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub transaction_id: String,
    pub payment_method: PaymentMethod,
    pub status: PaymentStatus,
    pub amount: i64,
    pub mpesa_receipt: Option<String>,
    pub mpesa_phone: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<payments::Model> for Payment {
    fn from(model: payments::Model) -> Self {
        Self {
            id: model.id,
            order_id: model.order_id,
            transaction_id: model.transaction_id,
            payment_method: model.payment_method,
            status: model.status,
            amount: model.amount,
            mpesa_receipt: model.mpesa_receipt,
            mpesa_phone: model.mpesa_phone,
            failure_reason: model.failure_reason,
            created_at: model.created_at.with_timezone(&Utc),
            completed_at: model.completed_at.map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn product(price: i64, compare: Option<i64>) -> Product {
        Product {
            id: Uuid::new_v4(),
            vendor_id: None,
            category_id: None,
            brand_id: None,
            name: "Phone".into(),
            slug: "phone".into(),
            sku: "SKU1".into(),
            description: None,
            price,
            compare_price: compare,
            stock: 1,
            low_stock_threshold: 5,
            is_active: true,
            is_featured: false,
            views: 0,
            total_sales: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn discount_percentage_from_compare_price() {
        assert_eq!(product(75_00, Some(100_00)).discount_percentage(), 25);
        assert_eq!(product(100_00, Some(100_00)).discount_percentage(), 0);
        assert_eq!(product(100_00, None).discount_percentage(), 0);
    }
}
