use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entity::{orders::DeliveryMethod, payments::PaymentMethod},
    models::{Order, OrderItem, Payment},
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct PlaceOrderRequest {
    pub delivery_method: DeliveryMethod,
    pub address_id: Option<Uuid>,
    pub pickup_station_id: Option<Uuid>,
    pub coupon_code: Option<String>,
    pub payment_method: PaymentMethod,
    pub customer_note: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CancelOrderRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub payment: Option<Payment>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderTracking {
    pub order_number: String,
    pub status: crate::entity::orders::OrderStatus,
    pub tracking_number: Option<String>,
    pub confirmed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub shipped_at: Option<chrono::DateTime<chrono::Utc>>,
    pub delivered_at: Option<chrono::DateTime<chrono::Utc>>,
}
