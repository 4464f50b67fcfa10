use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::orders::DeliveryMethod;

#[derive(Debug, Deserialize, ToSchema)]
pub struct QuoteRequest {
    pub delivery_method: DeliveryMethod,
    pub address_id: Option<Uuid>,
    pub pickup_station_id: Option<Uuid>,
    pub coupon_code: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Quote {
    pub subtotal: i64,
    pub delivery_fee: i64,
    pub discount: i64,
    pub total: i64,
    pub estimated_days: Option<i32>,
    pub coupon_code: Option<String>,
}
