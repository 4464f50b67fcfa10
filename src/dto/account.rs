use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Address, Notification, Product};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAddressRequest {
    pub address_type: String,
    pub full_name: String,
    pub phone_number: String,
    pub region: String,
    pub city: String,
    pub area: String,
    pub street_address: String,
    pub additional_info: Option<String>,
    pub is_default: Option<bool>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateAddressRequest {
    pub address_type: Option<String>,
    pub full_name: Option<String>,
    pub phone_number: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub area: Option<String>,
    pub street_address: Option<String>,
    pub additional_info: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AddressList {
    pub items: Vec<Address>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddToWishlistRequest {
    pub product_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WishlistEntry {
    pub id: Uuid,
    pub product: Product,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WishlistList {
    pub items: Vec<WishlistEntry>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct NotificationList {
    pub items: Vec<Notification>,
}
