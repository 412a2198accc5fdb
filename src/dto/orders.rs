use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::{
    order_details::Model as OrderDetailModel, orders::Model as OrderModel,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    pub recipient_name: String,
    pub shipping_address: String,
    pub phone: String,
    /// Required for guest checkout; ignored for logged-in users.
    pub email: Option<String>,
    pub payment_method: String,
    pub promotion_code: Option<String>,
    /// Cart lines the buyer wants delivered as NFTs.
    #[serde(default)]
    pub nft_product_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub order_code: String,
    pub user_id: Option<Uuid>,
    pub guest_name: Option<String>,
    pub guest_email: Option<String>,
    pub guest_phone: Option<String>,
    pub shipping_address: String,
    pub status: String,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub shipping_cents: i64,
    pub total_cents: i64,
    pub payment_method: String,
    pub promotion_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<OrderModel> for OrderResponse {
    fn from(model: OrderModel) -> Self {
        Self {
            id: model.id,
            order_code: model.order_code,
            user_id: model.user_id,
            guest_name: model.guest_name,
            guest_email: model.guest_email,
            guest_phone: model.guest_phone,
            shipping_address: model.shipping_address,
            status: model.status,
            subtotal_cents: model.subtotal_cents,
            discount_cents: model.discount_cents,
            shipping_cents: model.shipping_cents,
            total_cents: model.total_cents,
            payment_method: model.payment_method,
            promotion_id: model.promotion_id,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

/// Line snapshot as purchased. `price_cents` is the discounted unit price
/// at order time and never follows later catalog edits.
#[derive(Debug, Serialize, ToSchema)]
pub struct OrderDetailResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub price_cents: i64,
}

impl From<OrderDetailModel> for OrderDetailResponse {
    fn from(model: OrderDetailModel) -> Self {
        Self {
            id: model.id,
            product_id: model.product_id,
            product_name: model.product_name,
            quantity: model.quantity,
            price_cents: model.price_cents,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithDetails {
    pub order: OrderResponse,
    pub details: Vec<OrderDetailResponse>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<OrderResponse>,
}
