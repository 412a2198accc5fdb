use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{entity::products::Model as ProductModel, pricing};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProductRequest {
    pub name: String,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub brand_id: Option<Uuid>,
    pub price_cents: i64,
    #[serde(default)]
    pub discount_percent: i32,
    pub stock_quantity: i32,
    #[serde(default)]
    pub status: Vec<String>,
    pub nft_token_id: Option<i64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub brand_id: Option<Uuid>,
    pub price_cents: Option<i64>,
    pub discount_percent: Option<i32>,
    pub stock_quantity: Option<i32>,
    pub status: Option<Vec<String>>,
    pub nft_token_id: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub brand_id: Option<Uuid>,
    pub price_cents: i64,
    pub discount_percent: i32,
    /// `price_cents` with the product discount applied.
    pub discounted_price_cents: i64,
    pub stock_quantity: i32,
    pub sold_count: i32,
    pub status: Vec<String>,
    pub nft_token_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ProductModel> for ProductResponse {
    fn from(model: ProductModel) -> Self {
        let discounted_price_cents =
            pricing::discounted_unit_price(model.price_cents, model.discount_percent);
        Self {
            id: model.id,
            name: model.name,
            description: model.description,
            category_id: model.category_id,
            brand_id: model.brand_id,
            price_cents: model.price_cents,
            discount_percent: model.discount_percent,
            discounted_price_cents,
            stock_quantity: model.stock_quantity,
            sold_count: model.sold_count,
            status: model.status,
            nft_token_id: model.nft_token_id,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ProductList {
    pub items: Vec<ProductResponse>,
}
