use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::promotions::Model as PromotionModel;

#[derive(Debug, Deserialize, ToSchema)]
pub struct ValidatePromotionRequest {
    pub code: String,
    pub subtotal_cents: i64,
}

/// Read-only preview of what the code would take off at checkout.
#[derive(Debug, Serialize, ToSchema)]
pub struct ValidatePromotionResponse {
    pub code: String,
    pub discount_percent: i32,
    pub discount_cents: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePromotionRequest {
    pub code: String,
    pub description: Option<String>,
    pub discount_percent: i32,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub max_usage: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdatePromotionRequest {
    pub description: Option<String>,
    pub discount_percent: Option<i32>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub max_usage: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PromotionResponse {
    pub id: Uuid,
    pub code: String,
    pub description: Option<String>,
    pub discount_percent: i32,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub max_usage: i32,
    pub usage_count: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<PromotionModel> for PromotionResponse {
    fn from(model: PromotionModel) -> Self {
        Self {
            id: model.id,
            code: model.code,
            description: model.description,
            discount_percent: model.discount_percent,
            start_date: model.start_date.with_timezone(&Utc),
            end_date: model.end_date.with_timezone(&Utc),
            max_usage: model.max_usage,
            usage_count: model.usage_count,
            is_active: model.is_active,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PromotionList {
    pub items: Vec<PromotionResponse>,
}
