use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

pub const ROLES: [&str; 4] = ["user", "admin", "customizer", "support"];

pub const ORDER_STATUSES: [&str; 5] = [
    "pending",
    "processing",
    "shipped",
    "delivered",
    "cancelled",
];

/// Denormalized product flag set carried in `products.status`.
pub const PRODUCT_STATUS_FLAGS: [&str; 6] = ["new", "used", "custom", "hot", "sale", "unavailable"];

pub const NOTIFICATION_KINDS: [&str; 4] = ["system", "order", "promo", "community"];

pub fn is_valid_role(role: &str) -> bool {
    ROLES.contains(&role)
}

pub fn is_valid_order_status(status: &str) -> bool {
    ORDER_STATUSES.contains(&status)
}

pub fn is_valid_status_flag(flag: &str) -> bool {
    PRODUCT_STATUS_FLAGS.contains(&flag)
}

pub fn is_valid_notification_kind(kind: &str) -> bool {
    NOTIFICATION_KINDS.contains(&kind)
}

/// Account row as stored. The password hash never leaves the service layer;
/// wire shapes live in `dto::users`.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub role: String,
    pub wallet_address: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct CartItem {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub session_key: Option<String>,
    pub product_id: Uuid,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct Post {
    pub id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub images: Vec<String>,
    pub like_count: i32,
    pub comment_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub is_global: bool,
    pub title: String,
    pub message: String,
    pub kind: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct NftMint {
    pub id: Uuid,
    pub order_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub token_id: i64,
    pub tx_hash: String,
    pub mint_address: String,
    pub minted_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_status_set_matches_lifecycle() {
        for status in ["pending", "processing", "shipped", "delivered", "cancelled"] {
            assert!(is_valid_order_status(status));
        }
        assert!(!is_valid_order_status("paid"));
        assert!(!is_valid_order_status(""));
    }

    #[test]
    fn status_flags_reject_unknown() {
        assert!(is_valid_status_flag("hot"));
        assert!(!is_valid_status_flag("discounted"));
    }

    #[test]
    fn roles_reject_unknown() {
        assert!(is_valid_role("customizer"));
        assert!(!is_valid_role("root"));
    }
}
