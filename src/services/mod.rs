pub mod admin_service;
pub mod auth_service;
pub mod cart_service;
pub mod catalog_service;
pub mod community_service;
pub mod nft_service;
pub mod notification_service;
pub mod order_service;
pub mod product_service;
pub mod promotion_service;
pub mod user_service;
