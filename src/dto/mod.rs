pub mod auth;
pub mod cart;
pub mod catalog;
pub mod community;
pub mod nft;
pub mod notifications;
pub mod orders;
pub mod products;
pub mod promotions;
pub mod users;
