use axum::Router;

use crate::state::AppState;

pub mod admin;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod community;
pub mod doc;
pub mod health;
pub mod nft;
pub mod notifications;
pub mod orders;
pub mod params;
pub mod products;
pub mod promotions;
pub mod users;
pub mod ws;

// Build the API router without binding state; it is provided at the top level.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/users", users::router())
        .nest("/products", products::router())
        .nest("/categories", catalog::categories_router())
        .nest("/brands", catalog::brands_router())
        .nest("/cart", cart::router())
        .nest("/orders", orders::router())
        .nest("/promotions", promotions::router())
        .nest("/community", community::router())
        .nest("/notifications", notifications::router())
        .nest("/nft", nft::router())
        .nest("/admin", admin::router())
        .nest("/ws", ws::router())
}
