#![allow(dead_code)]

use std::sync::Arc;

use model_shop_api::{
    config::AppConfig,
    db::{create_orm_conn, create_pool},
    entity::{products::ActiveModel as ProductActive, users::ActiveModel as UserActive},
    middleware::auth::AuthUser,
    mint::MintSubmitter,
    realtime::NotificationHub,
    state::AppState,
};
use sea_orm::{ActiveModelTrait, Set};
use uuid::Uuid;

/// Database URL for the flow tests, or `None` to skip when the environment
/// has no database configured.
pub fn test_database_url() -> Option<String> {
    match std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")) {
        Ok(url) => Some(url),
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            None
        }
    }
}

/// Free shipping starts at 20 dollars here so both shipping branches are
/// reachable with small carts.
pub fn test_config(database_url: &str) -> AppConfig {
    AppConfig {
        database_url: database_url.to_string(),
        host: "127.0.0.1".into(),
        port: 0,
        jwt_secret: "integration-secret".into(),
        jwt_ttl_hours: 1,
        shipping_fee_cents: 500,
        free_shipping_min_cents: 2000,
        mint_signer_url: None,
        mint_contract_address: None,
    }
}

pub async fn setup_state(database_url: &str) -> anyhow::Result<AppState> {
    let pool = create_pool(database_url).await?;
    let orm = create_orm_conn(database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    // Clean tables between runs
    sqlx::query(
        "TRUNCATE TABLE notifications, nft_mints, audit_logs, likes, comments, posts, \
         order_details, orders, cart_items, promotions, products, brands, categories, users \
         RESTART IDENTITY CASCADE",
    )
    .execute(&pool)
    .await?;

    let config = test_config(database_url);
    let minter = Arc::new(MintSubmitter::from_config(&config));
    Ok(AppState {
        pool,
        orm,
        hub: Arc::new(NotificationHub::default()),
        minter,
        config: Arc::new(config),
    })
}

pub async fn create_user(state: &AppState, role: &str, email: &str) -> anyhow::Result<AuthUser> {
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        password_hash: Set("unused-hash".into()),
        full_name: Set("Test Account".into()),
        role: Set(role.to_string()),
        ..Default::default()
    }
    .insert(&state.orm)
    .await?;

    Ok(AuthUser {
        user_id: user.id,
        role: user.role,
    })
}

pub async fn create_product(
    state: &AppState,
    name: &str,
    price_cents: i64,
    discount_percent: i32,
    stock: i32,
) -> anyhow::Result<Uuid> {
    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        price_cents: Set(price_cents),
        discount_percent: Set(discount_percent),
        stock_quantity: Set(stock),
        ..Default::default()
    }
    .insert(&state.orm)
    .await?;
    Ok(product.id)
}
