mod common;

use chrono::{Duration, Utc};
use model_shop_api::{
    dto::{
        cart::AddToCartRequest,
        orders::CheckoutRequest,
        promotions::{CreatePromotionRequest, ValidatePromotionRequest},
    },
    entity::promotions::{Column as PromoCol, Entity as Promotions},
    error::AppError,
    middleware::auth::CartOwner,
    services::{cart_service, order_service, promotion_service},
};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};

fn checkout_with_code(code: &str) -> CheckoutRequest {
    CheckoutRequest {
        recipient_name: "Decal Buyer".into(),
        shipping_address: "7 Sprue Street".into(),
        phone: "555-0177".into(),
        email: None,
        payment_method: "card".into(),
        promotion_code: Some(code.into()),
        nft_product_ids: Vec::new(),
    }
}

// A single-use code: previewed, redeemed once at checkout, then refused
// everywhere without ever moving its counter again.
#[tokio::test]
async fn promotion_redeems_once_and_preview_never_mutates() -> anyhow::Result<()> {
    let Some(database_url) = common::test_database_url() else {
        return Ok(());
    };
    let state = common::setup_state(&database_url).await?;

    let admin = common::create_user(&state, "admin", "admin@example.com").await?;
    let shopper = common::create_user(&state, "user", "first@example.com").await?;
    let latecomer = common::create_user(&state, "user", "second@example.com").await?;
    let decals = common::create_product(&state, "Decal Sheet Set", 1000, 0, 50).await?;

    // Only admins may mint codes.
    let now = Utc::now();
    let launch = CreatePromotionRequest {
        code: "launch10".into(),
        description: Some("Launch week".into()),
        discount_percent: 10,
        start_date: now - Duration::days(1),
        end_date: now + Duration::days(1),
        max_usage: 1,
        is_active: true,
    };
    assert!(matches!(
        promotion_service::create_promotion(
            &state,
            &shopper,
            CreatePromotionRequest {
                code: "NOPE".into(),
                description: None,
                discount_percent: 5,
                start_date: now,
                end_date: now + Duration::days(1),
                max_usage: 10,
                is_active: true,
            }
        )
        .await,
        Err(AppError::Forbidden)
    ));
    let created = promotion_service::create_promotion(&state, &admin, launch)
        .await?
        .data
        .unwrap();
    // Codes are stored uppercased.
    assert_eq!(created.code, "LAUNCH10");

    // Preview normalizes the code and reports the discount without
    // consuming anything.
    let preview = promotion_service::validate(
        &state,
        ValidatePromotionRequest {
            code: "  launch10 ".into(),
            subtotal_cents: 2000,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(preview.code, "LAUNCH10");
    assert_eq!(preview.discount_cents, 200);

    // First checkout takes the only slot: 2 x 1000 at 10% off, free
    // shipping at the 2000-cent bar.
    let shopper_owner = CartOwner::User(shopper.clone());
    cart_service::add_to_cart(
        &state.pool,
        &shopper_owner,
        AddToCartRequest {
            product_id: decals,
            quantity: 2,
        },
    )
    .await?;
    let placed = order_service::checkout(&state, &shopper_owner, checkout_with_code("LAUNCH10"))
        .await?
        .data
        .unwrap();
    assert_eq!(placed.order.subtotal_cents, 2000);
    assert_eq!(placed.order.discount_cents, 200);
    assert_eq!(placed.order.shipping_cents, 0);
    assert_eq!(placed.order.total_cents, 1800);
    assert!(placed.order.promotion_id.is_some());

    let promo = Promotions::find()
        .filter(PromoCol::Code.eq("LAUNCH10"))
        .one(&state.orm)
        .await?
        .unwrap();
    assert_eq!(promo.usage_count, 1);

    // The exhausted code fails the next checkout and leaves that cart
    // untouched.
    let late_owner = CartOwner::User(latecomer.clone());
    cart_service::add_to_cart(
        &state.pool,
        &late_owner,
        AddToCartRequest {
            product_id: decals,
            quantity: 1,
        },
    )
    .await?;
    assert!(matches!(
        order_service::checkout(&state, &late_owner, checkout_with_code("LAUNCH10")).await,
        Err(AppError::BadRequest(_))
    ));
    let cart = cart_service::list_cart(&state.pool, &late_owner)
        .await?
        .data
        .unwrap();
    assert_eq!(cart.items.len(), 1);

    assert!(matches!(
        promotion_service::validate(
            &state,
            ValidatePromotionRequest {
                code: "LAUNCH10".into(),
                subtotal_cents: 1000,
            }
        )
        .await,
        Err(AppError::BadRequest(_))
    ));

    // Neither the refused redemption nor the previews moved the counter.
    let promo = Promotions::find()
        .filter(PromoCol::Code.eq("LAUNCH10"))
        .one(&state.orm)
        .await?
        .unwrap();
    assert_eq!(promo.usage_count, 1);

    // A code outside its window reads as expired even with slots left.
    promotion_service::create_promotion(
        &state,
        &admin,
        CreatePromotionRequest {
            code: "RETRO15".into(),
            description: None,
            discount_percent: 15,
            start_date: now - Duration::days(10),
            end_date: now - Duration::days(5),
            max_usage: 100,
            is_active: true,
        },
    )
    .await?;
    assert!(matches!(
        promotion_service::validate(
            &state,
            ValidatePromotionRequest {
                code: "RETRO15".into(),
                subtotal_cents: 1000,
            }
        )
        .await,
        Err(AppError::BadRequest(_))
    ));

    assert!(matches!(
        promotion_service::validate(
            &state,
            ValidatePromotionRequest {
                code: "NO-SUCH-CODE".into(),
                subtotal_cents: 1000,
            }
        )
        .await,
        Err(AppError::NotFound)
    ));

    Ok(())
}
