mod common;

use model_shop_api::{
    dto::{
        auth::{LoginRequest, RegisterRequest},
        cart::{AddToCartRequest, SetQuantityRequest},
        orders::CheckoutRequest,
    },
    entity::products::{ActiveModel as ProductActive, Entity as Products},
    error::AppError,
    middleware::auth::{AuthUser, CartOwner},
    routes::admin::UpdateOrderStatusRequest,
    services::{admin_service, auth_service, cart_service, order_service},
};
use sea_orm::{ActiveModelTrait, EntityTrait, Set};

fn checkout_payload(promotion_code: Option<String>) -> CheckoutRequest {
    CheckoutRequest {
        recipient_name: "Rin Builder".into(),
        shipping_address: "12 Panel Line Way".into(),
        phone: "555-0134".into(),
        email: None,
        payment_method: "cod".into(),
        promotion_code,
        nft_product_ids: Vec::new(),
    }
}

// Full shopper path: guest cart, login-time merge, checkout, public
// tracking, owner cancellation with stock restore.
#[tokio::test]
async fn guest_merge_checkout_track_and_cancel_flow() -> anyhow::Result<()> {
    let Some(database_url) = common::test_database_url() else {
        return Ok(());
    };
    let state = common::setup_state(&database_url).await?;

    let kit = common::create_product(&state, "HF-01 Vanguard 1/100", 1000, 10, 10).await?;
    let topcoat = common::create_product(&state, "Matte Top Coat 170ml", 500, 0, 5).await?;

    // Register, then put one kit in the user cart before logging in.
    let registered = auth_service::register_user(
        &state.pool,
        RegisterRequest {
            email: "rin@example.com".into(),
            password: "correct-horse".into(),
            full_name: "Rin Builder".into(),
        },
    )
    .await?;
    let profile = registered.data.unwrap();
    let auth = AuthUser {
        user_id: profile.id,
        role: profile.role.clone(),
    };
    let user_owner = CartOwner::User(auth.clone());

    cart_service::add_to_cart(
        &state.pool,
        &user_owner,
        AddToCartRequest {
            product_id: kit,
            quantity: 1,
        },
    )
    .await?;

    // Guest cart built in parallel: two kits and one top coat.
    let guest_owner = CartOwner::Guest("sess-merge-0001".into());
    cart_service::add_to_cart(
        &state.pool,
        &guest_owner,
        AddToCartRequest {
            product_id: kit,
            quantity: 2,
        },
    )
    .await?;
    cart_service::add_to_cart(
        &state.pool,
        &guest_owner,
        AddToCartRequest {
            product_id: topcoat,
            quantity: 1,
        },
    )
    .await?;

    // Logging in with the session key folds the guest cart into the user
    // cart, summing quantities per product.
    auth_service::login_user(
        &state,
        LoginRequest {
            email: "rin@example.com".into(),
            password: "correct-horse".into(),
            session_key: Some("sess-merge-0001".into()),
        },
    )
    .await?;

    let cart = cart_service::list_cart(&state.pool, &user_owner)
        .await?
        .data
        .unwrap();
    assert_eq!(cart.items.len(), 2);
    let kit_line = cart.items.iter().find(|l| l.product_id == kit).unwrap();
    assert_eq!(kit_line.quantity, 3);
    assert_eq!(kit_line.unit_price_cents, 900);
    let guest_cart = cart_service::list_cart(&state.pool, &guest_owner)
        .await?
        .data
        .unwrap();
    assert!(guest_cart.items.is_empty());

    // Trim the kit line back to two, so the cart is 2 x 900 + 1 x 500.
    cart_service::set_quantity(
        &state.pool,
        &user_owner,
        kit,
        SetQuantityRequest { quantity: 2 },
    )
    .await?;

    let placed = order_service::checkout(&state, &user_owner, checkout_payload(None))
        .await?
        .data
        .unwrap();
    assert_eq!(placed.order.subtotal_cents, 2300);
    assert_eq!(placed.order.discount_cents, 0);
    // 2300 clears the 2000-cent free shipping bar in the test config.
    assert_eq!(placed.order.shipping_cents, 0);
    assert_eq!(placed.order.total_cents, 2300);
    assert_eq!(placed.order.status, "pending");
    assert_eq!(placed.details.len(), 2);

    // Checkout emptied the cart and moved stock into sold counters.
    let after = cart_service::list_cart(&state.pool, &user_owner)
        .await?
        .data
        .unwrap();
    assert!(after.items.is_empty());
    assert!(matches!(
        order_service::checkout(&state, &user_owner, checkout_payload(None)).await,
        Err(AppError::BadRequest(_))
    ));
    let kit_row = Products::find_by_id(kit).one(&state.orm).await?.unwrap();
    assert_eq!(kit_row.stock_quantity, 8);
    assert_eq!(kit_row.sold_count, 2);

    // Detail rows are snapshots; a later catalog edit must not reach them.
    ProductActive {
        id: Set(kit),
        price_cents: Set(99_000),
        ..Default::default()
    }
    .update(&state.orm)
    .await?;

    let tracked = order_service::track_order(&state, &placed.order.order_code)
        .await?
        .data
        .unwrap();
    let frozen = tracked.details.iter().find(|d| d.product_id == kit).unwrap();
    assert_eq!(frozen.price_cents, 900);
    assert_eq!(frozen.product_name, "HF-01 Vanguard 1/100");

    assert!(matches!(
        order_service::track_order(&state, "MS-20200101-deadbeef").await,
        Err(AppError::NotFound)
    ));

    // Owner cancellation rolls stock and sold counters back.
    let cancelled = order_service::cancel_order(&state, &auth, placed.order.id)
        .await?
        .data
        .unwrap();
    assert_eq!(cancelled.status, "cancelled");
    let kit_row = Products::find_by_id(kit).one(&state.orm).await?.unwrap();
    assert_eq!(kit_row.stock_quantity, 10);
    assert_eq!(kit_row.sold_count, 0);

    assert!(matches!(
        order_service::cancel_order(&state, &auth, placed.order.id).await,
        Err(AppError::BadRequest(_))
    ));

    // Cancelled is terminal for admins as well.
    let admin = common::create_user(&state, "admin", "admin@example.com").await?;
    assert!(matches!(
        admin_service::update_order_status(
            &state,
            &admin,
            placed.order.id,
            UpdateOrderStatusRequest {
                status: "processing".into()
            }
        )
        .await,
        Err(AppError::BadRequest(_))
    ));

    // Guest checkout pays the flat fee below the free bar and must leave a
    // contact email.
    let late_guest = CartOwner::Guest("sess-guest-0002".into());
    cart_service::add_to_cart(
        &state.pool,
        &late_guest,
        AddToCartRequest {
            product_id: topcoat,
            quantity: 1,
        },
    )
    .await?;
    assert!(matches!(
        order_service::checkout(&state, &late_guest, checkout_payload(None)).await,
        Err(AppError::BadRequest(_))
    ));

    let mut guest_payload = checkout_payload(None);
    guest_payload.email = Some("guest@example.com".into());
    let guest_order = order_service::checkout(&state, &late_guest, guest_payload)
        .await?
        .data
        .unwrap();
    assert_eq!(guest_order.order.user_id, None);
    assert_eq!(
        guest_order.order.guest_email.as_deref(),
        Some("guest@example.com")
    );
    assert_eq!(guest_order.order.subtotal_cents, 500);
    assert_eq!(guest_order.order.shipping_cents, 500);
    assert_eq!(guest_order.order.total_cents, 1000);

    // The public tracker works for guest orders too.
    let tracked = order_service::track_order(&state, &guest_order.order.order_code)
        .await?
        .data
        .unwrap();
    assert_eq!(tracked.order.id, guest_order.order.id);

    Ok(())
}
