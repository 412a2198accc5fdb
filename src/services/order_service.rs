use std::collections::HashMap;

use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::orders::{
        CheckoutRequest, OrderDetailResponse, OrderList, OrderResponse, OrderWithDetails,
    },
    entity::{
        cart_items::{Column as CartCol, Entity as CartItems},
        order_details::{
            ActiveModel as DetailActive, Column as DetailCol, Entity as OrderDetails,
        },
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders},
        products::{Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, CartOwner},
    models::is_valid_order_status,
    pricing,
    realtime::{self, ServerEvent},
    response::{ApiResponse, Meta},
    routes::params::OrderListQuery,
    services::{nft_service, notification_service, promotion_service},
    state::AppState,
};

/// Place an order from the caller's cart. Stock checks, pricing, promotion
/// redemption, order and detail rows, stock decrement and cart clearing all
/// commit in one transaction; notifications and NFT submissions go out
/// fire-and-forget afterwards.
pub async fn checkout(
    state: &AppState,
    owner: &CartOwner,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<OrderWithDetails>> {
    let CheckoutRequest {
        recipient_name,
        shipping_address,
        phone,
        email,
        payment_method,
        promotion_code,
        nft_product_ids,
    } = payload;

    let recipient_name = required_field(&recipient_name, "recipient_name")?;
    let shipping_address = required_field(&shipping_address, "shipping_address")?;
    let phone = required_field(&phone, "phone")?;
    let payment_method = required_field(&payment_method, "payment_method")?;

    let guest_email = match owner {
        CartOwner::User(_) => None,
        CartOwner::Guest(_) => {
            let email = email
                .as_deref()
                .map(str::trim)
                .filter(|e| !e.is_empty() && e.contains('@'))
                .ok_or_else(|| {
                    AppError::BadRequest("A valid email is required for guest checkout".into())
                })?;
            Some(email.to_string())
        }
    };

    let cart_condition = match owner {
        CartOwner::User(user) => CartCol::UserId.eq(user.user_id),
        CartOwner::Guest(key) => CartCol::SessionKey.eq(key.clone()),
    };

    let txn = state.orm.begin().await?;

    let lines = CartItems::find()
        .filter(cart_condition.clone())
        .all(&txn)
        .await?;
    if lines.is_empty() {
        return Err(AppError::BadRequest("Cart is empty".into()));
    }

    let product_ids: Vec<Uuid> = lines.iter().map(|l| l.product_id).collect();
    for id in &nft_product_ids {
        if !product_ids.contains(id) {
            return Err(AppError::BadRequest(
                "nft_product_ids must reference products in the cart".into(),
            ));
        }
    }

    // Lock the product rows so concurrent checkouts serialize on stock.
    let products = Products::find()
        .filter(ProdCol::Id.is_in(product_ids))
        .lock(LockType::Update)
        .all(&txn)
        .await?;
    let products: HashMap<Uuid, _> = products.into_iter().map(|p| (p.id, p)).collect();

    let mut subtotal_cents = 0_i64;
    let mut line_prices: Vec<(Uuid, String, i32, i64)> = Vec::with_capacity(lines.len());
    for line in &lines {
        let product = products
            .get(&line.product_id)
            .ok_or_else(|| AppError::BadRequest("A cart product no longer exists".into()))?;
        if product.status.iter().any(|flag| flag == "unavailable") {
            return Err(AppError::BadRequest(format!(
                "{} is currently unavailable",
                product.name
            )));
        }
        if product.stock_quantity < line.quantity {
            return Err(AppError::BadRequest(format!(
                "Insufficient stock for {}",
                product.name
            )));
        }
        let unit_price =
            pricing::discounted_unit_price(product.price_cents, product.discount_percent);
        subtotal_cents += unit_price * i64::from(line.quantity);
        line_prices.push((product.id, product.name.clone(), line.quantity, unit_price));
    }

    let mut discount_cents = 0_i64;
    let mut promotion_id = None;
    if let Some(code) = promotion_code.as_deref().filter(|c| !c.trim().is_empty()) {
        let promo = promotion_service::redeem(&txn, code).await?;
        discount_cents = pricing::promo_discount(subtotal_cents, promo.discount_percent);
        promotion_id = Some(promo.id);
    }

    let shipping_cents = pricing::shipping_fee(
        subtotal_cents,
        state.config.shipping_fee_cents,
        state.config.free_shipping_min_cents,
    );
    let total_cents = pricing::order_total(subtotal_cents, discount_cents, shipping_cents);

    let order_id = Uuid::new_v4();
    let order = OrderActive {
        id: Set(order_id),
        order_code: Set(build_order_code(order_id)),
        user_id: Set(owner.user_id()),
        guest_name: Set(Some(recipient_name)),
        guest_email: Set(guest_email),
        guest_phone: Set(Some(phone)),
        shipping_address: Set(shipping_address),
        status: Set("pending".into()),
        subtotal_cents: Set(subtotal_cents),
        discount_cents: Set(discount_cents),
        shipping_cents: Set(shipping_cents),
        total_cents: Set(total_cents),
        payment_method: Set(payment_method),
        promotion_id: Set(promotion_id),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut details: Vec<OrderDetailResponse> = Vec::with_capacity(line_prices.len());
    for (product_id, product_name, quantity, unit_price) in &line_prices {
        let detail = DetailActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(*product_id),
            product_name: Set(product_name.clone()),
            quantity: Set(*quantity),
            price_cents: Set(*unit_price),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
        details.push(detail.into());

        Products::update_many()
            .col_expr(
                ProdCol::StockQuantity,
                Expr::col(ProdCol::StockQuantity).sub(*quantity),
            )
            .col_expr(
                ProdCol::SoldCount,
                Expr::col(ProdCol::SoldCount).add(*quantity),
            )
            .filter(ProdCol::Id.eq(*product_id))
            .exec(&txn)
            .await?;
    }

    CartItems::delete_many()
        .filter(cart_condition)
        .exec(&txn)
        .await?;

    txn.commit().await?;

    audit::record(
        &state.pool,
        owner.user_id(),
        "checkout",
        Some("orders"),
        Some(serde_json::json!({
            "order_id": order.id,
            "order_code": order.order_code,
            "total_cents": total_cents,
        })),
    )
    .await;

    spawn_order_placed_push(state, owner, &order.order_code);
    for product_id in nft_product_ids {
        let state = state.clone();
        let minted_by = owner.user_id();
        tokio::spawn(async move {
            if let Err(err) =
                nft_service::submit_checkout_mint(&state, order_id, product_id, minted_by).await
            {
                tracing::warn!(error = %err, product_id = %product_id, "checkout mint failed");
            }
        });
    }

    Ok(ApiResponse::success(
        "Order placed",
        OrderWithDetails {
            order: order.into(),
            details,
        },
        Some(Meta::empty()),
    ))
}

fn spawn_order_placed_push(state: &AppState, owner: &CartOwner, order_code: &str) {
    let order_code = order_code.to_string();
    match owner {
        CartOwner::User(user) => {
            let state = state.clone();
            let user_id = user.user_id;
            tokio::spawn(async move {
                if let Err(err) =
                    notification_service::notify_order_placed(&state, user_id, &order_code).await
                {
                    tracing::warn!(error = %err, "order notification failed");
                }
            });
        }
        // Guests get an ephemeral room push; there is no account row to
        // attach a persisted notification to.
        CartOwner::Guest(key) => {
            let hub = state.hub.clone();
            let room = realtime::guest_room(key);
            tokio::spawn(async move {
                hub.publish(
                    &room,
                    ServerEvent::new_notification(serde_json::json!({
                        "title": "Order placed",
                        "message": format!("Order {order_code} has been received"),
                        "kind": "order",
                    })),
                )
                .await;
            });
        }
    }
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let mut condition = Condition::all().add(OrderCol::UserId.eq(user.user_id));
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        if !is_valid_order_status(status) {
            return Err(AppError::BadRequest(format!("Unknown order status: {status}")));
        }
        condition = condition.add(OrderCol::Status.eq(status.clone()));
    }

    let finder = Orders::find()
        .filter(condition)
        .order_by_desc(OrderCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(OrderResponse::from)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Orders", OrderList { items }, Some(meta)))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithDetails>> {
    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::Id.eq(id))
                .add(OrderCol::UserId.eq(user.user_id)),
        )
        .one(&state.orm)
        .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let details = OrderDetails::find()
        .filter(DetailCol::OrderId.eq(order.id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(OrderDetailResponse::from)
        .collect();

    Ok(ApiResponse::success(
        "Order",
        OrderWithDetails {
            order: order.into(),
            details,
        },
        Some(Meta::empty()),
    ))
}

/// Public lookup by the human-readable code so guests can track an order
/// from the confirmation they were shown. Knowing the code is the only
/// credential.
pub async fn track_order(
    state: &AppState,
    order_code: &str,
) -> AppResult<ApiResponse<OrderWithDetails>> {
    let order = Orders::find()
        .filter(OrderCol::OrderCode.eq(order_code))
        .one(&state.orm)
        .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let details = OrderDetails::find()
        .filter(DetailCol::OrderId.eq(order.id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(OrderDetailResponse::from)
        .collect();

    Ok(ApiResponse::success(
        "Order",
        OrderWithDetails {
            order: order.into(),
            details,
        },
        Some(Meta::empty()),
    ))
}

/// Owner cancels a not-yet-processed order. Stock and sold counters roll
/// back; a redeemed promotion slot stays consumed.
pub async fn cancel_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderResponse>> {
    let txn = state.orm.begin().await?;

    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::Id.eq(id))
                .add(OrderCol::UserId.eq(user.user_id)),
        )
        .lock(LockType::Update)
        .one(&txn)
        .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    if order.status != "pending" {
        return Err(AppError::BadRequest(
            "Only pending orders can be cancelled".into(),
        ));
    }

    let details = OrderDetails::find()
        .filter(DetailCol::OrderId.eq(order.id))
        .all(&txn)
        .await?;
    for detail in &details {
        // A product deleted since purchase simply matches no row here.
        Products::update_many()
            .col_expr(
                ProdCol::StockQuantity,
                Expr::col(ProdCol::StockQuantity).add(detail.quantity),
            )
            .col_expr(
                ProdCol::SoldCount,
                Expr::col(ProdCol::SoldCount).sub(detail.quantity),
            )
            .filter(ProdCol::Id.eq(detail.product_id))
            .exec(&txn)
            .await?;
    }

    let mut active: OrderActive = order.into();
    active.status = Set("cancelled".into());
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;

    txn.commit().await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "order_cancel",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id })),
    )
    .await;

    let state2 = state.clone();
    let user_id = user.user_id;
    let order_code = order.order_code.clone();
    tokio::spawn(async move {
        if let Err(err) =
            notification_service::notify_order_status(&state2, user_id, &order_code, "cancelled")
                .await
        {
            tracing::warn!(error = %err, "cancel notification failed");
        }
    });

    Ok(ApiResponse::success(
        "Order cancelled",
        order.into(),
        Some(Meta::empty()),
    ))
}

fn required_field(value: &str, name: &str) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::BadRequest(format!("{name} is required")));
    }
    Ok(value.to_string())
}

fn build_order_code(order_id: Uuid) -> String {
    let date = Utc::now().format("%Y%m%d");
    let suffix = order_id.to_string();
    let short = &suffix[..8];
    format!("MS-{}-{}", date, short)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_code_shape() {
        let id = Uuid::new_v4();
        let code = build_order_code(id);
        assert!(code.starts_with("MS-"));
        let parts: Vec<&str> = code.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[1].len(), 8);
        assert_eq!(parts[2], &id.to_string()[..8]);
    }

    #[test]
    fn required_field_trims() {
        assert_eq!(required_field("  Amuro Ray ", "name").unwrap(), "Amuro Ray");
        assert!(required_field("   ", "name").is_err());
    }
}
