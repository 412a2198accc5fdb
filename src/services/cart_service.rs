use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit,
    db::DbPool,
    dto::cart::{AddToCartRequest, CartLine, CartList, SetQuantityRequest},
    error::{AppError, AppResult},
    middleware::auth::CartOwner,
    models::CartItem,
    pricing,
    response::{ApiResponse, Meta},
};

#[derive(FromRow)]
struct CartProductRow {
    cart_id: Uuid,
    quantity: i32,
    product_id: Uuid,
    name: String,
    price_cents: i64,
    discount_percent: i32,
    stock_quantity: i32,
}

#[derive(FromRow)]
struct ProductCheckRow {
    status: Vec<String>,
}

/// All lines for the calling identity with discounted line totals and the
/// cart subtotal. Carts stay small, so no pagination.
pub async fn list_cart(pool: &DbPool, owner: &CartOwner) -> AppResult<ApiResponse<CartList>> {
    let rows = sqlx::query_as::<_, CartProductRow>(
        r#"
        SELECT ci.id AS cart_id, ci.quantity,
               p.id AS product_id, p.name, p.price_cents, p.discount_percent, p.stock_quantity
        FROM cart_items ci
        JOIN products p ON p.id = ci.product_id
        WHERE ci.user_id = $1 OR ci.session_key = $2
        ORDER BY ci.created_at DESC
        "#,
    )
    .bind(owner.user_id())
    .bind(owner.session_key())
    .fetch_all(pool)
    .await?;

    let mut subtotal_cents = 0_i64;
    let items: Vec<CartLine> = rows
        .into_iter()
        .map(|row| {
            let unit_price_cents =
                pricing::discounted_unit_price(row.price_cents, row.discount_percent);
            let line_total_cents = unit_price_cents * i64::from(row.quantity);
            subtotal_cents += line_total_cents;
            CartLine {
                id: row.cart_id,
                product_id: row.product_id,
                name: row.name,
                price_cents: row.price_cents,
                discount_percent: row.discount_percent,
                unit_price_cents,
                quantity: row.quantity,
                line_total_cents,
                stock_quantity: row.stock_quantity,
            }
        })
        .collect();

    Ok(ApiResponse::success(
        "Cart",
        CartList {
            items,
            subtotal_cents,
        },
        None,
    ))
}

/// Add semantics: an existing line for the product grows by `quantity`,
/// otherwise a new line is inserted.
pub async fn add_to_cart(
    pool: &DbPool,
    owner: &CartOwner,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartItem>> {
    if payload.quantity <= 0 {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }

    let product: Option<ProductCheckRow> =
        sqlx::query_as("SELECT status FROM products WHERE id = $1")
            .bind(payload.product_id)
            .fetch_optional(pool)
            .await?;
    let product = match product {
        Some(p) => p,
        None => return Err(AppError::BadRequest("product not found".to_string())),
    };
    if product.status.iter().any(|flag| flag == "unavailable") {
        return Err(AppError::BadRequest("product is unavailable".to_string()));
    }

    let exist: Option<CartItem> = sqlx::query_as(
        "SELECT * FROM cart_items WHERE (user_id = $1 OR session_key = $2) AND product_id = $3",
    )
    .bind(owner.user_id())
    .bind(owner.session_key())
    .bind(payload.product_id)
    .fetch_optional(pool)
    .await?;

    let cart_item = if let Some(item) = exist {
        sqlx::query_as::<_, CartItem>(
            "UPDATE cart_items SET quantity = quantity + $2 WHERE id = $1 RETURNING *",
        )
        .bind(item.id)
        .bind(payload.quantity)
        .fetch_one(pool)
        .await?
    } else {
        sqlx::query_as(
            r#"
            INSERT INTO cart_items (id, user_id, session_key, product_id, quantity)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(owner.user_id())
        .bind(owner.session_key())
        .bind(payload.product_id)
        .bind(payload.quantity)
        .fetch_one(pool)
        .await?
    };

    audit::record(
        pool,
        owner.user_id(),
        "cart_add",
        Some("cart_items"),
        Some(serde_json::json!({
            "product_id": payload.product_id,
            "quantity": payload.quantity,
        })),
    )
    .await;

    Ok(ApiResponse::success("OK", cart_item, None))
}

pub async fn set_quantity(
    pool: &DbPool,
    owner: &CartOwner,
    product_id: Uuid,
    payload: SetQuantityRequest,
) -> AppResult<ApiResponse<CartItem>> {
    if payload.quantity <= 0 {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }

    let updated: Option<CartItem> = sqlx::query_as(
        r#"
        UPDATE cart_items
        SET quantity = $3
        WHERE (user_id = $1 OR session_key = $2) AND product_id = $4
        RETURNING *
        "#,
    )
    .bind(owner.user_id())
    .bind(owner.session_key())
    .bind(payload.quantity)
    .bind(product_id)
    .fetch_optional(pool)
    .await?;

    match updated {
        Some(item) => Ok(ApiResponse::success("OK", item, None)),
        None => Err(AppError::NotFound),
    }
}

pub async fn remove_from_cart(
    pool: &DbPool,
    owner: &CartOwner,
    product_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = sqlx::query(
        "DELETE FROM cart_items WHERE (user_id = $1 OR session_key = $2) AND product_id = $3",
    )
    .bind(owner.user_id())
    .bind(owner.session_key())
    .bind(product_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    Ok(ApiResponse::success(
        "Removed from cart",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn clear_cart(
    pool: &DbPool,
    owner: &CartOwner,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1 OR session_key = $2")
        .bind(owner.user_id())
        .bind(owner.session_key())
        .execute(pool)
        .await?;

    Ok(ApiResponse::success(
        "Cart cleared",
        serde_json::json!({ "removed": result.rows_affected() }),
        Some(Meta::empty()),
    ))
}

/// Fold a guest cart into a user cart: quantities are summed per product,
/// never overwritten, and the guest rows are gone afterward. Runs in one
/// transaction so a failure leaves both carts untouched.
pub async fn merge_guest_cart(pool: &DbPool, session_key: &str, user_id: Uuid) -> AppResult<u64> {
    let mut txn = pool.begin().await?;

    let merged = sqlx::query(
        r#"
        UPDATE cart_items u
        SET quantity = u.quantity + g.quantity
        FROM cart_items g
        WHERE u.user_id = $1
          AND g.session_key = $2
          AND g.product_id = u.product_id
        "#,
    )
    .bind(user_id)
    .bind(session_key)
    .execute(&mut *txn)
    .await?;

    let moved = sqlx::query(
        r#"
        INSERT INTO cart_items (id, user_id, product_id, quantity)
        SELECT gen_random_uuid(), $1, g.product_id, g.quantity
        FROM cart_items g
        WHERE g.session_key = $2
          AND NOT EXISTS (
              SELECT 1 FROM cart_items u
              WHERE u.user_id = $1 AND u.product_id = g.product_id
          )
        "#,
    )
    .bind(user_id)
    .bind(session_key)
    .execute(&mut *txn)
    .await?;

    sqlx::query("DELETE FROM cart_items WHERE session_key = $1")
        .bind(session_key)
        .execute(&mut *txn)
        .await?;

    txn.commit().await?;

    let total = merged.rows_affected() + moved.rows_affected();
    if total > 0 {
        tracing::debug!(user_id = %user_id, lines = total, "merged guest cart");
    }

    audit::record(
        pool,
        Some(user_id),
        "cart_merge",
        Some("cart_items"),
        Some(serde_json::json!({ "lines": total })),
    )
    .await;

    Ok(total)
}
