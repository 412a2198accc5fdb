use uuid::Uuid;

use crate::{
    audit,
    db::DbPool,
    dto::nft::{BackendMintRequest, MintList, RecordMintRequest},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_any_role},
    mint::{is_valid_address, is_valid_tx_hash},
    models::NftMint,
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

/// Single write path for the mint log. Every mint, client-signed or
/// backend-signed, lands here.
pub async fn record_mint(
    pool: &DbPool,
    order_id: Option<Uuid>,
    product_id: Option<Uuid>,
    token_id: i64,
    tx_hash: &str,
    mint_address: &str,
    minted_by: Option<Uuid>,
) -> AppResult<NftMint> {
    let mint: NftMint = sqlx::query_as(
        r#"
        INSERT INTO nft_mints (id, order_id, product_id, token_id, tx_hash, mint_address, minted_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(order_id)
    .bind(product_id)
    .bind(token_id)
    .bind(tx_hash)
    .bind(mint_address)
    .bind(minted_by)
    .fetch_one(pool)
    .await?;

    Ok(mint)
}

/// Client-signed path: the wallet already minted on-chain, we only keep
/// the receipt.
pub async fn record_client_mint(
    state: &AppState,
    user: &AuthUser,
    payload: RecordMintRequest,
) -> AppResult<ApiResponse<NftMint>> {
    if !is_valid_tx_hash(&payload.tx_hash) {
        return Err(AppError::BadRequest(
            "tx_hash must be a 0x-prefixed 64-digit hex string".into(),
        ));
    }
    if !is_valid_address(&payload.mint_address) {
        return Err(AppError::BadRequest(
            "mint_address must be a 0x-prefixed hex address".into(),
        ));
    }

    if let Some(order_id) = payload.order_id {
        let owner: Option<(Option<Uuid>,)> =
            sqlx::query_as("SELECT user_id FROM orders WHERE id = $1")
                .bind(order_id)
                .fetch_optional(&state.pool)
                .await?;
        match owner {
            Some((Some(uid),)) if uid == user.user_id => {}
            Some(_) => return Err(AppError::Forbidden),
            None => return Err(AppError::BadRequest("Order does not exist".into())),
        }
    }

    if let Some(product_id) = payload.product_id {
        let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM products WHERE id = $1")
            .bind(product_id)
            .fetch_optional(&state.pool)
            .await?;
        if exists.is_none() {
            return Err(AppError::BadRequest("Product does not exist".into()));
        }
    }

    let mint = record_mint(
        &state.pool,
        payload.order_id,
        payload.product_id,
        payload.token_id,
        &payload.tx_hash,
        &payload.mint_address,
        Some(user.user_id),
    )
    .await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "nft_mint_recorded",
        Some("nft_mints"),
        Some(serde_json::json!({ "mint_id": mint.id, "tx_hash": mint.tx_hash })),
    )
    .await;

    Ok(ApiResponse::success(
        "Mint recorded",
        mint,
        Some(Meta::empty()),
    ))
}

/// Backend-signed path: submit through the configured signer and record
/// the receipt it returns.
pub async fn backend_mint(
    state: &AppState,
    user: &AuthUser,
    payload: BackendMintRequest,
) -> AppResult<ApiResponse<NftMint>> {
    ensure_any_role(user, &["admin", "customizer"])?;

    let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM products WHERE id = $1")
        .bind(payload.product_id)
        .fetch_optional(&state.pool)
        .await?;
    if exists.is_none() {
        return Err(AppError::BadRequest("Product does not exist".into()));
    }

    if let Some(order_id) = payload.order_id {
        let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM orders WHERE id = $1")
            .bind(order_id)
            .fetch_optional(&state.pool)
            .await?;
        if exists.is_none() {
            return Err(AppError::BadRequest("Order does not exist".into()));
        }
    }

    let receipt = state
        .minter
        .submit(payload.product_id, payload.order_id)
        .await
        .map_err(AppError::Internal)?;

    let mint = record_mint(
        &state.pool,
        payload.order_id,
        Some(payload.product_id),
        receipt.token_id,
        &receipt.tx_hash,
        &receipt.mint_address,
        Some(user.user_id),
    )
    .await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "nft_mint_submitted",
        Some("nft_mints"),
        Some(serde_json::json!({ "mint_id": mint.id, "product_id": payload.product_id })),
    )
    .await;

    Ok(ApiResponse::success("Minted", mint, Some(Meta::empty())))
}

/// Post-checkout mint for a line the buyer flagged. Runs detached from the
/// request; failures are logged by the caller and never retried.
pub async fn submit_checkout_mint(
    state: &AppState,
    order_id: Uuid,
    product_id: Uuid,
    minted_by: Option<Uuid>,
) -> AppResult<()> {
    if !state.minter.is_configured() {
        tracing::warn!(
            order_id = %order_id,
            product_id = %product_id,
            "mint signer not configured; dropping checkout mint request"
        );
        return Ok(());
    }

    let receipt = state
        .minter
        .submit(product_id, Some(order_id))
        .await
        .map_err(AppError::Internal)?;

    record_mint(
        &state.pool,
        Some(order_id),
        Some(product_id),
        receipt.token_id,
        &receipt.tx_hash,
        &receipt.mint_address,
        minted_by,
    )
    .await?;

    Ok(())
}

pub async fn list_mints(
    pool: &DbPool,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<MintList>> {
    let (page, limit, offset) = pagination.normalize();

    let (items, total): (Vec<NftMint>, (i64,)) = if user.is_admin() {
        let items = sqlx::query_as(
            "SELECT * FROM nft_mints ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;
        let total = sqlx::query_as("SELECT COUNT(*) FROM nft_mints")
            .fetch_one(pool)
            .await?;
        (items, total)
    } else {
        let items = sqlx::query_as(
            "SELECT * FROM nft_mints WHERE minted_by = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(user.user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;
        let total = sqlx::query_as("SELECT COUNT(*) FROM nft_mints WHERE minted_by = $1")
            .bind(user.user_id)
            .fetch_one(pool)
            .await?;
        (items, total)
    };

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success("Mints", MintList { items }, Some(meta)))
}
