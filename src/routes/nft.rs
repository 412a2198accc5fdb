//! Mint bookkeeping. Two paths: clients that minted with their own wallet
//! POST the receipt back, and the backend signer mints on request for
//! privileged roles.

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, post},
};

use crate::{
    dto::nft::{BackendMintRequest, MintList, RecordMintRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    models::NftMint,
    response::ApiResponse,
    routes::params::Pagination,
    services::nft_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/mints", get(list_mints).post(record_mint))
        .route("/mint", post(backend_mint))
}

#[utoipa::path(
    get,
    path = "/api/nft/mints",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
    ),
    responses(
        (status = 200, description = "Own mint records; admins see all", body = ApiResponse<MintList>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer_auth" = [])),
    tag = "NFT"
)]
pub async fn list_mints(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<MintList>>> {
    let resp = nft_service::list_mints(&state.pool, &user, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/nft/mints",
    request_body = RecordMintRequest,
    responses(
        (status = 200, description = "Client-signed mint recorded", body = ApiResponse<NftMint>),
        (status = 400, description = "Malformed hash or address"),
        (status = 403, description = "Order belongs to someone else"),
    ),
    security(("bearer_auth" = [])),
    tag = "NFT"
)]
pub async fn record_mint(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<RecordMintRequest>,
) -> AppResult<Json<ApiResponse<NftMint>>> {
    let resp = nft_service::record_client_mint(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/nft/mint",
    request_body = BackendMintRequest,
    responses(
        (status = 200, description = "Backend signer minted and recorded", body = ApiResponse<NftMint>),
        (status = 403, description = "Admin or customizer only"),
        (status = 500, description = "Signer unreachable or not configured"),
    ),
    security(("bearer_auth" = [])),
    tag = "NFT"
)]
pub async fn backend_mint(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<BackendMintRequest>,
) -> AppResult<Json<ApiResponse<NftMint>>> {
    let resp = nft_service::backend_mint(&state, &user, payload).await?;
    Ok(Json(resp))
}
