use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::NftMint;

/// Receipt of a mint the client signed and submitted itself.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RecordMintRequest {
    pub token_id: i64,
    pub tx_hash: String,
    pub mint_address: String,
    pub order_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
}

/// Mint executed by the backend signer on the caller's behalf.
#[derive(Debug, Deserialize, ToSchema)]
pub struct BackendMintRequest {
    pub product_id: Uuid,
    pub order_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MintList {
    pub items: Vec<NftMint>,
}
