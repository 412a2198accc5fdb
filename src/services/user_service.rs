use crate::{
    audit,
    db::DbPool,
    dto::users::{UpdateProfileRequest, UserProfile},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    mint::is_valid_address,
    models::User,
    response::{ApiResponse, Meta},
    services::auth_service::{hash_password, verify_password},
};

pub async fn get_me(pool: &DbPool, auth: &AuthUser) -> AppResult<ApiResponse<UserProfile>> {
    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(auth.user_id)
        .fetch_optional(pool)
        .await?;

    match user {
        Some(u) => Ok(ApiResponse::success("Profile", u.into(), None)),
        None => Err(AppError::NotFound),
    }
}

pub async fn update_me(
    pool: &DbPool,
    auth: &AuthUser,
    payload: UpdateProfileRequest,
) -> AppResult<ApiResponse<UserProfile>> {
    let existing: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(auth.user_id)
        .fetch_optional(pool)
        .await?;
    let existing = match existing {
        Some(u) => u,
        None => return Err(AppError::NotFound),
    };

    let full_name = match payload.full_name {
        Some(name) => {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(AppError::BadRequest("Full name cannot be empty".into()));
            }
            name
        }
        None => existing.full_name,
    };

    let wallet_address = match payload.wallet_address {
        Some(addr) => {
            if !is_valid_address(&addr) {
                return Err(AppError::BadRequest(
                    "wallet_address must be a 0x-prefixed hex address".into(),
                ));
            }
            Some(addr)
        }
        None => existing.wallet_address,
    };

    let password_hash = match (payload.old_password, payload.new_password) {
        (Some(old), Some(new)) => {
            if !verify_password(&existing.password_hash, &old)? {
                return Err(AppError::BadRequest("Old password is incorrect".into()));
            }
            if new.len() < 8 {
                return Err(AppError::BadRequest(
                    "Password must be at least 8 characters".into(),
                ));
            }
            hash_password(&new)?
        }
        (None, None) => existing.password_hash,
        _ => {
            return Err(AppError::BadRequest(
                "Both old_password and new_password are required to change the password".into(),
            ));
        }
    };

    let user: User = sqlx::query_as(
        r#"
        UPDATE users
        SET full_name = $2, wallet_address = $3, password_hash = $4, updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(auth.user_id)
    .bind(full_name)
    .bind(wallet_address)
    .bind(password_hash)
    .fetch_one(pool)
    .await?;

    audit::record(
        pool,
        Some(auth.user_id),
        "profile_update",
        Some("users"),
        Some(serde_json::json!({ "user_id": auth.user_id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Profile updated",
        user.into(),
        Some(Meta::empty()),
    ))
}
