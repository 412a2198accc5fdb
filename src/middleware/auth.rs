use axum::{extract::FromRequestParts, http::header};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dto::auth::Claims,
    error::AppError,
    realtime::{guest_room, user_room},
    state::AppState,
};

/// Header carrying the client-generated opaque key that identifies a guest
/// cart/session.
pub const SESSION_KEY_HEADER: &str = "x-session-key";

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: String,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

pub fn ensure_role(user: &AuthUser, role: &str) -> Result<(), AppError> {
    if user.role != role {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

pub fn ensure_admin(user: &AuthUser) -> Result<(), AppError> {
    ensure_role(user, "admin")
}

pub fn ensure_any_role(user: &AuthUser, roles: &[&str]) -> Result<(), AppError> {
    if !roles.contains(&user.role.as_str()) {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

pub fn issue_token(config: &AppConfig, user_id: Uuid, role: &str) -> Result<String, AppError> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(config.jwt_ttl_hours))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("failed to compute expiration")))?;

    let claims = Claims {
        sub: user_id.to_string(),
        role: role.to_string(),
        exp: expiration.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

pub fn decode_token(config: &AppConfig, token: &str) -> Result<AuthUser, AppError> {
    let decoded = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::Unauthorized)?;

    let user_id = Uuid::parse_str(&decoded.claims.sub).map_err(|_| AppError::Unauthorized)?;

    Ok(AuthUser {
        user_id,
        role: decoded.claims.role,
    })
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or(AppError::Unauthorized)?;

        let auth_str = auth_header.to_str().map_err(|_| AppError::Unauthorized)?;
        let token = auth_str
            .strip_prefix("Bearer ")
            .ok_or(AppError::Unauthorized)?
            .trim();

        decode_token(&state.config, token)
    }
}

/// Identity that owns a cart: a logged-in user (bearer token) or a guest
/// session (`x-session-key` header). A present-but-invalid token is an
/// error, never a silent fallback to guest.
#[derive(Debug, Clone)]
pub enum CartOwner {
    User(AuthUser),
    Guest(String),
}

impl CartOwner {
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            CartOwner::User(user) => Some(user.user_id),
            CartOwner::Guest(_) => None,
        }
    }

    pub fn session_key(&self) -> Option<&str> {
        match self {
            CartOwner::User(_) => None,
            CartOwner::Guest(key) => Some(key.as_str()),
        }
    }

    /// Notification room this identity listens on.
    pub fn room(&self) -> String {
        match self {
            CartOwner::User(user) => user_room(user.user_id),
            CartOwner::Guest(key) => guest_room(key),
        }
    }
}

pub fn valid_session_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= 128
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

impl FromRequestParts<AppState> for CartOwner {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if parts.headers.contains_key(header::AUTHORIZATION) {
            let user = AuthUser::from_request_parts(parts, state).await?;
            return Ok(CartOwner::User(user));
        }

        let key = parts
            .headers
            .get(SESSION_KEY_HEADER)
            .ok_or(AppError::Unauthorized)?
            .to_str()
            .map_err(|_| AppError::BadRequest("invalid session key".into()))?;

        if !valid_session_key(key) {
            return Err(AppError::BadRequest("invalid session key".into()));
        }

        Ok(CartOwner::Guest(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AppConfig {
        AppConfig {
            database_url: "postgres://unused".into(),
            host: "127.0.0.1".into(),
            port: 0,
            jwt_secret: "test-secret".into(),
            jwt_ttl_hours: 1,
            shipping_fee_cents: 500,
            free_shipping_min_cents: 5000,
            mint_signer_url: None,
            mint_contract_address: None,
        }
    }

    #[test]
    fn token_roundtrip_preserves_identity() {
        let config = test_config();
        let user_id = Uuid::new_v4();
        let token = issue_token(&config, user_id, "support").expect("issue");
        let user = decode_token(&config, &token).expect("decode");
        assert_eq!(user.user_id, user_id);
        assert_eq!(user.role, "support");
    }

    #[test]
    fn tampered_token_is_rejected() {
        let config = test_config();
        let token = issue_token(&config, Uuid::new_v4(), "user").expect("issue");
        let mut other = test_config();
        other.jwt_secret = "different-secret".into();
        assert!(decode_token(&other, &token).is_err());
    }

    #[test]
    fn role_guards() {
        let admin = AuthUser {
            user_id: Uuid::new_v4(),
            role: "admin".into(),
        };
        let user = AuthUser {
            user_id: Uuid::new_v4(),
            role: "user".into(),
        };
        assert!(ensure_admin(&admin).is_ok());
        assert!(ensure_admin(&user).is_err());
        assert!(ensure_any_role(&user, &["admin", "user"]).is_ok());
        assert!(ensure_any_role(&user, &["admin", "support"]).is_err());
    }

    #[test]
    fn session_key_charset() {
        assert!(valid_session_key("guest-42_abc"));
        assert!(!valid_session_key(""));
        assert!(!valid_session_key("has space"));
        assert!(!valid_session_key(&"x".repeat(129)));
    }
}
