use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    /// Token lifetime in hours.
    pub jwt_ttl_hours: i64,
    /// Flat shipping fee applied to every order below the free-shipping bar.
    pub shipping_fee_cents: i64,
    /// Orders with a subtotal at or above this ship free. 0 disables the rule.
    pub free_shipping_min_cents: i64,
    /// HTTP endpoint of the backend mint signer. Unset disables the
    /// backend-signed mint path.
    pub mint_signer_url: Option<String>,
    /// Contract address reported in mint bookkeeping for backend mints.
    pub mint_contract_address: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let jwt_secret = env::var("JWT_SECRET")?;
        let jwt_ttl_hours = env::var("JWT_TTL_HOURS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(24);
        let shipping_fee_cents = env::var("SHIPPING_FEE_CENTS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(500);
        let free_shipping_min_cents = env::var("FREE_SHIPPING_MIN_CENTS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(5000);
        let mint_signer_url = env::var("MINT_SIGNER_URL").ok().filter(|v| !v.is_empty());
        let mint_contract_address = env::var("MINT_CONTRACT_ADDRESS")
            .ok()
            .filter(|v| !v.is_empty());
        Ok(Self {
            database_url,
            host,
            port,
            jwt_secret,
            jwt_ttl_hours,
            shipping_fee_cents,
            free_shipping_min_cents,
            mint_signer_url,
            mint_contract_address,
        })
    }
}
