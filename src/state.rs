use std::sync::Arc;

use crate::{
    config::AppConfig,
    db::{DbPool, OrmConn, create_orm_conn, create_pool},
    mint::MintSubmitter,
    realtime::NotificationHub,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub hub: Arc<NotificationHub>,
    pub minter: Arc<MintSubmitter>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let pool = create_pool(&config.database_url).await?;
        let orm = create_orm_conn(&config.database_url).await?;
        let minter = Arc::new(MintSubmitter::from_config(&config));
        Ok(Self {
            pool,
            orm,
            hub: Arc::new(NotificationHub::default()),
            minter,
            config: Arc::new(config),
        })
    }
}
