use anyhow::Context;

use crate::config::{AppConfig, StorageBackend};
use crate::store::{MemoryStore, PgStore, Store};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let store = match (config.storage, config.database_url.as_deref()) {
            (StorageBackend::Postgres, Some(url)) => {
                let pg = PgStore::connect(url, config.db_max_connections).await?;

                sqlx::migrate!("./migrations")
                    .run(pg.pool())
                    .await
                    .context("run migrations")?;
                Arc::new(pg) as Arc<dyn Store>
            }
            (StorageBackend::Postgres, None) => anyhow::bail!("DATABASE_URL must be set"),
            (StorageBackend::Memory, _) => {
                tracing::warn!("using in-memory storage; data is lost on exit");
                Arc::new(MemoryStore::new()) as Arc<dyn Store>
            }
        };

        Ok(Self::from_parts(store, config))
    }

    pub fn from_parts(store: Arc<dyn Store>, config: Arc<AppConfig>) -> Self {
        Self { store, config }
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        let config = Arc::new(AppConfig {
            storage: StorageBackend::Memory,
            database_url: None,
            db_max_connections: 1,
            otp_ttl_minutes: 10,
            app_host: "127.0.0.1".into(),
            app_port: 0,
        });
        Self::from_parts(Arc::new(MemoryStore::new()), config)
    }
}
