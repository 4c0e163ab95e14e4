use crate::config::{AppConfig, StoreBackend};
use crate::users::memory::MemoryUserStore;
use crate::users::repo::{PgUserStore, UserStore};
use crate::users::services::UserService;
use anyhow::Context;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub users: UserService,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let store = match (config.backend, &config.database) {
            (StoreBackend::Postgres, Some(db_cfg)) => {
                let db = sqlx::postgres::PgPoolOptions::new()
                    .max_connections(db_cfg.max_connections)
                    .connect(&db_cfg.url)
                    .await
                    .context("connect to database")?;

                sqlx::migrate!("./migrations")
                    .run(&db)
                    .await
                    .context("run migrations")?;

                Arc::new(PgUserStore::new(db)) as Arc<dyn UserStore>
            }
            (StoreBackend::Postgres, None) => anyhow::bail!("postgres backend needs DATABASE_URL"),
            (StoreBackend::Memory, _) => {
                tracing::warn!("using in-memory user store; data is lost on restart");
                Arc::new(MemoryUserStore::new()) as Arc<dyn UserStore>
            }
        };

        Ok(Self::from_parts(store, config))
    }

    pub fn from_parts(store: Arc<dyn UserStore>, config: Arc<AppConfig>) -> Self {
        Self {
            users: UserService::new(store),
            config,
        }
    }

    pub fn fake() -> Self {
        let config = Arc::new(AppConfig {
            backend: StoreBackend::Memory,
            database: None,
            host: "127.0.0.1".into(),
            port: 0,
        });
        Self::from_parts(Arc::new(MemoryUserStore::new()), config)
    }
}
