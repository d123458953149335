use std::sync::Arc;

use crate::config::{AppConfig, DatabaseConfig, DEFAULT_DATABASE_URL};
use crate::db;
use crate::users::{MemoryUserStore, PgUserStore, UserStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
}

impl AppState {
    /// Connects to Postgres, provisions the schema and wraps the pool in a
    /// `PgUserStore`.
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let pool = db::connect(&config.database).await?;
        db::migrate(&pool).await?;

        let users = Arc::new(PgUserStore::new(pool)) as Arc<dyn UserStore>;
        Ok(Self::from_parts(Arc::new(config), users))
    }

    pub fn from_parts(config: Arc<AppConfig>, users: Arc<dyn UserStore>) -> Self {
        Self { config, users }
    }

    /// State backed by an empty in-memory store.
    pub fn fake() -> Self {
        let config = Arc::new(AppConfig {
            database: DatabaseConfig {
                url: DEFAULT_DATABASE_URL.into(),
                max_connections: 1,
                create_if_missing: false,
            },
        });
        let users = Arc::new(MemoryUserStore::new()) as Arc<dyn UserStore>;
        Self::from_parts(config, users)
    }
}
