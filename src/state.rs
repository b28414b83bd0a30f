use std::sync::Arc;

use crate::auth::jwt::JwtKeys;
use crate::auth::password::prime_dummy_hash;
use crate::config::AppConfig;
use crate::users::repo::{PgUserStore, UserStore};

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub config: Arc<AppConfig>,
    pub keys: JwtKeys,
}

impl AppState {
    /// Connects to PostgreSQL and brings the schema up to date.
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let store = PgUserStore::connect(&config.database_url, config.database_max_connections).await?;
        store.migrate().await?;
        Ok(Self::from_parts(Arc::new(store), Arc::new(config)))
    }

    pub fn from_parts(users: Arc<dyn UserStore>, config: Arc<AppConfig>) -> Self {
        let keys = JwtKeys::from_config(&config.jwt);
        prime_dummy_hash();
        Self {
            users,
            config,
            keys,
        }
    }

    #[cfg(test)]
    pub(crate) fn fake() -> Self {
        use crate::config::JwtConfig;
        use crate::users::memory::MemoryUserStore;

        let config = Arc::new(AppConfig {
            database_url: "postgres://unused".into(),
            database_max_connections: 1,
            host: "127.0.0.1".into(),
            port: 0,
            jwt: JwtConfig {
                secret: "test-only-signing-secret".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_seconds: 300,
            },
        });
        Self::from_parts(Arc::new(MemoryUserStore::new()), config)
    }
}
