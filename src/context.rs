/// Application context and dependency injection
use crate::{
    account::AccountManager,
    config::ServerConfig,
    db,
    error::PanelResult,
    licensing::LicenseManager,
    rate_limit::{RateLimitConfig, RateLimiter},
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub account_manager: Arc<AccountManager>,
    pub license_manager: Arc<LicenseManager>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> PanelResult<Self> {
        config.validate()?;

        Self::ensure_directories(&config).await?;

        let pool = db::create_pool(&config.storage.database, db::DatabaseOptions::default()).await?;
        db::run_migrations(&pool).await?;
        db::test_connection(&pool).await?;

        let ctx = Self::for_pool(config, pool);

        if let Some(admin) = &ctx.config.authentication.bootstrap_admin {
            ctx.account_manager
                .ensure_admin(&admin.username, &admin.password)
                .await?;
        }

        tracing::info!("Application context initialized");

        Ok(ctx)
    }

    /// Wire managers over an already migrated pool
    pub fn for_pool(config: ServerConfig, pool: SqlitePool) -> Self {
        let config = Arc::new(config);

        let account_manager = Arc::new(AccountManager::new(pool.clone(), config.clone()));
        let license_manager = Arc::new(LicenseManager::new(pool.clone()));
        let rate_limiter = Arc::new(RateLimiter::new(RateLimitConfig::from(&config.rate_limit)));

        Self {
            config,
            db: pool,
            account_manager,
            license_manager,
            rate_limiter,
        }
    }

    /// Ensure the data directory and the database's parent exist
    async fn ensure_directories(config: &ServerConfig) -> PanelResult<()> {
        tokio::fs::create_dir_all(&config.storage.data_directory).await?;

        if let Some(parent) = config.storage.database.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        Ok(())
    }
}
