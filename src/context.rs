/// Application context and dependency injection
use crate::{
    account::AccountManager,
    config::{MediaConfig, ServerConfig},
    db::{self, user::UserRepository},
    error::{ApiError, ApiResult},
    media::{
        cloudinary::{CloudinaryConfig, CloudinaryMediaHost},
        disk::DiskMediaHost,
        MediaHost, UploadOrchestrator,
    },
    token::TokenService,
};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub tokens: Arc<TokenService>,
    pub accounts: Arc<AccountManager>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> ApiResult<Self> {
        // Validate configuration
        config.validate()?;

        // Create data directories if they don't exist
        Self::ensure_directories(&config).await?;

        // Initialize account database
        let db = db::create_pool(&config.storage.account_db, db::DatabaseOptions::default()).await?;
        db::run_migrations(&db).await?;
        db::test_connection(&db).await?;

        let media = Self::media_host(&config.media)?;

        Ok(Self::assemble(config, db, media))
    }

    fn assemble(config: ServerConfig, db: SqlitePool, media: Arc<dyn MediaHost>) -> Self {
        let users = UserRepository::new(db.clone());
        let tokens = Arc::new(TokenService::new(
            users.clone(),
            config.authentication.clone(),
        ));
        let uploads = UploadOrchestrator::new(media);
        let accounts = Arc::new(AccountManager::new(users, tokens.clone(), uploads));

        Self {
            config: Arc::new(config),
            db,
            tokens,
            accounts,
        }
    }

    /// Build the configured media host
    fn media_host(config: &MediaConfig) -> ApiResult<Arc<dyn MediaHost>> {
        match config {
            MediaConfig::Cloudinary {
                cloud_name,
                api_key,
                api_secret,
                api_base_url,
                timeout_secs,
            } => {
                tracing::info!(cloud_name = %cloud_name, "using Cloudinary media host");
                let host = CloudinaryMediaHost::new(CloudinaryConfig {
                    cloud_name: cloud_name.clone(),
                    api_key: api_key.clone(),
                    api_secret: api_secret.clone(),
                    api_base_url: api_base_url.clone(),
                    timeout: Duration::from_secs(*timeout_secs),
                })?;
                Ok(Arc::new(host))
            }
            MediaConfig::Disk {
                location,
                public_url,
            } => {
                tracing::info!(location = %location.display(), "using disk media host");
                Ok(Arc::new(DiskMediaHost::new(location.clone(), public_url.clone())))
            }
        }
    }

    /// Ensure required directories exist
    async fn ensure_directories(config: &ServerConfig) -> ApiResult<()> {
        let mut dirs = vec![
            &config.storage.data_directory,
            &config.storage.staging_directory,
        ];
        if let MediaConfig::Disk { location, .. } = &config.media {
            dirs.push(location);
        }

        for dir in dirs {
            if !dir.exists() {
                tokio::fs::create_dir_all(dir).await.map_err(|e| {
                    ApiError::Internal(format!("Failed to create directory {:?}: {}", dir, e))
                })?;
            }
        }

        Ok(())
    }

    /// Whether auth cookies carry the `Secure` attribute
    pub fn secure_cookies(&self) -> bool {
        self.config.service.is_production()
    }

    /// Get service URL
    pub fn service_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.config.service.hostname, self.config.service.port
        )
    }

    /// Context over an in-memory database and the given media host
    #[cfg(test)]
    pub async fn for_tests(config: ServerConfig, media: Arc<dyn MediaHost>) -> Self {
        Self::assemble(config, db::test_pool().await, media)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_new_creates_directories_and_database() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig::for_tests(dir.path());

        let ctx = AppContext::new(config).await.unwrap();
        assert!(dir.path().join("staging").is_dir());
        assert!(dir.path().join("media").is_dir());
        assert!(dir.path().join("accounts.sqlite").exists());
        assert!(!ctx.secure_cookies());
        assert_eq!(ctx.service_url(), "http://localhost:8000");
    }

    #[tokio::test]
    async fn test_new_rejects_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ServerConfig::for_tests(dir.path());
        config.authentication.refresh_token_secret =
            config.authentication.access_token_secret.clone();

        assert!(matches!(
            AppContext::new(config).await,
            Err(ApiError::InvalidInput(_))
        ));
    }
}
