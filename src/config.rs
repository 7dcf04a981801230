/// Configuration management for the account service
use crate::error::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub authentication: AuthConfig,
    pub media: MediaConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    /// Deployment environment name ("production", "development", ...)
    pub environment: String,
    /// Allowed CORS origin; `None` allows any origin without credentials
    pub cors_origin: Option<String>,
    pub upload_limit: usize,
}

impl ServiceConfig {
    /// Cookies are marked `Secure` only in production deployments
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub account_db: PathBuf,
    /// Where multipart file parts are staged before upload
    pub staging_directory: PathBuf,
}

/// Token signing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub access_token_secret: String,
    pub access_token_ttl_secs: i64,
    pub refresh_token_secret: String,
    pub refresh_token_ttl_secs: i64,
}

/// Media host configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MediaConfig {
    Cloudinary {
        cloud_name: String,
        api_key: String,
        api_secret: String,
        api_base_url: String,
        timeout_secs: u64,
    },
    Disk {
        location: PathBuf,
        public_url: String,
    },
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directives
    pub level: String,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> ApiResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("PORT")
            .unwrap_or_else(|_| "8000".to_string())
            .parse()
            .map_err(|_| ApiError::InvalidInput("Invalid port number".to_string()))?;
        let environment = env::var("APP_ENV")
            .or_else(|_| env::var("NODE_ENV"))
            .unwrap_or_else(|_| "development".to_string());
        let cors_origin = env::var("CORS_ORIGIN").ok().filter(|s| !s.is_empty());
        let upload_limit = env::var("UPLOAD_LIMIT_BYTES")
            .unwrap_or_else(|_| "10485760".to_string())
            .parse()
            .unwrap_or(10485760);

        let data_directory: PathBuf = env::var("DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let account_db = env::var("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("accounts.sqlite"));
        let staging_directory = env::var("STAGING_DIRECTORY")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./public/temp"));

        let access_token_secret = env::var("ACCESS_TOKEN_SECRET")
            .map_err(|_| ApiError::InvalidInput("ACCESS_TOKEN_SECRET required".to_string()))?;
        let access_token_ttl_secs = env::var("ACCESS_TOKEN_EXPIRY_SECS")
            .unwrap_or_else(|_| "86400".to_string())
            .parse()
            .unwrap_or(86400);
        let refresh_token_secret = env::var("REFRESH_TOKEN_SECRET")
            .map_err(|_| ApiError::InvalidInput("REFRESH_TOKEN_SECRET required".to_string()))?;
        let refresh_token_ttl_secs = env::var("REFRESH_TOKEN_EXPIRY_SECS")
            .unwrap_or_else(|_| "864000".to_string())
            .parse()
            .unwrap_or(864000);

        let media = if let Ok(cloud_name) = env::var("CLOUDINARY_CLOUD_NAME") {
            MediaConfig::Cloudinary {
                cloud_name,
                api_key: env::var("CLOUDINARY_API_KEY").map_err(|_| {
                    ApiError::InvalidInput("CLOUDINARY_API_KEY required".to_string())
                })?,
                api_secret: env::var("CLOUDINARY_API_SECRET").map_err(|_| {
                    ApiError::InvalidInput("CLOUDINARY_API_SECRET required".to_string())
                })?,
                api_base_url: env::var("CLOUDINARY_API_BASE_URL")
                    .unwrap_or_else(|_| "https://api.cloudinary.com/v1_1".to_string()),
                timeout_secs: env::var("MEDIA_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .unwrap_or(30),
            }
        } else {
            MediaConfig::Disk {
                location: env::var("MEDIA_DISK_LOCATION")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| data_directory.join("media")),
                public_url: env::var("MEDIA_PUBLIC_URL")
                    .unwrap_or_else(|_| format!("http://localhost:{}/media", port)),
            }
        };

        let log_level = env::var("RUST_LOG")
            .unwrap_or_else(|_| "account_service=debug,tower_http=debug".to_string());

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                environment,
                cors_origin,
                upload_limit,
            },
            storage: StorageConfig {
                data_directory,
                account_db,
                staging_directory,
            },
            authentication: AuthConfig {
                access_token_secret,
                access_token_ttl_secs,
                refresh_token_secret,
                refresh_token_ttl_secs,
            },
            media,
            logging: LoggingConfig { level: log_level },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> ApiResult<()> {
        if self.service.hostname.is_empty() {
            return Err(ApiError::InvalidInput("Hostname cannot be empty".to_string()));
        }

        let auth = &self.authentication;
        if auth.access_token_secret.len() < 32 || auth.refresh_token_secret.len() < 32 {
            return Err(ApiError::InvalidInput(
                "Token secrets must be at least 32 characters".to_string(),
            ));
        }

        if auth.access_token_secret == auth.refresh_token_secret {
            return Err(ApiError::InvalidInput(
                "Access and refresh token secrets must differ".to_string(),
            ));
        }

        if auth.access_token_ttl_secs <= 0 || auth.refresh_token_ttl_secs <= 0 {
            return Err(ApiError::InvalidInput(
                "Token lifetimes must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Minimal configuration for tests, backed by the given directory
    #[cfg(test)]
    pub fn for_tests(root: &std::path::Path) -> Self {
        ServerConfig {
            service: ServiceConfig {
                hostname: "localhost".to_string(),
                port: 8000,
                environment: "test".to_string(),
                cors_origin: None,
                upload_limit: 1024 * 1024,
            },
            storage: StorageConfig {
                data_directory: root.to_path_buf(),
                account_db: root.join("accounts.sqlite"),
                staging_directory: root.join("staging"),
            },
            authentication: AuthConfig {
                access_token_secret: "test-access-secret-key-for-testing-only".to_string(),
                access_token_ttl_secs: 3600,
                refresh_token_secret: "test-refresh-secret-key-for-testing-only".to_string(),
                refresh_token_ttl_secs: 864000,
            },
            media: MediaConfig::Disk {
                location: root.join("media"),
                public_url: "http://localhost:8000/media".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_test_config() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ServerConfig::for_tests(dir.path()).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_short_or_shared_secrets() {
        let dir = tempfile::tempdir().unwrap();

        let mut config = ServerConfig::for_tests(dir.path());
        config.authentication.access_token_secret = "short".to_string();
        assert!(config.validate().is_err());

        let mut config = ServerConfig::for_tests(dir.path());
        config.authentication.refresh_token_secret =
            config.authentication.access_token_secret.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_production_flag() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ServerConfig::for_tests(dir.path());
        assert!(!config.service.is_production());

        config.service.environment = "Production".to_string();
        assert!(config.service.is_production());
    }
}
