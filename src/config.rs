/// Configuration management for the license panel
use crate::error::{PanelError, PanelResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Longest accepted session lifetime (one year)
pub const MAX_SESSION_TTL_HOURS: i64 = 24 * 365;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub authentication: AuthConfig,
    pub rate_limit: RateLimitConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    pub version: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub database: PathBuf,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// Session lifetime in hours
    pub session_ttl_hours: i64,
    /// Mark the session cookie `Secure`
    pub secure_cookies: bool,
    /// Staff account created at startup when missing
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

/// Initial administrator credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapAdmin {
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub requests_per_second: u32,
    pub burst_size: u32,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> PanelResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("PANEL_HOSTNAME").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("PANEL_PORT")
            .unwrap_or_else(|_| "8000".to_string())
            .parse()
            .map_err(|_| PanelError::Validation("Invalid port number".to_string()))?;
        let version = env!("CARGO_PKG_VERSION").to_string();

        let data_directory: PathBuf = env::var("PANEL_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let database = env::var("PANEL_DB_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("panel.sqlite"));

        let jwt_secret = env::var("PANEL_JWT_SECRET")
            .map_err(|_| PanelError::Validation("JWT secret required".to_string()))?;
        let session_ttl_hours = env::var("PANEL_SESSION_TTL_HOURS")
            .unwrap_or_else(|_| "24".to_string())
            .parse()
            .unwrap_or(24);
        let secure_cookies = env::var("PANEL_SECURE_COOKIES")
            .unwrap_or_else(|_| "false".to_string())
            .parse()
            .unwrap_or(false);

        let bootstrap_admin = match (
            env::var("PANEL_ADMIN_USERNAME").ok(),
            env::var("PANEL_ADMIN_PASSWORD").ok(),
        ) {
            (Some(username), Some(password)) => Some(BootstrapAdmin { username, password }),
            (None, None) => None,
            _ => {
                return Err(PanelError::Validation(
                    "PANEL_ADMIN_USERNAME and PANEL_ADMIN_PASSWORD must be set together".to_string(),
                ))
            }
        };

        let rate_limit_enabled = env::var("PANEL_RATE_LIMITS_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);
        let requests_per_second = env::var("PANEL_RATE_LIMIT_RPS")
            .unwrap_or_else(|_| "20".to_string())
            .parse()
            .unwrap_or(20);
        let burst_size = env::var("PANEL_RATE_LIMIT_BURST")
            .unwrap_or_else(|_| "50".to_string())
            .parse()
            .unwrap_or(50);

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                version,
            },
            storage: StorageConfig {
                data_directory,
                database,
            },
            authentication: AuthConfig {
                jwt_secret,
                session_ttl_hours,
                secure_cookies,
                bootstrap_admin,
            },
            rate_limit: RateLimitConfig {
                enabled: rate_limit_enabled,
                requests_per_second,
                burst_size,
            },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> PanelResult<()> {
        if self.service.hostname.is_empty() {
            return Err(PanelError::Validation("Hostname cannot be empty".to_string()));
        }

        if self.authentication.jwt_secret.len() < 32 {
            return Err(PanelError::Validation(
                "JWT secret must be at least 32 characters".to_string(),
            ));
        }

        if self.authentication.session_ttl_hours <= 0 {
            return Err(PanelError::Validation(
                "Session lifetime must be positive".to_string(),
            ));
        }

        if self.authentication.session_ttl_hours > MAX_SESSION_TTL_HOURS {
            return Err(PanelError::Validation(format!(
                "Session lifetime cannot exceed {} hours",
                MAX_SESSION_TTL_HOURS
            )));
        }

        if let Some(admin) = &self.authentication.bootstrap_admin {
            if admin.username.trim().is_empty() || admin.password.len() < 8 {
                return Err(PanelError::Validation(
                    "Bootstrap admin needs a username and a password of at least 8 characters"
                        .to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Configuration for tests: in-memory friendly paths, fixed secret
    pub fn for_tests() -> Self {
        ServerConfig {
            service: ServiceConfig {
                hostname: "127.0.0.1".to_string(),
                port: 8000,
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            storage: StorageConfig {
                data_directory: PathBuf::from("./data"),
                database: PathBuf::from(":memory:"),
            },
            authentication: AuthConfig {
                jwt_secret: "test-secret-key-for-testing-only-0123456789".to_string(),
                session_ttl_hours: 24,
                secure_cookies: false,
                bootstrap_admin: None,
            },
            rate_limit: RateLimitConfig {
                enabled: false,
                requests_per_second: 20,
                burst_size: 50,
            },
        }
    }
}
