//! Configuration management for the SST Training Management Platform
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with SST_ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT authentication configuration
    pub jwt: JwtConfig,

    /// Certificate issuance configuration
    pub certificates: CertificateConfig,

    /// Bulk import limits
    pub import: ImportConfig,

    /// First administrator, created when the users table is empty
    pub bootstrap_admin: Option<BootstrapAdminConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Secret key for signing JWT tokens
    pub secret: String,

    /// Access token expiration in seconds
    pub access_token_expiry: i64,

    /// Refresh token expiration in seconds
    pub refresh_token_expiry: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CertificateConfig {
    /// HMAC key used to derive public certificate codes
    pub signing_secret: String,

    /// Organization name printed on certificates
    pub issuer_name: String,

    /// Public page where a certificate code can be verified
    pub verification_base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImportConfig {
    /// Largest accepted upload in bytes
    pub max_upload_bytes: usize,

    /// Largest accepted number of data rows per sheet
    pub max_rows: usize,

    /// Records per INSERT statement
    pub insert_chunk_size: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BootstrapAdminConfig {
    pub email: String,
    pub password: String,
    pub full_name: String,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("SST_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("jwt.access_token_expiry", 3600)?
            .set_default("jwt.refresh_token_expiry", 604800)?
            .set_default("certificates.issuer_name", "Gerencia de Seguridad y Salud en el Trabajo")?
            .set_default(
                "certificates.verification_base_url",
                "http://localhost:3000/api/v1/public/certificates",
            )?
            .set_default("import.max_upload_bytes", 10 * 1024 * 1024)?
            .set_default("import.max_rows", 5000)?
            .set_default("import.insert_chunk_size", 500)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (SST_ prefix)
            .add_source(
                Environment::with_prefix("SST")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Socket address string the server binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: 10 * 1024 * 1024,
            max_rows: 5000,
            insert_chunk_size: 500,
        }
    }
}
