//! Configuration management

use serde::{Deserialize, Serialize};

// ============================================================================
// Server Configuration Constants
// ============================================================================

/// Default server host binding.
pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";

/// Default server port.
pub const DEFAULT_SERVER_PORT: u16 = 8000;

/// Default shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Default database URL for local development.
pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/pcx";

/// Default maximum database connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;

/// Default minimum database connections in the pool.
pub const DEFAULT_DATABASE_MIN_CONNECTIONS: u32 = 2;

/// Default database connection timeout in seconds.
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default database idle timeout in seconds (10 minutes).
pub const DEFAULT_DATABASE_IDLE_TIMEOUT_SECS: u64 = 600;

/// Default CORS allowed origin for local development.
pub const DEFAULT_CORS_ALLOWED_ORIGIN: &str = "http://localhost:3000";

// ============================================================================
// Pipeline Limit Constants
// ============================================================================

/// Maximum accepted upload size in bytes (10 MB).
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Maximum decoded text size in bytes (50 MB).
pub const MAX_TEXT_BYTES: usize = 50 * 1024 * 1024;

/// Default row ceiling applied when processing an import.
pub const DEFAULT_MAX_ROWS: usize = 10_000;

/// Absolute row ceiling no caller may exceed.
pub const ABSOLUTE_MAX_ROWS: usize = 50_000;

/// Maximum number of columns accepted from any file.
pub const MAX_COLUMNS: usize = 100;

/// Maximum characters kept per cell.
pub const MAX_CELL_CHARS: usize = 1_000;

/// Wall-clock budget for parsing one upload, in seconds.
pub const PARSE_TIMEOUT_SECS: u64 = 30;

/// Timeout for fetching an uploaded file from storage, in seconds.
pub const DOWNLOAD_TIMEOUT_SECS: u64 = 30;

/// Timeout for one chunk's bulk insert, in seconds.
pub const INSERT_TIMEOUT_SECS: u64 = 30;

/// Default batch chunk size.
pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// Hard cap on the batch chunk size.
pub const MAX_CHUNK_SIZE: usize = 500;

/// Hard ceiling on exported records.
pub const MAX_EXPORT_RECORDS: i64 = 10_000;

/// Signed download URL lifetime in seconds.
pub const SIGNED_URL_TTL_SECS: u64 = 3_600;

/// Per-identity upload budget per hour.
pub const UPLOADS_PER_HOUR: u32 = 10;

/// Per-identity export budget per hour.
pub const EXPORTS_PER_HOUR: u32 = 10;

/// Per-identity general request budget per hour.
pub const REQUESTS_PER_HOUR: u32 = 200;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cors: CorsConfig,
    pub limits: LimitsConfig,
}

/// Server-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

/// Pipeline limits, tunable per deployment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    pub max_upload_bytes: usize,
    pub max_text_bytes: usize,
    pub default_max_rows: usize,
    pub absolute_max_rows: usize,
    pub max_columns: usize,
    pub max_cell_chars: usize,
    pub parse_timeout_secs: u64,
    pub uploads_per_hour: u32,
    pub exports_per_hour: u32,
    pub requests_per_hour: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: MAX_UPLOAD_BYTES,
            max_text_bytes: MAX_TEXT_BYTES,
            default_max_rows: DEFAULT_MAX_ROWS,
            absolute_max_rows: ABSOLUTE_MAX_ROWS,
            max_columns: MAX_COLUMNS,
            max_cell_chars: MAX_CELL_CHARS,
            parse_timeout_secs: PARSE_TIMEOUT_SECS,
            uploads_per_hour: UPLOADS_PER_HOUR,
            exports_per_hour: EXPORTS_PER_HOUR,
            requests_per_hour: REQUESTS_PER_HOUR,
        }
    }
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config {
            server: ServerConfig {
                host: std::env::var("PCX_HOST").unwrap_or_else(|_| DEFAULT_SERVER_HOST.to_string()),
                port: std::env::var("PCX_PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_SERVER_PORT),
                shutdown_timeout_secs: std::env::var("PCX_SHUTDOWN_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
                max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_DATABASE_MAX_CONNECTIONS),
                min_connections: std::env::var("DATABASE_MIN_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_DATABASE_MIN_CONNECTIONS),
                connect_timeout_secs: std::env::var("DATABASE_CONNECT_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS),
                idle_timeout_secs: std::env::var("DATABASE_IDLE_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_DATABASE_IDLE_TIMEOUT_SECS),
            },
            cors: CorsConfig {
                allowed_origins: std::env::var("CORS_ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| DEFAULT_CORS_ALLOWED_ORIGIN.to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .collect(),
                allow_credentials: std::env::var("CORS_ALLOW_CREDENTIALS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(true),
            },
            limits: LimitsConfig {
                max_upload_bytes: std::env::var("PCX_MAX_UPLOAD_BYTES")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(MAX_UPLOAD_BYTES),
                max_text_bytes: std::env::var("PCX_MAX_TEXT_BYTES")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(MAX_TEXT_BYTES),
                default_max_rows: std::env::var("PCX_DEFAULT_MAX_ROWS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_MAX_ROWS),
                absolute_max_rows: ABSOLUTE_MAX_ROWS,
                max_columns: MAX_COLUMNS,
                max_cell_chars: MAX_CELL_CHARS,
                parse_timeout_secs: std::env::var("PCX_PARSE_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(PARSE_TIMEOUT_SECS),
                uploads_per_hour: std::env::var("PCX_UPLOADS_PER_HOUR")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(UPLOADS_PER_HOUR),
                exports_per_hour: std::env::var("PCX_EXPORTS_PER_HOUR")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(EXPORTS_PER_HOUR),
                requests_per_hour: std::env::var("PCX_REQUESTS_PER_HOUR")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(REQUESTS_PER_HOUR),
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port must be greater than 0");
        }

        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        if self.database.max_connections == 0 {
            anyhow::bail!("Database max_connections must be greater than 0");
        }

        if self.database.min_connections > self.database.max_connections {
            anyhow::bail!(
                "Database min_connections ({}) cannot be greater than max_connections ({})",
                self.database.min_connections,
                self.database.max_connections
            );
        }

        if self.limits.max_upload_bytes == 0 || self.limits.max_text_bytes == 0 {
            anyhow::bail!("Upload size limits must be greater than 0");
        }

        if self.limits.default_max_rows > self.limits.absolute_max_rows {
            anyhow::bail!(
                "default_max_rows ({}) cannot exceed absolute_max_rows ({})",
                self.limits.default_max_rows,
                self.limits.absolute_max_rows
            );
        }

        if self.cors.allowed_origins.is_empty() {
            tracing::warn!("No CORS origins configured - all origins will be allowed");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: DEFAULT_SERVER_HOST.to_string(),
                port: DEFAULT_SERVER_PORT,
                shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            },
            database: DatabaseConfig {
                url: DEFAULT_DATABASE_URL.to_string(),
                max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
                min_connections: DEFAULT_DATABASE_MIN_CONNECTIONS,
                connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                idle_timeout_secs: DEFAULT_DATABASE_IDLE_TIMEOUT_SECS,
            },
            cors: CorsConfig {
                allowed_origins: vec![DEFAULT_CORS_ALLOWED_ORIGIN.to_string()],
                allow_credentials: true,
            },
            limits: LimitsConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_port_rejected() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inverted_pool_bounds_rejected() {
        let mut config = Config::default();
        config.database.min_connections = 20;
        config.database.max_connections = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_rows_must_fit_ceiling() {
        let mut config = Config::default();
        config.limits.default_max_rows = ABSOLUTE_MAX_ROWS + 1;
        assert!(config.validate().is_err());
    }
}
