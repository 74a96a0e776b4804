use std::env;
use std::time::Duration;

use crate::utils::i18n::Locale;

/// Runtime configuration for the upload staging service
#[derive(Debug, Clone)]
pub struct StagingConfig {
    /// Maximum multipart request size in bytes (default: 64 MB)
    pub max_request_size: usize,

    /// Seconds a session may stay untouched before its staged files are evicted (default: 3600)
    pub session_idle_timeout_secs: u64,

    /// Seconds between two idle-session sweeps (default: 300)
    pub sweep_interval_secs: u64,

    /// Base URL of the blob store holding external-reference files; unset disables them
    pub blob_store_url: Option<String>,

    /// Blob store service name used for uploads (default: directory)
    pub blob_store_name: String,

    /// Timeout for a single blob store call in seconds (default: 30)
    pub blob_store_timeout_secs: u64,

    /// Locale used when the request carries no usable Accept-Language
    pub default_locale: Locale,

    /// Allowed CORS Origins (comma separated)
    pub allowed_origins: Vec<String>,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            max_request_size: 64 * 1024 * 1024, // 64 MB
            session_idle_timeout_secs: 3600,
            sweep_interval_secs: 300,
            blob_store_url: None,
            blob_store_name: "directory".to_string(),
            blob_store_timeout_secs: 30,
            default_locale: Locale::En,
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
        }
    }
}

impl StagingConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            max_request_size: env::var("MAX_REQUEST_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_request_size),

            session_idle_timeout_secs: env::var("SESSION_IDLE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.session_idle_timeout_secs),

            sweep_interval_secs: env::var("SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.sweep_interval_secs),

            blob_store_url: env::var("BLOB_STORE_URL")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .or(default.blob_store_url),

            blob_store_name: env::var("BLOB_STORE_NAME")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(default.blob_store_name),

            blob_store_timeout_secs: env::var("BLOB_STORE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.blob_store_timeout_secs),

            default_locale: env::var("DEFAULT_LOCALE")
                .ok()
                .and_then(|v| Locale::parse(&v))
                .unwrap_or(default.default_locale),

            allowed_origins: env::var("ALLOWED_ORIGINS")
                .ok()
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(default.allowed_origins),
        }
    }

    /// Create config for development (short idle timeout, no blob store)
    pub fn development() -> Self {
        Self {
            session_idle_timeout_secs: 600,
            sweep_interval_secs: 60,
            ..Self::default()
        }
    }

    /// Create config for production (origins must be provided)
    pub fn production() -> Self {
        let from_env = Self::from_env();
        Self {
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .ok()
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_default(),
            ..from_env
        }
    }

    pub fn session_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.session_idle_timeout_secs)
    }

    /// Never shorter than a second, so a zero setting cannot spin the sweeper.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    pub fn blob_store_timeout(&self) -> Duration {
        Duration::from_secs(self.blob_store_timeout_secs)
    }
}
