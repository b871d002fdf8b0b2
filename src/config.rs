use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono_tz::Tz;
use thiserror::Error;

use crate::constants::{DEFAULT_CLEANUP_SCRIPT, DEFAULT_PUBLIC_ID_PREFIX};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("failed to parse {name} as boolean: {value}")]
    ParseBool { name: String, value: String },
    #[error("failed to read cleanup script {path}: {source}")]
    CleanupScript {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Cloudinary account credentials and API location.
#[derive(Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub api_base: String,
}

impl fmt::Debug for CloudinaryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudinaryConfig")
            .field("cloud_name", &self.cloud_name)
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// Supabase project endpoint and key.
#[derive(Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub key: String,
    pub table: String,
}

impl fmt::Debug for SupabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupabaseConfig")
            .field("url", &self.url)
            .field("key", &"<redacted>")
            .field("table", &self.table)
            .finish()
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Input / output
    pub urls_file: PathBuf,
    pub output_dir: PathBuf,
    pub public_id_prefix: String,

    // Schedule
    pub timezone: Tz,
    pub misfire_grace: Duration,
    pub run_on_startup: bool,

    // Capture
    pub shot_scraper_path: String,
    pub capture_timeout: Duration,
    pub capture_wait_ms: u64,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub jpeg_quality: u8,
    pub cleanup_script_path: Option<PathBuf>,

    // Remote services
    pub cloudinary: CloudinaryConfig,
    pub supabase: SupabaseConfig,
    pub http_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Input / output
            urls_file: PathBuf::from(env_or_default("URLS_FILE", "urls.txt")),
            output_dir: PathBuf::from(env_or_default("OUTPUT_DIR", "screenshots")),
            public_id_prefix: env_or_default("PUBLIC_ID_PREFIX", DEFAULT_PUBLIC_ID_PREFIX),

            // Schedule
            timezone: parse_timezone(&env_or_default("TIMEZONE", "Europe/Warsaw"))?,
            misfire_grace: Duration::from_secs(parse_env_u64("MISFIRE_GRACE_SECS", 300)?),
            run_on_startup: parse_env_bool("RUN_ON_STARTUP", false)?,

            // Capture
            shot_scraper_path: env_or_default("SHOT_SCRAPER_PATH", "shot-scraper"),
            capture_timeout: Duration::from_secs(parse_env_u64("CAPTURE_TIMEOUT_SECS", 60)?),
            capture_wait_ms: parse_env_u64("CAPTURE_WAIT_MS", 2000)?,
            viewport_width: parse_env_u32("VIEWPORT_WIDTH", 1440)?,
            viewport_height: parse_env_u32("VIEWPORT_HEIGHT", 1080)?,
            jpeg_quality: parse_env_u8("JPEG_QUALITY", 70)?,
            cleanup_script_path: optional_env("CLEANUP_SCRIPT_PATH").map(PathBuf::from),

            // Remote services
            cloudinary: CloudinaryConfig {
                cloud_name: required_env("CLOUDINARY_CLOUD_NAME")?,
                api_key: required_env("CLOUDINARY_API_KEY")?,
                api_secret: required_env("CLOUDINARY_API_SECRET")?,
                api_base: env_or_default("CLOUDINARY_API_BASE", "https://api.cloudinary.com"),
            },
            supabase: SupabaseConfig {
                url: required_env("SUPABASE_URL")?,
                key: required_env("SUPABASE_KEY")?,
                table: env_or_default("SUPABASE_TABLE", "screenshots"),
            },
            http_timeout: Duration::from_secs(parse_env_u64("HTTP_TIMEOUT_SECS", 120)?),
        })
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ConfigError::InvalidValue {
                name: "JPEG_QUALITY".to_string(),
                message: "must be between 1 and 100".to_string(),
            });
        }
        if self.viewport_width == 0 || self.viewport_height == 0 {
            return Err(ConfigError::InvalidValue {
                name: "VIEWPORT_WIDTH/VIEWPORT_HEIGHT".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.capture_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "CAPTURE_TIMEOUT_SECS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.public_id_prefix.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "PUBLIC_ID_PREFIX".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        for (name, value) in [
            ("CLOUDINARY_CLOUD_NAME", &self.cloudinary.cloud_name),
            ("CLOUDINARY_API_KEY", &self.cloudinary.api_key),
            ("CLOUDINARY_API_SECRET", &self.cloudinary.api_secret),
            ("SUPABASE_URL", &self.supabase.url),
            ("SUPABASE_KEY", &self.supabase.key),
        ] {
            if value.is_empty() {
                return Err(ConfigError::InvalidValue {
                    name: name.to_string(),
                    message: "cannot be empty".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Resolve the in-page cleanup script: the configured file, or the built-in default.
    ///
    /// # Errors
    ///
    /// Returns an error if `CLEANUP_SCRIPT_PATH` is set but cannot be read.
    pub async fn load_cleanup_script(&self) -> Result<String, ConfigError> {
        match &self.cleanup_script_path {
            Some(path) => tokio::fs::read_to_string(path)
                .await
                .map_err(|source| ConfigError::CleanupScript {
                    path: path.clone(),
                    source,
                }),
            None => Ok(DEFAULT_CLEANUP_SCRIPT.to_string()),
        }
    }

    /// Configuration with placeholder credentials, for tests.
    #[doc(hidden)]
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            urls_file: PathBuf::from("urls.txt"),
            output_dir: PathBuf::from("screenshots"),
            public_id_prefix: DEFAULT_PUBLIC_ID_PREFIX.to_string(),
            timezone: chrono_tz::Europe::Warsaw,
            misfire_grace: Duration::from_secs(300),
            run_on_startup: false,
            shot_scraper_path: "shot-scraper".to_string(),
            capture_timeout: Duration::from_secs(60),
            capture_wait_ms: 2000,
            viewport_width: 1440,
            viewport_height: 1080,
            jpeg_quality: 70,
            cleanup_script_path: None,
            cloudinary: CloudinaryConfig {
                cloud_name: "demo".to_string(),
                api_key: "123456789012345".to_string(),
                api_secret: "test-secret".to_string(),
                api_base: "https://api.cloudinary.com".to_string(),
            },
            supabase: SupabaseConfig {
                url: "https://example.supabase.co".to_string(),
                key: "test-key".to_string(),
                table: "screenshots".to_string(),
            },
            http_timeout: Duration::from_secs(120),
        }
    }
}

fn required_env(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_int<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr<Err = std::num::ParseIntError>,
{
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.trim().parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    parse_env_int(name, default)
}

fn parse_env_u32(name: &str, default: u32) -> Result<u32, ConfigError> {
    parse_env_int(name, default)
}

fn parse_env_u8(name: &str, default: u8) -> Result<u8, ConfigError> {
    parse_env_int(name, default)
}

fn parse_env_bool(name: &str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => match val.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::ParseBool {
                name: name.to_string(),
                value: val,
            }),
        },
        _ => Ok(default),
    }
}

fn parse_timezone(value: &str) -> Result<Tz, ConfigError> {
    value.parse::<Tz>().map_err(|e| ConfigError::InvalidValue {
        name: "TIMEZONE".to_string(),
        message: format!("unknown timezone '{value}': {e}"),
    })
}
