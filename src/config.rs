//! Configuration management for the `AirAware` application
//!
//! Handles loading configuration from files, environment variables,
//! and provides validation for all configuration settings.

use crate::AirAwareError;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure for the `AirAware` application
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AirAwareConfig {
    /// Shared HTTP client settings
    pub http: HttpConfig,
    /// Nominatim geocoding settings
    pub geocoding: GeocodingConfig,
    /// OpenAQ API and archive settings
    pub openaq: OpenAqConfig,
    /// Open-Meteo archive settings
    pub weather: WeatherConfig,
    /// Cache configuration
    pub cache: CacheConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Trace export configuration
    pub telemetry: TelemetryConfig,
    /// Default analysis settings
    pub defaults: DefaultsConfig,
}

/// HTTP client configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Request timeout in seconds
    pub timeout_seconds: u32,
    /// Maximum number of retries for transient failures
    pub max_retries: u32,
    /// User agent sent with every request. Nominatim requires a descriptive one.
    pub user_agent: String,
}

/// Nominatim geocoding settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodingConfig {
    pub base_url: String,
    /// Distance the raw bounding box is grown by on every side
    pub expansion_km: f64,
    /// Minimum spacing between Nominatim requests; its usage policy allows one per second
    pub min_request_interval_ms: u64,
}

/// OpenAQ settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAqConfig {
    /// OpenAQ v3 API key, sent as `X-API-Key`
    pub api_key: Option<String>,
    pub base_url: String,
    /// Public S3 bucket holding the daily `csv.gz` records
    pub archive_url: String,
    /// Maximum number of stations considered per bounding box
    pub location_limit: u32,
    pub max_concurrent_downloads: usize,
}

/// Open-Meteo settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub archive_url: String,
}

/// Cache configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Cache directory location
    pub location: String,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Log format (pretty or json)
    pub format: String,
}

/// OTLP trace export, disabled unless an endpoint is configured
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub otlp_endpoint: Option<String>,
}

/// Default analysis settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    pub locations: Vec<String>,
    pub parameters: Vec<String>,
    /// How far back the default start date lies
    pub lookback_days: u32,
    /// Length of the default window when only a start date is given
    pub window_days: u32,
    /// Largest accepted date range
    pub max_range_days: u32,
    pub author: String,
}

// Default value functions
fn default_timeout() -> u32 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_user_agent() -> String {
    format!("AirAware/{} (air quality reports)", crate::VERSION)
}

fn default_nominatim_url() -> String {
    "https://nominatim.openstreetmap.org".to_string()
}

fn default_expansion_km() -> f64 {
    15.0
}

fn default_geocoding_interval_ms() -> u64 {
    1000
}

fn default_openaq_url() -> String {
    "https://api.openaq.org".to_string()
}

fn default_openaq_archive_url() -> String {
    "https://openaq-data-archive.s3.amazonaws.com".to_string()
}

fn default_location_limit() -> u32 {
    100
}

fn default_max_concurrent_downloads() -> usize {
    4
}

fn default_weather_archive_url() -> String {
    "https://archive-api.open-meteo.com/v1".to_string()
}

fn default_cache_location() -> String {
    dirs::cache_dir()
        .map(|dir| dir.join("airaware").to_string_lossy().into_owned())
        .unwrap_or_else(|| ".airaware-cache".to_string())
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            max_retries: default_max_retries(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            base_url: default_nominatim_url(),
            expansion_km: default_expansion_km(),
            min_request_interval_ms: default_geocoding_interval_ms(),
        }
    }
}

impl Default for OpenAqConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_openaq_url(),
            archive_url: default_openaq_archive_url(),
            location_limit: default_location_limit(),
            max_concurrent_downloads: default_max_concurrent_downloads(),
        }
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            archive_url: default_weather_archive_url(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            location: default_cache_location(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            locations: vec!["New Delhi, India".to_string(), "Chennai, India".to_string()],
            parameters: vec!["pm25".to_string()],
            lookback_days: 60,
            window_days: 3,
            max_range_days: 31,
            author: "AirAware".to_string(),
        }
    }
}

impl OpenAqConfig {
    /// The key is only needed once air quality is actually fetched
    pub fn require_api_key(&self) -> crate::Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            AirAwareError::config(
                "OpenAQ API key missing. Set OPENAQ_API_KEY or openaq.api_key in the config file",
            )
        })
    }
}

impl AirAwareConfig {
    /// Load configuration from the given file, or the default location, plus environment variables
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path().unwrap_or_else(|| PathBuf::from("airaware.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // AIRAWARE__OPENAQ__API_KEY=... overrides openaq.api_key
        builder = builder.add_source(
            Environment::with_prefix("AIRAWARE")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: AirAwareConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        // The conventional OpenAQ variable wins over nothing, never over explicit config
        if config.openaq.api_key.is_none() {
            config.openaq.api_key = std::env::var("OPENAQ_API_KEY").ok();
        }

        config.apply_defaults();
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("airaware").join("config.toml"))
    }

    /// Apply default values to empty configuration fields
    pub fn apply_defaults(&mut self) {
        if self.http.timeout_seconds == 0 {
            self.http.timeout_seconds = default_timeout();
        }
        if self.http.user_agent.is_empty() {
            self.http.user_agent = default_user_agent();
        }
        if self.geocoding.base_url.is_empty() {
            self.geocoding.base_url = default_nominatim_url();
        }
        if self.openaq.base_url.is_empty() {
            self.openaq.base_url = default_openaq_url();
        }
        if self.openaq.archive_url.is_empty() {
            self.openaq.archive_url = default_openaq_archive_url();
        }
        if self.openaq.location_limit == 0 {
            self.openaq.location_limit = default_location_limit();
        }
        if self.openaq.max_concurrent_downloads == 0 {
            self.openaq.max_concurrent_downloads = default_max_concurrent_downloads();
        }
        if self.weather.archive_url.is_empty() {
            self.weather.archive_url = default_weather_archive_url();
        }
        if self.cache.location.is_empty() {
            self.cache.location = default_cache_location();
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
        if self.openaq.api_key.as_deref().is_some_and(|key| key.trim().is_empty()) {
            self.openaq.api_key = None;
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        Ok(())
    }

    /// Validate numeric configuration ranges
    fn validate_numeric_ranges(&self) -> Result<()> {
        if self.http.timeout_seconds > 300 {
            return Err(
                AirAwareError::config("HTTP timeout cannot exceed 300 seconds").into(),
            );
        }

        if self.http.max_retries > 10 {
            return Err(AirAwareError::config("HTTP max retries cannot exceed 10").into());
        }

        if !(0.0..=200.0).contains(&self.geocoding.expansion_km) {
            return Err(AirAwareError::config(
                "Bounding box expansion must be between 0 and 200 km",
            )
            .into());
        }

        if self.geocoding.min_request_interval_ms > 60_000 {
            return Err(AirAwareError::config(
                "Geocoding request interval cannot exceed 60000 ms",
            )
            .into());
        }

        if self.openaq.location_limit > 1000 {
            return Err(
                AirAwareError::config("OpenAQ location limit cannot exceed 1000").into(),
            );
        }

        if self.openaq.max_concurrent_downloads > 32 {
            return Err(AirAwareError::config(
                "Concurrent archive downloads cannot exceed 32",
            )
            .into());
        }

        if !(1..=3650).contains(&self.defaults.lookback_days) {
            return Err(AirAwareError::config(
                "Default lookback must be between 1 and 3650 days",
            )
            .into());
        }

        if self.defaults.window_days > 366 {
            return Err(AirAwareError::config("Default window cannot exceed 366 days").into());
        }

        if self.defaults.max_range_days == 0 || self.defaults.max_range_days > 366 {
            return Err(AirAwareError::config(
                "Maximum date range must be between 1 and 366 days",
            )
            .into());
        }

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(AirAwareError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(AirAwareError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        for (name, url) in [
            ("geocoding.base_url", &self.geocoding.base_url),
            ("openaq.base_url", &self.openaq.base_url),
            ("openaq.archive_url", &self.openaq.archive_url),
            ("weather.archive_url", &self.weather.archive_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(AirAwareError::config(format!(
                    "{name} must be a valid HTTP or HTTPS URL"
                ))
                .into());
            }
        }

        Ok(())
    }
}
