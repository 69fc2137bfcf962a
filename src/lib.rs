//! `AirAware` - historical air quality and weather analysis
//!
//! This library geocodes places to bounding boxes, pulls OpenAQ archive
//! measurements and Open-Meteo daily weather for them, and turns both into a
//! report with averages, trends, AQI categories and weather correlations.

pub mod analysis;
pub mod aqi;
pub mod cache;
pub mod config;
pub mod error;
pub mod geocoding;
pub mod http;
pub mod logging;
pub mod models;
pub mod openaq;
pub mod report;
pub mod request;
pub mod weather;
pub mod workflow;

// Re-export core types for public API
pub use cache::PersistentCache;
pub use config::AirAwareConfig;
pub use error::AirAwareError;
pub use geocoding::NominatimClient;
pub use models::{BoundingBox, DailyPollutant, DailyWeather, Location, Measurement};
pub use openaq::OpenAqClient;
pub use report::Report;
pub use request::{AnalysisRequest, RawRequest};
pub use weather::OpenMeteoClient;
pub use workflow::Workflow;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, AirAwareError>;
