//! Data models for the `AirAware` application
//!
//! This module contains the core domain models organized by concern:
//! - Bounding box: geographic extent used to select monitoring stations
//! - Location: a geocoded place name with its bounding box
//! - Air quality: raw archive measurements and their daily aggregates
//! - Weather: daily historical weather observations

pub mod air_quality;
pub mod bounding_box;
pub mod location;
pub mod weather;

// Re-export all public types for convenient access
pub use air_quality::{DailyPollutant, Measurement, OpenAqLocation};
pub use bounding_box::BoundingBox;
pub use location::Location;
pub use weather::{DailyWeather, WeatherVariable};
