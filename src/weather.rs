use crate::cache::{self, PersistentCache};
use crate::config::WeatherConfig;
use crate::http;
use crate::models::DailyWeather;
use crate::{AirAwareError, Result};
use chrono::NaiveDate;
use reqwest_middleware::ClientWithMiddleware;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

const DAILY_VARIABLES: &str = "temperature_2m_mean,temperature_2m_max,temperature_2m_min,precipitation_sum,wind_speed_10m_mean,relative_humidity_2m_mean";
const WEATHER_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Client for the Open-Meteo historical weather archive (no API key required)
pub struct OpenMeteoClient {
    client: ClientWithMiddleware,
    config: WeatherConfig,
    cache: Option<Arc<PersistentCache>>,
}

impl OpenMeteoClient {
    #[must_use]
    pub fn new(
        client: ClientWithMiddleware,
        config: WeatherConfig,
        cache: Option<Arc<PersistentCache>>,
    ) -> Self {
        Self {
            client,
            config,
            cache,
        }
    }

    /// Daily weather at a point for every day in `start..=end`
    #[instrument(skip(self))]
    pub async fn daily_history(
        &self,
        latitude: f64,
        longitude: f64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyWeather>> {
        let key = format!("weather:{latitude:.4}:{longitude:.4}:{start}:{end}");
        cache::get_or_fetch(self.cache.as_deref(), &key, WEATHER_TTL, || {
            self.fetch(latitude, longitude, start, end)
        })
        .await
    }

    async fn fetch(
        &self,
        latitude: f64,
        longitude: f64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyWeather>> {
        let start_time = Instant::now();
        let url = http::endpoint(
            &self.config.archive_url,
            "archive",
            &[
                ("latitude", format!("{latitude:.4}")),
                ("longitude", format!("{longitude:.4}")),
                ("start_date", start.to_string()),
                ("end_date", end.to_string()),
                ("daily", DAILY_VARIABLES.to_string()),
                ("timezone", "auto".to_string()),
            ],
        )?;

        let response: openmeteo::ArchiveResponse =
            http::get_json(&self.client, url, &[], "Open-Meteo").await?;

        if let Some(reason) = response.reason {
            return Err(AirAwareError::api(format!("Open-Meteo refused request: {reason}")));
        }

        let days = match response.daily {
            Some(daily) => daily.into_days()?,
            None => {
                warn!(
                    "No daily weather data found at ({:.4}, {:.4}) between {} and {}",
                    latitude, longitude, start, end
                );
                Vec::new()
            }
        };

        info!(
            "Retrieved {} days of weather in {:.3}s",
            days.len(),
            start_time.elapsed().as_secs_f64()
        );
        Ok(days)
    }
}

/// `OpenMeteo` archive response structures and conversion utilities
mod openmeteo {
    use super::{AirAwareError, DailyWeather, NaiveDate, Result};
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    pub struct ArchiveResponse {
        pub daily: Option<DailyData>,
        /// Present together with `"error": true`
        pub reason: Option<String>,
    }

    /// Daily weather columns, one entry per element of `time`
    #[derive(Debug, Deserialize)]
    pub struct DailyData {
        pub time: Vec<String>,
        #[serde(rename = "temperature_2m_mean", default)]
        pub temperature_mean: Vec<Option<f64>>,
        #[serde(rename = "temperature_2m_max", default)]
        pub temperature_max: Vec<Option<f64>>,
        #[serde(rename = "temperature_2m_min", default)]
        pub temperature_min: Vec<Option<f64>>,
        #[serde(default)]
        pub precipitation_sum: Vec<Option<f64>>,
        #[serde(rename = "wind_speed_10m_mean", default)]
        pub wind_speed_mean: Vec<Option<f64>>,
        #[serde(rename = "relative_humidity_2m_mean", default)]
        pub humidity_mean: Vec<Option<f64>>,
    }

    fn at(column: &[Option<f64>], i: usize) -> Option<f64> {
        column.get(i).copied().flatten()
    }

    impl DailyData {
        /// Zip the columns into rows. Short columns read as missing values.
        pub fn into_days(self) -> Result<Vec<DailyWeather>> {
            self.time
                .iter()
                .enumerate()
                .map(|(i, day)| {
                    let date = NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(|_| {
                        AirAwareError::parse(format!("Invalid date in Open-Meteo response: {day}"))
                    })?;
                    Ok(DailyWeather {
                        date,
                        temperature_mean: at(&self.temperature_mean, i),
                        temperature_max: at(&self.temperature_max, i),
                        temperature_min: at(&self.temperature_min, i),
                        precipitation_sum: at(&self.precipitation_sum, i),
                        wind_speed_mean: at(&self.wind_speed_mean, i),
                        relative_humidity_mean: at(&self.humidity_mean, i),
                    })
                })
                .collect()
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_into_days_handles_nulls_and_short_columns() {
            let body = r#"{
                "latitude": 13.0,
                "longitude": 80.25,
                "timezone": "Asia/Kolkata",
                "daily_units": {"time": "iso8601"},
                "daily": {
                    "time": ["2023-01-01", "2023-01-02", "2023-01-03"],
                    "temperature_2m_mean": [24.1, null, 25.3],
                    "temperature_2m_max": [29.0, 28.4, 30.1],
                    "temperature_2m_min": [20.2, 21.0, 21.5],
                    "precipitation_sum": [0.0, 1.2],
                    "wind_speed_10m_mean": [9.8, 11.0, 7.4],
                    "relative_humidity_2m_mean": [72, 80, 75]
                }
            }"#;
            let response: ArchiveResponse = serde_json::from_str(body).unwrap();
            let days = response.daily.unwrap().into_days().unwrap();

            assert_eq!(days.len(), 3);
            assert_eq!(days[0].temperature_mean, Some(24.1));
            assert_eq!(days[1].temperature_mean, None);
            assert_eq!(days[2].precipitation_sum, None);
            assert_eq!(days[1].relative_humidity_mean, Some(80.0));
        }

        #[test]
        fn test_missing_daily_block() {
            let response: ArchiveResponse =
                serde_json::from_str(r#"{"latitude": 1.0, "longitude": 2.0}"#).unwrap();
            assert!(response.daily.is_none());
        }

        #[test]
        fn test_error_reason() {
            let response: ArchiveResponse = serde_json::from_str(
                r#"{"error": true, "reason": "Parameter 'start_date' is out of allowed range"}"#,
            )
            .unwrap();
            assert!(response.reason.unwrap().contains("start_date"));
        }
    }
}
