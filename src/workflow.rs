//! Report pipeline
//!
//! For every requested location: geocode, then fetch weather and air quality
//! side by side, then analyse. Locations run concurrently. A location that
//! cannot be geocoded is reported as failed; a failing data source only
//! leaves a note on that location's section.

use crate::analysis::{self, ParameterSummary};
use crate::cache::PersistentCache;
use crate::config::AirAwareConfig;
use crate::geocoding::NominatimClient;
use crate::http;
use crate::models::{BoundingBox, DailyWeather, Location};
use crate::openaq::{ArchiveFetch, OpenAqClient};
use crate::report::{FailedLocation, LocationReport, Report};
use crate::request::AnalysisRequest;
use crate::weather::OpenMeteoClient;
use crate::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

/// Failures listed individually in a location's notes before being summarized
const MAX_LISTED_FAILURES: usize = 3;

/// Resolves place names
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn locate(&self, name: &str) -> Result<Location>;
}

/// Supplies raw air quality measurements for an area
#[async_trait]
pub trait AirQualitySource: Send + Sync {
    async fn measurements(
        &self,
        bbox: &BoundingBox,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<ArchiveFetch>;
}

/// Supplies daily historical weather for a point
#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn daily_history(
        &self,
        latitude: f64,
        longitude: f64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyWeather>>;
}

#[async_trait]
impl Geocoder for NominatimClient {
    async fn locate(&self, name: &str) -> Result<Location> {
        NominatimClient::locate(self, name).await
    }
}

#[async_trait]
impl AirQualitySource for OpenAqClient {
    async fn measurements(
        &self,
        bbox: &BoundingBox,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<ArchiveFetch> {
        OpenAqClient::measurements(self, bbox, start, end).await
    }
}

#[async_trait]
impl WeatherSource for OpenMeteoClient {
    async fn daily_history(
        &self,
        latitude: f64,
        longitude: f64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyWeather>> {
        OpenMeteoClient::daily_history(self, latitude, longitude, start, end).await
    }
}

pub struct Workflow {
    geocoder: Arc<dyn Geocoder>,
    air_quality: Arc<dyn AirQualitySource>,
    weather: Arc<dyn WeatherSource>,
}

impl Workflow {
    pub fn new(
        geocoder: Arc<dyn Geocoder>,
        air_quality: Arc<dyn AirQualitySource>,
        weather: Arc<dyn WeatherSource>,
    ) -> Self {
        Self {
            geocoder,
            air_quality,
            weather,
        }
    }

    /// Wire up the real HTTP sources sharing one client and cache
    pub fn from_config(
        config: &AirAwareConfig,
        cache: Option<Arc<PersistentCache>>,
    ) -> Result<Self> {
        let client = http::build_client(&config.http)?;
        Ok(Self::new(
            Arc::new(NominatimClient::new(
                client.clone(),
                config.geocoding.clone(),
                cache.clone(),
            )),
            Arc::new(OpenAqClient::new(
                client.clone(),
                config.openaq.clone(),
                cache.clone(),
            )),
            Arc::new(OpenMeteoClient::new(client, config.weather.clone(), cache)),
        ))
    }

    /// Geocode a single place
    pub async fn locate(&self, name: &str) -> Result<Location> {
        self.geocoder.locate(name).await
    }

    /// Geocode a place and fetch its daily weather
    pub async fn weather_for(
        &self,
        name: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<(Location, Vec<DailyWeather>)> {
        let location = self.geocoder.locate(name).await?;
        let (lat, lon) = location.bounding_box.center();
        let days = self.weather.daily_history(lat, lon, start, end).await?;
        Ok((location, days))
    }

    /// Run the full analysis and assemble the report
    #[instrument(skip_all, fields(locations = request.locations.len()))]
    pub async fn run(&self, request: &AnalysisRequest) -> Report {
        let start_time = Instant::now();
        info!(
            "Analysing {} location(s) from {} to {} for {}",
            request.locations.len(),
            request.start_date,
            request.end_date,
            request.parameters.join(", ")
        );

        let outcomes = futures::future::join_all(
            request
                .locations
                .iter()
                .map(|name| self.analyze_location(name, request))
                .collect::<Vec<_>>(),
        )
        .await;

        let mut locations = Vec::new();
        let mut failed_locations = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(section) => locations.push(section),
                Err(failed) => failed_locations.push(failed),
            }
        }

        let per_location: Vec<(String, Vec<ParameterSummary>)> = locations
            .iter()
            .map(|l: &LocationReport| (l.name.clone(), l.pollutants.clone()))
            .collect();
        let comparison = analysis::compare_locations(&per_location);

        info!(
            "Analysis finished in {:.3}s: {} location(s) ok, {} failed",
            start_time.elapsed().as_secs_f64(),
            locations.len(),
            failed_locations.len()
        );

        Report {
            title: format!("Air Quality Analysis: {}", request.locations.join(", ")),
            author: request.author.clone(),
            generated_at: Utc::now(),
            request: request.clone(),
            locations,
            failed_locations,
            comparison,
        }
    }

    async fn analyze_location(
        &self,
        name: &str,
        request: &AnalysisRequest,
    ) -> std::result::Result<LocationReport, FailedLocation> {
        let location = match self.geocoder.locate(name).await {
            Ok(location) => location,
            Err(err) => {
                error!("Could not locate '{}': {}", name, err);
                return Err(FailedLocation {
                    name: name.to_string(),
                    reason: err.to_string(),
                });
            }
        };

        let (lat, lon) = location.bounding_box.center();
        let (weather, air_quality) = tokio::join!(
            self.weather
                .daily_history(lat, lon, request.start_date, request.end_date),
            self.air_quality.measurements(
                &location.bounding_box,
                request.start_date,
                request.end_date
            ),
        );

        let mut notes = Vec::new();

        let weather = weather.unwrap_or_else(|err| {
            warn!("Weather unavailable for '{}': {}", name, err);
            notes.push(format!("Weather data unavailable: {err}"));
            Vec::new()
        });

        let (daily, stations) = match air_quality {
            Ok(fetch) => {
                if fetch.stations.is_empty() {
                    notes.push(format!(
                        "No OpenAQ monitoring stations found within {}.",
                        location.bounding_box
                    ));
                } else if fetch.measurements.is_empty() {
                    notes.push(format!(
                        "{} station(s) found, but none published data for this period.",
                        fetch.stations.len()
                    ));
                }
                notes.extend(failure_notes(&fetch.failures));
                let daily =
                    analysis::aggregate_daily(&fetch.measurements, &request.parameters, name);
                (daily, fetch.stations.len())
            }
            Err(err) => {
                warn!("Air quality unavailable for '{}': {}", name, err);
                notes.push(format!("Air quality data unavailable: {err}"));
                (Vec::new(), 0)
            }
        };

        for parameter in &request.parameters {
            if stations > 0 && !daily.iter().any(|d| &d.parameter == parameter) {
                notes.push(format!("No {parameter} measurements in this period."));
            }
        }

        Ok(LocationReport {
            name: name.to_string(),
            pollutants: analysis::summarize_pollutants(&daily),
            weather_summary: analysis::summarize_weather(&weather),
            correlations: analysis::correlate(&daily, &weather),
            location,
            stations,
            daily,
            weather,
            notes,
        })
    }
}

fn failure_notes(failures: &[String]) -> Vec<String> {
    if failures.is_empty() {
        return Vec::new();
    }
    let mut notes: Vec<String> = failures
        .iter()
        .take(MAX_LISTED_FAILURES)
        .map(|f| format!("Skipped archive data: {f}"))
        .collect();
    if failures.len() > MAX_LISTED_FAILURES {
        notes.push(format!(
            "...and {} more archive files could not be read.",
            failures.len() - MAX_LISTED_FAILURES
        ));
    }
    notes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AirAwareError;
    use crate::models::Measurement;
    use chrono::DateTime;

    struct FakeGeocoder;

    #[async_trait]
    impl Geocoder for FakeGeocoder {
        async fn locate(&self, name: &str) -> Result<Location> {
            if name.starts_with("Atlantis") {
                return Err(AirAwareError::not_found(format!(
                    "Bounding box not found for location: {name}"
                )));
            }
            Ok(Location {
                query: name.to_string(),
                display_name: format!("{name} (resolved)"),
                latitude: 13.08,
                longitude: 80.27,
                bounding_box: BoundingBox::new(12.9, 80.1, 13.2, 80.4)?,
            })
        }
    }

    struct FakeAirQuality {
        fail: bool,
    }

    #[async_trait]
    impl AirQualitySource for FakeAirQuality {
        async fn measurements(
            &self,
            _bbox: &BoundingBox,
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<ArchiveFetch> {
            if self.fail {
                return Err(AirAwareError::api_status("OpenAQ unauthorized", 401));
            }
            let reading = |datetime: &str, value: f64| Measurement {
                location_id: 1,
                sensor_id: 2,
                datetime: DateTime::parse_from_rfc3339(datetime).unwrap(),
                parameter: "pm25".to_string(),
                units: "µg/m³".to_string(),
                value,
            };
            Ok(ArchiveFetch {
                stations: vec![crate::models::OpenAqLocation {
                    id: 1,
                    name: "Alandur".to_string(),
                }],
                measurements: vec![
                    reading("2024-01-01T10:00:00+05:30", 40.0),
                    reading("2024-01-02T10:00:00+05:30", 50.0),
                    reading("2024-01-03T10:00:00+05:30", 60.0),
                ],
                failures: vec!["records/.../location-1-20240104.csv.gz: timed out".to_string()],
            })
        }
    }

    struct FakeWeather;

    #[async_trait]
    impl WeatherSource for FakeWeather {
        async fn daily_history(
            &self,
            _latitude: f64,
            _longitude: f64,
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<Vec<DailyWeather>> {
            Ok(start
                .iter_days()
                .take_while(|d| *d <= end)
                .enumerate()
                .map(|(i, date)| DailyWeather {
                    date,
                    temperature_mean: Some(25.0 + i as f64),
                    temperature_max: Some(30.0),
                    temperature_min: Some(20.0),
                    precipitation_sum: Some(0.0),
                    wind_speed_mean: Some(20.0 - 2.0 * i as f64),
                    relative_humidity_mean: Some(70.0),
                })
                .collect())
        }
    }

    fn request(locations: &[&str]) -> AnalysisRequest {
        AnalysisRequest {
            locations: locations.iter().map(|s| s.to_string()).collect(),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 1, 4).unwrap(),
            parameters: vec!["pm25".to_string(), "pm10".to_string()],
            author: "Tester".to_string(),
        }
    }

    fn workflow(fail_air_quality: bool) -> Workflow {
        Workflow::new(
            Arc::new(FakeGeocoder),
            Arc::new(FakeAirQuality {
                fail: fail_air_quality,
            }),
            Arc::new(FakeWeather),
        )
    }

    #[tokio::test]
    async fn test_run_builds_sections_and_comparison() {
        let report = workflow(false)
            .run(&request(&["Chennai, India", "Madras"]))
            .await;

        assert_eq!(report.locations.len(), 2);
        assert!(report.failed_locations.is_empty());
        assert_eq!(report.author, "Tester");

        let chennai = &report.locations[0];
        assert_eq!(chennai.name, "Chennai, India");
        assert_eq!(chennai.stations, 1);
        assert_eq!(chennai.daily.len(), 3);
        assert_eq!(chennai.pollutants[0].mean, 50.0);
        assert_eq!(chennai.weather.len(), 4);
        assert!(!chennai.correlations.is_empty());
        assert!(chennai.notes.iter().any(|n| n.contains("timed out")));
        assert!(chennai.notes.iter().any(|n| n.contains("No pm10 measurements")));

        assert_eq!(report.comparison.len(), 1);
        assert_eq!(report.comparison[0].ranking.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_location_is_reported_not_fatal() {
        let report = workflow(false)
            .run(&request(&["Atlantis", "Chennai, India"]))
            .await;

        assert_eq!(report.locations.len(), 1);
        assert_eq!(report.failed_locations.len(), 1);
        assert_eq!(report.failed_locations[0].name, "Atlantis");
        assert!(report.failed_locations[0].reason.contains("Bounding box not found"));
        assert!(report.comparison.is_empty());
    }

    #[tokio::test]
    async fn test_air_quality_failure_keeps_weather() {
        let report = workflow(true).run(&request(&["Chennai, India"])).await;

        let section = &report.locations[0];
        assert!(section.daily.is_empty());
        assert!(section.weather_summary.is_some());
        assert!(section.notes[0].starts_with("Air quality data unavailable"));
    }

    #[tokio::test]
    async fn test_weather_for() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let (location, days) = workflow(false)
            .weather_for("Chennai", start, start)
            .await
            .unwrap();
        assert_eq!(location.display_name, "Chennai (resolved)");
        assert_eq!(days.len(), 1);
    }

    #[test]
    fn test_failure_notes_are_capped() {
        let failures: Vec<String> = (0..5).map(|i| format!("file-{i}")).collect();
        let notes = failure_notes(&failures);
        assert_eq!(notes.len(), MAX_LISTED_FAILURES + 1);
        assert!(notes.last().unwrap().contains("2 more"));
    }
}
