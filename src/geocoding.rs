//! Bounding box extraction via Nominatim (OpenStreetMap)

use crate::cache::{self, PersistentCache};
use crate::config::GeocodingConfig;
use crate::http::{self, RateLimiter};
use crate::models::{BoundingBox, Location};
use crate::{AirAwareError, Result};
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

const GEOCODE_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// One hit of the Nominatim `/search` endpoint
#[derive(Debug, Deserialize)]
struct NominatimPlace {
    /// Nominatim sends coordinates as strings
    lat: String,
    lon: String,
    display_name: String,
    /// `[south, north, west, east]`, also as strings
    boundingbox: Vec<String>,
}

impl NominatimPlace {
    fn into_location(self, query: &str, expansion_km: f64) -> Result<Location> {
        let latitude = self
            .lat
            .parse::<f64>()
            .map_err(|_| AirAwareError::parse(format!("Invalid latitude: {}", self.lat)))?;
        let longitude = self
            .lon
            .parse::<f64>()
            .map_err(|_| AirAwareError::parse(format!("Invalid longitude: {}", self.lon)))?;
        let raw_box = BoundingBox::from_nominatim(&self.boundingbox)?;

        Ok(Location {
            query: query.to_string(),
            display_name: self.display_name,
            latitude,
            longitude,
            bounding_box: raw_box.expand(expansion_km),
        })
    }
}

/// Nominatim search client
pub struct NominatimClient {
    client: ClientWithMiddleware,
    config: GeocodingConfig,
    cache: Option<Arc<PersistentCache>>,
    limiter: RateLimiter,
}

impl NominatimClient {
    #[must_use]
    pub fn new(
        client: ClientWithMiddleware,
        config: GeocodingConfig,
        cache: Option<Arc<PersistentCache>>,
    ) -> Self {
        let limiter = RateLimiter::new(Duration::from_millis(config.min_request_interval_ms));
        Self {
            client,
            config,
            cache,
            limiter,
        }
    }

    /// Resolve a place name to a location with an expanded bounding box
    #[instrument(skip(self))]
    pub async fn locate(&self, name: &str) -> Result<Location> {
        let key = format!(
            "geocode:{}:{}",
            self.config.expansion_km,
            name.trim().to_lowercase()
        );
        cache::get_or_fetch(self.cache.as_deref(), &key, GEOCODE_TTL, || self.fetch(name)).await
    }

    async fn fetch(&self, name: &str) -> Result<Location> {
        let start_time = Instant::now();
        let url = http::endpoint(
            &self.config.base_url,
            "search",
            &[
                ("q", name.to_string()),
                ("format", "json".to_string()),
                ("addressdetails", "1".to_string()),
                ("limit", "1".to_string()),
            ],
        )?;
        debug!("Nominatim request URL: {}", url);

        self.limiter.acquire().await;

        let places: Vec<NominatimPlace> = http::get_json(&self.client, url, &[], "Nominatim").await?;

        let Some(place) = places.into_iter().next() else {
            warn!("No results found for location '{}'", name);
            return Err(AirAwareError::not_found(format!(
                "Bounding box not found for location: {name}"
            )));
        };

        let location = place.into_location(name, self.config.expansion_km)?;
        info!(
            "Located '{}' as {} in {:.3}s, search area {}",
            name,
            location.display_name,
            start_time.elapsed().as_secs_f64(),
            location.bounding_box
        );
        Ok(location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELHI: &str = r#"[{
        "place_id": 235925744,
        "lat": "28.6138954",
        "lon": "77.2090057",
        "display_name": "New Delhi, Delhi, India",
        "boundingbox": ["28.4538954", "28.7738954", "77.0490057", "77.3690057"],
        "address": {"city": "New Delhi", "country": "India"}
    }]"#;

    #[test]
    fn test_parse_place_and_expand() {
        let places: Vec<NominatimPlace> = serde_json::from_str(DELHI).unwrap();
        let place = places.into_iter().next().unwrap();
        let location = place.into_location("New Delhi, India", 0.0).unwrap();

        assert_eq!(location.display_name, "New Delhi, Delhi, India");
        assert_eq!(location.latitude, 28.6138954);
        assert_eq!(location.bounding_box.south, 28.4538954);
        assert_eq!(location.bounding_box.north, 28.7738954);
        assert_eq!(location.bounding_box.west, 77.0490057);
        assert_eq!(location.bounding_box.east, 77.3690057);
    }

    #[test]
    fn test_expansion_is_applied() {
        let places: Vec<NominatimPlace> = serde_json::from_str(DELHI).unwrap();
        let place = places.into_iter().next().unwrap();
        let location = place.into_location("New Delhi, India", 15.0).unwrap();

        let lat_offset = 15.0 / 111.0;
        assert!((location.bounding_box.south - (28.4538954 - lat_offset)).abs() < 1e-9);
        assert!(location.bounding_box.west < 77.0490057 - lat_offset);
    }

    #[tokio::test]
    async fn test_concurrent_lookups_are_spaced_out() {
        use crate::config::HttpConfig;
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_string(DELHI))
            .expect(3)
            .mount(&server)
            .await;

        let client = http::build_client(&HttpConfig::default()).unwrap();
        let geocoder = NominatimClient::new(
            client,
            GeocodingConfig {
                base_url: server.uri(),
                expansion_km: 0.0,
                min_request_interval_ms: 100,
            },
            None,
        );

        let started = Instant::now();
        let results = futures::future::join_all(
            ["Delhi", "Chennai", "Mumbai"].map(|name| geocoder.locate(name)),
        )
        .await;

        assert!(results.iter().all(|r| r.is_ok()));
        assert!(started.elapsed() >= Duration::from_millis(200));
    }

    #[test]
    fn test_bad_coordinates_are_parse_errors() {
        let place = NominatimPlace {
            lat: "north-ish".to_string(),
            lon: "0".to_string(),
            display_name: "Nowhere".to_string(),
            boundingbox: vec!["0".into(), "1".into(), "0".into(), "1".into()],
        };
        assert!(matches!(
            place.into_location("Nowhere", 15.0),
            Err(AirAwareError::Parse { .. })
        ));
    }
}
