//! OpenAQ integration
//!
//! Station discovery uses the OpenAQ v3 REST API (API key required); the
//! measurements themselves come from the public S3 archive, see [`archive`].

pub mod archive;

use crate::cache::{self, PersistentCache};
use crate::config::OpenAqConfig;
use crate::http;
use crate::models::{BoundingBox, Measurement, OpenAqLocation};
use crate::Result;
use archive::{ArchiveClient, key_matches_date, month_prefix, months_in_range};
use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

const STATIONS_TTL: Duration = Duration::from_secs(24 * 60 * 60);
const LISTING_TTL: Duration = Duration::from_secs(24 * 60 * 60);
const DAY_FILE_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

#[derive(Debug, Deserialize)]
struct LocationsResponse {
    #[serde(default)]
    results: Vec<LocationResult>,
}

#[derive(Debug, Deserialize)]
struct LocationResult {
    id: u64,
    #[serde(default)]
    name: Option<String>,
}

/// Everything fetched for one bounding box
#[derive(Debug, Clone, Default)]
pub struct ArchiveFetch {
    pub stations: Vec<OpenAqLocation>,
    pub measurements: Vec<Measurement>,
    /// Human readable descriptions of station-days that could not be read
    pub failures: Vec<String>,
}

/// OpenAQ API + archive client
pub struct OpenAqClient {
    client: ClientWithMiddleware,
    archive: ArchiveClient,
    config: OpenAqConfig,
    cache: Option<Arc<PersistentCache>>,
}

impl OpenAqClient {
    #[must_use]
    pub fn new(
        client: ClientWithMiddleware,
        config: OpenAqConfig,
        cache: Option<Arc<PersistentCache>>,
    ) -> Self {
        let archive = ArchiveClient::new(client.clone(), config.archive_url.clone());
        Self {
            client,
            archive,
            config,
            cache,
        }
    }

    /// Monitoring stations inside a bounding box
    #[instrument(skip(self, bbox), fields(bbox = %bbox))]
    pub async fn stations_in(&self, bbox: &BoundingBox) -> Result<Vec<OpenAqLocation>> {
        let bbox_param = bbox.to_openaq_param();
        let key = format!("openaq:stations:{bbox_param}:{}", self.config.location_limit);
        cache::get_or_fetch(self.cache.as_deref(), &key, STATIONS_TTL, || {
            self.fetch_stations(bbox_param.clone())
        })
        .await
    }

    async fn fetch_stations(&self, bbox_param: String) -> Result<Vec<OpenAqLocation>> {
        let api_key = self.config.require_api_key()?;
        let url = http::endpoint(
            &self.config.base_url,
            "v3/locations",
            &[
                ("bbox", bbox_param),
                ("limit", self.config.location_limit.to_string()),
                ("page", "1".to_string()),
                ("order_by", "id".to_string()),
                ("sort_order", "asc".to_string()),
            ],
        )?;

        let response: LocationsResponse =
            http::get_json(&self.client, url, &[("X-API-Key", api_key)], "OpenAQ").await?;

        Ok(response
            .results
            .into_iter()
            .map(|r| OpenAqLocation {
                id: r.id,
                name: r.name.unwrap_or_else(|| format!("location-{}", r.id)),
            })
            .collect())
    }

    async fn month_keys(&self, location_id: u64, year: i32, month: u32) -> Result<Vec<String>> {
        let prefix = month_prefix(location_id, year, month);
        let key = format!("openaq:listing:{prefix}");
        cache::get_or_fetch(self.cache.as_deref(), &key, LISTING_TTL, || {
            self.archive.list_keys(&prefix)
        })
        .await
    }

    async fn day_file(&self, object_key: &str) -> Result<Vec<Measurement>> {
        let key = format!("openaq:day:{object_key}");
        cache::get_or_fetch(self.cache.as_deref(), &key, DAY_FILE_TTL, || {
            self.archive.fetch_day(object_key)
        })
        .await
    }

    async fn tagged_listing(
        &self,
        location_id: u64,
        year: i32,
        month: u32,
    ) -> (u64, Result<Vec<String>>) {
        (location_id, self.month_keys(location_id, year, month).await)
    }

    async fn tagged_download(&self, object_key: String) -> (String, Result<Vec<Measurement>>) {
        let result = self.day_file(&object_key).await;
        (object_key, result)
    }

    /// Archive day files of every station in `bbox` for `start..=end`.
    ///
    /// Station discovery failing is an error. Individual listings or day files
    /// failing are recorded in [`ArchiveFetch::failures`] and skipped.
    #[instrument(skip(self, bbox), fields(bbox = %bbox))]
    pub async fn measurements(
        &self,
        bbox: &BoundingBox,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<ArchiveFetch> {
        let start_time = Instant::now();
        let stations = self.stations_in(bbox).await?;
        info!("Found {} OpenAQ stations in {}", stations.len(), bbox);

        let mut fetch = ArchiveFetch {
            stations,
            ..ArchiveFetch::default()
        };
        if fetch.stations.is_empty() {
            return Ok(fetch);
        }

        let concurrency = self.config.max_concurrent_downloads.max(1);
        let months = months_in_range(start, end);

        let listing_jobs: Vec<_> = fetch
            .stations
            .iter()
            .flat_map(|s| months.iter().map(move |&(y, m)| (s.id, y, m)))
            .map(|(id, year, month)| self.tagged_listing(id, year, month))
            .collect();
        let listings: Vec<(u64, Result<Vec<String>>)> = stream::iter(listing_jobs)
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut wanted: Vec<String> = Vec::new();
        for (id, listing) in listings {
            match listing {
                Ok(keys) => wanted.extend(keys.into_iter().filter(|key| {
                    start
                        .iter_days()
                        .take_while(|d| *d <= end)
                        .any(|d| key_matches_date(key, d))
                })),
                Err(err) => {
                    warn!("Listing archive for location {} failed: {}", id, err);
                    fetch.failures.push(format!("location {id}: {err}"));
                }
            }
        }
        wanted.sort();
        debug!("Downloading {} archive day files", wanted.len());

        let download_jobs: Vec<_> = wanted
            .into_iter()
            .map(|key| self.tagged_download(key))
            .collect();
        let downloads: Vec<(String, Result<Vec<Measurement>>)> = stream::iter(download_jobs)
            .buffer_unordered(concurrency)
            .collect()
            .await;

        for (key, result) in downloads {
            match result {
                Ok(measurements) => fetch.measurements.extend(measurements),
                Err(err) => {
                    warn!("Archive file {} failed: {}", key, err);
                    fetch.failures.push(format!("{key}: {err}"));
                }
            }
        }

        let with_data: std::collections::BTreeSet<u64> =
            fetch.measurements.iter().map(|m| m.location_id).collect();
        let silent: Vec<u64> = fetch
            .stations
            .iter()
            .map(|s| s.id)
            .filter(|id| !with_data.contains(id))
            .collect();
        if !silent.is_empty() {
            info!("Locations with no data or errors: {:?}", silent);
        }

        info!(
            "Read {} measurements from {} stations in {:.3}s",
            fetch.measurements.len(),
            with_data.len(),
            start_time.elapsed().as_secs_f64()
        );
        Ok(fetch)
    }
}
