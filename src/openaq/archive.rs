//! OpenAQ S3 archive access.
//!
//! The archive is a public bucket laid out as
//! `records/csv.gz/locationid={id}/year={YYYY}/month={MM}/location-{id}-{YYYYMMDD}.csv.gz`.
//! It is read anonymously over HTTPS: listings via S3 `ListObjectsV2` (XML),
//! objects via plain GET.

use crate::http;
use crate::models::Measurement;
use crate::request::normalize_parameter;
use crate::{AirAwareError, Result};
use chrono::{DateTime, Datelike, NaiveDate};
use flate2::read::GzDecoder;
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use std::io::Read;
use tracing::{debug, instrument};

/// S3 `ListObjectsV2` result, reduced to what we read
#[derive(Debug, Deserialize)]
struct ListBucketResult {
    #[serde(rename = "Contents", default)]
    contents: Vec<ObjectEntry>,
    #[serde(rename = "IsTruncated", default)]
    is_truncated: bool,
    #[serde(rename = "NextContinuationToken")]
    next_continuation_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectEntry {
    #[serde(rename = "Key")]
    key: String,
}

/// One CSV row of an archive file
#[derive(Debug, Deserialize)]
struct ArchiveRow {
    location_id: u64,
    sensors_id: u64,
    datetime: String,
    parameter: String,
    units: String,
    value: Option<f64>,
}

/// Key prefix holding all day files of a station for one month
#[must_use]
pub fn month_prefix(location_id: u64, year: i32, month: u32) -> String {
    format!("records/csv.gz/locationid={location_id}/year={year}/month={month:02}/")
}

/// Whether an archive key holds the records of `date`
#[must_use]
pub fn key_matches_date(key: &str, date: NaiveDate) -> bool {
    key.ends_with(&format!("{}.csv.gz", date.format("%Y%m%d")))
}

/// Distinct `(year, month)` pairs touched by `start..=end`, in order
#[must_use]
pub fn months_in_range(start: NaiveDate, end: NaiveDate) -> Vec<(i32, u32)> {
    let mut months: Vec<(i32, u32)> = Vec::new();
    for day in start.iter_days().take_while(|d| *d <= end) {
        let ym = (day.year(), day.month());
        if months.last() != Some(&ym) {
            months.push(ym);
        }
    }
    months
}

fn parse_listing(xml: &str) -> Result<ListBucketResult> {
    quick_xml::de::from_str(xml)
        .map_err(|e| AirAwareError::parse(format!("Invalid S3 listing: {e}")))
}

/// Decompress and parse one archive day file.
///
/// Rows with unparseable timestamps or empty values are skipped rather than
/// failing the whole file.
pub fn parse_archive_file(gz_bytes: &[u8]) -> Result<Vec<Measurement>> {
    let mut csv_text = String::new();
    GzDecoder::new(gz_bytes)
        .read_to_string(&mut csv_text)
        .map_err(|e| AirAwareError::parse(format!("Invalid gzip archive file: {e}")))?;

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(csv_text.as_bytes());

    let mut measurements = Vec::new();
    let mut skipped = 0_usize;
    for row in reader.deserialize::<ArchiveRow>() {
        let row = row.map_err(|e| AirAwareError::parse(format!("Invalid archive row: {e}")))?;
        let Some(value) = row.value else {
            skipped += 1;
            continue;
        };
        let Ok(datetime) = DateTime::parse_from_rfc3339(&row.datetime) else {
            skipped += 1;
            continue;
        };
        measurements.push(Measurement {
            location_id: row.location_id,
            sensor_id: row.sensors_id,
            datetime,
            parameter: normalize_parameter(&row.parameter),
            units: row.units,
            value,
        });
    }

    if skipped > 0 {
        debug!("Skipped {} incomplete archive rows", skipped);
    }
    Ok(measurements)
}

/// Anonymous reader for the OpenAQ archive bucket
pub struct ArchiveClient {
    client: ClientWithMiddleware,
    base_url: String,
}

impl ArchiveClient {
    #[must_use]
    pub fn new(client: ClientWithMiddleware, base_url: String) -> Self {
        Self { client, base_url }
    }

    /// All object keys below `prefix`, following continuation tokens
    #[instrument(skip(self))]
    pub async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let mut params = vec![
                ("list-type", "2".to_string()),
                ("prefix", prefix.to_string()),
            ];
            if let Some(token) = token.take() {
                params.push(("continuation-token", token));
            }
            let url = http::endpoint(&self.base_url, "", &params)?;

            let response = self.client.get(url).send().await?;
            let body = http::check_status(response, "OpenAQ archive").await?.text().await?;
            let listing = parse_listing(&body)?;

            keys.extend(listing.contents.into_iter().map(|entry| entry.key));
            match listing.next_continuation_token {
                Some(next) if listing.is_truncated => token = Some(next),
                _ => break,
            }
        }

        debug!("Found {} archive objects under {}", keys.len(), prefix);
        Ok(keys)
    }

    /// Download and parse one archive object
    #[instrument(skip(self))]
    pub async fn fetch_day(&self, key: &str) -> Result<Vec<Measurement>> {
        let url = http::endpoint(&self.base_url, key, &[])?;
        let response = self.client.get(url).send().await?;
        let bytes = http::check_status(response, "OpenAQ archive").await?.bytes().await?;
        parse_archive_file(&bytes)
    }
}
