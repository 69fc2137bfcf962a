//! Air quality measurement models

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

/// A monitoring station returned by the OpenAQ locations endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAqLocation {
    pub id: u64,
    pub name: String,
}

/// One raw reading from the OpenAQ archive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub location_id: u64,
    pub sensor_id: u64,
    /// Local station time, offset preserved
    pub datetime: DateTime<FixedOffset>,
    /// Normalized parameter name, e.g. `pm25`
    pub parameter: String,
    /// Unit string as published, e.g. `µg/m³`
    pub units: String,
    pub value: f64,
}

impl Measurement {
    /// Calendar day in the station's own timezone
    #[must_use]
    pub fn local_date(&self) -> NaiveDate {
        self.datetime.date_naive()
    }
}

/// Daily mean of one parameter at one location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPollutant {
    pub date: NaiveDate,
    pub parameter: String,
    pub units: String,
    pub value: f64,
    pub location: String,
}
