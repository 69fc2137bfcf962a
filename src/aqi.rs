//! US EPA Air Quality Index for particulate matter
//!
//! Uses the breakpoints in effect since May 2024. Only `pm25` and `pm10` are
//! covered; daily means of other pollutants have no AQI here.

use serde::{Deserialize, Serialize};
use std::fmt;

/// AQI category with its EPA label
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AqiCategory {
    /// 0-50
    Good,
    /// 51-100
    Moderate,
    /// 101-150
    UnhealthyForSensitiveGroups,
    /// 151-200
    Unhealthy,
    /// 201-300
    VeryUnhealthy,
    /// 301-500
    Hazardous,
}

impl AqiCategory {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            AqiCategory::Good => "Good",
            AqiCategory::Moderate => "Moderate",
            AqiCategory::UnhealthyForSensitiveGroups => "Unhealthy for Sensitive Groups",
            AqiCategory::Unhealthy => "Unhealthy",
            AqiCategory::VeryUnhealthy => "Very Unhealthy",
            AqiCategory::Hazardous => "Hazardous",
        }
    }

    /// Short health guidance for the category
    #[must_use]
    pub fn health_message(self) -> &'static str {
        match self {
            AqiCategory::Good => "Air quality is satisfactory and poses little or no risk.",
            AqiCategory::Moderate => {
                "Acceptable, though unusually sensitive people should limit prolonged exertion outdoors."
            }
            AqiCategory::UnhealthyForSensitiveGroups => {
                "Children, older adults and people with heart or lung disease should reduce prolonged exertion outdoors."
            }
            AqiCategory::Unhealthy => {
                "Everyone may begin to experience health effects; sensitive groups should avoid exertion outdoors."
            }
            AqiCategory::VeryUnhealthy => {
                "Health alert: everyone should avoid prolonged exertion outdoors."
            }
            AqiCategory::Hazardous => "Emergency conditions: everyone should stay indoors.",
        }
    }

    fn from_index(index: u16) -> Self {
        match index {
            0..=50 => AqiCategory::Good,
            51..=100 => AqiCategory::Moderate,
            101..=150 => AqiCategory::UnhealthyForSensitiveGroups,
            151..=200 => AqiCategory::Unhealthy,
            201..=300 => AqiCategory::VeryUnhealthy,
            _ => AqiCategory::Hazardous,
        }
    }
}

impl fmt::Display for AqiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// An AQI value and its category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aqi {
    pub value: u16,
    pub category: AqiCategory,
}

/// `(c_low, c_high, i_low, i_high)`
type Breakpoint = (f64, f64, u16, u16);

const PM25_BREAKPOINTS: [Breakpoint; 6] = [
    (0.0, 9.0, 0, 50),
    (9.1, 35.4, 51, 100),
    (35.5, 55.4, 101, 150),
    (55.5, 125.4, 151, 200),
    (125.5, 225.4, 201, 300),
    (225.5, 325.4, 301, 500),
];

const PM10_BREAKPOINTS: [Breakpoint; 6] = [
    (0.0, 54.0, 0, 50),
    (55.0, 154.0, 51, 100),
    (155.0, 254.0, 101, 150),
    (255.0, 354.0, 151, 200),
    (355.0, 424.0, 201, 300),
    (425.0, 604.0, 301, 500),
];

fn interpolate(concentration: f64, table: &[Breakpoint]) -> Option<u16> {
    let (_, top, _, _) = *table.last()?;
    if concentration > top {
        return Some(500);
    }
    table
        .iter()
        .find(|(low, high, _, _)| concentration >= *low && concentration <= *high)
        .map(|&(c_low, c_high, i_low, i_high)| {
            let scaled = f64::from(i_high - i_low) / (c_high - c_low) * (concentration - c_low);
            (f64::from(i_low) + scaled).round() as u16
        })
}

/// US AQI of a concentration in µg/m³, `None` for unsupported parameters or
/// negative / non-finite input
#[must_use]
pub fn us_aqi(parameter: &str, concentration: f64) -> Option<Aqi> {
    if !concentration.is_finite() || concentration < 0.0 {
        return None;
    }
    let value = match parameter {
        // EPA truncates PM2.5 to one decimal, PM10 to an integer
        "pm25" => interpolate((concentration * 10.0).trunc() / 10.0, &PM25_BREAKPOINTS)?,
        "pm10" => interpolate(concentration.trunc(), &PM10_BREAKPOINTS)?,
        _ => return None,
    };
    Some(Aqi {
        value,
        category: AqiCategory::from_index(value),
    })
}
