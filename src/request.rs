//! Analysis request parsing and validation
//!
//! Turns raw CLI input (location names, optional dates, parameter names) into a
//! validated [`AnalysisRequest`].

use crate::config::DefaultsConfig;
use crate::{AirAwareError, Result};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Parameters OpenAQ publishes in its archive
pub const KNOWN_PARAMETERS: &[&str] = &[
    "pm1", "pm25", "pm10", "o3", "no2", "no", "nox", "so2", "co", "bc", "co2", "ch4",
];

/// A validated analysis request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub locations: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub parameters: Vec<String>,
    pub author: String,
}

/// Unvalidated input as it arrives from the command line
#[derive(Debug, Clone, Default)]
pub struct RawRequest {
    pub locations: Vec<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub parameters: Vec<String>,
    pub author: Option<String>,
}

/// Parse a `YYYY-MM-DD` date
pub fn parse_date(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d").map_err(|_| {
        AirAwareError::validation(format!(
            "Invalid date '{input}'. Please use YYYY-MM-DD."
        ))
    })
}

/// Normalize a parameter name: `"PM2.5"` -> `"pm25"`, `"pm_10"` -> `"pm10"`
#[must_use]
pub fn normalize_parameter(input: &str) -> String {
    input
        .chars()
        .filter(|c| !matches!(c, '.' | '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Resolve the analysis window.
///
/// Without a start date the window begins `lookback_days` before `today`;
/// without an end date it spans `window_days` after the start.
pub fn resolve_dates(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    today: NaiveDate,
    defaults: &DefaultsConfig,
) -> Result<(NaiveDate, NaiveDate)> {
    let start = match start {
        Some(start) => start,
        None => today
            .checked_sub_signed(Duration::days(i64::from(defaults.lookback_days)))
            .ok_or_else(|| {
                AirAwareError::validation(format!(
                    "Cannot look back {} days from {today}.",
                    defaults.lookback_days
                ))
            })?,
    };
    let end = match end {
        Some(end) => end,
        None => start
            .checked_add_signed(Duration::days(i64::from(defaults.window_days)))
            .ok_or_else(|| {
                AirAwareError::validation(format!(
                    "Cannot extend {start} by {} days.",
                    defaults.window_days
                ))
            })?,
    };
    Ok((start, end))
}

impl AnalysisRequest {
    /// Validate raw input against `defaults`, filling in whatever was omitted
    pub fn from_raw(raw: RawRequest, defaults: &DefaultsConfig, today: NaiveDate) -> Result<Self> {
        let locations: Vec<String> = if raw.locations.is_empty() {
            defaults.locations.clone()
        } else {
            raw.locations
        }
        .into_iter()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect();

        if locations.is_empty() {
            return Err(AirAwareError::validation(
                "At least one location must be specified.",
            ));
        }

        let raw_parameters = if raw.parameters.is_empty() {
            defaults.parameters.clone()
        } else {
            raw.parameters
        };
        let mut parameters: Vec<String> = Vec::new();
        for parameter in raw_parameters.iter().map(|p| normalize_parameter(p)) {
            if parameter.is_empty() || parameters.contains(&parameter) {
                continue;
            }
            if !KNOWN_PARAMETERS.contains(&parameter.as_str()) {
                warn!("Parameter '{parameter}' is not a known OpenAQ parameter, keeping it anyway");
            }
            parameters.push(parameter);
        }
        if parameters.is_empty() {
            return Err(AirAwareError::validation(
                "At least one air quality parameter must be specified.",
            ));
        }

        let start = raw.start_date.as_deref().map(parse_date).transpose()?;
        let end = raw.end_date.as_deref().map(parse_date).transpose()?;
        let (start_date, end_date) = resolve_dates(start, end, today, defaults)?;

        if start_date > end_date {
            return Err(AirAwareError::validation(format!(
                "Start date {start_date} cannot be after end date {end_date}."
            )));
        }

        let span_days = (end_date - start_date).num_days() + 1;
        if span_days > i64::from(defaults.max_range_days) {
            return Err(AirAwareError::validation(format!(
                "Date range covers {span_days} days; at most {} are allowed.",
                defaults.max_range_days
            )));
        }

        if end_date > today {
            warn!("End date {end_date} lies in the future; recent days will have no archive data");
        }

        let author = raw
            .author
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| defaults.author.clone());

        Ok(Self {
            locations,
            start_date,
            end_date,
            parameters,
            author,
        })
    }

    /// Every day in the window, inclusive
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start_date
            .iter_days()
            .take_while(move |d| *d <= self.end_date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn date(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    fn today() -> NaiveDate {
        date("2025-06-10")
    }

    #[rstest]
    #[case("PM2.5", "pm25")]
    #[case("pm_10", "pm10")]
    #[case("O3", "o3")]
    #[case(" no2 ", "no2")]
    fn test_normalize_parameter(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize_parameter(input), expected);
    }

    #[test]
    fn test_defaults_fill_everything() {
        let defaults = DefaultsConfig::default();
        let request = AnalysisRequest::from_raw(RawRequest::default(), &defaults, today()).unwrap();

        assert_eq!(request.locations, vec!["New Delhi, India", "Chennai, India"]);
        assert_eq!(request.parameters, vec!["pm25"]);
        assert_eq!(request.start_date, date("2025-04-11"));
        assert_eq!(request.end_date, date("2025-04-14"));
        assert_eq!(request.author, "AirAware");
    }

    #[test]
    fn test_end_defaults_to_start_plus_window() {
        let raw = RawRequest {
            locations: vec!["London, UK".to_string()],
            start_date: Some("2024-05-01".to_string()),
            parameters: vec!["PM2.5".to_string(), "pm25".to_string(), "O3".to_string()],
            author: Some("  Jane Doe ".to_string()),
            ..Default::default()
        };
        let request = AnalysisRequest::from_raw(raw, &DefaultsConfig::default(), today()).unwrap();

        assert_eq!(request.end_date, date("2024-05-04"));
        assert_eq!(request.parameters, vec!["pm25", "o3"]);
        assert_eq!(request.author, "Jane Doe");
        assert_eq!(request.dates().count(), 4);
    }

    #[test]
    fn test_single_day_window_is_allowed() {
        let raw = RawRequest {
            locations: vec!["Paris".to_string()],
            start_date: Some("2024-05-01".to_string()),
            end_date: Some("2024-05-01".to_string()),
            ..Default::default()
        };
        let request = AnalysisRequest::from_raw(raw, &DefaultsConfig::default(), today()).unwrap();
        assert_eq!(request.dates().collect::<Vec<_>>(), vec![date("2024-05-01")]);
    }

    #[test]
    fn test_start_after_end_is_rejected() {
        let raw = RawRequest {
            locations: vec!["Paris".to_string()],
            start_date: Some("2024-05-03".to_string()),
            end_date: Some("2024-05-01".to_string()),
            ..Default::default()
        };
        let err = AnalysisRequest::from_raw(raw, &DefaultsConfig::default(), today()).unwrap_err();
        assert!(err.to_string().contains("cannot be after"));
    }

    #[test]
    fn test_range_limit_boundary() {
        let raw = |end: &str| RawRequest {
            locations: vec!["Paris".to_string()],
            start_date: Some("2024-01-01".to_string()),
            end_date: Some(end.to_string()),
            ..Default::default()
        };
        let defaults = DefaultsConfig {
            max_range_days: 31,
            ..DefaultsConfig::default()
        };

        let request = AnalysisRequest::from_raw(raw("2024-01-31"), &defaults, today()).unwrap();
        assert_eq!(request.dates().count(), 31);

        let err = AnalysisRequest::from_raw(raw("2024-02-01"), &defaults, today()).unwrap_err();
        assert!(err.to_string().contains("covers 32 days"), "{err}");
    }

    #[test]
    fn test_oversized_defaults_are_rejected_not_panicking() {
        let defaults = DefaultsConfig {
            window_days: u32::MAX,
            ..DefaultsConfig::default()
        };
        let raw = RawRequest {
            locations: vec!["Paris".to_string()],
            start_date: Some("2024-05-01".to_string()),
            ..Default::default()
        };
        let err = AnalysisRequest::from_raw(raw, &defaults, today()).unwrap_err();
        assert!(matches!(err, AirAwareError::Validation { .. }));

        let defaults = DefaultsConfig {
            lookback_days: u32::MAX,
            ..DefaultsConfig::default()
        };
        let err = resolve_dates(None, None, today(), &defaults).unwrap_err();
        assert!(err.to_string().contains("Cannot look back"), "{err}");
    }

    #[test]
    fn test_range_limit() {
        let raw = RawRequest {
            locations: vec!["Paris".to_string()],
            start_date: Some("2024-01-01".to_string()),
            end_date: Some("2024-03-01".to_string()),
            ..Default::default()
        };
        let err = AnalysisRequest::from_raw(raw, &DefaultsConfig::default(), today()).unwrap_err();
        assert!(matches!(err, AirAwareError::Validation { .. }));
    }

    #[rstest]
    #[case(RawRequest { locations: vec!["  ".to_string()], ..Default::default() }, "location")]
    #[case(RawRequest { locations: vec!["Paris".to_string()], parameters: vec!["..".to_string()], ..Default::default() }, "parameter")]
    #[case(RawRequest { locations: vec!["Paris".to_string()], start_date: Some("01/05/2024".to_string()), ..Default::default() }, "YYYY-MM-DD")]
    fn test_invalid_input(#[case] raw: RawRequest, #[case] needle: &str) {
        let err = AnalysisRequest::from_raw(raw, &DefaultsConfig::default(), today()).unwrap_err();
        assert!(err.to_string().contains(needle), "{err}");
    }
}
