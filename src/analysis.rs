//! Analysis engine
//!
//! Turns raw archive measurements and daily weather into the figures a report
//! is built from: daily means, per-parameter summaries with a trend and AQI,
//! weather summaries, pollution/weather correlations and a cross-location
//! ranking.

use crate::aqi::{Aqi, us_aqi};
use crate::models::{DailyPollutant, DailyWeather, Measurement, WeatherVariable};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Relative change over the window above which a series counts as trending
const TREND_THRESHOLD: f64 = 0.10;
/// Fewer paired days than this give no correlation
const MIN_CORRELATION_PAIRS: usize = 3;

/// Arithmetic mean, `None` for an empty slice
#[must_use]
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Daily means per parameter at one location.
///
/// Negative and non-finite readings are dropped. An empty `parameters` slice
/// keeps every parameter. Output is sorted by parameter, then date.
#[must_use]
pub fn aggregate_daily(
    measurements: &[Measurement],
    parameters: &[String],
    location: &str,
) -> Vec<DailyPollutant> {
    // (parameter, date) -> (units, values)
    let mut groups: BTreeMap<(String, NaiveDate), (String, Vec<f64>)> = BTreeMap::new();

    for m in measurements {
        if !parameters.is_empty() && !parameters.contains(&m.parameter) {
            continue;
        }
        if !m.value.is_finite() || m.value < 0.0 {
            continue;
        }
        groups
            .entry((m.parameter.clone(), m.local_date()))
            .or_insert_with(|| (m.units.clone(), Vec::new()))
            .1
            .push(m.value);
    }

    groups
        .into_iter()
        .filter_map(|((parameter, date), (units, values))| {
            Some(DailyPollutant {
                date,
                parameter,
                units,
                value: mean(&values)?,
                location: location.to_string(),
            })
        })
        .collect()
}

/// Direction of a daily series over the analysis window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Rising,
    Falling,
    Stable,
    /// Fewer than two days of data
    Insufficient,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Trend::Rising => "rising",
            Trend::Falling => "falling",
            Trend::Stable => "stable",
            Trend::Insufficient => "insufficient data",
        };
        f.write_str(text)
    }
}

/// Least-squares slope per day, with x measured in days from the first point
fn slope(series: &[DatedValue]) -> Option<f64> {
    let first = series.first()?.date;
    if series.len() < 2 {
        return None;
    }
    let xs: Vec<f64> = series
        .iter()
        .map(|p| (p.date - first).num_days() as f64)
        .collect();
    let x_mean = mean(&xs)?;
    let y_mean = mean(&series.iter().map(|p| p.value).collect::<Vec<_>>())?;
    let (mut num, mut den) = (0.0, 0.0);
    for (x, point) in xs.iter().zip(series) {
        let dx = x - x_mean;
        num += dx * (point.value - y_mean);
        den += dx * dx;
    }
    (den > 0.0).then(|| num / den)
}

/// Fitted change from the first to the last date, relative to the mean
#[must_use]
pub fn relative_change(series: &[DatedValue]) -> Option<f64> {
    let slope = slope(series)?;
    let avg = mean(&series.iter().map(|p| p.value).collect::<Vec<_>>())?;
    if avg.abs() < f64::EPSILON {
        return Some(0.0);
    }
    let span = (series.last()?.date - series.first()?.date).num_days() as f64;
    Some(slope * span / avg)
}

/// Classify a chronologically ordered series
#[must_use]
pub fn trend(series: &[DatedValue]) -> Trend {
    match relative_change(series) {
        None => Trend::Insufficient,
        Some(change) if change > TREND_THRESHOLD => Trend::Rising,
        Some(change) if change < -TREND_THRESHOLD => Trend::Falling,
        Some(_) => Trend::Stable,
    }
}

/// A dated extreme of a daily series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DatedValue {
    pub date: NaiveDate,
    pub value: f64,
}

/// Summary of one parameter at one location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSummary {
    pub parameter: String,
    pub units: String,
    pub days: usize,
    pub mean: f64,
    pub min: DatedValue,
    pub max: DatedValue,
    pub trend: Trend,
    /// Fitted change over the window in percent of the mean
    pub change_percent: Option<f64>,
    /// AQI of the period mean, PM only
    pub aqi: Option<Aqi>,
}

/// Summaries for every parameter present in `daily`, ordered by parameter
#[must_use]
pub fn summarize_pollutants(daily: &[DailyPollutant]) -> Vec<ParameterSummary> {
    let mut by_parameter: BTreeMap<&str, Vec<&DailyPollutant>> = BTreeMap::new();
    for day in daily {
        by_parameter.entry(&day.parameter).or_default().push(day);
    }

    by_parameter
        .into_iter()
        .filter_map(|(parameter, mut days)| {
            days.sort_by_key(|d| d.date);
            let values: Vec<f64> = days.iter().map(|d| d.value).collect();
            let series: Vec<DatedValue> = days
                .iter()
                .map(|d| DatedValue {
                    date: d.date,
                    value: d.value,
                })
                .collect();
            let avg = mean(&values)?;
            let min = days.iter().min_by(|a, b| a.value.total_cmp(&b.value))?;
            let max = days.iter().max_by(|a, b| a.value.total_cmp(&b.value))?;

            Some(ParameterSummary {
                parameter: parameter.to_string(),
                units: days[0].units.clone(),
                days: days.len(),
                mean: avg,
                min: DatedValue {
                    date: min.date,
                    value: min.value,
                },
                max: DatedValue {
                    date: max.date,
                    value: max.value,
                },
                trend: trend(&series),
                change_percent: relative_change(&series).map(|c| c * 100.0),
                aqi: us_aqi(parameter, avg),
            })
        })
        .collect()
}

/// Weather over the analysis window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSummary {
    pub days: usize,
    pub mean_temperature: Option<f64>,
    pub max_temperature: Option<f64>,
    pub min_temperature: Option<f64>,
    pub total_precipitation: Option<f64>,
    pub mean_wind_speed: Option<f64>,
    pub mean_humidity: Option<f64>,
    pub temperature_trend: Trend,
}

fn column(days: &[DailyWeather], pick: impl Fn(&DailyWeather) -> Option<f64>) -> Vec<f64> {
    days.iter().filter_map(pick).collect()
}

/// `None` when there are no days at all
#[must_use]
pub fn summarize_weather(days: &[DailyWeather]) -> Option<WeatherSummary> {
    if days.is_empty() {
        return None;
    }
    let temperatures = column(days, |d| d.temperature_mean);
    let temperature_series: Vec<DatedValue> = days
        .iter()
        .filter_map(|d| {
            d.temperature_mean
                .map(|value| DatedValue { date: d.date, value })
        })
        .collect();
    let precipitation = column(days, |d| d.precipitation_sum);

    Some(WeatherSummary {
        days: days.len(),
        mean_temperature: mean(&temperatures),
        max_temperature: column(days, |d| d.temperature_max)
            .into_iter()
            .reduce(f64::max),
        min_temperature: column(days, |d| d.temperature_min)
            .into_iter()
            .reduce(f64::min),
        total_precipitation: (!precipitation.is_empty()).then(|| precipitation.iter().sum()),
        mean_wind_speed: mean(&column(days, |d| d.wind_speed_mean)),
        mean_humidity: mean(&column(days, |d| d.relative_humidity_mean)),
        temperature_trend: trend(&temperature_series),
    })
}

/// Pearson correlation coefficient.
///
/// `None` for mismatched lengths, fewer than three pairs, or a constant series.
#[must_use]
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < MIN_CORRELATION_PAIRS {
        return None;
    }
    let x_mean = mean(xs)?;
    let y_mean = mean(ys)?;
    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        let (dx, dy) = (x - x_mean, y - y_mean);
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x <= f64::EPSILON || var_y <= f64::EPSILON {
        return None;
    }
    Some((cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CorrelationStrength {
    Strong,
    Moderate,
    Weak,
}

impl CorrelationStrength {
    #[must_use]
    pub fn from_coefficient(r: f64) -> Self {
        match r.abs() {
            a if a >= 0.7 => CorrelationStrength::Strong,
            a if a >= 0.4 => CorrelationStrength::Moderate,
            _ => CorrelationStrength::Weak,
        }
    }
}

impl fmt::Display for CorrelationStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            CorrelationStrength::Strong => "strong",
            CorrelationStrength::Moderate => "moderate",
            CorrelationStrength::Weak => "weak",
        };
        f.write_str(text)
    }
}

/// Correlation between one pollutant and one weather variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correlation {
    pub parameter: String,
    pub variable: WeatherVariable,
    pub coefficient: f64,
    pub pairs: usize,
    pub strength: CorrelationStrength,
}

impl Correlation {
    /// One sentence for the report
    #[must_use]
    pub fn describe(&self) -> String {
        let direction = if self.coefficient >= 0.0 {
            "positive"
        } else {
            "negative"
        };
        format!(
            "{} {} correlation between {} and {} (r = {:.2} over {} days)",
            capitalize(&self.strength.to_string()),
            direction,
            self.parameter,
            self.variable.label(),
            self.coefficient,
            self.pairs
        )
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Correlate every pollutant with every weather variable over their shared days.
///
/// Pairs without enough data are omitted. Output is ordered by parameter, then
/// by descending `|r|`.
#[must_use]
pub fn correlate(daily: &[DailyPollutant], weather: &[DailyWeather]) -> Vec<Correlation> {
    let weather_by_date: HashMap<NaiveDate, &DailyWeather> =
        weather.iter().map(|w| (w.date, w)).collect();

    let mut by_parameter: BTreeMap<&str, Vec<&DailyPollutant>> = BTreeMap::new();
    for day in daily {
        by_parameter.entry(&day.parameter).or_default().push(day);
    }

    let mut correlations = Vec::new();
    for (parameter, days) in by_parameter {
        let mut found: Vec<Correlation> = WeatherVariable::ALL
            .iter()
            .filter_map(|&variable| {
                let (xs, ys): (Vec<f64>, Vec<f64>) = days
                    .iter()
                    .filter_map(|d| {
                        let w = weather_by_date.get(&d.date)?.value(variable)?;
                        Some((d.value, w))
                    })
                    .unzip();
                let coefficient = pearson(&xs, &ys)?;
                Some(Correlation {
                    parameter: parameter.to_string(),
                    variable,
                    coefficient,
                    pairs: xs.len(),
                    strength: CorrelationStrength::from_coefficient(coefficient),
                })
            })
            .collect();
        found.sort_by(|a, b| b.coefficient.abs().total_cmp(&a.coefficient.abs()));
        correlations.extend(found);
    }
    correlations
}

/// One location's standing for a parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedLocation {
    pub location: String,
    pub mean: f64,
    pub aqi: Option<Aqi>,
}

/// Locations ranked by their period mean of one parameter, cleanest first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterComparison {
    pub parameter: String,
    pub units: String,
    pub ranking: Vec<RankedLocation>,
}

/// Compare locations parameter by parameter.
///
/// Only parameters measured at two or more locations are compared.
#[must_use]
pub fn compare_locations(locations: &[(String, Vec<ParameterSummary>)]) -> Vec<ParameterComparison> {
    let mut by_parameter: BTreeMap<&str, (String, Vec<RankedLocation>)> = BTreeMap::new();
    for (location, summaries) in locations {
        for summary in summaries {
            by_parameter
                .entry(&summary.parameter)
                .or_insert_with(|| (summary.units.clone(), Vec::new()))
                .1
                .push(RankedLocation {
                    location: location.clone(),
                    mean: summary.mean,
                    aqi: summary.aqi,
                });
        }
    }

    by_parameter
        .into_iter()
        .filter(|(_, (_, ranking))| ranking.len() >= 2)
        .map(|(parameter, (units, mut ranking))| {
            ranking.sort_by(|a, b| a.mean.total_cmp(&b.mean));
            ParameterComparison {
                parameter: parameter.to_string(),
                units,
                ranking,
            }
        })
        .collect()
}
