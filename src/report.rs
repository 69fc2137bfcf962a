//! Report model and rendering (Markdown and JSON)

use crate::analysis::{
    Correlation, CorrelationStrength, ParameterComparison, ParameterSummary, Trend, WeatherSummary,
};
use crate::models::{DailyPollutant, DailyWeather, Location};
use crate::request::AnalysisRequest;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Everything known about one location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationReport {
    /// Name as requested
    pub name: String,
    pub location: Location,
    /// Monitoring stations found in the search area
    pub stations: usize,
    pub daily: Vec<DailyPollutant>,
    pub pollutants: Vec<ParameterSummary>,
    pub weather: Vec<DailyWeather>,
    pub weather_summary: Option<WeatherSummary>,
    pub correlations: Vec<Correlation>,
    /// Partial failures and data gaps
    pub notes: Vec<String>,
}

/// A location the pipeline could not process at all
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedLocation {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub title: String,
    pub author: String,
    pub generated_at: DateTime<Utc>,
    pub request: AnalysisRequest,
    pub locations: Vec<LocationReport>,
    pub failed_locations: Vec<FailedLocation>,
    pub comparison: Vec<ParameterComparison>,
}

/// Display name of a normalized parameter
#[must_use]
pub fn display_parameter(parameter: &str) -> String {
    match parameter {
        "pm25" => "PM2.5".to_string(),
        "pm10" => "PM10".to_string(),
        "pm1" => "PM1".to_string(),
        other => other.to_uppercase(),
    }
}

fn or_na(value: Option<f64>, unit: &str) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| format!("{v:.1}{unit}"))
}

fn trend_phrase(summary: &ParameterSummary) -> String {
    match (summary.trend, summary.change_percent) {
        (Trend::Insufficient, _) | (_, None) => "too few days to tell a trend".to_string(),
        (trend, Some(change)) => format!("{trend} ({change:+.1}% over the period)"),
    }
}

impl Report {
    /// Render as Markdown
    #[must_use]
    pub fn to_markdown(&self) -> String {
        Markdown(self).to_string()
    }

    /// Render as pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// One headline per location, failed ones included
    #[must_use]
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .locations
            .iter()
            .map(|section| {
                if section.pollutants.is_empty() {
                    return format!("**{}**: no air quality data for this period.", section.name);
                }
                let parts: Vec<String> = section
                    .pollutants
                    .iter()
                    .map(|p| {
                        let aqi = p.aqi.map_or_else(String::new, |aqi| {
                            format!(" (AQI {}, {})", aqi.value, aqi.category)
                        });
                        format!(
                            "{} averaged {:.2} {}{}, {}",
                            display_parameter(&p.parameter),
                            p.mean,
                            p.units,
                            aqi,
                            p.trend
                        )
                    })
                    .collect();
                format!("**{}**: {}.", section.name, parts.join("; "))
            })
            .collect();

        lines.extend(
            self.failed_locations
                .iter()
                .map(|f| format!("**{}**: could not be analysed ({}).", f.name, f.reason)),
        );
        lines
    }

    /// Closing observations drawn from the comparison and correlations
    #[must_use]
    pub fn conclusion_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();

        for comparison in &self.comparison {
            if let (Some(cleanest), Some(worst)) =
                (comparison.ranking.first(), comparison.ranking.last())
            {
                lines.push(format!(
                    "{} was highest in {} ({:.2} {}) and lowest in {} ({:.2} {}).",
                    display_parameter(&comparison.parameter),
                    worst.location,
                    worst.mean,
                    comparison.units,
                    cleanest.location,
                    cleanest.mean,
                    comparison.units
                ));
            }
        }

        for section in &self.locations {
            let worst_parameter = section
                .pollutants
                .iter()
                .filter_map(|p| p.aqi.map(|aqi| (p, aqi)))
                .max_by_key(|(_, aqi)| aqi.value);
            if let Some((summary, aqi)) = worst_parameter {
                lines.push(format!(
                    "In {}, average {} air quality was \"{}\". {}",
                    section.name,
                    display_parameter(&summary.parameter),
                    aqi.category,
                    aqi.category.health_message()
                ));
            }
            if let Some(strongest) = section
                .correlations
                .iter()
                .find(|c| c.strength != CorrelationStrength::Weak)
            {
                lines.push(format!(
                    "In {}, {}.",
                    section.name,
                    lowercase_first(&strongest.describe())
                ));
            }
        }

        if lines.is_empty() {
            lines.push(
                "Not enough air quality data was available to draw conclusions for this period."
                    .to_string(),
            );
        }
        lines
    }
}

fn lowercase_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

struct Markdown<'a>(&'a Report);

impl Markdown<'_> {
    fn write_location(&self, f: &mut fmt::Formatter<'_>, section: &LocationReport) -> fmt::Result {
        writeln!(f, "## {}", section.name)?;
        writeln!(f)?;
        writeln!(f, "- Resolved as: {}", section.location.display_name)?;
        writeln!(f, "- Coordinates: {}", section.location.format_coordinates())?;
        writeln!(f, "- Search area: {}", section.location.bounding_box)?;
        writeln!(f, "- Monitoring stations: {}", section.stations)?;
        writeln!(f)?;

        writeln!(f, "### Air quality")?;
        writeln!(f)?;
        if section.daily.is_empty() {
            writeln!(f, "No air quality measurements available.")?;
            writeln!(f)?;
        } else {
            writeln!(f, "| Date | Parameter | Daily mean | AQI |")?;
            writeln!(f, "|------|-----------|-----------:|-----|")?;
            for day in &section.daily {
                let aqi = crate::aqi::us_aqi(&day.parameter, day.value)
                    .map_or_else(|| "-".to_string(), |a| format!("{} ({})", a.value, a.category));
                writeln!(
                    f,
                    "| {} | {} | {:.2} {} | {} |",
                    day.date,
                    display_parameter(&day.parameter),
                    day.value,
                    day.units,
                    aqi
                )?;
            }
            writeln!(f)?;

            for summary in &section.pollutants {
                writeln!(f, "**{}**", display_parameter(&summary.parameter))?;
                writeln!(f)?;
                writeln!(
                    f,
                    "- Average: {:.2} {} over {} day(s)",
                    summary.mean, summary.units, summary.days
                )?;
                if let Some(aqi) = summary.aqi {
                    writeln!(
                        f,
                        "- AQI of the average: {} ({}). {}",
                        aqi.value,
                        aqi.category,
                        aqi.category.health_message()
                    )?;
                }
                writeln!(
                    f,
                    "- Lowest: {:.2} on {}, highest: {:.2} on {}",
                    summary.min.value, summary.min.date, summary.max.value, summary.max.date
                )?;
                writeln!(f, "- Trend: {}", trend_phrase(summary))?;
                writeln!(f)?;
            }
        }

        writeln!(f, "### Weather")?;
        writeln!(f)?;
        if section.weather.is_empty() {
            writeln!(f, "No weather data available.")?;
            writeln!(f)?;
        } else {
            writeln!(f, "| Date | Temperature | Precipitation | Wind | Humidity |")?;
            writeln!(f, "|------|-------------|---------------|------|----------|")?;
            for day in &section.weather {
                writeln!(
                    f,
                    "| {} | {} | {} | {} | {} |",
                    day.date,
                    day.format_temperature(),
                    day.format_precipitation(),
                    day.format_wind(),
                    day.format_humidity()
                )?;
            }
            writeln!(f)?;
        }
        if let Some(summary) = &section.weather_summary {
            writeln!(
                f,
                "- Mean temperature: {} (range {} to {}), {}",
                or_na(summary.mean_temperature, "°C"),
                or_na(summary.min_temperature, "°C"),
                or_na(summary.max_temperature, "°C"),
                summary.temperature_trend
            )?;
            writeln!(
                f,
                "- Total precipitation: {}",
                or_na(summary.total_precipitation, " mm")
            )?;
            writeln!(f, "- Mean wind speed: {}", or_na(summary.mean_wind_speed, " km/h"))?;
            writeln!(f, "- Mean humidity: {}", or_na(summary.mean_humidity, "%"))?;
            writeln!(f)?;
        }

        if !section.correlations.is_empty() {
            writeln!(f, "### Weather influence")?;
            writeln!(f)?;
            for correlation in &section.correlations {
                writeln!(f, "- {}", correlation.describe())?;
            }
            writeln!(f)?;
        }

        if !section.notes.is_empty() {
            writeln!(f, "### Notes")?;
            writeln!(f)?;
            for note in &section.notes {
                writeln!(f, "- {note}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl fmt::Display for Markdown<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.0;
        let request = &report.request;

        writeln!(f, "# {}", report.title)?;
        writeln!(f)?;
        writeln!(f, "- Author: {}", report.author)?;
        writeln!(
            f,
            "- Generated: {}",
            report.generated_at.format("%Y-%m-%d %H:%M UTC")
        )?;
        writeln!(
            f,
            "- Period: {} to {} ({} day(s))",
            request.start_date,
            request.end_date,
            request.dates().count()
        )?;
        let parameters: Vec<String> = request
            .parameters
            .iter()
            .map(|p| display_parameter(p))
            .collect();
        writeln!(f, "- Parameters: {}", parameters.join(", "))?;
        writeln!(f)?;

        writeln!(f, "## Summary")?;
        writeln!(f)?;
        for line in report.summary_lines() {
            writeln!(f, "- {line}")?;
        }
        writeln!(f)?;

        for section in &report.locations {
            self.write_location(f, section)?;
        }

        if !report.comparison.is_empty() {
            writeln!(f, "## Comparison")?;
            writeln!(f)?;
            for comparison in &report.comparison {
                writeln!(f, "**{}**", display_parameter(&comparison.parameter))?;
                writeln!(f)?;
                writeln!(f, "| Rank | Location | Average | AQI |")?;
                writeln!(f, "|-----:|----------|--------:|-----|")?;
                for (rank, entry) in comparison.ranking.iter().enumerate() {
                    let aqi = entry
                        .aqi
                        .map_or_else(|| "-".to_string(), |a| format!("{} ({})", a.value, a.category));
                    writeln!(
                        f,
                        "| {} | {} | {:.2} {} | {} |",
                        rank + 1,
                        entry.location,
                        entry.mean,
                        comparison.units,
                        aqi
                    )?;
                }
                writeln!(f)?;
            }
        }

        writeln!(f, "## Conclusion")?;
        writeln!(f)?;
        for line in report.conclusion_lines() {
            writeln!(f, "{line}")?;
            writeln!(f)?;
        }
        write!(f, "_Prepared by {}._", report.author)?;
        writeln!(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{self, DatedValue};
    use crate::aqi::us_aqi;
    use crate::models::BoundingBox;
    use chrono::NaiveDate;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn section(name: &str, pm25: &[f64]) -> LocationReport {
        let daily: Vec<DailyPollutant> = pm25
            .iter()
            .enumerate()
            .map(|(i, v)| DailyPollutant {
                date: date(i as u32 + 1),
                parameter: "pm25".to_string(),
                units: "µg/m³".to_string(),
                value: *v,
                location: name.to_string(),
            })
            .collect();
        let weather: Vec<DailyWeather> = (0..pm25.len())
            .map(|i| DailyWeather {
                date: date(i as u32 + 1),
                temperature_mean: Some(20.0),
                temperature_max: Some(25.0),
                temperature_min: Some(15.0),
                precipitation_sum: Some(0.0),
                wind_speed_mean: Some(30.0 - 5.0 * i as f64),
                relative_humidity_mean: Some(60.0),
            })
            .collect();
        LocationReport {
            name: name.to_string(),
            location: Location {
                query: name.to_string(),
                display_name: format!("{name}, Somewhere"),
                latitude: 13.08,
                longitude: 80.27,
                bounding_box: BoundingBox::new(12.9, 80.1, 13.2, 80.4).unwrap(),
            },
            stations: 2,
            pollutants: analysis::summarize_pollutants(&daily),
            weather_summary: analysis::summarize_weather(&weather),
            correlations: analysis::correlate(&daily, &weather),
            daily,
            weather,
            notes: vec!["Skipped archive data: day 4 timed out".to_string()],
        }
    }

    fn report() -> Report {
        let locations = vec![
            section("New Delhi", &[150.0, 170.0, 190.0]),
            section("Chennai", &[30.0, 32.0, 31.0]),
        ];
        let per_location: Vec<(String, Vec<ParameterSummary>)> = locations
            .iter()
            .map(|l| (l.name.clone(), l.pollutants.clone()))
            .collect();
        Report {
            title: "Air Quality Analysis: New Delhi, Chennai".to_string(),
            author: "Jane Doe".to_string(),
            generated_at: DateTime::parse_from_rfc3339("2024-02-01T12:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            request: AnalysisRequest {
                locations: vec!["New Delhi".to_string(), "Chennai".to_string(), "Atlantis".to_string()],
                start_date: date(1),
                end_date: date(3),
                parameters: vec!["pm25".to_string()],
                author: "Jane Doe".to_string(),
            },
            comparison: analysis::compare_locations(&per_location),
            locations,
            failed_locations: vec![FailedLocation {
                name: "Atlantis".to_string(),
                reason: "Bounding box not found for location: Atlantis".to_string(),
            }],
        }
    }

    #[test]
    fn test_display_parameter() {
        assert_eq!(display_parameter("pm25"), "PM2.5");
        assert_eq!(display_parameter("no2"), "NO2");
    }

    #[test]
    fn test_markdown_layout() {
        let markdown = report().to_markdown();

        let summary = markdown.find("## Summary").unwrap();
        let delhi = markdown.find("## New Delhi").unwrap();
        let comparison = markdown.find("## Comparison").unwrap();
        let conclusion = markdown.find("## Conclusion").unwrap();
        assert!(summary < delhi && delhi < comparison && comparison < conclusion);

        assert!(markdown.starts_with("# Air Quality Analysis: New Delhi, Chennai\n"));
        assert!(markdown.contains("- Period: 2024-01-01 to 2024-01-03 (3 day(s))"));
        assert!(markdown.contains("**New Delhi**: PM2.5 averaged 170.00 µg/m³ (AQI 245, Very Unhealthy), rising."));
        assert!(markdown.contains("**Atlantis**: could not be analysed"));
        assert!(markdown.contains("| 2024-01-01 | PM2.5 | 150.00 µg/m³ | 225 (Very Unhealthy) |"));
        assert!(markdown.contains("| 1 | Chennai | 31.00 µg/m³ |"));
        assert!(markdown.contains("- Skipped archive data: day 4 timed out"));
        assert!(markdown.contains("PM2.5 was highest in New Delhi (170.00 µg/m³) and lowest in Chennai (31.00 µg/m³)."));
        assert!(markdown.trim_end().ends_with("_Prepared by Jane Doe._"));
    }

    #[test]
    fn test_trend_phrase() {
        let summary = ParameterSummary {
            parameter: "pm25".to_string(),
            units: "µg/m³".to_string(),
            days: 1,
            mean: 20.0,
            min: DatedValue { date: date(1), value: 20.0 },
            max: DatedValue { date: date(1), value: 20.0 },
            trend: Trend::Insufficient,
            change_percent: None,
            aqi: us_aqi("pm25", 20.0),
        };
        assert_eq!(trend_phrase(&summary), "too few days to tell a trend");
    }

    #[test]
    fn test_conclusion_without_data() {
        let mut empty = report();
        empty.locations.clear();
        empty.comparison.clear();
        assert_eq!(empty.conclusion_lines().len(), 1);
        assert!(empty.conclusion_lines()[0].starts_with("Not enough air quality data"));
    }

    #[test]
    fn test_json_round_trips() {
        let json = report().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["author"], "Jane Doe");
        assert_eq!(value["locations"][0]["pollutants"][0]["trend"], "Rising");
        assert_eq!(value["failed_locations"][0]["name"], "Atlantis");
        assert_eq!(value["request"]["start_date"], "2024-01-01");
    }
}
