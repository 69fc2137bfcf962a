//! Daily historical weather model and display methods

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily weather aggregate as published by the Open-Meteo archive.
///
/// Every measurement is optional: the archive returns `null` for days it has no
/// reanalysis data for yet.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DailyWeather {
    pub date: NaiveDate,
    /// Mean air temperature at 2 m in Celsius
    pub temperature_mean: Option<f64>,
    pub temperature_max: Option<f64>,
    pub temperature_min: Option<f64>,
    /// Precipitation sum in mm
    pub precipitation_sum: Option<f64>,
    /// Mean wind speed at 10 m in km/h
    pub wind_speed_mean: Option<f64>,
    /// Mean relative humidity at 2 m in percent
    pub relative_humidity_mean: Option<f64>,
}

/// Weather variables that can be correlated against pollution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeatherVariable {
    Temperature,
    Precipitation,
    WindSpeed,
    Humidity,
}

impl WeatherVariable {
    pub const ALL: [WeatherVariable; 4] = [
        WeatherVariable::Temperature,
        WeatherVariable::Precipitation,
        WeatherVariable::WindSpeed,
        WeatherVariable::Humidity,
    ];

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            WeatherVariable::Temperature => "mean temperature",
            WeatherVariable::Precipitation => "precipitation",
            WeatherVariable::WindSpeed => "wind speed",
            WeatherVariable::Humidity => "relative humidity",
        }
    }
}

impl DailyWeather {
    #[must_use]
    pub fn value(&self, variable: WeatherVariable) -> Option<f64> {
        match variable {
            WeatherVariable::Temperature => self.temperature_mean,
            WeatherVariable::Precipitation => self.precipitation_sum,
            WeatherVariable::WindSpeed => self.wind_speed_mean,
            WeatherVariable::Humidity => self.relative_humidity_mean,
        }
    }

    /// Format temperature with unit
    #[must_use]
    pub fn format_temperature(&self) -> String {
        match (self.temperature_mean, self.temperature_min, self.temperature_max) {
            (Some(mean), Some(min), Some(max)) => format!("{mean:.1}°C ({min:.1} to {max:.1})"),
            (Some(mean), _, _) => format!("{mean:.1}°C"),
            _ => "N/A".to_string(),
        }
    }

    #[must_use]
    pub fn format_precipitation(&self) -> String {
        self.precipitation_sum
            .map_or_else(|| "N/A".to_string(), |p| format!("{p:.1} mm"))
    }

    #[must_use]
    pub fn format_wind(&self) -> String {
        self.wind_speed_mean
            .map_or_else(|| "N/A".to_string(), |w| format!("{w:.1} km/h"))
    }

    #[must_use]
    pub fn format_humidity(&self) -> String {
        self.relative_humidity_mean
            .map_or_else(|| "N/A".to_string(), |h| format!("{h:.0}%"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> DailyWeather {
        DailyWeather {
            date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            temperature_mean: Some(14.26),
            temperature_max: Some(19.0),
            temperature_min: Some(9.5),
            precipitation_sum: Some(0.0),
            wind_speed_mean: Some(12.34),
            relative_humidity_mean: None,
        }
    }

    #[test]
    fn test_formatting() {
        let weather = day();
        assert_eq!(weather.format_temperature(), "14.3°C (9.5 to 19.0)");
        assert_eq!(weather.format_precipitation(), "0.0 mm");
        assert_eq!(weather.format_wind(), "12.3 km/h");
        assert_eq!(weather.format_humidity(), "N/A");
    }

    #[test]
    fn test_value_lookup() {
        let weather = day();
        assert_eq!(weather.value(WeatherVariable::WindSpeed), Some(12.34));
        assert_eq!(weather.value(WeatherVariable::Humidity), None);
    }
}
