//! Geocoded location model

use super::BoundingBox;
use serde::{Deserialize, Serialize};

/// A place name resolved to coordinates and an (expanded) bounding box
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Location {
    /// The name the user asked for, e.g. "Chennai, India"
    pub query: String,
    /// Full name returned by the geocoder
    pub display_name: String,
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Longitude in decimal degrees
    pub longitude: f64,
    /// Search area for monitoring stations
    pub bounding_box: BoundingBox,
}

impl Location {
    /// Format location as coordinates string
    #[must_use]
    pub fn format_coordinates(&self) -> String {
        format!("{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chennai() -> Location {
        Location {
            query: "Chennai".to_string(),
            display_name: "Chennai, Tamil Nadu, India".to_string(),
            latitude: 13.083_694,
            longitude: 80.270_186,
            bounding_box: BoundingBox::new(12.9, 80.1, 13.2, 80.4).unwrap(),
        }
    }

    #[test]
    fn test_format_coordinates() {
        assert_eq!(chennai().format_coordinates(), "13.0837, 80.2702");
    }
}
