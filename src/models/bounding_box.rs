//! Rectangular geographic extent

use crate::{AirAwareError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kilometres per degree of latitude, close enough everywhere on Earth
const KM_PER_DEGREE: f64 = 111.0;

/// Bounding box in decimal degrees.
///
/// Field order is `south, west, north, east`. External services disagree on
/// ordering (Nominatim sends `[south, north, west, east]`, OpenAQ expects
/// `west,south,east,north`), so conversions live here and nowhere else.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl BoundingBox {
    /// Create a validated bounding box
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Result<Self> {
        let bbox = Self {
            south,
            west,
            north,
            east,
        };
        bbox.validate()?;
        Ok(bbox)
    }

    /// Parse Nominatim's `boundingbox` array: `["south", "north", "west", "east"]`
    pub fn from_nominatim(raw: &[String]) -> Result<Self> {
        if raw.len() != 4 {
            return Err(AirAwareError::parse(format!(
                "Bounding box must contain exactly 4 values, got {}",
                raw.len()
            )));
        }
        let parse = |s: &str| {
            s.trim()
                .parse::<f64>()
                .map_err(|_| AirAwareError::parse(format!("Invalid bounding box coordinate: {s}")))
        };
        Self::new(parse(&raw[0])?, parse(&raw[2])?, parse(&raw[1])?, parse(&raw[3])?)
    }

    fn validate(&self) -> Result<()> {
        let finite = [self.south, self.west, self.north, self.east]
            .iter()
            .all(|v| v.is_finite());
        if !finite {
            return Err(AirAwareError::validation("Bounding box coordinates must be finite"));
        }
        if !(-90.0..=90.0).contains(&self.south) || !(-90.0..=90.0).contains(&self.north) {
            return Err(AirAwareError::validation(format!(
                "Latitude must be between -90 and 90, got south={} north={}",
                self.south, self.north
            )));
        }
        if !(-180.0..=180.0).contains(&self.west) || !(-180.0..=180.0).contains(&self.east) {
            return Err(AirAwareError::validation(format!(
                "Longitude must be between -180 and 180, got west={} east={}",
                self.west, self.east
            )));
        }
        if self.south > self.north {
            return Err(AirAwareError::validation(format!(
                "South edge {} lies north of north edge {}",
                self.south, self.north
            )));
        }
        Ok(())
    }

    /// Grow the box by `km` on every side.
    ///
    /// Longitude degrees shrink towards the poles, so the longitude offset is
    /// scaled by the cosine of the mid latitude. Edges are clamped to valid ranges.
    #[must_use]
    pub fn expand(&self, km: f64) -> Self {
        let lat_offset = km / KM_PER_DEGREE;
        let mid_lat = ((self.south + self.north) / 2.0).to_radians();
        // cos() hits zero at the poles; cap the offset at a full hemisphere
        let lon_offset = (km / (KM_PER_DEGREE * mid_lat.cos().max(1e-6))).min(180.0);

        Self {
            south: (self.south - lat_offset).max(-90.0),
            west: (self.west - lon_offset).max(-180.0),
            north: (self.north + lat_offset).min(90.0),
            east: (self.east + lon_offset).min(180.0),
        }
    }

    /// Center point as `(latitude, longitude)`
    #[must_use]
    pub fn center(&self) -> (f64, f64) {
        (
            (self.south + self.north) / 2.0,
            (self.west + self.east) / 2.0,
        )
    }

    /// OpenAQ `bbox` query value: `west,south,east,north`
    #[must_use]
    pub fn to_openaq_param(&self) -> String {
        format!("{},{},{},{}", self.west, self.south, self.east, self.north)
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "S {:.4}, W {:.4}, N {:.4}, E {:.4}",
            self.south, self.west, self.north, self.east
        )
    }
}
