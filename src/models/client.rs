//! Client rows as loaded from the CSV export.

use serde::{Deserialize, Serialize};

/// Geographic point (lat/lon) returned by the geocoder
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// One client row.
///
/// Coordinates stay `None` until the enrichment stage resolves the address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientRecord {
    pub name: String,
    pub address: String,
    pub postal_code: String,
    pub locality: String,
    /// Department (`AdministrativeArea2` in the export)
    pub administrative_area: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

impl ClientRecord {
    /// Create an unresolved record
    pub fn new(name: &str, address: &str, administrative_area: &str) -> Self {
        Self {
            name: name.to_string(),
            address: address.to_string(),
            postal_code: String::new(),
            locality: String::new(),
            administrative_area: administrative_area.to_string(),
            latitude: None,
            longitude: None,
        }
    }

    /// Both coordinates, if the record has been resolved
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some(Coordinates { lat, lon }),
            _ => None,
        }
    }

    pub fn set_coordinates(&mut self, coords: Coordinates) {
        self.latitude = Some(coords.lat);
        self.longitude = Some(coords.lon);
    }

    pub fn is_resolved(&self) -> bool {
        self.coordinates().is_some()
    }
}
