//! OpenCage forward geocoding client.
//!
//! See: https://opencagedata.com/api

use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::{GeocodeError, Geocoder};
use crate::models::Coordinates;

pub const DEFAULT_ENDPOINT: &str = "https://api.opencagedata.com/geocode/v1/json";

/// Keyed client for the OpenCage API.
///
/// The key is passed in at construction; nothing is read from the
/// environment here.
#[derive(Clone)]
pub struct OpenCageGeocoder {
    client: Client,
    endpoint: Url,
    api_key: String,
    language: Option<String>,
    country_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenCageResponse {
    #[serde(default)]
    results: Vec<OpenCageResult>,
    status: Option<OpenCageStatus>,
}

#[derive(Debug, Deserialize)]
struct OpenCageResult {
    geometry: OpenCageGeometry,
}

#[derive(Debug, Deserialize)]
struct OpenCageGeometry {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct OpenCageStatus {
    code: u16,
    message: String,
}

impl OpenCageGeocoder {
    pub fn new(client: Client, endpoint: Url, api_key: String) -> Self {
        Self {
            client,
            endpoint,
            api_key,
            language: None,
            country_code: None,
        }
    }

    /// Preferred language for results (e.g. "fr")
    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.language = language;
        self
    }

    /// Restrict matches to comma-separated ISO 3166-1 alpha-2 codes
    pub fn with_country_code(mut self, country_code: Option<String>) -> Self {
        self.country_code = country_code;
        self
    }

    /// Full request URL for an address, key included
    fn request_url(&self, address: &str) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("q", address)
                .append_pair("key", &self.api_key)
                .append_pair("limit", "1")
                .append_pair("no_annotations", "1");
            if let Some(lang) = &self.language {
                pairs.append_pair("language", lang);
            }
            if let Some(cc) = &self.country_code {
                pairs.append_pair("countrycode", cc);
            }
        }
        url
    }
}

impl Geocoder for OpenCageGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<Coordinates>, GeocodeError> {
        debug!("Geocoding '{}'", address);

        let response = self.client.get(self.request_url(address)).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            // Error bodies still carry a status message worth surfacing
            let message = serde_json::from_str::<OpenCageResponse>(&body)
                .ok()
                .and_then(|r| r.status)
                .map(|s| s.message)
                .unwrap_or_else(|| status.to_string());
            return Err(GeocodeError::Status { status, message });
        }

        decode_response(&body)
    }
}

/// Extract the best match from a response body
fn decode_response(body: &str) -> Result<Option<Coordinates>, GeocodeError> {
    let response: OpenCageResponse = serde_json::from_str(body)?;

    if let Some(status) = &response.status {
        if status.code != 200 {
            return Err(GeocodeError::Provider {
                code: status.code,
                message: status.message.clone(),
            });
        }
    }

    Ok(response
        .results
        .first()
        .map(|r| Coordinates::new(r.geometry.lat, r.geometry.lng)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geocoder() -> OpenCageGeocoder {
        OpenCageGeocoder::new(
            Client::new(),
            Url::parse(DEFAULT_ENDPOINT).unwrap(),
            "secret".to_string(),
        )
    }

    #[test]
    fn test_decode_first_result() {
        let body = r#"{
            "results": [
                {"geometry": {"lat": 48.3904, "lng": -4.4861}, "formatted": "Brest, France"},
                {"geometry": {"lat": 0.0, "lng": 0.0}}
            ],
            "status": {"code": 200, "message": "OK"},
            "total_results": 2
        }"#;

        assert_eq!(
            decode_response(body).unwrap(),
            Some(Coordinates::new(48.3904, -4.4861))
        );
    }

    #[test]
    fn test_decode_no_results() {
        let body = r#"{"results": [], "status": {"code": 200, "message": "OK"}}"#;
        assert_eq!(decode_response(body).unwrap(), None);
    }

    #[test]
    fn test_decode_provider_error() {
        let body = r#"{"results": [], "status": {"code": 402, "message": "quota exceeded"}}"#;

        match decode_response(body) {
            Err(GeocodeError::Provider { code, .. }) => assert_eq!(code, 402),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_decode_garbage() {
        assert!(matches!(
            decode_response("not json"),
            Err(GeocodeError::Decode(_))
        ));
    }

    #[test]
    fn test_request_url() {
        let url = geocoder()
            .with_language(Some("fr".to_string()))
            .with_country_code(Some("fr".to_string()))
            .request_url("1 quai Est, Brest");

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("q".to_string(), "1 quai Est, Brest".to_string())));
        assert!(pairs.contains(&("key".to_string(), "secret".to_string())));
        assert!(pairs.contains(&("limit".to_string(), "1".to_string())));
        assert!(pairs.contains(&("language".to_string(), "fr".to_string())));
        assert!(pairs.contains(&("countrycode".to_string(), "fr".to_string())));
    }
}
