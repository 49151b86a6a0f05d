use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::geocode::opencage::{self, OpenCageGeocoder};
use crate::render::RenderOptions;
use crate::source::{http_client, HttpSource};

pub const DEFAULT_CLIENTS_URL: &str =
    "http://metabase.prod.tessan.cloud/public/question/6c3c45ab-7379-4815-8941-dcd6763c555c.csv";
pub const DEFAULT_BOUNDARIES_URL: &str =
    "https://france-geojson.gregoiredavid.fr/repo/departements.geojson";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub sources: SourcesConfig,
    pub geocoder: GeocoderConfig,
    pub map: MapConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SourcesConfig {
    pub clients_url: String,
    pub boundaries_url: String,
    pub timeout_secs: u64,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            clients_url: DEFAULT_CLIENTS_URL.to_string(),
            boundaries_url: DEFAULT_BOUNDARIES_URL.to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Deserialize, Clone)]
#[serde(default)]
pub struct GeocoderConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub language: Option<String>,
    pub country_code: Option<String>,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            endpoint: opencage::DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            language: None,
            country_code: None,
        }
    }
}

// Keep the key out of logs
impl std::fmt::Debug for GeocoderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeocoderConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("language", &self.language)
            .field("country_code", &self.country_code)
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MapConfig {
    pub title: String,
    pub zoom_start: u8,
    pub overlay_name: String,
    pub marker_color: String,
    pub height: u32,
    pub output_file: PathBuf,
}

impl Default for MapConfig {
    fn default() -> Self {
        let render = RenderOptions::default();
        Self {
            title: render.title,
            zoom_start: render.zoom_start,
            overlay_name: render.overlay_name,
            marker_color: render.marker_color,
            height: render.height,
            output_file: PathBuf::from("client_map.html"),
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Config file if given, defaults otherwise
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load_from_file(p),
            None => Ok(Self::default()),
        }
    }

    /// A key from the command line or environment wins over the file
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
            self.geocoder.api_key = Some(key);
        }
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.sources.timeout_secs)
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            title: self.map.title.clone(),
            zoom_start: self.map.zoom_start,
            overlay_name: self.map.overlay_name.clone(),
            marker_color: self.map.marker_color.clone(),
            height: self.map.height,
        }
    }

    /// Build the HTTP sources and the geocoder described by this config
    pub fn build(&self) -> Result<(HttpSource, HttpSource, OpenCageGeocoder)> {
        let api_key = match &self.geocoder.api_key {
            Some(key) => key.clone(),
            None => bail!("No geocoding API key configured (set API_KEY or geocoder.api_key)"),
        };

        let clients_url =
            Url::parse(&self.sources.clients_url).context("Invalid sources.clients_url")?;
        let boundaries_url =
            Url::parse(&self.sources.boundaries_url).context("Invalid sources.boundaries_url")?;
        let endpoint = Url::parse(&self.geocoder.endpoint).context("Invalid geocoder.endpoint")?;

        let client = http_client(self.timeout()).context("Failed to create HTTP client")?;

        let geocoder = OpenCageGeocoder::new(client.clone(), endpoint, api_key)
            .with_language(self.geocoder.language.clone())
            .with_country_code(self.geocoder.country_code.clone());

        Ok((
            HttpSource::new(client.clone(), clients_url),
            HttpSource::new(client, boundaries_url),
            geocoder,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file() {
        let config: Config = toml::from_str(
            r#"
            [geocoder]
            api_key = "from-file"
            language = "fr"

            [map]
            zoom_start = 8
            "#,
        )
        .unwrap();

        assert_eq!(config.sources.clients_url, DEFAULT_CLIENTS_URL);
        assert_eq!(config.geocoder.api_key.as_deref(), Some("from-file"));
        assert_eq!(config.map.zoom_start, 8);
        assert_eq!(config.map.title, "Clients TESSAN");
        assert_eq!(config.render_options().zoom_start, 8);
    }

    #[test]
    fn test_api_key_override() {
        let mut config = Config::default();
        config.geocoder.api_key = Some("from-file".to_string());

        let config = config.with_api_key(Some("from-env".to_string()));
        assert_eq!(config.geocoder.api_key.as_deref(), Some("from-env"));

        let config = config.with_api_key(Some("  ".to_string()));
        assert_eq!(config.geocoder.api_key.as_deref(), Some("from-env"));
    }

    #[test]
    fn test_build_requires_key() {
        assert!(Config::default().build().is_err());
        assert!(Config::default()
            .with_api_key(Some("k".to_string()))
            .build()
            .is_ok());
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = Config::default().with_api_key(Some("top-secret".to_string()));
        assert!(!format!("{:?}", config).contains("top-secret"));
    }

    #[test]
    fn test_invalid_url() {
        let mut config = Config::default().with_api_key(Some("k".to_string()));
        config.sources.clients_url = "not a url".to_string();
        assert!(config.build().is_err());
    }
}
