//! Department boundary overlay.

use serde_json::Value;
use tracing::info;

use super::{SourceError, TextSource};

/// Raw GeoJSON document, handed to the map unmodified
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryOverlay(pub Value);

impl BoundaryOverlay {
    /// Number of features, if the document is a FeatureCollection
    pub fn feature_count(&self) -> Option<usize> {
        self.0
            .get("features")
            .and_then(Value::as_array)
            .map(Vec::len)
    }

    pub fn as_json(&self) -> &Value {
        &self.0
    }
}

/// Fetch the overlay. Called once per render pass, never cached.
pub async fn fetch_boundaries<S: TextSource>(source: &S) -> Result<BoundaryOverlay, SourceError> {
    let text = source.fetch_text().await?;
    let value: Value = serde_json::from_str(&text)?;

    // Anything without a GeoJSON "type" cannot be drawn
    if value.get("type").and_then(Value::as_str).is_none() {
        return Err(SourceError::Invalid(
            "boundary document has no GeoJSON type".to_string(),
        ));
    }

    let overlay = BoundaryOverlay(value);
    if let Some(count) = overlay.feature_count() {
        info!("Fetched boundary overlay with {} features", count);
    }
    Ok(overlay)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::testing::StaticSource;

    #[tokio::test]
    async fn test_feature_collection_passes_through() {
        let doc = r#"{"type":"FeatureCollection","features":[{"type":"Feature","properties":{"code":"29","nom":"Finistère"},"geometry":null}]}"#;
        let source = StaticSource::new(doc);

        let overlay = fetch_boundaries(&source).await.unwrap();

        assert_eq!(overlay.feature_count(), Some(1));
        assert_eq!(overlay.0["features"][0]["properties"]["code"], "29");
    }

    #[tokio::test]
    async fn test_not_geojson() {
        let source = StaticSource::new(r#"{"hello":"world"}"#);
        assert!(fetch_boundaries(&source).await.is_err());

        let source = StaticSource::new("<html>");
        assert!(fetch_boundaries(&source).await.is_err());
    }

    #[tokio::test]
    async fn test_fetched_every_time() {
        let source = StaticSource::new(r#"{"type":"FeatureCollection","features":[]}"#);

        fetch_boundaries(&source).await.unwrap();
        fetch_boundaries(&source).await.unwrap();
        assert_eq!(source.calls(), 2);
    }
}
