//! Geocoding enrichment and centroid aggregation.

use geo::Centroid;
use geo_types::{MultiPoint, Point};
use serde::Serialize;
use tracing::{info, warn};

use super::PipelineError;
use crate::geocode::{GeocodeCache, Geocoder};
use crate::models::{ClientRecord, Coordinates};

/// Records placed on the map and the point the map centers on
#[derive(Debug, Clone, Serialize)]
pub struct EnrichedSet {
    /// Resolved records, in input order
    pub records: Vec<ClientRecord>,
    pub centroid: Coordinates,
    /// Addresses that could not be placed
    pub unresolved: Vec<String>,
}

/// Arithmetic mean of the resolved coordinates, `None` if nothing is resolved
pub fn centroid(records: &[ClientRecord]) -> Option<Coordinates> {
    let points: MultiPoint<f64> = records
        .iter()
        .filter_map(ClientRecord::coordinates)
        .map(|c| Point::new(c.lon, c.lat))
        .collect::<Vec<_>>()
        .into();

    points.centroid().map(|p| Coordinates::new(p.y(), p.x()))
}

/// Geocode every record, drop the unresolved ones and compute the centroid
pub async fn enrich<G: Geocoder>(
    records: Vec<ClientRecord>,
    geocoder: &G,
    cache: &mut GeocodeCache,
) -> Result<EnrichedSet, PipelineError> {
    enrich_with_progress(records, geocoder, cache, |_| {}).await
}

/// [`enrich`], calling `on_record` after each record is processed.
///
/// One attempt per address; a failed address is reported and skipped
/// without affecting the rest of the set.
pub async fn enrich_with_progress<G, F>(
    records: Vec<ClientRecord>,
    geocoder: &G,
    cache: &mut GeocodeCache,
    mut on_record: F,
) -> Result<EnrichedSet, PipelineError>
where
    G: Geocoder,
    F: FnMut(&ClientRecord) + Send,
{
    let total = records.len();
    let mut resolved = Vec::with_capacity(total);
    let mut unresolved = Vec::new();

    for mut record in records {
        match cache.resolve(geocoder, &record.address).await {
            Some(coords) => {
                record.set_coordinates(coords);
                on_record(&record);
                resolved.push(record);
            }
            None => {
                on_record(&record);
                unresolved.push(record.address);
            }
        }
    }

    if !unresolved.is_empty() {
        warn!(
            "{} of {} addresses could not be geocoded",
            unresolved.len(),
            total
        );
    }

    let centroid = centroid(&resolved).ok_or(PipelineError::EmptyResolvedSet)?;
    info!(
        "Placed {} clients, centered on ({:.5}, {:.5})",
        resolved.len(),
        centroid.lat,
        centroid.lon
    );

    Ok(EnrichedSet {
        records: resolved,
        centroid,
        unresolved,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocode::testing::FakeGeocoder;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
    }

    #[tokio::test]
    async fn test_unresolvable_address_is_excluded() {
        let geocoder = FakeGeocoder::new()
            .with("1 quai Est, Brest", 48.0, -4.0)
            .with("4 rue Neuve, Lorient", 47.0, -3.0)
            .failing("nowhere");
        let mut cache = GeocodeCache::new();

        let records = vec![
            ClientRecord::new("A", "1 quai Est, Brest", "Finistère"),
            ClientRecord::new("B", "nowhere", "Finistère"),
            ClientRecord::new("C", "4 rue Neuve, Lorient", "Morbihan"),
        ];

        let set = enrich(records, &geocoder, &mut cache).await.unwrap();

        assert_eq!(set.records.len(), 2);
        assert!(set.records.iter().all(ClientRecord::is_resolved));
        assert_eq!(set.unresolved, vec!["nowhere".to_string()]);
        assert_close(set.centroid.lat, 47.5);
        assert_close(set.centroid.lon, -3.5);
    }

    #[tokio::test]
    async fn test_duplicate_address_single_call() {
        let geocoder = FakeGeocoder::new().with("1 quai Est, Brest", 48.39, -4.49);
        let mut cache = GeocodeCache::new();

        let records = vec![
            ClientRecord::new("A", "1 quai Est, Brest", "Finistère"),
            ClientRecord::new("B", "1 quai Est, Brest", "Finistère"),
        ];

        let set = enrich(records, &geocoder, &mut cache).await.unwrap();

        assert_eq!(geocoder.calls(), 1);
        assert_eq!(set.records[0].coordinates(), set.records[1].coordinates());
        assert_eq!(
            set.records[0].coordinates(),
            Some(Coordinates::new(48.39, -4.49))
        );
    }

    #[tokio::test]
    async fn test_nothing_resolved() {
        let geocoder = FakeGeocoder::new();
        let mut cache = GeocodeCache::new();

        let result = enrich(
            vec![ClientRecord::new("A", "unknown", "Morbihan")],
            &geocoder,
            &mut cache,
        )
        .await;

        assert!(matches!(result, Err(PipelineError::EmptyResolvedSet)));
    }

    #[tokio::test]
    async fn test_progress_called_per_record() {
        let geocoder = FakeGeocoder::new().with("a", 1.0, 1.0);
        let mut cache = GeocodeCache::new();
        let mut seen = 0;

        enrich_with_progress(
            vec![
                ClientRecord::new("A", "a", "X"),
                ClientRecord::new("B", "b", "X"),
            ],
            &geocoder,
            &mut cache,
            |_| seen += 1,
        )
        .await
        .unwrap();

        assert_eq!(seen, 2);
    }

    #[test]
    fn test_centroid_is_mean() {
        let mut records = vec![
            ClientRecord::new("A", "a", "X"),
            ClientRecord::new("B", "b", "X"),
            ClientRecord::new("C", "c", "X"),
            ClientRecord::new("D", "d", "X"),
        ];
        records[0].set_coordinates(Coordinates::new(48.0, -4.0));
        records[1].set_coordinates(Coordinates::new(47.0, -2.0));
        records[2].set_coordinates(Coordinates::new(46.0, 0.0));

        let c = centroid(&records).unwrap();
        assert_close(c.lat, 47.0);
        assert_close(c.lon, -2.0);
    }

    #[test]
    fn test_centroid_empty() {
        assert_eq!(centroid(&[]), None);
    }
}
