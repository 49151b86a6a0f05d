//! Load → filter → geocode → aggregate.
//!
//! [`Session`] chains the stages and owns the memoized client table and
//! geocode cache. Dropping the session drops both.

pub mod enrich;
pub mod filter;

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::geocode::{CacheStats, GeocodeCache, Geocoder};
use crate::models::{ClientRecord, DepartmentSelection};
use crate::source::{fetch_boundaries, BoundaryOverlay, ClientLoader, SourceError, TextSource};

pub use enrich::{centroid, enrich, enrich_with_progress, EnrichedSet};
pub use filter::apply_filter;

/// Ways a pipeline run can stop short of a map
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The client export could not be fetched or parsed
    #[error("client data unavailable: {0}")]
    DataUnavailable(#[source] SourceError),
    /// The placeholder is still selected
    #[error("please select a department")]
    SelectionRequired,
    #[error("no data available for the selected filter ({selection})")]
    EmptyFilterResult { selection: String },
    #[error("no valid geocoding results for the selected data")]
    EmptyResolvedSet,
    #[error("department boundaries unavailable: {0}")]
    BoundaryUnavailable(#[source] SourceError),
}

impl PipelineError {
    /// Whether the user can fix this by changing the selection
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PipelineError::SelectionRequired
                | PipelineError::EmptyFilterResult { .. }
                | PipelineError::EmptyResolvedSet
        )
    }
}

/// Everything the presentation layer needs for one render pass
#[derive(Debug, Clone)]
pub struct MapView {
    pub selection: DepartmentSelection,
    pub clients: EnrichedSet,
    pub boundaries: BoundaryOverlay,
}

/// Run-scoped pipeline state
pub struct Session<C, B, G> {
    clients: ClientLoader<C>,
    boundaries: B,
    geocoder: G,
    geocodes: GeocodeCache,
}

impl<C, B, G> Session<C, B, G>
where
    C: TextSource,
    B: TextSource,
    G: Geocoder,
{
    pub fn new(clients: C, boundaries: B, geocoder: G) -> Self {
        Self {
            clients: ClientLoader::new(clients),
            boundaries,
            geocoder,
            geocodes: GeocodeCache::new(),
        }
    }

    /// The full client table (memoized)
    pub async fn clients(&mut self) -> Result<Arc<Vec<ClientRecord>>, PipelineError> {
        self.clients
            .load_clients()
            .await
            .map_err(PipelineError::DataUnavailable)
    }

    /// Options for the department selector
    pub async fn departments(&mut self) -> Result<Vec<String>, PipelineError> {
        let clients = self.clients().await?;
        Ok(crate::source::departments(&clients))
    }

    /// Load and filter; halts on an unmade selection or an empty result
    pub async fn select(
        &mut self,
        selection: &DepartmentSelection,
    ) -> Result<Vec<ClientRecord>, PipelineError> {
        let clients = self.clients().await?;
        let selected = apply_filter(&clients, selection)?;

        if selected.is_empty() {
            return Err(PipelineError::EmptyFilterResult {
                selection: selection.to_string(),
            });
        }

        info!("{} clients selected for {}", selected.len(), selection);
        Ok(selected)
    }

    /// Load, filter and geocode
    pub async fn enrich(
        &mut self,
        selection: &DepartmentSelection,
    ) -> Result<EnrichedSet, PipelineError> {
        self.enrich_with_progress(selection, |_| {}).await
    }

    /// [`Session::enrich`] with a per-record callback
    pub async fn enrich_with_progress<F>(
        &mut self,
        selection: &DepartmentSelection,
        on_record: F,
    ) -> Result<EnrichedSet, PipelineError>
    where
        F: FnMut(&ClientRecord) + Send,
    {
        let selected = self.select(selection).await?;
        self.enrich_selected(selected, on_record).await
    }

    /// Geocode records already returned by [`Session::select`]
    pub async fn enrich_selected<F>(
        &mut self,
        selected: Vec<ClientRecord>,
        on_record: F,
    ) -> Result<EnrichedSet, PipelineError>
    where
        F: FnMut(&ClientRecord) + Send,
    {
        enrich_with_progress(selected, &self.geocoder, &mut self.geocodes, on_record).await
    }

    /// One full render pass: enrich, then fetch the boundary overlay
    pub async fn run(&mut self, selection: &DepartmentSelection) -> Result<MapView, PipelineError> {
        let clients = self.enrich(selection).await?;
        let boundaries = self.boundaries().await?;

        Ok(MapView {
            selection: selection.clone(),
            clients,
            boundaries,
        })
    }

    /// Fetch the boundary overlay (not memoized)
    pub async fn boundaries(&self) -> Result<BoundaryOverlay, PipelineError> {
        fetch_boundaries(&self.boundaries)
            .await
            .map_err(PipelineError::BoundaryUnavailable)
    }

    /// Forget the client table and every geocoding result
    pub fn reset(&mut self) {
        self.clients.invalidate();
        self.geocodes.clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.geocodes.stats()
    }
}
