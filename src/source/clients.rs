//! Client table loading from the CSV export.

use std::collections::BTreeSet;
use std::sync::Arc;

use csv::{ReaderBuilder, Trim};
use serde::Deserialize;
use tracing::{debug, info};

use super::{SourceError, TextSource};
use crate::models::ClientRecord;

/// Row layout of the export. Extra columns are ignored.
#[derive(Debug, Deserialize)]
struct ClientRow {
    #[serde(rename = "Name", default)]
    name: Option<String>,
    #[serde(rename = "Address", default)]
    address: Option<String>,
    #[serde(rename = "PostalCode", default)]
    postal_code: Option<String>,
    #[serde(rename = "Locality", default)]
    locality: Option<String>,
    #[serde(rename = "AdministrativeArea2", default)]
    administrative_area: Option<String>,
}

/// Parse the CSV payload, dropping rows without an address
pub fn parse_clients(text: &str) -> Result<Vec<ClientRecord>, SourceError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    if !headers.iter().any(|h| h == "Address") {
        return Err(SourceError::Invalid(
            "Column 'Address' not found".to_string(),
        ));
    }

    let mut records = Vec::new();
    let mut skipped = 0usize;

    for row in reader.deserialize::<ClientRow>() {
        let row = row?;

        let address = match row.address {
            Some(a) if !a.trim().is_empty() => a,
            _ => {
                skipped += 1;
                continue;
            }
        };

        records.push(ClientRecord {
            name: row.name.unwrap_or_default(),
            address,
            postal_code: row.postal_code.unwrap_or_default(),
            locality: row.locality.unwrap_or_default(),
            administrative_area: row.administrative_area.unwrap_or_default(),
            latitude: None,
            longitude: None,
        });
    }

    if skipped > 0 {
        debug!("Skipped {} rows without an address", skipped);
    }

    Ok(records)
}

/// Sorted distinct departments, blanks excluded
pub fn departments(records: &[ClientRecord]) -> Vec<String> {
    records
        .iter()
        .map(|r| r.administrative_area.trim())
        .filter(|a| !a.is_empty())
        .map(String::from)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Loads the client table once and serves the memoized copy afterwards
pub struct ClientLoader<S> {
    source: S,
    cache: Option<Arc<Vec<ClientRecord>>>,
}

impl<S: TextSource> ClientLoader<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            cache: None,
        }
    }

    /// Fetch and parse the export, or return the copy from an earlier call.
    ///
    /// Failures are not cached, the next call fetches again.
    pub async fn load_clients(&mut self) -> Result<Arc<Vec<ClientRecord>>, SourceError> {
        if let Some(cached) = &self.cache {
            return Ok(Arc::clone(cached));
        }

        let text = self.source.fetch_text().await?;
        let records = Arc::new(parse_clients(&text)?);
        info!("Loaded {} clients", records.len());

        self.cache = Some(Arc::clone(&records));
        Ok(records)
    }

    /// Drop the memoized table
    pub fn invalidate(&mut self) {
        self.cache = None;
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}
