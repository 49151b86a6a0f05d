//! Address to coordinate lookup.
//!
//! [`Geocoder`] is the seam to the external provider; [`GeocodeCache`]
//! memoizes its answers for the lifetime of a session.

pub mod cache;
pub mod opencage;

use std::future::Future;

use reqwest::StatusCode;
use thiserror::Error;

use crate::models::Coordinates;

pub use cache::{CacheStats, GeocodeCache};
pub use opencage::OpenCageGeocoder;

/// Why a single address could not be geocoded
#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("geocoding request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("provider answered with HTTP {status}: {message}")]
    Status { status: StatusCode, message: String },
    #[error("provider error {code}: {message}")]
    Provider { code: u16, message: String },
    #[error("malformed provider response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// A free-text address lookup returning at most one best match
pub trait Geocoder {
    /// `Ok(None)` means the provider found no match
    fn geocode(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<Option<Coordinates>, GeocodeError>> + Send;
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::{GeocodeError, Geocoder};
    use crate::models::Coordinates;

    /// Table-driven geocoder counting external calls.
    ///
    /// Unknown addresses are no-match; addresses listed as failing return
    /// a provider error.
    #[derive(Default)]
    pub struct FakeGeocoder {
        known: HashMap<String, Coordinates>,
        failing: Vec<String>,
        calls: AtomicUsize,
    }

    impl FakeGeocoder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with(mut self, address: &str, lat: f64, lon: f64) -> Self {
            self.known
                .insert(address.to_string(), Coordinates::new(lat, lon));
            self
        }

        pub fn failing(mut self, address: &str) -> Self {
            self.failing.push(address.to_string());
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Geocoder for FakeGeocoder {
        async fn geocode(&self, address: &str) -> Result<Option<Coordinates>, GeocodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.iter().any(|a| a == address) {
                return Err(GeocodeError::Provider {
                    code: 500,
                    message: "internal error".to_string(),
                });
            }
            Ok(self.known.get(address).copied())
        }
    }
}
