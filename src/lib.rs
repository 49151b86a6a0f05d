//! Clientmap - client dashboard that geocodes a CSV export onto a map
//!
//! This library provides the data pipeline shared by the serve and export binaries.

pub mod config;
pub mod geocode;
pub mod models;
pub mod pipeline;
pub mod render;
pub mod source;

pub use models::{ClientRecord, Coordinates, DepartmentSelection};
pub use pipeline::{MapView, PipelineError, Session};
