//! Core data models for the client map.

pub mod client;
pub mod selection;

pub use client::{ClientRecord, Coordinates};
pub use selection::{DepartmentSelection, ALL_DEPARTMENTS, PLACEHOLDER};
