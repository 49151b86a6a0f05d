//! Department filter stage.

use super::PipelineError;
use crate::models::{ClientRecord, DepartmentSelection};

/// Restrict records to the selected department, keeping input order.
///
/// `All` is the identity. `Unselected` is refused with
/// [`PipelineError::SelectionRequired`] so the unfiltered table is never
/// geocoded by accident. An empty result is returned as-is; deciding what
/// to do with it is up to the caller.
pub fn apply_filter(
    records: &[ClientRecord],
    selection: &DepartmentSelection,
) -> Result<Vec<ClientRecord>, PipelineError> {
    match selection {
        DepartmentSelection::Unselected => Err(PipelineError::SelectionRequired),
        DepartmentSelection::All => Ok(records.to_vec()),
        DepartmentSelection::Department(department) => Ok(records
            .iter()
            .filter(|r| r.administrative_area == *department)
            .cloned()
            .collect()),
    }
}
