//! Department filter selection.

/// Label of the "no filter" option in the selector
pub const ALL_DEPARTMENTS: &str = "All Departments";

/// Label of the placeholder option shown before any choice is made
pub const PLACEHOLDER: &str = "Select a Department";

/// What the user picked in the department selector.
///
/// `Unselected` and a department matching nothing are different states:
/// the first prompts for a choice, the second reports an empty result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepartmentSelection {
    /// Placeholder still selected
    Unselected,
    /// Every department
    All,
    /// A single department
    Department(String),
}

impl DepartmentSelection {
    /// Parse a selector value (query string or CLI argument).
    ///
    /// Missing, blank and placeholder values are `Unselected`.
    pub fn from_param(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") => DepartmentSelection::Unselected,
            Some(v) if v == PLACEHOLDER => DepartmentSelection::Unselected,
            Some(v) if v == ALL_DEPARTMENTS || v.eq_ignore_ascii_case("all") => {
                DepartmentSelection::All
            }
            Some(v) => DepartmentSelection::Department(v.to_string()),
        }
    }

    /// Human-readable label for headings and log lines
    pub fn label(&self) -> &str {
        match self {
            DepartmentSelection::Unselected => PLACEHOLDER,
            DepartmentSelection::All => ALL_DEPARTMENTS,
            DepartmentSelection::Department(name) => name,
        }
    }
}

impl std::fmt::Display for DepartmentSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}
