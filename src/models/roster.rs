//! Roster rows grouped by instructor.

use serde::Serialize;

/// One class within a reporting period.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClassRecord {
    /// Record identifier.
    pub id: String,
    /// Class label.
    pub name: Option<String>,
    /// First meeting date, ISO form.
    pub start_date: Option<String>,
    /// Last meeting date, ISO form.
    pub end_date: Option<String>,
}

/// Classes taught by one instructor, as returned by the roster operation.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InstructorGroup {
    /// Instructor record identifier.
    pub id: String,
    /// Instructor display name; groups are sorted by this ascending.
    pub name: String,
    /// Classes in the order the CRM returned them.
    pub classes: Vec<ClassRecord>,
}
