//! Meeting reference and locator diagnostics.

use serde::Serialize;

/// Resolved class-meeting record; derived fresh per request, never stored.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MeetingRef {
    /// Record identifier.
    pub id: String,
    /// Auto-number or label of the meeting record.
    pub name: Option<String>,
}

/// Which locator path produced the result.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum LocateVia {
    /// Caller supplied the meeting id directly.
    MeetingId,
    /// The hard-coded schema field names matched.
    Exact,
    /// Field names came from metadata discovery.
    Discovered,
}

/// Diagnostic record of the fields the locator ended up querying with.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MeetingFieldsUsed {
    /// Locator path taken.
    pub via: LocateVia,
    /// Lookup field filtering on the class, when a query was built.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_field: Option<String>,
    /// Date field the predicate compared against.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_field: Option<String>,
    /// Declared type of the date field (`date` or `datetime`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_type: Option<String>,
}

impl MeetingFieldsUsed {
    /// Diagnostics for the direct-by-id path, which builds no predicate.
    #[must_use]
    pub fn direct() -> Self {
        Self {
            via: LocateVia::MeetingId,
            class_field: None,
            date_field: None,
            date_type: None,
        }
    }
}
