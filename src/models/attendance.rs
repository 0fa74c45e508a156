//! Attendance and supervision rows, update items, and the reconciliation
//! ledger.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One attendance record, enriched with the resolved student identity.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRow {
    /// Attendance record identifier.
    pub id: String,
    /// Record label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Student record identifier, when the raw field value carried one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    /// Student display name, parsed or batch-resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_name: Option<String>,
    /// Raw status value; shape is org-defined.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
    /// Raw free-text comments value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<Value>,
}

/// One supervision-rating record, enriched the same way.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SupervisionRow {
    /// Supervision record identifier.
    pub id: String,
    /// Record label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Student record identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    /// Student display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_name: Option<String>,
    /// Raw rating value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<Value>,
    /// Raw free-text notes value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<Value>,
}

/// Caller-supplied attendance update.
///
/// Exactly one of `id` / `student_id` is expected to be authoritative;
/// `id` wins when both are present. Absent mutable fields are left
/// untouched on the target record.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceUpdateItem {
    /// Attendance record identifier.
    pub id: Option<String>,
    /// Student identifier for secondary-key reconciliation.
    pub student_id: Option<String>,
    /// New status value.
    pub status: Option<Value>,
    /// New comments value.
    pub comments: Option<Value>,
}

/// Caller-supplied supervision-rating update.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SupervisionUpdateItem {
    /// Supervision record identifier.
    pub id: Option<String>,
    /// Student identifier for secondary-key reconciliation.
    pub student_id: Option<String>,
    /// New rating value.
    pub rating: Option<Value>,
    /// New notes value.
    pub notes: Option<Value>,
}

/// One failed item in a reconciliation run.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    /// Identifier the caller referenced the item by, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Human-readable failure description.
    pub message: String,
}

/// Per-category outcome of an apply-updates request.
///
/// Accumulated monotonically while items are processed; partial success is
/// the accepted outcome, never rolled back.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationLedger {
    /// Items written successfully.
    pub updated: usize,
    /// Items that failed.
    pub failed: usize,
    /// Failure detail in processing order.
    pub errors: Vec<LedgerEntry>,
}

impl ReconciliationLedger {
    /// Record one successful item.
    pub fn record_success(&mut self) {
        self.updated += 1;
    }

    /// Record one failed item with its caller-facing reference.
    pub fn record_failure(&mut self, id: Option<String>, message: impl Into<String>) {
        self.failed += 1;
        self.errors.push(LedgerEntry {
            id,
            message: message.into(),
        });
    }
}
