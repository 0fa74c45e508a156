//! Update reconciliation for attendance and supervision records.
//!
//! Callers may reference records by primary key or by student; the two
//! populations are reconciled differently (one batched update versus a
//! per-item lookup-then-update), and every item's outcome lands in a
//! ledger. Partial success is the normal outcome — nothing is rolled
//! back, and no item's failure stops the others.

use serde_json::Value;
use tracing::warn;

use crate::crm::api::{CrmApi, JsonRecord};
use crate::crm::identity::truncate_to_core15;
use crate::crm::schema::TrackingSchema;
use crate::crm::soql;
use crate::models::attendance::ReconciliationLedger;

/// One update request, already mapped onto concrete CRM field names.
#[derive(Debug, Clone, Default)]
pub struct UpdateSpec {
    /// Primary-key reference; wins over `student_id` when both are set.
    pub id: Option<String>,
    /// Secondary-key reference: the student on the target record.
    pub student_id: Option<String>,
    /// Field values to write; absent fields are left untouched.
    pub fields: JsonRecord,
}

enum ItemKey {
    ById(String),
    ByStudent(String),
    Unkeyed,
}

fn item_key(item: &UpdateSpec) -> ItemKey {
    // Precedence is deliberate: a primary key always wins over the
    // secondary (student) key.
    if let Some(id) = item.id.as_deref().filter(|v| !v.trim().is_empty()) {
        ItemKey::ById(id.to_owned())
    } else if let Some(sid) = item.student_id.as_deref().filter(|v| !v.trim().is_empty()) {
        ItemKey::ByStudent(truncate_to_core15(sid.trim()).to_owned())
    } else {
        ItemKey::Unkeyed
    }
}

/// Apply one category's updates against its tracking object.
///
/// The caller must have verified the meeting exists
/// ([`crate::crm::meeting::verify_exists`]) before invoking this; the
/// gate is per request, not per item. By-id items go out as one batch
/// with continue-on-error semantics; by-student items are looked up and
/// updated one at a time with every failure caught into the ledger.
pub async fn reconcile(
    api: &dyn CrmApi,
    meeting_id: &str,
    schema: &TrackingSchema,
    items: Vec<UpdateSpec>,
) -> ReconciliationLedger {
    let mut ledger = ReconciliationLedger::default();

    let mut by_id: Vec<(String, JsonRecord)> = Vec::new();
    let mut by_student: Vec<(String, JsonRecord)> = Vec::new();

    for item in items {
        match item_key(&item) {
            ItemKey::ById(id) => by_id.push((id, item.fields)),
            ItemKey::ByStudent(sid) => by_student.push((sid, item.fields)),
            ItemKey::Unkeyed => {
                ledger.record_failure(None, "item carries neither id nor studentId");
            }
        }
    }

    if !by_id.is_empty() {
        let records: Vec<JsonRecord> = by_id
            .iter()
            .map(|(id, fields)| {
                let mut record = fields.clone();
                record.insert("Id".to_owned(), Value::String(id.clone()));
                record
            })
            .collect();

        match api.update_many(&schema.object_name, records, false).await {
            Ok(results) => {
                for (index, (id, _)) in by_id.iter().enumerate() {
                    match results.get(index) {
                        Some(result) if result.success => ledger.record_success(),
                        Some(result) => {
                            ledger.record_failure(Some(id.clone()), result.error_message());
                        }
                        None => {
                            ledger.record_failure(
                                Some(id.clone()),
                                "batch update returned no outcome for this record",
                            );
                        }
                    }
                }
            }
            Err(err) => {
                warn!(object = %schema.object_name, %err, "batch update failed");
                for (id, _) in &by_id {
                    ledger.record_failure(Some(id.clone()), err.to_string());
                }
            }
        }
    }

    for (student_core, fields) in by_student {
        apply_by_student(api, meeting_id, schema, &student_core, fields, &mut ledger).await;
    }

    ledger
}

/// Look up the record for `(meeting, student)` and update it; every
/// failure mode lands in the ledger rather than propagating.
async fn apply_by_student(
    api: &dyn CrmApi,
    meeting_id: &str,
    schema: &TrackingSchema,
    student_core: &str,
    fields: JsonRecord,
    ledger: &mut ReconciliationLedger,
) {
    let Some(student_field) = schema.student_field.as_deref() else {
        ledger.record_failure(
            Some(student_core.to_owned()),
            format!("{} object has no student lookup field", schema.object_name),
        );
        return;
    };

    // Stored values may carry the case-safety suffix the caller's
    // truncated key lacks, hence the prefix match.
    let soql = format!(
        "SELECT Id FROM {} WHERE {} = {} AND {student_field} LIKE {} LIMIT 1",
        schema.object_name,
        schema.meeting_field,
        soql::quote(meeting_id),
        soql::like_prefix(student_core)
    );

    let record_id = match api.query(&soql).await {
        Ok(response) => response
            .records
            .first()
            .and_then(|r| r.get("Id"))
            .and_then(Value::as_str)
            .map(str::to_owned),
        Err(err) => {
            ledger.record_failure(Some(student_core.to_owned()), err.to_string());
            return;
        }
    };

    let Some(record_id) = record_id else {
        ledger.record_failure(
            Some(student_core.to_owned()),
            format!(
                "no {} record for student {student_core} in meeting {meeting_id}",
                schema.object_name
            ),
        );
        return;
    };

    match api.update_one(&schema.object_name, &record_id, fields).await {
        Ok(result) if result.success => ledger.record_success(),
        Ok(result) => {
            ledger.record_failure(Some(student_core.to_owned()), result.error_message());
        }
        Err(err) => {
            ledger.record_failure(Some(student_core.to_owned()), err.to_string());
        }
    }
}
