//! Meeting locator.
//!
//! Resolves the canonical meeting record from either a direct identifier
//! or a (class, date) pair. The fallback path is an explicit three-stage
//! machine — direct lookup, exact-schema attempt, metadata discovery —
//! where a failed exact-schema query is an expected transition, not an
//! error.

use serde_json::Value;
use tracing::warn;

use crate::crm::api::{CrmApi, JsonRecord};
use crate::crm::schema::{
    self, MeetingSchema, EXACT_CLASS_FIELD, EXACT_DATE_FIELD, MEETING_OBJECT,
};
use crate::crm::soql;
use crate::models::meeting::{LocateVia, MeetingFieldsUsed, MeetingRef};
use crate::{AppError, Result};

/// Inputs to a locate request. `date` must already be normalized to
/// `YYYY-MM-DD`. The overrides substitute discovered field names, mirroring
/// the `classField` / `dateField` query parameters.
#[derive(Debug, Clone, Default)]
pub struct MeetingQuery {
    /// Direct meeting identifier; wins over the (class, date) pair.
    pub meeting_id: Option<String>,
    /// Class identifier for the composite key.
    pub class_id: Option<String>,
    /// Meeting date, canonical ISO form.
    pub date: Option<String>,
    /// Caller-forced class lookup field name.
    pub class_field_override: Option<String>,
    /// Caller-forced date field name.
    pub date_field_override: Option<String>,
}

/// Locator outcome: the meeting (when one matched), the fields the final
/// query used, and the discovered bindings when the fallback ran.
#[derive(Debug, Clone)]
pub struct MeetingLookup {
    /// Canonical meeting record, or `None` for "not found".
    pub meeting: Option<MeetingRef>,
    /// Diagnostic record of the path taken.
    pub used_fields: MeetingFieldsUsed,
    /// Bindings produced by the discovery stage, when it ran.
    pub discovered: Option<MeetingSchema>,
}

fn record_str(record: &JsonRecord, key: &str) -> Option<String> {
    record.get(key).and_then(Value::as_str).map(str::to_owned)
}

fn first_meeting(records: &[JsonRecord]) -> Option<MeetingRef> {
    let record = records.first()?;
    Some(MeetingRef {
        id: record_str(record, "Id")?,
        name: record_str(record, "Name"),
    })
}

/// Resolve the canonical meeting record.
///
/// # Errors
///
/// Returns `AppError::Validation` when neither a meeting id nor a
/// (class, date) pair was supplied, `AppError::Discovery` when the
/// fallback cannot bind the class or date role (the message carries the
/// partial bindings), and `AppError::Crm` when a mandatory query fails.
pub async fn locate(api: &dyn CrmApi, request: &MeetingQuery) -> Result<MeetingLookup> {
    // Stage 1: direct lookup by primary key; terminal either way.
    if let Some(meeting_id) = request.meeting_id.as_deref() {
        let soql = format!(
            "SELECT Id, Name FROM {MEETING_OBJECT} WHERE Id = {} LIMIT 1",
            soql::quote(meeting_id)
        );
        let response = api.query(&soql).await?;
        return Ok(MeetingLookup {
            meeting: first_meeting(&response.records),
            used_fields: MeetingFieldsUsed::direct(),
            discovered: None,
        });
    }

    let (Some(class_id), Some(date)) = (request.class_id.as_deref(), request.date.as_deref())
    else {
        return Err(AppError::Validation(
            "provide meetingId or both classId and date".into(),
        ));
    };

    // Stage 2: exact-schema attempt. A query error here usually means the
    // expected field names do not exist in this org; swallow and fall
    // through to discovery.
    let exact_soql = format!(
        "SELECT Id, Name FROM {MEETING_OBJECT} WHERE {EXACT_CLASS_FIELD} = {} AND {EXACT_DATE_FIELD} = {date} LIMIT 1",
        soql::quote(class_id)
    );
    match api.query(&exact_soql).await {
        Ok(response) => {
            if let Some(meeting) = first_meeting(&response.records) {
                return Ok(MeetingLookup {
                    meeting: Some(meeting),
                    used_fields: MeetingFieldsUsed {
                        via: LocateVia::Exact,
                        class_field: Some(EXACT_CLASS_FIELD.to_owned()),
                        date_field: Some(EXACT_DATE_FIELD.to_owned()),
                        date_type: Some("date".to_owned()),
                    },
                    discovered: None,
                });
            }
        }
        Err(err) => {
            warn!(%err, "exact-schema meeting query failed; falling back to discovery");
        }
    }

    // Stage 3: discovery fallback.
    let discovered = schema::discover_meeting_schema(api).await?;

    let class_field = request
        .class_field_override
        .clone()
        .or_else(|| discovered.class_field.clone());
    let date_field = request
        .date_field_override
        .clone()
        .or_else(|| discovered.date_field.clone());

    let (Some(class_field), Some(date_field)) = (class_field, date_field) else {
        let partial = serde_json::to_string(&discovered).unwrap_or_default();
        return Err(AppError::Discovery(format!(
            "unable to discover class meeting fields: {partial}"
        )));
    };

    // A datetime field stores a timestamp; compare at day granularity so
    // time-of-day never excludes the meeting.
    let date_predicate = if discovered.date_type.as_deref() == Some("datetime") {
        format!("DAY_ONLY({date_field}) = {date}")
    } else {
        format!("{date_field} = {date}")
    };

    let soql = format!(
        "SELECT Id, Name FROM {} WHERE {class_field} = {} AND {date_predicate} LIMIT 1",
        discovered.object_name,
        soql::quote(class_id)
    );
    let response = api.query(&soql).await?;

    Ok(MeetingLookup {
        meeting: first_meeting(&response.records),
        used_fields: MeetingFieldsUsed {
            via: LocateVia::Discovered,
            class_field: Some(class_field),
            date_field: Some(date_field),
            date_type: discovered.date_type.clone(),
        },
        discovered: Some(discovered),
    })
}

/// Verify a meeting id refers to an existing record.
///
/// This is the single mandatory check gating every write request.
///
/// # Errors
///
/// Returns `AppError::NotFound` when the meeting does not exist and
/// `AppError::Crm` when the verification query itself fails.
pub async fn verify_exists(api: &dyn CrmApi, meeting_id: &str) -> Result<()> {
    let soql = format!(
        "SELECT Id FROM {MEETING_OBJECT} WHERE Id = {} LIMIT 1",
        soql::quote(meeting_id)
    );
    let response = api.query(&soql).await?;
    if response.records.is_empty() {
        return Err(AppError::NotFound(format!(
            "class meeting {meeting_id} does not exist"
        )));
    }
    Ok(())
}
