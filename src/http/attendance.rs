//! Meeting resolution with enriched attendance/supervision lists, and the
//! apply-updates operation.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

use super::{ensure_connection, AppState};
use crate::crm::api::{CrmApi, JsonRecord};
use crate::crm::meeting::{self, MeetingQuery};
use crate::crm::reconcile::{self, UpdateSpec};
use crate::crm::resolver::{self, ResolvedStudent};
use crate::crm::schema::{self, TrackingCategory, TrackingSchema, ATTENDANCE, SUPERVISION};
use crate::crm::soql;
use crate::dates::normalize_date;
use crate::models::attendance::{
    AttendanceRow, AttendanceUpdateItem, ReconciliationLedger, SupervisionRow,
    SupervisionUpdateItem,
};
use crate::models::meeting::{MeetingFieldsUsed, MeetingRef};
use crate::{AppError, Result};

/// Query parameters for meeting resolution.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ByMeetingParams {
    /// Direct meeting identifier; wins over the (class, date) pair.
    pub meeting_id: Option<String>,
    /// Class identifier for the composite key.
    pub class_id: Option<String>,
    /// Meeting date in either accepted format.
    pub start: Option<String>,
    /// Caller-forced class lookup field name.
    pub class_field: Option<String>,
    /// Caller-forced date field name.
    pub date_field: Option<String>,
}

/// Successful meeting-resolution response body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ByMeetingResponse {
    /// Echo of the class id, when the composite key was used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_id: Option<String>,
    /// Echo of the normalized date.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    /// The resolved meeting.
    pub meeting: MeetingRef,
    /// Locator diagnostics.
    pub used_meeting_fields: MeetingFieldsUsed,
    /// Attendance records for the meeting, enriched with student names.
    pub attendance: Vec<AttendanceRow>,
    /// Supervision ratings for the meeting; empty when the org has no
    /// supervision object.
    pub supervision: Vec<SupervisionRow>,
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_owned)
}

fn record_str(record: &JsonRecord, key: &str) -> Option<String> {
    record.get(key).and_then(Value::as_str).map(str::to_owned)
}

fn record_value(record: &JsonRecord, field: Option<&str>) -> Option<Value> {
    field
        .and_then(|name| record.get(name))
        .filter(|value| !value.is_null())
        .cloned()
}

/// `GET /api/sfdc/attendance/by-meeting` — resolve the meeting and return
/// its enriched attendance and supervision lists.
///
/// # Errors
///
/// Returns `AppError::Validation` for malformed inputs (before any CRM
/// call), `AppError::Discovery` when mandatory meeting roles cannot be
/// bound, and `AppError::Crm` when a mandatory query fails.
pub async fn by_meeting(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<ByMeetingParams>,
) -> Result<Response> {
    let meeting_id = non_empty(params.meeting_id.as_deref());
    let class_id = non_empty(params.class_id.as_deref());
    let raw_start = non_empty(params.start.as_deref());

    if meeting_id.is_none() && (class_id.is_none() || raw_start.is_none()) {
        return Err(AppError::Validation(
            "provide meetingId OR (classId and start in YYYY-MM-DD or MM/DD/YYYY)".into(),
        ));
    }

    // Date validation happens before any CRM call.
    let start = match raw_start {
        Some(ref raw) if meeting_id.is_none() => Some(normalize_date(raw)?),
        _ => None,
    };

    let connection = ensure_connection(&state, &headers).await?;
    let api: &dyn CrmApi = &connection.client;

    let request = MeetingQuery {
        meeting_id,
        class_id: class_id.clone(),
        date: start.clone(),
        class_field_override: non_empty(params.class_field.as_deref()),
        date_field_override: non_empty(params.date_field.as_deref()),
    };
    let lookup = meeting::locate(api, &request).await?;

    let Some(found) = lookup.meeting else {
        let body = Json(json!({
            "error": "Class meeting not found",
            "classId": class_id,
            "start": start,
            "meetingInfo": lookup.discovered,
            "usedMeetingFields": lookup.used_fields,
        }));
        let response = (StatusCode::NOT_FOUND, body).into_response();
        return Ok(connection.finalize(&state, response));
    };

    let Some(attendance_schema) = schema::discover_tracking_object(api, ATTENDANCE).await? else {
        let body = Json(json!({
            "error": "Attendance object not found via common candidates",
            "meeting": found,
            "usedMeetingFields": lookup.used_fields,
        }));
        let response = (StatusCode::NOT_FOUND, body).into_response();
        return Ok(connection.finalize(&state, response));
    };

    let (records, students) =
        fetch_tracking_rows(api, &state, &attendance_schema, &found.id).await;
    let attendance = records
        .iter()
        .zip(&students)
        .filter_map(|(record, student)| {
            Some(AttendanceRow {
                id: record_str(record, "Id")?,
                name: record_str(record, "Name"),
                student_id: student.id.clone(),
                student_name: student.name.clone(),
                status: record_value(record, attendance_schema.value_field.as_deref()),
                comments: record_value(record, attendance_schema.notes_field.as_deref()),
            })
        })
        .collect();

    // Supervision is best-effort: an org without the object simply gets an
    // empty list.
    let supervision = match schema::discover_tracking_object(api, SUPERVISION).await {
        Ok(Some(supervision_schema)) => {
            let (records, students) =
                fetch_tracking_rows(api, &state, &supervision_schema, &found.id).await;
            records
                .iter()
                .zip(&students)
                .filter_map(|(record, student)| {
                    Some(SupervisionRow {
                        id: record_str(record, "Id")?,
                        name: record_str(record, "Name"),
                        student_id: student.id.clone(),
                        student_name: student.name.clone(),
                        rating: record_value(record, supervision_schema.value_field.as_deref()),
                        notes: record_value(record, supervision_schema.notes_field.as_deref()),
                    })
                })
                .collect()
        }
        Ok(None) => Vec::new(),
        Err(err) => {
            warn!(%err, "supervision discovery failed; returning no supervision rows");
            Vec::new()
        }
    };

    let body = ByMeetingResponse {
        class_id,
        start,
        meeting: found,
        used_meeting_fields: lookup.used_fields,
        attendance,
        supervision,
    };
    Ok(connection.finalize(&state, Json(body).into_response()))
}

/// Query a tracking object's records for one meeting and resolve student
/// identities.
///
/// The full select (with discovered optional fields) is attempted first;
/// if the CRM rejects it the query degrades to bare record ids, matching
/// the best-effort enrichment policy.
async fn fetch_tracking_rows(
    api: &dyn CrmApi,
    state: &AppState,
    tracking: &TrackingSchema,
    meeting_id: &str,
) -> (Vec<JsonRecord>, Vec<ResolvedStudent>) {
    let mut select_parts = vec!["Id".to_owned(), "Name".to_owned()];
    for field in [
        tracking.student_field.as_deref(),
        tracking.value_field.as_deref(),
        tracking.notes_field.as_deref(),
    ]
    .into_iter()
    .flatten()
    {
        select_parts.push(field.to_owned());
    }

    let full_soql = format!(
        "SELECT {} FROM {} WHERE {} = {}",
        select_parts.join(", "),
        tracking.object_name,
        tracking.meeting_field,
        soql::quote(meeting_id)
    );

    let records = match api.query(&full_soql).await {
        Ok(response) => response.records,
        Err(err) => {
            warn!(object = %tracking.object_name, %err, "full select failed; retrying with ids only");
            let bare_soql = format!(
                "SELECT Id FROM {} WHERE {} = {}",
                tracking.object_name,
                tracking.meeting_field,
                soql::quote(meeting_id)
            );
            match api.query(&bare_soql).await {
                Ok(response) => response.records,
                Err(err) => {
                    warn!(object = %tracking.object_name, %err, "bare select failed; returning no rows");
                    Vec::new()
                }
            }
        }
    };

    let students = resolver::resolve_students(
        api,
        &state.contacts,
        &records,
        tracking.student_field.as_deref(),
        state.config.crm.name_chunk_size,
    )
    .await;

    (records, students)
}

/// Request body of the apply-updates operation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatesRequest {
    /// Meeting the updates belong to; verified before any write.
    pub meeting_id: String,
    /// Attendance updates.
    #[serde(default)]
    pub attendance: Vec<AttendanceUpdateItem>,
    /// Supervision-rating updates.
    #[serde(default)]
    pub supervision: Vec<SupervisionUpdateItem>,
}

/// Response body: one ledger per category.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatesResponse {
    /// Echo of the meeting id.
    pub meeting_id: String,
    /// Attendance outcome.
    pub attendance: ReconciliationLedger,
    /// Supervision outcome.
    pub supervision: ReconciliationLedger,
}

fn attendance_spec(item: AttendanceUpdateItem, tracking: &TrackingSchema) -> UpdateSpec {
    let mut fields = JsonRecord::new();
    if let (Some(field), Some(value)) = (tracking.value_field.as_deref(), item.status) {
        fields.insert(field.to_owned(), value);
    }
    if let (Some(field), Some(value)) = (tracking.notes_field.as_deref(), item.comments) {
        fields.insert(field.to_owned(), value);
    }
    UpdateSpec {
        id: item.id,
        student_id: item.student_id,
        fields,
    }
}

fn supervision_spec(item: SupervisionUpdateItem, tracking: &TrackingSchema) -> UpdateSpec {
    let mut fields = JsonRecord::new();
    if let (Some(field), Some(value)) = (tracking.value_field.as_deref(), item.rating) {
        fields.insert(field.to_owned(), value);
    }
    if let (Some(field), Some(value)) = (tracking.notes_field.as_deref(), item.notes) {
        fields.insert(field.to_owned(), value);
    }
    UpdateSpec {
        id: item.id,
        student_id: item.student_id,
        fields,
    }
}

/// Mark a whole category failed when its tracking object is unavailable.
fn category_unavailable(count: usize, message: &str) -> ReconciliationLedger {
    let mut ledger = ReconciliationLedger::default();
    for _ in 0..count {
        ledger.record_failure(None, message);
    }
    ledger
}

/// Run one category's reconciliation: discover its tracking object, map
/// items onto concrete field names, and apply. Discovery failure fails
/// only this category.
async fn run_category(
    api: &dyn CrmApi,
    meeting_id: &str,
    category: TrackingCategory,
    specs: impl FnOnce(&TrackingSchema) -> Vec<UpdateSpec>,
    count: usize,
) -> ReconciliationLedger {
    if count == 0 {
        return ReconciliationLedger::default();
    }
    match schema::discover_tracking_object(api, category).await {
        Ok(Some(tracking)) => {
            reconcile::reconcile(api, meeting_id, &tracking, specs(&tracking)).await
        }
        Ok(None) => category_unavailable(
            count,
            &format!("no {} object found in this org", category.label),
        ),
        Err(err) => {
            warn!(category = category.label, %err, "tracking discovery failed");
            category_unavailable(count, &err.to_string())
        }
    }
}

/// `POST /api/sfdc/attendance/updates` — apply attendance and supervision
/// updates and report per-item outcomes.
///
/// # Errors
///
/// Returns `AppError::Validation` when `meetingId` is missing and
/// `AppError::NotFound` when the meeting does not exist; per-item
/// failures land in the ledgers instead.
pub async fn apply_updates(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<UpdatesRequest>,
) -> Result<Response> {
    let meeting_id = request.meeting_id.trim().to_owned();
    if meeting_id.is_empty() {
        return Err(AppError::Validation("missing meetingId".into()));
    }

    let connection = ensure_connection(&state, &headers).await?;
    let api: &dyn CrmApi = &connection.client;

    // The one mandatory gate: no writes against a meeting that does not
    // exist. This check is per request, not per item.
    meeting::verify_exists(api, &meeting_id).await?;

    let attendance_count = request.attendance.len();
    let attendance_items = request.attendance;
    let attendance = run_category(
        api,
        &meeting_id,
        ATTENDANCE,
        move |tracking| {
            attendance_items
                .into_iter()
                .map(|item| attendance_spec(item, tracking))
                .collect()
        },
        attendance_count,
    )
    .await;

    let supervision_count = request.supervision.len();
    let supervision_items = request.supervision;
    let supervision = run_category(
        api,
        &meeting_id,
        SUPERVISION,
        move |tracking| {
            supervision_items
                .into_iter()
                .map(|item| supervision_spec(item, tracking))
                .collect()
        },
        supervision_count,
    )
    .await;

    let body = UpdatesResponse {
        meeting_id,
        attendance,
        supervision,
    };
    Ok(connection.finalize(&state, Json(body).into_response()))
}
