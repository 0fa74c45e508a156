//! Roster-by-period: classes within a date range, grouped by instructor.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ensure_connection, AppState};
use crate::crm::api::{CrmApi, JsonRecord};
use crate::crm::schema::{
    CLASS_END_FIELD, CLASS_OBJECT, CLASS_START_FIELD, TEACHER_FIELD, TEACHER_RELATION,
};
use crate::dates::normalize_date_or;
use crate::models::roster::{ClassRecord, InstructorGroup};
use crate::Result;

const DEFAULT_PERIOD_START: &str = "2025-09-01";
const DEFAULT_PERIOD_END: &str = "2025-12-31";

/// Query parameters for the roster period.
#[derive(Debug, Deserialize)]
pub struct PeriodParams {
    /// Period start; defaults to the current term start.
    pub start: Option<String>,
    /// Period end; defaults to the current term end.
    pub end: Option<String>,
}

/// Roster response: the normalized period plus instructor groups.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterResponse {
    /// Normalized period start.
    pub start: String,
    /// Normalized period end.
    pub end: String,
    /// Groups sorted by instructor name ascending.
    pub teacher_groups: Vec<InstructorGroup>,
}

fn record_str(record: &JsonRecord, key: &str) -> Option<String> {
    record.get(key).and_then(Value::as_str).map(str::to_owned)
}

/// Group class records by their instructor lookup, preserving class order
/// within each group, then sort groups by instructor name.
fn group_by_instructor(records: &[JsonRecord]) -> Vec<InstructorGroup> {
    let mut groups: Vec<InstructorGroup> = Vec::new();
    let mut index_by_teacher: HashMap<String, usize> = HashMap::new();

    for record in records {
        let Some(teacher_id) = record_str(record, TEACHER_FIELD) else {
            continue;
        };
        let Some(teacher_name) = record
            .get(TEACHER_RELATION)
            .and_then(Value::as_object)
            .and_then(|rel| rel.get("Name"))
            .and_then(Value::as_str)
            .map(str::to_owned)
        else {
            continue;
        };

        let class = ClassRecord {
            id: match record_str(record, "Id") {
                Some(id) => id,
                None => continue,
            },
            name: record_str(record, "Name"),
            start_date: record_str(record, CLASS_START_FIELD),
            end_date: record_str(record, CLASS_END_FIELD),
        };

        match index_by_teacher.get(&teacher_id) {
            Some(&index) => groups[index].classes.push(class),
            None => {
                index_by_teacher.insert(teacher_id.clone(), groups.len());
                groups.push(InstructorGroup {
                    id: teacher_id,
                    name: teacher_name,
                    classes: vec![class],
                });
            }
        }
    }

    groups.sort_by(|a, b| a.name.cmp(&b.name));
    groups
}

/// `GET /api/sfdc/teachers/by-year?start=&end=` — roster by period.
///
/// # Errors
///
/// Returns `AppError::Validation` for unparseable dates (before any CRM
/// call) and `AppError::Crm` when the roster query fails.
pub async fn by_year(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<PeriodParams>,
) -> Result<Response> {
    let start = normalize_date_or(params.start.as_deref(), DEFAULT_PERIOD_START)?;
    let end = normalize_date_or(params.end.as_deref(), DEFAULT_PERIOD_END)?;

    let connection = ensure_connection(&state, &headers).await?;

    let soql = format!(
        "SELECT Id, Name, {TEACHER_FIELD}, {TEACHER_RELATION}.Name, {CLASS_START_FIELD}, {CLASS_END_FIELD} \
         FROM {CLASS_OBJECT} WHERE {CLASS_START_FIELD} >= {start} AND {CLASS_END_FIELD} <= {end}"
    );
    let result = connection.client.query(&soql).await?;

    let body = RosterResponse {
        start,
        end,
        teacher_groups: group_by_instructor(&result.records),
    };
    Ok(connection.finalize(&state, Json(body).into_response()))
}
