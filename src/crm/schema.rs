//! Defensive schema discovery.
//!
//! The org's actual field names are not guaranteed to match the expected
//! schema, so structural roles (the class lookup on a meeting, the date
//! field, the meeting lookup on an attendance object) are discovered from
//! metadata when the exact names fail. Heuristics prefer declared
//! reference targets over name keywords, and exact `date` fields over
//! `datetime` fields because the query predicate differs downstream.

use serde::Serialize;
use tracing::{debug, warn};

use crate::crm::api::{CrmApi, FieldDescribe};
use crate::Result;

/// Expected API name of the class-meeting object.
pub const MEETING_OBJECT: &str = "Yeshiva_Class_Meeting__c";
/// Expected API name of the class object.
pub const CLASS_OBJECT: &str = "Yeshiva_Classes__c";
/// Contact object name, the reference target of student lookups.
pub const CONTACT_OBJECT: &str = "Contact";
/// Expected class-lookup field on the meeting object.
pub const EXACT_CLASS_FIELD: &str = "Yeshiva_Classes__c";
/// Expected date field on the meeting object.
pub const EXACT_DATE_FIELD: &str = "Class_Start_Date__c";
/// Instructor lookup on the class object.
pub const TEACHER_FIELD: &str = "Teacher__c";
/// Relationship name used to select the instructor's display name.
pub const TEACHER_RELATION: &str = "Teacher__r";
/// First-meeting date field on the class object.
pub const CLASS_START_FIELD: &str = "Start_Date__c";
/// Last-meeting date field on the class object.
pub const CLASS_END_FIELD: &str = "End_Date__c";

/// Discovered field-role bindings on the meeting object.
///
/// A `None` role means no candidate field matched; the meeting locator
/// decides whether that is fatal for the requested operation.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MeetingSchema {
    /// Object the bindings apply to.
    pub object_name: String,
    /// Lookup field from meeting to class.
    pub class_field: Option<String>,
    /// Date or datetime field holding the meeting date.
    pub date_field: Option<String>,
    /// Declared type of `date_field` (`date` or `datetime`).
    pub date_type: Option<String>,
}

/// Discovered bindings on a per-student tracking object (attendance or
/// supervision ratings).
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TrackingSchema {
    /// Object the bindings apply to.
    pub object_name: String,
    /// Mandatory lookup field from the tracking record to the meeting.
    pub meeting_field: String,
    /// Optional lookup to the student contact.
    pub student_field: Option<String>,
    /// Optional primary mutable value field (status or rating).
    pub value_field: Option<String>,
    /// Optional free-text field (comments or notes).
    pub notes_field: Option<String>,
}

/// Keyword heuristics for one tracking category.
#[derive(Debug, Clone, Copy)]
pub struct TrackingCategory {
    /// Human label used in logs and ledger messages.
    pub label: &'static str,
    /// Substring selecting candidate objects from the global catalog.
    pub object_keyword: &'static str,
    /// Fallback substring for the meeting lookup field name.
    pub meeting_keyword: &'static str,
    /// Substrings selecting the primary value field.
    pub value_keywords: &'static [&'static str],
    /// Substrings selecting the free-text field.
    pub notes_keywords: &'static [&'static str],
}

/// Attendance tracking: status plus free-text comments.
pub const ATTENDANCE: TrackingCategory = TrackingCategory {
    label: "attendance",
    object_keyword: "attendance",
    meeting_keyword: "class_meeting",
    value_keywords: &["status"],
    notes_keywords: &["notes", "comment"],
};

/// Supervision ratings: rating plus free-text notes.
pub const SUPERVISION: TrackingCategory = TrackingCategory {
    label: "supervision",
    object_keyword: "supervision",
    meeting_keyword: "class_meeting",
    value_keywords: &["rating", "score"],
    notes_keywords: &["notes", "comment"],
};

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_ascii_lowercase().contains(&needle.to_ascii_lowercase())
}

fn ends_with_ci(haystack: &str, suffix: &str) -> bool {
    haystack.to_ascii_lowercase().ends_with(&suffix.to_ascii_lowercase())
}

/// Find the lookup field for a "reference to `target`" role.
///
/// Prefers a reference-type field whose declared target list contains
/// `target`; falls back to a reference-type field whose own name contains
/// `keyword`.
#[must_use]
pub fn find_reference_field<'a>(
    fields: &'a [FieldDescribe],
    target: &str,
    keyword: &str,
) -> Option<&'a FieldDescribe> {
    fields
        .iter()
        .find(|f| f.field_type == "reference" && f.reference_to.iter().any(|t| t == target))
        .or_else(|| {
            fields
                .iter()
                .find(|f| f.field_type == "reference" && contains_ci(&f.name, keyword))
        })
}

/// Find the field for a date-like role.
///
/// Preference ladder: date field with a keyword, any date field, datetime
/// field with a keyword, any datetime field. The order matters because a
/// datetime field needs a day-truncation predicate downstream.
#[must_use]
pub fn find_date_field<'a>(
    fields: &'a [FieldDescribe],
    keywords: &[&str],
) -> Option<&'a FieldDescribe> {
    let with_keyword = |field_type: &str| {
        fields.iter().find(|f| {
            f.field_type == field_type && keywords.iter().any(|k| contains_ci(&f.name, k))
        })
    };
    let first_of = |field_type: &str| fields.iter().find(|f| f.field_type == field_type);

    with_keyword("date")
        .or_else(|| first_of("date"))
        .or_else(|| with_keyword("datetime"))
        .or_else(|| first_of("datetime"))
}

/// Find any field whose name contains one of `keywords`.
#[must_use]
pub fn find_field_by_keywords<'a>(
    fields: &'a [FieldDescribe],
    keywords: &[&str],
) -> Option<&'a FieldDescribe> {
    fields
        .iter()
        .find(|f| keywords.iter().any(|k| contains_ci(&f.name, k)))
}

/// Discover the class-lookup and date roles on the meeting object.
///
/// Roles that fail to bind are `None`; the caller decides which are
/// mandatory.
///
/// # Errors
///
/// Returns `AppError::Crm` when the describe call itself fails.
pub async fn discover_meeting_schema(api: &dyn CrmApi) -> Result<MeetingSchema> {
    let describe = api.describe(MEETING_OBJECT).await?;

    let class_field = find_reference_field(&describe.fields, CLASS_OBJECT, "class");
    let date_field = find_date_field(&describe.fields, &["date", "start"]);

    Ok(MeetingSchema {
        object_name: MEETING_OBJECT.to_owned(),
        class_field: class_field.map(|f| f.name.clone()),
        date_field: date_field.map(|f| f.name.clone()),
        date_type: date_field.map(|f| f.field_type.clone()),
    })
}

/// Discover the tracking object for a category (attendance, supervision).
///
/// Enumerates queryable catalog objects whose name contains the category
/// keyword, skipping audit/history/change-event variants, and returns the
/// first candidate carrying a meeting lookup, together with whatever
/// optional fields the keyword heuristics find. `Ok(None)` means the org
/// has no such object — feature unavailable, not an error. A describe
/// failure on one candidate is logged and the scan continues.
///
/// # Errors
///
/// Returns `AppError::Crm` only when the global describe fails.
pub async fn discover_tracking_object(
    api: &dyn CrmApi,
    category: TrackingCategory,
) -> Result<Option<TrackingSchema>> {
    let global = api.describe_global().await?;

    let candidates: Vec<String> = global
        .sobjects
        .iter()
        .filter(|s| s.queryable)
        .filter(|s| contains_ci(&s.name, category.object_keyword))
        .filter(|s| !ends_with_ci(&s.name, "ChangeEvent"))
        .filter(|s| !ends_with_ci(&s.name, "History"))
        .map(|s| s.name.clone())
        .collect();

    for object_name in candidates {
        let describe = match api.describe(&object_name).await {
            Ok(describe) => describe,
            Err(err) => {
                warn!(object = %object_name, %err, "describe failed; trying next candidate");
                continue;
            }
        };

        let Some(meeting_field) =
            find_reference_field(&describe.fields, MEETING_OBJECT, category.meeting_keyword)
        else {
            debug!(object = %object_name, "no meeting lookup; trying next candidate");
            continue;
        };

        let student_field = describe
            .fields
            .iter()
            .find(|f| f.field_type == "reference" && contains_ci(&f.name, "student"))
            .or_else(|| {
                describe.fields.iter().find(|f| {
                    f.field_type == "reference"
                        && f.reference_to.iter().any(|t| t == CONTACT_OBJECT)
                })
            });
        let value_field = find_field_by_keywords(&describe.fields, category.value_keywords);
        let notes_field = find_field_by_keywords(&describe.fields, category.notes_keywords);

        return Ok(Some(TrackingSchema {
            meeting_field: meeting_field.name.clone(),
            student_field: student_field.map(|f| f.name.clone()),
            value_field: value_field.map(|f| f.name.clone()),
            notes_field: notes_field.map(|f| f.name.clone()),
            object_name,
        }));
    }

    Ok(None)
}
