//! Unit tests for the meeting locator state machine.
//!
//! Covers the direct-by-id path, the exact-schema short circuit, the
//! fall-through on exact-schema query errors, the date vs datetime
//! predicate choice, override substitution, and the mandatory-role
//! discovery error.

use serde_json::Value;

use rosterbridge::crm::meeting::{locate, verify_exists, MeetingQuery};
use rosterbridge::models::meeting::LocateVia;
use rosterbridge::AppError;

use super::stub_crm::{describe_of, field, id_name, response, StubCrm};

const MEETING_ID: &str = "a0M000000000001";
const CLASS_ID: &str = "a0C000000000001";
const DATE: &str = "2025-09-10";

fn by_class_and_date() -> MeetingQuery {
    MeetingQuery {
        meeting_id: None,
        class_id: Some(CLASS_ID.to_owned()),
        date: Some(DATE.to_owned()),
        class_field_override: None,
        date_field_override: None,
    }
}

#[tokio::test]
async fn direct_lookup_returns_meeting_and_direct_diagnostics() {
    let stub = StubCrm::new()
        .with_query(|_| Ok(response(vec![id_name("a0M000000000001", "CM-0001")])));

    let request = MeetingQuery {
        meeting_id: Some(MEETING_ID.to_owned()),
        ..MeetingQuery::default()
    };
    let lookup = locate(&stub, &request).await.expect("direct lookup");

    let meeting = lookup.meeting.expect("meeting found");
    assert_eq!(meeting.id, MEETING_ID);
    assert_eq!(meeting.name.as_deref(), Some("CM-0001"));
    assert_eq!(lookup.used_fields.via, LocateVia::MeetingId);

    let queries = stub.issued_queries();
    assert_eq!(queries.len(), 1, "direct path issues exactly one query");
    assert!(queries[0].contains(&format!("WHERE Id = '{MEETING_ID}'")));
}

#[tokio::test]
async fn direct_lookup_miss_is_not_found_not_an_error() {
    let stub = StubCrm::new();

    let request = MeetingQuery {
        meeting_id: Some(MEETING_ID.to_owned()),
        ..MeetingQuery::default()
    };
    let lookup = locate(&stub, &request).await.expect("query succeeds");

    assert!(lookup.meeting.is_none());
    assert_eq!(lookup.used_fields.via, LocateVia::MeetingId);
}

#[tokio::test]
async fn exact_schema_hit_short_circuits_discovery() {
    let stub = StubCrm::new().with_query(|soql| {
        if soql.contains("Class_Start_Date__c") {
            Ok(response(vec![id_name("a0M000000000002", "CM-0002")]))
        } else {
            Ok(response(Vec::new()))
        }
    });

    let lookup = locate(&stub, &by_class_and_date()).await.expect("locate");

    assert_eq!(lookup.used_fields.via, LocateVia::Exact);
    assert_eq!(
        lookup.used_fields.class_field.as_deref(),
        Some("Yeshiva_Classes__c")
    );
    assert!(lookup.discovered.is_none(), "discovery must not run");
    assert!(
        stub.describes.lock().unwrap().is_empty(),
        "no describe call on the exact path"
    );
}

#[tokio::test]
async fn exact_query_error_falls_back_to_discovered_datetime_predicate() {
    let stub = StubCrm::new()
        .with_query(|soql| {
            if soql.contains("Class_Start_Date__c") {
                Err(AppError::Crm("No such column 'Class_Start_Date__c'".into()))
            } else if soql.contains("DAY_ONLY(Meeting_Time__c)") {
                Ok(response(vec![id_name("a0M000000000003", "CM-0003")]))
            } else {
                Ok(response(Vec::new()))
            }
        })
        .with_describe(|object| {
            Ok(describe_of(
                object,
                vec![
                    field("Name", "string", &[]),
                    field("Parent_Class__c", "reference", &["Yeshiva_Classes__c"]),
                    field("Meeting_Time__c", "datetime", &[]),
                ],
            ))
        });

    let lookup = locate(&stub, &by_class_and_date()).await.expect("locate");

    let meeting = lookup.meeting.expect("meeting found via discovery");
    assert_eq!(meeting.id, "a0M000000000003");
    assert_eq!(lookup.used_fields.via, LocateVia::Discovered);
    assert_eq!(lookup.used_fields.date_type.as_deref(), Some("datetime"));

    let queries = stub.issued_queries();
    let last = queries.last().expect("discovery query issued");
    assert!(
        last.contains(&format!("DAY_ONLY(Meeting_Time__c) = {DATE}")),
        "datetime fields compare at day granularity, got: {last}"
    );
    assert!(last.contains(&format!("Parent_Class__c = '{CLASS_ID}'")));
}

#[tokio::test]
async fn exact_miss_with_zero_rows_also_proceeds_to_discovery() {
    let stub = StubCrm::new()
        .with_query(|soql| {
            if soql.contains("Session_Date__c") {
                Ok(response(vec![id_name("a0M000000000004", "CM-0004")]))
            } else {
                Ok(response(Vec::new()))
            }
        })
        .with_describe(|object| {
            Ok(describe_of(
                object,
                vec![
                    field("Parent_Class__c", "reference", &["Yeshiva_Classes__c"]),
                    field("Session_Date__c", "date", &[]),
                ],
            ))
        });

    let lookup = locate(&stub, &by_class_and_date()).await.expect("locate");

    assert_eq!(lookup.used_fields.via, LocateVia::Discovered);
    let queries = stub.issued_queries();
    let last = queries.last().expect("discovery query issued");
    assert!(
        last.contains(&format!("Session_Date__c = {DATE}")),
        "date fields compare with plain equality, got: {last}"
    );
}

#[tokio::test]
async fn unbound_mandatory_roles_surface_a_discovery_error() {
    let stub = StubCrm::new()
        .with_query(|_| Err(AppError::Crm("no such column".into())))
        .with_describe(|object| {
            // No reference or date fields at all.
            Ok(describe_of(object, vec![field("Name", "string", &[])]))
        });

    let result = locate(&stub, &by_class_and_date()).await;

    match result {
        Err(AppError::Discovery(message)) => {
            assert!(
                message.contains("Yeshiva_Class_Meeting__c"),
                "diagnostics must name the partial bindings, got: {message}"
            );
        }
        other => panic!("expected discovery error, got {other:?}"),
    }
}

#[tokio::test]
async fn caller_overrides_replace_discovered_field_names() {
    let stub = StubCrm::new()
        .with_query(|soql| {
            if soql.contains("Forced_Class__c") {
                Ok(response(vec![id_name("a0M000000000005", "CM-0005")]))
            } else if soql.contains("Class_Start_Date__c") {
                Err(AppError::Crm("no such column".into()))
            } else {
                Ok(response(Vec::new()))
            }
        })
        .with_describe(|object| {
            Ok(describe_of(
                object,
                vec![
                    field("Parent_Class__c", "reference", &["Yeshiva_Classes__c"]),
                    field("Session_Date__c", "date", &[]),
                ],
            ))
        });

    let mut request = by_class_and_date();
    request.class_field_override = Some("Forced_Class__c".to_owned());
    let lookup = locate(&stub, &request).await.expect("locate");

    assert_eq!(
        lookup.used_fields.class_field.as_deref(),
        Some("Forced_Class__c")
    );
    assert!(lookup.meeting.is_some());
}

#[tokio::test]
async fn missing_identifiers_are_rejected_before_any_query() {
    let stub = StubCrm::new();
    let result = locate(&stub, &MeetingQuery::default()).await;

    assert!(matches!(result, Err(AppError::Validation(_))));
    assert!(stub.issued_queries().is_empty(), "no CRM call may be made");
}

#[tokio::test]
async fn verify_exists_passes_for_live_meetings() {
    let stub = StubCrm::new().with_query(|_| {
        Ok(response(vec![super::stub_crm::record(&[(
            "Id",
            Value::from("a0M000000000001"),
        )])]))
    });

    assert!(verify_exists(&stub, MEETING_ID).await.is_ok());
}

#[tokio::test]
async fn verify_exists_fails_with_not_found_for_unknown_meetings() {
    let stub = StubCrm::new();
    let result = verify_exists(&stub, MEETING_ID).await;

    match result {
        Err(AppError::NotFound(message)) => {
            assert!(message.contains(MEETING_ID));
        }
        other => panic!("expected not-found, got {other:?}"),
    }
}
