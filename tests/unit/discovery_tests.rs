//! Unit tests for object-level tracking discovery.
//!
//! Covers candidate filtering (queryable only, audit-variant exclusion),
//! catch-and-continue on describe failures, optional-role absence, and
//! the supervision keyword set.

use rosterbridge::crm::schema::{discover_tracking_object, ATTENDANCE, SUPERVISION};
use rosterbridge::AppError;

use super::stub_crm::{catalog, describe_of, field, sobject, StubCrm};

#[tokio::test]
async fn audit_variants_and_unqueryable_objects_are_excluded() {
    let stub = StubCrm::new()
        .with_global(|| {
            Ok(catalog(vec![
                sobject("Class_Attendance__ChangeEvent", true),
                sobject("Class_Attendance__History", true),
                sobject("Attendance_Archive__c", false),
                sobject("Class_Attendance__c", true),
            ]))
        })
        .with_describe(|object| {
            assert_eq!(
                object, "Class_Attendance__c",
                "excluded candidates must never be described"
            );
            Ok(describe_of(
                object,
                vec![
                    field("Class_Meeting__c", "reference", &["Yeshiva_Class_Meeting__c"]),
                    field("Student__c", "reference", &["Contact"]),
                    field("Status__c", "picklist", &[]),
                    field("Comments__c", "textarea", &[]),
                ],
            ))
        });

    let found = discover_tracking_object(&stub, ATTENDANCE)
        .await
        .expect("discovery succeeds")
        .expect("tracking object found");

    assert_eq!(found.object_name, "Class_Attendance__c");
    assert_eq!(found.meeting_field, "Class_Meeting__c");
    assert_eq!(found.student_field.as_deref(), Some("Student__c"));
    assert_eq!(found.value_field.as_deref(), Some("Status__c"));
    assert_eq!(found.notes_field.as_deref(), Some("Comments__c"));
}

#[tokio::test]
async fn describe_failure_on_one_candidate_does_not_abort_the_scan() {
    let stub = StubCrm::new()
        .with_global(|| {
            Ok(catalog(vec![
                sobject("Legacy_Attendance__c", true),
                sobject("Class_Attendance__c", true),
            ]))
        })
        .with_describe(|object| {
            if object == "Legacy_Attendance__c" {
                Err(AppError::Crm("insufficient access".into()))
            } else {
                Ok(describe_of(
                    object,
                    vec![field(
                        "Meeting__c",
                        "reference",
                        &["Yeshiva_Class_Meeting__c"],
                    )],
                ))
            }
        });

    let found = discover_tracking_object(&stub, ATTENDANCE)
        .await
        .expect("discovery succeeds")
        .expect("second candidate wins");

    assert_eq!(found.object_name, "Class_Attendance__c");
    assert_eq!(
        stub.describes.lock().unwrap().as_slice(),
        ["Legacy_Attendance__c", "Class_Attendance__c"],
        "candidates are evaluated in catalog order"
    );
}

#[tokio::test]
async fn candidates_without_a_meeting_lookup_are_skipped() {
    let stub = StubCrm::new()
        .with_global(|| {
            Ok(catalog(vec![
                sobject("Attendance_Summary__c", true),
                sobject("Class_Attendance__c", true),
            ]))
        })
        .with_describe(|object| {
            if object == "Attendance_Summary__c" {
                // Reference field, but to the wrong object and without the
                // keyword fallback.
                Ok(describe_of(
                    object,
                    vec![field("Account__c", "reference", &["Account"])],
                ))
            } else {
                Ok(describe_of(
                    object,
                    vec![field(
                        "Related_Class_Meeting__c",
                        "reference",
                        &["Other__c"],
                    )],
                ))
            }
        });

    let found = discover_tracking_object(&stub, ATTENDANCE)
        .await
        .expect("discovery succeeds")
        .expect("keyword fallback binds the meeting lookup");

    assert_eq!(found.object_name, "Class_Attendance__c");
    assert_eq!(found.meeting_field, "Related_Class_Meeting__c");
}

#[tokio::test]
async fn absent_optional_roles_are_not_a_failure() {
    let stub = StubCrm::new()
        .with_global(|| Ok(catalog(vec![sobject("Class_Attendance__c", true)])))
        .with_describe(|object| {
            Ok(describe_of(
                object,
                vec![field(
                    "Class_Meeting__c",
                    "reference",
                    &["Yeshiva_Class_Meeting__c"],
                )],
            ))
        });

    let found = discover_tracking_object(&stub, ATTENDANCE)
        .await
        .expect("discovery succeeds")
        .expect("tracking object found");

    assert_eq!(found.student_field, None);
    assert_eq!(found.value_field, None);
    assert_eq!(found.notes_field, None);
}

#[tokio::test]
async fn no_matching_object_reads_as_feature_unavailable() {
    let stub = StubCrm::new()
        .with_global(|| Ok(catalog(vec![sobject("Account", true)])));

    let found = discover_tracking_object(&stub, ATTENDANCE)
        .await
        .expect("discovery succeeds");

    assert!(found.is_none());
}

#[tokio::test]
async fn supervision_category_binds_rating_and_notes() {
    let stub = StubCrm::new()
        .with_global(|| Ok(catalog(vec![sobject("Student_Supervision__c", true)])))
        .with_describe(|object| {
            Ok(describe_of(
                object,
                vec![
                    field("Class_Meeting__c", "reference", &["Yeshiva_Class_Meeting__c"]),
                    field("Student__c", "reference", &["Contact"]),
                    field("Rating__c", "number", &[]),
                    field("Supervisor_Notes__c", "textarea", &[]),
                ],
            ))
        });

    let found = discover_tracking_object(&stub, SUPERVISION)
        .await
        .expect("discovery succeeds")
        .expect("supervision object found");

    assert_eq!(found.object_name, "Student_Supervision__c");
    assert_eq!(found.value_field.as_deref(), Some("Rating__c"));
    assert_eq!(found.notes_field.as_deref(), Some("Supervisor_Notes__c"));
}
