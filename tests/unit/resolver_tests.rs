//! Unit tests for batched display-name resolution.
//!
//! Covers the ceil(N/C) chunk count, order preservation, identifier
//! dedup, partial results on chunk failure, and the precedence of names
//! already embedded in the raw value.

use serde_json::Value;

use rosterbridge::crm::api::JsonRecord;
use rosterbridge::crm::identity::ReferenceParser;
use rosterbridge::crm::resolver::{resolve_contact_names, resolve_students};
use rosterbridge::AppError;

use super::stub_crm::{record, response, StubCrm};

const STUDENT_FIELD: &str = "Student__c";

fn student_id(index: usize) -> String {
    format!("003{index:012}")
}

fn student_record(raw: Value) -> JsonRecord {
    record(&[
        ("Id", Value::from(format!("a0A{:012}", 1))),
        ("Name", Value::from("AT-0001")),
        (STUDENT_FIELD, raw),
    ])
}

/// Answer every id in the query's `IN (…)` list with `Student <id>`.
fn echo_names(soql: &str) -> rosterbridge::Result<rosterbridge::crm::api::QueryResponse> {
    let Some(list_start) = soql.find("IN (").map(|i| i + 4) else {
        return Ok(response(Vec::new()));
    };
    let list = &soql[list_start..soql.len().saturating_sub(1)];
    let records = list
        .split(',')
        .map(|quoted| quoted.trim().trim_matches('\''))
        .filter(|id| !id.is_empty())
        .map(|id| {
            record(&[
                ("Id", Value::from(id)),
                ("Name", Value::from(format!("Student {id}"))),
            ])
        })
        .collect();
    Ok(response(records))
}

fn parser() -> ReferenceParser {
    ReferenceParser::contacts().expect("contact patterns compile")
}

#[tokio::test]
async fn chunking_issues_ceil_n_over_c_queries() {
    let ids: Vec<String> = (0..250).map(student_id).collect();
    let stub = StubCrm::new().with_query(echo_names);

    let names = resolve_contact_names(&stub, &ids, 100).await;

    assert_eq!(stub.issued_queries().len(), 3, "250 ids at 100/chunk");
    assert_eq!(names.len(), 250, "every id resolves");
}

#[tokio::test]
async fn empty_id_set_issues_no_queries() {
    let stub = StubCrm::new().with_query(echo_names);
    let names = resolve_contact_names(&stub, &[], 100).await;

    assert!(names.is_empty());
    assert!(stub.issued_queries().is_empty());
}

#[tokio::test]
async fn records_keep_their_position_and_identifier_alignment() {
    let records: Vec<JsonRecord> = (0..7)
        .map(|i| student_record(Value::from(student_id(i))))
        .collect();
    let stub = StubCrm::new().with_query(echo_names);

    let students = resolve_students(&stub, &parser(), &records, Some(STUDENT_FIELD), 3).await;

    assert_eq!(students.len(), 7);
    for (index, student) in students.iter().enumerate() {
        let expected = student_id(index);
        assert_eq!(student.id.as_deref(), Some(expected.as_str()));
        assert_eq!(
            student.name.as_deref(),
            Some(format!("Student {expected}").as_str()),
            "record {index} must keep its own student's name"
        );
    }
}

#[tokio::test]
async fn duplicate_identifiers_are_deduplicated_before_chunking() {
    let records: Vec<JsonRecord> = (0..6)
        .map(|i| student_record(Value::from(student_id(i % 2))))
        .collect();
    let stub = StubCrm::new().with_query(echo_names);

    let students = resolve_students(&stub, &parser(), &records, Some(STUDENT_FIELD), 1).await;

    assert_eq!(
        stub.issued_queries().len(),
        2,
        "two distinct ids at one per chunk"
    );
    assert!(students.iter().all(|s| s.name.is_some()));
}

#[tokio::test]
async fn failed_chunk_yields_partial_names_not_an_error() {
    let poisoned = student_id(1);
    let records: Vec<JsonRecord> = (0..2)
        .map(|i| student_record(Value::from(student_id(i))))
        .collect();

    let stub = StubCrm::new().with_query(move |soql| {
        if soql.contains(&poisoned) {
            Err(AppError::Crm("query timed out".into()))
        } else {
            echo_names(soql)
        }
    });

    let students = resolve_students(&stub, &parser(), &records, Some(STUDENT_FIELD), 1).await;

    assert_eq!(students.len(), 2);
    assert!(students[0].name.is_some(), "healthy chunk resolves");
    assert!(
        students[1].name.is_none(),
        "failed chunk leaves the name unresolved"
    );
    assert_eq!(students[1].id.as_deref(), Some(student_id(1).as_str()));
}

#[tokio::test]
async fn anchor_embedded_names_win_over_batch_resolution() {
    let id = student_id(0);
    let anchored = student_record(Value::from(format!("<a href=\"/{id}\">Anchor Name</a>")));
    let stub = StubCrm::new().with_query(echo_names);

    let students = resolve_students(&stub, &parser(), &[anchored], Some(STUDENT_FIELD), 100).await;

    assert_eq!(students[0].name.as_deref(), Some("Anchor Name"));
}

#[tokio::test]
async fn plain_name_values_resolve_without_any_lookup() {
    let named = student_record(Value::from("Miriam Levi"));
    let stub = StubCrm::new().with_query(echo_names);

    let students = resolve_students(&stub, &parser(), &[named], Some(STUDENT_FIELD), 100).await;

    assert_eq!(students[0].id, None);
    assert_eq!(students[0].name.as_deref(), Some("Miriam Levi"));
    assert!(
        stub.issued_queries().is_empty(),
        "no valid ids means no lookup queries"
    );
}

#[tokio::test]
async fn unbound_student_field_yields_empty_identities() {
    let records = vec![student_record(Value::from(student_id(0)))];
    let stub = StubCrm::new().with_query(echo_names);

    let students = resolve_students(&stub, &parser(), &records, None, 100).await;

    assert_eq!(students[0], Default::default());
    assert!(stub.issued_queries().is_empty());
}
