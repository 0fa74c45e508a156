//! Batched display-name resolution for reference fields.
//!
//! Collects the distinct identifiers found on a record set, fetches their
//! display names in fixed-size chunks, and merges the results back without
//! disturbing record order. A failed chunk yields no names for its
//! identifiers — partial data, not a request failure.

use std::collections::{HashMap, HashSet};

use futures_util::future::join_all;
use serde_json::Value;
use tracing::warn;

use crate::crm::api::{CrmApi, JsonRecord};
use crate::crm::identity::{NormalizedIdentity, ReferenceParser};
use crate::crm::schema::CONTACT_OBJECT;
use crate::crm::soql;

/// Student identity attached to one tracking record, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedStudent {
    /// Student record identifier, when the raw value carried one.
    pub id: Option<String>,
    /// Display name, from the raw value or the batch lookup.
    pub name: Option<String>,
}

/// Batch-resolve contact display names.
///
/// Issues `ceil(ids.len() / chunk_size)` queries, concurrently; results
/// are merged by identifier so completion order never affects the output.
/// A chunk failure is logged and skipped.
pub async fn resolve_contact_names(
    api: &dyn CrmApi,
    ids: &[String],
    chunk_size: usize,
) -> HashMap<String, String> {
    let mut names = HashMap::new();
    if ids.is_empty() {
        return names;
    }

    let chunk_size = chunk_size.max(1);
    let queries = ids.chunks(chunk_size).map(|chunk| {
        let soql = format!(
            "SELECT Id, Name FROM {CONTACT_OBJECT} WHERE Id IN ({})",
            soql::in_list(chunk)
        );
        async move { api.query(&soql).await }
    });

    for outcome in join_all(queries).await {
        match outcome {
            Ok(response) => {
                for record in &response.records {
                    if let (Some(id), Some(name)) = (
                        record.get("Id").and_then(Value::as_str),
                        record.get("Name").and_then(Value::as_str),
                    ) {
                        names.insert(id.to_owned(), name.to_owned());
                    }
                }
            }
            Err(err) => {
                warn!(%err, "contact name chunk query failed; leaving names unresolved");
            }
        }
    }

    names
}

/// Parse the student reference on each record and resolve missing display
/// names in bulk.
///
/// The output is index-aligned with `records`. When `student_field` is
/// unbound every entry is empty — the role is unavailable, not an error.
pub async fn resolve_students(
    api: &dyn CrmApi,
    parser: &ReferenceParser,
    records: &[JsonRecord],
    student_field: Option<&str>,
    chunk_size: usize,
) -> Vec<ResolvedStudent> {
    let parsed: Vec<NormalizedIdentity> = records
        .iter()
        .map(|record| {
            student_field
                .and_then(|field| record.get(field))
                .map_or_else(NormalizedIdentity::default, |raw| parser.parse(raw))
        })
        .collect();

    // Distinct well-formed identifiers, input order preserved.
    let mut seen = HashSet::new();
    let ids: Vec<String> = parsed
        .iter()
        .filter_map(|identity| identity.id.clone())
        .filter(|id| parser.is_valid_id(id))
        .filter(|id| seen.insert(id.clone()))
        .collect();

    let names = resolve_contact_names(api, &ids, chunk_size).await;

    parsed
        .into_iter()
        .map(|identity| {
            let name = identity.display_name.or_else(|| {
                identity
                    .id
                    .as_deref()
                    .and_then(|id| names.get(id).cloned())
            });
            ResolvedStudent {
                id: identity.id,
                name,
            }
        })
        .collect()
}
