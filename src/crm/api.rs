//! Collaborator interface to the CRM REST API.
//!
//! The [`CrmApi`] trait decouples the discovery, locator, resolver, and
//! reconciler components from the HTTP transport. The production
//! implementation is [`crate::crm::client::RestClient`]; tests substitute
//! scripted stubs. Methods return boxed futures so the trait stays
//! object-safe.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Result;

/// Boxed future type used by [`CrmApi`] methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One CRM record: a mapping from field name to value. Relationship
/// traversal fields appear as nested mappings or encoded strings.
pub type JsonRecord = Map<String, Value>;

/// Result of a SOQL query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    /// Number of records matching the query.
    #[serde(default)]
    pub total_size: u64,
    /// Matching records in query order.
    #[serde(default)]
    pub records: Vec<JsonRecord>,
}

/// One field from an object describe.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescribe {
    /// API name of the field.
    pub name: String,
    /// Declared field type (`reference`, `date`, `datetime`, …).
    #[serde(rename = "type")]
    pub field_type: String,
    /// Target objects, for reference-type fields.
    #[serde(default)]
    pub reference_to: Vec<String>,
}

/// Metadata describe of a single object.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectDescribe {
    /// API name of the object.
    pub name: String,
    /// All declared fields.
    #[serde(default)]
    pub fields: Vec<FieldDescribe>,
}

/// One entry of the global object catalog.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SObjectStub {
    /// API name of the object.
    pub name: String,
    /// Whether SOQL may target the object.
    #[serde(default)]
    pub queryable: bool,
}

/// Global describe: the org's object catalog.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalDescribe {
    /// Catalog entries in org order.
    #[serde(default)]
    pub sobjects: Vec<SObjectStub>,
}

/// One error attached to a failed save.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveError {
    /// Human-readable failure description.
    #[serde(default)]
    pub message: String,
    /// CRM error code, when reported.
    #[serde(default)]
    pub status_code: Option<String>,
}

/// Per-record outcome of an update call.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveResult {
    /// Record id the outcome refers to.
    #[serde(default)]
    pub id: Option<String>,
    /// Whether the record was written.
    #[serde(default)]
    pub success: bool,
    /// Failure detail when `success` is false.
    #[serde(default)]
    pub errors: Vec<SaveError>,
}

impl SaveResult {
    /// Collapse attached errors into a single message for the ledger.
    #[must_use]
    pub fn error_message(&self) -> String {
        if self.errors.is_empty() {
            "update failed".into()
        } else {
            self.errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; ")
        }
    }
}

/// Read/write surface of the CRM consumed by the core components.
///
/// All read methods are safe to retry; update methods are not.
pub trait CrmApi: Send + Sync {
    /// Execute a SOQL query.
    fn query(&self, soql: &str) -> BoxFuture<'_, Result<QueryResponse>>;

    /// Describe a single object's fields.
    fn describe(&self, object: &str) -> BoxFuture<'_, Result<ObjectDescribe>>;

    /// Fetch the global object catalog.
    fn describe_global(&self) -> BoxFuture<'_, Result<GlobalDescribe>>;

    /// Update a single record by id.
    fn update_one(
        &self,
        object: &str,
        id: &str,
        fields: JsonRecord,
    ) -> BoxFuture<'_, Result<SaveResult>>;

    /// Update a batch of records. Each record carries its own `Id` field.
    /// With `all_or_none` false the CRM reports per-record outcomes and
    /// keeps processing past individual failures.
    fn update_many(
        &self,
        object: &str,
        records: Vec<JsonRecord>,
        all_or_none: bool,
    ) -> BoxFuture<'_, Result<Vec<SaveResult>>>;
}
