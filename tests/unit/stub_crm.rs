//! Scripted CRM stub shared by the discovery, locator, resolver, and
//! reconciler tests.
//!
//! Behavior is injected per test through closures; every call is also
//! recorded so assertions can inspect the exact SOQL and update payloads
//! the core issued.

use std::sync::Mutex;

use serde_json::Value;

use rosterbridge::crm::api::{
    BoxFuture, CrmApi, FieldDescribe, GlobalDescribe, JsonRecord, ObjectDescribe, QueryResponse,
    SObjectStub, SaveError, SaveResult,
};
use rosterbridge::{AppError, Result};

type QueryFn = dyn Fn(&str) -> Result<QueryResponse> + Send + Sync;
type DescribeFn = dyn Fn(&str) -> Result<ObjectDescribe> + Send + Sync;
type GlobalFn = dyn Fn() -> Result<GlobalDescribe> + Send + Sync;
type UpdateOneFn = dyn Fn(&str, &str, &JsonRecord) -> Result<SaveResult> + Send + Sync;
type UpdateManyFn = dyn Fn(&str, &[JsonRecord]) -> Result<Vec<SaveResult>> + Send + Sync;

pub struct StubCrm {
    pub queries: Mutex<Vec<String>>,
    pub describes: Mutex<Vec<String>>,
    pub single_updates: Mutex<Vec<(String, String, JsonRecord)>>,
    pub batch_updates: Mutex<Vec<(String, Vec<JsonRecord>, bool)>>,
    query_fn: Box<QueryFn>,
    describe_fn: Box<DescribeFn>,
    global_fn: Box<GlobalFn>,
    update_one_fn: Box<UpdateOneFn>,
    update_many_fn: Box<UpdateManyFn>,
}

impl StubCrm {
    pub fn new() -> Self {
        Self {
            queries: Mutex::new(Vec::new()),
            describes: Mutex::new(Vec::new()),
            single_updates: Mutex::new(Vec::new()),
            batch_updates: Mutex::new(Vec::new()),
            query_fn: Box::new(|_| Ok(QueryResponse::default())),
            describe_fn: Box::new(|object| {
                Err(AppError::Crm(format!("no describe scripted for {object}")))
            }),
            global_fn: Box::new(|| Ok(GlobalDescribe::default())),
            update_one_fn: Box::new(|_, id, _| Ok(save_ok(id))),
            update_many_fn: Box::new(|_, records| {
                Ok(records.iter().map(|_| save_ok("unset")).collect())
            }),
        }
    }

    pub fn with_query(
        mut self,
        f: impl Fn(&str) -> Result<QueryResponse> + Send + Sync + 'static,
    ) -> Self {
        self.query_fn = Box::new(f);
        self
    }

    pub fn with_describe(
        mut self,
        f: impl Fn(&str) -> Result<ObjectDescribe> + Send + Sync + 'static,
    ) -> Self {
        self.describe_fn = Box::new(f);
        self
    }

    pub fn with_global(
        mut self,
        f: impl Fn() -> Result<GlobalDescribe> + Send + Sync + 'static,
    ) -> Self {
        self.global_fn = Box::new(f);
        self
    }

    pub fn with_update_one(
        mut self,
        f: impl Fn(&str, &str, &JsonRecord) -> Result<SaveResult> + Send + Sync + 'static,
    ) -> Self {
        self.update_one_fn = Box::new(f);
        self
    }

    pub fn with_update_many(
        mut self,
        f: impl Fn(&str, &[JsonRecord]) -> Result<Vec<SaveResult>> + Send + Sync + 'static,
    ) -> Self {
        self.update_many_fn = Box::new(f);
        self
    }

    pub fn issued_queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

impl CrmApi for StubCrm {
    fn query(&self, soql: &str) -> BoxFuture<'_, Result<QueryResponse>> {
        self.queries.lock().unwrap().push(soql.to_owned());
        let result = (self.query_fn)(soql);
        Box::pin(async move { result })
    }

    fn describe(&self, object: &str) -> BoxFuture<'_, Result<ObjectDescribe>> {
        self.describes.lock().unwrap().push(object.to_owned());
        let result = (self.describe_fn)(object);
        Box::pin(async move { result })
    }

    fn describe_global(&self) -> BoxFuture<'_, Result<GlobalDescribe>> {
        let result = (self.global_fn)();
        Box::pin(async move { result })
    }

    fn update_one(
        &self,
        object: &str,
        id: &str,
        fields: JsonRecord,
    ) -> BoxFuture<'_, Result<SaveResult>> {
        self.single_updates
            .lock()
            .unwrap()
            .push((object.to_owned(), id.to_owned(), fields.clone()));
        let result = (self.update_one_fn)(object, id, &fields);
        Box::pin(async move { result })
    }

    fn update_many(
        &self,
        object: &str,
        records: Vec<JsonRecord>,
        all_or_none: bool,
    ) -> BoxFuture<'_, Result<Vec<SaveResult>>> {
        self.batch_updates
            .lock()
            .unwrap()
            .push((object.to_owned(), records.clone(), all_or_none));
        let result = (self.update_many_fn)(object, &records);
        Box::pin(async move { result })
    }
}

// ── Fixture builders ──────────────────────────────────────────────────────

pub fn record(pairs: &[(&str, Value)]) -> JsonRecord {
    pairs
        .iter()
        .map(|(key, value)| ((*key).to_owned(), value.clone()))
        .collect()
}

pub fn id_name(id: &str, name: &str) -> JsonRecord {
    record(&[("Id", Value::from(id)), ("Name", Value::from(name))])
}

pub fn response(records: Vec<JsonRecord>) -> QueryResponse {
    QueryResponse {
        total_size: u64::try_from(records.len()).unwrap(),
        records,
    }
}

pub fn field(name: &str, field_type: &str, reference_to: &[&str]) -> FieldDescribe {
    FieldDescribe {
        name: name.to_owned(),
        field_type: field_type.to_owned(),
        reference_to: reference_to.iter().map(|s| (*s).to_owned()).collect(),
    }
}

pub fn describe_of(name: &str, fields: Vec<FieldDescribe>) -> ObjectDescribe {
    ObjectDescribe {
        name: name.to_owned(),
        fields,
    }
}

pub fn sobject(name: &str, queryable: bool) -> SObjectStub {
    SObjectStub {
        name: name.to_owned(),
        queryable,
    }
}

pub fn catalog(objects: Vec<SObjectStub>) -> GlobalDescribe {
    GlobalDescribe { sobjects: objects }
}

pub fn save_ok(id: &str) -> SaveResult {
    SaveResult {
        id: Some(id.to_owned()),
        success: true,
        errors: Vec::new(),
    }
}

pub fn save_err(message: &str) -> SaveResult {
    SaveResult {
        id: None,
        success: false,
        errors: vec![SaveError {
            message: message.to_owned(),
            status_code: Some("FIELD_CUSTOM_VALIDATION_EXCEPTION".to_owned()),
        }],
    }
}
