//! REST implementation of the CRM collaborator interface.
//!
//! Thin wrapper over the org's `/services/data/vNN` endpoints. The
//! underlying `reqwest::Client` is shared process-wide and carries the
//! bounded request timeout; one `RestClient` is built per request from
//! the session's credential.

use serde_json::{json, Value};

use crate::crm::api::{
    BoxFuture, CrmApi, GlobalDescribe, JsonRecord, ObjectDescribe, QueryResponse, SaveResult,
};
use crate::models::credential::SessionCredential;
use crate::{AppError, Result};

/// CRM REST client bound to one session's credential.
#[derive(Clone)]
pub struct RestClient {
    http: reqwest::Client,
    instance_url: String,
    api_version: String,
    access_token: String,
}

impl RestClient {
    /// Bind a client to a session credential.
    #[must_use]
    pub fn new(http: reqwest::Client, credential: &SessionCredential, api_version: &str) -> Self {
        Self {
            http,
            instance_url: credential.instance_url.trim_end_matches('/').to_owned(),
            api_version: api_version.to_owned(),
            access_token: credential.access_token.clone(),
        }
    }

    fn rest_url(&self, tail: &str) -> String {
        format!(
            "{}/services/data/v{}/{tail}",
            self.instance_url, self.api_version
        )
    }

    /// Fail non-2xx responses with the CRM's error body as context.
    async fn checked(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(AppError::Crm(format!("{what} failed ({status}): {body}")))
    }

    async fn run_query(&self, soql: String) -> Result<QueryResponse> {
        let response = self
            .http
            .get(self.rest_url("query"))
            .bearer_auth(&self.access_token)
            .query(&[("q", soql.as_str())])
            .send()
            .await?;
        let response = Self::checked(response, "query").await?;
        Ok(response.json().await?)
    }

    async fn run_describe(&self, object: String) -> Result<ObjectDescribe> {
        let response = self
            .http
            .get(self.rest_url(&format!("sobjects/{object}/describe")))
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        let response = Self::checked(response, "describe").await?;
        Ok(response.json().await?)
    }

    async fn run_describe_global(&self) -> Result<GlobalDescribe> {
        let response = self
            .http
            .get(self.rest_url("sobjects"))
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        let response = Self::checked(response, "global describe").await?;
        Ok(response.json().await?)
    }

    async fn run_update_one(
        &self,
        object: String,
        id: String,
        fields: JsonRecord,
    ) -> Result<SaveResult> {
        let response = self
            .http
            .patch(self.rest_url(&format!("sobjects/{object}/{id}")))
            .bearer_auth(&self.access_token)
            .json(&Value::Object(fields))
            .send()
            .await?;
        // A single-record PATCH answers 204 with no body.
        Self::checked(response, "update").await?;
        Ok(SaveResult {
            id: Some(id),
            success: true,
            errors: Vec::new(),
        })
    }

    async fn run_update_many(
        &self,
        object: String,
        records: Vec<JsonRecord>,
        all_or_none: bool,
    ) -> Result<Vec<SaveResult>> {
        let records: Vec<Value> = records
            .into_iter()
            .map(|mut record| {
                record.insert("attributes".to_owned(), json!({ "type": object }));
                Value::Object(record)
            })
            .collect();
        let body = json!({ "allOrNone": all_or_none, "records": records });

        let response = self
            .http
            .patch(self.rest_url("composite/sobjects"))
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;
        let response = Self::checked(response, "batch update").await?;
        Ok(response.json().await?)
    }
}

impl CrmApi for RestClient {
    fn query(&self, soql: &str) -> BoxFuture<'_, Result<QueryResponse>> {
        let soql = soql.to_owned();
        Box::pin(async move { self.run_query(soql).await })
    }

    fn describe(&self, object: &str) -> BoxFuture<'_, Result<ObjectDescribe>> {
        let object = object.to_owned();
        Box::pin(async move { self.run_describe(object).await })
    }

    fn describe_global(&self) -> BoxFuture<'_, Result<GlobalDescribe>> {
        Box::pin(self.run_describe_global())
    }

    fn update_one(
        &self,
        object: &str,
        id: &str,
        fields: JsonRecord,
    ) -> BoxFuture<'_, Result<SaveResult>> {
        let object = object.to_owned();
        let id = id.to_owned();
        Box::pin(async move { self.run_update_one(object, id, fields).await })
    }

    fn update_many(
        &self,
        object: &str,
        records: Vec<JsonRecord>,
        all_or_none: bool,
    ) -> BoxFuture<'_, Result<Vec<SaveResult>>> {
        let object = object.to_owned();
        Box::pin(async move { self.run_update_many(object, records, all_or_none).await })
    }
}
