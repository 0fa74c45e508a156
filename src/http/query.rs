//! Raw SOQL passthrough for diagnostics.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use super::{ensure_connection, AppState};
use crate::crm::api::CrmApi;
use crate::{AppError, Result};

/// Query parameters for the passthrough.
#[derive(Debug, Deserialize)]
pub struct QueryParams {
    /// SOQL text to execute verbatim.
    pub soql: Option<String>,
}

/// `GET /api/sfdc/query?soql=…` — run a query and echo the raw result.
///
/// # Errors
///
/// Returns `AppError::Validation` when `soql` is absent,
/// `AppError::Session` when no connection exists, and `AppError::Crm`
/// when the query fails.
pub async fn run(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<QueryParams>,
) -> Result<Response> {
    let soql = params
        .soql
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| AppError::Validation("missing soql".into()))?;

    let connection = ensure_connection(&state, &headers).await?;
    let result = connection.client.query(soql).await?;
    Ok(connection.finalize(&state, Json(result).into_response()))
}
