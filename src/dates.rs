//! Dual-format date normalization for request parameters.
//!
//! Callers may supply dates as `YYYY-MM-DD` or `M/D/YYYY`; everything
//! downstream (SOQL predicates, diagnostics) uses the ISO form.

use chrono::NaiveDate;

use crate::{AppError, Result};

/// Normalize a caller-supplied date to canonical `YYYY-MM-DD`.
///
/// Accepts ISO (`2025-09-01`) and US (`9/1/2025`) forms; both are parsed
/// into a real calendar date, so `2025-13-40` is rejected rather than
/// passed through to the CRM.
///
/// # Errors
///
/// Returns `AppError::Validation` when the value matches neither format or
/// names an impossible date.
pub fn normalize_date(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%m/%d/%Y"))
        .map(|date| date.format("%Y-%m-%d").to_string())
        .map_err(|_| {
            AppError::Validation(format!(
                "invalid date {trimmed:?}; use YYYY-MM-DD or MM/DD/YYYY"
            ))
        })
}

/// Normalize an optional parameter, substituting a default when absent.
///
/// Blank strings count as absent, matching the original query-parameter
/// handling.
///
/// # Errors
///
/// Returns `AppError::Validation` when a present value fails to parse.
pub fn normalize_date_or(raw: Option<&str>, fallback: &str) -> Result<String> {
    match raw.map(str::trim) {
        Some(value) if !value.is_empty() => normalize_date(value),
        _ => normalize_date(fallback),
    }
}
