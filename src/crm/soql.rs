//! SOQL text assembly helpers.
//!
//! Every string literal interpolated into a query goes through [`quote`]
//! so caller-supplied values cannot break out of the literal.

/// Quote a string value as a SOQL literal, escaping backslashes and quotes.
#[must_use]
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for ch in value.chars() {
        match ch {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            _ => out.push(ch),
        }
    }
    out.push('\'');
    out
}

/// Quote a value as a prefix `LIKE` pattern (`'value%'`).
///
/// Used to match 15-character core identifiers against stored values that
/// may carry the 3-character case-safety suffix.
#[must_use]
pub fn like_prefix(value: &str) -> String {
    let quoted = quote(value);
    // Insert the wildcard before the closing quote.
    format!("{}%'", &quoted[..quoted.len() - 1])
}

/// Render an `IN (…)` list of quoted identifiers.
#[must_use]
pub fn in_list(values: &[String]) -> String {
    values
        .iter()
        .map(|v| quote(v))
        .collect::<Vec<_>>()
        .join(",")
}
