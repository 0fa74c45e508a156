//! Relationship-field identity parsing.
//!
//! A relationship field may arrive as a bare 15/18-character identifier,
//! as an HTML anchor wrapping an identifier and display text, or as a
//! plain name. [`ReferenceParser::parse`] normalizes all three into a
//! `{id, display_name}` pair; it is total, deterministic, and
//! side-effect free.

use regex::Regex;
use serde_json::Value;

use crate::{AppError, Result};

/// Key prefix of Contact record identifiers.
pub const CONTACT_KEY_PREFIX: &str = "003";

/// Normalized identity extracted from a raw relationship value.
///
/// At least one field should be present for the record to be usable; both
/// absent means the raw value was unparseable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedIdentity {
    /// Record identifier, when the raw value carried one.
    pub id: Option<String>,
    /// Display name, parsed from anchor text or a plain-name value.
    pub display_name: Option<String>,
}

/// Parser for relationship values belonging to one record type.
///
/// Compiles the anchor and bare-identifier patterns once; reused for every
/// record in a request.
pub struct ReferenceParser {
    anchor: Regex,
    bare: Regex,
}

impl ReferenceParser {
    /// Build a parser for identifiers starting with `key_prefix`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the prefix produces an invalid
    /// pattern (cannot happen for the literal prefixes used here, but the
    /// failure is propagated rather than panicking).
    pub fn new(key_prefix: &str) -> Result<Self> {
        let prefix = regex::escape(key_prefix);
        let anchor = Regex::new(&format!(
            r#"(?i)<a[^>]*href=["']/({prefix}[0-9A-Za-z]{{12}}(?:[0-9A-Za-z]{{3}})?)["'][^>]*>([^<]+)</a>"#
        ))
        .map_err(|err| AppError::Config(format!("invalid anchor pattern: {err}")))?;
        let bare = Regex::new(&format!(
            "^{prefix}[0-9A-Za-z]{{12}}(?:[0-9A-Za-z]{{3}})?$"
        ))
        .map_err(|err| AppError::Config(format!("invalid identifier pattern: {err}")))?;
        Ok(Self { anchor, bare })
    }

    /// Parser for Contact references (key prefix `003`).
    ///
    /// # Errors
    ///
    /// Propagates pattern-compilation failure from [`Self::new`].
    pub fn contacts() -> Result<Self> {
        Self::new(CONTACT_KEY_PREFIX)
    }

    /// Normalize a raw relationship value.
    ///
    /// Non-string values yield an empty identity. An anchor yields both id
    /// and display name; a bare identifier yields the id only; any other
    /// text is taken as a display name with no id.
    #[must_use]
    pub fn parse(&self, raw: &Value) -> NormalizedIdentity {
        let Value::String(text) = raw else {
            return NormalizedIdentity::default();
        };

        if let Some(captures) = self.anchor.captures(text) {
            return NormalizedIdentity {
                id: captures.get(1).map(|m| m.as_str().to_owned()),
                display_name: captures.get(2).map(|m| m.as_str().to_owned()),
            };
        }

        if self.bare.is_match(text) {
            return NormalizedIdentity {
                id: Some(text.clone()),
                display_name: None,
            };
        }

        NormalizedIdentity {
            id: None,
            display_name: Some(text.clone()),
        }
    }

    /// Whether a string is a well-formed identifier for this record type.
    #[must_use]
    pub fn is_valid_id(&self, value: &str) -> bool {
        self.bare.is_match(value)
    }
}

/// Truncate an identifier to its 15-character case-sensitive core,
/// discarding the case-safety suffix. Values of 15 characters or fewer
/// pass through unchanged; idempotent.
#[must_use]
pub fn truncate_to_core15(id: &str) -> &str {
    id.get(..15).unwrap_or(id)
}
