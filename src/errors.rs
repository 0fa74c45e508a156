//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Caller input is malformed; rejected before any CRM call.
    Validation(String),
    /// Bearer token missing or wrong.
    Unauthorized(String),
    /// No CRM credential is available for the caller's session.
    Session(String),
    /// CRM REST call failed (transport, HTTP status, or payload shape).
    Crm(String),
    /// Schema discovery could not bind a mandatory field role.
    Discovery(String),
    /// Requested entity does not exist.
    NotFound(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Validation(msg) => write!(f, "validation: {msg}"),
            Self::Unauthorized(msg) => write!(f, "unauthorized: {msg}"),
            Self::Session(msg) => write!(f, "session: {msg}"),
            Self::Crm(msg) => write!(f, "crm: {msg}"),
            Self::Discovery(msg) => write!(f, "discovery: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        Self::Crm(err.to_string())
    }
}
