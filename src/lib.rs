#![forbid(unsafe_code)]

pub mod config;
pub mod crm;
pub mod dates;
pub mod errors;
pub mod http;
pub mod models;
pub mod session;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
