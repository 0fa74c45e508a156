//! CRM integration core.
//!
//! Everything that talks to, or reasons about, the CRM lives here: the
//! REST client and OAuth flows, the defensive schema discovery layer, the
//! relationship-field identity parser, batched display-name resolution,
//! the meeting locator, and the update reconciler. The HTTP layer calls
//! into these components through the [`api::CrmApi`] trait so tests can
//! substitute a scripted CRM.

pub mod api;
pub mod auth;
pub mod client;
pub mod identity;
pub mod meeting;
pub mod reconcile;
pub mod resolver;
pub mod schema;
pub mod soql;
