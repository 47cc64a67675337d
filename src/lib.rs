//! # ledger-migrate
//!
//! One-way migration of spreadsheet exports (invoices, credit notes, party
//! master data) into a target API, with the bearer token of every configured
//! credential cached, refreshed and persisted on the way.
//!
//! Modules:
//! - `config` — settings, credentials and targets loaded from YAML
//! - `parser` — expiry claim of a bearer token
//! - `cache` — cached token and its freshness
//! - `sources` — refresh round-trip and per-credential token managers
//! - `client` — authenticated calls with re-authentication on 401
//! - `migration` — payload mapping, batch submission and result log
//! - `sinks` — persisted tokens (dotenv file or token directory)

pub mod cache;
pub mod client;
pub mod config;
pub mod helpers;
pub mod migration;
pub mod observability;
pub mod parser;
pub mod resilience;
pub mod sinks;
pub mod sources;
pub mod utils;

#[cfg(test)]
mod tests;

pub use crate::client::{AuthenticatedClient, RequestError};
pub use crate::resilience::error::TokenError;
pub use crate::sources::{TokenManager, TokenManagers};
