//! Token sources: one refresh round-trip (`fetch`), the per-credential cache
//! and refresh policy (`token_manager`) and the managers keyed by credential
//! name (`registry`).

pub mod fetch;
pub mod registry;
pub mod token_manager;

pub use registry::TokenManagers;
pub use token_manager::{TokenManager, TokenPolicy, TokenStatus};
