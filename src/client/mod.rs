pub mod authenticated;
pub mod error;

pub use authenticated::{AuthenticatedClient, AuthenticatedRequest};
pub use error::RequestError;
