//! Service configuration: settings, credentials and migration targets,
//! loaded from YAML and validated as a whole.

pub mod credentials;
pub mod proc_loader;
pub mod proc_validator;
pub mod settings;
pub mod targets;
