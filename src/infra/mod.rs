//! Usage: Infrastructure adapters (environment settings, reporting REST API).

pub mod powerbi_api;
pub mod settings;
