//! Usage: Cross-cutting helpers shared by auth, domain and server layers.

pub mod error;
pub mod error_code;
pub(crate) mod mutex_ext;
pub mod security;
pub mod time;
