//! Usage: Domain modules (report discovery, embedding, export workflow, session state).

pub mod discovery;
pub mod embed;
pub mod export;
pub mod reports;
pub mod session;
