//! Power BI embed host for the "organization owns data" flow, with on-demand PDF export.
//!
//! The core is `auth::token_provider`, `domain::discovery` and `domain::export`;
//! `domain::session` ties them to one user's session for the HTTP host and the CLI.

pub mod app;
pub mod auth;
mod commands;
pub mod domain;
pub mod infra;
pub mod server;
pub mod shared;
pub mod test_support;

pub use app::run;
