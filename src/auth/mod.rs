//! Usage: Sign-in and bearer credentials for the reporting API.
//!
//! `token_provider` is what the rest of the crate calls; `identity` hides the Entra
//! authorization-code + PKCE flow behind a trait so it can be replaced in tests.

pub(crate) mod authority;
pub(crate) mod callback_server;
pub mod credential;
pub mod identity;
pub(crate) mod pkce;
pub(crate) mod token_exchange;
pub mod token_provider;

pub use credential::{Account, Credential};
pub use identity::{EntraIdentityClient, IdentityClient, IdentityConfig};
pub use token_provider::{AcquisitionAttempt, TokenProvider};
