//! Installed-application OAuth 2.0 flow for Google APIs.
//!
//! This crate provides the authorization step of `gcal-token`:
//!
//! - [`AuthorizationFlow`] - The seam the authorizer drives
//! - [`InstalledFlow`] - PKCE authorization-code flow with a loopback redirect
//! - [`ClientSecrets`] - Parser for the desktop-app client-secrets file
//! - [`OAuthError`] - Error types for flow operations
//!
//! # Example
//!
//! ```ignore
//! use gcal_token_oauth::{AuthorizationFlow, InstalledFlow};
//!
//! let flow = InstalledFlow::new(InstalledFlowConfig::default())?;
//! let scopes = vec![gcal_token_core::CALENDAR_READONLY_SCOPE.to_string()];
//! let record = flow.authorize(Path::new("credentials.json"), &scopes).await?;
//! ```

pub mod error;
pub mod flow;
pub mod installed;
pub mod secrets;

pub use error::{OAuthError, OAuthErrorCode, OAuthResult};
pub use flow::{AuthorizationFlow, BoxFuture};
pub use installed::{InstalledFlow, InstalledFlowConfig, PkceFlow};
pub use secrets::ClientSecrets;
