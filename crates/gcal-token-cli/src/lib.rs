//! CLI and authorizer for gcal-token
//!
//! This crate provides the `gcal-token` command-line interface.

pub mod authorizer;
pub mod cli;
pub mod error;

pub use authorizer::{Authorizer, AuthorizerConfig, Outcome};
pub use cli::Cli;
pub use error::{ClientError, ClientResult};
