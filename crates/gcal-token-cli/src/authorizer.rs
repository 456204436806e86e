//! The authorizer: check prerequisites, run the flow, save, report.
//!
//! This is a straight-line sequence with one early exit. When the client
//! secrets file is missing the user gets setup instructions and nothing
//! else happens; any other failure is returned unchanged to the caller.

use std::io::Write;
use std::path::{Path, PathBuf};

use gcal_token_core::{CALENDAR_READONLY_SCOPE, CredentialRecord};
use gcal_token_oauth::AuthorizationFlow;
use tracing::{debug, info};

use crate::error::ClientResult;

/// Settings for a single authorizer run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizerConfig {
    /// Client secrets file downloaded from the Google Cloud Console.
    pub credentials_path: PathBuf,
    /// Where the credential record is written.
    pub token_path: PathBuf,
    /// Whether to exchange the refresh token once after saving.
    pub verify: bool,
}

impl AuthorizerConfig {
    /// Default client secrets path, relative to the working directory.
    pub const DEFAULT_CREDENTIALS_PATH: &'static str = "credentials.json";

    /// Default token path, relative to the working directory.
    pub const DEFAULT_TOKEN_PATH: &'static str = "token.json";

    /// Sets the client secrets path.
    pub fn with_credentials_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials_path = path.into();
        self
    }

    /// Sets the token path.
    pub fn with_token_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_path = path.into();
        self
    }

    /// Enables or disables refresh token verification.
    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }
}

impl Default for AuthorizerConfig {
    fn default() -> Self {
        Self {
            credentials_path: PathBuf::from(Self::DEFAULT_CREDENTIALS_PATH),
            token_path: PathBuf::from(Self::DEFAULT_TOKEN_PATH),
            verify: false,
        }
    }
}

/// How a run ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The client secrets file was absent; instructions were printed.
    MissingCredentials,
    /// Tokens were obtained and saved.
    Saved(CredentialRecord),
}

/// The scopes requested from Google. Always exactly read-only calendar.
pub fn scopes() -> Vec<String> {
    vec![CALENDAR_READONLY_SCOPE.to_string()]
}

/// Drives one authorization using the given flow.
#[derive(Debug)]
pub struct Authorizer<F> {
    config: AuthorizerConfig,
    flow: F,
}

impl<F: AuthorizationFlow> Authorizer<F> {
    /// Creates an authorizer.
    pub fn new(config: AuthorizerConfig, flow: F) -> Self {
        Self { config, flow }
    }

    /// Runs the authorizer, writing user-facing text to `out`.
    pub async fn run<W: Write>(&self, out: &mut W) -> ClientResult<Outcome> {
        let credentials_path = self.config.credentials_path.as_path();

        if !credentials_path.exists() {
            debug!("no client secrets at {}", credentials_path.display());
            write_setup_instructions(out, credentials_path)?;
            return Ok(Outcome::MissingCredentials);
        }

        let scopes = scopes();
        let record = self.flow.authorize(credentials_path, &scopes).await?;

        record.save(&self.config.token_path)?;
        info!("credentials written to {}", self.config.token_path.display());

        write_report(out, &self.config.token_path, &record)?;

        if self.config.verify {
            self.flow.verify_refresh_token(&record).await?;
            writeln!(out)?;
            writeln!(out, "Refresh token verified.")?;
        }

        Ok(Outcome::Saved(record))
    }
}

fn write_setup_instructions<W: Write>(out: &mut W, credentials_path: &Path) -> std::io::Result<()> {
    let name = credentials_path.display();
    writeln!(out, "Error: {} not found.", name)?;
    writeln!(out, "Please follow these steps:")?;
    writeln!(out, "1. Create a Google Cloud project")?;
    writeln!(out, "2. Enable Calendar API")?;
    writeln!(
        out,
        "3. Create OAuth Client ID credentials for a desktop application"
    )?;
    writeln!(
        out,
        "4. Download the credentials as '{}' and place it in this directory",
        name
    )
}

fn write_report<W: Write>(
    out: &mut W,
    token_path: &Path,
    record: &CredentialRecord,
) -> std::io::Result<()> {
    writeln!(out, "Credentials saved to {}", token_path.display())?;
    writeln!(out, "Refresh Token: {}", record.refresh_token)?;
    writeln!(out)?;
    writeln!(out, "Add these lines to src/secrets.h:")?;
    write!(out, "{}", record.firmware_defines())
}
