//! Command-line interface definition.

use std::path::PathBuf;

use clap::Parser;

use crate::authorizer::AuthorizerConfig;

/// gcal-token - Get a Google Calendar refresh token for the desk clock
#[derive(Debug, Parser)]
#[command(name = "gcal-token")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// OAuth client secrets downloaded from the Google Cloud Console
    #[arg(long, env = "GCAL_TOKEN_CREDENTIALS_FILE", default_value = AuthorizerConfig::DEFAULT_CREDENTIALS_PATH)]
    pub credentials_file: PathBuf,

    /// Where to write the obtained tokens
    #[arg(long, env = "GCAL_TOKEN_TOKEN_FILE", default_value = AuthorizerConfig::DEFAULT_TOKEN_PATH)]
    pub token_file: PathBuf,

    /// Exchange the refresh token once after saving to check it works
    #[arg(long)]
    pub verify: bool,

    /// Print the consent URL instead of opening a browser
    #[arg(long)]
    pub no_browser: bool,

    /// Token endpoint request timeout in seconds
    #[arg(long, default_value = "30")]
    pub timeout: u64,

    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,
}

impl Cli {
    /// Builds the authorizer settings from the parsed flags.
    pub fn authorizer_config(&self) -> AuthorizerConfig {
        AuthorizerConfig::default()
            .with_credentials_path(&self.credentials_file)
            .with_token_path(&self.token_file)
            .with_verify(self.verify)
    }
}
