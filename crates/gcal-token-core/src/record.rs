//! The credential record persisted after a successful authorization.
//!
//! A [`CredentialRecord`] is the only data this tool produces. It is built
//! once from the result of the authorization exchange and written to disk as
//! a single pretty-printed JSON object.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::firmware::FirmwareDefines;

/// Read-only Google Calendar scope.
pub const CALENDAR_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/calendar.readonly";

/// Indentation used when writing the record.
const JSON_INDENT: &[u8] = b"    ";

/// Errors raised while persisting or loading a credential record.
#[derive(Debug, Error)]
pub enum RecordError {
    /// The token file could not be written.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The token file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The record could not be encoded as JSON.
    #[error("failed to serialize credentials: {0}")]
    Serialize(#[source] serde_json::Error),

    /// The token file does not contain a valid record.
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Result type for record operations.
pub type RecordResult<T> = Result<T, RecordError>;

/// Credentials obtained from a single authorization exchange.
///
/// Field order matches the order keys are written in `token.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// The current access token. May be short-lived or empty.
    pub token: String,
    /// The long-lived refresh token.
    pub refresh_token: String,
    /// The provider's token endpoint.
    pub token_uri: String,
    /// The OAuth client ID.
    pub client_id: String,
    /// The OAuth client secret.
    pub client_secret: String,
    /// The scopes that were granted, in order.
    pub scopes: Vec<String>,
}

impl CredentialRecord {
    /// Creates a record from the values returned by the authorization flow.
    pub fn new(
        token: impl Into<String>,
        refresh_token: impl Into<String>,
        token_uri: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            token: token.into(),
            refresh_token: refresh_token.into(),
            token_uri: token_uri.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scopes,
        }
    }

    /// Serializes the record as JSON indented with four spaces.
    pub fn to_json_pretty(&self) -> RecordResult<String> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(JSON_INDENT);
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser).map_err(RecordError::Serialize)?;
        // serde_json only ever emits UTF-8
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Writes the record to `path`, replacing any previous content.
    pub fn save(&self, path: impl AsRef<Path>) -> RecordResult<()> {
        let path = path.as_ref();
        let content = self.to_json_pretty()?;

        let write_err = |source| RecordError::Write {
            path: path.to_path_buf(),
            source,
        };

        {
            let mut file = File::create(path).map_err(write_err)?;
            file.write_all(content.as_bytes()).map_err(write_err)?;
            file.flush().map_err(write_err)?;
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            if let Err(e) = std::fs::set_permissions(path, perms) {
                tracing::warn!("could not restrict permissions on {}: {}", path.display(), e);
            }
        }

        debug!("saved credentials to {}", path.display());
        Ok(())
    }

    /// Reads a record previously written with [`save`](Self::save).
    pub fn load(path: impl AsRef<Path>) -> RecordResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| RecordError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| RecordError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Returns the `#define` lines for the device firmware.
    pub fn firmware_defines(&self) -> FirmwareDefines<'_> {
        FirmwareDefines::new(&self.client_id, &self.client_secret, &self.refresh_token)
    }
}
