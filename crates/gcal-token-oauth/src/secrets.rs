//! Client secrets file parsing.
//!
//! The file is the JSON downloaded from the Google Cloud Console after
//! creating an OAuth client ID of type "Desktop app". It contains an
//! `installed` section (or `web`, for web clients):
//!
//! ```json
//! {
//!   "installed": {
//!     "client_id": "123.apps.googleusercontent.com",
//!     "project_id": "my-clock",
//!     "auth_uri": "https://accounts.google.com/o/oauth2/auth",
//!     "token_uri": "https://oauth2.googleapis.com/token",
//!     "client_secret": "GOCSPX-...",
//!     "redirect_uris": ["http://localhost"]
//!   }
//! }
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::error::{OAuthError, OAuthResult};

/// Google's authorization endpoint.
pub const GOOGLE_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
/// Google's token endpoint.
pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// OAuth client configuration read from the client secrets file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSecrets {
    /// The OAuth 2.0 client ID.
    pub client_id: String,
    /// The OAuth 2.0 client secret.
    pub client_secret: String,
    /// Where the user is sent to grant consent.
    pub auth_uri: String,
    /// Where authorization codes and refresh tokens are exchanged.
    pub token_uri: String,
}

#[derive(Debug, Deserialize)]
struct SecretsFile {
    installed: Option<SecretsSection>,
    web: Option<SecretsSection>,
}

#[derive(Debug, Deserialize)]
struct SecretsSection {
    client_id: String,
    client_secret: String,
    #[serde(default)]
    auth_uri: Option<String>,
    #[serde(default)]
    token_uri: Option<String>,
}

impl ClientSecrets {
    /// Reads client secrets from a file on disk.
    pub fn from_file(path: impl AsRef<Path>) -> OAuthResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            OAuthError::configuration(format!(
                "failed to read client secrets file {}",
                path.display()
            ))
            .with_source(e)
        })?;
        Self::from_json(&content)
    }

    /// Parses client secrets from the JSON content of the file.
    pub fn from_json(json: &str) -> OAuthResult<Self> {
        let file: SecretsFile = serde_json::from_str(json).map_err(|e| {
            OAuthError::configuration("failed to parse client secrets JSON").with_source(e)
        })?;

        let section = file.installed.or(file.web).ok_or_else(|| {
            OAuthError::configuration(
                "client secrets file must contain an 'installed' or 'web' section",
            )
        })?;

        if section.client_id.is_empty() {
            return Err(OAuthError::configuration("client_id is empty"));
        }
        if section.client_secret.is_empty() {
            return Err(OAuthError::configuration("client_secret is empty"));
        }

        Ok(Self {
            client_id: section.client_id,
            client_secret: section.client_secret,
            auth_uri: section
                .auth_uri
                .unwrap_or_else(|| GOOGLE_AUTH_URI.to_string()),
            token_uri: section
                .token_uri
                .unwrap_or_else(|| GOOGLE_TOKEN_URI.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OAuthErrorCode;

    #[test]
    fn parses_installed_section() {
        let json = r#"{
            "installed": {
                "client_id": "test-id.apps.googleusercontent.com",
                "project_id": "my-project",
                "auth_uri": "https://accounts.google.com/o/oauth2/auth",
                "token_uri": "https://oauth2.googleapis.com/token",
                "auth_provider_x509_cert_url": "https://www.googleapis.com/oauth2/v1/certs",
                "client_secret": "test-secret",
                "redirect_uris": ["http://localhost"]
            }
        }"#;

        let secrets = ClientSecrets::from_json(json).unwrap();
        assert_eq!(secrets.client_id, "test-id.apps.googleusercontent.com");
        assert_eq!(secrets.client_secret, "test-secret");
        assert_eq!(secrets.auth_uri, GOOGLE_AUTH_URI);
        assert_eq!(secrets.token_uri, GOOGLE_TOKEN_URI);
    }

    #[test]
    fn parses_web_section() {
        let json = r#"{
            "web": {
                "client_id": "web-id.apps.googleusercontent.com",
                "client_secret": "web-secret",
                "token_uri": "https://example.test/token"
            }
        }"#;

        let secrets = ClientSecrets::from_json(json).unwrap();
        assert_eq!(secrets.client_id, "web-id.apps.googleusercontent.com");
        assert_eq!(secrets.token_uri, "https://example.test/token");
        assert_eq!(secrets.auth_uri, GOOGLE_AUTH_URI);
    }

    #[test]
    fn missing_section_is_configuration_error() {
        let err = ClientSecrets::from_json(r#"{ "other": {} }"#).unwrap_err();
        assert_eq!(err.code(), OAuthErrorCode::ConfigurationError);
        assert!(err.message().contains("installed"));
    }

    #[test]
    fn empty_client_id_is_rejected() {
        let json = r#"{"installed": {"client_id": "", "client_secret": "s"}}"#;
        let err = ClientSecrets::from_json(json).unwrap_err();
        assert!(err.message().contains("client_id"));
    }

    #[test]
    fn malformed_json_is_rejected() {
        let err = ClientSecrets::from_json("not json").unwrap_err();
        assert!(err.message().contains("parse"));
    }

    #[test]
    fn reads_from_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("credentials.json");
        std::fs::write(
            &path,
            r#"{"installed": {"client_id": "file-id", "client_secret": "file-secret"}}"#,
        )
        .unwrap();

        let secrets = ClientSecrets::from_file(&path).unwrap();
        assert_eq!(secrets.client_id, "file-id");
        assert_eq!(secrets.client_secret, "file-secret");
    }

    #[test]
    fn missing_file_is_configuration_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = ClientSecrets::from_file(tmp.path().join("absent.json")).unwrap_err();
        assert_eq!(err.code(), OAuthErrorCode::ConfigurationError);
    }
}
