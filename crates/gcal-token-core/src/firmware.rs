//! `#define` lines for the clock firmware's `secrets.h`.

use std::fmt;

/// Macro name for the OAuth client ID.
pub const CLIENT_ID_MACRO: &str = "GOOGLE_CLIENT_ID";
/// Macro name for the OAuth client secret.
pub const CLIENT_SECRET_MACRO: &str = "GOOGLE_CLIENT_SECRET";
/// Macro name for the refresh token.
pub const REFRESH_TOKEN_MACRO: &str = "GOOGLE_REFRESH_TOKEN";

/// The three firmware configuration lines, borrowed from a record.
///
/// Values are written verbatim between double quotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareDefines<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    refresh_token: &'a str,
}

impl<'a> FirmwareDefines<'a> {
    /// Creates the defines from raw values.
    pub fn new(client_id: &'a str, client_secret: &'a str, refresh_token: &'a str) -> Self {
        Self {
            client_id,
            client_secret,
            refresh_token,
        }
    }

    /// Returns the lines in the order the firmware expects them.
    pub fn lines(&self) -> [String; 3] {
        [
            define(CLIENT_ID_MACRO, self.client_id),
            define(CLIENT_SECRET_MACRO, self.client_secret),
            define(REFRESH_TOKEN_MACRO, self.refresh_token),
        ]
    }
}

fn define(name: &str, value: &str) -> String {
    format!("#define {name} \"{value}\"")
}

impl fmt::Display for FirmwareDefines<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.lines() {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}
