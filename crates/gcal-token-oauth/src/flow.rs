//! AuthorizationFlow trait definition.
//!
//! The authorizer only depends on this trait. [`InstalledFlow`] is the real
//! implementation; tests substitute a fake that returns a fixed record.
//!
//! [`InstalledFlow`]: crate::installed::InstalledFlow

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use gcal_token_core::CredentialRecord;

use crate::error::OAuthResult;

/// A boxed future that is Send.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// An interactive OAuth authorization that yields a credential record.
pub trait AuthorizationFlow: Send + Sync {
    /// Runs the flow against the client described by `credentials_path`.
    ///
    /// Resolves once the provider has redirected back and the authorization
    /// code has been exchanged, or once the flow fails.
    fn authorize<'a>(
        &'a self,
        credentials_path: &'a Path,
        scopes: &'a [String],
    ) -> BoxFuture<'a, OAuthResult<CredentialRecord>>;

    /// Exchanges the record's refresh token for a new access token once,
    /// the way the device will at boot.
    fn verify_refresh_token<'a>(
        &'a self,
        record: &'a CredentialRecord,
    ) -> BoxFuture<'a, OAuthResult<()>>;
}

impl<T: AuthorizationFlow + ?Sized> AuthorizationFlow for &T {
    fn authorize<'a>(
        &'a self,
        credentials_path: &'a Path,
        scopes: &'a [String],
    ) -> BoxFuture<'a, OAuthResult<CredentialRecord>> {
        (**self).authorize(credentials_path, scopes)
    }

    fn verify_refresh_token<'a>(
        &'a self,
        record: &'a CredentialRecord,
    ) -> BoxFuture<'a, OAuthResult<()>> {
        (**self).verify_refresh_token(record)
    }
}
