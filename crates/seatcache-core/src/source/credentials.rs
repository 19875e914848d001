use anyhow::{Context, Result};
use keyring::Entry;
use tracing::debug;

const SERVICE_NAME: &str = "seatcache";

/// Keychain account holding the direct API key.
const API_KEY_ACCOUNT: &str = "sheets-api-key";

/// Keychain account holding an OAuth access token.
const ACCESS_TOKEN_ACCOUNT: &str = "sheets-access-token";

pub const API_KEY_ENV: &str = "SEATCACHE_API_KEY";
pub const ACCESS_TOKEN_ENV: &str = "SEATCACHE_ACCESS_TOKEN";

/// How the direct transport authenticates.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    ApiKey(String),
    AccessToken(String),
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::ApiKey(_) => write!(f, "ApiKey(***)"),
            Credentials::AccessToken(_) => write!(f, "AccessToken(***)"),
        }
    }
}

impl Credentials {
    pub fn kind(&self) -> &'static str {
        match self {
            Credentials::ApiKey(_) => "api-key",
            Credentials::AccessToken(_) => "access-token",
        }
    }
}

pub struct CredentialStore;

impl CredentialStore {
    /// Resolve credentials from the environment, then the OS keychain.
    ///
    /// An access token wins over an API key since only tokens can write.
    pub fn resolve() -> Option<Credentials> {
        Self::resolve_with(|name| std::env::var(name).ok(), Self::keychain_secret)
    }

    fn resolve_with(
        env: impl Fn(&str) -> Option<String>,
        keychain: impl Fn(&str) -> Option<String>,
    ) -> Option<Credentials> {
        let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

        if let Some(token) = non_empty(env(ACCESS_TOKEN_ENV)) {
            return Some(Credentials::AccessToken(token));
        }
        if let Some(key) = non_empty(env(API_KEY_ENV)) {
            return Some(Credentials::ApiKey(key));
        }
        if let Some(token) = non_empty(keychain(ACCESS_TOKEN_ACCOUNT)) {
            return Some(Credentials::AccessToken(token));
        }
        non_empty(keychain(API_KEY_ACCOUNT)).map(Credentials::ApiKey)
    }

    fn keychain_secret(account: &str) -> Option<String> {
        match Entry::new(SERVICE_NAME, account).and_then(|entry| entry.get_password()) {
            Ok(secret) => Some(secret),
            Err(e) => {
                debug!(account, error = %e, "No keychain credential");
                None
            }
        }
    }

    /// Store credentials in the OS keychain
    pub fn store(credentials: &Credentials) -> Result<()> {
        let (account, secret) = match credentials {
            Credentials::ApiKey(key) => (API_KEY_ACCOUNT, key),
            Credentials::AccessToken(token) => (ACCESS_TOKEN_ACCOUNT, token),
        };
        let entry = Entry::new(SERVICE_NAME, account)
            .context("Failed to create keyring entry")?;
        entry
            .set_password(secret)
            .context("Failed to store credential in keychain")?;
        Ok(())
    }

    /// Delete any stored credentials
    pub fn delete() -> Result<()> {
        for account in [API_KEY_ACCOUNT, ACCESS_TOKEN_ACCOUNT] {
            let entry = Entry::new(SERVICE_NAME, account)
                .context("Failed to create keyring entry")?;
            match entry.delete_credential() {
                Ok(()) | Err(keyring::Error::NoEntry) => {}
                Err(e) => return Err(e).context("Failed to delete credential from keychain"),
            }
        }
        Ok(())
    }
}
